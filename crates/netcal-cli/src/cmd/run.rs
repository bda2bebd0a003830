use clap::{Args, Subcommand};
use netcal_core::assignment::CommandAssignment;
use netcal_core::cancel::{CancelToken, ProgressSink};
use netcal_core::config::{GravityParams, KernelParams, LinearParams, TallyWeights};
use netcal_core::evallog::EvaluationLog;
use netcal_core::params::ParameterSpace;
use netcal_core::pipeline::EvaluationPipeline;
use netcal_core::strategy::{Exploration, GravityDescent, LinearSearch, WhiskerDescent};
use netcal_core::tally::{ErrorTally, LineTally};
use netcal_core::transit;
use netcal_core::NcResult;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Parameter instruction file describing the search space.
    #[arg(long, default_value = "instructions.json")]
    pub instructions: PathBuf,

    /// Observed-boardings ground truth CSV.
    #[arg(long, default_value = "truth.csv")]
    pub truth: PathBuf,

    /// Optional CSV mapping truth ids onto network line aliases.
    #[arg(long)]
    pub alias_map: Option<PathBuf>,

    /// Program invoked for each evaluation.
    #[arg(long)]
    pub assignment_command: String,

    /// Arguments passed to the assignment command (repeatable).
    #[arg(long = "assignment-arg")]
    pub assignment_args: Vec<String>,

    /// File the parameter vector is written to before each run.
    #[arg(long, default_value = "parameters.json")]
    pub input_file: PathBuf,

    /// Predicted-boardings CSV the command produces.
    #[arg(long, default_value = "predicted.csv")]
    pub output_file: PathBuf,

    /// Evaluation log receiving one row per evaluation.
    #[arg(long, default_value = "evaluation.csv")]
    pub log: PathBuf,

    /// Number of independent exploration repetitions.
    #[arg(long, default_value_t = 1)]
    pub runs: usize,

    #[command(flatten)]
    pub weights: TallyWeights,

    #[command(subcommand)]
    pub strategy: StrategyCmd,
}

#[derive(Subcommand, Debug)]
pub enum StrategyCmd {
    /// Four-probe whisker descent with momentum and volatility.
    Kernel {
        #[command(flatten)]
        params: KernelParams,
    },
    /// Two-probe descent toward the lower whisker.
    Gravity {
        #[command(flatten)]
        params: GravityParams,
    },
    /// Exhaustive grid sweep.
    Linear {
        #[command(flatten)]
        params: LinearParams,
    },
}

/// Logs a thinned stream of progress lines so long sweeps stay observable
/// without flooding the terminal.
struct RunProgress;

impl ProgressSink for RunProgress {
    fn on_progress(&self, _iteration: usize, fraction: f32, best: f32) -> bool {
        if fastrand::f32() < 0.05 {
            info!("   .. exploring .. {:>5.1}% best: {:.2}", fraction * 100.0, best);
        }
        true
    }
}

pub fn execute(args: RunArgs) -> NcResult<()> {
    let space = ParameterSpace::load(&args.instructions)?;
    let mut truth = transit::load_truth(&args.truth)?;
    if let Some(map) = &args.alias_map {
        transit::apply_alias_map(&mut truth, map)?;
    }
    info!(
        dimensions = space.len(),
        truth_lines = truth.len(),
        "estimation inputs loaded"
    );

    let assignment = CommandAssignment {
        program: args.assignment_command.clone(),
        args: args.assignment_args.clone(),
        input_file: args.input_file.clone(),
        output_file: args.output_file.clone(),
    };
    let tallies: Vec<Box<dyn ErrorTally>> = vec![Box::new(LineTally::new(args.weights.clone()))];
    let pipeline = Arc::new(EvaluationPipeline::new(
        Box::new(assignment),
        tallies,
        truth,
    ));

    let log = EvaluationLog::new(&args.log);
    let mut strategy = build_strategy(&args)?;

    let cancel = CancelToken::new();

    for run in 0..args.runs {
        if cancel.is_cancelled() {
            break;
        }
        info!(run, total = args.runs, strategy = strategy.label(), "exploration starting");
        let summary = {
            let pipeline = pipeline.clone();
            let log = &log;
            let mut eval = |params: &[netcal_core::params::ParameterDescriptor]| {
                let value = pipeline.evaluate(params)?;
                log.append(run as u32, "local", value, params)?;
                Ok(value)
            };
            strategy.explore(&space, &mut eval, &RunProgress, &cancel)?
        };
        info!(
            best = summary.best_fitness,
            evaluations = summary.evaluations,
            early_stopped = summary.early_stopped,
            "exploration finished"
        );
        info!("best parameters: {:?}", summary.best_values);
    }
    Ok(())
}

fn build_strategy(args: &RunArgs) -> NcResult<Box<dyn Exploration>> {
    Ok(match &args.strategy {
        StrategyCmd::Kernel { params } => {
            let mut params = params.clone();
            // default the resume source to this run's own log
            if params.continue_from_best && params.evaluation_file.is_none() {
                params.evaluation_file = Some(args.log.display().to_string());
            }
            Box::new(WhiskerDescent::new(params)?)
        }
        StrategyCmd::Gravity { params } => {
            let mut params = params.clone();
            if params.continue_from_best && params.evaluation_file.is_none() {
                params.evaluation_file = Some(args.log.display().to_string());
            }
            Box::new(GravityDescent::new(params))
        }
        StrategyCmd::Linear { params } => Box::new(LinearSearch::new(params.clone())?),
    })
}
