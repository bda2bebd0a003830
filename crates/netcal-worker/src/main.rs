use clap::Parser;
use netcal_core::assignment::CommandAssignment;
use netcal_core::cancel::CancelToken;
use netcal_core::config::TallyWeights;
use netcal_core::params::ParameterSpace;
use netcal_core::pipeline::EvaluationPipeline;
use netcal_core::tally::{AuditLog, CombinationTally, ErrorTally, LineTally, RegionTally};
use netcal_core::transit;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use netcal_worker::worker::{run_worker, WorkerConfig};

#[derive(Parser)]
#[command(about = "Remote evaluation worker")]
struct Args {
    /// Host URL.
    #[arg(long, default_value = "http://localhost:3000")]
    host: String,

    /// Parameter instruction file; must match the host's.
    #[arg(long, default_value = "instructions.json")]
    instructions: PathBuf,

    /// Observed-boardings ground truth CSV.
    #[arg(long, default_value = "truth.csv")]
    truth: PathBuf,

    /// Optional CSV mapping truth ids onto network line aliases.
    #[arg(long)]
    alias_map: Option<PathBuf>,

    /// Program invoked for each evaluation.
    #[arg(long)]
    assignment_command: String,

    /// Arguments passed to the assignment command (repeatable).
    #[arg(long = "assignment-arg")]
    assignment_args: Vec<String>,

    /// File the parameter vector is written to before each run.
    #[arg(long, default_value = "parameters.json")]
    input_file: PathBuf,

    /// Predicted-boardings CSV the command produces.
    #[arg(long, default_value = "predicted.csv")]
    output_file: PathBuf,

    /// Weight of an additional region-level tally (0 disables it).
    #[arg(long, default_value_t = 0.0)]
    region_weight: f32,

    /// Optional CSV receiving one region-error audit row per evaluation.
    #[arg(long)]
    region_audit: Option<PathBuf>,

    /// Seconds between polls while the host has no work.
    #[arg(long, default_value_t = 5)]
    idle_secs: u64,

    #[command(flatten)]
    weights: TallyWeights,
}

fn build_tallies(args: &Args) -> Vec<Box<dyn ErrorTally>> {
    let line = LineTally::new(args.weights.clone());
    if args.region_weight == 0.0 {
        return vec![Box::new(line)];
    }
    let mut region = RegionTally::new(args.weights.clone());
    if let Some(path) = &args.region_audit {
        region = region.with_audit(AuditLog::new(path.clone()));
    }
    vec![Box::new(CombinationTally {
        first: Box::new(line),
        first_weight: 1.0,
        second: Box::new(region),
        second_weight: args.region_weight,
    })]
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let worker_id = format!(
        "worker-{}",
        Uuid::new_v4().to_string().split('-').next().unwrap()
    );

    let space = match ParameterSpace::load(&args.instructions) {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let truth = match load_truth(&args) {
        Ok(t) => t,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!(lines = truth.len(), "loaded ground truth");

    let assignment = CommandAssignment {
        program: args.assignment_command.clone(),
        args: args.assignment_args.clone(),
        input_file: args.input_file.clone(),
        output_file: args.output_file.clone(),
    };
    let pipeline = Arc::new(EvaluationPipeline::new(
        Box::new(assignment),
        build_tallies(&args),
        truth,
    ));

    let cancel = CancelToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("exit requested, finishing the current evaluation");
            signal_cancel.cancel();
        }
    });

    let config = WorkerConfig {
        host_url: args.host.clone(),
        worker_id,
        idle_delay: Duration::from_secs(args.idle_secs),
        retry_delay: Duration::from_secs(5),
    };
    if let Err(e) = run_worker(config, space, pipeline, cancel).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn load_truth(args: &Args) -> netcal_core::NcResult<Vec<transit::TransitLine>> {
    let mut truth = transit::load_truth(&args.truth)?;
    if let Some(map) = &args.alias_map {
        transit::apply_alias_map(&mut truth, map)?;
    }
    Ok(truth)
}
