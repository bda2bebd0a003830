use netcal_core::assignment::NetworkAssignment;
use netcal_core::cancel::{CancelToken, NullProgress};
use netcal_core::config::{KernelParams, LinearParams, TallyWeights};
use netcal_core::error::NcResult;
use netcal_core::evallog::EvaluationLog;
use netcal_core::params::{ParameterDescriptor, ParameterSpace};
use netcal_core::pipeline::EvaluationPipeline;
use netcal_core::strategy::{Exploration, LinearSearch, WhiskerDescent};
use netcal_core::tally::LineTally;
use netcal_core::transit::{self, TransitLine};
use std::io::Write;

/// Stand-in simulation: predicted boardings react linearly to the parameter,
/// matching the truth exactly at wait = 1.2.
struct SyntheticAssignment;

impl NetworkAssignment for SyntheticAssignment {
    fn run_assignment(&self, parameters: &[ParameterDescriptor]) -> NcResult<Vec<TransitLine>> {
        let wait = parameters[0].current;
        Ok(vec![TransitLine {
            ids: vec!["N12".into()],
            boardings: 100.0 + (wait - 1.2) * 50.0,
            mode: 'b',
        }])
    }
}

fn setup() -> (tempfile::TempDir, ParameterSpace, EvaluationPipeline) {
    let dir = tempfile::tempdir().unwrap();

    let instructions = dir.path().join("instructions.json");
    std::fs::File::create(&instructions)
        .unwrap()
        .write_all(br#"{"parameters":[{"name":"wait","slot":7,"start":0.0,"stop":2.0}]}"#)
        .unwrap();
    let space = ParameterSpace::load(&instructions).unwrap();

    let truth_file = dir.path().join("truth.csv");
    std::fs::File::create(&truth_file)
        .unwrap()
        .write_all(b"100,T501\n")
        .unwrap();
    let alias_file = dir.path().join("aliases.csv");
    std::fs::File::create(&alias_file)
        .unwrap()
        .write_all(b"T501,N12\n")
        .unwrap();

    let mut truth = transit::load_truth(&truth_file).unwrap();
    transit::apply_alias_map(&mut truth, &alias_file).unwrap();

    let weights = TallyWeights {
        rmse_weight: 1.0,
        mabs_weight: 0.0,
        terror_weight: 0.0,
        percent_error: false,
    };
    let pipeline = EvaluationPipeline::new(
        Box::new(SyntheticAssignment),
        vec![Box::new(LineTally::new(weights))],
        truth,
    );
    (dir, space, pipeline)
}

#[test]
fn grid_sweep_finds_the_planted_optimum_and_logs_every_leaf() {
    let (dir, space, pipeline) = setup();
    let log = EvaluationLog::new(dir.path().join("evaluation.csv"));

    let mut search = LinearSearch::new(LinearParams { interval: 0.1 }).unwrap();
    let mut eval = |params: &[ParameterDescriptor]| {
        let value = pipeline.evaluate(params)?;
        log.append(0, "local", value, params)?;
        Ok(value)
    };
    let summary = search
        .explore(&space, &mut eval, &NullProgress, &CancelToken::new())
        .unwrap();

    assert_eq!(summary.evaluations, 10);
    assert_eq!(summary.best_fitness, 0.0);
    assert!((summary.best_values[0] - 1.2).abs() < 1e-5);

    let (names, rows) = log.read_all().unwrap();
    assert_eq!(names, vec!["wait"]);
    assert_eq!(rows.len(), 10);
}

#[test]
fn kernel_descent_resumes_from_the_logged_best() {
    let (dir, space, pipeline) = setup();
    let log_path = dir.path().join("evaluation.csv");
    let log = EvaluationLog::new(&log_path);

    // a coarse sweep first, leaving its trail in the log
    let mut search = LinearSearch::new(LinearParams { interval: 0.25 }).unwrap();
    let mut eval = |params: &[ParameterDescriptor]| {
        let value = pipeline.evaluate(params)?;
        log.append(0, "local", value, params)?;
        Ok(value)
    };
    search
        .explore(&space, &mut eval, &NullProgress, &CancelToken::new())
        .unwrap();

    // the descent picks up from the sweep's best row and refines it
    let mut descent = WhiskerDescent::new(KernelParams {
        total_iterations: 15,
        iterations_from_best: 15,
        continue_from_best: true,
        evaluation_file: Some(log_path.display().to_string()),
        volatility_threshold: -1.0,
        momentum_threshold: -1.0,
        step_weight: 0.05,
        ..KernelParams::default()
    })
    .unwrap();
    let (_, sweep_rows) = log.read_all().unwrap();
    let sweep_best = sweep_rows
        .iter()
        .map(|r| r.value)
        .fold(f32::MAX, f32::min);

    let mut eval = |params: &[ParameterDescriptor]| pipeline.evaluate(params);
    let summary = descent
        .explore(&space, &mut eval, &NullProgress, &CancelToken::new())
        .unwrap();

    // resuming can only start from the sweep's best, never worse
    assert!(summary.best_fitness <= sweep_best);
}
