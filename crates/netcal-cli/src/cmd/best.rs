use crate::reports;
use clap::Args;
use netcal_core::evallog::EvaluationLog;
use netcal_core::population::compare_fitness;
use netcal_core::{NcResult, NetcalError};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct BestArgs {
    /// Evaluation log to inspect.
    #[arg(long, default_value = "evaluation.csv")]
    pub log: PathBuf,

    /// Number of rows to show.
    #[arg(short = 'n', long, default_value_t = 10)]
    pub count: usize,
}

pub fn execute(args: BestArgs) -> NcResult<()> {
    if !args.log.exists() {
        return Err(NetcalError::Config(format!(
            "evaluation log '{}' does not exist",
            args.log.display()
        )));
    }
    let log = EvaluationLog::new(&args.log);
    let (names, mut rows) = log.read_all()?;
    if rows.is_empty() {
        println!("The log contains no evaluations yet.");
        return Ok(());
    }
    rows.sort_by(|a, b| compare_fitness(a.value, b.value));
    rows.truncate(args.count);

    println!("{}", reports::best_table(&names, &rows));
    Ok(())
}
