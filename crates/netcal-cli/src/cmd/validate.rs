use clap::Args;
use netcal_core::params::ParameterSpace;
use netcal_core::transit;
use netcal_core::NcResult;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[arg(long, default_value = "instructions.json")]
    pub instructions: PathBuf,

    #[arg(long, default_value = "truth.csv")]
    pub truth: PathBuf,

    #[arg(long)]
    pub alias_map: Option<PathBuf>,
}

/// Surface the fatal startup errors (malformed instructions, duplicate truth
/// lines, unmapped aliases) before a long run is attempted.
pub fn execute(args: ValidateArgs) -> NcResult<()> {
    let space = ParameterSpace::load(&args.instructions)?;
    info!(
        dimensions = space.len(),
        "instruction file is well-formed"
    );
    for d in space.descriptors() {
        info!(
            "  {} -> slot {} in [{}, {}]",
            d.name, d.slot, d.start, d.stop
        );
    }

    let mut truth = transit::load_truth(&args.truth)?;
    info!(lines = truth.len(), "ground truth is well-formed");

    if let Some(map) = &args.alias_map {
        transit::apply_alias_map(&mut truth, map)?;
        let aliases: usize = truth.iter().map(|t| t.ids.len()).sum();
        info!(aliases, "alias map covers every truth line");
    }

    println!("All inputs validated.");
    Ok(())
}
