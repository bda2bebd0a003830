use clap::{Parser, Subcommand};
use std::process;
use tracing::error;

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about = "Transit network parameter estimation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a local single-process estimation against an external assignment command.
    Run(cmd::run::RunArgs),
    /// Show the best rows of an evaluation log.
    Best(cmd::best::BestArgs),
    /// Check the instruction, truth and alias files without running anything.
    Validate(cmd::validate::ValidateArgs),
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => cmd::run::execute(args),
        Commands::Best(args) => cmd::best::execute(args),
        Commands::Validate(args) => cmd::validate::execute(args),
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}
