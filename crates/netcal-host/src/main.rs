use clap::Parser;
use netcal_core::config::GeneticParams;
use netcal_core::evallog::EvaluationLog;
use netcal_core::params::ParameterSpace;
use netcal_core::protocol::RunIdentifier;
use netcal_core::strategy::GeneticStrategy;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

mod coordinator;
mod error;
mod routes;
mod state;

use coordinator::{Coordinator, CoordinatorConfig};
use state::AppState;

#[derive(Parser)]
#[command(about = "Distributed parameter-estimation host")]
struct Args {
    /// Parameter instruction file describing the search space.
    #[arg(long, default_value = "instructions.json")]
    instructions: PathBuf,

    /// Evaluation log receiving one row per processed member.
    #[arg(long, default_value = "evaluation.csv")]
    evaluation_file: PathBuf,

    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Seed for the genetic strategy; omit for a nondeterministic run.
    #[arg(long)]
    seed: Option<u64>,

    /// Seconds without any processed result before workers are re-signalled.
    #[arg(long, default_value_t = 120)]
    stuck_after_secs: u64,

    /// Seconds of silence before a worker counts as disconnected.
    #[arg(long, default_value_t = 120)]
    worker_timeout_secs: u64,

    #[command(flatten)]
    genetic: GeneticParams,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    info!("netcal host is initializing...");

    let space = match ParameterSpace::load(&args.instructions) {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!(
        dimensions = space.len(),
        "loaded parameter instructions from {:?}", args.instructions
    );

    let strategy = match GeneticStrategy::new(args.genetic.clone(), args.seed) {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let run_id = RunIdentifier::from_parts(
        &space.names(),
        &space.bounds(),
        "genetic",
        &args.genetic,
    );
    info!(run_id = %&run_id.hash[0..12], "run identity established");

    let config = CoordinatorConfig {
        poll_timeout: Duration::from_millis(200),
        stuck_after: Duration::from_secs(args.stuck_after_secs),
        worker_timeout: Duration::from_secs(args.worker_timeout_secs),
    };
    let log = EvaluationLog::new(&args.evaluation_file);
    let mut coordinator = Coordinator::new(space, Box::new(strategy), log, run_id.hash, config);
    coordinator.spawn_background_tasks();

    let shared = coordinator.shared.clone();
    let cancel = shared.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("exit requested, cancelling run");
            cancel.cancel();
        }
    });

    let app = routes::router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(shared));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("host listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind host port");
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("server error: {}", e);
        }
    });

    if let Err(e) = coordinator.run().await {
        error!("coordinator failed: {}", e);
    }
    // give connected workers a moment to pick up their Exit replies
    tokio::time::sleep(Duration::from_secs(2)).await;
    server.abort();
}
