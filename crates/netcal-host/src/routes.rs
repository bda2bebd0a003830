use crate::error::AppResult;
use crate::state::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use netcal_core::protocol::{
    RegisterWorkerRequest, RegisterWorkerResponse, StatusResponse, WorkReply, WorkRequest,
};
use serde_json::json;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/work", post(work))
        .route("/status", get(status))
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterWorkerRequest>,
) -> AppResult<Json<RegisterWorkerResponse>> {
    if payload.worker_id.is_empty() {
        return Err(crate::error::AppError::Validation(
            "a worker id is required".into(),
        ));
    }
    Ok(Json(state.coordinator.register(&payload)))
}

/// The single exchange of the work protocol: the worker reports what it
/// finished (possibly nothing) and receives its next move.
async fn work(
    State(state): State<AppState>,
    Json(payload): Json<WorkRequest>,
) -> AppResult<Json<WorkReply>> {
    Ok(Json(state.coordinator.handle_work(&payload)))
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status: StatusResponse = state.coordinator.status();
    let phase = state.coordinator.phase();
    Json(json!({
        "phase": phase.as_str(),
        "generation": status.generation,
        "total_generations": status.total_generations,
        "processed": status.processed,
        "population_size": status.population_size,
        "connected_workers": status.connected_workers,
        "best_fitness": status.best_fitness,
    }))
}
