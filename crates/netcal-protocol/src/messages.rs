use serde::{Deserialize, Serialize};

/// Opaque identifier a worker generates once at startup (`worker-<uuid prefix>`).
pub type WorkerId = String;

/// One finished evaluation, reported back to the host.
///
/// `generation` is echoed so the host can discard results that belong to a
/// generation that has already closed: the transport may deliver late or
/// deliver twice, and a stale unit must never touch the current population.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct CompletedUnit {
    pub generation: u32,
    pub index: usize,
    pub value: f32,
}

/// Worker -> host poll. `finished: None` is first contact ("I have no
/// previous index"); otherwise it carries the unit the worker just evaluated.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WorkRequest {
    pub run_id: String,
    pub worker_id: WorkerId,
    pub finished: Option<CompletedUnit>,
}

/// Host -> worker reply to a `WorkRequest`.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum WorkReply {
    /// Evaluate this parameter vector and report back.
    Assignment {
        generation: u32,
        index: usize,
        values: Vec<f32>,
    },
    /// Nothing to hand out right now; re-poll after the idle delay.
    Standby,
    /// The run is over (or the worker's run id is stale). Shut down.
    Exit,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegisterWorkerRequest {
    pub worker_id: WorkerId,
    pub hostname: String,
    pub cores: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegisterWorkerResponse {
    pub run_id: String,
    /// Canonical parameter order; workers cross-check their local instruction
    /// file against this before accepting work.
    pub parameter_names: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StatusResponse {
    pub generation: u32,
    pub total_generations: u32,
    pub processed: usize,
    pub population_size: usize,
    pub connected_workers: usize,
    pub best_fitness: Option<f32>,
}
