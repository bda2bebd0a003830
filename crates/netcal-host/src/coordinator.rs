use netcal_core::cancel::CancelToken;
use netcal_core::evallog::EvaluationLog;
use netcal_core::params::ParameterSpace;
use netcal_core::population::ParameterSet;
use netcal_core::protocol::{
    CompletedUnit, RegisterWorkerRequest, RegisterWorkerResponse, StatusResponse, WorkReply,
    WorkRequest, WorkerId,
};
use netcal_core::strategy::PopulationStrategy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    GeneratingPopulation,
    DispatchingGeneration,
    AwaitingResults,
    Done,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::GeneratingPopulation => "generating-population",
            Phase::DispatchingGeneration => "dispatching-generation",
            Phase::AwaitingResults => "awaiting-results",
            Phase::Done => "done",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Poll timeout of the results loop and the dispatch loop.
    pub poll_timeout: Duration,
    /// Re-signal the generation if no result lands for this long.
    pub stuck_after: Duration,
    /// A worker silent for this long is treated as disconnected.
    pub worker_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(200),
            stuck_after: Duration::from_secs(120),
            worker_timeout: Duration::from_secs(120),
        }
    }
}

pub struct WorkerEntry {
    pub hostname: String,
    pub cores: usize,
    pub last_seen: Instant,
}

/// All mutable coordinator state lives behind this one lock: the population
/// members with their flags, the generation counter, and the worker registry.
/// Every read-modify-write sequence takes the lock once, start to finish.
pub struct Roster {
    pub population: Vec<ParameterSet>,
    pub generation: u32,
    pub processed: usize,
    /// Set while a generation is open for dispatch; cleared while the next
    /// population is being bred so no stale member leaks out.
    pub accepting: bool,
    pub phase: Phase,
    pub workers: HashMap<WorkerId, WorkerEntry>,
    pub best_fitness: Option<f32>,
}

struct ResultMessage {
    worker: WorkerId,
    unit: CompletedUnit,
}

/// Shared half of the coordinator: the HTTP handlers talk to this, the
/// generation driver owns the receiving ends of the channels.
pub struct CoordinatorShared {
    roster: Mutex<Roster>,
    results_tx: mpsc::Sender<ResultMessage>,
    start_tx: mpsc::Sender<()>,
    pub cancel: CancelToken,
    pub run_id: String,
    pub space: ParameterSpace,
    pub total_generations: u32,
}

impl CoordinatorShared {
    fn roster(&self) -> MutexGuard<'_, Roster> {
        self.roster.lock().expect("coordinator roster lock poisoned")
    }

    pub fn register(&self, req: &RegisterWorkerRequest) -> RegisterWorkerResponse {
        let mut roster = self.roster();
        info!(worker = %req.worker_id, hostname = %req.hostname, "worker connected");
        roster.workers.insert(
            req.worker_id.clone(),
            WorkerEntry {
                hostname: req.hostname.clone(),
                cores: req.cores,
                last_seen: Instant::now(),
            },
        );
        RegisterWorkerResponse {
            run_id: self.run_id.clone(),
            parameter_names: self.space.names(),
        }
    }

    /// The receive path of the protocol: record a finished unit (if it still
    /// belongs to the current generation) and hand the worker its next
    /// assignment in the same exchange.
    pub fn handle_work(&self, req: &WorkRequest) -> WorkReply {
        if self.cancel.is_cancelled() {
            return WorkReply::Exit;
        }
        if req.run_id != self.run_id {
            warn!(worker = %req.worker_id, "request for a different run, sending exit");
            return WorkReply::Exit;
        }

        let mut fresh_result = None;
        let reply;
        {
            let mut roster = self.roster();
            roster
                .workers
                .entry(req.worker_id.clone())
                .or_insert_with(|| WorkerEntry {
                    hostname: String::from("unknown"),
                    cores: 0,
                    last_seen: Instant::now(),
                })
                .last_seen = Instant::now();

            if let Some(unit) = req.finished {
                // results from an earlier generation arrive late or twice
                // through the transport; they must never touch current state
                if unit.generation == roster.generation && unit.index < roster.population.len() {
                    fresh_result = Some(ResultMessage {
                        worker: req.worker_id.clone(),
                        unit,
                    });
                } else {
                    debug!(
                        worker = %req.worker_id,
                        generation = unit.generation,
                        "discarding stale result"
                    );
                }
            }

            reply = if roster.accepting {
                let generation = roster.generation;
                let next = roster
                    .population
                    .iter_mut()
                    .enumerate()
                    .find(|(_, m)| !m.processing);
                match next {
                    Some((index, member)) => {
                        member.processing = true;
                        member.assigned_to = Some(req.worker_id.clone());
                        WorkReply::Assignment {
                            generation,
                            index,
                            values: member.values(),
                        }
                    }
                    None => WorkReply::Standby,
                }
            } else {
                WorkReply::Standby
            };
        }

        if let Some(msg) = fresh_result {
            if self.results_tx.try_send(msg).is_err() {
                // the driver is draining continuously; a full queue means it
                // is gone, and the worker will learn that via Exit
                warn!("results queue unavailable, dropping a unit");
            }
        }
        reply
    }

    /// Disconnect recovery: reclaim the in-flight members of every worker
    /// that has gone silent, and re-signal the generation if nobody else is
    /// still mid-evaluation.
    pub fn reap(&self, worker_timeout: Duration) {
        let mut roster = self.roster();
        let now = Instant::now();
        let dead: Vec<WorkerId> = roster
            .workers
            .iter()
            .filter(|(_, w)| now.duration_since(w.last_seen) > worker_timeout)
            .map(|(id, _)| id.clone())
            .collect();
        if dead.is_empty() {
            return;
        }
        for id in &dead {
            warn!(worker = %id, "worker timed out, reclaiming its assignments");
            roster.workers.remove(id);
        }
        let mut others_still_processing = false;
        for member in roster.population.iter_mut() {
            if member.processed || !member.processing {
                continue;
            }
            let held_by_dead = member
                .assigned_to
                .as_ref()
                .is_some_and(|w| dead.contains(w));
            if held_by_dead {
                member.processing = false;
                member.assigned_to = None;
            } else {
                others_still_processing = true;
            }
        }
        if !others_still_processing {
            let _ = self.start_tx.try_send(());
        }
    }

    pub fn status(&self) -> StatusResponse {
        let roster = self.roster();
        StatusResponse {
            generation: roster.generation,
            total_generations: self.total_generations,
            processed: roster.processed,
            population_size: roster.population.len(),
            connected_workers: roster.workers.len(),
            best_fitness: roster.best_fitness,
        }
    }

    pub fn phase(&self) -> Phase {
        self.roster().phase
    }
}

/// The generation driver. Owns the strategy, the evaluation log and the
/// receiving end of the results channel.
pub struct Coordinator {
    pub shared: Arc<CoordinatorShared>,
    config: CoordinatorConfig,
    strategy: Box<dyn PopulationStrategy>,
    log: EvaluationLog,
    results_rx: mpsc::Receiver<ResultMessage>,
    start_rx: Option<mpsc::Receiver<()>>,
}

impl Coordinator {
    pub fn new(
        space: ParameterSpace,
        strategy: Box<dyn PopulationStrategy>,
        log: EvaluationLog,
        run_id: String,
        config: CoordinatorConfig,
    ) -> Self {
        let (results_tx, results_rx) = mpsc::channel(256);
        let (start_tx, start_rx) = mpsc::channel(8);
        let total_generations = strategy.total_generations();
        let shared = Arc::new(CoordinatorShared {
            roster: Mutex::new(Roster {
                population: Vec::new(),
                generation: 0,
                processed: 0,
                accepting: false,
                phase: Phase::Idle,
                workers: HashMap::new(),
                best_fitness: None,
            }),
            results_tx,
            start_tx,
            cancel: CancelToken::new(),
            run_id,
            space,
            total_generations,
        });
        Self {
            shared,
            config,
            strategy,
            log,
            results_rx,
            start_rx: Some(start_rx),
        }
    }

    /// Spawn the dispatch loop and the reaper. Call once, before `run`.
    pub fn spawn_background_tasks(&mut self) {
        let start_rx = self
            .start_rx
            .take()
            .expect("background tasks already spawned");
        tokio::spawn(dispatch_loop(
            self.shared.clone(),
            start_rx,
            self.config.poll_timeout,
        ));
        tokio::spawn(reaper_loop(self.shared.clone(), self.config.worker_timeout));
    }

    /// Drive every generation to completion. Returns when the final
    /// generation has been processed or the run was cancelled.
    pub async fn run(&mut self) -> netcal_core::NcResult<()> {
        let shared = self.shared.clone();
        let total = self.shared.total_generations;

        {
            let mut roster = shared.roster();
            roster.phase = Phase::GeneratingPopulation;
        }
        let initial = self.strategy.initial_population(&shared.space);
        let population_size = initial.len();
        {
            let mut roster = shared.roster();
            roster.population = initial;
        }

        for generation in 0..total {
            if shared.cancel.is_cancelled() {
                break;
            }
            {
                let mut roster = shared.roster();
                roster.generation = generation;
                roster.processed = 0;
                roster.phase = Phase::DispatchingGeneration;
            }
            if self.shared.start_tx.send(()).await.is_err() {
                break;
            }
            info!(generation, total, "generation started");

            {
                let mut roster = shared.roster();
                roster.phase = Phase::AwaitingResults;
            }
            let mut processed = 0usize;
            let mut last_result = Instant::now();
            while processed < population_size {
                if shared.cancel.is_cancelled() {
                    return Ok(());
                }
                match timeout(self.config.poll_timeout, self.results_rx.recv()).await {
                    Ok(Some(msg)) => {
                        let recorded = {
                            let mut roster = shared.roster();
                            // the generation may have rolled between the
                            // receive path and here; re-check before applying
                            if msg.unit.generation != roster.generation {
                                None
                            } else {
                                let best = roster.best_fitness;
                                let member = &mut roster.population[msg.unit.index];
                                if member.processed {
                                    None
                                } else {
                                    member.fitness = msg.unit.value;
                                    member.processed = true;
                                    let snapshot = member.parameters.clone();
                                    roster.processed += 1;
                                    if best.is_none_or(|b| msg.unit.value < b) {
                                        roster.best_fitness = Some(msg.unit.value);
                                    }
                                    Some(snapshot)
                                }
                            }
                        };
                        if let Some(parameters) = recorded {
                            self.log.append(
                                generation,
                                &msg.worker,
                                msg.unit.value,
                                &parameters,
                            )?;
                            processed += 1;
                            last_result = Instant::now();
                        }
                    }
                    Ok(None) => return Ok(()),
                    Err(_) => {
                        if last_result.elapsed() > self.config.stuck_after {
                            warn!(
                                generation,
                                "no results processed for {:?}, re-signalling workers",
                                self.config.stuck_after
                            );
                            let _ = self.shared.start_tx.try_send(());
                            last_result = Instant::now();
                        }
                    }
                }
            }
            info!(generation, "generation complete");

            // close dispatch before touching the population
            {
                let mut roster = shared.roster();
                roster.accepting = false;
                roster.phase = Phase::GeneratingPopulation;
            }
            if generation + 1 < total {
                let previous = {
                    let mut roster = shared.roster();
                    std::mem::take(&mut roster.population)
                };
                let next = self.strategy.next_generation(previous, &shared.space);
                let mut roster = shared.roster();
                roster.population = next;
            }
        }

        {
            let mut roster = shared.roster();
            roster.phase = Phase::Done;
            roster.accepting = false;
        }
        // every worker poll from here on is answered with Exit
        shared.cancel.cancel();
        info!("estimation run finished");
        Ok(())
    }
}

/// Polls the start-generation channel; a signal (re-)opens the current
/// generation for dispatch. Workers pull their assignments in, so "open"
/// is all the broadcast needs to mean.
async fn dispatch_loop(
    shared: Arc<CoordinatorShared>,
    mut start_rx: mpsc::Receiver<()>,
    poll: Duration,
) {
    while !shared.cancel.is_cancelled() {
        match timeout(poll, start_rx.recv()).await {
            Ok(Some(())) => {
                let mut roster = shared.roster();
                // a signal left over from the previous generation must not
                // re-open dispatch while the population is being rebuilt:
                // an assignment taken in that window would carry the old
                // generation tag and its member could never complete
                if matches!(roster.phase, Phase::GeneratingPopulation | Phase::Done) {
                    debug!("ignoring start signal while the population is rebuilt");
                    continue;
                }
                roster.accepting = true;
                info!(
                    generation = roster.generation,
                    workers = roster.workers.len(),
                    "dispatching generation to connected workers"
                );
            }
            Ok(None) => break,
            Err(_) => {}
        }
    }
}

async fn reaper_loop(shared: Arc<CoordinatorShared>, worker_timeout: Duration) {
    let mut ticker = tokio::time::interval(worker_timeout / 2);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if shared.cancel.is_cancelled() {
            break;
        }
        shared.reap(worker_timeout);
    }
}
