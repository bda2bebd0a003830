use netcal_core::cancel::CancelToken;
use netcal_core::error::{NcResult, NetcalError};
use netcal_core::params::ParameterSpace;
use netcal_core::pipeline::EvaluationPipeline;
use netcal_core::protocol::{
    CompletedUnit, RegisterWorkerRequest, RegisterWorkerResponse, WorkReply, WorkRequest,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{error, info, warn};

const QUEUE_POLL: Duration = Duration::from_millis(200);

#[derive(Clone)]
pub struct WorkerConfig {
    pub host_url: String,
    pub worker_id: String,
    /// Delay between polls while the host has nothing to hand out.
    pub idle_delay: Duration,
    /// Delay before retrying an unreachable host.
    pub retry_delay: Duration,
}

struct Job {
    generation: u32,
    index: usize,
    values: Vec<f32>,
}

/// Register with the host, verifying that the local instruction file matches
/// the host's canonical parameter order. A mismatch means every positional
/// mapping would be wrong, so it is fatal.
async fn register(
    client: &Client,
    config: &WorkerConfig,
    space: &ParameterSpace,
    cancel: &CancelToken,
) -> NcResult<Option<String>> {
    let request = RegisterWorkerRequest {
        worker_id: config.worker_id.clone(),
        hostname: std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".into()),
        cores: std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    };
    loop {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let response = client
            .post(format!("{}/register", config.host_url))
            .json(&request)
            .send()
            .await;
        match response {
            Ok(r) => match r.json::<RegisterWorkerResponse>().await {
                Ok(registered) => {
                    if registered.parameter_names != space.names() {
                        return Err(NetcalError::Config(format!(
                            "the host estimates parameters {:?} but this worker loaded {:?}; \
                             the instruction files differ",
                            registered.parameter_names,
                            space.names()
                        )));
                    }
                    info!(run_id = %&registered.run_id[0..12.min(registered.run_id.len())],
                          "registered with host");
                    return Ok(Some(registered.run_id));
                }
                Err(e) => {
                    warn!("host sent an unreadable registration reply: {}", e);
                }
            },
            Err(_) => {
                warn!(
                    "host unreachable, retrying in {:?}...",
                    config.retry_delay
                );
            }
        }
        tokio::time::sleep(config.retry_delay).await;
    }
}

/// Pulls one job at a time off the queue, evaluates it through the black-box
/// pipeline and pushes the scalar result back to the network task. Runs until
/// the queue closes or the run is cancelled.
async fn evaluation_loop(
    mut job_rx: mpsc::Receiver<Job>,
    result_tx: mpsc::Sender<CompletedUnit>,
    space: ParameterSpace,
    pipeline: Arc<EvaluationPipeline>,
    cancel: CancelToken,
) {
    loop {
        if cancel.is_cancelled() {
            job_rx.close();
            // drain whatever the network task already queued
            while job_rx.try_recv().is_ok() {}
            break;
        }
        match timeout(QUEUE_POLL, job_rx.recv()).await {
            Ok(Some(job)) => {
                let parameters = match space.apply_values(&job.values) {
                    Ok(p) => p,
                    Err(e) => {
                        // a width mismatch can only mean divergent instruction
                        // files; every further assignment would be as broken
                        error!("rejecting malformed assignment: {}", e);
                        cancel.cancel();
                        break;
                    }
                };
                let pipeline = pipeline.clone();
                let evaluated =
                    tokio::task::spawn_blocking(move || pipeline.evaluate(&parameters)).await;
                match evaluated {
                    Ok(Ok(value)) => {
                        info!(
                            generation = job.generation,
                            index = job.index,
                            value,
                            "evaluation complete"
                        );
                        let unit = CompletedUnit {
                            generation: job.generation,
                            index: job.index,
                            value,
                        };
                        if result_tx.send(unit).await.is_err() {
                            break;
                        }
                    }
                    Ok(Err(e)) => {
                        // a broken adapter poisons every further evaluation;
                        // die loudly and let the host reassign the member
                        error!("evaluation failed: {}; shutting the worker down", e);
                        cancel.cancel();
                        break;
                    }
                    Err(e) => {
                        error!("evaluation task panicked: {}", e);
                        cancel.cancel();
                        break;
                    }
                }
            }
            Ok(None) => break,
            Err(_) => {}
        }
    }
}

/// The worker's network half: report the last finished unit, receive the next
/// assignment, queue it, and wait for its result before polling again.
pub async fn run_worker(
    config: WorkerConfig,
    space: ParameterSpace,
    pipeline: Arc<EvaluationPipeline>,
    cancel: CancelToken,
) -> NcResult<()> {
    let client = Client::new();
    info!(worker = %config.worker_id, "connecting to host at {}", config.host_url);

    let Some(run_id) = register(&client, &config, &space, &cancel).await? else {
        return Ok(());
    };

    let (job_tx, job_rx) = mpsc::channel::<Job>(2);
    let (result_tx, mut result_rx) = mpsc::channel::<CompletedUnit>(2);
    let evaluator = tokio::spawn(evaluation_loop(
        job_rx,
        result_tx,
        space.clone(),
        pipeline,
        cancel.clone(),
    ));

    let mut finished: Option<CompletedUnit> = None;
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let request = WorkRequest {
            run_id: run_id.clone(),
            worker_id: config.worker_id.clone(),
            finished: finished.take(),
        };
        let reply = match client
            .post(format!("{}/work", config.host_url))
            .json(&request)
            .send()
            .await
        {
            Ok(r) => r.json::<WorkReply>().await,
            Err(e) => Err(e),
        };
        match reply {
            Ok(WorkReply::Assignment {
                generation,
                index,
                values,
            }) => {
                info!(generation, index, "received assignment");
                if job_tx
                    .send(Job {
                        generation,
                        index,
                        values,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
                // one job in flight at a time: wait for its result so the
                // next poll carries it back to the host
                match result_rx.recv().await {
                    Some(unit) => finished = Some(unit),
                    None => break,
                }
            }
            Ok(WorkReply::Standby) => {
                tokio::time::sleep(config.idle_delay).await;
            }
            Ok(WorkReply::Exit) => {
                info!("host asked this worker to exit");
                break;
            }
            Err(e) => {
                warn!("host unreachable ({}), retrying in {:?}", e, config.retry_delay);
                // do not lose an unreported result over a transient fault
                finished = request.finished;
                tokio::time::sleep(config.retry_delay).await;
            }
        }
    }

    drop(job_tx);
    let _ = evaluator.await;
    info!(worker = %config.worker_id, "worker stopped");
    Ok(())
}
