use super::seeding::seed_kernel;
use super::{Exploration, ExplorationSummary};
use crate::cancel::{CancelToken, ProgressSink};
use crate::config::KernelParams;
use crate::error::{NcResult, NetcalError};
use crate::params::{ParameterDescriptor, ParameterSpace};
use itertools::Itertools;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::{debug, info};

const PROBES: usize = 4;

/// Four-probe whisker descent: each dimension is probed at `±w` and `±2w`
/// fractions of its range, the single-sided gradient averages steer the move,
/// and per-dimension momentum plus gradient volatility drive early
/// termination once the search has stalled.
#[derive(Debug)]
pub struct WhiskerDescent {
    params: KernelParams,
    explorations: u64,
}

impl WhiskerDescent {
    pub fn new(params: KernelParams) -> NcResult<Self> {
        if !(0.0..1.0).contains(&params.momentum_residual) {
            return Err(NetcalError::Config(
                "the momentum residual must be at least 0 and less than 1".into(),
            ));
        }
        if params.percentage_step_cap <= 0.0 {
            return Err(NetcalError::Config(
                "the percentage step cap must be positive".into(),
            ));
        }
        Ok(Self {
            params,
            explorations: 0,
        })
    }

    fn whisker_offsets(&self) -> [f32; PROBES] {
        let w = self.params.whisker_length;
        [-2.0 * w, -w, w, 2.0 * w]
    }

    fn trace_volatility(&self, volatility: &[f32]) -> NcResult<()> {
        let Some(path) = &self.params.volatility_trace else {
            return Ok(());
        };
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", volatility.iter().join(","))?;
        Ok(())
    }
}

impl Exploration for WhiskerDescent {
    fn label(&self) -> &'static str {
        "kernel"
    }

    fn explore(
        &mut self,
        space: &ParameterSpace,
        eval: &mut dyn FnMut(&[ParameterDescriptor]) -> NcResult<f32>,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> NcResult<ExplorationSummary> {
        self.explorations += 1;
        let mut rng = fastrand::Rng::with_seed(self.explorations * self.params.random_seed);

        let dimensions = space.len();
        let mut kernel = space.descriptors().to_vec();
        seed_kernel(
            &mut kernel,
            &mut rng,
            self.params.continue_from_best,
            self.params.evaluation_file.as_deref(),
            self.params.initial_values.as_deref(),
        )?;

        let mut momentum = vec![0.0f32; dimensions];
        let mut volatility = vec![0.0f32; dimensions];
        let mut gradients = vec![[0.0f32; PROBES]; dimensions];

        let mut best_so_far = f32::MAX;
        let mut best_values = kernel.iter().map(|d| d.current).collect::<Vec<_>>();
        let mut iterations_since_best = 0usize;
        let mut evaluations = 0usize;
        let mut early_stopped = false;
        let total = self.params.total_iterations;

        'iterations: for iteration in 0..total {
            if cancel.is_cancelled() {
                break;
            }
            let kernel_error = eval(&kernel)?;
            evaluations += 1;
            if kernel_error < best_so_far {
                best_so_far = kernel_error;
                best_values = kernel.iter().map(|d| d.current).collect();
                iterations_since_best = 0;
            } else {
                iterations_since_best += 1;
                if iterations_since_best > self.params.iterations_from_best {
                    info!(iteration, "no improvement over best, stopping descent");
                    early_stopped = true;
                    break;
                }
            }

            // probe every dimension on both sides
            for i in 0..dimensions {
                for (k, offset) in self.whisker_offsets().iter().enumerate() {
                    if cancel.is_cancelled() {
                        break 'iterations;
                    }
                    let mut probe = kernel.clone();
                    probe[i].current += probe[i].range() * offset;
                    probe[i].clamp();
                    let error = eval(&probe)?;
                    evaluations += 1;
                    gradients[i][k] = error - kernel_error;

                    let fraction = iteration as f32 / total as f32
                        + (1.0 / total as f32)
                            * ((i * PROBES + k) as f32 / (dimensions * PROBES) as f32);
                    if !progress.on_progress(iteration, fraction, best_so_far) {
                        early_stopped = true;
                        break 'iterations;
                    }
                }
            }

            // volatility per dimension: mean absolute deviation of the four
            // gradient samples around their mean
            for i in 0..dimensions {
                let mean = gradients[i].iter().sum::<f32>() / PROBES as f32;
                volatility[i] = gradients[i].iter().map(|g| (g - mean).abs()).sum();
            }
            self.trace_volatility(&volatility)?;

            let total_volatility: f32 = volatility.iter().sum();
            let total_momentum: f32 = momentum.iter().map(|m| m.abs()).sum();
            if total_volatility < self.params.volatility_threshold
                && total_momentum < self.params.momentum_threshold
            {
                debug!(
                    total_volatility,
                    total_momentum, "volatility and momentum exhausted, stopping descent"
                );
                early_stopped = true;
                break;
            }

            // one shared random weight per iteration
            let random_weight = rng.f32() * self.params.step_weight;
            let cap = self.params.percentage_step_cap;
            for i in 0..dimensions {
                let increasing = (gradients[i][3] + gradients[i][2]) / 2.0;
                let decreasing = (gradients[i][1] + gradients[i][0]) / 2.0;
                // move opposite the larger-magnitude side; the smaller side
                // marks the preferred direction
                let mut change = random_weight
                    * (if increasing < decreasing {
                        increasing.abs()
                    } else {
                        -decreasing.abs()
                    });
                change += momentum[i] * self.params.momentum_residual;
                change = change.clamp(-cap, cap);
                momentum[i] = change;
                kernel[i].current += change;
                if kernel[i].current < kernel[i].start {
                    kernel[i].current = kernel[i].start;
                    momentum[i] = 0.0;
                } else if kernel[i].current > kernel[i].stop {
                    kernel[i].current = kernel[i].stop;
                    momentum[i] = 0.0;
                }
            }
        }

        Ok(ExplorationSummary {
            best_fitness: best_so_far,
            best_values,
            evaluations,
            early_stopped,
        })
    }
}
