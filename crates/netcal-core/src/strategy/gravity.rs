use super::seeding::seed_kernel;
use super::{Exploration, ExplorationSummary};
use crate::cancel::{CancelToken, ProgressSink};
use crate::config::GravityParams;
use crate::error::NcResult;
use crate::params::{ParameterDescriptor, ParameterSpace};

/// Two-probe descent: each dimension is probed at `±w` of its range and the
/// kernel steps toward whichever side sits lower. No momentum, no volatility,
/// no early stopping; it runs its full iteration budget.
pub struct GravityDescent {
    params: GravityParams,
    explorations: u64,
}

impl GravityDescent {
    pub fn new(params: GravityParams) -> Self {
        Self {
            params,
            explorations: 0,
        }
    }
}

impl Exploration for GravityDescent {
    fn label(&self) -> &'static str {
        "gravity"
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

        let mut gradients = vec![[0.0f32; 2]; dimensions];
        let mut best_so_far = f32::MAX;
        let mut best_values = kernel.iter().map(|d| d.current).collect::<Vec<_>>();
        let mut evaluations = 0usize;
        let mut early_stopped = false;
        let total = self.params.total_iterations;

        'iterations: for iteration in 0..total {
            if cancel.is_cancelled() {
                early_stopped = true;
                break;
            }
            let kernel_error = eval(&kernel)?;
            evaluations += 1;
            if kernel_error < best_so_far {
                best_so_far = kernel_error;
                best_values = kernel.iter().map(|d| d.current).collect();
            }

            for i in 0..dimensions {
                for k in 0..2 {
                    if cancel.is_cancelled() {
                        early_stopped = true;
                        break 'iterations;
                    }
                    let offset = if k == 0 {
                        -self.params.whisker_length
                    } else {
                        self.params.whisker_length
                    };
                    let mut probe = kernel.clone();
                    probe[i].current += probe[i].range() * offset;
                    probe[i].clamp();
                    let error = eval(&probe)?;
                    evaluations += 1;
                    gradients[i][k] = error - kernel_error;

                    let fraction = iteration as f32 / total as f32
                        + (1.0 / total as f32) * ((i * 2 + k) as f32 / (dimensions * 2) as f32);
                    if !progress.on_progress(iteration, fraction, best_so_far) {
                        early_stopped = true;
                        break 'iterations;
                    }
                }
            }

            let random_weight = rng.f32() * self.params.step_weight;
            for i in 0..dimensions {
                // step into the side whose probe sits lower
                if gradients[i][1] < gradients[i][0] {
                    kernel[i].current -= random_weight * gradients[i][1];
                } else {
                    kernel[i].current += random_weight * gradients[i][0];
                }
                kernel[i].clamp();
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::NullProgress;

    fn space() -> ParameterSpace {
        ParameterSpace::new(vec![ParameterDescriptor {
            name: "wait".into(),
            slot: 0,
            start: 0.0,
            stop: 4.0,
            current: 0.0,
        }])
        .unwrap()
    }

    #[test]
    fn runs_its_full_iteration_budget() {
        let space = space();
        let mut descent = GravityDescent::new(GravityParams {
            total_iterations: 10,
            ..GravityParams::default()
        });
        let mut eval =
            |params: &[ParameterDescriptor]| Ok((params[0].current - 2.0).powi(2));
        let summary = descent
            .explore(&space, &mut eval, &NullProgress, &CancelToken::new())
            .unwrap();
        assert!(!summary.early_stopped);
        // kernel + 2 probes, 1 dimension, 10 iterations
        assert_eq!(summary.evaluations, 10 * 3);
    }

    #[test]
    fn steps_toward_the_lower_probe() {
        let space = space();
        let mut descent = GravityDescent::new(GravityParams {
            total_iterations: 60,
            step_weight: 0.5,
            random_seed: 99,
            ..GravityParams::default()
        });
        let mut eval =
            |params: &[ParameterDescriptor]| Ok((params[0].current - 2.0).powi(2));
        let summary = descent
            .explore(&space, &mut eval, &NullProgress, &CancelToken::new())
            .unwrap();
        assert!(summary.best_fitness < 0.5);
    }

    #[test]
    fn cancelled_before_start_does_nothing() {
        let space = space();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut descent = GravityDescent::new(GravityParams::default());
        let mut eval = |_: &[ParameterDescriptor]| Ok(1.0f32);
        let summary = descent
            .explore(&space, &mut eval, &NullProgress, &cancel)
            .unwrap();
        assert_eq!(summary.evaluations, 0);
        assert!(summary.early_stopped);
    }
}
