use super::{Exploration, ExplorationSummary};
use crate::cancel::{CancelToken, ProgressSink};
use crate::config::LinearParams;
use crate::error::{NcResult, NetcalError};
use crate::params::{ParameterDescriptor, ParameterSpace};

/// Exhaustive depth-first grid search: dimension 0 is fixed, then dimension 1,
/// and so on, with a leaf evaluation once every dimension holds a value.
/// Cancellation is checked after each leaf so a multi-day sweep can be
/// abandoned without losing the evaluations already logged.
pub struct LinearSearch {
    params: LinearParams,
}

struct GridWalk<'a> {
    kernel: Vec<ParameterDescriptor>,
    eval: &'a mut dyn FnMut(&[ParameterDescriptor]) -> NcResult<f32>,
    progress: &'a dyn ProgressSink,
    cancel: &'a CancelToken,
    steps_per_dim: usize,
    total_leaves: usize,
    completed: usize,
    best_fitness: f32,
    best_values: Vec<f32>,
}

impl GridWalk<'_> {
    /// Returns `false` once cancelled; the recursion unwinds without further
    /// evaluations.
    fn descend(&mut self, depth: usize) -> NcResult<bool> {
        if depth == self.kernel.len() {
            let value = (self.eval)(&self.kernel)?;
            self.completed += 1;
            if value < self.best_fitness {
                self.best_fitness = value;
                self.best_values = self.kernel.iter().map(|d| d.current).collect();
            }
            let fraction = self.completed as f32 / self.total_leaves as f32;
            if !self.progress.on_progress(self.completed, fraction, self.best_fitness) {
                return Ok(false);
            }
            return Ok(!self.cancel.is_cancelled());
        }
        for step in 0..self.steps_per_dim {
            let d = &mut self.kernel[depth];
            d.current = d.start + d.range() * (step as f32 / self.steps_per_dim as f32);
            d.clamp();
            if !self.descend(depth + 1)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl LinearSearch {
    pub fn new(params: LinearParams) -> NcResult<Self> {
        if !(params.interval > 0.0 && params.interval <= 1.0) {
            return Err(NetcalError::Config(
                "the grid interval must be in (0, 1]".into(),
            ));
        }
        Ok(Self { params })
    }
}

impl Exploration for LinearSearch {
    fn label(&self) -> &'static str {
        "linear"
    }

    fn explore(
        &mut self,
        space: &ParameterSpace,
        eval: &mut dyn FnMut(&[ParameterDescriptor]) -> NcResult<f32>,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> NcResult<ExplorationSummary> {
        let steps_per_dim = (1.0 / self.params.interval).round() as usize;
        let total_leaves = steps_per_dim.pow(space.len() as u32);
        let mut walk = GridWalk {
            kernel: space.descriptors().to_vec(),
            eval,
            progress,
            cancel,
            steps_per_dim,
            total_leaves,
            completed: 0,
            best_fitness: f32::MAX,
            best_values: space.descriptors().iter().map(|d| d.current).collect(),
        };
        let finished = walk.descend(0)?;
        Ok(ExplorationSummary {
            best_fitness: walk.best_fitness,
            best_values: walk.best_values,
            evaluations: walk.completed,
            early_stopped: !finished,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::NullProgress;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn space() -> ParameterSpace {
        ParameterSpace::new(vec![
            ParameterDescriptor {
                name: "wait".into(),
                slot: 0,
                start: 0.0,
                stop: 1.0,
                current: 0.0,
            },
            ParameterDescriptor {
                name: "walk".into(),
                slot: 1,
                start: -1.0,
                stop: 1.0,
                current: 0.0,
            },
        ])
        .unwrap()
    }

    #[test]
    fn visits_the_full_grid() {
        let space = space();
        let mut search = LinearSearch::new(LinearParams { interval: 0.25 }).unwrap();
        let mut eval = |params: &[ParameterDescriptor]| {
            Ok(params.iter().map(|d| d.current.abs()).sum())
        };
        let summary = search
            .explore(&space, &mut eval, &NullProgress, &CancelToken::new())
            .unwrap();
        // 4 steps per dimension, 2 dimensions
        assert_eq!(summary.evaluations, 16);
        assert!(!summary.early_stopped);
        // the grid contains (0.0, -1.0) .. best leaf is wait=0, walk=0
        assert_eq!(summary.best_fitness, 0.0);
    }

    #[test]
    fn invalid_interval_is_rejected() {
        assert!(LinearSearch::new(LinearParams { interval: 0.0 }).is_err());
        assert!(LinearSearch::new(LinearParams { interval: 1.5 }).is_err());
    }

    #[rstest::rstest]
    #[case(0.5, 4)]
    #[case(0.25, 16)]
    #[case(0.2, 25)]
    fn grid_size_scales_with_interval(#[case] interval: f32, #[case] leaves: usize) {
        let space = space();
        let mut search = LinearSearch::new(LinearParams { interval }).unwrap();
        let mut eval = |_: &[ParameterDescriptor]| Ok(0.0f32);
        let summary = search
            .explore(&space, &mut eval, &NullProgress, &CancelToken::new())
            .unwrap();
        assert_eq!(summary.evaluations, leaves);
    }

    #[test]
    fn cancellation_stops_after_the_current_leaf() {
        let space = space();
        let cancel = CancelToken::new();
        let mut search = LinearSearch::new(LinearParams { interval: 0.1 }).unwrap();
        let count = AtomicUsize::new(0);
        let mut eval = |_: &[ParameterDescriptor]| {
            if count.fetch_add(1, Ordering::Relaxed) == 4 {
                cancel.cancel();
            }
            Ok(1.0f32)
        };
        let summary = search
            .explore(&space, &mut eval, &NullProgress, &cancel)
            .unwrap();
        assert!(summary.early_stopped);
        assert_eq!(summary.evaluations, 5);
    }
}
