use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag, polled at loop heads and after each leaf
/// evaluation in the recursive strategies. Cloning shares the flag.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Receives progress from a running exploration. Return `false` to stop.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, iteration: usize, fraction: f32, best: f32) -> bool;
}

/// Sink that swallows progress, for tests and fire-and-forget runs.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_progress(&self, _iteration: usize, _fraction: f32, _best: f32) -> bool {
        true
    }
}
