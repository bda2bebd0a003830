use crate::coordinator::CoordinatorShared;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<CoordinatorShared>,
}

impl AppState {
    pub fn new(coordinator: Arc<CoordinatorShared>) -> Self {
        Self { coordinator }
    }
}
