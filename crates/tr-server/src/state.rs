use std::sync::Arc;

use tr_engine::TrellisEngine;

/// Shared application state.
pub struct AppState {
    pub engine: Arc<TrellisEngine>,
}

impl AppState {
    pub fn new(engine: Arc<TrellisEngine>) -> Self {
        Self { engine }
    }
}
