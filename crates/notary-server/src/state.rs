use std::sync::Arc;
use std::time::Instant;

use notary_engine::AnchorEngine;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AnchorEngine>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: Arc<AnchorEngine>) -> Self {
        Self {
            engine,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
