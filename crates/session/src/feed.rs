//! Latest-frame feed between the landmark provider and detection ticks

use std::sync::Arc;

use dms::Observation;
use tokio::sync::watch;
use tracing::debug;

/// Holds the most recent observation. Producers overwrite, ticks read.
#[derive(Debug, Clone)]
pub struct FrameFeed {
    tx: Arc<watch::Sender<Option<Observation>>>,
}

impl FrameFeed {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the latest observation
    pub fn publish(&self, observation: Observation) {
        debug!("Frame published at {}", observation.captured_at);
        self.tx.send_replace(Some(observation));
    }

    /// Drop the current frame (source lost)
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    /// Whether a frame has been published and not cleared
    pub fn is_ready(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Copy of the latest observation
    pub fn latest(&self) -> Option<Observation> {
        self.tx.borrow().clone()
    }
}

impl Default for FrameFeed {
    fn default() -> Self {
        Self::new()
    }
}
