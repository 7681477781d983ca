//! Storage Layer
//!
//! Persistence boundary for per-tick detection records. Saving is
//! fire-and-forget from the pipeline's point of view: callers log failures
//! and move on.

mod http;
mod record;
mod repository;

pub use http::HttpDetectionStore;
pub use record::{DetectionRecord, DetectionStatus};
pub use repository::Repository;

use async_trait::async_trait;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Store rejected record with status {0}")]
    Rejected(u16),
    #[error("Inactive state has no detection status")]
    InactiveStatus,
}

/// Destination for detection records
#[async_trait]
pub trait DetectionStore: Send + Sync {
    async fn save_detection(&self, record: DetectionRecord) -> Result<(), StorageError>;
}
