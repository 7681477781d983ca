//! Repository Implementation

use crate::{DetectionRecord, DetectionStatus, DetectionStore, StorageError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{debug, info};

/// In-memory detection log
pub struct Repository {
    records: Mutex<VecDeque<DetectionRecord>>,
    /// Max records kept; oldest are dropped first
    max_records: usize,
}

impl Repository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    pub fn with_capacity(max_records: usize) -> Self {
        info!("Creating in-memory detection repository (max {} records)", max_records);
        Self {
            records: Mutex::new(VecDeque::with_capacity(max_records.min(1024))),
            max_records: max_records.max(1),
        }
    }

    /// Insert a detection record
    pub fn insert(&self, record: DetectionRecord) -> Result<(), StorageError> {
        let mut records = self.records.lock().map_err(|e| {
            StorageError::DatabaseError(format!("Lock error: {}", e))
        })?;

        while records.len() >= self.max_records {
            records.pop_front();
        }

        debug!("Stored detection {:?} at {}", record.status, record.timestamp);
        records.push_back(record);
        Ok(())
    }

    /// Most recent records, newest first
    pub fn recent(&self, limit: usize) -> Result<Vec<DetectionRecord>, StorageError> {
        let records = self.records.lock().map_err(|e| {
            StorageError::DatabaseError(format!("Lock error: {}", e))
        })?;

        Ok(records.iter().rev().take(limit).cloned().collect())
    }

    /// Number of stored records with the given status
    pub fn count_status(&self, status: DetectionStatus) -> usize {
        self.records
            .lock()
            .map(|r| r.iter().filter(|rec| rec.status == status).count())
            .unwrap_or(0)
    }

    /// Get total record count
    pub fn count(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl Default for Repository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DetectionStore for Repository {
    async fn save_detection(&self, record: DetectionRecord) -> Result<(), StorageError> {
        self.insert(record)
    }
}
