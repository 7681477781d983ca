//! Detection record types

use chrono::{DateTime, Utc};
use dms::AlertnessState;
use serde::{Deserialize, Serialize};

use crate::StorageError;

/// Persisted alertness status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStatus {
    Awake,
    Drowsy,
    Sleeping,
}

impl TryFrom<AlertnessState> for DetectionStatus {
    type Error = StorageError;

    fn try_from(state: AlertnessState) -> Result<Self, Self::Error> {
        match state {
            AlertnessState::Awake => Ok(DetectionStatus::Awake),
            AlertnessState::Drowsy => Ok(DetectionStatus::Drowsy),
            AlertnessState::Sleeping => Ok(DetectionStatus::Sleeping),
            AlertnessState::Inactive => Err(StorageError::InactiveStatus),
        }
    }
}

/// One tick's detection result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub status: DetectionStatus,
    pub timestamp: DateTime<Utc>,
}

impl DetectionRecord {
    pub fn new(status: DetectionStatus, timestamp: DateTime<Utc>) -> Self {
        Self { status, timestamp }
    }
}
