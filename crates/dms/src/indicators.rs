//! Per-frame indicator classification

use feature_engine::FeatureSet;
use serde::{Deserialize, Serialize};

use crate::config::Thresholds;

/// Eye status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EyeStatus {
    Open,
    Closed,
}

/// Mouth status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouthStatus {
    Yawning,
    #[serde(rename = "Not Yawning")]
    NotYawning,
}

/// Sleep status (closed eyes with a tilted head)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SleepStatus {
    Slept,
    #[serde(rename = "Not Slept")]
    NotSlept,
}

/// Discrete indicators for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicators {
    pub eye_status: EyeStatus,
    pub mouth_status: MouthStatus,
    pub sleep_status: SleepStatus,
}

impl Indicators {
    /// Eyes closed or yawning
    pub fn is_drowsy(&self) -> bool {
        self.eye_status == EyeStatus::Closed || self.mouth_status == MouthStatus::Yawning
    }
}

/// Threshold a feature set into indicators. Pure.
pub fn classify(features: &FeatureSet, thresholds: &Thresholds) -> Indicators {
    let eye_status = if features.ear < thresholds.ear {
        EyeStatus::Closed
    } else {
        EyeStatus::Open
    };

    let mouth_status = if features.mar > thresholds.mar {
        MouthStatus::Yawning
    } else {
        MouthStatus::NotYawning
    };

    // An unavailable head angle never counts as tilted
    let tilted = features
        .head_angle
        .value()
        .map_or(false, |deg| deg > thresholds.head_tilt_deg);

    let sleep_status = if eye_status == EyeStatus::Closed && tilted {
        SleepStatus::Slept
    } else {
        SleepStatus::NotSlept
    };

    Indicators {
        eye_status,
        mouth_status,
        sleep_status,
    }
}
