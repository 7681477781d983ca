//! Driver Monitoring System (DMS)
//!
//! Alertness classification from facial landmarks:
//! - Eye/mouth/sleep indicators from EAR, MAR and head angle
//! - Tick-driven alertness state machine (awake, drowsy, sleeping)
//! - Pluggable indicator sources (local geometry or remote classifier)

pub mod config;
pub mod indicators;
pub mod source;
pub mod state;

pub use config::{DmsConfig, RemoteConfig, SourceKind, Thresholds};
pub use indicators::{classify, EyeStatus, Indicators, MouthStatus, SleepStatus};
pub use source::{
    build_source, Classification, IndicatorSource, LocalGeometric, Observation, RemoteClassifier,
    RemoteResponse,
};
pub use state::{target_state, AlertnessState, AlertnessStateMachine, Transition};

use feature_engine::FeatureError;
use thiserror::Error;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Input unavailable: {0}")]
    InputUnavailable(String),

    #[error("Feature extraction failed: {0}")]
    Features(#[from] FeatureError),

    #[error("Remote classifier error: {0}")]
    Remote(String),

    #[error("Remote classifier timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid classifier response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
