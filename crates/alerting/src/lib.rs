//! Alerting System
//!
//! Decides which alerts a state transition raises and delivers them through
//! injected audio and notification capabilities.

mod policy;

pub use policy::{AlertAction, AlertConfig, AlertPolicy, AudioPlayer, Notifier, Toast, ToastVariant};

use thiserror::Error;

/// Alert delivery errors
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Audio playback failed: {0}")]
    Audio(String),
}
