//! Monitoring Sessions
//!
//! Owns everything that lives across detection ticks: the alertness state
//! machine, session statistics and the timers that drive them.

mod feed;
mod monitor;
mod session;
mod stats;

pub use feed::FrameFeed;
pub use monitor::{DetectionMonitor, MonitorSettings};
pub use session::{Session, SessionSnapshot, TickOutcome};
pub use stats::{SessionAggregator, SessionStats};

use thiserror::Error;

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Input not ready: {0}")]
    InputUnavailable(String),
    #[error("Session already running")]
    AlreadyRunning,
    #[error("No session running")]
    NotRunning,
}
