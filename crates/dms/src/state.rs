//! Alertness state tracking

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::indicators::{EyeStatus, Indicators, MouthStatus, SleepStatus};

/// Alertness state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertnessState {
    /// No session running
    #[default]
    Inactive,
    Awake,
    Drowsy,
    Sleeping,
}

impl AlertnessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertnessState::Inactive => "inactive",
            AlertnessState::Awake => "awake",
            AlertnessState::Drowsy => "drowsy",
            AlertnessState::Sleeping => "sleeping",
        }
    }

    /// User-facing status line
    pub fn description(&self) -> &'static str {
        match self {
            AlertnessState::Inactive => "Start detection to monitor drowsiness.",
            AlertnessState::Awake => "You are alert and focused.",
            AlertnessState::Drowsy => "Warning: You are showing signs of drowsiness!",
            AlertnessState::Sleeping => "Alert: You appear to be falling asleep!",
        }
    }
}

impl std::fmt::Display for AlertnessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State the indicators call for, before smoothing.
///
/// Closed eyes (or slept) dominate: they go straight to `Sleeping`. A yawn
/// alone only reaches `Drowsy`.
pub fn target_state(indicators: &Indicators) -> AlertnessState {
    if indicators.sleep_status == SleepStatus::Slept || indicators.eye_status == EyeStatus::Closed {
        AlertnessState::Sleeping
    } else if indicators.mouth_status == MouthStatus::Yawning {
        AlertnessState::Drowsy
    } else {
        AlertnessState::Awake
    }
}

/// One evaluation of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub previous: AlertnessState,
    pub current: AlertnessState,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }

    /// True when this transition enters `state` from a different one
    pub fn entered(&self, state: AlertnessState) -> bool {
        self.changed() && self.current == state
    }
}

/// Tick-driven alertness state machine.
///
/// With `smoothing_ticks = 1` every tick's classification is applied
/// immediately. With N > 1 a new state must be produced N ticks in a row
/// before it is adopted.
#[derive(Debug, Clone)]
pub struct AlertnessStateMachine {
    state: AlertnessState,
    smoothing_ticks: u32,
    /// Candidate state and how many consecutive ticks produced it
    pending: Option<(AlertnessState, u32)>,
}

impl Default for AlertnessStateMachine {
    fn default() -> Self {
        Self::new(1)
    }
}

impl AlertnessStateMachine {
    pub fn new(smoothing_ticks: u32) -> Self {
        Self {
            state: AlertnessState::Inactive,
            smoothing_ticks: smoothing_ticks.max(1),
            pending: None,
        }
    }

    pub fn state(&self) -> AlertnessState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != AlertnessState::Inactive
    }

    pub fn smoothing_ticks(&self) -> u32 {
        self.smoothing_ticks
    }

    /// Session start: force `Awake`
    pub fn start(&mut self) -> Transition {
        self.pending = None;
        self.set(AlertnessState::Awake)
    }

    /// Session stop: force `Inactive`
    pub fn stop(&mut self) -> Transition {
        self.pending = None;
        self.set(AlertnessState::Inactive)
    }

    /// Apply one tick's indicators. Ignored while inactive.
    pub fn on_tick(&mut self, indicators: &Indicators) -> Transition {
        if !self.is_active() {
            debug!("Tick ignored: state machine inactive");
            return Transition {
                previous: self.state,
                current: self.state,
            };
        }

        let candidate = target_state(indicators);
        if candidate == self.state {
            self.pending = None;
            return Transition {
                previous: self.state,
                current: self.state,
            };
        }

        let count = match self.pending {
            Some((pending, n)) if pending == candidate => n + 1,
            _ => 1,
        };

        if count >= self.smoothing_ticks {
            self.pending = None;
            self.set(candidate)
        } else {
            debug!("Pending {} ({}/{})", candidate, count, self.smoothing_ticks);
            self.pending = Some((candidate, count));
            Transition {
                previous: self.state,
                current: self.state,
            }
        }
    }

    fn set(&mut self, next: AlertnessState) -> Transition {
        let transition = Transition {
            previous: self.state,
            current: next,
        };
        if transition.changed() {
            info!("Alertness state: {} -> {}", transition.previous, transition.current);
        }
        self.state = next;
        transition
    }
}
