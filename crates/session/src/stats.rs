//! Session statistics

use dms::AlertnessState;
use serde::{Deserialize, Serialize};

/// Counters for one monitoring session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub elapsed_seconds: u64,
    pub drowsy_event_count: u32,
    pub sleep_event_count: u32,
}

impl SessionStats {
    /// Elapsed time as `HH:MM:SS`
    pub fn duration_hms(&self) -> String {
        let s = self.elapsed_seconds;
        format!("{:02}:{:02}:{:02}", s / 3600, (s % 3600) / 60, s % 60)
    }
}

/// Accumulates session statistics from ticks and clock seconds
#[derive(Debug, Clone, Default)]
pub struct SessionAggregator {
    stats: SessionStats,
    active: bool,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero all counters and start counting
    pub fn start(&mut self) {
        self.stats = SessionStats::default();
        self.active = true;
    }

    /// Stop counting; counters are frozen
    pub fn stop(&mut self) -> SessionStats {
        self.active = false;
        self.stats
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Count entries into drowsy and sleeping, not ticks spent there
    pub fn on_tick(&mut self, previous: AlertnessState, current: AlertnessState) {
        if !self.active || previous == current {
            return;
        }
        match current {
            AlertnessState::Drowsy => self.stats.drowsy_event_count += 1,
            AlertnessState::Sleeping => self.stats.sleep_event_count += 1,
            _ => {}
        }
    }

    pub fn on_second_elapsed(&mut self) {
        if self.active {
            self.stats.elapsed_seconds += 1;
        }
    }
}
