//! Explicit session object

use chrono::{DateTime, Utc};
use dms::{AlertnessState, AlertnessStateMachine, Classification, Thresholds, Transition};
use feature_engine::FeatureSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::stats::{SessionAggregator, SessionStats};
use crate::SessionError;

/// Result of applying one tick to a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub transition: Transition,
    pub features: FeatureSet,
    pub at: DateTime<Utc>,
}

/// Point-in-time view of a session, for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Option<Uuid>,
    pub status: AlertnessState,
    pub message: String,
    pub started_at: Option<DateTime<Utc>>,
    pub stats: SessionStats,
    /// `HH:MM:SS`
    pub duration: String,
    pub last_features: Option<FeatureSet>,
    pub thresholds: Thresholds,
}

/// Everything that persists across detection ticks.
///
/// `generation` changes on every start and stop. Work started under one
/// generation is rejected once the generation has moved on, which is how
/// classification results that arrive after `stop` are discarded.
#[derive(Debug)]
pub struct Session {
    id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    machine: AlertnessStateMachine,
    aggregator: SessionAggregator,
    thresholds: Thresholds,
    generation: u64,
    last_features: Option<FeatureSet>,
}

impl Session {
    pub fn new(thresholds: Thresholds, smoothing_ticks: u32) -> Self {
        Self {
            id: None,
            started_at: None,
            machine: AlertnessStateMachine::new(smoothing_ticks),
            aggregator: SessionAggregator::new(),
            thresholds,
            generation: 0,
            last_features: None,
        }
    }

    pub fn state(&self) -> AlertnessState {
        self.machine.state()
    }

    pub fn is_active(&self) -> bool {
        self.machine.is_active()
    }

    pub fn stats(&self) -> SessionStats {
        self.aggregator.stats()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Apply new thresholds from the settings collaborator; takes effect on the next tick
    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        info!("Thresholds updated: ear={:.3} mar={:.3}", thresholds.ear, thresholds.mar);
        self.thresholds = thresholds;
    }

    /// Begin a session: state `Awake`, counters zeroed. Returns the new generation.
    pub fn start(&mut self) -> Result<u64, SessionError> {
        if self.is_active() {
            return Err(SessionError::AlreadyRunning);
        }
        self.generation += 1;
        let id = Uuid::new_v4();
        self.id = Some(id);
        self.started_at = Some(Utc::now());
        self.last_features = None;
        self.aggregator.start();
        self.machine.start();
        info!("Session {} started (generation {})", id, self.generation);
        Ok(self.generation)
    }

    /// End the session: state `Inactive`, counters frozen. Returns final stats.
    pub fn stop(&mut self) -> Result<SessionStats, SessionError> {
        if !self.is_active() {
            return Err(SessionError::NotRunning);
        }
        self.generation += 1;
        self.machine.stop();
        let stats = self.aggregator.stop();
        info!(
            "Session stopped after {}s: {} drowsy, {} sleep events",
            stats.elapsed_seconds, stats.drowsy_event_count, stats.sleep_event_count
        );
        Ok(stats)
    }

    /// Apply one tick's classification. Returns `None` if the session is
    /// inactive or `generation` is stale.
    pub fn apply(&mut self, generation: u64, classification: &Classification) -> Option<TickOutcome> {
        if generation != self.generation || !self.is_active() {
            debug!(
                "Discarding classification from generation {} (current {})",
                generation, self.generation
            );
            return None;
        }

        let transition = self.machine.on_tick(&classification.indicators);
        self.aggregator.on_tick(transition.previous, transition.current);
        self.last_features = Some(classification.features);

        Some(TickOutcome {
            transition,
            features: classification.features,
            at: Utc::now(),
        })
    }

    /// One wall-clock second passed under `generation`
    pub fn on_second_elapsed(&mut self, generation: u64) -> bool {
        if generation != self.generation || !self.is_active() {
            return false;
        }
        self.aggregator.on_second_elapsed();
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let stats = self.stats();
        SessionSnapshot {
            session_id: self.id,
            status: self.state(),
            message: self.state().description().to_string(),
            started_at: self.started_at,
            stats,
            duration: stats.duration_hms(),
            last_features: self.last_features,
            thresholds: self.thresholds,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Thresholds::default(), 1)
    }
}
