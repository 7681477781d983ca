//! DMS configuration

use feature_engine::LandmarkIndices;
use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Default EAR threshold at sensitivity 50
pub const EAR_THRESHOLD: f64 = 0.22;
/// Default MAR threshold at sensitivity 50
pub const MAR_THRESHOLD: f64 = 0.6;
/// Default head tilt (degrees) above which closed eyes count as slept
pub const HEAD_TILT_THRESHOLD_DEG: f64 = 5.0;
/// Neutral sensitivity
pub const DEFAULT_SENSITIVITY: u8 = 50;

/// Classification thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Eyes count as closed below this EAR
    pub ear: f64,
    /// Mouth counts as yawning above this MAR
    pub mar: f64,
    /// Head angle (degrees) that, with closed eyes, counts as slept
    pub head_tilt_deg: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            ear: EAR_THRESHOLD,
            mar: MAR_THRESHOLD,
            head_tilt_deg: HEAD_TILT_THRESHOLD_DEG,
        }
    }
}

impl Thresholds {
    /// Map a 1..=100 sensitivity onto EAR/MAR thresholds.
    ///
    /// `ear = 0.22 + (s - 50) * 0.001`, `mar = 0.6 - (s - 50) * 0.004`.
    /// Higher sensitivity raises the EAR threshold and lowers the MAR
    /// threshold, so closed eyes and yawns are reported sooner. Values outside
    /// 1..=100 are clamped.
    pub fn from_sensitivity(sensitivity: u8) -> Self {
        let offset = sensitivity.clamp(1, 100) as f64 - DEFAULT_SENSITIVITY as f64;
        Self {
            ear: EAR_THRESHOLD + offset * 0.001,
            mar: MAR_THRESHOLD - offset * 0.004,
            head_tilt_deg: HEAD_TILT_THRESHOLD_DEG,
        }
    }
}

/// Where per-tick indicators come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// EAR/MAR computed locally from landmark frames
    #[default]
    Local,
    /// Out-of-process classifier fed with base64 images
    Remote,
}

/// Remote classifier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Classification endpoint URL
    pub endpoint: String,
    /// Optional API key, sent as the `api_key` query parameter
    pub api_key: Option<String>,
    /// Request timeout (milliseconds)
    pub timeout_ms: u64,
    /// Use the statuses reported by the service instead of re-thresholding
    /// its EAR/MAR values locally
    pub trust_reported_status: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            timeout_ms: 5000,
            trust_reported_status: false,
        }
    }
}

/// DMS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Detection sensitivity (1..=100)
    pub sensitivity: u8,

    /// Explicit EAR threshold, overrides the sensitivity mapping
    pub ear_threshold: Option<f64>,

    /// Explicit MAR threshold, overrides the sensitivity mapping
    pub mar_threshold: Option<f64>,

    /// Head tilt threshold for the slept indicator (degrees)
    pub head_tilt_threshold_deg: f64,

    /// Consecutive identical classifications required before the state
    /// changes (1 = instantaneous)
    pub smoothing_ticks: u32,

    /// Indicator source
    pub source: SourceKind,

    /// Remote classifier settings (used when `source = remote`)
    pub remote: RemoteConfig,

    /// Landmark index convention of the wired provider
    pub landmarks: LandmarkIndices,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            ear_threshold: None,
            mar_threshold: None,
            head_tilt_threshold_deg: HEAD_TILT_THRESHOLD_DEG,
            smoothing_ticks: 1,
            source: SourceKind::Local,
            remote: RemoteConfig::default(),
            landmarks: LandmarkIndices::default(),
        }
    }
}

impl DmsConfig {
    /// Create strict config (closed eyes and yawns trigger sooner)
    pub fn strict() -> Self {
        Self {
            sensitivity: 75,
            ..Default::default()
        }
    }

    /// Create lenient config
    pub fn lenient() -> Self {
        Self {
            sensitivity: 25,
            ..Default::default()
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), DmsError> {
        if !(1..=100).contains(&self.sensitivity) {
            return Err(DmsError::Config(format!(
                "sensitivity {} outside 1..=100",
                self.sensitivity
            )));
        }
        if self.smoothing_ticks == 0 {
            return Err(DmsError::Config("smoothing_ticks must be at least 1".into()));
        }
        if self.source == SourceKind::Remote && self.remote.endpoint.is_empty() {
            return Err(DmsError::Config("remote source requires an endpoint".into()));
        }
        Ok(())
    }

    /// Effective thresholds: sensitivity mapping plus explicit overrides
    pub fn thresholds(&self) -> Thresholds {
        let mapped = Thresholds::from_sensitivity(self.sensitivity);
        Thresholds {
            ear: self.ear_threshold.unwrap_or(mapped.ear),
            mar: self.mar_threshold.unwrap_or(mapped.mar),
            head_tilt_deg: self.head_tilt_threshold_deg,
        }
    }
}
