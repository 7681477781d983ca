//! Service configuration

use alerting::AlertConfig;
use config::{Config, Environment, File};
use dms::DmsConfig;
use serde::{Deserialize, Serialize};
use session::MonitorSettings;

/// Default config file stem (`drowsiness-monitor.toml`, `.yaml`, `.json`)
pub const DEFAULT_CONFIG_FILE: &str = "drowsiness-monitor";

/// Persistence collaborator settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Backend API root; detections go to `{base_url}/detect`.
    /// Without it, detections are kept in memory.
    pub base_url: Option<String>,
    /// Bearer token of the signed-in user. No token, no persistence.
    pub auth_token: Option<String>,
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub bind_addr: String,
    pub log_level: String,
    pub detection: DmsConfig,
    pub session: MonitorSettings,
    pub alerts: AlertConfig,
    pub persistence: PersistenceConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            detection: DmsConfig::default(),
            session: MonitorSettings::default(),
            alerts: AlertConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Load from an optional file, overridden by `DROWSY__*` environment
    /// variables (e.g. `DROWSY__DETECTION__SENSITIVITY=70`)
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(p) => File::with_name(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("DROWSY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.detection.sensitivity, 50);
        assert_eq!(config.session.detection_interval_ms, 3000);
        assert!(config.alerts.sound_enabled);
        assert!(config.persistence.auth_token.is_none());
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config: MonitorConfig = Config::builder()
            .add_source(config::File::from_str(
                r#"
                bind_addr = "127.0.0.1:9000"

                [detection]
                sensitivity = 80
                smoothing_ticks = 2

                [alerts]
                sound_enabled = false
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.detection.sensitivity, 80);
        assert_eq!(config.detection.smoothing_ticks, 2);
        assert_eq!(config.detection.landmarks.left_eye[0], 33);
        assert!(!config.alerts.sound_enabled);
        assert!(config.alerts.drowsy_notice);
        assert_eq!(config.session.elapsed_interval_ms, 1000);
    }
}
