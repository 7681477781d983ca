//! Indicator sources: local landmark geometry or a remote classifier

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feature_engine::{FeatureExtractor, FeatureSet, HeadAngle, LandmarkFrame};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{DmsConfig, RemoteConfig, SourceKind, Thresholds};
use crate::indicators::{classify, EyeStatus, Indicators, MouthStatus, SleepStatus};
use crate::DmsError;

/// Latest capture handed to a detection tick
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Landmarks from the external face-landmark provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<LandmarkFrame>,

    /// Base64-encoded camera image, for remote classification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,

    /// Capture time
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
}

impl Observation {
    pub fn from_landmarks(frame: LandmarkFrame) -> Self {
        Self {
            landmarks: Some(frame),
            image_base64: None,
            captured_at: Utc::now(),
        }
    }

    pub fn from_image(image_base64: String) -> Self {
        Self {
            landmarks: None,
            image_base64: Some(image_base64),
            captured_at: Utc::now(),
        }
    }
}

/// Features and the indicators derived from them
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub features: FeatureSet,
    pub indicators: Indicators,
}

/// Produces one tick's indicators from an observation
#[async_trait]
pub trait IndicatorSource: Send + Sync {
    async fn classify(
        &self,
        observation: &Observation,
        thresholds: &Thresholds,
    ) -> Result<Classification, DmsError>;

    /// Whether `observation` carries the input this source classifies
    fn accepts(&self, observation: &Observation) -> bool;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Build the source selected by configuration
pub fn build_source(config: &DmsConfig) -> Result<Arc<dyn IndicatorSource>, DmsError> {
    config.validate()?;
    let source: Arc<dyn IndicatorSource> = match config.source {
        SourceKind::Local => Arc::new(LocalGeometric::new(FeatureExtractor::new(
            config.landmarks.clone(),
        ))),
        SourceKind::Remote => Arc::new(RemoteClassifier::new(config.remote.clone())?),
    };
    info!("Indicator source: {}", source.name());
    Ok(source)
}

/// EAR/MAR computed in-process from landmark frames
#[derive(Debug, Clone, Default)]
pub struct LocalGeometric {
    extractor: FeatureExtractor,
}

impl LocalGeometric {
    pub fn new(extractor: FeatureExtractor) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl IndicatorSource for LocalGeometric {
    async fn classify(
        &self,
        observation: &Observation,
        thresholds: &Thresholds,
    ) -> Result<Classification, DmsError> {
        let frame = observation
            .landmarks
            .as_ref()
            .ok_or_else(|| DmsError::InputUnavailable("no landmark frame".into()))?;

        let features = self.extractor.extract(frame)?;
        Ok(Classification {
            features,
            indicators: classify(&features, thresholds),
        })
    }

    fn accepts(&self, observation: &Observation) -> bool {
        observation.landmarks.is_some()
    }

    fn name(&self) -> &'static str {
        "local-geometric"
    }
}

/// Response body of the remote classification service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub eye_status: EyeStatus,
    pub mouth_status: MouthStatus,
    pub sleep_status: SleepStatus,
    pub ear_value: f64,
    pub mar_value: f64,
    pub head_angle: f64,
    pub drowsy: bool,
}

impl RemoteResponse {
    /// Parse and sanity-check a response body
    pub fn parse(body: &str) -> Result<Self, DmsError> {
        let response: RemoteResponse =
            serde_json::from_str(body).map_err(|e| DmsError::InvalidResponse(e.to_string()))?;

        for (field, value) in [
            ("ear_value", response.ear_value),
            ("mar_value", response.mar_value),
            ("head_angle", response.head_angle),
        ] {
            if !value.is_finite() {
                return Err(DmsError::InvalidResponse(format!("{} is not finite", field)));
            }
        }
        if response.ear_value < 0.0 || response.mar_value < 0.0 {
            return Err(DmsError::InvalidResponse("negative aspect ratio".into()));
        }
        Ok(response)
    }

    /// Convert into a classification.
    ///
    /// By default the reported EAR/MAR/head angle are re-thresholded locally so
    /// the configured sensitivity applies. With `trust_reported` the service's
    /// statuses are used as-is.
    pub fn into_classification(self, thresholds: &Thresholds, trust_reported: bool) -> Classification {
        let features = FeatureSet {
            ear: self.ear_value,
            mar: self.mar_value,
            head_angle: HeadAngle::reported(self.head_angle),
        };

        let reported = Indicators {
            eye_status: self.eye_status,
            mouth_status: self.mouth_status,
            sleep_status: self.sleep_status,
        };

        let indicators = if trust_reported {
            reported
        } else {
            let local = classify(&features, thresholds);
            if local != reported {
                debug!("Remote statuses {:?} differ from local thresholds {:?}", reported, local);
            }
            local
        };

        Classification {
            features,
            indicators,
        }
    }
}

/// Out-of-process classifier reached over HTTP
pub struct RemoteClassifier {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteClassifier {
    pub fn new(config: RemoteConfig) -> Result<Self, DmsError> {
        if config.endpoint.is_empty() {
            return Err(DmsError::Config("remote endpoint not set".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| DmsError::Config(e.to_string()))?;

        info!("Remote classifier at {}", config.endpoint);
        Ok(Self { client, config })
    }
}

#[async_trait]
impl IndicatorSource for RemoteClassifier {
    async fn classify(
        &self,
        observation: &Observation,
        thresholds: &Thresholds,
    ) -> Result<Classification, DmsError> {
        let image = observation
            .image_base64
            .as_ref()
            .ok_or_else(|| DmsError::InputUnavailable("no camera image".into()))?;

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(image.clone());

        if let Some(key) = &self.config.api_key {
            request = request.query(&[("api_key", key)]);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DmsError::Timeout(self.config.timeout_ms)
            } else {
                DmsError::Remote(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Remote classifier returned {}", status);
            return Err(DmsError::Remote(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DmsError::Remote(e.to_string()))?;

        let parsed = RemoteResponse::parse(&body)?;
        Ok(parsed.into_classification(thresholds, self.config.trust_reported_status))
    }

    fn accepts(&self, observation: &Observation) -> bool {
        observation.image_base64.is_some()
    }

    fn name(&self) -> &'static str {
        "remote-classifier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_engine::{AngleEstimate, LandmarkIndices};

    const BODY: &str = r#"{
        "eye_status": "Closed",
        "mouth_status": "Not Yawning",
        "sleep_status": "Not Slept",
        "ear_value": 0.2,
        "mar_value": 0.55,
        "head_angle": 3.5,
        "drowsy": true
    }"#;

    #[test]
    fn test_parse_remote_response() {
        let r = RemoteResponse::parse(BODY).unwrap();
        assert_eq!(r.eye_status, EyeStatus::Closed);
        assert_eq!(r.mouth_status, MouthStatus::NotYawning);
        assert_eq!(r.sleep_status, SleepStatus::NotSlept);
        assert!(r.drowsy);
    }

    #[test]
    fn test_parse_rejects_unknown_status() {
        let body = BODY.replace("\"Closed\"", "\"Squinting\"");
        assert!(matches!(
            RemoteResponse::parse(&body),
            Err(DmsError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_field() {
        let body = r#"{"eye_status":"Open","mouth_status":"Yawning"}"#;
        assert!(matches!(
            RemoteResponse::parse(body),
            Err(DmsError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_remote_rethresholded_locally() {
        let r = RemoteResponse::parse(BODY).unwrap();
        // Lenient thresholds: 0.2 is no longer below the EAR threshold
        let lenient = Thresholds {
            ear: 0.15,
            ..Thresholds::default()
        };
        let c = r.clone().into_classification(&lenient, false);
        assert_eq!(c.indicators.eye_status, EyeStatus::Open);
        assert_eq!(c.features.head_angle.estimate, AngleEstimate::Reported);

        let trusted = r.into_classification(&lenient, true);
        assert_eq!(trusted.indicators.eye_status, EyeStatus::Closed);
    }

    #[tokio::test]
    async fn test_local_source_classifies_landmarks() {
        let source = LocalGeometric::default();
        let frame = LandmarkFrame::synthetic(&LandmarkIndices::default(), 0.18, 0.3, 0.0);
        let c = source
            .classify(&Observation::from_landmarks(frame), &Thresholds::default())
            .await
            .unwrap();
        assert_eq!(c.indicators.eye_status, EyeStatus::Closed);
        assert!((c.features.ear - 0.18).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_local_source_needs_landmarks() {
        let source = LocalGeometric::default();
        let err = source
            .classify(&Observation::from_image("aGVsbG8=".into()), &Thresholds::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DmsError::InputUnavailable(_)));
    }

    #[tokio::test]
    async fn test_remote_source_needs_image() {
        let source = RemoteClassifier::new(RemoteConfig {
            endpoint: "http://127.0.0.1:9/classify".into(),
            ..Default::default()
        })
        .unwrap();
        let frame = LandmarkFrame::synthetic(&LandmarkIndices::default(), 0.3, 0.3, 0.0);
        let err = source
            .classify(&Observation::from_landmarks(frame), &Thresholds::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DmsError::InputUnavailable(_)));
    }

    #[test]
    fn test_sources_accept_their_own_input() {
        let frame = LandmarkFrame::synthetic(&LandmarkIndices::default(), 0.3, 0.3, 0.0);
        let landmarks = Observation::from_landmarks(frame);
        let image = Observation::from_image("aGVsbG8=".into());

        let local = LocalGeometric::default();
        assert!(local.accepts(&landmarks));
        assert!(!local.accepts(&image));

        let remote = RemoteClassifier::new(RemoteConfig {
            endpoint: "http://127.0.0.1:9/classify".into(),
            ..Default::default()
        })
        .unwrap();
        assert!(remote.accepts(&image));
        assert!(!remote.accepts(&landmarks));
    }

    #[test]
    fn test_build_source_selects_variant() {
        let local = build_source(&DmsConfig::default()).unwrap();
        assert_eq!(local.name(), "local-geometric");

        let remote = build_source(&DmsConfig {
            source: SourceKind::Remote,
            remote: RemoteConfig {
                endpoint: "http://localhost:5000/classify".into(),
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap();
        assert_eq!(remote.name(), "remote-classifier");
    }
}
