//! Feature extraction from landmark frames

use crate::geometry::{aspect_ratio, distance};
use crate::landmark::{LandmarkFrame, LandmarkIndices};
use crate::FeatureError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a head angle value was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleEstimate {
    /// Roll estimated from the line through the outer eye corners
    EyeLineRoll,
    /// Value reported by a remote classifier
    Reported,
    /// No estimate could be made; `degrees` is meaningless
    Unavailable,
}

/// Head angle in degrees, tagged with its provenance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadAngle {
    pub degrees: f64,
    pub estimate: AngleEstimate,
}

impl HeadAngle {
    pub fn unavailable() -> Self {
        Self {
            degrees: 0.0,
            estimate: AngleEstimate::Unavailable,
        }
    }

    pub fn reported(degrees: f64) -> Self {
        Self {
            degrees,
            estimate: AngleEstimate::Reported,
        }
    }

    /// Angle in degrees, or `None` when unavailable
    pub fn value(&self) -> Option<f64> {
        match self.estimate {
            AngleEstimate::Unavailable => None,
            _ => Some(self.degrees),
        }
    }
}

impl Default for HeadAngle {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// Per-frame geometric features
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureSet {
    /// Mean eye aspect ratio of both eyes
    pub ear: f64,
    /// Mouth aspect ratio
    pub mar: f64,
    /// Head angle
    pub head_angle: HeadAngle,
}

/// Stateless extractor bound to one landmark index convention
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    indices: LandmarkIndices,
}

impl FeatureExtractor {
    /// Create an extractor for a landmark provider's index convention
    pub fn new(indices: LandmarkIndices) -> Self {
        Self { indices }
    }

    pub fn indices(&self) -> &LandmarkIndices {
        &self.indices
    }

    /// Compute EAR, MAR and head angle for a frame
    pub fn extract(&self, frame: &LandmarkFrame) -> Result<FeatureSet, FeatureError> {
        frame.validate()?;
        self.indices.check(frame)?;

        let left = self.eye_aspect_ratio(frame, &self.indices.left_eye)?;
        let right = self.eye_aspect_ratio(frame, &self.indices.right_eye)?;
        let ear = (left + right) / 2.0;
        let mar = self.mouth_aspect_ratio(frame)?;
        let head_angle = self.head_roll(frame)?;

        debug!(
            "Features: ear={:.3} (l={:.3}, r={:.3}) mar={:.3} head={:?}",
            ear, left, right, mar, head_angle
        );

        Ok(FeatureSet {
            ear,
            mar,
            head_angle,
        })
    }

    /// (|p1-p5| + |p2-p4|) / (2 * |p0-p3|)
    fn eye_aspect_ratio(&self, frame: &LandmarkFrame, eye: &[usize; 6]) -> Result<f64, FeatureError> {
        let p = |i: usize| frame.pixel(eye[i]);
        let vertical = distance(p(1)?, p(5)?) + distance(p(2)?, p(4)?);
        let horizontal = 2.0 * distance(p(0)?, p(3)?);
        Ok(aspect_ratio(vertical, horizontal))
    }

    /// |upper-lower| / |left-right|
    fn mouth_aspect_ratio(&self, frame: &LandmarkFrame) -> Result<f64, FeatureError> {
        let m = &self.indices.mouth;
        let vertical = distance(frame.pixel(m[0])?, frame.pixel(m[1])?);
        let horizontal = distance(frame.pixel(m[2])?, frame.pixel(m[3])?);
        Ok(aspect_ratio(vertical, horizontal))
    }

    /// Tilt of the outer-eye-corner line from horizontal, in [0, 90] degrees
    fn head_roll(&self, frame: &LandmarkFrame) -> Result<HeadAngle, FeatureError> {
        let a = frame.pixel(self.indices.left_eye[0])?;
        let b = frame.pixel(self.indices.right_eye[0])?;
        let (dx, dy) = ((b.x - a.x).abs(), (b.y - a.y).abs());
        if dx == 0.0 && dy == 0.0 {
            return Ok(HeadAngle::unavailable());
        }
        Ok(HeadAngle {
            degrees: dy.atan2(dx).to_degrees(),
            estimate: AngleEstimate::EyeLineRoll,
        })
    }
}
