//! Landmark frame types

use crate::FeatureError;
use serde::{Deserialize, Serialize};

/// 2D point. Normalized ([0, 1]) inside a `LandmarkFrame`, pixels once scaled.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One tick's worth of facial landmarks from the external provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// Normalized points, indexed by the provider's convention
    pub points: Vec<Point>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl LandmarkFrame {
    /// Create a frame, rejecting empty point sets and zero-sized frames
    pub fn new(points: Vec<Point>, width: u32, height: u32) -> Result<Self, FeatureError> {
        let frame = Self {
            points,
            width,
            height,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Check the frame can be converted to pixel space
    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.points.is_empty() {
            return Err(FeatureError::EmptyFrame);
        }
        if self.width == 0 || self.height == 0 {
            return Err(FeatureError::InvalidFrameSize {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Number of landmarks in the frame
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Landmark `index` scaled to absolute pixel coordinates
    pub fn pixel(&self, index: usize) -> Result<Point, FeatureError> {
        let p = self.points.get(index).ok_or(FeatureError::IndexOutOfRange {
            index,
            len: self.points.len(),
        })?;
        Ok(Point::new(
            p.x * self.width as f64,
            p.y * self.height as f64,
        ))
    }
}

impl LandmarkFrame {
    /// Build a front-facing 1000x1000 frame whose eyes and mouth have exactly
    /// the requested aspect ratios, rotated by `roll_deg` around the frame
    /// centre. Test fixture, enabled for dependents by the `test-util` feature.
    #[cfg(any(test, feature = "test-util"))]
    pub fn synthetic(indices: &LandmarkIndices, ear: f64, mar: f64, roll_deg: f64) -> Self {
        let mut points = vec![Point::new(0.5, 0.5); (indices.max_index() + 1).max(468)];

        let eye_width = 0.1;
        let lid = ear * eye_width / 2.0;
        for (set, cx) in [(&indices.left_eye, 0.35), (&indices.right_eye, 0.65)] {
            let cy = 0.4;
            points[set[0]] = Point::new(cx - eye_width / 2.0, cy);
            points[set[1]] = Point::new(cx - eye_width / 6.0, cy - lid);
            points[set[2]] = Point::new(cx + eye_width / 6.0, cy - lid);
            points[set[3]] = Point::new(cx + eye_width / 2.0, cy);
            points[set[4]] = Point::new(cx + eye_width / 6.0, cy + lid);
            points[set[5]] = Point::new(cx - eye_width / 6.0, cy + lid);
        }

        let mouth_width = 0.2;
        let lip = mar * mouth_width / 2.0;
        points[indices.mouth[0]] = Point::new(0.5, 0.7 - lip);
        points[indices.mouth[1]] = Point::new(0.5, 0.7 + lip);
        points[indices.mouth[2]] = Point::new(0.5 - mouth_width / 2.0, 0.7);
        points[indices.mouth[3]] = Point::new(0.5 + mouth_width / 2.0, 0.7);

        let (sin, cos) = roll_deg.to_radians().sin_cos();
        for p in points.iter_mut() {
            let (dx, dy) = (p.x - 0.5, p.y - 0.5);
            *p = Point::new(0.5 + dx * cos - dy * sin, 0.5 + dx * sin + dy * cos);
        }

        Self {
            points,
            width: 1000,
            height: 1000,
        }
    }
}

/// Landmark index sets used for the eye and mouth ratios.
///
/// Eye order: outer corner, upper lid (x2), inner corner, lower lid (x2),
/// so the vertical pairs are (1, 5) and (2, 4) and the horizontal pair is (0, 3).
/// Mouth order: upper lip, lower lip, left corner, right corner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkIndices {
    pub left_eye: [usize; 6],
    pub right_eye: [usize; 6],
    pub mouth: [usize; 4],
}

impl Default for LandmarkIndices {
    /// 468-point face mesh convention
    fn default() -> Self {
        Self {
            left_eye: [33, 160, 158, 133, 153, 144],
            right_eye: [263, 387, 385, 362, 380, 373],
            mouth: [13, 14, 78, 308],
        }
    }
}

impl LandmarkIndices {
    /// Largest index referenced by any set
    pub fn max_index(&self) -> usize {
        self.left_eye
            .iter()
            .chain(self.right_eye.iter())
            .chain(self.mouth.iter())
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Check that a frame carries every referenced landmark
    pub fn check(&self, frame: &LandmarkFrame) -> Result<(), FeatureError> {
        let max = self.max_index();
        if max >= frame.len() {
            return Err(FeatureError::IndexOutOfRange {
                index: max,
                len: frame.len(),
            });
        }
        Ok(())
    }
}
