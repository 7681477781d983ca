//! Feature Engineering Engine
//!
//! Turns facial landmark frames into the scalar geometric features used by
//! the alertness pipeline: eye aspect ratio, mouth aspect ratio and an
//! estimated head angle.

mod features;
mod geometry;
mod landmark;

pub use features::{AngleEstimate, FeatureExtractor, FeatureSet, HeadAngle};
pub use geometry::{aspect_ratio, distance};
pub use landmark::{LandmarkFrame, LandmarkIndices, Point};

use thiserror::Error;

/// Errors while reading a landmark frame
#[derive(Debug, Clone, Error)]
pub enum FeatureError {
    /// Landmark index outside the frame
    #[error("Landmark index {index} out of range (frame has {len} points)")]
    IndexOutOfRange { index: usize, len: usize },

    /// Frame dimensions cannot be used for pixel conversion
    #[error("Invalid frame size {width}x{height}")]
    InvalidFrameSize { width: u32, height: u32 },

    /// Frame carries no points at all
    #[error("Landmark frame is empty")]
    EmptyFrame,
}
