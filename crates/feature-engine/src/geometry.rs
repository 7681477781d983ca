//! Planar geometry helpers

use crate::landmark::Point;

/// Euclidean distance between two points
pub fn distance(a: Point, b: Point) -> f64 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

/// `numerator / denominator`, or 0.0 when the ratio is not finite.
///
/// Degenerate geometry (coincident corner points) must never leak NaN or
/// infinity into the classifier.
pub fn aspect_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let ratio = numerator / denominator;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}
