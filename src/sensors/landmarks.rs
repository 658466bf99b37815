//! Landmark geometry: eye-aspect-ratio, posture score, user fingerprints.
//!
//! Landmark extraction itself is a collaborator; this module turns the named
//! 2D points it produces into the scalar measurements the engine consumes.
//! Coordinates are normalized to the frame (0.0-1.0 on both axes).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fallback eye-aspect-ratio when the horizontal eye distance degenerates
/// to near zero, avoiding a division blow-up.
pub const DEGENERATE_EAR: f64 = 0.3;

const MIN_HORIZONTAL_DISTANCE: f64 = 0.001;

/// A 2D landmark point in normalized frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// The six landmark points of one eye: the two horizontal corners plus two
/// upper-lid / lower-lid pairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeLandmarks {
    pub outer_corner: Point,
    pub inner_corner: Point,
    pub upper: [Point; 2],
    pub lower: [Point; 2],
}

impl EyeLandmarks {
    /// Eye-aspect-ratio: mean vertical lid distance over horizontal corner
    /// distance. Lower values indicate a more closed eye.
    pub fn aspect_ratio(&self) -> f64 {
        let v1 = self.upper[0].distance(&self.lower[0]);
        let v2 = self.upper[1].distance(&self.lower[1]);
        let h = self.outer_corner.distance(&self.inner_corner);

        if h > MIN_HORIZONTAL_DISTANCE {
            (v1 + v2) / (2.0 * h)
        } else {
            DEGENERATE_EAR
        }
    }
}

/// Named face-mesh landmarks for one detected face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub nose: Point,
    pub left_eye: EyeLandmarks,
    pub right_eye: EyeLandmarks,
    pub left_ear: Point,
    pub right_ear: Point,
}

impl FaceLandmarks {
    /// Mean eye-aspect-ratio over both eyes.
    pub fn eye_aspect_ratio(&self) -> f64 {
        (self.left_eye.aspect_ratio() + self.right_eye.aspect_ratio()) / 2.0
    }

    /// Content-derived fingerprint for this face.
    ///
    /// A small set of coordinates quantized to three decimal places and
    /// concatenated. Near-identical face geometry across frames maps to the
    /// same fingerprint; collisions between genuinely similar faces are
    /// tolerated. This is a best-effort clustering key, not an identity.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(format!(
            "{:.3}{:.3}{:.3}{:.3}{:.3}_{:.3}",
            self.nose.x,
            self.nose.y,
            self.left_eye.outer_corner.x,
            self.right_eye.outer_corner.x,
            self.left_ear.x,
            self.right_ear.x
        ))
    }
}

/// Opaque user fingerprint derived from face geometry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named body-pose landmarks for the posture score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseLandmarks {
    pub left_shoulder: Point,
    pub right_shoulder: Point,
    pub left_ear: Point,
    pub right_ear: Point,
    pub left_hip: Point,
    pub right_hip: Point,
}

impl PoseLandmarks {
    /// Raw posture score from body alignment, nominally 0-100 but unclamped;
    /// the engine clamps after smoothing.
    ///
    /// Penalties: shoulder tilt, forward head offset, hip tilt and neck
    /// angle, each weighted against a perfect score of 100.
    pub fn raw_posture_score(&self) -> f64 {
        let shoulder_tilt = (self.left_shoulder.y - self.right_shoulder.y).abs();
        let head_forward = ((self.left_ear.x + self.right_ear.x) / 2.0
            - (self.left_shoulder.x + self.right_shoulder.x) / 2.0)
            .abs();
        let hip_tilt = (self.left_hip.y - self.right_hip.y).abs();
        let neck_angle = ((self.left_ear.y + self.right_ear.y) / 2.0
            - (self.left_shoulder.y + self.right_shoulder.y) / 2.0)
            .abs();

        100.0 - (shoulder_tilt * 200.0 + head_forward * 100.0 + hip_tilt * 100.0 + neck_angle * 150.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eye_with_geometry(vertical: f64, horizontal: f64) -> EyeLandmarks {
        EyeLandmarks {
            outer_corner: Point::new(0.4, 0.5),
            inner_corner: Point::new(0.4 + horizontal, 0.5),
            upper: [
                Point::new(0.45, 0.5 - vertical / 2.0),
                Point::new(0.55, 0.5 - vertical / 2.0),
            ],
            lower: [
                Point::new(0.45, 0.5 + vertical / 2.0),
                Point::new(0.55, 0.5 + vertical / 2.0),
            ],
        }
    }

    #[test]
    fn test_aspect_ratio_basic() {
        // vertical 0.05, horizontal 0.1 -> EAR 0.5
        let eye = eye_with_geometry(0.05, 0.1);
        assert!((eye.aspect_ratio() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_aspect_ratio_degenerate_geometry() {
        let eye = eye_with_geometry(0.05, 0.0005);
        assert_eq!(eye.aspect_ratio(), DEGENERATE_EAR);
    }

    #[test]
    fn test_fingerprint_stable_under_jitter() {
        let face = crate::sensors::synthetic::face_with_ear(0.5);
        let mut jittered = face;
        // Below the 3-decimal quantization step
        jittered.nose.x += 0.0003;
        assert_eq!(face.fingerprint(), jittered.fingerprint());
    }

    #[test]
    fn test_fingerprint_distinguishes_offset_faces() {
        let a = crate::sensors::synthetic::face_with_ear_at(0.5, 0.0);
        let b = crate::sensors::synthetic::face_with_ear_at(0.5, 0.1);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_posture_score_perfect_alignment() {
        let pose = crate::sensors::synthetic::pose_with_score(100.0);
        assert!((pose.raw_posture_score() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_posture_score_neck_penalty() {
        let pose = crate::sensors::synthetic::pose_with_score(25.0);
        assert!((pose.raw_posture_score() - 25.0).abs() < 1e-9);
    }
}
