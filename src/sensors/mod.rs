//! Sensor collaborators: frame capture and landmark extraction.
//!
//! The engine never talks to camera drivers or landmark models directly; it
//! consumes the narrow traits defined here. Real implementations live
//! outside this crate; [`synthetic`] provides a scripted pair for demos and
//! tests.

pub mod landmarks;
pub mod synthetic;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use landmarks::{EyeLandmarks, FaceLandmarks, Fingerprint, Point, PoseLandmarks};
pub use synthetic::{ScriptedInput, ScriptedSession};

/// A captured frame, reduced to what the engine reads directly.
///
/// Pixel data stays on the capture side; the core only needs the mean
/// brightness (luma, 0-255) and the capture time. Landmark extraction runs
/// against the capture side's full frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    /// Mean luma of the frame on a 0-255 scale
    pub mean_brightness: f64,
    /// When the frame was captured
    pub captured_at: DateTime<Utc>,
}

/// Errors from the capture collaborator.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("frame source unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read frame: {0}")]
    ReadFailed(String),
}

/// Errors from the landmark-extraction collaborator.
///
/// An empty or absent detection result is not an error; these cover genuine
/// extraction failures (malformed frame, model fault).
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("landmark extraction failed: {0}")]
    Extraction(String),
}

/// Source of camera frames.
///
/// `Ok(None)` signals a cleanly exhausted source (scripted sources, camera
/// unplugged on purpose); errors are retried by the capture loop up to a
/// bounded count before the session is stopped.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;
}

/// Face-mesh and body-pose landmark extraction.
pub trait LandmarkDetector: Send {
    /// Detect faces in the frame. An empty list means no faces.
    fn detect_faces(&mut self, frame: &Frame) -> Result<Vec<FaceLandmarks>, DetectError>;

    /// Detect the body pose in the frame, if any.
    fn detect_pose(&mut self, frame: &Frame) -> Result<Option<PoseLandmarks>, DetectError>;
}

/// A raw input-device event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyPress,
    MouseClick,
}

/// Errors from the input-listener collaborator.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("input listener unavailable: {0}")]
    Unavailable(String),
}

/// Stream of keyboard and mouse events.
///
/// `next_event` may block until an event arrives; `Ok(None)` signals a
/// cleanly exhausted source. Real listeners hook the OS event queues
/// outside this crate; [`synthetic::ScriptedInput`] replays a fixed
/// sequence.
pub trait InputSource: Send {
    fn next_event(&mut self) -> Result<Option<InputEvent>, InputError>;
}
