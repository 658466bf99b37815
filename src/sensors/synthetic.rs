//! Scripted frame source and detector for demos and tests.
//!
//! A [`ScriptedSession`] holds a fixed sequence of frames and splits into a
//! [`FrameSource`] / [`LandmarkDetector`] pair that replay it in lockstep.
//! The capture loop always calls `next_frame` before the detector methods,
//! so the pair can share a cursor.

use crate::sensors::{
    CaptureError, DetectError, EyeLandmarks, FaceLandmarks, Frame, FrameSource, InputError,
    InputEvent, InputSource, LandmarkDetector, Point, PoseLandmarks,
};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// One scripted observation: what the camera and the detectors would
/// jointly produce for a single frame.
#[derive(Debug, Clone)]
pub struct ScriptedFrame {
    pub brightness: f64,
    pub faces: Vec<FaceLandmarks>,
    pub pose: Option<PoseLandmarks>,
}

impl ScriptedFrame {
    /// A well-lit frame with one face at the given eye-aspect-ratio and a
    /// pose at the given posture score.
    pub fn well_lit(ear: f64, posture_score: f64) -> Self {
        Self {
            brightness: 120.0,
            faces: vec![face_with_ear(ear)],
            pose: Some(pose_with_score(posture_score)),
        }
    }

    /// A frame too dark for eye monitoring.
    pub fn dark() -> Self {
        Self {
            brightness: 10.0,
            faces: Vec::new(),
            pose: None,
        }
    }

    /// A well-lit frame with nobody in it.
    pub fn empty() -> Self {
        Self {
            brightness: 120.0,
            faces: Vec::new(),
            pose: None,
        }
    }
}

struct SessionState {
    frames: VecDeque<ScriptedFrame>,
    current: Option<ScriptedFrame>,
}

/// A scripted capture session.
pub struct ScriptedSession {
    state: Arc<Mutex<SessionState>>,
}

impl ScriptedSession {
    pub fn new(frames: Vec<ScriptedFrame>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                frames: frames.into(),
                current: None,
            })),
        }
    }

    /// A plausible work session: open eyes with a blink every `blink_every`
    /// frames, good posture throughout.
    pub fn demo(frame_count: usize, blink_every: usize) -> Self {
        let frames = (0..frame_count)
            .map(|i| {
                let ear = if blink_every > 0 && i % blink_every == blink_every - 1 {
                    0.2
                } else {
                    0.55
                };
                ScriptedFrame::well_lit(ear, 85.0)
            })
            .collect();
        Self::new(frames)
    }

    /// Split into the source/detector pair consumed by the capture thread.
    pub fn split(self) -> (ScriptedCamera, ScriptedDetector) {
        (
            ScriptedCamera {
                state: self.state.clone(),
            },
            ScriptedDetector { state: self.state },
        )
    }
}

/// Frame half of a scripted session.
pub struct ScriptedCamera {
    state: Arc<Mutex<SessionState>>,
}

impl FrameSource for ScriptedCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CaptureError::Unavailable("script state poisoned".into()))?;
        match state.frames.pop_front() {
            Some(frame) => {
                let brightness = frame.brightness;
                state.current = Some(frame);
                Ok(Some(Frame {
                    mean_brightness: brightness,
                    captured_at: Utc::now(),
                }))
            }
            None => Ok(None),
        }
    }
}

/// Detector half of a scripted session.
pub struct ScriptedDetector {
    state: Arc<Mutex<SessionState>>,
}

impl LandmarkDetector for ScriptedDetector {
    fn detect_faces(&mut self, _frame: &Frame) -> Result<Vec<FaceLandmarks>, DetectError> {
        let state = self
            .state
            .lock()
            .map_err(|_| DetectError::Extraction("script state poisoned".into()))?;
        Ok(state
            .current
            .as_ref()
            .map(|f| f.faces.clone())
            .unwrap_or_default())
    }

    fn detect_pose(&mut self, _frame: &Frame) -> Result<Option<PoseLandmarks>, DetectError> {
        let state = self
            .state
            .lock()
            .map_err(|_| DetectError::Extraction("script state poisoned".into()))?;
        Ok(state.current.as_ref().and_then(|f| f.pose))
    }
}

/// Scripted keyboard and mouse events, replayed at a fixed pace.
pub struct ScriptedInput {
    events: VecDeque<InputEvent>,
    pace: Duration,
}

impl ScriptedInput {
    pub fn new(events: Vec<InputEvent>, pace: Duration) -> Self {
        Self {
            events: events.into(),
            pace,
        }
    }

    /// An interleaved burst of typing and clicking.
    pub fn typing_burst(key_presses: usize, mouse_clicks: usize, pace: Duration) -> Self {
        let mut events = Vec::with_capacity(key_presses + mouse_clicks);
        let (mut keys, mut clicks) = (key_presses, mouse_clicks);
        while keys > 0 || clicks > 0 {
            if keys > 0 {
                events.push(InputEvent::KeyPress);
                keys -= 1;
            }
            if clicks > 0 {
                events.push(InputEvent::MouseClick);
                clicks -= 1;
            }
        }
        Self::new(events, pace)
    }
}

impl InputSource for ScriptedInput {
    fn next_event(&mut self) -> Result<Option<InputEvent>, InputError> {
        match self.events.pop_front() {
            Some(event) => {
                if !self.pace.is_zero() {
                    thread::sleep(self.pace);
                }
                Ok(Some(event))
            }
            None => Ok(None),
        }
    }
}

/// A face whose mean eye-aspect-ratio equals `ear`.
pub fn face_with_ear(ear: f64) -> FaceLandmarks {
    face_with_ear_at(ear, 0.0)
}

/// A face with the given eye-aspect-ratio, shifted horizontally by
/// `offset_x` so multiple scripted users get distinct fingerprints.
pub fn face_with_ear_at(ear: f64, offset_x: f64) -> FaceLandmarks {
    let eye = |cx: f64| {
        // Horizontal corner distance 0.1; vertical lid distance chosen so
        // (v1 + v2) / 2h comes out at exactly `ear`.
        let h = 0.1;
        let v = ear * h;
        EyeLandmarks {
            outer_corner: Point::new(cx - h / 2.0, 0.45),
            inner_corner: Point::new(cx + h / 2.0, 0.45),
            upper: [
                Point::new(cx - 0.02, 0.45 - v / 2.0),
                Point::new(cx + 0.02, 0.45 - v / 2.0),
            ],
            lower: [
                Point::new(cx - 0.02, 0.45 + v / 2.0),
                Point::new(cx + 0.02, 0.45 + v / 2.0),
            ],
        }
    };

    FaceLandmarks {
        nose: Point::new(0.5 + offset_x, 0.5),
        left_eye: eye(0.42 + offset_x),
        right_eye: eye(0.58 + offset_x),
        left_ear: Point::new(0.35 + offset_x, 0.5),
        right_ear: Point::new(0.65 + offset_x, 0.5),
    }
}

/// A pose whose raw posture score equals `score` (for `score <= 100`), using
/// only the neck-angle penalty.
pub fn pose_with_score(score: f64) -> PoseLandmarks {
    let neck = (100.0 - score) / 150.0;
    PoseLandmarks {
        left_shoulder: Point::new(0.4, 0.5),
        right_shoulder: Point::new(0.6, 0.5),
        left_ear: Point::new(0.45, 0.5 - neck),
        right_ear: Point::new(0.55, 0.5 - neck),
        left_hip: Point::new(0.4, 0.8),
        right_hip: Point::new(0.6, 0.8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_session_replays_in_order() {
        let session = ScriptedSession::new(vec![
            ScriptedFrame::well_lit(0.5, 85.0),
            ScriptedFrame::dark(),
        ]);
        let (mut camera, mut detector) = session.split();

        let frame = camera.next_frame().unwrap().unwrap();
        assert_eq!(frame.mean_brightness, 120.0);
        assert_eq!(detector.detect_faces(&frame).unwrap().len(), 1);
        assert!(detector.detect_pose(&frame).unwrap().is_some());

        let frame = camera.next_frame().unwrap().unwrap();
        assert_eq!(frame.mean_brightness, 10.0);
        assert!(detector.detect_faces(&frame).unwrap().is_empty());

        assert!(camera.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_typing_burst_interleaves_and_exhausts() {
        let mut input = ScriptedInput::typing_burst(2, 1, Duration::ZERO);
        assert_eq!(input.next_event().unwrap(), Some(InputEvent::KeyPress));
        assert_eq!(input.next_event().unwrap(), Some(InputEvent::MouseClick));
        assert_eq!(input.next_event().unwrap(), Some(InputEvent::KeyPress));
        assert_eq!(input.next_event().unwrap(), None);
    }

    #[test]
    fn test_face_with_ear_hits_target() {
        for target in [0.2, 0.45, 0.55] {
            let face = face_with_ear(target);
            assert!((face.eye_aspect_ratio() - target).abs() < 1e-9);
        }
    }

    #[test]
    fn test_pose_with_score_hits_target() {
        for target in [20.0, 55.0, 95.0] {
            let pose = pose_with_score(target);
            assert!((pose.raw_posture_score() - target).abs() < 1e-9);
        }
    }
}
