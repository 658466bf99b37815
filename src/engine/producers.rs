//! Producer threads: frame capture, input listeners, timers.
//!
//! Producers own their collaborators and communicate with the engine only
//! through the event channel. The capture loop tolerates up to
//! [`MAX_CONSECUTIVE_FAILURES`] consecutive capture or extraction errors,
//! then reports a fatal failure and exits.

use crate::config::Config;
use crate::engine::{
    EngineEvent, FrameObservation, TimerTick, MAX_CONSECUTIVE_FAILURES,
};
use crate::sensors::{DetectError, Frame, FrameSource, InputEvent, InputSource, LandmarkDetector};
use crossbeam_channel::Sender;
use log::warn;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Spawn the capture thread: read frames, extract landmarks, enqueue
/// [`EngineEvent::Frame`]s at the configured cadence.
pub fn spawn_capture(
    mut camera: Box<dyn FrameSource>,
    mut detector: Box<dyn LandmarkDetector>,
    tx: Sender<EngineEvent>,
    running: Arc<AtomicBool>,
    frame_interval: Duration,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("sentinel-capture".into())
        .spawn(move || {
            let mut failures = 0u32;
            while running.load(Ordering::SeqCst) {
                let frame = match camera.next_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        let _ = tx.send(EngineEvent::SourceClosed);
                        break;
                    }
                    Err(err) => {
                        failures += 1;
                        warn!(
                            "frame capture failed ({failures}/{MAX_CONSECUTIVE_FAILURES}): {err}"
                        );
                        if failures >= MAX_CONSECUTIVE_FAILURES {
                            let _ = tx.send(EngineEvent::CaptureFailed(err.to_string()));
                            break;
                        }
                        thread::sleep(frame_interval);
                        continue;
                    }
                };

                match observe_frame(detector.as_mut(), &frame) {
                    Ok(obs) => {
                        failures = 0;
                        if tx.send(EngineEvent::Frame(obs)).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        failures += 1;
                        warn!(
                            "landmark extraction failed \
                             ({failures}/{MAX_CONSECUTIVE_FAILURES}): {err}"
                        );
                        if failures >= MAX_CONSECUTIVE_FAILURES {
                            let _ = tx.send(EngineEvent::CaptureFailed(err.to_string()));
                            break;
                        }
                    }
                }
                thread::sleep(frame_interval);
            }
        })
}

fn observe_frame(
    detector: &mut dyn LandmarkDetector,
    frame: &Frame,
) -> Result<FrameObservation, DetectError> {
    let faces = detector.detect_faces(frame)?;
    let pose = detector.detect_pose(frame)?;
    Ok(FrameObservation {
        faces,
        pose,
        brightness: frame.mean_brightness,
        captured_at: frame.captured_at,
    })
}

/// Spawn an input-listener thread: forward keystroke and click events onto
/// the engine channel.
///
/// The listener blocks inside `next_event`; an exhausted source or a
/// listener error ends the thread without stopping the session, since input
/// accounting is a best-effort signal.
pub fn spawn_input(
    mut input: Box<dyn InputSource>,
    tx: Sender<EngineEvent>,
    running: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("sentinel-input".into())
        .spawn(move || {
            while running.load(Ordering::SeqCst) {
                match input.next_event() {
                    Ok(Some(InputEvent::KeyPress)) => {
                        if tx.send(EngineEvent::KeyPress).is_err() {
                            break;
                        }
                    }
                    Ok(Some(InputEvent::MouseClick)) => {
                        if tx.send(EngineEvent::MouseClick).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!("input listener stopped: {err}");
                        break;
                    }
                }
            }
        })
}

/// Spawn the timer thread: the 100ms status tick, the per-minute session
/// accounting tick, and the break reminder.
pub fn spawn_timers(
    tx: Sender<EngineEvent>,
    running: Arc<AtomicBool>,
    config: &Config,
) -> io::Result<JoinHandle<()>> {
    let tick = Duration::from_millis(config.status_refresh_ms);
    let session_every = Duration::from_secs(config.session_log_interval_secs);
    let break_every = Duration::from_secs(config.break_interval_secs);

    thread::Builder::new()
        .name("sentinel-timers".into())
        .spawn(move || {
            let mut last_session = Instant::now();
            let mut last_break = Instant::now();
            while running.load(Ordering::SeqCst) {
                thread::sleep(tick);
                if tx.send(EngineEvent::Tick(TimerTick::StatusRefresh)).is_err() {
                    break;
                }
                if last_session.elapsed() >= session_every {
                    last_session = Instant::now();
                    if tx.send(EngineEvent::Tick(TimerTick::SessionMinute)).is_err() {
                        break;
                    }
                }
                if last_break.elapsed() >= break_every {
                    last_break = Instant::now();
                    if tx.send(EngineEvent::Tick(TimerTick::BreakReminder)).is_err() {
                        break;
                    }
                }
            }
        })
}
