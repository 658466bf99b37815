//! The monitoring engine: single owner of all session state.
//!
//! Producer threads (capture, input listeners, timers) enqueue
//! [`EngineEvent`]s on a bounded channel; [`Engine::run`] drains it on one
//! thread and drives the state machines in a fixed order per frame:
//! presence first, then eye, then posture, with the alert dispatcher as the
//! only exit path for alerts and the store as the only persistence path.

pub mod activity;
pub mod eye;
pub mod posture;
pub mod presence;
pub mod producers;
pub mod smoothing;

use crate::alerts::{AlertKind, Dispatcher};
use crate::config::MonitorSettings;
use crate::sensors::{FaceLandmarks, Fingerprint, PoseLandmarks};
use crate::store::{ActivityDelta, Store};
use self::activity::ActivityAggregator;
use self::eye::{EyeEvent, EyeMonitor};
use self::posture::{PostureBand, PostureEvent, PostureMonitor};
use self::presence::{EyeHealth, PresenceTracker};
use self::smoothing::{Smoother, EAR_WINDOW, POSTURE_WINDOW};
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{info, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use thiserror::Error;
use uuid::Uuid;

/// Mean brightness below which the room counts as dark.
pub const LOW_LIGHT_BRIGHTNESS: f64 = 40.0;

/// Seconds of sustained darkness before the low-light alert.
pub const LOW_LIGHT_SUSTAIN_SECS: i64 = 5;

/// Seconds without any face before the no-face alert.
pub const NO_FACE_SUSTAIN_SECS: i64 = 10;

/// Capacity of the event channel shared by all producers.
pub const QUEUE_CAPACITY: usize = 10_000;

/// Consecutive capture or extraction failures tolerated before the
/// session is stopped.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Everything extracted from one camera frame.
#[derive(Debug, Clone)]
pub struct FrameObservation {
    pub faces: Vec<FaceLandmarks>,
    pub pose: Option<PoseLandmarks>,
    pub brightness: f64,
    pub captured_at: DateTime<Utc>,
}

/// Timer-thread ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// Refresh the status snapshot. Every 100ms.
    StatusRefresh,
    /// One minute of session time elapsed.
    SessionMinute,
    /// The hourly break reminder is due.
    BreakReminder,
}

/// Events accepted by the engine.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Frame(FrameObservation),
    KeyPress,
    MouseClick,
    Tick(TimerTick),
    /// The capture side gave up after repeated failures. Fatal.
    CaptureFailed(String),
    /// The frame source is cleanly exhausted. Normal stop.
    SourceClosed,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("all event producers disconnected")]
    Disconnected,
}

/// Point-in-time view of the session, refreshed on the status tick.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub session_id: Uuid,
    pub users_visible: usize,
    pub primary_present: bool,
    pub eye: EyeHealth,
    pub posture: Option<PostureBand>,
    pub blink_count: u32,
    pub keyboard_count: u32,
    pub mouse_count: u32,
}

impl EngineStatus {
    fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            users_visible: 0,
            primary_present: false,
            eye: EyeHealth::Unknown,
            posture: None,
            blink_count: 0,
            keyboard_count: 0,
            mouse_count: 0,
        }
    }
}

/// The monitoring engine. Owns every state machine and the store.
pub struct Engine {
    store: Store,
    dispatcher: Dispatcher,
    presence: PresenceTracker,
    eye: EyeMonitor,
    posture: PostureMonitor,
    activity: ActivityAggregator,
    ear_smoother: Smoother,
    posture_smoother: Smoother,
    low_light_since: Option<DateTime<Utc>>,
    no_face_since: Option<DateTime<Utc>>,
    /// Deltas that failed to persist, retried on the next write.
    pending: ActivityDelta,
    session_id: Uuid,
    status: EngineStatus,
}

impl Engine {
    pub fn new(
        settings: MonitorSettings,
        store: Store,
        dispatcher: Dispatcher,
        now: DateTime<Utc>,
    ) -> Self {
        let session_id = Uuid::new_v4();
        Self {
            store,
            dispatcher,
            presence: PresenceTracker::new(),
            eye: EyeMonitor::new(settings.ear_threshold, settings.min_blink_threshold, now),
            posture: PostureMonitor::new(settings.bad_posture_threshold_secs),
            activity: ActivityAggregator::new(settings.keyboard_limit, settings.mouse_limit),
            ear_smoother: Smoother::new(EAR_WINDOW),
            posture_smoother: Smoother::new(POSTURE_WINDOW),
            low_light_since: None,
            no_face_since: None,
            pending: ActivityDelta::default(),
            session_id,
            status: EngineStatus::new(session_id),
        }
    }

    /// Drain the event channel until the stop flag clears, the source
    /// closes, or a fatal capture error arrives.
    pub fn run(
        &mut self,
        rx: &Receiver<EngineEvent>,
        running: Arc<AtomicBool>,
    ) -> Result<(), EngineError> {
        self.dispatcher.announce("Work session monitoring started");
        info!("engine running, session {}", self.session_id);

        let result = loop {
            if !running.load(Ordering::SeqCst) {
                break Ok(());
            }
            match rx.recv_timeout(StdDuration::from_millis(100)) {
                Ok(EngineEvent::SourceClosed) => {
                    info!("frame source closed");
                    break Ok(());
                }
                Ok(event) => {
                    // Frame-driven state follows the capture clock, not the
                    // queue-drain time, so a backlog never skews the timers.
                    let now = match &event {
                        EngineEvent::Frame(obs) => obs.captured_at,
                        _ => Utc::now(),
                    };
                    if let Err(err) = self.handle(event, now) {
                        break Err(err);
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break Err(EngineError::Disconnected),
            }
        };

        self.shutdown(Utc::now());
        result
    }

    /// Process one event at an explicit time. `run` calls this with the
    /// wall clock; tests drive it with a fabricated one.
    pub fn handle(&mut self, event: EngineEvent, now: DateTime<Utc>) -> Result<(), EngineError> {
        match event {
            EngineEvent::Frame(obs) => self.process_frame(obs, now),
            EngineEvent::KeyPress => self.handle_key_press(now),
            EngineEvent::MouseClick => self.handle_mouse_click(now),
            EngineEvent::Tick(tick) => self.handle_tick(tick, now),
            EngineEvent::CaptureFailed(reason) => {
                self.dispatcher
                    .announce(&format!("Monitoring stopped: {reason}"));
                return Err(EngineError::Capture(reason));
            }
            EngineEvent::SourceClosed => {}
        }
        Ok(())
    }

    fn process_frame(&mut self, obs: FrameObservation, now: DateTime<Utc>) {
        let fingerprints: Vec<Fingerprint> =
            obs.faces.iter().map(|face| face.fingerprint()).collect();
        let update = self.presence.update(&fingerprints, now);

        if update.primary_lost {
            // Whatever we knew about the old primary's eyes and posture
            // must not bleed into the next one.
            self.eye.reset(now);
            self.posture.reset();
            self.ear_smoother.reset();
            self.posture_smoother.reset();
        }
        if let Some(count) = update.multiple_users {
            self.dispatcher.try_fire(
                &self.store,
                AlertKind::MultipleUsers,
                &format!("{count} people are looking at the screen"),
                now,
            );
        }

        let dark = obs.brightness < LOW_LIGHT_BRIGHTNESS;
        if dark {
            // Eye landmarks are unreliable in the dark; suspend eye
            // monitoring entirely rather than raise false alerts.
            self.eye.reset(now);
            self.ear_smoother.reset();
            let since = *self.low_light_since.get_or_insert(now);
            if (now - since).num_seconds() >= LOW_LIGHT_SUSTAIN_SECS {
                let fired = self.dispatcher.try_fire(
                    &self.store,
                    AlertKind::LowLight,
                    "The room is too dark, turn on a light to protect your eyes",
                    now,
                );
                if fired {
                    self.low_light_since = Some(now);
                }
            }
        } else {
            self.low_light_since = None;
        }

        if self.presence.primary().is_none() {
            let since = *self.no_face_since.get_or_insert(now);
            if (now - since).num_seconds() >= NO_FACE_SUSTAIN_SECS {
                let fired = self.dispatcher.try_fire(
                    &self.store,
                    AlertKind::NoFaceDetected,
                    "No face detected, adjust your position or camera",
                    now,
                );
                if fired {
                    self.no_face_since = Some(now);
                }
            }
        } else {
            self.no_face_since = None;
        }

        let mut eye_health = None;
        if !dark {
            if let Some(primary) = self.presence.primary().cloned() {
                if let Some(face) = obs.faces.iter().find(|f| f.fingerprint() == primary) {
                    let ear = self.ear_smoother.push(face.eye_aspect_ratio());
                    let mut health = EyeHealth::Good;
                    for event in self.eye.observe(ear, now) {
                        match event {
                            EyeEvent::LowBlinkRate { blinks } => {
                                health = EyeHealth::LowBlinkRate;
                                self.dispatcher.try_fire(
                                    &self.store,
                                    AlertKind::LowBlinkRate,
                                    &format!(
                                        "Only {blinks} blinks in the last minute, \
                                         blink more to avoid dry eyes"
                                    ),
                                    now,
                                );
                            }
                            EyeEvent::Tired { closed_secs } => {
                                health = EyeHealth::Tired;
                                self.dispatcher.try_fire(
                                    &self.store,
                                    AlertKind::Tired,
                                    &format!(
                                        "Your eyes have been closed for {closed_secs} seconds, \
                                         you seem tired"
                                    ),
                                    now,
                                );
                            }
                            EyeEvent::StaticImage { since_blink_secs } => {
                                health = EyeHealth::NoBlink;
                                self.dispatcher.try_fire(
                                    &self.store,
                                    AlertKind::StaticImage,
                                    &format!("No blink detected for {since_blink_secs} seconds"),
                                    now,
                                );
                            }
                        }
                    }
                    eye_health = Some(health);
                }
            }
        }

        let mut posture_band = None;
        if self.presence.primary().is_some() {
            if let Some(pose) = obs.pose {
                let score = self
                    .posture_smoother
                    .push(pose.raw_posture_score())
                    .clamp(0.0, 100.0);
                posture_band = Some(PostureBand::from_score(score));
                match self.posture.observe(score, now) {
                    Some(PostureEvent::Warning { poor_secs }) => {
                        self.dispatcher.try_fire(
                            &self.store,
                            AlertKind::PostureWarning,
                            &format!("Your posture has been poor for {poor_secs} seconds"),
                            now,
                        );
                    }
                    Some(PostureEvent::Countdown { secs_until_alert }) => {
                        self.dispatcher.try_fire(
                            &self.store,
                            AlertKind::PostureCountdown,
                            &format!("Correct your posture within {secs_until_alert} seconds"),
                            now,
                        );
                    }
                    Some(PostureEvent::Alert { poor_secs }) => {
                        let fired = self.dispatcher.try_fire(
                            &self.store,
                            AlertKind::PostureAlert,
                            &format!(
                                "Sustained poor posture for {poor_secs} seconds, \
                                 sit up straight"
                            ),
                            now,
                        );
                        if fired {
                            self.posture.acknowledge_alert();
                        }
                    }
                    None => {}
                }
            }
        }

        if let Some(record) = self.presence.primary_record_mut() {
            if dark {
                record.eye = EyeHealth::LowLight;
            } else if let Some(health) = eye_health {
                record.eye = health;
            }
            if let Some(band) = posture_band {
                record.posture = Some(band);
            }
        }
    }

    fn handle_key_press(&mut self, now: DateTime<Utc>) {
        let outcome = self.activity.record_key_press();
        if outcome.limit_reached {
            self.dispatcher.try_fire(
                &self.store,
                AlertKind::KeyboardOveruse,
                "Heavy keyboard use, consider resting your hands",
                now,
            );
        }
        if outcome.flush > 0 {
            self.persist(ActivityDelta::keyboard(outcome.flush), now);
        }
    }

    fn handle_mouse_click(&mut self, now: DateTime<Utc>) {
        let outcome = self.activity.record_mouse_click();
        if outcome.limit_reached {
            self.dispatcher.try_fire(
                &self.store,
                AlertKind::MouseOveruse,
                "Heavy mouse use, consider resting your hands",
                now,
            );
        }
        if outcome.flush > 0 {
            self.persist(ActivityDelta::mouse(outcome.flush), now);
        }
    }

    fn handle_tick(&mut self, tick: TimerTick, now: DateTime<Utc>) {
        match tick {
            TimerTick::StatusRefresh => self.refresh_status(),
            TimerTick::SessionMinute => self.persist(ActivityDelta::session(60), now),
            TimerTick::BreakReminder => {
                self.dispatcher.try_fire(
                    &self.store,
                    AlertKind::BreakReminder,
                    "You have been working for an hour, take a break",
                    now,
                );
            }
        }
    }

    fn refresh_status(&mut self) {
        self.status.users_visible = self.presence.user_count();
        self.status.primary_present = self.presence.primary().is_some();
        self.status.blink_count = self.eye.blink_count();
        self.status.keyboard_count = self.activity.keyboard_count();
        self.status.mouse_count = self.activity.mouse_count();
        match self.presence.primary_record_mut() {
            Some(record) => {
                self.status.eye = record.eye;
                self.status.posture = record.posture;
            }
            None => {
                self.status.eye = EyeHealth::Unknown;
                self.status.posture = None;
            }
        }
    }

    /// Merge a delta into the retry buffer and attempt to persist it.
    /// On failure the buffer is retained for the next attempt.
    fn persist(&mut self, delta: ActivityDelta, now: DateTime<Utc>) {
        self.pending.merge(&delta);
        if self.pending.is_zero() {
            return;
        }
        match self.store.log_activity(&self.pending, now) {
            Ok(()) => self.pending = ActivityDelta::default(),
            Err(err) => warn!("failed to persist activity, will retry: {err}"),
        }
    }

    /// Final flush and reset. Called once when `run` exits.
    fn shutdown(&mut self, now: DateTime<Utc>) {
        let (keyboard, mouse) = self.activity.drain();
        let mut delta = ActivityDelta::keyboard(keyboard);
        delta.merge(&ActivityDelta::mouse(mouse));
        self.persist(delta, now);
        if !self.pending.is_zero() {
            warn!("dropping unpersisted activity: {:?}", self.pending);
            self.pending = ActivityDelta::default();
        }

        self.presence.reset();
        self.eye.reset(now);
        self.posture.reset();
        self.ear_smoother.reset();
        self.posture_smoother.reset();
        self.low_light_since = None;
        self.no_face_since = None;
        self.status = EngineStatus::new(self.session_id);

        self.dispatcher.announce("Work session monitoring stopped");
        info!("engine stopped, session {}", self.session_id);
    }

    pub fn status(&self) -> &EngineStatus {
        &self.status
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }
}
