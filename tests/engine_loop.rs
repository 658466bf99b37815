//! End-to-end engine scenarios driven through the public API.

use chrono::{DateTime, Duration, Utc};
use desk_sentinel::engine::presence::EyeHealth;
use desk_sentinel::engine::producers::{spawn_capture, spawn_input};
use desk_sentinel::engine::{EngineEvent, FrameObservation, TimerTick, QUEUE_CAPACITY};
use desk_sentinel::sensors::synthetic::{face_with_ear, face_with_ear_at, pose_with_score};
use desk_sentinel::sensors::{ScriptedInput, ScriptedSession};
use desk_sentinel::{
    Dispatcher, Engine, MonitorSettings, Notifier, Speaker, Store,
};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Default, Clone)]
struct CapturedAlerts(Arc<Mutex<Vec<String>>>);

impl CapturedAlerts {
    fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count_containing(&self, needle: &str) -> usize {
        self.messages().iter().filter(|m| m.contains(needle)).count()
    }
}

impl Notifier for CapturedAlerts {
    fn notify(&mut self, message: &str) -> Result<(), desk_sentinel::alerts::NotifyError> {
        self.0.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

impl Speaker for CapturedAlerts {
    fn speak(&mut self, _message: &str) -> Result<(), desk_sentinel::alerts::NotifyError> {
        Ok(())
    }
}

fn engine_with_capture() -> (Engine, CapturedAlerts) {
    let alerts = CapturedAlerts::default();
    let dispatcher = Dispatcher::new(Box::new(alerts.clone()), Box::new(alerts.clone()));
    let engine = Engine::new(
        MonitorSettings::default(),
        Store::open_in_memory().unwrap(),
        dispatcher,
        Utc::now(),
    );
    (engine, alerts)
}

fn lit_frame(ear: f64, score: f64, at: DateTime<Utc>) -> EngineEvent {
    EngineEvent::Frame(FrameObservation {
        faces: vec![face_with_ear(ear)],
        pose: Some(pose_with_score(score)),
        brightness: 120.0,
        captured_at: at,
    })
}

fn empty_frame(at: DateTime<Utc>) -> EngineEvent {
    EngineEvent::Frame(FrameObservation {
        faces: Vec::new(),
        pose: None,
        brightness: 120.0,
        captured_at: at,
    })
}

fn dark_frame(at: DateTime<Utc>) -> EngineEvent {
    EngineEvent::Frame(FrameObservation {
        faces: Vec::new(),
        pose: None,
        brightness: 10.0,
        captured_at: at,
    })
}

#[test]
fn no_face_alert_sustains_and_rearms() {
    let (mut engine, alerts) = engine_with_capture();
    let start = Utc::now();

    // Empty well-lit frames every second for 21 seconds
    for i in 0..=21 {
        let now = start + Duration::seconds(i);
        engine.handle(empty_frame(now), now).unwrap();
    }

    // Fired at 10s, re-armed, fired again at 20s
    assert_eq!(alerts.count_containing("No face detected"), 2);
}

#[test]
fn low_light_suspends_blink_counting() {
    let (mut engine, _alerts) = engine_with_capture();
    let start = Utc::now();

    // Three open then three closed frames produce exactly one blink
    for (i, ear) in [0.55, 0.55, 0.55, 0.2, 0.2, 0.2].iter().enumerate() {
        let now = start + Duration::milliseconds(200 * i as i64);
        engine.handle(lit_frame(*ear, 85.0, now), now).unwrap();
    }
    let now = start + Duration::seconds(2);
    engine
        .handle(EngineEvent::Tick(TimerTick::StatusRefresh), now)
        .unwrap();
    assert_eq!(engine.status().blink_count, 1);

    // A dark frame wipes the window rather than let dark time count
    engine.handle(dark_frame(now), now).unwrap();
    engine
        .handle(EngineEvent::Tick(TimerTick::StatusRefresh), now)
        .unwrap();
    assert_eq!(engine.status().blink_count, 0);
    // The still-tracked primary is flagged as unmonitorable
    assert_eq!(engine.status().eye, EyeHealth::LowLight);
}

#[test]
fn blink_starved_minute_raises_alert() {
    let (mut engine, alerts) = engine_with_capture();
    let start = Utc::now();

    // Eyes open the whole minute: zero blinks
    for i in 0..=61 {
        let now = start + Duration::seconds(i);
        engine.handle(lit_frame(0.55, 85.0, now), now).unwrap();
    }

    assert_eq!(alerts.count_containing("blinks in the last minute"), 1);
    // The liveness watchdog also tripped along the way
    assert_eq!(alerts.count_containing("No blink detected"), 1);
}

#[test]
fn posture_escalates_through_three_stages() {
    let (mut engine, alerts) = engine_with_capture();
    let start = Utc::now();

    for i in 0..=125 {
        let now = start + Duration::seconds(i);
        engine.handle(lit_frame(0.55, 20.0, now), now).unwrap();
    }

    assert_eq!(alerts.count_containing("has been poor for"), 1);
    assert_eq!(alerts.count_containing("Correct your posture within"), 1);
    assert_eq!(alerts.count_containing("sit up straight"), 1);
}

#[test]
fn second_face_raises_multiple_users_once() {
    let (mut engine, alerts) = engine_with_capture();
    let start = Utc::now();

    for i in 0..5 {
        let now = start + Duration::seconds(i);
        let event = EngineEvent::Frame(FrameObservation {
            faces: vec![face_with_ear(0.55), face_with_ear_at(0.55, 0.2)],
            pose: None,
            brightness: 120.0,
            captured_at: now,
        });
        engine.handle(event, now).unwrap();
    }

    assert_eq!(alerts.count_containing("people are looking"), 1);
}

#[test]
fn activity_flushes_merge_into_one_session_window() {
    let (mut engine, _alerts) = engine_with_capture();
    let start = Utc::now();

    for _ in 0..100 {
        engine.handle(EngineEvent::KeyPress, start).unwrap();
    }
    let later = start + Duration::minutes(2);
    for _ in 0..100 {
        engine.handle(EngineEvent::MouseClick, later).unwrap();
    }

    let totals = engine
        .store()
        .totals_since(start - Duration::seconds(1))
        .unwrap();
    assert_eq!(totals.keyboard_activity, 100);
    assert_eq!(totals.mouse_activity, 100);

    // Both flushes merged into the record stamped at the first flush
    let totals = engine
        .store()
        .totals_since(start + Duration::minutes(1))
        .unwrap();
    assert_eq!(totals.keyboard_activity, 0);
    assert_eq!(totals.mouse_activity, 0);
}

#[test]
fn input_listener_feeds_activity_accounting() {
    let (mut engine, _alerts) = engine_with_capture();
    let started = Utc::now();

    let (tx, rx) = crossbeam_channel::bounded(QUEUE_CAPACITY);
    let running = Arc::new(AtomicBool::new(true));

    // Enqueue the whole input burst before the frames, so the source-closed
    // marker arrives last and the run drains everything deterministically
    let input = ScriptedInput::typing_burst(120, 30, std::time::Duration::ZERO);
    spawn_input(Box::new(input), tx.clone(), running.clone())
        .unwrap()
        .join()
        .unwrap();

    let (camera, detector) = ScriptedSession::demo(5, 0).split();
    let capture = spawn_capture(
        Box::new(camera),
        Box::new(detector),
        tx,
        running.clone(),
        std::time::Duration::from_millis(1),
    )
    .unwrap();

    engine.run(&rx, running).unwrap();
    capture.join().unwrap();

    // 100 flushed at the boundary, the rest drained at shutdown
    let totals = engine
        .store()
        .totals_since(started - Duration::seconds(1))
        .unwrap();
    assert_eq!(totals.keyboard_activity, 120);
    assert_eq!(totals.mouse_activity, 30);
}

#[test]
fn frame_state_follows_capture_timestamps() {
    let (mut engine, alerts) = engine_with_capture();
    let start = Utc::now();

    let (tx, rx) = crossbeam_channel::bounded(QUEUE_CAPACITY);
    // Two empty frames captured 11 seconds apart, drained back to back
    for offset in [0, 11] {
        let at = start + Duration::seconds(offset);
        tx.send(EngineEvent::Frame(FrameObservation {
            faces: Vec::new(),
            pose: None,
            brightness: 120.0,
            captured_at: at,
        }))
        .unwrap();
    }
    tx.send(EngineEvent::SourceClosed).unwrap();
    drop(tx);

    engine.run(&rx, Arc::new(AtomicBool::new(true))).unwrap();

    // The no-face sustain is measured on the capture clock
    assert_eq!(alerts.count_containing("No face detected"), 1);
}

#[test]
fn scripted_session_runs_to_completion() {
    let alerts = CapturedAlerts::default();
    let dispatcher = Dispatcher::new(Box::new(alerts.clone()), Box::new(alerts.clone()));
    let mut engine = Engine::new(
        MonitorSettings::default(),
        Store::open_in_memory().unwrap(),
        dispatcher,
        Utc::now(),
    );

    let (camera, detector) = ScriptedSession::demo(50, 10).split();
    let (tx, rx) = crossbeam_channel::bounded(QUEUE_CAPACITY);
    let running = Arc::new(AtomicBool::new(true));

    let capture = spawn_capture(
        Box::new(camera),
        Box::new(detector),
        tx,
        running.clone(),
        std::time::Duration::from_millis(1),
    )
    .unwrap();

    engine.run(&rx, running).unwrap();
    capture.join().unwrap();

    assert_eq!(alerts.count_containing("monitoring started"), 1);
    assert_eq!(alerts.count_containing("monitoring stopped"), 1);
}
