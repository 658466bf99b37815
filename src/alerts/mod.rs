//! Alert dispatch: notification, speech, per-kind cooldowns, accounting.
//!
//! All alert traffic funnels through the [`Dispatcher`]. State machines
//! upstream emit candidates freely; the dispatcher decides whether each one
//! actually fires, based on a per-kind cooldown table. A fired alert goes to
//! the notifier and the speaker, and bumps the matching activity counter in
//! the store. Sink failures are logged and never abort the session.

use crate::store::{ActivityDelta, Store};
use chrono::{DateTime, Duration, Utc};
use log::warn;
use std::collections::HashMap;
use thiserror::Error;

/// Every alert the engine can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    LowBlinkRate,
    Tired,
    StaticImage,
    PostureWarning,
    PostureCountdown,
    PostureAlert,
    MultipleUsers,
    NoFaceDetected,
    LowLight,
    KeyboardOveruse,
    MouseOveruse,
    BreakReminder,
}

/// Which stored activity counter a fired alert increments, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertCounter {
    Eye,
    Posture,
    LowLight,
    Break,
}

impl AlertKind {
    pub fn counter(self) -> Option<AlertCounter> {
        match self {
            AlertKind::LowBlinkRate | AlertKind::Tired | AlertKind::StaticImage => {
                Some(AlertCounter::Eye)
            }
            AlertKind::PostureWarning | AlertKind::PostureCountdown | AlertKind::PostureAlert => {
                Some(AlertCounter::Posture)
            }
            AlertKind::LowLight => Some(AlertCounter::LowLight),
            AlertKind::BreakReminder => Some(AlertCounter::Break),
            AlertKind::MultipleUsers
            | AlertKind::NoFaceDetected
            | AlertKind::KeyboardOveruse
            | AlertKind::MouseOveruse => None,
        }
    }
}

#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Visual notification sink (desktop popup, log line, test capture).
pub trait Notifier: Send {
    fn notify(&mut self, message: &str) -> Result<(), NotifyError>;
}

/// Spoken notification sink.
pub trait Speaker: Send {
    fn speak(&mut self, message: &str) -> Result<(), NotifyError>;
}

/// Notifier that writes to the log. The default on headless setups.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, message: &str) -> Result<(), NotifyError> {
        log::info!("[notify] {message}");
        Ok(())
    }
}

/// Speaker that writes to the log instead of synthesizing speech.
#[derive(Debug, Default)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&mut self, message: &str) -> Result<(), NotifyError> {
        log::info!("[speak] {message}");
        Ok(())
    }
}

/// Cooldown-gated alert sink.
pub struct Dispatcher {
    notifier: Box<dyn Notifier>,
    speaker: Box<dyn Speaker>,
    cooldowns: HashMap<AlertKind, Duration>,
    last_fired: HashMap<AlertKind, DateTime<Utc>>,
}

impl Dispatcher {
    pub fn new(notifier: Box<dyn Notifier>, speaker: Box<dyn Speaker>) -> Self {
        let mut cooldowns = HashMap::new();
        cooldowns.insert(AlertKind::Tired, Duration::seconds(300));
        cooldowns.insert(AlertKind::StaticImage, Duration::seconds(300));
        cooldowns.insert(AlertKind::PostureAlert, Duration::seconds(180));
        Self {
            notifier,
            speaker,
            cooldowns,
            last_fired: HashMap::new(),
        }
    }

    /// Override the cooldown for one kind. Mostly for tests.
    pub fn set_cooldown(&mut self, kind: AlertKind, cooldown: Duration) {
        self.cooldowns.insert(kind, cooldown);
    }

    /// Fire an alert unless its cooldown is still running.
    ///
    /// Returns whether it fired, so callers can re-arm their own timers only
    /// on an actual delivery.
    pub fn try_fire(
        &mut self,
        store: &Store,
        kind: AlertKind,
        message: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if let (Some(cooldown), Some(last)) = (self.cooldowns.get(&kind), self.last_fired.get(&kind))
        {
            if now - *last < *cooldown {
                return false;
            }
        }
        self.last_fired.insert(kind, now);

        self.deliver(message);

        let delta = match kind.counter() {
            Some(AlertCounter::Eye) => ActivityDelta::eye_alert(),
            Some(AlertCounter::Posture) => ActivityDelta::posture_alert(),
            Some(AlertCounter::LowLight) => ActivityDelta::low_light(),
            Some(AlertCounter::Break) => ActivityDelta::break_taken(),
            None => return true,
        };
        if let Err(err) = store.log_activity(&delta, now) {
            warn!("failed to record {kind:?} alert: {err}");
        }
        true
    }

    /// Deliver a session-level announcement, bypassing cooldowns and
    /// accounting. Used for start, stop, and fatal-error messages.
    pub fn announce(&mut self, message: &str) {
        self.deliver(message);
    }

    fn deliver(&mut self, message: &str) {
        if let Err(err) = self.notifier.notify(message) {
            warn!("notifier failed: {err}");
        }
        if let Err(err) = self.speaker.speak(message) {
            warn!("speaker failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct Capture(Arc<Mutex<Vec<String>>>);

    impl Capture {
        fn messages(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Notifier for Capture {
        fn notify(&mut self, message: &str) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    impl Speaker for Capture {
        fn speak(&mut self, message: &str) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(format!("spoken: {message}"));
            Ok(())
        }
    }

    fn dispatcher_with_capture() -> (Dispatcher, Capture) {
        let capture = Capture::default();
        let dispatcher = Dispatcher::new(Box::new(capture.clone()), Box::new(LogSpeaker));
        (dispatcher, capture)
    }

    #[test]
    fn test_kind_without_cooldown_always_fires() {
        let store = Store::open_in_memory().unwrap();
        let (mut dispatcher, capture) = dispatcher_with_capture();
        let now = Utc::now();

        assert!(dispatcher.try_fire(&store, AlertKind::LowBlinkRate, "blink more", now));
        assert!(dispatcher.try_fire(
            &store,
            AlertKind::LowBlinkRate,
            "blink more",
            now + Duration::milliseconds(100)
        ));
        assert_eq!(capture.messages().len(), 2);
    }

    #[test]
    fn test_cooldown_suppresses_refire() {
        let store = Store::open_in_memory().unwrap();
        let (mut dispatcher, capture) = dispatcher_with_capture();
        let now = Utc::now();

        assert!(dispatcher.try_fire(&store, AlertKind::Tired, "you look tired", now));
        assert!(!dispatcher.try_fire(
            &store,
            AlertKind::Tired,
            "you look tired",
            now + Duration::seconds(299)
        ));
        assert!(dispatcher.try_fire(
            &store,
            AlertKind::Tired,
            "you look tired",
            now + Duration::seconds(300)
        ));
        assert_eq!(capture.messages().len(), 2);
    }

    #[test]
    fn test_cooldowns_are_per_kind() {
        let store = Store::open_in_memory().unwrap();
        let (mut dispatcher, _capture) = dispatcher_with_capture();
        let now = Utc::now();

        assert!(dispatcher.try_fire(&store, AlertKind::Tired, "tired", now));
        // A different cooled-down kind is unaffected
        assert!(dispatcher.try_fire(&store, AlertKind::StaticImage, "still there?", now));
    }

    #[test]
    fn test_fired_alert_updates_store_counters() {
        let store = Store::open_in_memory().unwrap();
        let (mut dispatcher, _capture) = dispatcher_with_capture();
        let now = Utc::now();

        dispatcher.try_fire(&store, AlertKind::Tired, "tired", now);
        dispatcher.try_fire(&store, AlertKind::PostureAlert, "sit up", now);
        dispatcher.try_fire(&store, AlertKind::LowLight, "too dark", now);
        dispatcher.try_fire(&store, AlertKind::BreakReminder, "take a break", now);
        // No counter for this one
        dispatcher.try_fire(&store, AlertKind::KeyboardOveruse, "rest your hands", now);

        let totals = store.totals_since(now - Duration::hours(1)).unwrap();
        assert_eq!(totals.eye_alerts, 1);
        assert_eq!(totals.posture_alerts, 1);
        assert_eq!(totals.low_light_alerts, 1);
        assert_eq!(totals.breaks_taken, 1);
    }

    #[test]
    fn test_suppressed_alert_leaves_store_untouched() {
        let store = Store::open_in_memory().unwrap();
        let (mut dispatcher, _capture) = dispatcher_with_capture();
        let now = Utc::now();

        dispatcher.try_fire(&store, AlertKind::Tired, "tired", now);
        dispatcher.try_fire(&store, AlertKind::Tired, "tired", now + Duration::seconds(1));

        let totals = store.totals_since(now - Duration::hours(1)).unwrap();
        assert_eq!(totals.eye_alerts, 1);
    }

    #[test]
    fn test_announce_bypasses_cooldowns() {
        let (mut dispatcher, capture) = dispatcher_with_capture();
        dispatcher.announce("session started");
        dispatcher.announce("session started");
        assert_eq!(capture.messages().len(), 2);
    }
}
