//! Posture state machine: staged bad-posture escalation.
//!
//! Operates on the smoothed, clamped posture score of the primary user.
//! Inside the Poor band a timer drives three stages: a latched warning at
//! 30s, a latched countdown at 60s, and from the configured threshold
//! onward an alert candidate every cycle, gated by the dispatcher's
//! cooldown. The every-cycle stage-three behavior is intentional; its own
//! cooldown makes it a periodic reminder rather than a one-shot.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Scores below this are the Poor band.
pub const POOR_THRESHOLD: f64 = 40.0;

/// Scores at or above this are the Good band.
pub const GOOD_THRESHOLD: f64 = 70.0;

/// Seconds of Poor posture before the stage-one warning.
pub const WARNING_AFTER_SECS: i64 = 30;

/// Seconds of Poor posture before the stage-two countdown.
pub const COUNTDOWN_AFTER_SECS: i64 = 60;

/// Posture quality band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PostureBand {
    Good,
    Fair,
    Poor,
}

impl PostureBand {
    pub fn from_score(score: f64) -> Self {
        if score >= GOOD_THRESHOLD {
            PostureBand::Good
        } else if score >= POOR_THRESHOLD {
            PostureBand::Fair
        } else {
            PostureBand::Poor
        }
    }
}

/// Candidate alerts from one posture observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostureEvent {
    /// Stage one: posture has been Poor for `poor_secs`.
    Warning { poor_secs: i64 },
    /// Stage two: `secs_until_alert` left to correct before the alert.
    Countdown { secs_until_alert: i64 },
    /// Stage three: sustained Poor posture past the configured threshold.
    Alert { poor_secs: i64 },
}

/// Staged bad-posture timer.
pub struct PostureMonitor {
    alert_after: Duration,
    poor_since: Option<DateTime<Utc>>,
    warning_fired: bool,
    countdown_fired: bool,
}

impl PostureMonitor {
    pub fn new(alert_after_secs: i64) -> Self {
        Self {
            alert_after: Duration::seconds(alert_after_secs),
            poor_since: None,
            warning_fired: false,
            countdown_fired: false,
        }
    }

    /// Feed one smoothed posture score.
    ///
    /// Leaving the Poor band resets the timer and all latches
    /// unconditionally.
    pub fn observe(&mut self, smoothed_score: f64, now: DateTime<Utc>) -> Option<PostureEvent> {
        if PostureBand::from_score(smoothed_score) != PostureBand::Poor {
            self.reset();
            return None;
        }

        let since = *self.poor_since.get_or_insert(now);
        let poor_secs = (now - since).num_seconds();
        let alert_after_secs = self.alert_after.num_seconds();

        if poor_secs >= alert_after_secs {
            Some(PostureEvent::Alert { poor_secs })
        } else if poor_secs >= COUNTDOWN_AFTER_SECS {
            if self.countdown_fired {
                None
            } else {
                self.countdown_fired = true;
                Some(PostureEvent::Countdown {
                    secs_until_alert: alert_after_secs - poor_secs,
                })
            }
        } else if poor_secs >= WARNING_AFTER_SECS {
            if self.warning_fired {
                None
            } else {
                self.warning_fired = true;
                Some(PostureEvent::Warning { poor_secs })
            }
        } else {
            None
        }
    }

    /// Called when a stage-three alert actually fired, so the warning stage
    /// re-arms for the next entry into its band.
    pub fn acknowledge_alert(&mut self) {
        self.warning_fired = false;
    }

    /// Reset the timer and all latches.
    pub fn reset(&mut self) {
        self.poor_since = None;
        self.warning_fired = false;
        self.countdown_fired = false;
    }

    /// Seconds spent in the Poor band so far, if inside it.
    pub fn poor_secs(&self, now: DateTime<Utc>) -> Option<i64> {
        self.poor_since.map(|since| (now - since).num_seconds())
    }
}
