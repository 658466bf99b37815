//! Eye state machine: blink counting, tiredness, liveness.
//!
//! Operates on the smoothed eye-aspect-ratio of the primary user only, and
//! only above the low-light threshold. The engine calls [`EyeMonitor::reset`]
//! on low light, lost primary, or session stop; resetting restarts the blink
//! window and treats "now" as the last blink so dark time never reads as a
//! missed blink.
//!
//! Tiredness and static-image candidates are emitted every cycle while their
//! condition holds; the alert dispatcher's cooldowns turn them into
//! periodic alerts.

use chrono::{DateTime, Duration, Utc};

/// Blink-rate window length.
pub const BLINK_WINDOW_SECS: i64 = 60;

/// Sustained closed-eye duration treated as tiredness.
pub const EYES_CLOSED_ALERT_SECS: i64 = 30;

/// No-blink duration treated as a liveness failure (static image).
pub const NO_BLINK_ALERT_SECS: i64 = 50;

/// Candidate alerts from one eye-state observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EyeEvent {
    /// The per-minute window rolled over with too few blinks.
    LowBlinkRate { blinks: u32 },
    /// Eyes have been closed continuously for `closed_secs`.
    Tired { closed_secs: i64 },
    /// No blink observed for `since_blink_secs`; possibly not a live user.
    StaticImage { since_blink_secs: i64 },
}

/// Per-primary-user eye state.
pub struct EyeMonitor {
    ear_threshold: f64,
    min_blink_threshold: u32,
    eyes_closed: bool,
    blink_count: u32,
    window_start: DateTime<Utc>,
    closed_since: Option<DateTime<Utc>>,
    last_blink: DateTime<Utc>,
}

impl EyeMonitor {
    pub fn new(ear_threshold: f64, min_blink_threshold: u32, now: DateTime<Utc>) -> Self {
        Self {
            ear_threshold,
            min_blink_threshold,
            eyes_closed: false,
            blink_count: 0,
            window_start: now,
            closed_since: None,
            last_blink: now,
        }
    }

    /// Feed one smoothed eye-aspect-ratio sample.
    ///
    /// A blink is counted exactly once per open-to-closed transition;
    /// sustained closed or sustained open runs never increment the counter.
    pub fn observe(&mut self, smoothed_ear: f64, now: DateTime<Utc>) -> Vec<EyeEvent> {
        let mut events = Vec::new();
        let closed = smoothed_ear <= self.ear_threshold;

        if closed && !self.eyes_closed {
            self.blink_count += 1;
            self.last_blink = now;
        }
        if closed {
            if self.closed_since.is_none() {
                self.closed_since = Some(now);
            }
        } else {
            self.closed_since = None;
        }
        self.eyes_closed = closed;

        if now - self.window_start >= Duration::seconds(BLINK_WINDOW_SECS) {
            if self.blink_count < self.min_blink_threshold {
                events.push(EyeEvent::LowBlinkRate {
                    blinks: self.blink_count,
                });
            }
            self.blink_count = 0;
            self.window_start = now;
        }

        if let Some(since) = self.closed_since {
            let closed_secs = (now - since).num_seconds();
            if closed_secs >= EYES_CLOSED_ALERT_SECS {
                events.push(EyeEvent::Tired { closed_secs });
            }
        }

        let since_blink_secs = (now - self.last_blink).num_seconds();
        if since_blink_secs >= NO_BLINK_ALERT_SECS {
            events.push(EyeEvent::StaticImage { since_blink_secs });
        }

        events
    }

    /// Full reset: restart the blink window, clear the closed-eye timer, and
    /// treat `now` as the last blink.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.eyes_closed = false;
        self.blink_count = 0;
        self.window_start = now;
        self.closed_since = None;
        self.last_blink = now;
    }

    pub fn blink_count(&self) -> u32 {
        self.blink_count
    }

    pub fn eyes_closed(&self) -> bool {
        self.eyes_closed
    }
}
