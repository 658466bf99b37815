//! Presence tracking: who is in front of the camera, and who is primary.
//!
//! Users are keyed by the content-derived [`Fingerprint`]; records not seen
//! for [`USER_TIMEOUT_SECS`] are evicted. At most one user is primary at a
//! time. Election is deterministic: the lowest fingerprint among the
//! remaining users (a BTreeMap gives this for free).

use crate::engine::posture::PostureBand;
use crate::sensors::Fingerprint;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Seconds before a user that stopped appearing is considered gone.
pub const USER_TIMEOUT_SECS: i64 = 3;

/// Last observed eye-health condition of a tracked user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum EyeHealth {
    #[default]
    Unknown,
    Good,
    LowLight,
    LowBlinkRate,
    Tired,
    NoBlink,
}

/// One tracked user.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Fingerprint,
    pub last_seen: DateTime<Utc>,
    pub eye: EyeHealth,
    pub posture: Option<PostureBand>,
}

impl UserRecord {
    fn new(id: Fingerprint, now: DateTime<Utc>) -> Self {
        Self {
            id,
            last_seen: now,
            eye: EyeHealth::Unknown,
            posture: None,
        }
    }
}

/// What changed during one presence update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenceUpdate {
    /// The previous primary is gone. Downstream machines must fully reset,
    /// including when another user was elected in the same cycle.
    pub primary_lost: bool,
    /// The multiple-users condition latched this cycle, with the count.
    pub multiple_users: Option<usize>,
}

/// Tracks visible users and elects the primary.
pub struct PresenceTracker {
    users: BTreeMap<Fingerprint, UserRecord>,
    primary: Option<Fingerprint>,
    multiple_latched: bool,
    user_timeout: Duration,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::with_timeout(Duration::seconds(USER_TIMEOUT_SECS))
    }

    pub fn with_timeout(user_timeout: Duration) -> Self {
        Self {
            users: BTreeMap::new(),
            primary: None,
            multiple_latched: false,
            user_timeout,
        }
    }

    /// Process one frame's worth of detections.
    ///
    /// Upserts a record per detection, evicts stale records, retains or
    /// re-elects the primary, and manages the multiple-users latch.
    pub fn update(&mut self, detections: &[Fingerprint], now: DateTime<Utc>) -> PresenceUpdate {
        for fp in detections {
            self.users
                .entry(fp.clone())
                .or_insert_with(|| UserRecord::new(fp.clone(), now))
                .last_seen = now;
        }

        let timeout = self.user_timeout;
        self.users.retain(|_, rec| now - rec.last_seen <= timeout);

        let mut update = PresenceUpdate::default();

        if let Some(primary) = &self.primary {
            if !self.users.contains_key(primary) {
                self.primary = None;
                update.primary_lost = true;
            }
        }

        if self.primary.is_none() {
            if let Some(fp) = self.users.keys().next().cloned() {
                self.primary = Some(fp);
            }
        }

        if self.users.len() > 1 {
            if !self.multiple_latched {
                self.multiple_latched = true;
                update.multiple_users = Some(self.users.len());
            }
        } else {
            self.multiple_latched = false;
        }

        update
    }

    pub fn primary(&self) -> Option<&Fingerprint> {
        self.primary.as_ref()
    }

    pub fn primary_record_mut(&mut self) -> Option<&mut UserRecord> {
        let primary = self.primary.clone()?;
        self.users.get_mut(&primary)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.users.contains_key(fp)
    }

    pub fn multiple_users_latched(&self) -> bool {
        self.multiple_latched
    }

    /// Forget everything. Used on session stop.
    pub fn reset(&mut self) {
        self.users.clear();
        self.primary = None;
        self.multiple_latched = false;
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(s: &str) -> Fingerprint {
        Fingerprint::new(s)
    }

    #[test]
    fn test_first_sighting_becomes_primary() {
        let mut tracker = PresenceTracker::new();
        let now = Utc::now();
        tracker.update(&[fp("a")], now);
        assert_eq!(tracker.primary(), Some(&fp("a")));
        assert_eq!(tracker.user_count(), 1);
    }

    #[test]
    fn test_election_picks_lowest_fingerprint() {
        let mut tracker = PresenceTracker::new();
        let now = Utc::now();
        tracker.update(&[fp("c"), fp("a"), fp("b")], now);
        assert_eq!(tracker.primary(), Some(&fp("a")));
    }

    #[test]
    fn test_primary_retained_while_seen() {
        let mut tracker = PresenceTracker::new();
        let now = Utc::now();
        tracker.update(&[fp("b")], now);
        // A lower fingerprint showing up later does not steal the primary
        tracker.update(&[fp("a"), fp("b")], now + Duration::seconds(1));
        assert_eq!(tracker.primary(), Some(&fp("b")));
    }

    #[test]
    fn test_eviction_after_timeout() {
        let mut tracker = PresenceTracker::new();
        let now = Utc::now();
        tracker.update(&[fp("a")], now);
        // last_seen = now - timeout - 1s must be absent after the next update
        let later = now + Duration::seconds(USER_TIMEOUT_SECS + 1);
        tracker.update(&[], later);
        assert!(!tracker.contains(&fp("a")));
        assert_eq!(tracker.primary(), None);
    }

    #[test]
    fn test_survives_exactly_at_timeout() {
        let mut tracker = PresenceTracker::new();
        let now = Utc::now();
        tracker.update(&[fp("a")], now);
        let at_timeout = now + Duration::seconds(USER_TIMEOUT_SECS);
        let update = tracker.update(&[], at_timeout);
        assert!(tracker.contains(&fp("a")));
        assert!(!update.primary_lost);
    }

    #[test]
    fn test_primary_lost_emitted_once() {
        let mut tracker = PresenceTracker::new();
        let now = Utc::now();
        tracker.update(&[fp("a")], now);

        let later = now + Duration::seconds(USER_TIMEOUT_SECS + 1);
        let update = tracker.update(&[], later);
        assert!(update.primary_lost);

        let update = tracker.update(&[], later + Duration::seconds(1));
        assert!(!update.primary_lost);
    }

    #[test]
    fn test_primary_lost_when_replacement_elected() {
        let mut tracker = PresenceTracker::new();
        let now = Utc::now();
        tracker.update(&[fp("a"), fp("b")], now);
        assert_eq!(tracker.primary(), Some(&fp("a")));

        // Only "b" keeps appearing; when "a" times out, the loss must be
        // reported even though "b" takes over immediately.
        let later = now + Duration::seconds(USER_TIMEOUT_SECS + 1);
        let update = tracker.update(&[fp("b")], later);
        assert!(update.primary_lost);
        assert_eq!(tracker.primary(), Some(&fp("b")));
    }

    #[test]
    fn test_multiple_users_latches_once() {
        let mut tracker = PresenceTracker::new();
        let now = Utc::now();

        let update = tracker.update(&[fp("a"), fp("b")], now);
        assert_eq!(update.multiple_users, Some(2));

        let update = tracker.update(&[fp("a"), fp("b")], now + Duration::seconds(1));
        assert_eq!(update.multiple_users, None);
        assert!(tracker.multiple_users_latched());
    }

    #[test]
    fn test_multiple_users_latch_clears_and_rearms() {
        let mut tracker = PresenceTracker::new();
        let mut now = Utc::now();

        tracker.update(&[fp("a"), fp("b")], now);
        assert!(tracker.multiple_users_latched());

        // Second user leaves long enough to be evicted
        now = now + Duration::seconds(USER_TIMEOUT_SECS + 1);
        tracker.update(&[fp("a")], now);
        assert!(!tracker.multiple_users_latched());

        // Coming back re-raises the condition
        let update = tracker.update(&[fp("a"), fp("b")], now + Duration::seconds(1));
        assert_eq!(update.multiple_users, Some(2));
    }
}
