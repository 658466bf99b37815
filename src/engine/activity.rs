//! Input activity counting with incremental flushing.
//!
//! Keyboard and mouse events are counted independently. Every 100 events a
//! counter hands its unflushed tally to the engine for persistence; hitting
//! the configured overuse limit flushes whatever is unflushed and zeroes the
//! counter, so persisted tallies across a full cycle sum to exactly the
//! limit.

/// Events accumulated before an incremental flush.
pub const FLUSH_EVERY: u32 = 100;

/// What one recorded event asks the engine to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityOutcome {
    /// Unflushed events to persist now (0 means nothing to do).
    pub flush: u32,
    /// The overuse limit was reached; the counter has restarted from zero.
    pub limit_reached: bool,
}

#[derive(Debug, Default)]
struct Counter {
    total: u32,
    unflushed: u32,
}

impl Counter {
    fn record(&mut self, limit: u32) -> ActivityOutcome {
        self.total += 1;
        self.unflushed += 1;

        if self.total >= limit {
            let flush = self.unflushed;
            self.total = 0;
            self.unflushed = 0;
            ActivityOutcome {
                flush,
                limit_reached: true,
            }
        } else if self.unflushed >= FLUSH_EVERY {
            let flush = self.unflushed;
            self.unflushed = 0;
            ActivityOutcome {
                flush,
                limit_reached: false,
            }
        } else {
            ActivityOutcome::default()
        }
    }
}

/// Keyboard and mouse counters for the current session.
pub struct ActivityAggregator {
    keyboard: Counter,
    mouse: Counter,
    keyboard_limit: u32,
    mouse_limit: u32,
}

impl ActivityAggregator {
    pub fn new(keyboard_limit: u32, mouse_limit: u32) -> Self {
        Self {
            keyboard: Counter::default(),
            mouse: Counter::default(),
            keyboard_limit,
            mouse_limit,
        }
    }

    pub fn record_key_press(&mut self) -> ActivityOutcome {
        self.keyboard.record(self.keyboard_limit)
    }

    pub fn record_mouse_click(&mut self) -> ActivityOutcome {
        self.mouse.record(self.mouse_limit)
    }

    /// Running total since the last limit reset.
    pub fn keyboard_count(&self) -> u32 {
        self.keyboard.total
    }

    pub fn mouse_count(&self) -> u32 {
        self.mouse.total
    }

    /// Take whatever is unflushed, for a final flush at session stop.
    pub fn drain(&mut self) -> (u32, u32) {
        let out = (self.keyboard.unflushed, self.mouse.unflushed);
        self.keyboard = Counter::default();
        self.mouse = Counter::default();
        out
    }

    pub fn reset(&mut self) {
        self.keyboard = Counter::default();
        self.mouse = Counter::default();
    }
}
