//! Moving-average smoothing for raw scalar signals.
//!
//! Raw per-frame measurements are noisy; the eye-aspect-ratio uses a short
//! window of 3 frames for fast blink response, the posture score a window
//! of 5.

use std::collections::VecDeque;

/// Smoothing window for eye-aspect-ratio samples.
pub const EAR_WINDOW: usize = 3;

/// Smoothing window for posture score samples.
pub const POSTURE_WINDOW: usize = 5;

/// Bounded first-in-first-out moving average.
#[derive(Debug, Clone)]
pub struct Smoother {
    window: usize,
    values: VecDeque<f64>,
}

impl Smoother {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            values: VecDeque::with_capacity(window.max(1)),
        }
    }

    /// Push a raw value and return the mean of the buffer including it.
    pub fn push(&mut self, raw: f64) -> f64 {
        self.values.push_back(raw);
        if self.values.len() > self.window {
            self.values.pop_front();
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Drop all accumulated history.
    pub fn reset(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_includes_new_value() {
        let mut smoother = Smoother::new(3);
        assert_eq!(smoother.push(1.0), 1.0);
        assert_eq!(smoother.push(3.0), 2.0);
        assert_eq!(smoother.push(5.0), 3.0);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut smoother = Smoother::new(3);
        smoother.push(9.0);
        smoother.push(3.0);
        smoother.push(3.0);
        // 9.0 falls out of the window
        assert_eq!(smoother.push(3.0), 3.0);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut smoother = Smoother::new(3);
        smoother.push(100.0);
        smoother.reset();
        assert!(smoother.is_empty());
        assert_eq!(smoother.push(2.0), 2.0);
    }
}
