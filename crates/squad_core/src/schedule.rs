//! Deterministic periodic tasks.
//!
//! The simulation never reads a wall clock. Anything that must happen every
//! N seconds is a [`ScheduledTask`] advanced explicitly with the tick delta.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed};

/// A task that fires once every `interval` seconds of simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduledTask {
    #[serde(with = "fixed_serde")]
    interval: Fixed,
    #[serde(with = "fixed_serde")]
    elapsed: Fixed,
}

impl ScheduledTask {
    /// Create a task. A non-positive interval disables it.
    #[must_use]
    pub fn new(interval: Fixed) -> Self {
        Self {
            interval: interval.max(Fixed::ZERO),
            elapsed: Fixed::ZERO,
        }
    }

    /// Seconds between firings.
    #[must_use]
    pub const fn interval(&self) -> Fixed {
        self.interval
    }

    /// Seconds accumulated since the last firing.
    #[must_use]
    pub const fn elapsed(&self) -> Fixed {
        self.elapsed
    }

    /// Check whether the task can ever fire.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.interval > Fixed::ZERO
    }

    /// Advance by `delta` seconds and return how many times the task fired.
    ///
    /// Leftover time carries over, so firing is independent of how the
    /// elapsed time was split into ticks.
    pub fn advance(&mut self, delta: Fixed) -> u32 {
        if !self.is_enabled() || delta <= Fixed::ZERO {
            return 0;
        }

        self.elapsed = self.elapsed.saturating_add(delta);
        if self.elapsed < self.interval {
            return 0;
        }

        let fires = self
            .elapsed
            .checked_div(self.interval)
            .map_or(Fixed::MAX, Fixed::floor);
        self.elapsed = self
            .elapsed
            .saturating_sub(fires.saturating_mul(self.interval))
            .max(Fixed::ZERO);
        fires.checked_to_num::<u32>().unwrap_or(u32::MAX)
    }

    /// Restart the accumulator without firing.
    pub fn reset(&mut self) {
        self.elapsed = Fixed::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_per_interval() {
        let mut task = ScheduledTask::new(Fixed::from_num(1));
        let half = Fixed::from_num(0.5);

        assert_eq!(task.advance(half), 0);
        assert_eq!(task.advance(half), 1);
        assert_eq!(task.elapsed(), Fixed::ZERO);
        assert_eq!(task.advance(half), 0);
    }

    #[test]
    fn test_large_delta_fires_multiple_times() {
        let mut task = ScheduledTask::new(Fixed::from_num(1));
        assert_eq!(task.advance(Fixed::from_num(3.25)), 3);
        assert_eq!(task.elapsed(), Fixed::from_num(0.25));
    }

    #[test]
    fn test_split_ticks_match_single_tick() {
        let mut split = ScheduledTask::new(Fixed::from_num(2));
        let mut single = ScheduledTask::new(Fixed::from_num(2));

        let fired: u32 = (0..10).map(|_| split.advance(Fixed::from_num(0.5))).sum();
        assert_eq!(fired, single.advance(Fixed::from_num(5)));
        assert_eq!(split.elapsed(), single.elapsed());
    }

    #[test]
    fn test_disabled_task_never_fires() {
        let mut task = ScheduledTask::new(Fixed::ZERO);
        assert!(!task.is_enabled());
        assert_eq!(task.advance(Fixed::from_num(100)), 0);

        let mut negative = ScheduledTask::new(Fixed::from_num(-1));
        assert_eq!(negative.advance(Fixed::from_num(100)), 0);
    }

    #[test]
    fn test_negative_delta_ignored() {
        let mut task = ScheduledTask::new(Fixed::from_num(1));
        task.advance(Fixed::from_num(0.5));
        assert_eq!(task.advance(Fixed::from_num(-5)), 0);
        assert_eq!(task.elapsed(), Fixed::from_num(0.5));
        task.reset();
        assert_eq!(task.elapsed(), Fixed::ZERO);
    }
}
