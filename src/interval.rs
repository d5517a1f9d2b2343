// Copyright 2022 Jeff Kim <hiking90@gmail.com>
// SPDX-License-Identifier: Apache-2.0

use std::time::{Duration, Instant, SystemTime};

/// Clock tier used by a [`TimeInterval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntervalAccuracy {
    /// Wall clock. Cheap, but may jump; a backwards jump measures as zero.
    #[default]
    Coarse,
    /// Monotonic high-resolution clock.
    Fine,
}

#[derive(Debug, Clone, Copy)]
enum Mark {
    Wall(SystemTime),
    Monotonic(Instant),
}

impl Mark {
    fn now(accuracy: IntervalAccuracy) -> Self {
        match accuracy {
            IntervalAccuracy::Coarse => Mark::Wall(SystemTime::now()),
            IntervalAccuracy::Fine => Mark::Monotonic(Instant::now()),
        }
    }

    fn elapsed(&self) -> Duration {
        match self {
            Mark::Wall(at) => at.elapsed().unwrap_or(Duration::ZERO),
            Mark::Monotonic(at) => at.elapsed(),
        }
    }
}

/// Stopwatch-like elapsed time tracker.
///
/// Time accumulates across start/stop spans until [`restart`](TimeInterval::restart).
#[derive(Debug, Clone)]
pub struct TimeInterval {
    accuracy: IntervalAccuracy,
    running: Option<Mark>,
    accumulated: Duration,
}

impl TimeInterval {
    pub fn new(accuracy: IntervalAccuracy) -> Self {
        Self {
            accuracy,
            running: None,
            accumulated: Duration::ZERO,
        }
    }

    /// Picks the tier from a "measure fine-grained time" switch.
    pub fn with_fine_grained(measure_fine_grained: bool) -> Self {
        if measure_fine_grained {
            Self::new(IntervalAccuracy::Fine)
        } else {
            Self::new(IntervalAccuracy::Coarse)
        }
    }

    /// Creates an interval that is already running.
    pub fn start_new(accuracy: IntervalAccuracy) -> Self {
        let mut interval = Self::new(accuracy);
        interval.start();
        interval
    }

    pub fn accuracy(&self) -> IntervalAccuracy {
        self.accuracy
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Starts measuring. Has no effect while already running.
    pub fn start(&mut self) {
        if self.running.is_none() {
            self.running = Some(Mark::now(self.accuracy));
        }
    }

    /// Stops measuring and folds the current span into the total.
    pub fn stop(&mut self) {
        if let Some(mark) = self.running.take() {
            self.accumulated += mark.elapsed();
        }
    }

    /// Clears the total and starts a fresh span.
    pub fn restart(&mut self) {
        self.accumulated = Duration::ZERO;
        self.running = Some(Mark::now(self.accuracy));
    }

    /// Total measured time, including the running span if any.
    pub fn elapsed(&self) -> Duration {
        match &self.running {
            Some(mark) => self.accumulated + mark.elapsed(),
            None => self.accumulated,
        }
    }
}

impl Default for TimeInterval {
    fn default() -> Self {
        Self::new(IntervalAccuracy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_interval_is_zero() {
        let interval = TimeInterval::new(IntervalAccuracy::Fine);
        assert!(!interval.is_running());
        assert_eq!(interval.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_stop_freezes_elapsed() {
        let mut interval = TimeInterval::start_new(IntervalAccuracy::Fine);
        thread::sleep(Duration::from_millis(10));
        interval.stop();
        let frozen = interval.elapsed();
        assert!(frozen >= Duration::from_millis(10));
        thread::sleep(Duration::from_millis(5));
        assert_eq!(interval.elapsed(), frozen);
    }

    #[test]
    fn test_spans_accumulate() {
        let mut interval = TimeInterval::with_fine_grained(true);
        interval.start();
        thread::sleep(Duration::from_millis(5));
        interval.stop();
        interval.start();
        thread::sleep(Duration::from_millis(5));
        interval.stop();
        assert!(interval.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_restart_clears_total() {
        let mut interval = TimeInterval::start_new(IntervalAccuracy::Coarse);
        thread::sleep(Duration::from_millis(20));
        interval.stop();
        interval.restart();
        assert!(interval.is_running());
        assert!(interval.elapsed() < Duration::from_millis(20));
    }

    #[test]
    fn test_start_while_running_keeps_original_mark() {
        let mut interval = TimeInterval::start_new(IntervalAccuracy::Fine);
        thread::sleep(Duration::from_millis(10));
        interval.start();
        assert!(interval.elapsed() >= Duration::from_millis(10));
    }
}
