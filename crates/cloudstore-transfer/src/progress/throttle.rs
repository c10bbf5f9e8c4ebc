//! Time-based spacing of progress snapshots.

use std::time::Duration;

use tokio::time::Instant;

use cloudstore_core::config::DEFAULT_PROGRESS_INTERVAL;

/// Admits at most one intermediate snapshot per interval.
///
/// Runs on the Tokio clock, so paused-time tests control it.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last_admitted: Option<Instant>,
}

impl ProgressThrottle {
    /// A throttle admitting one snapshot per `interval`. Zero admits all.
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_admitted: None,
        }
    }

    /// The configured spacing.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a snapshot may go out now. Admitting one restarts the interval.
    pub fn should_emit(&mut self) -> bool {
        if self.interval.is_zero() {
            return true;
        }

        let now = Instant::now();
        if self
            .last_admitted
            .is_some_and(|last| now.duration_since(last) < self.interval)
        {
            return false;
        }
        self.last_admitted = Some(now);
        true
    }

    /// Admit the next snapshot unconditionally.
    pub const fn reset(&mut self) {
        self.last_admitted = None;
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_holds_snapshots_inside_the_interval() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(100));
        assert!(throttle.should_emit());
        assert!(!throttle.should_emit());

        advance(Duration::from_millis(99)).await;
        assert!(!throttle.should_emit());

        advance(Duration::from_millis(1)).await;
        assert!(throttle.should_emit());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_admits_immediately() {
        let mut throttle = ProgressThrottle::default();
        assert_eq!(throttle.interval(), DEFAULT_PROGRESS_INTERVAL);
        assert!(throttle.should_emit());

        throttle.reset();
        assert!(throttle.should_emit());
        assert!(!throttle.should_emit());
    }

    #[test]
    fn test_zero_interval_admits_everything() {
        let mut throttle = ProgressThrottle::new(Duration::ZERO);
        assert!((0..10).all(|_| throttle.should_emit()));
    }
}
