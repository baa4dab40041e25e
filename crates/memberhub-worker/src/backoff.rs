//! Idle wait between empty polls.

use std::time::Duration;

/// Capped doubling backoff.
///
/// Each idle wait is `min(max(initial, last), max)`, after which `last`
/// becomes twice that wait. With the defaults the waits go 1s, 2s, 4s, 4s.
/// Any processed work resets it.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    last: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            last: Duration::ZERO,
        }
    }

    /// The next wait.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.last.max(self.initial).min(self.max);
        self.last = delay.saturating_mul(2);
        delay
    }

    /// Start over from the initial wait.
    pub fn reset(&mut self) {
        self.last = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_caps_and_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(4));
        let waits: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(waits, vec![1, 2, 4, 4, 4]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_initial_above_max_is_capped() {
        let mut backoff = Backoff::new(Duration::from_secs(10), Duration::from_secs(4));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
    }
}
