//! # Fibonacci Backoff
//!
//! Requeue delays for inventories waiting on something outside the
//! controller's control (load balancer ingress, a pool with free addresses).
//! The sequence grows more slowly than exponential backoff so a node that
//! becomes ready is picked up promptly.
//!
//! Sequence: 1m, 1m, 2m, 3m, 5m, 8m, 10m (max).

use std::time::Duration;

/// Fibonacci backoff calculator, in whole minutes
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    prev_minutes: u64,
    current_minutes: u64,
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min_minutes` and capped at `max_minutes`
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes,
        }
    }

    /// Current delay; advances the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let delay = Duration::from_secs(self.current_minutes * 60);

        let next_minutes = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = next_minutes.min(self.max_minutes);

        delay
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(backoff: &mut FibonacciBackoff) -> u64 {
        backoff.next_backoff().as_secs() / 60
    }

    #[test]
    fn test_fibonacci_backoff_sequence() {
        let mut backoff = FibonacciBackoff::default();
        let sequence: Vec<u64> = (0..9).map(|_| minutes(&mut backoff)).collect();
        assert_eq!(sequence, vec![1, 1, 2, 3, 5, 8, 10, 10, 10]);
    }

    #[test]
    fn test_custom_bounds() {
        let mut backoff = FibonacciBackoff::new(2, 5);
        let sequence: Vec<u64> = (0..5).map(|_| minutes(&mut backoff)).collect();
        assert_eq!(sequence, vec![2, 2, 4, 5, 5]);
    }
}
