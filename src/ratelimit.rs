// src/ratelimit.rs

//! Process-wide rate limiter for upstream API calls
//!
//! Some git providers throttle unauthenticated API traffic aggressively,
//! so a single limiter is shared across all source adapters through the
//! tracker services bundle. Adapters call `wait` before each rate-limited
//! request.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Minimum-interval rate limiter
///
/// Callers block until at least `min_interval` has elapsed since the
/// previous permitted call. The mutex is held while sleeping so waiters
/// queue up in arrival order.
pub struct RateLimiter {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing one call per `min_interval`
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    /// Block until the next call is permitted
    pub fn wait(&self) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_call_does_not_block() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        limiter.wait();
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_consecutive_calls_are_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        limiter.wait();
        let start = Instant::now();
        limiter.wait();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
