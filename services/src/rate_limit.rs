//! In-process rolling-window limiter for contributions.
//!
//! State lives in this process only; several replicas each enforce their own
//! window.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RateLimiter {
    max: usize,
    window: Duration,
    hits: Arc<Mutex<HashMap<i64, VecDeque<Instant>>>>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max: max as usize,
            window,
            hits: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an attempt for `key` now.
    ///
    /// Returns how long to wait when the window is already full. Rejected
    /// attempts are not recorded.
    pub fn check(&self, key: i64) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: i64, now: Instant) -> Result<(), Duration> {
        let mut hits = self.lock();
        let recent = hits.entry(key).or_default();

        while let Some(oldest) = recent.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                recent.pop_front();
            } else {
                break;
            }
        }

        if recent.len() >= self.max {
            let oldest = recent.front().copied().unwrap_or(now);
            let retry_after = self
                .window
                .saturating_sub(now.saturating_duration_since(oldest));
            return Err(retry_after);
        }

        recent.push_back(now);
        Ok(())
    }

    /// Drop keys whose windows have fully elapsed.
    pub fn prune(&self, now: Instant) {
        let window = self.window;
        self.lock().retain(|_, hits| {
            hits.back()
                .is_some_and(|last| now.saturating_duration_since(*last) < window)
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, VecDeque<Instant>>> {
        // A panic while holding the lock leaves the map consistent.
        self.hits.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
