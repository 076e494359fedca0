// SPDX-License-Identifier: GPL-3.0-only
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Fixed-window request limiter keyed by an arbitrary string.
///
/// Each key gets `max_hits` per `window`. Expired windows are evicted lazily
/// whenever a new key arrives, and at most `max_keys` windows are tracked. A
/// new key that finds the table full is denied until older windows expire.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    max_hits: u32,
    window: Duration,
    max_keys: usize,
    windows: Mutex<HashMap<String, Window>>,
}

impl FixedWindowRateLimiter {
    pub fn new(max_hits: u32, window: Duration, max_keys: usize) -> Self {
        Self {
            max_hits,
            window,
            max_keys: max_keys.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record a hit for `key`, returning whether it is allowed.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(entry) = windows.get_mut(key) {
            if now.duration_since(entry.started) >= self.window {
                *entry = Window { started: now, hits: 1 };
                return self.max_hits > 0;
            }
            if entry.hits >= self.max_hits {
                return false;
            }
            entry.hits += 1;
            return true;
        }

        if windows.len() >= self.max_keys {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
            if windows.len() >= self.max_keys {
                warn!(tracked = windows.len(), "Rate limiter table full, denying new key");
                return false;
            }
        }

        windows.insert(key.to_string(), Window { started: now, hits: 1 });
        self.max_hits > 0
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit_within_window() {
        let limiter = FixedWindowRateLimiter::new(2, Duration::from_secs(60), 16);
        let t0 = Instant::now();

        assert!(limiter.check_at("10.0.0.1", t0));
        assert!(limiter.check_at("10.0.0.1", t0 + Duration::from_secs(1)));
        assert!(!limiter.check_at("10.0.0.1", t0 + Duration::from_secs(2)));
    }

    #[test]
    fn test_window_resets() {
        let limiter = FixedWindowRateLimiter::new(1, Duration::from_secs(60), 16);
        let t0 = Instant::now();

        assert!(limiter.check_at("client", t0));
        assert!(!limiter.check_at("client", t0 + Duration::from_secs(59)));
        assert!(limiter.check_at("client", t0 + Duration::from_secs(60)));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = FixedWindowRateLimiter::new(1, Duration::from_secs(60), 16);
        let t0 = Instant::now();

        assert!(limiter.check_at("a", t0));
        assert!(limiter.check_at("b", t0));
        assert!(!limiter.check_at("a", t0));
    }

    #[test]
    fn test_expired_windows_are_evicted_when_full() {
        let limiter = FixedWindowRateLimiter::new(5, Duration::from_secs(10), 2);
        let t0 = Instant::now();

        assert!(limiter.check_at("a", t0));
        assert!(limiter.check_at("b", t0));
        assert!(!limiter.check_at("c", t0 + Duration::from_secs(1)));

        assert!(limiter.check_at("c", t0 + Duration::from_secs(11)));
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
