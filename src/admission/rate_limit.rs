//! Rolling-window rate limiting per client key.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitOutcome {
    pub allowed: bool,
    /// Requests counted in the window, including this one when allowed.
    pub count: usize,
}

/// Limits applied by a `RateLimiter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub window: Duration,
    pub max_requests: usize,
    pub max_tracked_clients: usize,
}

impl From<&RateLimitConfig> for RateLimitSettings {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            window: Duration::from_millis(config.window_ms),
            max_requests: config.max_requests,
            max_tracked_clients: config.max_tracked_clients,
        }
    }
}

/// Request instants of one client, oldest first.
#[derive(Debug)]
struct TimestampWindow {
    stamps: VecDeque<Instant>,
    last_seen: Instant,
}

impl TimestampWindow {
    fn new(now: Instant) -> Self {
        Self {
            stamps: VecDeque::new(),
            last_seen: now,
        }
    }

    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.stamps.front() {
            if now.saturating_duration_since(*oldest) >= window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Per-client rolling window limiter.
///
/// Clones share the same store. `reconfigured` produces a limiter with new
/// limits over the same store so counters survive a config reload.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<DashMap<String, TimestampWindow>>,
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            settings,
        }
    }

    /// Same store, different limits.
    pub fn reconfigured(&self, settings: RateLimitSettings) -> Self {
        Self {
            windows: Arc::clone(&self.windows),
            settings,
        }
    }

    pub fn settings(&self) -> RateLimitSettings {
        self.settings
    }

    /// Number of client keys currently held.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Prune the client's window at `now`; record `now` if the quota allows.
    ///
    /// A denied request is not recorded.
    pub fn check_and_record(&self, client_key: &str, now: Instant) -> RateLimitOutcome {
        if !self.windows.contains_key(client_key)
            && self.windows.len() >= self.settings.max_tracked_clients
        {
            self.evict(now);
        }

        let outcome = {
            let mut window = self
                .windows
                .entry(client_key.to_string())
                .or_insert_with(|| TimestampWindow::new(now));
            window.prune(now, self.settings.window);
            window.last_seen = now;

            let count = window.stamps.len();
            if count >= self.settings.max_requests {
                RateLimitOutcome {
                    allowed: false,
                    count,
                }
            } else {
                window.stamps.push_back(now);
                RateLimitOutcome {
                    allowed: true,
                    count: count + 1,
                }
            }
        };

        metrics::record_tracked_clients(self.windows.len());
        outcome
    }

    /// Drop every client whose window is empty at `now`. Returns how many
    /// keys were removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.windows.len();
        let window = self.settings.window;
        self.windows.retain(|_, w| {
            w.prune(now, window);
            !w.stamps.is_empty()
        });
        let after = self.windows.len();
        metrics::record_tracked_clients(after);
        before.saturating_sub(after)
    }

    /// Make room for one new key: empty windows go first, then the least
    /// recently seen client.
    fn evict(&self, now: Instant) {
        let removed = self.sweep(now);
        if self.windows.len() < self.settings.max_tracked_clients {
            tracing::debug!(removed, "Evicted idle rate limit windows");
            return;
        }

        let oldest = self
            .windows
            .iter()
            .min_by_key(|entry| entry.value().last_seen)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            self.windows.remove(&key);
            tracing::debug!(client = %key, "Evicted least recently seen client");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: usize, window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitSettings {
            window: Duration::from_millis(window_ms),
            max_requests,
            max_tracked_clients: 100,
        })
    }

    #[test]
    fn test_quota_then_reject() {
        let limiter = limiter(3, 60_000);
        let now = Instant::now();

        for i in 1..=3 {
            let outcome = limiter.check_and_record("10.0.0.1", now);
            assert!(outcome.allowed);
            assert_eq!(outcome.count, i);
        }

        let denied = limiter.check_and_record("10.0.0.1", now);
        assert_eq!(
            denied,
            RateLimitOutcome {
                allowed: false,
                count: 3
            }
        );
    }

    #[test]
    fn test_denied_requests_are_not_recorded() {
        let limiter = limiter(1, 1_000);
        let start = Instant::now();

        assert!(limiter.check_and_record("k", start).allowed);
        for ms in [100, 200, 300] {
            assert!(!limiter.check_and_record("k", start + Duration::from_millis(ms)).allowed);
        }
        // Only the first request counts, so the window reopens one window later.
        assert!(limiter.check_and_record("k", start + Duration::from_millis(1_000)).allowed);
    }

    #[test]
    fn test_window_recovers() {
        let limiter = limiter(2, 1_000);
        let start = Instant::now();

        assert!(limiter.check_and_record("k", start).allowed);
        assert!(limiter.check_and_record("k", start).allowed);
        assert!(!limiter.check_and_record("k", start + Duration::from_millis(999)).allowed);

        let later = start + Duration::from_millis(1_001);
        let outcome = limiter.check_and_record("k", later);
        assert!(outcome.allowed);
        assert_eq!(outcome.count, 1);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(1, 60_000);
        let now = Instant::now();

        assert!(limiter.check_and_record("a", now).allowed);
        assert!(!limiter.check_and_record("a", now).allowed);
        assert!(limiter.check_and_record("b", now).allowed);
    }

    #[test]
    fn test_sweep_removes_empty_windows() {
        let limiter = limiter(5, 1_000);
        let start = Instant::now();

        limiter.check_and_record("old", start);
        limiter.check_and_record("fresh", start + Duration::from_millis(900));
        assert_eq!(limiter.tracked_clients(), 2);

        let removed = limiter.sweep(start + Duration::from_millis(1_500));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_capacity_evicts_least_recently_seen() {
        let limiter = RateLimiter::new(RateLimitSettings {
            window: Duration::from_secs(60),
            max_requests: 10,
            max_tracked_clients: 2,
        });
        let start = Instant::now();

        limiter.check_and_record("a", start);
        limiter.check_and_record("b", start + Duration::from_millis(10));
        limiter.check_and_record("a", start + Duration::from_millis(20));
        limiter.check_and_record("c", start + Duration::from_millis(30));

        assert_eq!(limiter.tracked_clients(), 2);
        // "b" was least recently seen, so it starts over.
        let outcome = limiter.check_and_record("a", start + Duration::from_millis(40));
        assert_eq!(outcome.count, 3);
    }

    #[test]
    fn test_reconfigured_shares_store() {
        let limiter = limiter(5, 60_000);
        let now = Instant::now();
        limiter.check_and_record("k", now);
        limiter.check_and_record("k", now);

        let tighter = limiter.reconfigured(RateLimitSettings {
            max_requests: 2,
            ..limiter.settings()
        });
        assert!(!tighter.check_and_record("k", now).allowed);
    }
}
