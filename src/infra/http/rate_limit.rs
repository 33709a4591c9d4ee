//! Sliding-window request limiter keyed by client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

#[derive(Debug, Clone)]
pub struct PublicRateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

impl PublicRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
        }
    }

    pub fn check(&self, client: &str) -> RateDecision {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> RateDecision {
        let window = self.window;
        let mut entry = self.buckets.entry(client.to_string()).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        let used = u32::try_from(entry.len()).unwrap_or(u32::MAX);
        if used >= self.max_requests {
            let retry_after_secs = entry
                .first()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(window)
                .as_secs()
                .max(1);
            return RateDecision::Limited { retry_after_secs };
        }

        entry.push(now);
        RateDecision::Allowed {
            remaining: self.max_requests - used - 1,
        }
    }

    /// Drop buckets whose requests have all left the window.
    pub fn prune(&self) {
        let now = Instant::now();
        let window = self.window;
        self.buckets.retain(|_, hits| {
            hits.retain(|instant| now.duration_since(*instant) < window);
            !hits.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_after_max_requests_within_window() {
        let limiter = PublicRateLimiter::new(Duration::from_secs(60), 2);
        let start = Instant::now();

        assert_eq!(
            limiter.check_at("1.2.3.4", start),
            RateDecision::Allowed { remaining: 1 }
        );
        assert_eq!(
            limiter.check_at("1.2.3.4", start),
            RateDecision::Allowed { remaining: 0 }
        );
        assert!(matches!(
            limiter.check_at("1.2.3.4", start + Duration::from_secs(10)),
            RateDecision::Limited { retry_after_secs: 50 }
        ));
        assert!(matches!(
            limiter.check_at("5.6.7.8", start),
            RateDecision::Allowed { .. }
        ));
    }

    #[test]
    fn window_slides() {
        let limiter = PublicRateLimiter::new(Duration::from_secs(60), 1);
        let start = Instant::now();
        assert!(matches!(
            limiter.check_at("client", start),
            RateDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check_at("client", start + Duration::from_secs(61)),
            RateDecision::Allowed { .. }
        ));
    }
}
