use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Sliding-window decision for a single identity. Mirrors the teacher's
/// `RateDecision` shape so `current`/`allowed` can be surfaced to metrics
/// the same way.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub current: i64,
}

/// Per-identity fixed-window limiter. The teacher backs this with Redis
/// (`RedisRateLimiter`) for a multi-instance deployment; this broker runs
/// as a single process, so only the in-memory engine ships here. A Redis
/// engine is the natural production swap-in if the gateway is ever scaled
/// horizontally (see DESIGN.md).
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    inner: Arc<Mutex<HashMap<String, (i64, Instant)>>>,
    window: Duration,
}

impl InMemoryRateLimiter {
    pub fn new(window_secs: u64) -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())), window: Duration::from_secs(window_secs.max(1)) }
    }

    pub async fn check(&self, key: &str, limit: u32) -> RateDecision {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        let entry = guard.entry(key.to_string()).or_insert((0, now));
        if now.duration_since(entry.1) >= self.window {
            *entry = (0, now);
        }
        entry.0 += 1;
        RateDecision { allowed: entry.0 <= limit as i64, current: entry.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_the_configured_limit() {
        let limiter = InMemoryRateLimiter::new(60);
        for _ in 0..5 {
            assert!(limiter.check("portal:acme", 5).await.allowed);
        }
        assert!(!limiter.check("portal:acme", 5).await.allowed);
    }

    #[tokio::test]
    async fn tracks_identities_independently() {
        let limiter = InMemoryRateLimiter::new(60);
        for _ in 0..5 {
            limiter.check("portal:acme", 5).await;
        }
        assert!(limiter.check("portal:other", 5).await.allowed);
    }
}
