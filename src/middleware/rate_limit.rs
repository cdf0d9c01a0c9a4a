//! Rate limiting middleware.
//!
//! In-memory fixed-window counter per client IP.

use super::client_ip;
use crate::config::RateLimitSettings;
use crate::errors::ApiError;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

const RATELIMIT_LIMIT: &str = "ratelimit-limit";
const RATELIMIT_REMAINING: &str = "ratelimit-remaining";

/// Configuration for rate limiting.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window duration.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            max_requests: settings.max_requests,
            window: Duration::from_millis(settings.window_ms),
        }
    }
}

/// Shared per-IP window table. Cloning shares the table.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Arc<Mutex<HashMap<IpAddr, WindowEntry>>>,
}

struct WindowEntry {
    count: u32,
    window_start: Instant,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Exceeded { retry_after: Duration },
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count one request from `ip` and decide whether it may proceed.
    pub fn check(&self, ip: IpAddr) -> RateDecision {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> RateDecision {
        let mut state = self.state.lock();

        let entry = state.entry(ip).or_insert(WindowEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.count = 0;
            entry.window_start = now;
        }

        entry.count = entry.count.saturating_add(1);

        if entry.count > self.config.max_requests {
            let reset_at = entry.window_start + self.config.window;
            RateDecision::Exceeded {
                retry_after: reset_at.saturating_duration_since(now),
            }
        } else {
            RateDecision::Allowed {
                remaining: self.config.max_requests - entry.count,
            }
        }
    }

    /// Drop entries whose window has long passed (call from a background task).
    pub fn cleanup(&self) {
        let now = Instant::now();
        let window = self.config.window;
        let mut state = self.state.lock();
        state.retain(|_, entry| now.duration_since(entry.window_start) < window * 2);
    }

    pub fn tracked_clients(&self) -> usize {
        self.state.lock().len()
    }
}

/// Rejects with 429 once a client exceeds its window budget.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&request);

    match limiter.check(ip) {
        RateDecision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(
                HeaderName::from_static(RATELIMIT_LIMIT),
                HeaderValue::from(limiter.config.max_requests),
            );
            headers.insert(
                HeaderName::from_static(RATELIMIT_REMAINING),
                HeaderValue::from(remaining),
            );
            response
        }
        RateDecision::Exceeded { retry_after } => {
            warn!(
                ip = %ip,
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            ApiError::RateLimited { retry_after }.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window: Duration) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window,
        })
    }

    #[test]
    fn test_allows_up_to_limit_then_rejects() {
        let limiter = limiter(3, Duration::from_secs(60));
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        assert_eq!(limiter.check(ip), RateDecision::Allowed { remaining: 2 });
        assert_eq!(limiter.check(ip), RateDecision::Allowed { remaining: 1 });
        assert_eq!(limiter.check(ip), RateDecision::Allowed { remaining: 0 });
        assert!(matches!(limiter.check(ip), RateDecision::Exceeded { .. }));

        // Other clients have their own budget
        let other: IpAddr = "10.0.0.2".parse().unwrap();
        assert_eq!(limiter.check(other), RateDecision::Allowed { remaining: 2 });
    }

    #[test]
    fn test_window_resets() {
        let limiter = limiter(1, Duration::from_secs(60));
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let start = Instant::now();

        assert!(matches!(limiter.check_at(ip, start), RateDecision::Allowed { .. }));
        match limiter.check_at(ip, start + Duration::from_secs(10)) {
            RateDecision::Exceeded { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(50))
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert!(matches!(
            limiter.check_at(ip, start + Duration::from_secs(61)),
            RateDecision::Allowed { .. }
        ));
    }

    #[test]
    fn test_cleanup_drops_stale_entries() {
        let limiter = limiter(5, Duration::from_millis(1));
        limiter.check("127.0.0.1".parse().unwrap());
        assert_eq!(limiter.tracked_clients(), 1);

        std::thread::sleep(Duration::from_millis(5));
        limiter.cleanup();
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn test_config_from_settings() {
        let config = RateLimitConfig::from(&RateLimitSettings {
            window_ms: 900_000,
            max_requests: 100,
        });
        assert_eq!(config.window, Duration::from_secs(900));
        assert_eq!(config.max_requests, 100);
    }
}
