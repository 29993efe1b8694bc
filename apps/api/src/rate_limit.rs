//! Fixed-window request rate limiting.
//!
//! One 60-second window per client key (user id when known, client IP
//! otherwise) with a burst allowance on top of the per-minute limit.
//! State is in-memory and process-local; entries older than two windows
//! are purged opportunistically.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::state::AppState;

const WINDOW: Duration = Duration::from_secs(60);
const CLEANUP_EVERY: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited { retry_after_secs: u64 },
}

struct WindowState {
    /// key -> (request count, window start)
    windows: HashMap<String, (u32, Instant)>,
    cleanup_counter: u32,
}

pub struct RateLimiter {
    per_minute: u32,
    burst: u32,
    inner: Mutex<WindowState>,
}

impl RateLimiter {
    pub fn new(per_minute: u32, burst: u32) -> Self {
        Self {
            per_minute,
            burst,
            inner: Mutex::new(WindowState {
                windows: HashMap::new(),
                cleanup_counter: 0,
            }),
        }
    }

    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        state.cleanup_counter += 1;
        if state.cleanup_counter >= CLEANUP_EVERY {
            state.cleanup_counter = 0;
            state
                .windows
                .retain(|_, (_, started)| now.duration_since(*started) <= WINDOW * 2);
        }

        match state.windows.get_mut(key) {
            Some((count, started)) if now.duration_since(*started) < WINDOW => {
                if *count < self.per_minute + self.burst {
                    *count += 1;
                    Decision::Allowed
                } else {
                    let elapsed = now.duration_since(*started);
                    let retry_after = WINDOW.saturating_sub(elapsed).as_secs().max(1);
                    Decision::Limited {
                        retry_after_secs: retry_after,
                    }
                }
            }
            _ => {
                // New client or expired window: start fresh.
                state.windows.insert(key.to_string(), (1, now));
                Decision::Allowed
            }
        }
    }
}

/// Axum middleware applying the limiter to every route except `/health`.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let key = client_key(&request, addr);
    match state.limiter.check(&key) {
        Decision::Allowed => next.run(request).await,
        Decision::Limited { retry_after_secs } => {
            let body = Json(json!({
                "error": "Too many requests",
                "retry_after": retry_after_secs
            }));
            (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", retry_after_secs.to_string())],
                body,
            )
                .into_response()
        }
    }
}

/// Prefers the first X-Forwarded-For hop (real client behind a proxy),
/// falling back to the socket peer address.
fn client_key(request: &Request, addr: SocketAddr) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return format!("ip:{first}");
            }
        }
    }
    format!("ip:{}", addr.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_limit_is_allowed() {
        let limiter = RateLimiter::new(5, 0);
        let now = Instant::now();
        for _ in 0..5 {
            assert_eq!(limiter.check_at("u1", now), Decision::Allowed);
        }
    }

    #[test]
    fn test_burst_extends_the_limit() {
        let limiter = RateLimiter::new(3, 2);
        let now = Instant::now();
        for _ in 0..5 {
            assert_eq!(limiter.check_at("u1", now), Decision::Allowed);
        }
        assert!(matches!(
            limiter.check_at("u1", now),
            Decision::Limited { .. }
        ));
    }

    #[test]
    fn test_retry_after_counts_down_the_window() {
        let limiter = RateLimiter::new(1, 0);
        let start = Instant::now();
        assert_eq!(limiter.check_at("u1", start), Decision::Allowed);

        let later = start + Duration::from_secs(20);
        match limiter.check_at("u1", later) {
            Decision::Limited { retry_after_secs } => {
                assert!(retry_after_secs <= 40);
                assert!(retry_after_secs >= 1);
            }
            Decision::Allowed => panic!("expected limited"),
        }
    }

    #[test]
    fn test_window_reset_readmits_client() {
        let limiter = RateLimiter::new(1, 0);
        let start = Instant::now();
        assert_eq!(limiter.check_at("u1", start), Decision::Allowed);
        assert!(matches!(
            limiter.check_at("u1", start),
            Decision::Limited { .. }
        ));

        let after_window = start + WINDOW + Duration::from_secs(1);
        assert_eq!(limiter.check_at("u1", after_window), Decision::Allowed);
    }

    #[test]
    fn test_clients_are_tracked_independently() {
        let limiter = RateLimiter::new(1, 0);
        let now = Instant::now();
        assert_eq!(limiter.check_at("u1", now), Decision::Allowed);
        assert_eq!(limiter.check_at("u2", now), Decision::Allowed);
        assert!(matches!(
            limiter.check_at("u1", now),
            Decision::Limited { .. }
        ));
    }

    #[test]
    fn test_stale_entries_are_purged() {
        let limiter = RateLimiter::new(100, 0);
        let start = Instant::now();
        limiter.check_at("old-client", start);

        // Drive the cleanup counter past its threshold well after the
        // old window expired.
        let later = start + WINDOW * 3;
        for i in 0..CLEANUP_EVERY {
            limiter.check_at(&format!("c{i}"), later);
        }
        let state = limiter.inner.lock().unwrap();
        assert!(!state.windows.contains_key("old-client"));
    }
}
