//! Per-client login throttling.
//!
//! Each client address owns a token bucket holding `limit` tokens that
//! refills completely over one minute. Buckets live in process memory, so
//! several server replicas each enforce their own limit.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tracing::warn;

use crate::AppState;
use crate::error::AppError;

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token buckets keyed by client address.
#[derive(Debug)]
pub struct LoginRateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    buckets: DashMap<String, Bucket>,
}

impl LoginRateLimiter {
    /// Allow `limit` attempts per minute per key. A limit of zero is
    /// treated as one.
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit.max(1), Duration::from_secs(60))
    }

    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        let capacity = f64::from(capacity);
        Self {
            capacity,
            refill_per_sec: capacity / refill_interval.as_secs_f64(),
            buckets: DashMap::new(),
        }
    }

    /// Take one token from `key`'s bucket. `false` when it is empty.
    pub fn check_and_consume(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut bucket = self.buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets untouched for at least `idle`. A bucket idle that long
    /// has refilled anyway. Returns how many were removed.
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| bucket.last_refill.elapsed() < idle);
        before.saturating_sub(self.buckets.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Client address from the connection, or `"unknown"` when the server was
/// not started with connect info. Forwarded headers are not trusted.
fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Axum middleware: rejects with 429 before any credential check once a
/// client has spent its login budget.
pub async fn limit_login(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = client_key(&request);
    if !state.login_limiter.check_and_consume(&key) {
        warn!(client = %key, "login rate limit exceeded");
        return Err(AppError::RateLimited);
    }
    Ok(next.run(request).await)
}
