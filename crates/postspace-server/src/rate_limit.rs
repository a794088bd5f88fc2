//! Per-IP token bucket rate limiting for the API.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use postspace_shared::wire::ErrorBody;
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_seen: Instant,
}

impl TokenBucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_seen: now,
        }
    }

    /// Take one token, or report how long until one is available.
    fn take(&mut self, now: Instant, rate: f64, capacity: f64) -> Result<(), Duration> {
        let elapsed = now.saturating_duration_since(self.last_seen).as_secs_f64();
        self.last_seen = now;
        self.tokens = (self.tokens + elapsed * rate).min(capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / rate))
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<IpAddr, TokenBucket>>>,
    rate: f64,
    capacity: f64,
}

impl RateLimiter {
    /// `rate` tokens per second, at most `burst` banked. Non-positive
    /// values are raised to one.
    pub fn new(rate: f64, burst: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            rate: rate.max(1.0),
            capacity: burst.max(1.0),
        }
    }

    /// `Err(retry_after)` when `ip` is over its budget.
    pub async fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(ip)
            .or_insert_with(|| TokenBucket::full(self.capacity, now))
            .take(now, self.rate, self.capacity)
    }

    /// Forget clients idle for at least `max_idle`. Returns how many
    /// buckets were dropped.
    pub async fn purge_stale(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_seen) < max_idle);
        before - buckets.len()
    }

    pub async fn tracked_clients(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Some(ip) = extract_client_ip(&req) {
        if let Err(retry_after) = limiter.check(ip).await {
            warn!(ip = %ip, path = %req.uri().path(), "Rate limit exceeded");
            let secs = retry_after.as_secs().max(1);
            let mut resp = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorBody {
                    error: "Too many requests".to_string(),
                }),
            )
                .into_response();
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                resp.headers_mut().insert(header::RETRY_AFTER, value);
            }
            return resp;
        }
    }

    next.run(req).await
}

/// Try ConnectInfo first, then X-Forwarded-For, then X-Real-IP.
fn extract_client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<std::net::SocketAddr>>() {
        return Some(addr.ip());
    }

    let header_ip = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip("x-forwarded-for").or_else(|| header_ip("x-real-ip"))
}
