//! Per-client request quotas for the REST API

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::client::client_ip;
use super::error::ApiError;

const MINUTE: Duration = Duration::from_secs(60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// How often expired windows are swept
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    start: Instant,
}

impl Window {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            start: now,
        }
    }

    fn roll(&mut self, now: Instant, length: Duration) {
        if now.duration_since(self.start) > length {
            self.count = 0;
            self.start = now;
        }
    }
}

/// Rate limiter state tracking requests per IP in a minute and a day window
#[derive(Clone)]
pub struct RateLimiter {
    per_minute: u32,
    per_day: u32,
    /// IP -> (minute window, day window)
    requests: Arc<RwLock<HashMap<IpAddr, (Window, Window)>>>,
}

impl RateLimiter {
    pub fn new(per_minute: u32, per_day: u32) -> Self {
        Self {
            per_minute,
            per_day,
            requests: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Counts the request and reports whether it fits both quotas.
    /// Rejected requests are not counted.
    pub async fn check_rate_limit(&self, ip: IpAddr) -> bool {
        let mut requests = self.requests.write().await;
        let now = Instant::now();

        let (minute, day) = requests
            .entry(ip)
            .or_insert_with(|| (Window::new(now), Window::new(now)));
        minute.roll(now, MINUTE);
        day.roll(now, DAY);

        if minute.count >= self.per_minute || day.count >= self.per_day {
            return false;
        }
        minute.count += 1;
        day.count += 1;
        true
    }

    /// Drop clients whose day window has expired
    pub async fn cleanup_expired(&self) {
        let mut requests = self.requests.write().await;
        let now = Instant::now();

        requests.retain(|_, (_, day)| now.duration_since(day.start) <= DAY);
    }

    /// Sweep expired entries every [`CLEANUP_INTERVAL`] on a background task.
    pub fn spawn_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                limiter.cleanup_expired().await;
                tracing::debug!("Rate limiter cleanup complete");
            }
        })
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(request.headers(), request.extensions())
        .unwrap_or_else(|| IpAddr::from([127, 0, 0, 1]));

    if limiter.check_rate_limit(ip).await {
        next.run(request).await
    } else {
        tracing::warn!("Rate limit exceeded for {}", ip);
        ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again later.",
        )
        .into_response()
    }
}
