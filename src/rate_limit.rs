//! Rate limiting for unauthenticated account endpoints.
//!
//! Uses a token bucket per client IP so sign-up and password-reset requests
//! cannot be used to flood mailboxes.

use std::{num::NonZeroU32, sync::Arc, time::Duration};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::auth::extract_client_ip;
use crate::cli::ClientIpHeader;
use crate::envelope::{ApiError, Message};

/// Interval between sweeps of idle per-IP buckets.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

#[derive(Clone)]
pub struct RateLimitConfig {
    /// Account creation and confirmation resends
    pub signup: Arc<IpLimiter>,
    /// Password reset requests
    pub reset: Arc<IpLimiter>,
    pub ip_header: Option<ClientIpHeader>,
}

impl RateLimitConfig {
    pub fn new(per_minute: NonZeroU32, ip_header: Option<ClientIpHeader>) -> Self {
        Self::with_quota(Quota::per_minute(per_minute), ip_header)
    }

    fn with_quota(quota: Quota, ip_header: Option<ClientIpHeader>) -> Self {
        Self {
            signup: Arc::new(RateLimiter::keyed(quota)),
            reset: Arc::new(RateLimiter::keyed(quota)),
            ip_header,
        }
    }

    /// Forget every IP whose bucket has refilled completely.
    pub fn prune(&self) {
        for limiter in [&self.signup, &self.reset] {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Number of IPs currently tracked across both limiters.
    pub fn tracked_ips(&self) -> usize {
        self.signup.len() + self.reset.len()
    }

    fn check(&self, limiter: &IpLimiter, request: &Request) -> Result<(), ApiError> {
        let ip = extract_client_ip(request, self.ip_header).map_err(|reason| {
            debug!(reason, "Rejecting request without a client IP");
            ApiError::not_authorized(Message::MainIpUnavailable)
        })?;
        limiter.check_key(&ip).map_err(|_| ApiError::rate_limited())
    }
}

/// Spawn a background task that prunes idle buckets periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_pruner(config: Arc<RateLimitConfig>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);

        loop {
            interval.tick().await;
            config.prune();
            debug!(tracked = config.tracked_ips(), "Pruned rate limiter state");
        }
    })
}

/// Middleware for rate limiting user creation.
pub async fn rate_limit_signup(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match config.check(&config.signup, &request) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

/// Middleware for rate limiting password reset requests.
pub async fn rate_limit_reset(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match config.check(&config.reset, &request) {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
