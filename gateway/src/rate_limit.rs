//! Per client IP request limits.

use crate::errors::ApiError;
use crate::metrics_defs::RATE_LIMITED;
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use governor::{DefaultKeyedRateLimiter, Quota};
use shared::counter;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const AI_MESSAGE: &str = "Too many AI requests, please try again later.";
pub const SMS_MESSAGE: &str = "Too many SMS requests, please try again later.";
pub const GENERAL_MESSAGE: &str = "Too many requests from this IP, please try again later.";

const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);

/// Allows a burst of `max_requests` per client. Spent requests come back one
/// per `window`, so a client never exceeds `max_requests` within a window.
pub struct RateLimiter {
    name: &'static str,
    message: &'static str,
    limiter: DefaultKeyedRateLimiter<IpAddr>,
}

impl RateLimiter {
    pub fn new(name: &'static str, max_requests: u32, window: Duration, message: &'static str) -> Self {
        let burst = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(window)
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        RateLimiter {
            name,
            message,
            limiter: governor::RateLimiter::keyed(quota),
        }
    }

    pub fn ai() -> Self {
        Self::new("ai", 10, FIFTEEN_MINUTES, AI_MESSAGE)
    }

    pub fn sms() -> Self {
        Self::new("sms", 20, FIFTEEN_MINUTES, SMS_MESSAGE)
    }

    pub fn general(max_requests: u32, window: Duration) -> Self {
        Self::new("general", max_requests, window, GENERAL_MESSAGE)
    }

    pub fn check(&self, client: IpAddr) -> Result<(), ApiError> {
        if self.limiter.check_key(&client).is_ok() {
            return Ok(());
        }

        counter!(RATE_LIMITED, "limiter" => self.name).increment(1);
        warn!(limiter = self.name, %client, "rate limit exceeded");
        Err(ApiError::RateLimited(self.message))
    }

    /// Drops state for clients whose allowance has fully refilled.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
    }
}

/// First `X-Forwarded-For` hop, else the socket peer, else `0.0.0.0`.
pub fn client_ip(request: &Request) -> IpAddr {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|hop| hop.trim().parse().ok());

    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    limiter.check(client_ip(&request))?;
    Ok(next.run(request).await)
}
