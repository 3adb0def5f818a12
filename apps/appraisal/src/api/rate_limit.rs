//! Global request quota using governor.

use super::AppState;
use super::error::ApiError;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;

/// Unkeyed limiter shared by every request.
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// `per_second` requests per second, bursting up to the same amount.
pub fn limiter(per_second: NonZeroU32) -> Limiter {
    RateLimiter::direct(Quota::per_second(per_second).allow_burst(per_second))
}

/// Reject requests over the quota with 429.
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if state.limiter.check().is_err() {
        tracing::warn!(path = %req.uri().path(), "rate limit exceeded");
        return ApiError::RateLimited.into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_is_bounded() {
        let limiter = limiter(NonZeroU32::MIN.saturating_add(1));
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
