use crate::error::err;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use redis::AsyncCommands;

#[derive(Clone)]
pub struct RateLimitState {
    pub redis_client: redis::Client,
    pub max_per_minute: i64,
}

/// First hop of `X-Forwarded-For`, the client as seen by the proxy.
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Fixed one-minute window per client. Redis being down lets traffic through.
pub async fn enforce(State(state): State<RateLimitState>, request: Request<Body>, next: Next) -> Response {
    let client = client_key(request.headers());
    let key = format!(
        "booking_payments:rate:{}:{}",
        client,
        chrono::Utc::now().format("%Y%m%d%H%M")
    );

    match state.redis_client.get_multiplexed_async_connection().await {
        Ok(mut conn) => {
            let count: i64 = conn.incr(&key, 1).await.unwrap_or(1);
            let _: bool = conn.expire(&key, 120).await.unwrap_or(false);
            if count > state.max_per_minute {
                tracing::warn!(client = %client, count, "rate limit exceeded");
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(err("RATE_LIMITED", "too many requests, retry in a minute")),
                )
                    .into_response();
            }
        }
        Err(e) => tracing::debug!("rate limiter skipped: {}", e),
    }

    next.run(request).await
}
