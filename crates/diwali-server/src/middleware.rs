use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Query, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Shared admin secret checked against the `admin_key` query parameter.
#[derive(Clone)]
pub struct AuthState {
    admin_key: Arc<str>,
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("admin_key", &"[redacted]")
            .finish()
    }
}

impl AuthState {
    /// Fails when the configured key is blank so the admin surface can never
    /// be left open by accident.
    pub fn new(admin_key: &str) -> anyhow::Result<Self> {
        let admin_key = admin_key.trim();
        if admin_key.is_empty() {
            anyhow::bail!("ADMIN_KEY must not be empty");
        }
        Ok(Self {
            admin_key: Arc::from(admin_key),
        })
    }

    fn allows(&self, candidate: &str) -> bool {
        bool::from(self.admin_key.as_bytes().ct_eq(candidate.as_bytes()))
    }
}

#[derive(Debug, Deserialize)]
struct AdminKeyQuery {
    admin_key: Option<String>,
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Sliding fixed-window limiter for simple API protection.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map_or_else(String::new, |id| id.0.clone())
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware rejecting admin requests whose `admin_key` query parameter is
/// missing or wrong. Runs before any handler logic.
pub async fn require_admin_key(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    let supplied = Query::<AdminKeyQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.admin_key);

    match supplied {
        Some(key) if auth.allows(&key) => next.run(req).await,
        _ => {
            tracing::warn!(path = %req.uri().path(), "rejected admin request");
            ApiError::new(request_id_of(&req), "forbidden", "invalid admin key").into_response()
        }
    }
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        drop(window);
        return ApiError::new(request_id_of(&req), "rate_limited", "rate limit exceeded")
            .into_response();
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}
