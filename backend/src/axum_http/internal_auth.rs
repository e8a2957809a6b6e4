use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tracing::warn;

use super::error_responses::AppError;

/// Shared secret for operator-facing routes. `None` closes the routes entirely.
#[derive(Clone)]
pub struct InternalToken(Option<Arc<str>>);

impl InternalToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.map(Arc::from))
    }
}

pub async fn require_internal_token(
    State(token): State<InternalToken>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = token.0.as_deref() else {
        return AppError::ServiceUnavailable("internal api token is not configured").into_response();
    };

    if !bearer_matches(&headers, expected) {
        warn!(path = %request.uri().path(), "internal_auth: rejected request");
        return AppError::Unauthorized.into_response();
    }

    next.run(request).await
}

fn bearer_matches(headers: &HeaderMap, expected: &str) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .is_some_and(|token| token.as_bytes().ct_eq(expected.as_bytes()).into())
}
