use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::errors::AppError;
use crate::state::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Guards the admin routes when `ADMIN_API_TOKEN` is configured. Without a
/// configured token every request passes.
pub async fn require_admin(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.config.admin_api_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    if bearer_token(&headers) == Some(expected) {
        return Ok(next.run(request).await);
    }

    warn!("Admin token missing or wrong, denied {}", request.uri().path());
    Err(AppError::Unauthorized)
}
