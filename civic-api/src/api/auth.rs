//! Session authentication middleware
//!
//! Resolves `Authorization: Bearer <token>` through the sessions table and
//! attaches the user id as a [`CurrentUser`] request extension. With
//! `auth.enabled = false` the `X-User-Id` header is trusted as-is.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use civic_common::db::sessions::resolve_session;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::AppState;

/// Header trusted for the caller's identity when auth is disabled
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn trusted_user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Authentication middleware, applied to agent-facing routes only
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = if state.config.auth.enabled {
        let token = bearer_token(request.headers())
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        match resolve_session(&state.db, &token).await? {
            Some(user_id) => user_id,
            None => {
                warn!(path = %request.uri().path(), "Rejected invalid or expired session");
                return Err(ApiError::Unauthorized(
                    "Invalid or expired session".to_string(),
                ));
            }
        }
    } else {
        // Auth disabled: identity comes straight from the header
        trusted_user_id(request.headers())
            .ok_or_else(|| ApiError::Unauthorized("Missing X-User-Id header".to_string()))?
    };

    debug!(user_id = %user_id, "Authenticated request");
    request.extensions_mut().insert(CurrentUser(user_id));

    Ok(next.run(request).await)
}
