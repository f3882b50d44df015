//! Biometric credential endpoints
//!
//! The device keeps the private half; the server stores the public key and
//! exchanges a matching (email, key) pair for a session token. Registering a
//! key needs a session and only ever touches the caller's own agent.

use axum::{extract::State, routing::post, Extension, Json, Router};
use chrono::{DateTime, Utc};
use civic_common::db::agents::{enable_biometric, find_by_biometric};
use civic_common::db::sessions::create_session;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BiometricRequest {
    pub email: String,
    pub biometric_public_key: String,
}

#[derive(Debug, Deserialize)]
pub struct BiometricKey {
    pub biometric_public_key: String,
}

#[derive(Debug, Serialize)]
pub struct BiometricRegistered {
    pub success: bool,
    pub civic_code: String,
}

#[derive(Debug, Serialize)]
pub struct BiometricSession {
    pub token: String,
    pub user_id: String,
    pub civic_code: String,
    pub expires_at: DateTime<Utc>,
}

/// POST /api/biometric/register
pub async fn register_biometric(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(request): Json<BiometricKey>,
) -> ApiResult<Json<BiometricRegistered>> {
    let agent = enable_biometric(&state.db, &user_id, &request.biometric_public_key).await?;
    Ok(Json(BiometricRegistered {
        success: true,
        civic_code: agent.civic_code,
    }))
}

/// POST /api/biometric/verify
pub async fn verify_biometric(
    State(state): State<AppState>,
    Json(request): Json<BiometricRequest>,
) -> ApiResult<Json<BiometricSession>> {
    let Some(agent) =
        find_by_biometric(&state.db, request.email.trim(), &request.biometric_public_key).await?
    else {
        warn!(email = %request.email, "Biometric verification failed");
        return Err(ApiError::Unauthorized("Biometric verification failed".to_string()));
    };

    let session = create_session(&state.db, &agent.user_id, state.config.auth.session_ttl_days).await?;
    info!(agent_id = %agent.guid, "Biometric sign-in");

    Ok(Json(BiometricSession {
        token: session.token,
        user_id: session.user_id,
        civic_code: agent.civic_code,
        expires_at: session.expires_at,
    }))
}

/// Public half: exchanging a registered key for a session
pub fn biometric_routes() -> Router<AppState> {
    Router::new().route("/api/biometric/verify", post(verify_biometric))
}
