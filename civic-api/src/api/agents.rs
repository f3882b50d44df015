//! Agent registration and profile handlers

use axum::{extract::State, http::StatusCode, Extension, Json};
use civic_common::db::agents::{self, AgentUpdate, NewAgent};
use civic_common::db::Agent;
use tracing::info;

use super::auth::CurrentUser;
use crate::error::ApiResult;
use crate::AppState;

/// POST /api/agents/register
///
/// Returns the stored agent, including its civic code.
pub async fn register_agent(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(request): Json<NewAgent>,
) -> ApiResult<(StatusCode, Json<Agent>)> {
    info!(
        user_id = %user_id,
        county = %request.county,
        constituency = %request.constituency,
        ward = %request.ward,
        "Agent registration requested"
    );

    let agent = agents::register_agent(
        &state.db,
        &state.reference,
        &state.config.registration,
        &user_id,
        &request,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(agent)))
}

/// GET /api/agents/me
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> ApiResult<Json<Agent>> {
    let agent = agents::require_by_user(&state.db, &user_id).await?;
    Ok(Json(agent))
}

/// PUT /api/agents/me
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(update): Json<AgentUpdate>,
) -> ApiResult<Json<Agent>> {
    let agent = agents::update_profile(&state.db, &user_id, &update).await?;
    Ok(Json(agent))
}
