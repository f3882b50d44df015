//! Incident video handlers

use axum::{extract::State, http::StatusCode, Extension, Json};
use civic_common::db::incidents::{self, NewIncidentVideo};
use civic_common::db::IncidentVideo;

use super::auth::CurrentUser;
use crate::error::ApiResult;
use crate::AppState;

/// POST /api/incidents/videos
pub async fn record_video(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(request): Json<NewIncidentVideo>,
) -> ApiResult<(StatusCode, Json<IncidentVideo>)> {
    let video = incidents::record_video(&state.db, &user_id, &request).await?;
    Ok((StatusCode::CREATED, Json(video)))
}

/// GET /api/incidents/my-videos
pub async fn my_videos(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<IncidentVideo>>> {
    let videos = incidents::videos_for_user(&state.db, &user_id).await?;
    Ok(Json(videos))
}
