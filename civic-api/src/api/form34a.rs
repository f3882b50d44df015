//! Form34A submission handlers
//!
//! The client uploads the image and runs extraction before calling submit;
//! this service records the extracted serial and tallies.

use axum::{extract::State, http::StatusCode, Extension, Json};
use civic_common::db::agents::require_by_user;
use civic_common::db::submissions::{self, NewSubmission, SubmissionWithCandidates};
use tracing::info;

use super::auth::CurrentUser;
use crate::error::ApiResult;
use crate::AppState;

/// POST /api/form34a/submit
pub async fn submit_form34a(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(request): Json<NewSubmission>,
) -> ApiResult<(StatusCode, Json<SubmissionWithCandidates>)> {
    info!(
        user_id = %user_id,
        serial_number = %request.serial_number,
        polling_station = %request.polling_station,
        "Form34A submission requested"
    );

    let saved = submissions::submit_form34a(&state.db, &user_id, &request).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// GET /api/form34a/my-submission
///
/// `null` when the agent has not submitted yet.
pub async fn my_submission(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> ApiResult<Json<Option<SubmissionWithCandidates>>> {
    let agent = require_by_user(&state.db, &user_id).await?;
    let submission = submissions::submission_with_candidates(&state.db, &agent.guid).await?;
    Ok(Json(submission))
}
