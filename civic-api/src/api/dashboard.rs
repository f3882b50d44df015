//! Dashboard endpoints
//!
//! Every report accepts optional `county`, `constituency` and `ward` filters
//! (exact match, empty means unfiltered). Station-based reports also accept
//! `station_match` to override the configured matching mode.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use civic_common::db::dashboard;
use civic_common::db::incidents::{videos_for_county, CountyIncidentVideo};
use civic_common::db::submissions::SubmissionWithCandidates;
use civic_common::reconcile::{
    CandidateTotal, DuplicateGroup, ExtraSubmissions, MissingStation, SerialDiscrepancy,
};
use civic_common::{LocationFilter, StationMatch};
use serde::Deserialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Query parameters shared by the reconciliation reports
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub county: Option<String>,
    pub constituency: Option<String>,
    pub ward: Option<String>,
    pub station_match: Option<StationMatch>,
}

impl DashboardQuery {
    fn filter(&self) -> LocationFilter {
        LocationFilter {
            county: self.county.clone(),
            constituency: self.constituency.clone(),
            ward: self.ward.clone(),
        }
        .normalized()
    }

    fn matching(&self, state: &AppState) -> StationMatch {
        self.station_match
            .unwrap_or(state.config.reconciliation.station_match)
    }
}

#[derive(Debug, Deserialize)]
pub struct CountyQuery {
    pub county: String,
}

#[derive(Debug, Deserialize)]
pub struct AgentCodeQuery {
    pub agent_code: String,
}

/// GET /api/dashboard/candidate-votes
pub async fn candidate_votes(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<Vec<CandidateTotal>>> {
    let totals = dashboard::candidate_votes(&state.db, &query.filter()).await?;
    Ok(Json(totals))
}

/// GET /api/dashboard/incident-videos?county=NAME
pub async fn incident_videos(
    State(state): State<AppState>,
    Query(query): Query<CountyQuery>,
) -> ApiResult<Json<Vec<CountyIncidentVideo>>> {
    if query.county.trim().is_empty() {
        return Err(ApiError::BadRequest("county is required".to_string()));
    }

    let videos = videos_for_county(&state.db, &query.county).await?;
    info!(county = %query.county, video_count = videos.len(), "Incident videos retrieved");
    Ok(Json(videos))
}

/// GET /api/dashboard/form34a-search?agent_code=CODE
///
/// 404 when no agent holds the code, `null` when it has not submitted.
pub async fn form34a_search(
    State(state): State<AppState>,
    Query(query): Query<AgentCodeQuery>,
) -> ApiResult<Json<Option<SubmissionWithCandidates>>> {
    let agent_code = query.agent_code.trim();
    if agent_code.is_empty() {
        return Err(ApiError::BadRequest("agent_code is required".to_string()));
    }

    let found = dashboard::search_by_agent_code(&state.db, agent_code).await?;
    Ok(Json(found))
}

/// GET /api/dashboard/serial-discrepancies
pub async fn serial_discrepancies(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<Vec<SerialDiscrepancy>>> {
    let groups = dashboard::serial_discrepancies(&state.db, &query.filter()).await?;
    Ok(Json(groups))
}

/// GET /api/dashboard/missing-submissions
pub async fn missing_submissions(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<Vec<MissingStation>>> {
    let missing =
        dashboard::missing_submissions(&state.db, &query.filter(), query.matching(&state)).await?;
    Ok(Json(missing))
}

/// GET /api/dashboard/extra-submissions
pub async fn extra_submissions(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<Vec<ExtraSubmissions>>> {
    let extra =
        dashboard::extra_submissions(&state.db, &query.filter(), query.matching(&state)).await?;
    Ok(Json(extra))
}

/// GET /api/dashboard/duplicate-submissions
pub async fn duplicate_submissions(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<Vec<DuplicateGroup>>> {
    let groups =
        dashboard::duplicate_submissions(&state.db, &query.filter(), query.matching(&state)).await?;
    Ok(Json(groups))
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/dashboard/candidate-votes", get(candidate_votes))
        .route("/api/dashboard/incident-videos", get(incident_videos))
        .route("/api/dashboard/form34a-search", get(form34a_search))
        .route("/api/dashboard/serial-discrepancies", get(serial_discrepancies))
        .route("/api/dashboard/missing-submissions", get(missing_submissions))
        .route("/api/dashboard/extra-submissions", get(extra_submissions))
        .route("/api/dashboard/duplicate-submissions", get(duplicate_submissions))
}
