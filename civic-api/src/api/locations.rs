//! Administrative division lookups from the reference dataset
//!
//! Unknown names yield empty lists, not 404.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use civic_common::reference::{Constituency, County, Ward};

use crate::AppState;

/// GET /api/locations/counties
pub async fn counties(State(state): State<AppState>) -> Json<Vec<County>> {
    Json(state.reference.counties().to_vec())
}

/// GET /api/locations/constituencies/:county
pub async fn constituencies(
    State(state): State<AppState>,
    Path(county): Path<String>,
) -> Json<Vec<Constituency>> {
    Json(state.reference.constituencies_of(&county).cloned().collect())
}

/// GET /api/locations/wards/:constituency
pub async fn wards(
    State(state): State<AppState>,
    Path(constituency): Path<String>,
) -> Json<Vec<Ward>> {
    Json(state.reference.wards_of(&constituency).cloned().collect())
}

pub fn location_routes() -> Router<AppState> {
    Router::new()
        .route("/api/locations/counties", get(counties))
        .route("/api/locations/constituencies/:county", get(constituencies))
        .route("/api/locations/wards/:constituency", get(wards))
}
