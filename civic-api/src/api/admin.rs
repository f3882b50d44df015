//! Administrative endpoints

use axum::{extract::State, routing::post, Json, Router};
use civic_common::db::stations::seed_from_reference;
use serde::Serialize;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SeedResponse {
    pub seeded: usize,
}

/// POST /api/admin/polling-stations/seed
///
/// Replaces every polling station with the loaded reference dataset.
pub async fn seed_polling_stations(State(state): State<AppState>) -> ApiResult<Json<SeedResponse>> {
    let seeded = seed_from_reference(&state.db, &state.reference).await?;
    Ok(Json(SeedResponse { seeded }))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/api/admin/polling-stations/seed", post(seed_polling_stations))
}
