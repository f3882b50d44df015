//! civic-api library - HTTP surface of the election-monitoring service

use std::sync::Arc;

use axum::Router;
use civic_common::config::CivicConfig;
use civic_common::ReferenceData;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Administrative divisions and polling station seed
    pub reference: Arc<ReferenceData>,
    pub config: Arc<CivicConfig>,
}

impl AppState {
    pub fn new(db: SqlitePool, reference: ReferenceData, config: CivicConfig) -> Self {
        Self {
            db,
            reference: Arc::new(reference),
            config: Arc::new(config),
        }
    }
}

/// Build application router
///
/// Agent-facing routes, biometric registration included, require a session;
/// locations, dashboard, admin, biometric verification and health are public.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/api/agents/register", post(api::register_agent))
        .route("/api/agents/me", get(api::get_profile).put(api::update_profile))
        .route("/api/form34a/submit", post(api::submit_form34a))
        .route("/api/form34a/my-submission", get(api::my_submission))
        .route("/api/incidents/videos", post(api::record_video))
        .route("/api/incidents/my-videos", get(api::my_videos))
        .route("/api/biometric/register", post(api::register_biometric))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .merge(api::dashboard_routes())
        .merge(api::location_routes())
        .merge(api::admin_routes())
        .merge(api::biometric_routes())
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
