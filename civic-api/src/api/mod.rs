//! HTTP API handlers for civic-api

pub mod admin;
pub mod agents;
pub mod auth;
pub mod biometric;
pub mod dashboard;
pub mod form34a;
pub mod health;
pub mod incidents;
pub mod locations;

pub use admin::admin_routes;
pub use agents::{get_profile, register_agent, update_profile};
pub use auth::{auth_middleware, CurrentUser};
pub use biometric::{biometric_routes, register_biometric};
pub use dashboard::dashboard_routes;
pub use form34a::{my_submission, submit_form34a};
pub use health::health_routes;
pub use incidents::{my_videos, record_video};
pub use locations::location_routes;
