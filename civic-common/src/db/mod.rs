//! Database schema and queries

pub mod agents;
pub mod dashboard;
pub mod incidents;
pub mod init;
pub mod migrations;
pub mod models;
pub mod sessions;
pub mod stations;
pub mod submissions;

pub use init::*;
pub use migrations::run_migrations;
pub use models::*;
