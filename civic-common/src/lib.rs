//! # Civic Common Library
//!
//! Shared code for the civic election-monitoring service:
//! - Error and result types
//! - Configuration loading and root folder resolution
//! - Administrative reference data (counties, constituencies, wards, polling stations)
//! - Civic code generation
//! - Form34A submission reconciliation
//! - Database schema and queries

pub mod civic_code;
pub mod config;
pub mod db;
pub mod error;
pub mod national_id;
pub mod reconcile;
pub mod reference;

pub use error::{Error, Result};
pub use reconcile::{LocationFilter, StationMatch};
pub use reference::ReferenceData;
