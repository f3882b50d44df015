//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Agent row. `national_id_hash` is skipped when serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Agent {
    pub guid: String,
    pub user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub county: String,
    pub constituency: String,
    pub ward: String,
    pub date_of_birth: String,
    #[serde(skip_serializing)]
    pub national_id_hash: String,
    pub civic_code: String,
    pub biometric_enabled: bool,
    pub biometric_public_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PollingStation {
    pub guid: String,
    pub county: String,
    pub constituency: String,
    pub ward: String,
    pub station_name: String,
    pub station_code: String,
    pub expected_agents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Form34aSubmission {
    pub guid: String,
    pub agent_id: String,
    pub serial_number: String,
    pub image_key: String,
    pub county: String,
    pub constituency: String,
    pub ward: String,
    pub polling_station: String,
    pub station_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub submitted_at: DateTime<Utc>,
    pub verified: bool,
    pub has_discrepancy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CandidateResult {
    pub guid: String,
    pub form34a_id: String,
    pub candidate_first_name: String,
    pub candidate_last_name: String,
    pub party_name: String,
    pub votes: i64,
    pub extracted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IncidentVideo {
    pub guid: String,
    pub agent_id: String,
    pub video_key: String,
    pub video_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub location_name: Option<String>,
    pub duration_secs: Option<i64>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
