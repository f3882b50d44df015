//! Agent registration and profile queries
//!
//! Registration allocates the ward sequence number and inserts the agent in
//! one transaction. The sequence comes from `ward_sequences`, an atomic
//! increment-and-fetch counter, instead of counting existing agents, so two
//! concurrent registrations in one ward never receive the same number.

use crate::civic_code::format_civic_code;
use crate::config::RegistrationConfig;
use crate::db::models::Agent;
use crate::reference::ReferenceData;
use crate::{national_id, Error, Result};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Registration request
#[derive(Debug, Clone, Deserialize)]
pub struct NewAgent {
    pub email: String,
    pub confirm_email: String,
    pub first_name: String,
    pub last_name: String,
    pub county: String,
    pub constituency: String,
    pub ward: String,
    /// `YYYY-MM-DD`
    pub date_of_birth: String,
    /// 8 digits, stored only as a salted digest
    pub national_id: String,
    #[serde(default)]
    pub biometric_public_key: Option<String>,
}

/// Reject malformed registration input before touching the database
pub fn validate_registration(agent: &NewAgent) -> Result<()> {
    if !looks_like_email(&agent.email) {
        return Err(Error::InvalidInput("Invalid email address".to_string()));
    }
    if agent.email != agent.confirm_email {
        return Err(Error::InvalidInput("Emails do not match".to_string()));
    }

    for (field, value) in [
        ("first_name", &agent.first_name),
        ("last_name", &agent.last_name),
        ("county", &agent.county),
        ("constituency", &agent.constituency),
        ("ward", &agent.ward),
    ] {
        if value.trim().is_empty() {
            return Err(Error::InvalidInput(format!("{} must not be empty", field)));
        }
    }

    NaiveDate::parse_from_str(&agent.date_of_birth, "%Y-%m-%d").map_err(|_| {
        Error::InvalidInput("date_of_birth must be a YYYY-MM-DD date".to_string())
    })?;

    national_id::validate(&agent.national_id)
}

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// Atomically take the next sequence number for `ward`
///
/// A ward seen for the first time is seeded from the number of agents already
/// registered there, so the (N+1)th agent of a ward holding N receives N+1.
pub async fn allocate_ward_sequence(conn: &mut SqliteConnection, ward: &str) -> Result<i64> {
    let seq: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO ward_sequences (ward, last_seq)
        VALUES (?, (SELECT COUNT(*) FROM agents WHERE ward = ?) + 1)
        ON CONFLICT(ward) DO UPDATE SET last_seq = last_seq + 1
        RETURNING last_seq
        "#,
    )
    .bind(ward)
    .bind(ward)
    .fetch_one(&mut *conn)
    .await?;

    debug!(ward = %ward, seq, "Allocated ward sequence");
    Ok(seq)
}

fn is_civic_code_conflict(err: &Error) -> bool {
    err.is_unique_violation() && err.to_string().contains("civic_code")
}

/// Register the agent for `user_id`
///
/// Fails with `Conflict` when the user or email is already registered and
/// with `InvalidInput` on malformed fields. A civic code that collides with
/// an existing one (possible when fallback segments coincide) is retried with
/// the ward's next sequence number.
pub async fn register_agent(
    pool: &SqlitePool,
    reference: &ReferenceData,
    settings: &RegistrationConfig,
    user_id: &str,
    new_agent: &NewAgent,
) -> Result<Agent> {
    validate_registration(new_agent)?;

    if find_by_user(pool, user_id).await?.is_some() {
        warn!(user_id = %user_id, "Agent already registered for user");
        return Err(Error::Conflict(
            "You have already registered as an agent".to_string(),
        ));
    }

    let national_id_hash = national_id::protect(&new_agent.national_id, &settings.national_id_pepper)?;
    let biometric_key = new_agent
        .biometric_public_key
        .clone()
        .filter(|k| !k.is_empty());

    let mut tx = pool.begin().await?;

    for attempt in 1..=settings.max_code_attempts {
        let seq = allocate_ward_sequence(&mut tx, &new_agent.ward).await?;
        let civic_code = format_civic_code(
            reference,
            &new_agent.county,
            &new_agent.constituency,
            &new_agent.ward,
            seq,
        );

        let agent = Agent {
            guid: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            email: new_agent.email.clone(),
            first_name: new_agent.first_name.trim().to_string(),
            last_name: new_agent.last_name.trim().to_string(),
            county: new_agent.county.clone(),
            constituency: new_agent.constituency.clone(),
            ward: new_agent.ward.clone(),
            date_of_birth: new_agent.date_of_birth.clone(),
            national_id_hash: national_id_hash.clone(),
            civic_code,
            biometric_enabled: biometric_key.is_some(),
            biometric_public_key: biometric_key.clone(),
            created_at: Utc::now(),
        };

        match insert_agent(&mut tx, &agent).await {
            Ok(()) => {
                tx.commit().await?;
                info!(
                    agent_id = %agent.guid,
                    civic_code = %agent.civic_code,
                    attempt,
                    "Agent registered"
                );
                return Ok(agent);
            }
            Err(e) if is_civic_code_conflict(&e) => {
                warn!(
                    civic_code = %agent.civic_code,
                    attempt,
                    "Civic code already issued, retrying with next sequence"
                );
            }
            Err(e) if e.is_unique_violation() => {
                return Err(Error::Conflict(
                    "An agent with this email or account already exists".to_string(),
                ));
            }
            Err(e) => return Err(e),
        }
    }

    Err(Error::Internal(format!(
        "No unique civic code for ward '{}' after {} attempts",
        new_agent.ward, settings.max_code_attempts
    )))
}

async fn insert_agent(conn: &mut SqliteConnection, agent: &Agent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO agents (
            guid, user_id, email, first_name, last_name,
            county, constituency, ward, date_of_birth,
            national_id_hash, civic_code, biometric_enabled, biometric_public_key,
            created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&agent.guid)
    .bind(&agent.user_id)
    .bind(&agent.email)
    .bind(&agent.first_name)
    .bind(&agent.last_name)
    .bind(&agent.county)
    .bind(&agent.constituency)
    .bind(&agent.ward)
    .bind(&agent.date_of_birth)
    .bind(&agent.national_id_hash)
    .bind(&agent.civic_code)
    .bind(agent.biometric_enabled)
    .bind(&agent.biometric_public_key)
    .bind(agent.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_by_user(pool: &SqlitePool, user_id: &str) -> Result<Option<Agent>> {
    let agent = sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(agent)
}

/// Agent for `user_id`, or `NotFound`
pub async fn require_by_user(pool: &SqlitePool, user_id: &str) -> Result<Agent> {
    find_by_user(pool, user_id).await?.ok_or_else(|| {
        Error::NotFound("Agent profile not found. Please register first.".to_string())
    })
}

pub async fn find_by_civic_code(pool: &SqlitePool, civic_code: &str) -> Result<Option<Agent>> {
    let agent = sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE civic_code = ?")
        .bind(civic_code)
        .fetch_optional(pool)
        .await?;
    Ok(agent)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Agent>> {
    let agent = sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(agent)
}

/// Profile update. Only names are editable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentUpdate {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

pub async fn update_profile(pool: &SqlitePool, user_id: &str, update: &AgentUpdate) -> Result<Agent> {
    let agent = require_by_user(pool, user_id).await?;

    let pick = |new: &Option<String>, old: &str| -> String {
        new.as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(old)
            .to_string()
    };
    let first_name = pick(&update.first_name, &agent.first_name);
    let last_name = pick(&update.last_name, &agent.last_name);

    sqlx::query("UPDATE agents SET first_name = ?, last_name = ? WHERE guid = ?")
        .bind(&first_name)
        .bind(&last_name)
        .bind(&agent.guid)
        .execute(pool)
        .await?;

    info!(agent_id = %agent.guid, "Agent profile updated");

    Ok(Agent {
        first_name,
        last_name,
        ..agent
    })
}

/// Store a biometric credential for the agent registered to `user_id`
pub async fn enable_biometric(pool: &SqlitePool, user_id: &str, public_key: &str) -> Result<Agent> {
    if public_key.trim().is_empty() {
        return Err(Error::InvalidInput("biometric_public_key must not be empty".to_string()));
    }

    let agent = require_by_user(pool, user_id).await?;

    sqlx::query("UPDATE agents SET biometric_enabled = 1, biometric_public_key = ? WHERE guid = ?")
        .bind(public_key)
        .bind(&agent.guid)
        .execute(pool)
        .await?;

    info!(agent_id = %agent.guid, "Biometric credential registered");

    Ok(Agent {
        biometric_enabled: true,
        biometric_public_key: Some(public_key.to_string()),
        ..agent
    })
}

/// Agent whose enabled biometric credential matches, if any
pub async fn find_by_biometric(pool: &SqlitePool, email: &str, public_key: &str) -> Result<Option<Agent>> {
    let agent = sqlx::query_as::<_, Agent>(
        "SELECT * FROM agents WHERE email = ? AND biometric_public_key = ? AND biometric_enabled = 1",
    )
    .bind(email)
    .bind(public_key)
    .fetch_optional(pool)
    .await?;
    Ok(agent)
}
