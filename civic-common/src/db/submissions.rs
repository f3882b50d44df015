//! Form34A submissions
//!
//! One submission per agent. Serial numbers are not unique: a serial already
//! present marks the new submission, and every earlier one carrying it, with
//! `has_discrepancy`.

use crate::db::agents::require_by_user;
use crate::db::models::{CandidateResult, Form34aSubmission};
use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

/// One tally line as read off the form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedCandidate {
    pub candidate_first_name: String,
    pub candidate_last_name: String,
    pub party_name: String,
    pub votes: i64,
}

/// Submission request: location from the agent, serial and tallies from the
/// OCR step, image already placed in object storage under `image_key`
#[derive(Debug, Clone, Deserialize)]
pub struct NewSubmission {
    pub serial_number: String,
    pub image_key: String,
    pub county: String,
    pub constituency: String,
    pub ward: String,
    pub polling_station: String,
    #[serde(default)]
    pub station_code: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub candidates: Vec<ExtractedCandidate>,
}

/// A submission with its candidate rows
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionWithCandidates {
    #[serde(flatten)]
    pub submission: Form34aSubmission,
    pub candidates: Vec<CandidateResult>,
}

/// Upper bound on a single tally line
pub const MAX_VOTES_PER_LINE: i64 = 1_000_000;

pub fn validate_submission(sub: &NewSubmission) -> Result<()> {
    for (field, value) in [
        ("serial_number", &sub.serial_number),
        ("image_key", &sub.image_key),
        ("county", &sub.county),
        ("constituency", &sub.constituency),
        ("ward", &sub.ward),
        ("polling_station", &sub.polling_station),
    ] {
        if value.trim().is_empty() {
            return Err(Error::InvalidInput(format!("{} must not be empty", field)));
        }
    }

    if let Some(c) = sub.candidates.iter().find(|c| c.votes < 0) {
        return Err(Error::InvalidInput(format!(
            "Negative vote count for {} {}",
            c.candidate_first_name, c.candidate_last_name
        )));
    }

    if let Some(c) = sub.candidates.iter().find(|c| c.votes > MAX_VOTES_PER_LINE) {
        return Err(Error::InvalidInput(format!(
            "Vote count for {} {} exceeds {}",
            c.candidate_first_name, c.candidate_last_name, MAX_VOTES_PER_LINE
        )));
    }

    for (name, value) in [("latitude", sub.latitude), ("longitude", sub.longitude)] {
        if value.is_some_and(|v| !v.is_finite()) {
            return Err(Error::InvalidInput(format!("{} must be a finite number", name)));
        }
    }

    Ok(())
}

/// Record the Form34A submission of the agent registered for `user_id`
pub async fn submit_form34a(
    pool: &SqlitePool,
    user_id: &str,
    new_sub: &NewSubmission,
) -> Result<SubmissionWithCandidates> {
    validate_submission(new_sub)?;
    let agent = require_by_user(pool, user_id).await?;

    if find_for_agent(pool, &agent.guid).await?.is_some() {
        warn!(agent_id = %agent.guid, "Agent already submitted a form");
        return Err(Error::Conflict(
            "You have already submitted a Form34A. Only one submission per agent is allowed."
                .to_string(),
        ));
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    // Write first so the transaction takes the write lock up front
    let flagged = sqlx::query(
        "UPDATE form34a_submissions SET has_discrepancy = 1 WHERE serial_number = ?",
    )
    .bind(&new_sub.serial_number)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let has_discrepancy = flagged > 0;
    if has_discrepancy {
        warn!(
            serial_number = %new_sub.serial_number,
            earlier_submissions = flagged,
            "Duplicate serial number detected"
        );
    }

    let submission = Form34aSubmission {
        guid: Uuid::new_v4().to_string(),
        agent_id: agent.guid.clone(),
        serial_number: new_sub.serial_number.clone(),
        image_key: new_sub.image_key.clone(),
        county: new_sub.county.clone(),
        constituency: new_sub.constituency.clone(),
        ward: new_sub.ward.clone(),
        polling_station: new_sub.polling_station.clone(),
        station_code: new_sub.station_code.clone().filter(|c| !c.is_empty()),
        latitude: new_sub.latitude,
        longitude: new_sub.longitude,
        submitted_at: now,
        verified: false,
        has_discrepancy,
    };

    let inserted = sqlx::query(
        r#"
        INSERT INTO form34a_submissions (
            guid, agent_id, serial_number, image_key,
            county, constituency, ward, polling_station, station_code,
            latitude, longitude, submitted_at, verified, has_discrepancy
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&submission.guid)
    .bind(&submission.agent_id)
    .bind(&submission.serial_number)
    .bind(&submission.image_key)
    .bind(&submission.county)
    .bind(&submission.constituency)
    .bind(&submission.ward)
    .bind(&submission.polling_station)
    .bind(&submission.station_code)
    .bind(submission.latitude)
    .bind(submission.longitude)
    .bind(submission.submitted_at)
    .bind(submission.has_discrepancy)
    .execute(&mut *tx)
    .await;

    if let Err(e) = inserted {
        let err = Error::from(e);
        if err.is_unique_violation() {
            return Err(Error::Conflict(
                "You have already submitted a Form34A. Only one submission per agent is allowed."
                    .to_string(),
            ));
        }
        return Err(err);
    }

    let mut candidates = Vec::with_capacity(new_sub.candidates.len());
    for c in &new_sub.candidates {
        let row = CandidateResult {
            guid: Uuid::new_v4().to_string(),
            form34a_id: submission.guid.clone(),
            candidate_first_name: c.candidate_first_name.clone(),
            candidate_last_name: c.candidate_last_name.clone(),
            party_name: c.party_name.clone(),
            votes: c.votes,
            extracted_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO candidate_results (
                guid, form34a_id, candidate_first_name, candidate_last_name,
                party_name, votes, extracted_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.guid)
        .bind(&row.form34a_id)
        .bind(&row.candidate_first_name)
        .bind(&row.candidate_last_name)
        .bind(&row.party_name)
        .bind(row.votes)
        .bind(row.extracted_at)
        .execute(&mut *tx)
        .await?;

        candidates.push(row);
    }

    tx.commit().await?;

    info!(
        form34a_id = %submission.guid,
        serial_number = %submission.serial_number,
        has_discrepancy,
        candidate_count = candidates.len(),
        "Form34A submitted"
    );

    Ok(SubmissionWithCandidates {
        submission,
        candidates,
    })
}

pub async fn find_for_agent(pool: &SqlitePool, agent_id: &str) -> Result<Option<Form34aSubmission>> {
    let sub = sqlx::query_as::<_, Form34aSubmission>(
        "SELECT * FROM form34a_submissions WHERE agent_id = ?",
    )
    .bind(agent_id)
    .fetch_optional(pool)
    .await?;
    Ok(sub)
}

pub async fn candidates_for(pool: &SqlitePool, form34a_id: &str) -> Result<Vec<CandidateResult>> {
    let rows = sqlx::query_as::<_, CandidateResult>(
        "SELECT * FROM candidate_results WHERE form34a_id = ? ORDER BY candidate_last_name, candidate_first_name",
    )
    .bind(form34a_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// The agent's submission with candidates, `None` if nothing was submitted
pub async fn submission_with_candidates(
    pool: &SqlitePool,
    agent_id: &str,
) -> Result<Option<SubmissionWithCandidates>> {
    let Some(submission) = find_for_agent(pool, agent_id).await? else {
        return Ok(None);
    };
    let candidates = candidates_for(pool, &submission.guid).await?;
    Ok(Some(SubmissionWithCandidates {
        submission,
        candidates,
    }))
}
