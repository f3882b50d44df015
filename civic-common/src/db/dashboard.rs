//! Dashboard queries
//!
//! Rows are loaded once per request and handed to [`crate::reconcile`],
//! which does the grouping and filtering.

use crate::db::agents::find_by_civic_code;
use crate::db::submissions::{submission_with_candidates, SubmissionWithCandidates};
use crate::reconcile::{
    self, CandidateLine, CandidateTotal, DuplicateGroup, ExtraSubmissions, LocationFilter,
    MissingStation, SerialDiscrepancy, StationMatch, StationRecord, SubmissionRecord,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    guid: String,
    agent_code: Option<String>,
    serial_number: String,
    county: String,
    constituency: String,
    ward: String,
    polling_station: String,
    station_code: Option<String>,
    submitted_at: DateTime<Utc>,
}

impl From<SubmissionRow> for SubmissionRecord {
    fn from(row: SubmissionRow) -> Self {
        SubmissionRecord {
            guid: row.guid,
            agent_code: row.agent_code,
            serial_number: row.serial_number,
            county: row.county,
            constituency: row.constituency,
            ward: row.ward,
            polling_station: row.polling_station,
            station_code: row.station_code,
            submitted_at: row.submitted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StationRow {
    county: String,
    constituency: String,
    ward: String,
    station_name: String,
    station_code: String,
}

#[derive(sqlx::FromRow)]
struct CandidateRow {
    form34a_id: String,
    candidate_first_name: String,
    candidate_last_name: String,
    party_name: String,
    votes: i64,
    county: String,
    constituency: String,
    ward: String,
}

/// Every submission with its agent's civic code (`None` once the agent is gone)
pub async fn load_submissions(pool: &SqlitePool) -> Result<Vec<SubmissionRecord>> {
    let rows = sqlx::query_as::<_, SubmissionRow>(
        r#"
        SELECT
            f.guid,
            a.civic_code AS agent_code,
            f.serial_number,
            f.county,
            f.constituency,
            f.ward,
            f.polling_station,
            f.station_code,
            f.submitted_at
        FROM form34a_submissions f
        LEFT JOIN agents a ON a.guid = f.agent_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(SubmissionRecord::from).collect())
}

pub async fn load_stations(pool: &SqlitePool) -> Result<Vec<StationRecord>> {
    let rows = sqlx::query_as::<_, StationRow>(
        "SELECT county, constituency, ward, station_name, station_code FROM polling_stations",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| StationRecord {
            county: r.county,
            constituency: r.constituency,
            ward: r.ward,
            station_name: r.station_name,
            station_code: r.station_code,
        })
        .collect())
}

pub async fn load_candidate_lines(pool: &SqlitePool) -> Result<Vec<CandidateLine>> {
    let rows = sqlx::query_as::<_, CandidateRow>(
        r#"
        SELECT
            c.form34a_id,
            c.candidate_first_name,
            c.candidate_last_name,
            c.party_name,
            c.votes,
            f.county,
            f.constituency,
            f.ward
        FROM candidate_results c
        JOIN form34a_submissions f ON f.guid = c.form34a_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| CandidateLine {
            form34a_id: r.form34a_id,
            candidate_first_name: r.candidate_first_name,
            candidate_last_name: r.candidate_last_name,
            party_name: r.party_name,
            votes: r.votes,
            county: r.county,
            constituency: r.constituency,
            ward: r.ward,
        })
        .collect())
}

pub async fn candidate_votes(pool: &SqlitePool, filter: &LocationFilter) -> Result<Vec<CandidateTotal>> {
    let lines = load_candidate_lines(pool).await?;
    let totals = reconcile::candidate_votes(&lines, filter)?;
    info!(?filter, candidates = totals.len(), "Candidate votes aggregated");
    Ok(totals)
}

pub async fn serial_discrepancies(
    pool: &SqlitePool,
    filter: &LocationFilter,
) -> Result<Vec<SerialDiscrepancy>> {
    let subs = load_submissions(pool).await?;
    let groups = reconcile::serial_discrepancies(&subs, filter);
    info!(?filter, discrepancies = groups.len(), "Serial discrepancies computed");
    Ok(groups)
}

pub async fn missing_submissions(
    pool: &SqlitePool,
    filter: &LocationFilter,
    matching: StationMatch,
) -> Result<Vec<MissingStation>> {
    let stations = load_stations(pool).await?;
    let subs = load_submissions(pool).await?;
    let missing = reconcile::missing_submissions(&stations, &subs, filter, matching);
    info!(
        ?filter,
        %matching,
        stations = stations.len(),
        missing = missing.len(),
        "Missing submissions computed"
    );
    Ok(missing)
}

pub async fn extra_submissions(
    pool: &SqlitePool,
    filter: &LocationFilter,
    matching: StationMatch,
) -> Result<Vec<ExtraSubmissions>> {
    let stations = load_stations(pool).await?;
    let subs = load_submissions(pool).await?;
    let extra = reconcile::extra_submissions(&stations, &subs, filter, matching);
    info!(?filter, %matching, stations = extra.len(), "Extra submissions computed");
    Ok(extra)
}

pub async fn duplicate_submissions(
    pool: &SqlitePool,
    filter: &LocationFilter,
    matching: StationMatch,
) -> Result<Vec<DuplicateGroup>> {
    let stations = load_stations(pool).await?;
    let subs = load_submissions(pool).await?;
    let groups = reconcile::duplicate_submissions(&stations, &subs, filter, matching);
    info!(?filter, %matching, groups = groups.len(), "Duplicate submissions computed");
    Ok(groups)
}

/// Submission of the agent holding `agent_code`
///
/// `NotFound` when no agent has that code, `Ok(None)` when the agent has not
/// submitted yet.
pub async fn search_by_agent_code(
    pool: &SqlitePool,
    agent_code: &str,
) -> Result<Option<SubmissionWithCandidates>> {
    let agent = find_by_civic_code(pool, agent_code)
        .await?
        .ok_or_else(|| Error::NotFound(format!("No agent with code {}", agent_code)))?;

    let found = submission_with_candidates(pool, &agent.guid).await?;
    debug!(agent_code, found = found.is_some(), "Form34A search");
    Ok(found)
}
