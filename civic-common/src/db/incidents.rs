//! Incident video records
//!
//! The video itself lives in object storage; only its key and metadata are
//! kept here. Each agent may record three videos, coded `{civic_code}-A`
//! through `{civic_code}-C` in upload order.

use crate::civic_code::{video_code, VIDEO_LETTERS};
use crate::db::agents::require_by_user;
use crate::db::models::IncidentVideo;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct NewIncidentVideo {
    pub video_key: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<i64>,
}

/// Dashboard row: a video with the location of the agent who recorded it
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CountyIncidentVideo {
    pub video_code: String,
    pub video_key: String,
    pub agent_civic_code: String,
    pub county: String,
    pub constituency: String,
    pub ward: String,
    pub latitude: f64,
    pub longitude: f64,
    pub location_name: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

fn max_videos_error() -> Error {
    Error::InvalidInput(format!(
        "You can upload a maximum of {} videos",
        VIDEO_LETTERS.len()
    ))
}

pub async fn record_video(
    pool: &SqlitePool,
    user_id: &str,
    new_video: &NewIncidentVideo,
) -> Result<IncidentVideo> {
    if new_video.video_key.trim().is_empty() {
        return Err(Error::InvalidInput("video_key must not be empty".to_string()));
    }
    if !new_video.latitude.is_finite() || !new_video.longitude.is_finite() {
        return Err(Error::InvalidInput(
            "latitude and longitude must be finite numbers".to_string(),
        ));
    }
    if new_video.duration_secs.is_some_and(|d| d < 0) {
        return Err(Error::InvalidInput("duration_secs must not be negative".to_string()));
    }

    let agent = require_by_user(pool, user_id).await?;

    let mut tx = pool.begin().await?;

    // Write first so concurrent uploads queue on the write lock instead of
    // failing the read-to-write upgrade
    sqlx::query("UPDATE agents SET civic_code = civic_code WHERE guid = ?")
        .bind(&agent.guid)
        .execute(&mut *tx)
        .await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incident_videos WHERE agent_id = ?")
        .bind(&agent.guid)
        .fetch_one(&mut *tx)
        .await?;

    let Some(code) = video_code(&agent.civic_code, existing as usize) else {
        warn!(agent_id = %agent.guid, existing, "Maximum videos exceeded");
        return Err(max_videos_error());
    };

    let video = IncidentVideo {
        guid: Uuid::new_v4().to_string(),
        agent_id: agent.guid.clone(),
        video_key: new_video.video_key.clone(),
        video_code: code,
        latitude: new_video.latitude,
        longitude: new_video.longitude,
        location_name: new_video.location_name.clone().filter(|n| !n.is_empty()),
        duration_secs: new_video.duration_secs,
        uploaded_at: Utc::now(),
    };

    let inserted = sqlx::query(
        r#"
        INSERT INTO incident_videos (
            guid, agent_id, video_key, video_code, latitude, longitude,
            location_name, duration_secs, uploaded_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&video.guid)
    .bind(&video.agent_id)
    .bind(&video.video_key)
    .bind(&video.video_code)
    .bind(video.latitude)
    .bind(video.longitude)
    .bind(&video.location_name)
    .bind(video.duration_secs)
    .bind(video.uploaded_at)
    .execute(&mut *tx)
    .await;

    // A concurrent upload took this letter
    if let Err(e) = inserted {
        let err = Error::from(e);
        if err.is_unique_violation() {
            return Err(Error::Conflict(
                "Another video upload is in progress, please retry".to_string(),
            ));
        }
        return Err(err);
    }

    tx.commit().await?;

    info!(agent_id = %agent.guid, video_code = %video.video_code, "Incident video recorded");
    Ok(video)
}

pub async fn videos_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<IncidentVideo>> {
    let agent = require_by_user(pool, user_id).await?;

    let videos = sqlx::query_as::<_, IncidentVideo>(
        "SELECT * FROM incident_videos WHERE agent_id = ? ORDER BY video_code",
    )
    .bind(&agent.guid)
    .fetch_all(pool)
    .await?;

    Ok(videos)
}

/// Videos recorded by agents registered in `county`, oldest first
pub async fn videos_for_county(pool: &SqlitePool, county: &str) -> Result<Vec<CountyIncidentVideo>> {
    let videos = sqlx::query_as::<_, CountyIncidentVideo>(
        r#"
        SELECT
            v.video_code,
            v.video_key,
            a.civic_code AS agent_civic_code,
            a.county,
            a.constituency,
            a.ward,
            v.latitude,
            v.longitude,
            v.location_name,
            v.uploaded_at
        FROM incident_videos v
        JOIN agents a ON a.guid = v.agent_id
        WHERE a.county = ?
        ORDER BY v.uploaded_at, v.video_code
        "#,
    )
    .bind(county)
    .fetch_all(pool)
    .await?;

    Ok(videos)
}
