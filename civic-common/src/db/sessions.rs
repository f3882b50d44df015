//! Bearer session tokens

use crate::db::models::Session;
use crate::{Error, Result};
use chrono::{Duration, Utc};
use rand::RngCore;
use sqlx::SqlitePool;
use tracing::{debug, info};

const TOKEN_BYTES: usize = 32;

fn new_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issue a session for `user_id` valid for `ttl_days`
pub async fn create_session(pool: &SqlitePool, user_id: &str, ttl_days: i64) -> Result<Session> {
    if ttl_days <= 0 {
        return Err(Error::InvalidInput("session lifetime must be positive".to_string()));
    }

    let now = Utc::now();
    let session = Session {
        token: new_token(),
        user_id: user_id.to_string(),
        expires_at: now + Duration::days(ttl_days),
        created_at: now,
    };

    sqlx::query("INSERT INTO sessions (token, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)")
        .bind(&session.token)
        .bind(&session.user_id)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(pool)
        .await?;

    info!(user_id = %user_id, expires_at = %session.expires_at, "Session created");
    Ok(session)
}

/// User id behind `token`, `None` if unknown or expired
pub async fn resolve_session(pool: &SqlitePool, token: &str) -> Result<Option<String>> {
    let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await?;

    match session {
        Some(s) if s.expires_at > Utc::now() => Ok(Some(s.user_id)),
        Some(s) => {
            debug!(user_id = %s.user_id, "Session expired");
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Drop expired sessions, returning how many were removed
pub async fn purge_expired(pool: &SqlitePool) -> Result<u64> {
    let sessions = sqlx::query_as::<_, Session>("SELECT * FROM sessions")
        .fetch_all(pool)
        .await?;

    let now = Utc::now();
    let mut removed = 0;
    for s in sessions.iter().filter(|s| s.expires_at <= now) {
        removed += sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(&s.token)
            .execute(pool)
            .await?
            .rows_affected();
    }

    if removed > 0 {
        info!(removed, "Expired sessions purged");
    }
    Ok(removed)
}
