//! Database initialization
//!
//! Creates the database file on first run and every table idempotently
//! (`CREATE TABLE IF NOT EXISTS`), then runs versioned migrations.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Open (creating if needed) the database and bring its schema up to date
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas go on the connect options so every pooled connection gets them
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Create every table and index if missing
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_agents_table(pool).await?;
    create_ward_sequences_table(pool).await?;
    create_polling_stations_table(pool).await?;
    create_form34a_submissions_table(pool).await?;
    create_candidate_results_table(pool).await?;
    create_incident_videos_table(pool).await?;
    create_sessions_table(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Registered agents. Identity columns are written once at registration.
async fn create_agents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS agents (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            county TEXT NOT NULL,
            constituency TEXT NOT NULL,
            ward TEXT NOT NULL,
            date_of_birth TEXT NOT NULL,
            national_id_hash TEXT NOT NULL,
            civic_code TEXT NOT NULL UNIQUE,
            biometric_enabled INTEGER NOT NULL DEFAULT 0,
            biometric_public_key TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_agents_ward ON agents(ward)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_agents_county ON agents(county)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Per-ward counter backing the civic code sequence segment
async fn create_ward_sequences_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ward_sequences (
            ward TEXT PRIMARY KEY,
            last_seq INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_polling_stations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS polling_stations (
            guid TEXT PRIMARY KEY,
            county TEXT NOT NULL,
            constituency TEXT NOT NULL,
            ward TEXT NOT NULL,
            station_name TEXT NOT NULL,
            station_code TEXT NOT NULL UNIQUE,
            expected_agents INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_polling_stations_location ON polling_stations(county, constituency, ward)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Form34A submissions. `serial_number` is deliberately not UNIQUE:
/// duplicate serials are flagged, not rejected.
async fn create_form34a_submissions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS form34a_submissions (
            guid TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL UNIQUE REFERENCES agents(guid) ON DELETE CASCADE,
            serial_number TEXT NOT NULL,
            image_key TEXT NOT NULL,
            county TEXT NOT NULL,
            constituency TEXT NOT NULL,
            ward TEXT NOT NULL,
            polling_station TEXT NOT NULL,
            station_code TEXT,
            latitude REAL,
            longitude REAL,
            submitted_at TEXT NOT NULL,
            verified INTEGER NOT NULL DEFAULT 0,
            has_discrepancy INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_form34a_serial ON form34a_submissions(serial_number)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_form34a_station ON form34a_submissions(polling_station)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_form34a_location ON form34a_submissions(county, constituency, ward)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_candidate_results_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidate_results (
            guid TEXT PRIMARY KEY,
            form34a_id TEXT NOT NULL REFERENCES form34a_submissions(guid) ON DELETE CASCADE,
            candidate_first_name TEXT NOT NULL,
            candidate_last_name TEXT NOT NULL,
            party_name TEXT NOT NULL,
            votes INTEGER NOT NULL,
            extracted_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_candidate_results_form ON candidate_results(form34a_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_incident_videos_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS incident_videos (
            guid TEXT PRIMARY KEY,
            agent_id TEXT NOT NULL REFERENCES agents(guid) ON DELETE CASCADE,
            video_key TEXT NOT NULL,
            video_code TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            location_name TEXT,
            duration_secs INTEGER,
            uploaded_at TEXT NOT NULL,
            UNIQUE(agent_id, video_code)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)")
        .execute(pool)
        .await?;

    Ok(())
}
