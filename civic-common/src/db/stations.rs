//! Polling station registry

use crate::db::models::PollingStation;
use crate::reference::ReferenceData;
use crate::Result;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

/// Replace every polling station with the reference dataset's stations
///
/// Returns the number of stations written.
pub async fn seed_from_reference(pool: &SqlitePool, reference: &ReferenceData) -> Result<usize> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM polling_stations")
        .execute(&mut *tx)
        .await?
        .rows_affected();

    for station in reference.polling_stations() {
        sqlx::query(
            r#"
            INSERT INTO polling_stations (
                guid, county, constituency, ward, station_name, station_code, expected_agents
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&station.county)
        .bind(&station.constituency)
        .bind(&station.ward)
        .bind(&station.station_name)
        .bind(&station.station_code)
        .bind(station.expected_agents)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let seeded = reference.polling_stations().len();
    info!(removed, seeded, "Polling stations seeded");
    Ok(seeded)
}

pub async fn list_stations(pool: &SqlitePool) -> Result<Vec<PollingStation>> {
    let stations = sqlx::query_as::<_, PollingStation>(
        "SELECT * FROM polling_stations ORDER BY station_code",
    )
    .fetch_all(pool)
    .await?;
    Ok(stations)
}
