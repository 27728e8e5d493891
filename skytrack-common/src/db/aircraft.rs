//! Aircraft metadata repository

use crate::models::AircraftRecord;
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

type AircraftRow = (
    String,                // mode_s
    Option<String>,        // registration
    Option<String>,        // icao_type_code
    Option<String>,        // type_description
    Option<String>,        // operator
    Option<String>,        // source
    Option<DateTime<Utc>>, // created_at
    Option<DateTime<Utc>>, // last_modified
);

fn from_row(row: AircraftRow) -> AircraftRecord {
    AircraftRecord {
        mode_s: row.0,
        registration: row.1,
        icao_type_code: row.2,
        type_description: row.3,
        operator: row.4,
        source: row.5,
        created_at: row.6,
        last_modified: row.7,
    }
}

/// Repository for crawled aircraft identity metadata
#[derive(Clone)]
pub struct AircraftRepository {
    pool: SqlitePool,
}

impl AircraftRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up a metadata record by mode-S address
    pub async fn get(&self, mode_s: &str) -> Result<Option<AircraftRecord>> {
        let row: Option<AircraftRow> = sqlx::query_as(
            r#"
            SELECT mode_s, registration, icao_type_code, type_description,
                   operator, source, created_at, last_modified
            FROM aircraft WHERE mode_s = ?
            "#,
        )
        .bind(mode_s.trim().to_ascii_uppercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    /// Insert or update a metadata record, stamping `last_modified`
    pub async fn upsert(&self, record: &AircraftRecord) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO aircraft
                (mode_s, registration, icao_type_code, type_description,
                 operator, source, created_at, last_modified)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(mode_s) DO UPDATE SET
                registration = excluded.registration,
                icao_type_code = excluded.icao_type_code,
                type_description = excluded.type_description,
                operator = excluded.operator,
                source = excluded.source,
                last_modified = excluded.last_modified
            "#,
        )
        .bind(record.mode_s.trim().to_ascii_uppercase())
        .bind(&record.registration)
        .bind(&record.icao_type_code)
        .bind(&record.type_description)
        .bind(&record.operator)
        .bind(&record.source)
        .bind(record.created_at.unwrap_or(now))
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Number of stored metadata records
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM aircraft")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Set or clear `last_modified` directly (classifier staleness tests)
    #[doc(hidden)]
    pub async fn set_last_modified(
        &self,
        mode_s: &str,
        last_modified: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query("UPDATE aircraft SET last_modified = ? WHERE mode_s = ?")
            .bind(last_modified)
            .bind(mode_s.trim().to_ascii_uppercase())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
