//! Database access for SkyTrack
//!
//! SQLite via sqlx. The schema is bootstrapped here (tables + indexes);
//! repositories wrap one collection each and expose the read/write
//! contract the services consume. All bulk writes are idempotent upserts
//! so a partially applied cycle is repaired by the next one.

pub mod aircraft;
pub mod crawl_logs;
pub mod flights;
pub mod positions;
pub mod processing;

pub use aircraft::AircraftRepository;
pub use crawl_logs::{CrawlLogRepository, SourceQueryRecord};
pub use flights::FlightRepository;
pub use positions::PositionRepository;
pub use processing::{CrawlReason, FailureType, ProcessingQueueRepository, QueueStats};

use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Open (or create) the database and bootstrap the schema
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_schema(&pool).await?;

    Ok(pool)
}

/// Create tables and indexes if they don't exist
///
/// Public so tests can bootstrap an in-memory pool.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS aircraft (
            mode_s TEXT PRIMARY KEY,
            registration TEXT,
            icao_type_code TEXT,
            type_description TEXT,
            operator TEXT,
            source TEXT,
            created_at TEXT NOT NULL,
            last_modified TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS aircraft_to_process (
            mode_s TEXT PRIMARY KEY,
            query_attempts INTEGER NOT NULL DEFAULT 0,
            last_attempt_time TEXT,
            failure_type TEXT NOT NULL DEFAULT 'none',
            crawl_reason TEXT NOT NULL DEFAULT 'unknown',
            last_error TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_processing_attempts ON aircraft_to_process (query_attempts)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_processing_last_attempt ON aircraft_to_process (last_attempt_time)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_processing_failure ON aircraft_to_process (failure_type)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS flights (
            id TEXT PRIMARY KEY,
            mode_s TEXT NOT NULL,
            callsign TEXT,
            airline_icao TEXT,
            is_military INTEGER NOT NULL DEFAULT 0,
            first_contact TEXT NOT NULL,
            last_contact TEXT NOT NULL,
            expires_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_flights_mode_s ON flights (mode_s)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_flights_last_contact ON flights (last_contact)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_flights_expires_at ON flights (expires_at)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS positions (
            flight_id TEXT NOT NULL,
            lat REAL NOT NULL,
            lon REAL NOT NULL,
            alt INTEGER,
            gs REAL,
            timestamp TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_positions_flight_ts ON positions (flight_id, timestamp)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_positions_ts ON positions (timestamp)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crawl_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            mode_s TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            queries TEXT NOT NULL,
            final_status TEXT NOT NULL,
            final_source TEXT,
            query_count INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_crawl_logs_mode_s ON crawl_logs (mode_s)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_crawl_logs_ts ON crawl_logs (timestamp)")
        .execute(pool)
        .await?;

    tracing::info!("Database schema initialized");
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    init_schema(&pool).await.unwrap();
    pool
}
