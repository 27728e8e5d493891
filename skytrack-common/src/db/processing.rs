//! Processing queue for aircraft awaiting metadata crawls
//!
//! Tracks per-aircraft attempt counters and failure classification.
//! "Not found" failures count toward a permanent attempt cap; service
//! errors never consume attempts and become eligible again after a
//! configurable cooldown.

use crate::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

/// Type of failure recorded for a queued aircraft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    /// No failure yet
    None,
    /// Aircraft not in any source (permanent)
    NotFound,
    /// Temporary error, retried after cooldown
    ServiceError,
}

impl FailureType {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureType::None => "none",
            FailureType::NotFound => "not_found",
            FailureType::ServiceError => "service_error",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "not_found" => FailureType::NotFound,
            "service_error" => FailureType::ServiceError,
            _ => FailureType::None,
        }
    }
}

/// Why an aircraft was queued for crawling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlReason {
    /// No metadata record exists
    NotInDb,
    /// Record exists but has no modification timestamp
    NoTimestamp,
    /// Record is incomplete and past the short staleness threshold
    IncompleteStale,
    /// Record is complete but past the general staleness threshold
    Stale,
    /// Classification failed; queued defensively
    Unknown,
}

impl CrawlReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CrawlReason::NotInDb => "not_in_db",
            CrawlReason::NoTimestamp => "no_timestamp",
            CrawlReason::IncompleteStale => "incomplete_stale",
            CrawlReason::Stale => "stale",
            CrawlReason::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "not_in_db" => CrawlReason::NotInDb,
            "no_timestamp" => CrawlReason::NoTimestamp,
            "incomplete_stale" => CrawlReason::IncompleteStale,
            "stale" => CrawlReason::Stale,
            _ => CrawlReason::Unknown,
        }
    }
}

/// Processing queue statistics for the admin surface
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub total: i64,
    /// Entries never attempted
    pub pending: i64,
    pub in_progress: i64,
    pub not_found_count: i64,
    pub service_error_count: i64,
    /// Not-found entries at/above the attempt cap
    pub exhausted_count: i64,
}

/// Repository for the aircraft metadata processing queue
#[derive(Clone)]
pub struct ProcessingQueueRepository {
    pool: SqlitePool,
    max_attempts: u32,
    service_error_reset_hours: i64,
}

impl ProcessingQueueRepository {
    pub fn new(pool: SqlitePool, max_attempts: u32, service_error_reset_hours: i64) -> Self {
        Self {
            pool,
            max_attempts,
            service_error_reset_hours,
        }
    }

    fn reset_threshold(&self) -> DateTime<Utc> {
        Utc::now() - Duration::hours(self.service_error_reset_hours)
    }

    /// Add an aircraft to the queue. Idempotent: adding an address that is
    /// already queued is a no-op. Returns true when a new entry was
    /// created.
    pub async fn add(&self, mode_s: &str, reason: CrawlReason) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO aircraft_to_process
                (mode_s, query_attempts, last_attempt_time, failure_type, crawl_reason, created_at)
            VALUES (?, 0, NULL, 'none', ?, ?)
            "#,
        )
        .bind(mode_s.trim().to_ascii_uppercase())
        .bind(reason.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether an aircraft is currently queued
    pub async fn exists(&self, mode_s: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM aircraft_to_process WHERE mode_s = ?")
                .bind(mode_s.trim().to_ascii_uppercase())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Crawl reason recorded when the aircraft was queued
    pub async fn crawl_reason(&self, mode_s: &str) -> Result<Option<CrawlReason>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT crawl_reason FROM aircraft_to_process WHERE mode_s = ?")
                .bind(mode_s.trim().to_ascii_uppercase())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(r,)| CrawlReason::parse(&r)))
    }

    /// Aircraft eligible for processing, fairest-first.
    ///
    /// Eligible: never attempted, not-found failures under the attempt
    /// cap, or service errors past the cooldown. Ordered by attempts
    /// ascending, then oldest attempt (never-attempted first), then
    /// insertion order, so starved and fresh entries interleave.
    pub async fn batch_for_processing(&self, limit: u32) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT mode_s FROM aircraft_to_process
            WHERE query_attempts = 0
               OR (failure_type = 'not_found' AND query_attempts < ?)
               OR (failure_type = 'service_error' AND last_attempt_time < ?)
               OR (failure_type = 'none' AND query_attempts < ?)
            ORDER BY query_attempts ASC,
                     last_attempt_time IS NOT NULL,
                     last_attempt_time ASC,
                     rowid ASC
            LIMIT ?
            "#,
        )
        .bind(self.max_attempts)
        .bind(self.reset_threshold())
        .bind(self.max_attempts)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(m,)| m).collect())
    }

    /// Record a "not found" outcome: increments attempts. Once attempts
    /// reach the cap the entry is purged by `cleanup_exhausted`.
    pub async fn record_not_found(&self, mode_s: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE aircraft_to_process
            SET query_attempts = query_attempts + 1,
                failure_type = 'not_found',
                last_attempt_time = ?
            WHERE mode_s = ?
            "#,
        )
        .bind(Utc::now())
        .bind(mode_s.trim().to_ascii_uppercase())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record a service error: does NOT increment attempts, only stamps
    /// the cooldown clock.
    pub async fn record_service_error(
        &self,
        mode_s: &str,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE aircraft_to_process
            SET failure_type = 'service_error',
                last_attempt_time = ?,
                last_error = COALESCE(?, last_error)
            WHERE mode_s = ?
            "#,
        )
        .bind(Utc::now())
        .bind(error_message)
        .bind(mode_s.trim().to_ascii_uppercase())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove an aircraft from the queue (successfully processed)
    pub async fn remove(&self, mode_s: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM aircraft_to_process WHERE mode_s = ?")
            .bind(mode_s.trim().to_ascii_uppercase())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear failure classification for service-error entries whose
    /// cooldown has elapsed, making them plain retries again. Returns the
    /// number of entries reset.
    pub async fn reset_service_error_attempts(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE aircraft_to_process
            SET query_attempts = 0, failure_type = 'none'
            WHERE failure_type = 'service_error' AND last_attempt_time < ?
            "#,
        )
        .bind(self.reset_threshold())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Purge entries whose not-found attempts reached the cap; these are
    /// permanently unresolvable. Service-error entries are never purged.
    pub async fn cleanup_exhausted(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM aircraft_to_process WHERE failure_type = 'not_found' AND query_attempts >= ?",
        )
        .bind(self.max_attempts)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Queue statistics
    pub async fn stats(&self) -> Result<QueueStats> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM aircraft_to_process")
            .fetch_one(&self.pool)
            .await?;
        let (pending,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM aircraft_to_process WHERE query_attempts = 0")
                .fetch_one(&self.pool)
                .await?;
        let (not_found_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM aircraft_to_process WHERE failure_type = 'not_found'",
        )
        .fetch_one(&self.pool)
        .await?;
        let (service_error_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM aircraft_to_process WHERE failure_type = 'service_error'",
        )
        .fetch_one(&self.pool)
        .await?;
        let (exhausted_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM aircraft_to_process WHERE failure_type = 'not_found' AND query_attempts >= ?",
        )
        .bind(self.max_attempts)
        .fetch_one(&self.pool)
        .await?;

        Ok(QueueStats {
            total,
            pending,
            in_progress: total - pending,
            not_found_count,
            service_error_count,
            exhausted_count,
        })
    }

    /// Attempt count for one entry (tests, diagnostics)
    pub async fn attempts(&self, mode_s: &str) -> Result<Option<(u32, FailureType)>> {
        let row: Option<(u32, String)> = sqlx::query_as(
            "SELECT query_attempts, failure_type FROM aircraft_to_process WHERE mode_s = ?",
        )
        .bind(mode_s.trim().to_ascii_uppercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(a, f)| (a, FailureType::parse(&f))))
    }

    /// Force an entry's last-attempt stamp (tests)
    #[doc(hidden)]
    pub async fn set_last_attempt_time(
        &self,
        mode_s: &str,
        when: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE aircraft_to_process SET last_attempt_time = ? WHERE mode_s = ?")
            .bind(when)
            .bind(mode_s.trim().to_ascii_uppercase())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
