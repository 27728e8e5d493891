//! Crawl log repository
//!
//! Stores the per-source query history of each crawl so multi-source
//! lookups can be audited from the admin surface. Logs are pruned after a
//! fixed retention period during crawler maintenance.

use crate::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Retention for crawl log rows
pub const CRAWL_LOG_RETENTION_DAYS: i64 = 30;

/// Outcome of one source query within a crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceQueryRecord {
    pub source: String,
    pub status: String,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One persisted crawl log entry
#[derive(Debug, Clone)]
pub struct CrawlLogEntry {
    pub mode_s: String,
    pub timestamp: DateTime<Utc>,
    pub queries: Vec<SourceQueryRecord>,
    pub final_status: String,
    pub final_source: Option<String>,
}

/// Repository for crawler query logs
#[derive(Clone)]
pub struct CrawlLogRepository {
    pool: SqlitePool,
}

impl CrawlLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Save one crawl's query history
    pub async fn save(
        &self,
        mode_s: &str,
        queries: &[SourceQueryRecord],
        final_status: &str,
        final_source: Option<&str>,
    ) -> Result<()> {
        let queries_json = serde_json::to_string(queries)
            .map_err(|e| crate::Error::Internal(format!("crawl log serialization: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO crawl_logs
                (mode_s, timestamp, queries, final_status, final_source, query_count)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(mode_s.trim().to_ascii_uppercase())
        .bind(Utc::now())
        .bind(queries_json)
        .bind(final_status)
        .bind(final_source)
        .bind(queries.len() as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Recent log entries for one aircraft, newest first
    pub async fn recent_for(&self, mode_s: &str, limit: u32) -> Result<Vec<CrawlLogEntry>> {
        let rows: Vec<(String, DateTime<Utc>, String, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT mode_s, timestamp, queries, final_status, final_source
            FROM crawl_logs WHERE mode_s = ?
            ORDER BY timestamp DESC LIMIT ?
            "#,
        )
        .bind(mode_s.trim().to_ascii_uppercase())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(mode_s, timestamp, queries, final_status, final_source)| CrawlLogEntry {
                mode_s,
                timestamp,
                queries: serde_json::from_str(&queries).unwrap_or_default(),
                final_status,
                final_source,
            })
            .collect())
    }

    /// Delete log rows older than the retention period. Returns the number
    /// of rows removed.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(CRAWL_LOG_RETENTION_DAYS);
        let result = sqlx::query("DELETE FROM crawl_logs WHERE timestamp < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn queries() -> Vec<SourceQueryRecord> {
        vec![
            SourceQueryRecord {
                source: "HexDB.io".to_string(),
                status: "service_error".to_string(),
                duration_ms: 5012,
                error: Some("request timeout".to_string()),
            },
            SourceQueryRecord {
                source: "OpenSky".to_string(),
                status: "partial".to_string(),
                duration_ms: 230,
                error: None,
            },
        ]
    }

    #[tokio::test]
    async fn test_save_and_read_back() {
        let repo = CrawlLogRepository::new(test_pool().await);
        repo.save("4b1617", &queries(), "merged", Some("HexDB.io+OpenSky"))
            .await
            .unwrap();

        let logs = repo.recent_for("4B1617", 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        let entry = &logs[0];
        assert_eq!(entry.queries.len(), 2);
        assert_eq!(entry.queries[1].source, "OpenSky");
        assert_eq!(entry.final_status, "merged");
        assert_eq!(entry.final_source.as_deref(), Some("HexDB.io+OpenSky"));
    }

    #[tokio::test]
    async fn test_cleanup_expired_keeps_fresh_rows() {
        let repo = CrawlLogRepository::new(test_pool().await);
        repo.save("4B1617", &queries(), "success", Some("HexDB.io"))
            .await
            .unwrap();

        assert_eq!(repo.cleanup_expired().await.unwrap(), 0);
        assert_eq!(repo.recent_for("4B1617", 10).await.unwrap().len(), 1);
    }
}
