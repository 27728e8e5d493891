//! Aircraft metadata crawler
//!
//! Drains the processing queue in batches and queries the configured
//! sources in priority order. The first complete answer short-circuits;
//! otherwise partial answers are merged until the accumulated record is
//! sufficient. Per-address disposition: any data wins, then a definitive
//! not-found, then service error: a live source saying "does not exist"
//! outweighs another source being down.

use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitBreakerStats};
use crate::sources::{
    AircraftMetadataSource, HexDbSource, OpenSkySource, ProxyLookupSource, QueryStatus,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use skytrack_common::config::Config;
use skytrack_common::db::{
    AircraftRepository, CrawlLogRepository, ProcessingQueueRepository, QueueStats,
    SourceQueryRecord,
};
use skytrack_common::models::AircraftRecord;
use skytrack_common::Result;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Capacity of the in-memory recent-activity ring
pub const ACTIVITY_LOG_CAPACITY: usize = 100;

/// How one crawled aircraft was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlOutcome {
    /// One source answered with a complete record
    Complete,
    /// Multiple partial answers merged into a usable record
    Merged,
    /// Only partial data could be collected
    Partial,
    /// Every reachable source confirmed the aircraft does not exist
    NotFound,
    /// A transient failure; the aircraft stays queued for retry
    ServiceError,
}

impl CrawlOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            CrawlOutcome::Complete => "complete",
            CrawlOutcome::Merged => "merged",
            CrawlOutcome::Partial => "partial",
            CrawlOutcome::NotFound => "not_found",
            CrawlOutcome::ServiceError => "service_error",
        }
    }
}

/// One entry of the recent-activity ring (newest first)
#[derive(Debug, Clone, Serialize)]
pub struct CrawlActivity {
    pub mode_s: String,
    pub outcome: CrawlOutcome,
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Result of querying all sources for a single aircraft
#[derive(Debug, Default)]
struct CrawlResult {
    aircraft: Option<AircraftRecord>,
    /// At least one live source returned a definitive 404
    saw_not_found: bool,
    /// At least one source errored or was skipped with an open circuit
    had_service_error: bool,
    error_message: Option<String>,
    queries: Vec<SourceQueryRecord>,
}

/// Aircraft metadata crawler
pub struct AirplaneCrawler {
    sources: Vec<Box<dyn AircraftMetadataSource>>,
    breakers: CircuitBreakerRegistry,
    aircraft_repo: AircraftRepository,
    queue_repo: ProcessingQueueRepository,
    log_repo: CrawlLogRepository,
    batch_size: u32,
    /// Volatile per-source kill switches; reset on process restart
    disabled_sources: HashSet<String>,
    activity: VecDeque<CrawlActivity>,
}

impl AirplaneCrawler {
    /// Build the crawler with the standard source stack. The proxy source
    /// joins the list only when configured.
    pub fn new(config: &Config, pool: SqlitePool) -> Self {
        let mut sources: Vec<Box<dyn AircraftMetadataSource>> = vec![
            Box::new(HexDbSource::new()),
            Box::new(OpenSkySource::new()),
        ];
        if let Some(url) = &config.proxy_source_url {
            info!("Proxy lookup source enabled: {}", url);
            sources.push(Box::new(ProxyLookupSource::new(url)));
        }

        let breaker_config = CircuitBreakerConfig {
            failure_threshold: config.circuit_breaker_threshold,
            backoff_base: std::time::Duration::from_secs(config.circuit_breaker_backoff_base_secs),
            backoff_max: std::time::Duration::from_secs(config.circuit_breaker_backoff_max_secs),
        };

        Self::with_sources(
            sources,
            breaker_config,
            pool,
            config.crawler_batch_size,
            config.crawler_max_attempts,
            config.service_error_reset_hours,
        )
    }

    /// Build with an explicit source list (tests inject mock sources here)
    pub fn with_sources(
        sources: Vec<Box<dyn AircraftMetadataSource>>,
        breaker_config: CircuitBreakerConfig,
        pool: SqlitePool,
        batch_size: u32,
        max_attempts: u32,
        service_error_reset_hours: i64,
    ) -> Self {
        Self {
            sources,
            breakers: CircuitBreakerRegistry::new(breaker_config),
            aircraft_repo: AircraftRepository::new(pool.clone()),
            queue_repo: ProcessingQueueRepository::new(
                pool.clone(),
                max_attempts,
                service_error_reset_hours,
            ),
            log_repo: CrawlLogRepository::new(pool),
            batch_size,
            disabled_sources: HashSet::new(),
            activity: VecDeque::with_capacity(ACTIVITY_LOG_CAPACITY),
        }
    }

    /// Run one crawl cycle: maintenance, then drain a batch of queued
    /// aircraft. Failures on one aircraft never abort the batch.
    pub async fn crawl_cycle(&mut self) {
        match self.queue_repo.reset_service_error_attempts().await {
            Ok(count) if count > 0 => {
                info!("Reset {} aircraft with expired service errors", count)
            }
            Ok(_) => {}
            Err(e) => error!("Failed to reset service error attempts: {}", e),
        }

        match self.queue_repo.cleanup_exhausted().await {
            Ok(count) if count > 0 => {
                info!("Cleaned up {} aircraft with max not-found attempts", count)
            }
            Ok(_) => {}
            Err(e) => error!("Failed to clean up exhausted aircraft: {}", e),
        }

        match self.log_repo.cleanup_expired().await {
            Ok(count) if count > 0 => debug!("Pruned {} expired crawl logs", count),
            Ok(_) => {}
            Err(e) => warn!("Failed to prune crawl logs: {}", e),
        }

        let batch = match self.queue_repo.batch_for_processing(self.batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                error!("Failed to fetch processing batch: {}", e);
                return;
            }
        };

        if batch.is_empty() {
            debug!("No aircraft to process");
            return;
        }
        info!("Processing {} aircraft", batch.len());

        for mode_s in batch {
            if let Err(e) = self.process_one(&mode_s).await {
                warn!("Error processing aircraft {}: {}", mode_s, e);
                if let Err(db_err) = self
                    .queue_repo
                    .record_service_error(&mode_s, Some(&e.to_string()))
                    .await
                {
                    error!("Failed to record service error for {}: {}", mode_s, db_err);
                }
                self.push_activity(&mode_s, CrawlOutcome::ServiceError, None);
            }
        }
    }

    /// Crawl one aircraft and apply its disposition to queue and store
    async fn process_one(&mut self, mode_s: &str) -> Result<()> {
        let result = self.query_metadata(mode_s).await;

        let (outcome, final_source) = if let Some(aircraft) = &result.aircraft {
            match self.aircraft_repo.upsert(aircraft).await {
                Ok(()) => {
                    self.queue_repo.remove(mode_s).await?;
                    let outcome = if !aircraft.is_complete() {
                        CrawlOutcome::Partial
                    } else if aircraft.source.as_deref().is_some_and(|s| s.contains('+')) {
                        CrawlOutcome::Merged
                    } else {
                        CrawlOutcome::Complete
                    };
                    info!(
                        "Successfully processed aircraft {} ({})",
                        mode_s,
                        outcome.as_str()
                    );
                    (outcome, aircraft.source.clone())
                }
                Err(e) => {
                    // Store write failed: keep the entry queued for retry
                    warn!("Failed to insert aircraft {}: {}", mode_s, e);
                    self.queue_repo
                        .record_service_error(mode_s, Some("Database insert failed"))
                        .await?;
                    (CrawlOutcome::ServiceError, None)
                }
            }
        } else if result.saw_not_found {
            // A definitive negative from a live source outweighs errors
            // from the others
            self.queue_repo.record_not_found(mode_s).await?;
            debug!("Aircraft {} not found in any source", mode_s);
            (CrawlOutcome::NotFound, None)
        } else {
            let message = result
                .error_message
                .as_deref()
                .unwrap_or("No sources available");
            self.queue_repo
                .record_service_error(mode_s, Some(message))
                .await?;
            debug!("Service error for {}, will retry after cooldown", mode_s);
            (CrawlOutcome::ServiceError, None)
        };

        self.push_activity(mode_s, outcome, final_source.clone());

        if let Err(e) = self
            .log_repo
            .save(
                mode_s,
                &result.queries,
                outcome.as_str(),
                final_source.as_deref(),
            )
            .await
        {
            warn!("Failed to save crawl log for {}: {}", mode_s, e);
        }

        Ok(())
    }

    /// Query sources in priority order with merge and early stop.
    ///
    /// The first complete answer returns immediately. Partial answers
    /// accumulate via merge; once the merged record is complete or
    /// sufficient, the remaining sources are skipped.
    async fn query_metadata(&mut self, mode_s: &str) -> CrawlResult {
        let mut result = CrawlResult::default();
        let mut best: Option<AircraftRecord> = None;
        let mut sources_used: Vec<&'static str> = Vec::new();

        for source in &self.sources {
            if !source.accept(mode_s) {
                continue;
            }
            let name = source.name();

            if self.disabled_sources.contains(name) {
                debug!("Skipping {} - disabled", name);
                continue;
            }
            if !self.breakers.is_source_available(name) {
                debug!("Skipping {} - circuit breaker open", name);
                result.had_service_error = true;
                continue;
            }

            let started = Instant::now();
            let query = source.query_with_status(mode_s).await;
            result.queries.push(SourceQueryRecord {
                source: name.to_string(),
                status: query.status.as_str().to_string(),
                duration_ms: started.elapsed().as_millis() as u64,
                error: query.error_message.clone(),
            });

            match query.status {
                QueryStatus::ServiceError => {
                    self.breakers.record_failure(name);
                    result.had_service_error = true;
                    warn!(
                        "Service error from {} for {}: {}",
                        name,
                        mode_s,
                        query.error_message.as_deref().unwrap_or("unknown")
                    );
                    result.error_message = query.error_message;
                    continue;
                }
                QueryStatus::NotFound => {
                    // The service answered; it just has no record
                    self.breakers.record_success(name);
                    result.saw_not_found = true;
                    debug!("Aircraft {} not found in {}", mode_s, name);
                    continue;
                }
                QueryStatus::Success | QueryStatus::PartialData => {
                    self.breakers.record_success(name);
                    let Some(aircraft) = query.aircraft else {
                        result.saw_not_found = true;
                        continue;
                    };

                    if aircraft.is_complete() {
                        info!("Found complete data for {} from {}", mode_s, name);
                        result.aircraft = Some(aircraft);
                        return result;
                    }

                    if best.is_none() {
                        debug!("Partial data for {} from {}", mode_s, name);
                        sources_used.push(name);
                        best = Some(aircraft);
                    } else if let Some(merged) = best.as_mut() {
                        if merged.merge(&aircraft) {
                            debug!("Merged additional data for {} from {}", mode_s, name);
                            sources_used.push(name);
                        }
                    }

                    let merged_ready = best
                        .as_ref()
                        .is_some_and(|b| b.is_complete() || b.is_sufficient());
                    if merged_ready {
                        if let Some(mut merged) = best.take() {
                            merged.source = Some(sources_used.join("+"));
                            info!(
                                "Merged complete data for {} from {}",
                                mode_s,
                                merged.source.as_deref().unwrap_or("")
                            );
                            result.aircraft = Some(merged);
                        }
                        return result;
                    }
                }
            }
        }

        // Best partial result, if any; still useful even when incomplete
        if let Some(mut merged) = best {
            if sources_used.len() > 1 {
                merged.source = Some(sources_used.join("+"));
            }
            info!(
                "Returning partial data for {} from {}",
                mode_s,
                merged.source.as_deref().unwrap_or("")
            );
            result.aircraft = Some(merged);
        }

        result
    }

    fn push_activity(&mut self, mode_s: &str, outcome: CrawlOutcome, source: Option<String>) {
        if self.activity.len() >= ACTIVITY_LOG_CAPACITY {
            self.activity.pop_back();
        }
        self.activity.push_front(CrawlActivity {
            mode_s: mode_s.to_string(),
            outcome,
            source,
            timestamp: Utc::now(),
        });
    }

    /// Recent crawl activity, newest first
    pub fn recent_activity(&self) -> impl Iterator<Item = &CrawlActivity> {
        self.activity.iter()
    }

    /// Enable or disable a source at runtime. Returns false for unknown
    /// source names. The toggle is in-memory only and resets on restart.
    pub fn set_source_enabled(&mut self, name: &str, enabled: bool) -> bool {
        if !self.sources.iter().any(|s| s.name() == name) {
            return false;
        }
        if enabled {
            self.disabled_sources.remove(name);
        } else {
            info!("Source {} disabled", name);
            self.disabled_sources.insert(name.to_string());
        }
        true
    }

    /// Per-source enabled flags in priority order
    pub fn source_states(&self) -> Vec<(&'static str, bool)> {
        self.sources
            .iter()
            .map(|s| {
                let name = s.name();
                (name, !self.disabled_sources.contains(name))
            })
            .collect()
    }

    /// Circuit breaker statistics per source
    pub fn circuit_breaker_stats(&self) -> HashMap<String, CircuitBreakerStats> {
        self.breakers.all_stats()
    }

    /// Queue statistics
    pub async fn queue_stats(&self) -> Result<QueueStats> {
        self.queue_repo.stats().await
    }
}
