//! Classification of observed aircraft that need a metadata (re)crawl
//!
//! Applied to the address set of each poll cycle. An address is queued
//! when its metadata record is absent, has no modification timestamp,
//! is incomplete and past the short staleness threshold, or is complete
//! but past the general staleness threshold. Incomplete records re-queue
//! sooner so external services get another chance to fill the gaps.

use chrono::{Duration, Utc};
use skytrack_common::db::{AircraftRepository, CrawlReason, ProcessingQueueRepository};
use skytrack_common::Result;
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub struct IncompleteAircraftClassifier {
    aircraft_repo: AircraftRepository,
    queue_repo: ProcessingQueueRepository,
    staleness: Duration,
    incomplete_staleness: Duration,
}

impl IncompleteAircraftClassifier {
    pub fn new(
        aircraft_repo: AircraftRepository,
        queue_repo: ProcessingQueueRepository,
        staleness_days: i64,
        incomplete_staleness_days: i64,
    ) -> Self {
        Self {
            aircraft_repo,
            queue_repo,
            staleness: Duration::days(staleness_days),
            incomplete_staleness: Duration::days(incomplete_staleness_days),
        }
    }

    /// Classify a cycle's observed addresses and queue the ones that need
    /// metadata. Returns the number of newly queued aircraft.
    ///
    /// One bad record must not abort the batch: per-address failures are
    /// logged and queued defensively with reason `unknown`.
    pub async fn schedule_for_processing(&self, icao24s: &HashSet<String>) -> Result<usize> {
        if icao24s.is_empty() {
            return Ok(0);
        }

        let mut queued = 0;
        for icao24 in icao24s {
            let reason = match self.classify(icao24).await {
                Ok(Some(reason)) => reason,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Error classifying aircraft {}: {}", icao24, e);
                    CrawlReason::Unknown
                }
            };

            match self.queue_repo.add(icao24, reason).await {
                Ok(true) => queued += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to queue aircraft {}: {}", icao24, e),
            }
        }

        if queued > 0 {
            info!("Queued {} aircraft for metadata processing", queued);
        }
        Ok(queued)
    }

    /// Decide whether one address needs a crawl, and why.
    ///
    /// Addresses already queued are skipped (None); the crawler owns them
    /// until it removes or purges the entry.
    async fn classify(&self, icao24: &str) -> Result<Option<CrawlReason>> {
        if self.queue_repo.exists(icao24).await? {
            return Ok(None);
        }

        let Some(record) = self.aircraft_repo.get(icao24).await? else {
            debug!("Aircraft {} not found in database", icao24);
            return Ok(Some(CrawlReason::NotInDb));
        };

        let Some(last_modified) = record.last_modified else {
            debug!("Aircraft {} has no modification timestamp, queuing", icao24);
            return Ok(Some(CrawlReason::NoTimestamp));
        };

        let now = Utc::now();
        if record.has_missing_critical_fields() && last_modified < now - self.incomplete_staleness {
            debug!("Aircraft {} is incomplete and stale, queuing", icao24);
            return Ok(Some(CrawlReason::IncompleteStale));
        }
        if last_modified < now - self.staleness {
            debug!("Aircraft {} is stale, queuing", icao24);
            return Ok(Some(CrawlReason::Stale));
        }

        Ok(None)
    }
}
