//! Top-level flight update cycle
//!
//! One cycle: clear change trackers, poll the radar feed, queue unknown or
//! stale aircraft for metadata crawling, update flight and position state,
//! then broadcast each non-empty change set. Cycles are mutually
//! exclusive; a tick that finds a cycle in flight is dropped, not queued,
//! so slow downstream I/O self-throttles instead of building a backlog.

use crate::classifier::IncompleteAircraftClassifier;
use crate::flight_manager::FlightManager;
use crate::notifier::FlightNotifier;
use crate::position_manager::PositionManager;
use crate::radar::RadarSource;
use skytrack_common::models::PositionReport;
use skytrack_common::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

struct UpdaterInner {
    radar: Arc<dyn RadarSource>,
    flight_manager: FlightManager,
    position_manager: PositionManager,
    classifier: IncompleteAircraftClassifier,
    notifier: FlightNotifier,
}

pub struct FlightUpdaterCoordinator {
    inner: tokio::sync::Mutex<UpdaterInner>,
}

impl FlightUpdaterCoordinator {
    pub fn new(
        radar: Arc<dyn RadarSource>,
        flight_manager: FlightManager,
        position_manager: PositionManager,
        classifier: IncompleteAircraftClassifier,
        notifier: FlightNotifier,
    ) -> Self {
        Self {
            inner: tokio::sync::Mutex::new(UpdaterInner {
                radar,
                flight_manager,
                position_manager,
                classifier,
                notifier,
            }),
        }
    }

    /// Warm in-memory state from persisted flights and positions
    pub async fn load_state(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        inner.flight_manager.load_state().await?;
        inner
            .position_manager
            .load_cache(&inner.flight_manager)
            .await?;
        Ok(())
    }

    /// Whether the radar connection produced data on the last poll
    pub async fn is_service_alive(&self) -> bool {
        self.inner.lock().await.radar.connection_alive()
    }

    /// Run one update cycle. Non-blocking: if a cycle is already running
    /// this call returns immediately without touching any state.
    pub async fn update(&self) {
        let Ok(mut inner) = self.inner.try_lock() else {
            debug!("Update already in progress, skipping this cycle");
            return;
        };

        let cycle_start = Instant::now();
        inner.position_manager.clear_changes();

        let service_start = Instant::now();
        let positions = match inner.radar.query_live_flights(false).await {
            Ok(p) => p,
            Err(e) => {
                error!("Radar feed query failed: {}", e);
                return;
            }
        };
        let service_time = service_start.elapsed();

        let Some(positions) = positions.filter(|p| !p.is_empty()) else {
            debug!("No positions received from radar feed");
            return;
        };
        debug!(
            "Radar service query took {:.3}s, received {} positions",
            service_time.as_secs_f64(),
            positions.len()
        );

        if let Err(e) = Self::process_positions(&mut inner, positions).await {
            // The next cycle re-derives state from the live feed, so a
            // failed cycle is logged and dropped rather than retried.
            if e.is_storage_full() {
                error!("Database storage exhausted: {}", e);
            } else {
                error!("An error occurred during the update cycle: {}", e);
            }
        }

        let cycle_time = cycle_start.elapsed();
        if cycle_time.as_millis() > 200 {
            info!("Slow update cycle: {:.3}s", cycle_time.as_secs_f64());
        } else {
            debug!("Update cycle took {:.3}s", cycle_time.as_secs_f64());
        }
    }

    async fn process_positions(
        inner: &mut UpdaterInner,
        positions: Vec<PositionReport>,
    ) -> Result<()> {
        // Schedule unknown/stale aircraft for metadata crawling
        let live_icao24s: HashSet<String> = positions
            .iter()
            .filter(|p| !p.icao24.is_empty())
            .map(|p| p.icao24.to_ascii_uppercase())
            .collect();
        inner.classifier.schedule_for_processing(&live_icao24s).await?;

        let filtered = inner.flight_manager.filter_military_only(positions);
        if filtered.is_empty() {
            return Ok(());
        }

        let flight_start = Instant::now();
        inner.flight_manager.update_flights(&filtered).await?;
        let flight_time = flight_start.elapsed();

        let valid: Vec<PositionReport> = filtered
            .into_iter()
            .filter(PositionReport::has_fix)
            .collect();

        let position_start = Instant::now();
        inner
            .position_manager
            .add_positions(&valid, &inner.flight_manager)
            .await?;
        let position_time = position_start.elapsed();

        debug!(
            "Processed {} valid positions. Update timings: flight={:.3}s, position={:.3}s",
            valid.len(),
            flight_time.as_secs_f64(),
            position_time.as_secs_f64()
        );

        Self::broadcast_changes(inner);
        Ok(())
    }

    fn broadcast_changes(inner: &UpdaterInner) {
        if !inner.notifier.has_subscribers() {
            return;
        }

        if inner.position_manager.has_positions_changed() {
            let cached = inner
                .position_manager
                .cached_flights(&inner.flight_manager);
            inner.notifier.notify_position_changes(
                &cached,
                inner.position_manager.changed_flight_ids(),
            );
        }

        if inner.position_manager.has_category_changes() {
            inner
                .notifier
                .notify_category_changes(inner.position_manager.category_changes());
        }

        if inner.position_manager.has_callsign_changes() {
            inner
                .notifier
                .notify_callsign_changes(inner.position_manager.callsign_changes());
        }
    }
}
