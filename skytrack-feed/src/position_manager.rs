//! Latest-position cache and per-cycle change detection
//!
//! Keeps the newest report per flight and tracks three independent change
//! sets per cycle (position, category, callsign) so the coordinator can
//! broadcast each change type separately and skip redundant payloads when
//! only one of them moved.

use crate::flight_manager::FlightManager;
use chrono::Utc;
use skytrack_common::db::PositionRepository;
use skytrack_common::models::{Position, PositionReport};
use skytrack_common::Result;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub struct PositionManager {
    repo: PositionRepository,
    flight_lastpos: HashMap<Uuid, PositionReport>,
    changed_flight_ids: HashSet<Uuid>,
    category_changes: HashMap<Uuid, u8>,
    callsign_changes: HashMap<Uuid, String>,
}

impl PositionManager {
    pub fn new(repo: PositionRepository) -> Self {
        Self {
            repo,
            flight_lastpos: HashMap::new(),
            changed_flight_ids: HashSet::new(),
            category_changes: HashMap::new(),
            callsign_changes: HashMap::new(),
        }
    }

    /// Warm the cache from the newest persisted position of each flight
    /// the flight manager still considers active.
    pub async fn load_cache(&mut self, flight_manager: &FlightManager) -> Result<()> {
        let mut count = 0;
        for (flight_id, report) in self.repo.last_positions().await? {
            if flight_manager.last_contact(flight_id).is_some() {
                self.flight_lastpos.insert(flight_id, report);
                count += 1;
            }
        }
        tracing::info!("Loaded {} cached positions", count);
        Ok(())
    }

    /// Reset all per-cycle change sets (called at the start of a cycle)
    pub fn clear_changes(&mut self) {
        self.changed_flight_ids.clear();
        self.category_changes.clear();
        self.callsign_changes.clear();
    }

    /// Fold one cycle of reports into the cache, recording what changed
    /// and appending changed track points to the position store.
    pub async fn add_positions(
        &mut self,
        reports: &[PositionReport],
        flight_manager: &FlightManager,
    ) -> Result<()> {
        let now = Utc::now();
        let mut batch: Vec<Position> = Vec::new();

        for report in reports {
            if !report.has_fix() {
                continue;
            }
            let Some(flight_id) = flight_manager.active_flight_id(&report.icao24) else {
                continue;
            };

            let previous = self.flight_lastpos.get(&flight_id);

            let position_changed = previous
                .map(|prev| report.position_differs(prev))
                .unwrap_or(true);
            if position_changed {
                self.changed_flight_ids.insert(flight_id);
                if let (Some(lat), Some(lon)) = (report.lat, report.lon) {
                    batch.push(Position {
                        flight_id,
                        lat,
                        lon,
                        alt: report.alt,
                        gs: report.gs,
                        timestamp: now,
                    });
                }
            }

            if let Some(category) = report.category {
                if previous.and_then(|p| p.category) != Some(category) {
                    self.category_changes.insert(flight_id, category.code());
                }
            }

            if let Some(callsign) = report.callsign.as_deref() {
                if previous.and_then(|p| p.callsign.as_deref()) != Some(callsign) {
                    self.callsign_changes
                        .insert(flight_id, callsign.to_string());
                }
            }

            // Cache the new report, but keep the previous callsign/category
            // when the feed omitted them this cycle so a later re-appearance
            // isn't misread as a change.
            let mut cached = report.clone();
            if let Some(prev) = previous {
                if cached.callsign.is_none() {
                    cached.callsign = prev.callsign.clone();
                }
                if cached.category.is_none() {
                    cached.category = prev.category;
                }
            }
            self.flight_lastpos.insert(flight_id, cached);
        }

        self.repo.insert_many(&batch).await
    }

    pub fn has_positions_changed(&self) -> bool {
        !self.changed_flight_ids.is_empty()
    }

    pub fn changed_flight_ids(&self) -> &HashSet<Uuid> {
        &self.changed_flight_ids
    }

    pub fn has_category_changes(&self) -> bool {
        !self.category_changes.is_empty()
    }

    pub fn category_changes(&self) -> &HashMap<Uuid, u8> {
        &self.category_changes
    }

    pub fn has_callsign_changes(&self) -> bool {
        !self.callsign_changes.is_empty()
    }

    pub fn callsign_changes(&self) -> &HashMap<Uuid, String> {
        &self.callsign_changes
    }

    /// Latest cached report per still-active flight
    pub fn cached_flights(&self, flight_manager: &FlightManager) -> HashMap<Uuid, PositionReport> {
        self.flight_lastpos
            .iter()
            .filter(|(id, _)| flight_manager.is_active(**id))
            .map(|(id, report)| (*id, report.clone()))
            .collect()
    }
}
