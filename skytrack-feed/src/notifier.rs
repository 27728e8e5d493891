//! Subscriber notification
//!
//! Bridges the per-cycle change sets onto the EventBus. Each change type
//! goes out as its own event; payloads are only built when somebody is
//! actually subscribed.

use chrono::Utc;
use skytrack_common::events::{EventBus, PositionUpdate, SkytrackEvent};
use skytrack_common::models::PositionReport;
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

pub struct FlightNotifier {
    bus: EventBus,
}

impl FlightNotifier {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn has_subscribers(&self) -> bool {
        self.bus.subscriber_count() > 0
    }

    /// Broadcast the changed subset of the cached flights
    pub fn notify_position_changes(
        &self,
        cached_flights: &HashMap<Uuid, PositionReport>,
        changed_flight_ids: &HashSet<Uuid>,
    ) {
        if !self.has_subscribers() || changed_flight_ids.is_empty() {
            return;
        }

        let mut positions = HashMap::new();
        for (flight_id, report) in cached_flights {
            if !changed_flight_ids.contains(flight_id) {
                continue;
            }
            let (Some(lat), Some(lon)) = (report.lat, report.lon) else {
                continue;
            };
            positions.insert(
                flight_id.to_string(),
                PositionUpdate {
                    icao: report.icao24.clone(),
                    lat,
                    lon,
                    alt: report.alt,
                    track: report.track,
                    gs: report.gs,
                },
            );
        }

        if positions.is_empty() {
            return;
        }

        debug!("Broadcasting {} changed positions", positions.len());
        self.bus.emit_lossy(SkytrackEvent::PositionsUpdated {
            positions,
            timestamp: Utc::now(),
        });
    }

    pub fn notify_category_changes(&self, category_changes: &HashMap<Uuid, u8>) {
        if !self.has_subscribers() || category_changes.is_empty() {
            return;
        }

        debug!("Broadcasting {} category changes", category_changes.len());
        self.bus.emit_lossy(SkytrackEvent::CategoriesUpdated {
            changes: category_changes
                .iter()
                .map(|(id, code)| (id.to_string(), *code))
                .collect(),
            timestamp: Utc::now(),
        });
    }

    pub fn notify_callsign_changes(&self, callsign_changes: &HashMap<Uuid, String>) {
        if !self.has_subscribers() || callsign_changes.is_empty() {
            return;
        }

        debug!("Broadcasting {} callsign changes", callsign_changes.len());
        self.bus.emit_lossy(SkytrackEvent::CallsignsUpdated {
            changes: callsign_changes
                .iter()
                .map(|(id, cs)| (id.to_string(), cs.clone()))
                .collect(),
            timestamp: Utc::now(),
        });
    }
}
