//! Flight lifecycle management
//!
//! Decides, per incoming position report, whether the aircraft continues
//! an active flight or starts a new one. An address whose stream has been
//! silent for longer than the inactivity gap gets a fresh flight record,
//! the in-memory mirror of the repository's read-side splitting rule.

use chrono::{DateTime, Duration, Utc};
use skytrack_common::db::flights::FLIGHT_INACTIVITY_GAP_MINUTES;
use skytrack_common::db::FlightRepository;
use skytrack_common::models::{Flight, PositionReport};
use skytrack_common::modes::{self, MilRanges};
use skytrack_common::Result;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

pub struct FlightManager {
    repo: FlightRepository,
    mil_ranges: MilRanges,
    military_only: bool,
    /// Retention window applied to flight rows; None disables expiry
    retention: Option<Duration>,
    inactivity_gap: Duration,
    active_by_addr: HashMap<String, Uuid>,
    flights: HashMap<Uuid, Flight>,
}

impl FlightManager {
    pub fn new(
        repo: FlightRepository,
        mil_ranges: MilRanges,
        military_only: bool,
        retention_minutes: i64,
    ) -> Self {
        Self {
            repo,
            mil_ranges,
            military_only,
            retention: (retention_minutes > 0).then(|| Duration::minutes(retention_minutes)),
            inactivity_gap: Duration::minutes(FLIGHT_INACTIVITY_GAP_MINUTES),
            active_by_addr: HashMap::new(),
            flights: HashMap::new(),
        }
    }

    /// Warm the in-memory state from flights still within the inactivity
    /// gap, so a restart continues flights instead of splitting them.
    pub async fn load_state(&mut self) -> Result<()> {
        let since = Utc::now() - self.inactivity_gap;
        let flights = self.repo.recent(since).await?;
        let count = flights.len();

        for flight in flights {
            self.active_by_addr.insert(flight.mode_s.clone(), flight.id);
            self.flights.insert(flight.id, flight);
        }

        info!("Loaded {} active flights", count);
        Ok(())
    }

    /// Drop civilian reports when the military-only policy is configured
    pub fn filter_military_only(&self, reports: Vec<PositionReport>) -> Vec<PositionReport> {
        if !self.military_only {
            return reports;
        }
        reports
            .into_iter()
            .filter(|r| self.mil_ranges.is_military(&r.icao24))
            .collect()
    }

    /// Apply one cycle of position reports to the flight records and
    /// bulk-upsert the touched rows.
    pub async fn update_flights(&mut self, reports: &[PositionReport]) -> Result<()> {
        let now = Utc::now();
        let expires_at = self.retention.map(|r| now + r);
        let mut batch: Vec<Flight> = Vec::new();

        for report in reports {
            if !modes::is_icao24_addr(&report.icao24) {
                debug!("Skipping malformed address {:?}", report.icao24);
                continue;
            }
            let addr = report.icao24.to_ascii_uppercase();

            let continuing = self
                .active_by_addr
                .get(&addr)
                .copied()
                .filter(|id| {
                    self.flights
                        .get(id)
                        .map(|f| now - f.last_contact <= self.inactivity_gap)
                        .unwrap_or(false)
                });

            match continuing {
                Some(id) => {
                    if let Some(flight) = self.flights.get_mut(&id) {
                        flight.touch(report.callsign.as_deref(), now);
                        flight.expires_at = expires_at;
                        batch.push(flight.clone());
                    }
                }
                None => {
                    let is_military = self.mil_ranges.is_military(&addr);
                    let flight = Flight::new(
                        &addr,
                        report.callsign.clone(),
                        is_military,
                        now,
                        expires_at,
                    );
                    debug!("New flight {} for {}", flight.id, addr);
                    self.active_by_addr.insert(addr, flight.id);
                    self.flights.insert(flight.id, flight.clone());
                    batch.push(flight);
                }
            }
        }

        self.repo.upsert_many(&batch).await
    }

    /// Flight id currently active for an address, if any
    pub fn active_flight_id(&self, icao24: &str) -> Option<Uuid> {
        self.active_by_addr
            .get(&icao24.to_ascii_uppercase())
            .copied()
    }

    /// Last contact time per tracked flight id
    pub fn last_contact(&self, flight_id: Uuid) -> Option<DateTime<Utc>> {
        self.flights.get(&flight_id).map(|f| f.last_contact)
    }

    /// Whether the flight is still within its inactivity gap
    pub fn is_active(&self, flight_id: Uuid) -> bool {
        self.flights
            .get(&flight_id)
            .map(|f| Utc::now() - f.last_contact <= self.inactivity_gap)
            .unwrap_or(false)
    }

    pub fn tracked_count(&self) -> usize {
        self.flights.len()
    }

    #[cfg(test)]
    pub(crate) fn force_last_contact(&mut self, flight_id: Uuid, when: DateTime<Utc>) {
        if let Some(flight) = self.flights.get_mut(&flight_id) {
            flight.last_contact = when;
        }
    }
}
