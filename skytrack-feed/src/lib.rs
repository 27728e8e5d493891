//! skytrack-feed library interface
//!
//! Exposes the flight-update pipeline for integration testing.

pub mod classifier;
pub mod coordinator;
pub mod flight_manager;
pub mod notifier;
pub mod position_manager;
pub mod radar;

use chrono::Utc;
use skytrack_common::db::{FlightRepository, PositionRepository};
use skytrack_common::Result;

/// Delete flights and track points that fell out of the retention window.
///
/// The TTL analog for the document-store contract: rows carry their expiry
/// (flights) or are aged by timestamp (positions); this sweep runs from a
/// periodic task while retention is enabled.
pub async fn run_retention_sweep(
    flight_repo: &FlightRepository,
    position_repo: &PositionRepository,
    retention: chrono::Duration,
) -> Result<(u64, u64)> {
    let now = Utc::now();
    let flights_deleted = flight_repo.delete_expired(now).await?;
    let positions_deleted = position_repo.delete_older_than(now - retention).await?;

    if flights_deleted > 0 || positions_deleted > 0 {
        tracing::info!(
            flights = flights_deleted,
            positions = positions_deleted,
            "Retention sweep removed expired rows"
        );
    }

    Ok((flights_deleted, positions_deleted))
}
