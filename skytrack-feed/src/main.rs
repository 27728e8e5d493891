//! skytrack-feed - Flight Update Service
//!
//! Polls the live radar feed, maintains flight and position state,
//! broadcasts change sets to subscribers, and queues unknown or stale
//! aircraft for the metadata crawler.

use anyhow::Result;
use skytrack_common::config::Config;
use skytrack_common::db::{
    self, AircraftRepository, FlightRepository, PositionRepository, ProcessingQueueRepository,
};
use skytrack_common::events::EventBus;
use skytrack_common::modes::MilRanges;
use skytrack_feed::classifier::IncompleteAircraftClassifier;
use skytrack_feed::coordinator::FlightUpdaterCoordinator;
use skytrack_feed::flight_manager::FlightManager;
use skytrack_feed::notifier::FlightNotifier;
use skytrack_feed::position_manager::PositionManager;
use skytrack_feed::radar::{RadarSource, VirtualRadarClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting skytrack-feed (Flight Update Service)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!(
        "Radar feed: {}, military only: {}, retention: {} min",
        config.radar_service_url, config.military_only, config.retention_minutes
    );

    let pool = db::init_database_pool(&config.database_path).await?;
    info!("Database: {}", config.database_path.display());

    let mil_ranges = MilRanges::load(&config.data_folder)?;

    let event_bus = EventBus::new(config.event_bus_capacity);
    let notifier = FlightNotifier::new(event_bus.clone());

    let radar: Arc<dyn RadarSource> = Arc::new(VirtualRadarClient::new(&config.radar_service_url));

    let flight_repo = FlightRepository::new(pool.clone());
    let position_repo = PositionRepository::new(pool.clone());
    let flight_manager = FlightManager::new(
        flight_repo.clone(),
        mil_ranges,
        config.military_only,
        config.retention_minutes,
    );
    let position_manager = PositionManager::new(position_repo.clone());

    let classifier = IncompleteAircraftClassifier::new(
        AircraftRepository::new(pool.clone()),
        ProcessingQueueRepository::new(
            pool.clone(),
            config.crawler_max_attempts,
            config.service_error_reset_hours,
        ),
        config.staleness_days,
        config.incomplete_staleness_days,
    );

    let coordinator = Arc::new(FlightUpdaterCoordinator::new(
        radar,
        flight_manager,
        position_manager,
        classifier,
        notifier,
    ));

    info!("Loading cached flight state...");
    coordinator.load_state().await?;

    // Update cycle driver; contended ticks are dropped inside update()
    let update_coordinator = Arc::clone(&coordinator);
    let update_interval = config.update_interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(update_interval.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            update_coordinator.update().await;
        }
    });

    // Retention sweep (TTL analog), only when retention is configured
    if config.retention_enabled() {
        let retention = chrono::Duration::minutes(config.retention_minutes);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                if let Err(e) =
                    skytrack_feed::run_retention_sweep(&flight_repo, &position_repo, retention)
                        .await
                {
                    tracing::warn!("Retention sweep failed: {}", e);
                }
            }
        });
    } else {
        info!("Document expiration disabled: no retention period specified");
    }

    info!(
        "Update loop running every {}s; event bus capacity {}",
        config.update_interval_secs,
        event_bus.capacity()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down skytrack-feed");
    Ok(())
}
