//! End-to-end flight update cycle tests: radar poll through persistence,
//! classification, and event broadcast, plus the non-blocking cycle lock.

use async_trait::async_trait;
use skytrack_common::db::{
    init_schema, AircraftRepository, FlightRepository, PositionRepository,
    ProcessingQueueRepository,
};
use skytrack_common::events::{EventBus, SkytrackEvent};
use skytrack_common::models::{AircraftCategory, PositionReport};
use skytrack_common::modes::MilRanges;
use skytrack_common::Result;
use skytrack_feed::classifier::IncompleteAircraftClassifier;
use skytrack_feed::coordinator::FlightUpdaterCoordinator;
use skytrack_feed::flight_manager::FlightManager;
use skytrack_feed::notifier::FlightNotifier;
use skytrack_feed::position_manager::PositionManager;
use skytrack_feed::radar::RadarSource;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted radar source: pops one response per poll, optionally slow
struct MockRadar {
    responses: Mutex<Vec<Option<Vec<PositionReport>>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockRadar {
    fn new(responses: Vec<Option<Vec<PositionReport>>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
            delay: None,
        })
    }

    fn slow(responses: Vec<Option<Vec<PositionReport>>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
            delay: Some(delay),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RadarSource for MockRadar {
    async fn query_live_flights(
        &self,
        _filter_incomplete: bool,
    ) -> Result<Option<Vec<PositionReport>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(None)
        } else {
            Ok(responses.remove(0))
        }
    }

    fn connection_alive(&self) -> bool {
        true
    }
}

fn report(icao24: &str, lat: f64, callsign: Option<&str>) -> PositionReport {
    PositionReport {
        icao24: icao24.to_string(),
        lat: Some(lat),
        lon: Some(8.0),
        alt: Some(30000),
        gs: Some(420.0),
        track: Some(90.0),
        callsign: callsign.map(String::from),
        category: Some(AircraftCategory::Medium2),
    }
}

struct Harness {
    pool: SqlitePool,
    bus: EventBus,
    coordinator: FlightUpdaterCoordinator,
}

async fn harness(radar: Arc<dyn RadarSource>) -> Harness {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    init_schema(&pool).await.unwrap();

    let bus = EventBus::new(100);
    let flight_manager = FlightManager::new(
        FlightRepository::new(pool.clone()),
        MilRanges::default(),
        false,
        1440,
    );
    let position_manager = PositionManager::new(PositionRepository::new(pool.clone()));
    let classifier = IncompleteAircraftClassifier::new(
        AircraftRepository::new(pool.clone()),
        ProcessingQueueRepository::new(pool.clone(), 5, 6),
        120,
        7,
    );
    let notifier = FlightNotifier::new(bus.clone());

    let coordinator =
        FlightUpdaterCoordinator::new(radar, flight_manager, position_manager, classifier, notifier);

    Harness {
        pool,
        bus,
        coordinator,
    }
}

#[tokio::test]
async fn test_cycle_persists_flights_and_queues_unknown_aircraft() {
    let radar = MockRadar::new(vec![Some(vec![
        report("4B1617", 47.0, Some("SWR123")),
        report("AE1460", 48.0, None),
    ])]);
    let h = harness(radar.clone()).await;

    h.coordinator.update().await;

    let flights = FlightRepository::new(h.pool.clone());
    assert_eq!(flights.count().await.unwrap(), 2);

    let positions = PositionRepository::new(h.pool.clone());
    assert_eq!(positions.count().await.unwrap(), 2);

    // Both unknown aircraft landed in the processing queue
    let queue = ProcessingQueueRepository::new(h.pool.clone(), 5, 6);
    assert!(queue.exists("4B1617").await.unwrap());
    assert!(queue.exists("AE1460").await.unwrap());
}

#[tokio::test]
async fn test_cycle_broadcasts_changed_positions_to_subscribers() {
    let radar = MockRadar::new(vec![
        Some(vec![report("4B1617", 47.0, Some("SWR123"))]),
        Some(vec![report("4B1617", 47.1, Some("SWR123"))]),
    ]);
    let h = harness(radar.clone()).await;
    let mut rx = h.bus.subscribe();

    h.coordinator.update().await;

    // First cycle: first sighting counts as a position change, and the
    // callsign/category change sets get their first values too
    let mut event_types = Vec::new();
    while let Ok(event) = rx.try_recv() {
        event_types.push(event.event_type());
    }
    assert!(event_types.contains(&"PositionsUpdated"));

    h.coordinator.update().await;

    // Second cycle: only the position moved
    let mut position_events = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            SkytrackEvent::PositionsUpdated { positions, .. } => {
                position_events += 1;
                assert_eq!(positions.len(), 1);
                let update = positions.values().next().unwrap();
                assert_eq!(update.icao, "4B1617");
                assert_eq!(update.lat, 47.1);
            }
            other => panic!("unexpected event {:?}", other.event_type()),
        }
    }
    assert_eq!(position_events, 1);
}

#[tokio::test]
async fn test_unchanged_cycle_broadcasts_nothing() {
    let same = vec![report("4B1617", 47.0, Some("SWR123"))];
    let radar = MockRadar::new(vec![Some(same.clone()), Some(same)]);
    let h = harness(radar.clone()).await;

    h.coordinator.update().await;

    let mut rx = h.bus.subscribe();
    h.coordinator.update().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_empty_poll_is_skipped() {
    let radar = MockRadar::new(vec![None, Some(vec![])]);
    let h = harness(radar.clone()).await;

    h.coordinator.update().await;
    h.coordinator.update().await;

    let flights = FlightRepository::new(h.pool.clone());
    assert_eq!(flights.count().await.unwrap(), 0);
    assert_eq!(radar.calls(), 2);
}

#[tokio::test]
async fn test_concurrent_update_is_dropped_not_queued() {
    let radar = MockRadar::slow(
        vec![Some(vec![report("4B1617", 47.0, None)])],
        Duration::from_millis(200),
    );
    let h = harness(radar.clone()).await;
    let coordinator = Arc::new(h.coordinator);

    let first = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.update().await })
    };
    // Give the first cycle time to take the lock and start polling
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Second tick returns immediately without polling the radar
    coordinator.update().await;
    assert_eq!(radar.calls(), 1);

    first.await.unwrap();

    // The first cycle completed its work normally
    let flights = FlightRepository::new(h.pool.clone());
    assert_eq!(flights.count().await.unwrap(), 1);
    // The dropped tick did not poll the radar even after the lock freed
    assert_eq!(radar.calls(), 1);
}

#[tokio::test]
async fn test_known_fresh_aircraft_not_requeued() {
    let radar = MockRadar::new(vec![Some(vec![report("4B1617", 47.0, None)])]);
    let h = harness(radar.clone()).await;

    // Seed a complete, fresh metadata record
    let aircraft_repo = AircraftRepository::new(h.pool.clone());
    let record = skytrack_common::models::AircraftRecord {
        registration: Some("HB-JCS".to_string()),
        icao_type_code: Some("BCS3".to_string()),
        type_description: Some("Airbus A220-300".to_string()),
        operator: Some("Swiss".to_string()),
        source: Some("HexDB.io".to_string()),
        ..skytrack_common::models::AircraftRecord::new("4B1617")
    };
    aircraft_repo.upsert(&record).await.unwrap();

    h.coordinator.update().await;

    let queue = ProcessingQueueRepository::new(h.pool.clone(), 5, 6);
    assert!(!queue.exists("4B1617").await.unwrap());
}
