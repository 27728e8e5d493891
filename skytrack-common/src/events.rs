//! Event types for the SkyTrack event system
//!
//! Provides the shared event definitions and the EventBus used to fan out
//! live flight updates to subscribers (SSE bridges, recorders, tests).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Wire payload for a single changed flight position
///
/// `gs` is omitted from the serialized form when the radar feed did not
/// report a ground speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub icao: String,
    pub lat: f64,
    pub lon: f64,
    pub alt: Option<i32>,
    pub track: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gs: Option<f64>,
}

/// SkyTrack event types
///
/// Events are broadcast via the EventBus; each per-cycle change set is
/// published as its own event so subscribers interested in, say, callsign
/// corrections do not receive redundant position payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SkytrackEvent {
    /// Positions changed for one or more flights (keyed by flight id)
    PositionsUpdated {
        positions: HashMap<String, PositionUpdate>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Aircraft category changed (keyed by flight id, value is the
    /// numeric ADS-B category code)
    CategoriesUpdated {
        changes: HashMap<String, u8>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Callsign changed or was first observed (keyed by flight id)
    CallsignsUpdated {
        changes: HashMap<String, String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SkytrackEvent {
    /// Event type name as used in the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            SkytrackEvent::PositionsUpdated { .. } => "PositionsUpdated",
            SkytrackEvent::CategoriesUpdated { .. } => "CategoriesUpdated",
            SkytrackEvent::CallsignsUpdated { .. } => "CallsignsUpdated",
        }
    }
}

/// Central event distribution bus for live flight updates
///
/// Wraps tokio::broadcast, providing:
/// - Non-blocking publish (slow subscribers don't block the update cycle)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged-message detection for subscribers that fall behind
///
/// The bus is constructed once at process start and handed by reference to
/// whatever needs to publish or subscribe; there is no global instance.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SkytrackEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SkytrackEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` when at least one subscriber exists,
    /// `Err` when nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SkytrackEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<SkytrackEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    pub fn emit_lossy(&self, event: SkytrackEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_positions_event() -> SkytrackEvent {
        let mut positions = HashMap::new();
        positions.insert(
            "f-1".to_string(),
            PositionUpdate {
                icao: "4B1617".to_string(),
                lat: 47.45,
                lon: 8.56,
                alt: Some(35000),
                track: Some(270.0),
                gs: Some(440.0),
            },
        );
        SkytrackEvent::PositionsUpdated {
            positions,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_eventbus_subscribe_and_emit() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(sample_positions_event()).expect("emit should succeed");

        let received = rx.try_recv().expect("should receive event");
        assert_eq!(received.event_type(), "PositionsUpdated");
    }

    #[test]
    fn test_eventbus_emit_without_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(sample_positions_event()).is_err());
        // emit_lossy must not panic
        bus.emit_lossy(sample_positions_event());
    }

    #[test]
    fn test_eventbus_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit(sample_positions_event()).unwrap();

        assert_eq!(rx1.try_recv().unwrap().event_type(), "PositionsUpdated");
        assert_eq!(rx2.try_recv().unwrap().event_type(), "PositionsUpdated");
    }

    #[test]
    fn test_position_update_serialization_omits_missing_gs() {
        let update = PositionUpdate {
            icao: "AB1234".to_string(),
            lat: 1.0,
            lon: 2.0,
            alt: None,
            track: None,
            gs: None,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert!(json.get("gs").is_none());
        assert!(json.get("alt").is_some());
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = SkytrackEvent::CallsignsUpdated {
            changes: HashMap::from([("f-1".to_string(), "SWR123".to_string())]),
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "CallsignsUpdated");
    }
}
