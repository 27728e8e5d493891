//! Persisted track points

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One persisted track point of a flight. Append-only, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub flight_id: Uuid,
    pub lat: f64,
    pub lon: f64,
    pub alt: Option<i32>,
    pub gs: Option<f64>,
    pub timestamp: DateTime<Utc>,
}
