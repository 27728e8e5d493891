//! Flight lifecycle model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One logical flight of an aircraft
///
/// A new flight record is created when an aircraft is first observed or
/// when its position stream has been silent for longer than the inactivity
/// gap (a landed-then-departed aircraft becomes two flights).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: Uuid,
    /// Mode-S / ICAO24 address, uppercase
    pub mode_s: String,
    pub callsign: Option<String>,
    /// ICAO 3-letter airline designator derived from the callsign
    pub airline_icao: Option<String>,
    pub is_military: bool,
    pub first_contact: DateTime<Utc>,
    pub last_contact: DateTime<Utc>,
    /// Retention expiry; None when retention is disabled
    pub expires_at: Option<DateTime<Utc>>,
}

impl Flight {
    pub fn new(
        mode_s: &str,
        callsign: Option<String>,
        is_military: bool,
        now: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let airline_icao = callsign
            .as_deref()
            .and_then(crate::callsign::extract_airline_icao);
        Self {
            id: Uuid::new_v4(),
            mode_s: mode_s.trim().to_ascii_uppercase(),
            callsign,
            airline_icao,
            is_military,
            first_contact: now,
            last_contact: now,
            expires_at,
        }
    }

    /// Record a new contact, refreshing callsign and derived airline code
    /// when the callsign changed.
    pub fn touch(&mut self, callsign: Option<&str>, now: DateTime<Utc>) {
        self.last_contact = now;
        if let Some(cs) = callsign {
            if !cs.trim().is_empty() && self.callsign.as_deref() != Some(cs) {
                self.callsign = Some(cs.to_string());
                self.airline_icao = crate::callsign::extract_airline_icao(cs);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_flight_derives_airline_code() {
        let now = Utc::now();
        let flight = Flight::new("4b1617", Some("SWR123".to_string()), false, now, None);
        assert_eq!(flight.mode_s, "4B1617");
        assert_eq!(flight.airline_icao.as_deref(), Some("SWR"));
        assert_eq!(flight.first_contact, flight.last_contact);
    }

    #[test]
    fn test_touch_updates_callsign_and_airline() {
        let now = Utc::now();
        let mut flight = Flight::new("4B1617", None, false, now, None);
        assert!(flight.airline_icao.is_none());

        let later = now + chrono::Duration::seconds(5);
        flight.touch(Some("EZY4512"), later);
        assert_eq!(flight.last_contact, later);
        assert_eq!(flight.callsign.as_deref(), Some("EZY4512"));
        assert_eq!(flight.airline_icao.as_deref(), Some("EZY"));
    }

    #[test]
    fn test_touch_ignores_blank_callsign() {
        let now = Utc::now();
        let mut flight = Flight::new("4B1617", Some("SWR123".to_string()), false, now, None);
        flight.touch(Some("  "), now + chrono::Duration::seconds(1));
        assert_eq!(flight.callsign.as_deref(), Some("SWR123"));
    }
}
