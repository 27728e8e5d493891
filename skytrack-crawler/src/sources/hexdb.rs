//! HexDB.io aircraft database source
//!
//! API: `GET https://hexdb.io/api/v1/aircraft/{hex}`

use super::{classify_http_status, classify_transport_error, AircraftMetadataSource, QueryResult};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use skytrack_common::models::AircraftRecord;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct HexDbAircraft {
    #[serde(rename = "ModeS")]
    mode_s: Option<String>,
    #[serde(rename = "Registration")]
    registration: Option<String>,
    #[serde(rename = "ICAOTypeCode")]
    icao_type_code: Option<String>,
    #[serde(rename = "Manufacturer")]
    manufacturer: Option<String>,
    #[serde(rename = "Type")]
    aircraft_type: Option<String>,
    #[serde(rename = "RegisteredOwners")]
    registered_owners: Option<String>,
}

/// HexDB.io lookup source
pub struct HexDbSource {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl Default for HexDbSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HexDbSource {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(3))
            .build()
            .expect("Failed to build HTTP client");

        // One request per second: polite default for a free service
        let rate_limiter =
            RateLimiter::direct(Quota::per_second(NonZeroU32::new(1).expect("1 is non-zero")));

        Self {
            client,
            base_url: "https://hexdb.io/api/v1".to_string(),
            rate_limiter,
        }
    }

    fn parse_aircraft(&self, data: HexDbAircraft, mode_s: &str) -> Option<AircraftRecord> {
        // Manufacturer and type are joined into one description; skip the
        // duplication when the type already leads with the manufacturer
        let type_description = match (
            data.manufacturer.as_deref().filter(|m| !m.is_empty()),
            data.aircraft_type.as_deref().filter(|t| !t.is_empty()),
        ) {
            (Some(manufacturer), Some(aircraft_type)) => {
                if aircraft_type.starts_with(manufacturer) {
                    Some(aircraft_type.to_string())
                } else {
                    Some(format!("{} {}", manufacturer, aircraft_type))
                }
            }
            (Some(manufacturer), None) => Some(manufacturer.to_string()),
            (None, Some(aircraft_type)) => Some(aircraft_type.to_string()),
            (None, None) => None,
        };

        let record = AircraftRecord {
            registration: data.registration,
            icao_type_code: data.icao_type_code,
            type_description,
            operator: data.registered_owners,
            source: Some(self.name().to_string()),
            ..AircraftRecord::new(data.mode_s.as_deref().unwrap_or(mode_s))
        };

        // An owner alone does not identify the airframe; require at least
        // one of registration / type code / type description
        let has_identity = [
            &record.registration,
            &record.icao_type_code,
            &record.type_description,
        ]
        .iter()
        .any(|f| f.as_deref().is_some_and(|s| !s.trim().is_empty()));

        has_identity.then_some(record)
    }
}

#[async_trait]
impl AircraftMetadataSource for HexDbSource {
    fn name(&self) -> &'static str {
        "HexDB.io"
    }

    fn accept(&self, _mode_s: &str) -> bool {
        true
    }

    async fn query_with_status(&self, mode_s: &str) -> QueryResult {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/aircraft/{}", self.base_url, mode_s);
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return classify_transport_error(&e),
        };

        if let Some(result) = classify_http_status(response.status()) {
            return result;
        }

        // 2xx with an unparsable or empty payload is a miss, not an outage
        let data: HexDbAircraft = match response.json().await {
            Ok(d) => d,
            Err(e) => {
                debug!("HexDB.io payload unparsable for {}: {}", mode_s, e);
                return QueryResult::not_found();
            }
        };

        match self.parse_aircraft(data, mode_s) {
            Some(aircraft) if aircraft.is_complete() => QueryResult::success(aircraft),
            Some(aircraft) => QueryResult::partial(aircraft),
            None => QueryResult::not_found(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> HexDbSource {
        HexDbSource::new()
    }

    #[test]
    fn test_accepts_all_addresses() {
        assert!(source().accept("4B1617"));
        assert!(source().accept("AE1460"));
    }

    #[test]
    fn test_parse_joins_manufacturer_and_type() {
        let data = HexDbAircraft {
            mode_s: Some("4B1617".to_string()),
            registration: Some("HB-JCS".to_string()),
            icao_type_code: Some("BCS3".to_string()),
            manufacturer: Some("Airbus".to_string()),
            aircraft_type: Some("A220-300".to_string()),
            registered_owners: Some("Swiss".to_string()),
        };
        let record = source().parse_aircraft(data, "4B1617").unwrap();
        assert_eq!(record.type_description.as_deref(), Some("Airbus A220-300"));
        assert!(record.is_complete());
    }

    #[test]
    fn test_parse_skips_duplicated_manufacturer() {
        let data = HexDbAircraft {
            mode_s: None,
            registration: None,
            icao_type_code: None,
            manufacturer: Some("Boeing".to_string()),
            aircraft_type: Some("Boeing 747-8".to_string()),
            registered_owners: None,
        };
        let record = source().parse_aircraft(data, "AB1234").unwrap();
        assert_eq!(record.type_description.as_deref(), Some("Boeing 747-8"));
        assert_eq!(record.mode_s, "AB1234");
    }

    #[test]
    fn test_parse_empty_payload_is_none() {
        let data = HexDbAircraft {
            mode_s: Some("4B1617".to_string()),
            registration: None,
            icao_type_code: None,
            manufacturer: None,
            aircraft_type: None,
            registered_owners: None,
        };
        assert!(source().parse_aircraft(data, "4B1617").is_none());
    }
}
