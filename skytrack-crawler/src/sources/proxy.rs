//! Generic proxy lookup source
//!
//! Queries a self-hosted aggregation proxy (`GET {base}/aircraft/{hex}`)
//! when one is configured. Registered last in the priority order; unlike
//! the public sources it gets a longer timeout since the proxy may fan
//! out to slow upstreams itself.

use super::{classify_http_status, classify_transport_error, AircraftMetadataSource, QueryResult};
use async_trait::async_trait;
use serde::Deserialize;
use skytrack_common::models::AircraftRecord;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ProxyAircraft {
    icao: Option<String>,
    registration: Option<String>,
    type_code: Option<String>,
    type_description: Option<String>,
    owner: Option<String>,
}

/// Configurable proxy lookup source
pub struct ProxyLookupSource {
    client: reqwest::Client,
    base_url: String,
}

impl ProxyLookupSource {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(8))
            .connect_timeout(Duration::from_secs(3))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn parse_aircraft(&self, data: ProxyAircraft, mode_s: &str) -> Option<AircraftRecord> {
        let record = AircraftRecord {
            registration: data.registration,
            icao_type_code: data.type_code,
            type_description: data.type_description,
            operator: data.owner,
            source: Some(self.name().to_string()),
            ..AircraftRecord::new(data.icao.as_deref().unwrap_or(mode_s))
        };

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
impl AircraftMetadataSource for ProxyLookupSource {
    fn name(&self) -> &'static str {
        "Proxy"
    }

    fn accept(&self, _mode_s: &str) -> bool {
        true
    }

    async fn query_with_status(&self, mode_s: &str) -> QueryResult {
        let url = format!("{}/aircraft/{}", self.base_url, mode_s);
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return classify_transport_error(&e),
        };

        if let Some(result) = classify_http_status(response.status()) {
            return result;
        }

        let data: ProxyAircraft = match response.json().await {
            Ok(d) => d,
            Err(e) => {
                debug!("Proxy payload unparsable for {}: {}", mode_s, e);
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

    #[test]
    fn test_parse_aircraft() {
        let source = ProxyLookupSource::new("http://localhost:8000/");
        let data = ProxyAircraft {
            icao: Some("AE1460".to_string()),
            registration: Some("N-12345".to_string()),
            type_code: Some("F16".to_string()),
            type_description: Some("General Dynamics F-16".to_string()),
            owner: Some("USAF".to_string()),
        };
        let record = source.parse_aircraft(data, "AE1460").unwrap();
        assert!(record.is_complete());
        assert_eq!(record.source.as_deref(), Some("Proxy"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let source = ProxyLookupSource::new("http://localhost:8000///");
        assert_eq!(source.base_url, "http://localhost:8000");
    }
}
