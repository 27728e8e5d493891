//! OpenSky Network metadata source
//!
//! API: `GET https://opensky-network.org/api/metadata/aircraft/icao/{hex}`
//!
//! The raw JSON payload is kept on the result for crawl logging.

use super::{classify_http_status, classify_transport_error, AircraftMetadataSource, QueryResult};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use skytrack_common::models::AircraftRecord;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// OpenSky Network lookup source
pub struct OpenSkySource {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl Default for OpenSkySource {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenSkySource {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(3))
            .build()
            .expect("Failed to build HTTP client");

        let rate_limiter =
            RateLimiter::direct(Quota::per_second(NonZeroU32::new(1).expect("1 is non-zero")));

        Self {
            client,
            base_url: "https://opensky-network.org/api".to_string(),
            rate_limiter,
        }
    }

    fn parse_aircraft(&self, data: &serde_json::Value, mode_s: &str) -> Option<AircraftRecord> {
        let field = |name: &str| {
            data.get(name)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let model = field("model");
        let manufacturer = field("manufacturerName");

        // The model string sometimes already leads with the manufacturer
        let type_description = match (manufacturer, model) {
            (Some(manufacturer), Some(model)) => {
                if model.starts_with(&manufacturer) {
                    Some(model)
                } else {
                    Some(format!("{} {}", manufacturer, model))
                }
            }
            (None, Some(model)) => Some(model),
            (Some(manufacturer), None) => Some(manufacturer),
            (None, None) => None,
        };

        let mode_s = field("icao24").unwrap_or_else(|| mode_s.to_string());
        let record = AircraftRecord {
            registration: field("registration"),
            icao_type_code: field("typecode"),
            type_description,
            operator: field("operator"),
            source: Some(self.name().to_string()),
            ..AircraftRecord::new(&mode_s)
        };

        let has_identity = [
            &record.registration,
            &record.icao_type_code,
            &record.type_description,
        ]
        .iter()
        .any(|f| f.is_some());

        has_identity.then_some(record)
    }
}

#[async_trait]
impl AircraftMetadataSource for OpenSkySource {
    fn name(&self) -> &'static str {
        "OpenSky"
    }

    fn accept(&self, _mode_s: &str) -> bool {
        true
    }

    async fn query_with_status(&self, mode_s: &str) -> QueryResult {
        self.rate_limiter.until_ready().await;

        let url = format!(
            "{}/metadata/aircraft/icao/{}",
            self.base_url,
            mode_s.to_ascii_lowercase()
        );
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return classify_transport_error(&e),
        };

        if let Some(result) = classify_http_status(response.status()) {
            return result;
        }

        let data: serde_json::Value = match response.json().await {
            Ok(d) => d,
            Err(e) => {
                debug!("OpenSky payload unparsable for {}: {}", mode_s, e);
                return QueryResult::not_found();
            }
        };

        match self.parse_aircraft(&data, mode_s) {
            Some(aircraft) if aircraft.is_complete() => {
                QueryResult::success(aircraft).with_payload(data)
            }
            Some(aircraft) => QueryResult::partial(aircraft).with_payload(data),
            None => QueryResult::not_found(),
        }
    }
}
