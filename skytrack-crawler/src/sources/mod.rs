//! Aircraft metadata sources
//!
//! Each source is an independent HTTP-backed lookup implementing the
//! `AircraftMetadataSource` trait. Sources are queried in priority order
//! by the crawler; results carry a tri-state-plus-partial status so the
//! crawler can tell a definitive miss (404) from a transient outage.

mod hexdb;
mod opensky;
mod proxy;

pub use hexdb::HexDbSource;
pub use opensky::OpenSkySource;
pub use proxy::ProxyLookupSource;

use async_trait::async_trait;
use skytrack_common::models::AircraftRecord;

/// Status of a metadata query attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Complete data found
    Success,
    /// Some data found but incomplete
    PartialData,
    /// Aircraft definitively not in the source database (HTTP 404)
    NotFound,
    /// Temporary error: 5xx, timeout, rate limit, network
    ServiceError,
}

impl QueryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryStatus::Success => "success",
            QueryStatus::PartialData => "partial",
            QueryStatus::NotFound => "not_found",
            QueryStatus::ServiceError => "service_error",
        }
    }
}

/// Result of one metadata source query
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub status: QueryStatus,
    pub aircraft: Option<AircraftRecord>,
    pub raw_payload: Option<serde_json::Value>,
    pub error_message: Option<String>,
}

impl QueryResult {
    pub fn success(aircraft: AircraftRecord) -> Self {
        Self {
            status: QueryStatus::Success,
            aircraft: Some(aircraft),
            raw_payload: None,
            error_message: None,
        }
    }

    pub fn partial(aircraft: AircraftRecord) -> Self {
        Self {
            status: QueryStatus::PartialData,
            aircraft: Some(aircraft),
            raw_payload: None,
            error_message: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: QueryStatus::NotFound,
            aircraft: None,
            raw_payload: None,
            error_message: None,
        }
    }

    pub fn service_error(message: impl Into<String>) -> Self {
        Self {
            status: QueryStatus::ServiceError,
            aircraft: None,
            raw_payload: None,
            error_message: Some(message.into()),
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.raw_payload = Some(payload);
        self
    }

    /// Data was found (complete or partial)
    pub fn is_success(&self) -> bool {
        matches!(self.status, QueryStatus::Success | QueryStatus::PartialData)
    }

    /// Should be retried on a later cycle
    pub fn is_retriable(&self) -> bool {
        self.status == QueryStatus::ServiceError
    }

    /// Definitive miss; retrying this source is pointless
    pub fn is_permanent_failure(&self) -> bool {
        self.status == QueryStatus::NotFound
    }
}

/// Contract implemented by every aircraft metadata source
#[async_trait]
pub trait AircraftMetadataSource: Send + Sync {
    /// Human-readable name, also the circuit breaker key
    fn name(&self) -> &'static str;

    /// Whether this source can handle the given mode-S address
    fn accept(&self, mode_s: &str) -> bool;

    /// Query the source once. Never retries internally; transient
    /// failures surface as `ServiceError` and are retried on a later
    /// crawl cycle via the circuit breaker cooldown.
    async fn query_with_status(&self, mode_s: &str) -> QueryResult;
}

/// Shared classification of an HTTP response status
///
/// 404 is a definitive miss; 429 and 5xx are transient. Anything else
/// unexpected is treated as transient so the aircraft is retried.
pub(crate) fn classify_http_status(status: reqwest::StatusCode) -> Option<QueryResult> {
    if status == reqwest::StatusCode::NOT_FOUND {
        return Some(QueryResult::not_found());
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Some(QueryResult::service_error("Rate limited (429)"));
    }
    if status.is_server_error() {
        return Some(QueryResult::service_error(format!(
            "Server error ({})",
            status.as_u16()
        )));
    }
    if !status.is_success() {
        return Some(QueryResult::service_error(format!(
            "Unexpected HTTP status ({})",
            status.as_u16()
        )));
    }
    None
}

/// Shared classification of a reqwest transport error
pub(crate) fn classify_transport_error(error: &reqwest::Error) -> QueryResult {
    if error.is_timeout() {
        QueryResult::service_error("Request timeout")
    } else if error.is_connect() {
        QueryResult::service_error("Connection error")
    } else {
        QueryResult::service_error(format!("Request error: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_classification() {
        assert!(classify_http_status(reqwest::StatusCode::OK).is_none());

        let not_found = classify_http_status(reqwest::StatusCode::NOT_FOUND).unwrap();
        assert!(not_found.is_permanent_failure());

        let rate_limited = classify_http_status(reqwest::StatusCode::TOO_MANY_REQUESTS).unwrap();
        assert!(rate_limited.is_retriable());

        let server_error = classify_http_status(reqwest::StatusCode::BAD_GATEWAY).unwrap();
        assert!(server_error.is_retriable());
    }

    #[test]
    fn test_query_result_predicates() {
        let record = AircraftRecord::new("4B1617");
        assert!(QueryResult::success(record.clone()).is_success());
        assert!(QueryResult::partial(record).is_success());
        assert!(!QueryResult::not_found().is_success());
        assert!(QueryResult::service_error("boom").is_retriable());
        assert_eq!(
            QueryResult::service_error("boom").error_message.as_deref(),
            Some("boom")
        );
    }
}
