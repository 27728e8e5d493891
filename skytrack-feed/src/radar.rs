//! Live radar feed client
//!
//! The feed is polled once per update cycle. A failed poll is a transient
//! condition, not an error: the client returns `Ok(None)` and the cycle
//! simply skips, since the next poll re-derives the full state anyway.

use async_trait::async_trait;
use serde::Deserialize;
use skytrack_common::models::{AircraftCategory, PositionReport};
use skytrack_common::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Source of live aircraft position reports
#[async_trait]
pub trait RadarSource: Send + Sync {
    /// Poll the feed once. `Ok(None)` signals a transient fetch failure.
    /// With `filter_incomplete`, reports without a lat/lon fix are dropped.
    async fn query_live_flights(
        &self,
        filter_incomplete: bool,
    ) -> Result<Option<Vec<PositionReport>>>;

    /// Whether the last poll succeeded
    fn connection_alive(&self) -> bool;
}

#[derive(Debug, Deserialize)]
struct AircraftList {
    #[serde(rename = "acList", default)]
    ac_list: Vec<AircraftListEntry>,
}

#[derive(Debug, Deserialize)]
struct AircraftListEntry {
    #[serde(rename = "Icao")]
    icao: Option<String>,
    #[serde(rename = "Lat")]
    lat: Option<f64>,
    #[serde(rename = "Long")]
    lon: Option<f64>,
    #[serde(rename = "Alt")]
    alt: Option<i32>,
    #[serde(rename = "Spd")]
    spd: Option<f64>,
    #[serde(rename = "Trak")]
    trak: Option<f64>,
    #[serde(rename = "Call")]
    call: Option<String>,
    #[serde(rename = "Cat")]
    cat: Option<u8>,
}

impl AircraftListEntry {
    fn into_report(self) -> Option<PositionReport> {
        let icao24 = self.icao?.trim().to_ascii_uppercase();
        if icao24.is_empty() {
            return None;
        }
        Some(PositionReport {
            icao24,
            lat: self.lat,
            lon: self.lon,
            alt: self.alt,
            gs: self.spd,
            track: self.trak,
            callsign: self
                .call
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            category: self.cat.and_then(AircraftCategory::from_code),
        })
    }
}

/// Virtual-Radar-style HTTP poll client (`{base}/AircraftList.json`)
pub struct VirtualRadarClient {
    client: reqwest::Client,
    base_url: String,
    alive: AtomicBool,
}

impl VirtualRadarClient {
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(3))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            alive: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl RadarSource for VirtualRadarClient {
    async fn query_live_flights(
        &self,
        filter_incomplete: bool,
    ) -> Result<Option<Vec<PositionReport>>> {
        let url = format!("{}/AircraftList.json", self.base_url);

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Radar feed request failed: {}", e);
                self.alive.store(false, Ordering::Relaxed);
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            warn!("Radar feed returned HTTP {}", response.status());
            self.alive.store(false, Ordering::Relaxed);
            return Ok(None);
        }

        let list: AircraftList = match response.json().await {
            Ok(l) => l,
            Err(e) => {
                warn!("Radar feed payload unparsable: {}", e);
                self.alive.store(false, Ordering::Relaxed);
                return Ok(None);
            }
        };

        self.alive.store(true, Ordering::Relaxed);

        let mut reports: Vec<PositionReport> = list
            .ac_list
            .into_iter()
            .filter_map(AircraftListEntry::into_report)
            .collect();

        if filter_incomplete {
            reports.retain(PositionReport::has_fix);
        }

        debug!("Radar feed returned {} position reports", reports.len());
        Ok(Some(reports))
    }

    fn connection_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }
}
