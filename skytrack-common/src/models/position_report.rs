//! Live position reports from the radar feed

use serde::{Deserialize, Serialize};

/// ADS-B aircraft/vehicle emitter category
///
/// Numeric codes follow the radar feed's wire enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AircraftCategory {
    Unknown,
    NoInfo,
    Light,
    Medium1,
    Medium2,
    HighVortexLarge,
    Heavy,
    HighPerformance,
    Rotorcraft,
    Glider,
    LighterThanAir,
    Parachutist,
    Ultralight,
    Uav,
    Space,
    SurfaceEmergency,
    SurfaceService,
    PointObstacle,
    ClusterObstacle,
    LineObstacle,
    Reserved,
}

impl AircraftCategory {
    /// Numeric wire code of this category
    pub fn code(self) -> u8 {
        match self {
            AircraftCategory::Unknown => 0,
            AircraftCategory::NoInfo => 1,
            AircraftCategory::Light => 2,
            AircraftCategory::Medium1 => 3,
            AircraftCategory::Medium2 => 4,
            AircraftCategory::HighVortexLarge => 5,
            AircraftCategory::Heavy => 6,
            AircraftCategory::HighPerformance => 7,
            AircraftCategory::Rotorcraft => 8,
            AircraftCategory::Glider => 9,
            AircraftCategory::LighterThanAir => 10,
            AircraftCategory::Parachutist => 11,
            AircraftCategory::Ultralight => 12,
            AircraftCategory::Uav => 13,
            AircraftCategory::Space => 14,
            AircraftCategory::SurfaceEmergency => 15,
            AircraftCategory::SurfaceService => 16,
            AircraftCategory::PointObstacle => 17,
            AircraftCategory::ClusterObstacle => 18,
            AircraftCategory::LineObstacle => 19,
            AircraftCategory::Reserved => 20,
        }
    }

    /// Map a numeric wire code back to a category
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => AircraftCategory::Unknown,
            1 => AircraftCategory::NoInfo,
            2 => AircraftCategory::Light,
            3 => AircraftCategory::Medium1,
            4 => AircraftCategory::Medium2,
            5 => AircraftCategory::HighVortexLarge,
            6 => AircraftCategory::Heavy,
            7 => AircraftCategory::HighPerformance,
            8 => AircraftCategory::Rotorcraft,
            9 => AircraftCategory::Glider,
            10 => AircraftCategory::LighterThanAir,
            11 => AircraftCategory::Parachutist,
            12 => AircraftCategory::Ultralight,
            13 => AircraftCategory::Uav,
            14 => AircraftCategory::Space,
            15 => AircraftCategory::SurfaceEmergency,
            16 => AircraftCategory::SurfaceService,
            17 => AircraftCategory::PointObstacle,
            18 => AircraftCategory::ClusterObstacle,
            19 => AircraftCategory::LineObstacle,
            20 => AircraftCategory::Reserved,
            _ => return None,
        })
    }
}

/// One live position report from the radar feed
///
/// Ephemeral: produced once per poll cycle and compared against the
/// previously cached report for change detection. Equality is full-field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    /// Mode-S / ICAO24 address (6 hex digits, uppercase)
    pub icao24: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Barometric altitude in feet
    pub alt: Option<i32>,
    /// Ground speed in knots
    pub gs: Option<f64>,
    /// Track over ground in degrees
    pub track: Option<f64>,
    pub callsign: Option<String>,
    pub category: Option<AircraftCategory>,
}

impl PositionReport {
    /// Whether the report carries a usable lat/lon fix
    pub fn has_fix(&self) -> bool {
        self.lat.is_some() && self.lon.is_some()
    }

    /// Whether the spatial fields (lat/lon/alt/gs) differ from `other`
    ///
    /// Callsign and category have their own change sets and are ignored
    /// here.
    pub fn position_differs(&self, other: &PositionReport) -> bool {
        self.lat != other.lat
            || self.lon != other.lon
            || self.alt != other.alt
            || self.gs != other.gs
    }
}
