//! Mode-S / ICAO24 address utilities
//!
//! Military ranges are loaded from `mil_ranges.json` in the data folder
//! (tar1090-db format: hex string pairs under a "military" key).

use crate::Result;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Returns true when `icao24` is a syntactically valid 6-hex-digit address
pub fn is_icao24_addr(icao24: &str) -> bool {
    icao24.len() == 6 && icao24.chars().all(|c| c.is_ascii_hexdigit())
}

/// Returns true if the ICAO hex address is Swiss-registered
pub fn is_swiss(icao_hex: &str) -> bool {
    if icao_hex.get(..2).is_some_and(|p| p.eq_ignore_ascii_case("4B")) {
        if let Some(third) = icao_hex.chars().nth(2).and_then(|c| c.to_digit(16)) {
            return third <= 8;
        }
    }
    false
}

/// Returns true if the ICAO code (as integer) is in the Swiss military range
pub fn is_swiss_mil(icao: u32) -> bool {
    (0x4B7000..=0x4B7FFF).contains(&icao)
}

#[derive(Debug, Deserialize)]
struct MilRangesFile {
    #[serde(default)]
    military: Vec<(String, String)>,
}

/// Military mode-S address ranges
#[derive(Debug, Clone, Default)]
pub struct MilRanges {
    ranges: Vec<(u32, u32)>,
}

impl MilRanges {
    /// Load ranges from `<data_folder>/mil_ranges.json`.
    ///
    /// A missing file yields an empty range set (military classification
    /// inert) with a warning, so the feed can run without the data file.
    pub fn load(data_folder: &Path) -> Result<Self> {
        let file_name = data_folder.join("mil_ranges.json");

        if !file_name.is_file() {
            warn!("mil_ranges.json not found at {}", file_name.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&file_name)?;
        let parsed: MilRangesFile = serde_json::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("{}: {}", file_name.display(), e)))?;

        let mut ranges = Vec::with_capacity(parsed.military.len());
        for (start, end) in &parsed.military {
            match (u32::from_str_radix(start, 16), u32::from_str_radix(end, 16)) {
                (Ok(s), Ok(e)) => ranges.push((s, e)),
                _ => warn!("Skipping malformed military range {}..{}", start, end),
            }
        }

        info!("Loaded {} military address ranges", ranges.len());
        Ok(Self { ranges })
    }

    /// Construct from already-parsed integer ranges (tests, embedding)
    pub fn from_ranges(ranges: Vec<(u32, u32)>) -> Self {
        Self { ranges }
    }

    /// Returns true if the ICAO24 address falls within a known military range
    pub fn is_military(&self, icao24: &str) -> bool {
        let Ok(icao_nr) = u32::from_str_radix(icao24, 16) else {
            return false;
        };
        self.ranges
            .iter()
            .any(|&(start, end)| (start..=end).contains(&icao_nr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_icao24_addr() {
        assert!(is_icao24_addr("4B1617"));
        assert!(is_icao24_addr("abcdef"));
        assert!(!is_icao24_addr("4B161"));
        assert!(!is_icao24_addr("4B16170"));
        assert!(!is_icao24_addr("4B161G"));
    }

    #[test]
    fn test_swiss_ranges() {
        assert!(is_swiss("4B1617"));
        assert!(is_swiss("4b8000"));
        assert!(!is_swiss("3C6589"));
        assert!(is_swiss_mil(0x4B7123));
        assert!(!is_swiss_mil(0x4B6FFF));
    }

    #[test]
    fn test_mil_range_membership() {
        let ranges = MilRanges::from_ranges(vec![(0x4B7000, 0x4B7FFF), (0xAE0000, 0xAFFFFF)]);
        assert!(ranges.is_military("4B7123"));
        assert!(ranges.is_military("AE1460"));
        assert!(!ranges.is_military("4B1617"));
        assert!(!ranges.is_military("not-hex"));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ranges = MilRanges::load(dir.path()).unwrap();
        assert!(!ranges.is_military("4B7123"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("mil_ranges.json"),
            r#"{"military": [["4B7000", "4B7FFF"]]}"#,
        )
        .unwrap();
        let ranges = MilRanges::load(dir.path()).unwrap();
        assert!(ranges.is_military("4B7123"));
        assert!(!ranges.is_military("4B6FFF"));
    }
}
