//! Callsign parsing
//!
//! Extracts ICAO 3-letter airline designators from ADS-B callsigns.
//!
//! Commercial flights use the format 3-letter ICAO airline code + flight
//! number, e.g. "AFR990" -> "AFR" (Air France). General aviation aircraft
//! transmit their registration as callsign ("N172SP", "G-ABCD", "D-EABC")
//! and must not be mistaken for airlines.

use once_cell::sync::Lazy;
use regex::Regex;

// GA registrations: country prefix with dash, US N-numbers, Japanese JA
// numbers and a few dash-less country prefixes.
static GA_PATTERNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]{1,2}-|^N\d|^F-|^VH-|^ZK-|^JA\d").expect("valid GA pattern")
});

/// Privacy/relay callsign prefixes that are not real airlines
const PRIVACY_PREFIXES: [&str; 4] = ["DCM", "FFL", "FWR", "XAA"];

/// Extract the ICAO 3-letter airline designator from an ADS-B callsign.
///
/// Returns the uppercase 3-letter code for commercial airline callsigns,
/// None for GA/private/military/unrecognized callsigns.
pub fn extract_airline_icao(callsign: &str) -> Option<String> {
    let cs = callsign.trim().to_ascii_uppercase();
    if cs.len() < 4 || !cs.is_ascii() {
        return None;
    }

    if GA_PATTERNS.is_match(&cs) {
        return None;
    }

    let prefix = &cs[..3];
    if PRIVACY_PREFIXES.contains(&prefix) {
        return None;
    }

    // Commercial pattern: 3-alpha prefix, at least one digit in the rest
    if prefix.chars().all(|c| c.is_ascii_alphabetic())
        && cs[3..].chars().any(|c| c.is_ascii_digit())
    {
        return Some(prefix.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commercial_callsigns() {
        assert_eq!(extract_airline_icao("AFR990").as_deref(), Some("AFR"));
        assert_eq!(extract_airline_icao("BAW238").as_deref(), Some("BAW"));
        assert_eq!(extract_airline_icao("swr123a").as_deref(), Some("SWR"));
    }

    #[test]
    fn test_ga_registrations_rejected() {
        assert!(extract_airline_icao("N172SP").is_none());
        assert!(extract_airline_icao("G-ABCD").is_none());
        assert!(extract_airline_icao("D-EABC").is_none());
        assert!(extract_airline_icao("HB-JCS").is_none());
        assert!(extract_airline_icao("JA8089").is_none());
        assert!(extract_airline_icao("VH-OQA").is_none());
    }

    #[test]
    fn test_privacy_prefixes_rejected() {
        assert!(extract_airline_icao("DCM1234").is_none());
        assert!(extract_airline_icao("XAA42").is_none());
    }

    #[test]
    fn test_short_or_empty_rejected() {
        assert!(extract_airline_icao("").is_none());
        assert!(extract_airline_icao("AFR").is_none());
        assert!(extract_airline_icao("  ").is_none());
    }

    #[test]
    fn test_no_digit_suffix_rejected() {
        // All-alpha callsigns are not the commercial pattern
        assert!(extract_airline_icao("ABCDEF").is_none());
    }
}
