//! Aircraft metadata records accumulated from external lookup services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn filled(value: &Option<String>) -> bool {
    value.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}

/// Aircraft identity metadata, keyed by mode-S hex address
///
/// Records are filled opportunistically from several external sources;
/// `source` is a `+`-joined list when more than one source contributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftRecord {
    /// Mode-S / ICAO24 address, uppercase
    pub mode_s: String,
    pub registration: Option<String>,
    pub icao_type_code: Option<String>,
    pub type_description: Option<String>,
    pub operator: Option<String>,
    /// Attribution of the source(s) that supplied the data
    pub source: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl AircraftRecord {
    pub fn new(mode_s: &str) -> Self {
        Self {
            mode_s: mode_s.trim().to_ascii_uppercase(),
            registration: None,
            icao_type_code: None,
            type_description: None,
            operator: None,
            source: None,
            created_at: None,
            last_modified: None,
        }
    }

    /// Merge fields from `other`, filling only currently-empty fields.
    ///
    /// Already-populated fields are never overwritten, so data from
    /// higher-priority sources queried earlier wins. Returns true when at
    /// least one field was filled.
    pub fn merge(&mut self, other: &AircraftRecord) -> bool {
        let mut changed = false;

        if !filled(&self.registration) && filled(&other.registration) {
            self.registration = other.registration.clone();
            changed = true;
        }
        if !filled(&self.icao_type_code) && filled(&other.icao_type_code) {
            self.icao_type_code = other.icao_type_code.clone();
            changed = true;
        }
        if !filled(&self.type_description) && filled(&other.type_description) {
            self.type_description = other.type_description.clone();
            changed = true;
        }
        if !filled(&self.operator) && filled(&other.operator) {
            self.operator = other.operator.clone();
            changed = true;
        }

        changed
    }

    /// Completeness: registration + type code + (type description OR
    /// operator) are all present.
    pub fn is_complete(&self) -> bool {
        filled(&self.registration)
            && filled(&self.icao_type_code)
            && (filled(&self.type_description) || filled(&self.operator))
    }

    /// Early-stop predicate used by the crawler: registration + type code
    /// + at least one of type description / operator.
    ///
    /// Currently coincides with `is_complete`, but is kept as its own
    /// predicate so a stricter completeness bar can diverge without
    /// changing the crawler's short-circuit behavior.
    pub fn is_sufficient(&self) -> bool {
        filled(&self.registration)
            && filled(&self.icao_type_code)
            && (filled(&self.type_description) || filled(&self.operator))
    }

    /// Whether any identity field carries data at all
    pub fn has_any_data(&self) -> bool {
        filled(&self.registration)
            || filled(&self.icao_type_code)
            || filled(&self.type_description)
            || filled(&self.operator)
    }

    /// Whether any of the critical identity fields is missing or blank
    pub fn has_missing_critical_fields(&self) -> bool {
        !filled(&self.registration)
            || !filled(&self.icao_type_code)
            || !filled(&self.type_description)
            || !filled(&self.operator)
    }
}
