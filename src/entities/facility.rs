// 🏥 Facility Entity - one reconciled healthcare facility
// Identity: unique_id (the source natural key). Values: everything else.

use serde::{Deserialize, Serialize};

/// Name used when the source has no usable name
pub const UNKNOWN_FACILITY_NAME: &str = "Unknown Facility";

// ============================================================================
// FACILITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    // ========================================================================
    // IDENTITY
    // ========================================================================
    /// Stable across every duplicate row sharing the same source key
    pub unique_id: String,

    pub content_table_id: Option<String>,

    // ========================================================================
    // DESCRIPTIVE VALUES
    // ========================================================================
    pub name: String,
    pub facility_type: Option<String>,
    pub operator_type: Option<String>,
    pub description: Option<String>,

    pub specialties: Vec<String>,
    pub capabilities: Vec<String>,
    pub procedures: Vec<String>,
    pub equipment: Vec<String>,

    // ========================================================================
    // ADDRESS & CONTACT
    // ========================================================================
    pub address_city: Option<String>,

    /// Region text exactly as the source gave it
    pub address_region: Option<String>,

    pub address_country: String,
    pub phone_numbers: Vec<String>,
    pub email: Option<String>,
    pub websites: Vec<String>,

    // ========================================================================
    // NUMERIC
    // ========================================================================
    pub year_established: Option<i64>,
    pub number_doctors: Option<i64>,
    pub capacity: Option<i64>,

    // ========================================================================
    // DERIVED (reconciliation pass)
    // ========================================================================
    /// Approximate, jittered per load. Never ground truth.
    pub lat: Option<f64>,
    pub lng: Option<f64>,

    /// Filled key fields / 12, two decimals
    pub data_completeness: f64,

    pub anomalies: Vec<String>,

    /// Canonical region, raw passthrough text, or None
    pub normalized_region: Option<String>,
}

impl Facility {
    /// Minimal facility, used by tests and fixtures
    pub fn new(unique_id: &str, name: &str) -> Self {
        Facility {
            unique_id: unique_id.to_string(),
            content_table_id: None,
            name: name.to_string(),
            facility_type: None,
            operator_type: None,
            description: None,
            specialties: Vec::new(),
            capabilities: Vec::new(),
            procedures: Vec::new(),
            equipment: Vec::new(),
            address_city: None,
            address_region: None,
            address_country: "Ghana".to_string(),
            phone_numbers: Vec::new(),
            email: None,
            websites: Vec::new(),
            year_established: None,
            number_doctors: None,
            capacity: None,
            lat: None,
            lng: None,
            data_completeness: 0.0,
            anomalies: Vec::new(),
            normalized_region: None,
        }
    }

    /// Lower-cased capability + procedure + equipment text
    ///
    /// Capability keyword coverage is always evaluated against this text.
    pub fn service_text(&self) -> String {
        self.capabilities
            .iter()
            .chain(self.procedures.iter())
            .chain(self.equipment.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    pub fn coords(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    pub fn has_anomalies(&self) -> bool {
        !self.anomalies.is_empty()
    }

    /// Region to show: canonical if known, else raw source text
    pub fn display_region(&self) -> Option<&str> {
        self.normalized_region
            .as_deref()
            .or(self.address_region.as_deref())
    }

    pub fn is_type(&self, facility_type: &str) -> bool {
        self.facility_type
            .as_deref()
            .map(|t| t.eq_ignore_ascii_case(facility_type))
            .unwrap_or(false)
    }
}

// ============================================================================
// PROJECTIONS
// ============================================================================

/// Listing / search-result view of a facility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilitySummary {
    pub unique_id: String,
    pub name: String,
    pub facility_type: Option<String>,
    pub address_city: Option<String>,
    pub address_region: Option<String>,
    pub specialties: Vec<String>,
    pub capabilities_count: usize,
    pub data_completeness: f64,
    pub has_anomalies: bool,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl From<&Facility> for FacilitySummary {
    fn from(f: &Facility) -> Self {
        FacilitySummary {
            unique_id: f.unique_id.clone(),
            name: f.name.clone(),
            facility_type: f.facility_type.clone(),
            address_city: f.address_city.clone(),
            address_region: f.display_region().map(str::to_string),
            specialties: f.specialties.clone(),
            capabilities_count: f.capabilities.len(),
            data_completeness: f.data_completeness,
            has_anomalies: f.has_anomalies(),
            lat: f.lat,
            lng: f.lng,
        }
    }
}

/// Minimal record for map rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub unique_id: String,
    pub name: String,
    pub facility_type: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub region: Option<String>,
    pub specialties_count: usize,
    pub capabilities_count: usize,
    pub has_anomalies: bool,
}

impl MapPoint {
    /// None when the facility has no coordinates
    pub fn from_facility(f: &Facility) -> Option<Self> {
        let (lat, lng) = f.coords()?;
        Some(MapPoint {
            unique_id: f.unique_id.clone(),
            name: f.name.clone(),
            facility_type: f.facility_type.clone(),
            lat,
            lng,
            region: f.normalized_region.clone(),
            specialties_count: f.specialties.len(),
            capabilities_count: f.capabilities.len(),
            has_anomalies: f.has_anomalies(),
        })
    }
}
