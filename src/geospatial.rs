// 🧭 Geospatial Engine - distance, radius, nearest and cold-spot queries
//
// Stateless: every function takes the facility slice and reference tables
// it needs. Free-text parsing is deterministic regex work, English only.

use crate::data_quality::round_to;
use crate::entities::Facility;
use crate::reference::{LatLng, ReferenceData};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Travel speed used to turn a duration into a radius
pub const ASSUMED_SPEED_KMH: f64 = 40.0;

pub const KM_PER_MILE: f64 = 1.609;

pub const DEFAULT_LIMIT_WITHIN: usize = 25;
pub const DEFAULT_LIMIT_NEAREST: usize = 5;
pub const DEFAULT_LIMIT_COLD_SPOTS: usize = 10;

/// Facility-type vocabulary, checked in this order
const FACILITY_TYPE_KEYWORDS: [&str; 6] = ["hospital", "clinic", "dentist", "pharmacy", "doctor", "diagnostic"];

lazy_static! {
    static ref KM_RE: Regex =
        Regex::new(r"(\d+(?:\.\d+)?)\s*(?:km|kms|kilometers?|kilometres?)\b").unwrap();
    static ref MILES_RE: Regex = Regex::new(r"(\d+(?:\.\d+)?)\s*(?:mi|miles?)\b").unwrap();
    static ref HOURS_RE: Regex = Regex::new(r"(\d+(?:\.\d+)?)\s*(?:hours?|hrs?)\b").unwrap();
    static ref COORD_PAIR_RE: Regex =
        Regex::new(r"(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)").unwrap();
    static ref COORD_NAMED_RE: Regex = Regex::new(
        r"lat\w*\s*[:=]\s*(-?\d+(?:\.\d+)?)\s*[ ,;/]+\s*(?:lon|lng|long)\w*\s*[:=]\s*(-?\d+(?:\.\d+)?)"
    )
    .unwrap();
}

#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("could not resolve a location from '{0}'")]
    LocationNotFound(String),

    #[error("coordinates out of range: ({lat}, {lng})")]
    InvalidCoordinates { lat: f64, lng: f64 },
}

// ============================================================================
// DISTANCE
// ============================================================================

/// Great-circle distance in kilometres
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = ((dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2)).clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

fn valid_coords(lat: f64, lng: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

// ============================================================================
// FREE-TEXT PARSING
// ============================================================================

/// (distance_km, hours): km wins over miles, miles over hours
pub fn extract_distance_km(message: &str) -> (Option<f64>, Option<f64>) {
    let text = message.to_lowercase();
    let number = |re: &Regex| -> Option<f64> {
        re.captures(&text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    };

    if let Some(km) = number(&KM_RE) {
        return (Some(km), None);
    }
    if let Some(miles) = number(&MILES_RE) {
        return (Some(miles * KM_PER_MILE), None);
    }
    (None, number(&HOURS_RE))
}

/// Explicit "lat, lng" or "lat=.. lon=.." pair within valid ranges
pub fn extract_coords(message: &str) -> Option<LatLng> {
    let text = message.to_lowercase();

    for re in [&*COORD_PAIR_RE, &*COORD_NAMED_RE] {
        if let Some(caps) = re.captures(&text) {
            let lat = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
            let lng = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok());
            if let (Some(lat), Some(lng)) = (lat, lng) {
                if valid_coords(lat, lng) {
                    return Some((lat, lng));
                }
            }
        }
    }
    None
}

/// Dataset type code mentioned in the text ("pharmacy" → "farmacy")
pub fn detect_facility_type(message: &str) -> Option<String> {
    let text = message.to_lowercase();
    FACILITY_TYPE_KEYWORDS
        .iter()
        .find(|kw| text.contains(*kw))
        .map(|kw| match *kw {
            "pharmacy" => "farmacy".to_string(),
            other => other.to_string(),
        })
}

/// First category whose keywords appear in the text
pub fn detect_capability_category(message: &str, reference: &ReferenceData) -> Option<String> {
    let text = message.to_lowercase();
    reference
        .capability_categories()
        .iter()
        .find(|c| c.matches(&text))
        .map(|c| c.name.clone())
}

/// `needle` occurs in `haystack` as a whole word
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    Regex::new(&format!(r"\b{}\b", regex::escape(needle))).map_or(false, |re| re.is_match(haystack))
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// LOCATION RESOLUTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    CustomCoords,
    City,
    Region,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub label: String,
    pub coords: LatLng,
    pub source: LocationSource,
}

/// Explicit coordinates → longest city → longest region name
pub fn resolve_location(message: &str, reference: &ReferenceData) -> Option<ResolvedLocation> {
    if let Some(coords) = extract_coords(message) {
        return Some(ResolvedLocation {
            label: "Custom Coordinates".to_string(),
            coords,
            source: LocationSource::CustomCoords,
        });
    }

    let text = message.to_lowercase();

    for city in reference.cities_longest_first() {
        if contains_word(&text, city) {
            if let Some(coords) = reference.city_coords(city) {
                return Some(ResolvedLocation {
                    label: title_case(city),
                    coords,
                    source: LocationSource::City,
                });
            }
        }
    }

    let mut regions: Vec<_> = reference.regions().iter().collect();
    regions.sort_by(|a, b| b.name.len().cmp(&a.name.len()).then_with(|| a.name.cmp(&b.name)));
    regions
        .into_iter()
        .find(|r| contains_word(&text, &r.name.to_lowercase()))
        .map(|r| ResolvedLocation {
            label: r.name.clone(),
            coords: r.centroid,
            source: LocationSource::Region,
        })
}

// ============================================================================
// QUERIES
// ============================================================================

/// Facility type + capability category filter
#[derive(Debug, Clone, Copy, Default)]
pub struct FacilityFilter<'a> {
    pub facility_type: Option<&'a str>,
    pub capability_category: Option<&'a str>,
}

impl<'a> FacilityFilter<'a> {
    fn matches(&self, facility: &Facility, reference: &ReferenceData) -> bool {
        if let Some(t) = self.facility_type {
            if !facility.is_type(t) {
                return false;
            }
        }
        match self.capability_category {
            // Unknown categories match nothing
            Some(name) => reference
                .capability_category(name)
                .map_or(false, |c| c.matches(&facility.service_text())),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoHit {
    pub name: String,
    pub unique_id: String,
    #[serde(rename = "type")]
    pub facility_type: Option<String>,
    pub region: Option<String>,

    /// Two decimals
    pub distance_km: f64,
}

impl GeoHit {
    fn new(facility: &Facility, distance_km: f64) -> Self {
        GeoHit {
            name: facility.name.clone(),
            unique_id: facility.unique_id.clone(),
            facility_type: facility.facility_type.clone(),
            region: facility.normalized_region.clone(),
            distance_km,
        }
    }
}

/// Region whose centroid has no matching facility within the radius
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColdSpot {
    pub region: String,

    /// None when no matching facility exists anywhere
    pub distance_km: Option<f64>,
}

/// Every matching facility with coordinates, nearest first
fn ranked(center: LatLng, facilities: &[Facility], filter: FacilityFilter, reference: &ReferenceData) -> Vec<GeoHit> {
    let mut hits: Vec<GeoHit> = facilities
        .iter()
        .filter(|f| filter.matches(f, reference))
        .filter_map(|f| {
            let (lat, lng) = f.coords()?;
            let d = round_to(haversine_km(center.0, center.1, lat, lng), 2);
            Some(GeoHit::new(f, d))
        })
        .collect();

    hits.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    hits
}

pub fn facilities_within_radius(
    center: LatLng,
    radius_km: f64,
    facilities: &[Facility],
    filter: FacilityFilter,
    reference: &ReferenceData,
) -> Vec<GeoHit> {
    ranked(center, facilities, filter, reference)
        .into_iter()
        .take_while(|h| h.distance_km <= radius_km)
        .collect()
}

pub fn nearest_facilities(
    center: LatLng,
    limit: usize,
    facilities: &[Facility],
    filter: FacilityFilter,
    reference: &ReferenceData,
) -> Vec<GeoHit> {
    let mut hits = ranked(center, facilities, filter, reference);
    hits.truncate(limit);
    hits
}

/// Regions farther than `radius_km` from any facility offering the category
pub fn cold_spots(
    radius_km: f64,
    capability_category: &str,
    facilities: &[Facility],
    reference: &ReferenceData,
) -> Vec<ColdSpot> {
    let filter = FacilityFilter {
        facility_type: None,
        capability_category: Some(capability_category),
    };

    let mut spots: Vec<ColdSpot> = reference
        .regions()
        .iter()
        .filter_map(|region| {
            match nearest_facilities(region.centroid, 1, facilities, filter, reference).first() {
                None => Some(ColdSpot {
                    region: region.name.clone(),
                    distance_km: None,
                }),
                Some(hit) if hit.distance_km > radius_km => Some(ColdSpot {
                    region: region.name.clone(),
                    distance_km: Some(hit.distance_km),
                }),
                Some(_) => None,
            }
        })
        .collect();

    // "None found" sorts as distance 0
    spots.sort_by(|a, b| {
        b.distance_km
            .unwrap_or(0.0)
            .total_cmp(&a.distance_km.unwrap_or(0.0))
    });
    spots
}

// ============================================================================
// COMBINED QUERY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoQuery {
    pub message: Option<String>,

    /// Bypasses location parsing when set
    pub center: Option<LatLng>,
    pub location_label: Option<String>,

    pub radius_km: Option<f64>,
    pub hours: Option<f64>,
    pub facility_type: Option<String>,
    pub capability_category: Option<String>,

    pub limit_within: usize,
    pub limit_nearest: usize,
    pub limit_cold_spots: usize,
}

impl Default for GeoQuery {
    fn default() -> Self {
        GeoQuery {
            message: None,
            center: None,
            location_label: None,
            radius_km: None,
            hours: None,
            facility_type: None,
            capability_category: None,
            limit_within: DEFAULT_LIMIT_WITHIN,
            limit_nearest: DEFAULT_LIMIT_NEAREST,
            limit_cold_spots: DEFAULT_LIMIT_COLD_SPOTS,
        }
    }
}

impl GeoQuery {
    pub fn from_message(message: &str) -> Self {
        GeoQuery {
            message: Some(message.to_string()),
            ..GeoQuery::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoResponse {
    pub location: ResolvedLocation,
    pub radius_km: Option<f64>,
    pub time_hours: Option<f64>,
    pub assumed_speed_kmh: f64,
    pub facility_type: Option<String>,
    pub capability_category: Option<String>,
    pub within_radius: Vec<GeoHit>,
    pub nearest: Vec<GeoHit>,
    pub cold_spots: Vec<ColdSpot>,
}

/// Parse, resolve and run every query the inputs allow
///
/// Explicit fields win over whatever the message says. Within-radius needs
/// a radius, cold spots need a radius and a category, nearest always runs.
pub fn build_response(
    query: &GeoQuery,
    facilities: &[Facility],
    reference: &ReferenceData,
) -> Result<GeoResponse, GeoError> {
    let message = query.message.as_deref().unwrap_or("");

    let (mut radius_km, mut hours) = (query.radius_km, query.hours);
    if radius_km.is_none() && hours.is_none() {
        let (parsed_km, parsed_hours) = extract_distance_km(message);
        radius_km = parsed_km;
        hours = parsed_hours;
    }

    let facility_type = query
        .facility_type
        .clone()
        .or_else(|| detect_facility_type(message));

    let capability_category = match &query.capability_category {
        Some(name) => Some(
            reference
                .capability_category(name)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| name.clone()),
        ),
        None => detect_capability_category(message, reference),
    };

    let location = match query.center {
        Some((lat, lng)) => {
            if !valid_coords(lat, lng) {
                return Err(GeoError::InvalidCoordinates { lat, lng });
            }
            ResolvedLocation {
                label: query
                    .location_label
                    .clone()
                    .unwrap_or_else(|| "Custom Coordinates".to_string()),
                coords: (lat, lng),
                source: LocationSource::CustomCoords,
            }
        }
        None => resolve_location(message, reference)
            .ok_or_else(|| GeoError::LocationNotFound(message.to_string()))?,
    };

    if radius_km.is_none() {
        if let Some(h) = hours.filter(|h| *h > 0.0) {
            radius_km = Some(h * ASSUMED_SPEED_KMH);
        }
    }

    let filter = FacilityFilter {
        facility_type: facility_type.as_deref(),
        capability_category: capability_category.as_deref(),
    };
    let positive_radius = radius_km.filter(|r| *r > 0.0);

    let within_radius = match positive_radius {
        Some(r) => {
            let mut hits = facilities_within_radius(location.coords, r, facilities, filter, reference);
            hits.truncate(query.limit_within);
            hits
        }
        None => Vec::new(),
    };

    let nearest = nearest_facilities(location.coords, query.limit_nearest, facilities, filter, reference);

    let cold_spots = match (positive_radius, capability_category.as_deref()) {
        (Some(r), Some(category)) => {
            let mut spots = cold_spots(r, category, facilities, reference);
            spots.truncate(query.limit_cold_spots);
            spots
        }
        _ => Vec::new(),
    };

    Ok(GeoResponse {
        location,
        radius_km,
        time_hours: hours,
        assumed_speed_kmh: ASSUMED_SPEED_KMH,
        facility_type,
        capability_category,
        within_radius,
        nearest,
        cold_spots,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> ReferenceData {
        ReferenceData::bundled().unwrap()
    }

    fn create_test_facility(id: &str, facility_type: &str, coords: LatLng, caps: &[&str]) -> Facility {
        let mut f = Facility::new(id, &format!("Facility {}", id));
        f.facility_type = Some(facility_type.to_string());
        f.lat = Some(coords.0);
        f.lng = Some(coords.1);
        f.capabilities = caps.iter().map(|c| c.to_string()).collect();
        f
    }

    #[test]
    fn test_haversine_identity_and_symmetry() {
        let accra = (5.6037, -0.1870);
        let kumasi = (6.6885, -1.6244);

        assert_eq!(haversine_km(accra.0, accra.1, accra.0, accra.1), 0.0);
        let ab = haversine_km(accra.0, accra.1, kumasi.0, kumasi.1);
        let ba = haversine_km(kumasi.0, kumasi.1, accra.0, accra.1);
        assert!((ab - ba).abs() < 1e-9);
        // Accra → Kumasi is roughly 200 km as the crow flies
        assert!(ab > 190.0 && ab < 210.0);
    }

    #[test]
    fn test_extract_distance() {
        assert_eq!(extract_distance_km("within 50km of Accra"), (Some(50.0), None));
        assert_eq!(extract_distance_km("25.5 kilometres"), (Some(25.5), None));
        assert_eq!(extract_distance_km("2 hours from Tamale"), (None, Some(2.0)));
        assert_eq!(extract_distance_km("1 hr drive"), (None, Some(1.0)));

        let (km, hours) = extract_distance_km("10 miles away");
        assert!((km.unwrap() - 16.09).abs() < 1e-9);
        assert_eq!(hours, None);

        // "mi" must be a whole unit, not the start of a word
        assert_eq!(extract_distance_km("3 minutes walk"), (None, None));
        assert_eq!(extract_distance_km("clinics in Ho"), (None, None));
    }

    #[test]
    fn test_extract_coords() {
        assert_eq!(extract_coords("near 5.6, -0.19 please"), Some((5.6, -0.19)));
        assert_eq!(extract_coords("lat=9.4 lng=-0.85"), Some((9.4, -0.85)));
        assert_eq!(extract_coords("lat: 9.4, longitude: -0.85"), Some((9.4, -0.85)));
        assert_eq!(extract_coords("95, 200"), None);
        assert_eq!(extract_coords("no numbers here"), None);
    }

    #[test]
    fn test_detect_facility_type() {
        assert_eq!(detect_facility_type("nearest Pharmacy").as_deref(), Some("farmacy"));
        assert_eq!(detect_facility_type("hospital or clinic").as_deref(), Some("hospital"));
        assert_eq!(detect_facility_type("anything"), None);
    }

    #[test]
    fn test_detect_capability_category() {
        let reference = reference();
        assert_eq!(
            detect_capability_category("who does c-section deliveries", &reference).as_deref(),
            Some("Maternal/Obstetric")
        );
        assert_eq!(detect_capability_category("hello", &reference), None);
    }

    #[test]
    fn test_resolve_location_whole_words() {
        let reference = reference();

        let loc = resolve_location("within 50km of Accra", &reference).unwrap();
        assert_eq!(loc.label, "Accra");
        assert_eq!(loc.source, LocationSource::City);

        // "ho" inside "hospital" must not resolve to Ho
        assert!(resolve_location("any hospital please", &reference).is_none());

        let loc = resolve_location("clinics in the upper east", &reference).unwrap();
        assert_eq!(loc.source, LocationSource::Region);
        assert_eq!(loc.label, "Upper East");
    }

    #[test]
    fn test_contains_word() {
        assert!(contains_word("near ho.", "ho"));
        assert!(!contains_word("hospital", "ho"));
        assert!(contains_word("cape coast castle", "cape coast"));
        assert!(!contains_word("anything", ""));
        assert!(contains_word("clinics in ho, volta", "ho"));
        assert!(!contains_word("shoe", "ho"));
    }

    #[test]
    fn test_haversine_antipodal_is_finite() {
        let d = haversine_km(0.0, 0.0, 0.0, 180.0);
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);

        let near = haversine_km(45.0, -179.999_999_9, -45.0, 0.000_000_1);
        assert!(near.is_finite());
    }

    #[test]
    fn test_within_is_subset_of_nearest_and_sorted() {
        let reference = reference();
        let center = (5.6037, -0.1870);
        let facilities = vec![
            create_test_facility("far", "hospital", (6.6885, -1.6244), &[]),
            create_test_facility("near", "hospital", (5.61, -0.19), &[]),
            create_test_facility("mid", "clinic", (5.7, -0.3), &[]),
            Facility::new("nocoords", "Nowhere"),
        ];

        let within = facilities_within_radius(center, 50.0, &facilities, FacilityFilter::default(), &reference);
        let nearest = nearest_facilities(center, 10, &facilities, FacilityFilter::default(), &reference);

        assert_eq!(nearest.len(), 3);
        assert_eq!(within.len(), 2);
        assert!(within.iter().all(|w| nearest.contains(w)));
        assert!(within.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
        assert!(nearest.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
        assert_eq!(nearest[0].unique_id, "near");

        let hospitals_only = FacilityFilter {
            facility_type: Some("hospital"),
            capability_category: None,
        };
        let within = facilities_within_radius(center, 50.0, &facilities, hospitals_only, &reference);
        assert_eq!(within.len(), 1);
    }

    #[test]
    fn test_cold_spots_sorted_with_none_as_zero() {
        let reference = reference();
        // One surgical facility in Accra only
        let facilities = vec![create_test_facility("1", "hospital", (5.6037, -0.1870), &["surgery"])];

        let spots = cold_spots(100.0, "Surgery", &facilities, &reference);
        assert!(spots.iter().all(|s| s.region != "Greater Accra"));
        assert!(spots.iter().all(|s| s.distance_km.unwrap() > 100.0));
        assert!(spots
            .windows(2)
            .all(|w| w[0].distance_km.unwrap() >= w[1].distance_km.unwrap()));

        // No facility offers dental care → every region is a gap with no distance
        let spots = cold_spots(100.0, "Dental", &facilities, &reference);
        assert_eq!(spots.len(), reference.regions().len());
        assert!(spots.iter().all(|s| s.distance_km.is_none()));
    }

    #[test]
    fn test_build_response_from_message() {
        let reference = reference();
        let facilities = vec![create_test_facility("1", "hospital", (9.41, -0.85), &["surgery"])];

        let response =
            build_response(&GeoQuery::from_message("2 hours from Tamale"), &facilities, &reference).unwrap();

        assert_eq!(response.location.label, "Tamale");
        assert_eq!(response.time_hours, Some(2.0));
        assert_eq!(response.radius_km, Some(80.0));
        assert_eq!(response.within_radius.len(), 1);
        assert_eq!(response.nearest.len(), 1);
        assert!(response.cold_spots.is_empty());
    }

    #[test]
    fn test_within_50km_of_accra() {
        let reference = reference();

        let response =
            build_response(&GeoQuery::from_message("within 50km of Accra"), &[], &reference).unwrap();

        assert_eq!(response.location.label, "Accra");
        assert_eq!(response.location.source, LocationSource::City);
        assert_eq!(Some(response.location.coords), reference.city_coords("accra"));
        assert_eq!(response.radius_km, Some(50.0));
        assert_eq!(response.time_hours, None);
    }

    #[test]
    fn test_two_hours_from_tamale() {
        let reference = reference();

        let response = build_response(&GeoQuery::from_message("2 hours from Tamale"), &[], &reference).unwrap();

        assert_eq!(Some(response.location.coords), reference.city_coords("tamale"));
        assert_eq!(response.time_hours, Some(2.0));
        assert_eq!(response.radius_km, Some(2.0 * ASSUMED_SPEED_KMH));
        assert_eq!(response.radius_km, Some(80.0));
    }

    #[test]
    fn test_build_response_cold_spots_need_category() {
        let reference = reference();
        let facilities = vec![create_test_facility("1", "hospital", (5.6037, -0.1870), &["surgery"])];

        let response = build_response(
            &GeoQuery::from_message("surgery within 50km of Accra"),
            &facilities,
            &reference,
        )
        .unwrap();

        assert_eq!(response.radius_km, Some(50.0));
        assert_eq!(response.capability_category.as_deref(), Some("Surgery"));
        assert!(!response.cold_spots.is_empty());
        assert!(response.cold_spots.len() <= DEFAULT_LIMIT_COLD_SPOTS);
    }

    #[test]
    fn test_build_response_explicit_center() {
        let reference = reference();
        let query = GeoQuery {
            center: Some((5.6, -0.2)),
            radius_km: Some(10.0),
            ..GeoQuery::default()
        };

        let response = build_response(&query, &[], &reference).unwrap();
        assert_eq!(response.location.source, LocationSource::CustomCoords);
        assert!(response.nearest.is_empty());

        let bad = GeoQuery {
            center: Some((100.0, 0.0)),
            ..GeoQuery::default()
        };
        assert!(matches!(
            build_response(&bad, &[], &reference),
            Err(GeoError::InvalidCoordinates { .. })
        ));
    }

    #[test]
    fn test_unresolved_location_is_an_error() {
        let reference = reference();
        let result = build_response(&GeoQuery::from_message("somewhere nice"), &[], &reference);

        assert_eq!(result, Err(GeoError::LocationNotFound("somewhere nice".to_string())));
    }
}
