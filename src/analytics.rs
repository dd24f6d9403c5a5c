// 📊 Analytics - region statistics, desert matrix and derived reports
//
// Every canonical region gets an entry, including regions with no
// facilities. Capability coverage is keyword evidence in the lower-cased
// capability + procedure + equipment text of each facility.

use crate::data_quality::{mean_percent, round_to};
use crate::entities::Facility;
use crate::geospatial::haversine_km;
use crate::reference::ReferenceData;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Zero-coverage categories needed to call a region a medical desert
pub const DESERT_GAP_THRESHOLD: usize = 3;

/// Facility counts at or below this are underserved (above zero)
pub const UNDERSERVED_MAX: usize = 2;

/// Regions with fewer facilities than this get critical recommendations
pub const CRITICAL_FACILITY_COUNT: usize = 20;

pub const CRITICAL_POPULATION: u64 = 1_000_000;

// ============================================================================
// REGION STATS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionStats {
    pub region: String,
    pub total_facilities: usize,

    /// Facility count per type code ("unknown" when the type is missing)
    pub facility_types: BTreeMap<String, usize>,

    pub hospitals: usize,
    pub clinics: usize,

    /// Distinct specialties, sorted
    pub specialties_available: Vec<String>,

    /// Category → facilities with keyword evidence
    pub capabilities_coverage: BTreeMap<String, usize>,

    /// Percent, one decimal (0.0 for an empty region)
    pub avg_data_completeness: f64,

    /// Sum of anomaly messages across the region
    pub anomaly_count: usize,

    pub is_medical_desert: bool,

    /// Zero-coverage categories in category order
    pub desert_gaps: Vec<String>,

    pub population: u64,
    pub facilities_per_100k: f64,
}

impl RegionStats {
    pub fn coverage(&self, category: &str) -> usize {
        self.capabilities_coverage.get(category).copied().unwrap_or(0)
    }
}

// ============================================================================
// DESERT MATRIX
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesertStatus {
    Critical,
    Underserved,
    Adequate,
}

impl DesertStatus {
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => DesertStatus::Critical,
            c if c <= UNDERSERVED_MAX => DesertStatus::Underserved,
            _ => DesertStatus::Adequate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesertMatrixEntry {
    pub region: String,
    pub capability: String,
    pub facility_count: usize,
    pub status: DesertStatus,
}

/// Headline figures over the whole matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesertSummary {
    pub total_critical_gaps: usize,

    /// Regions flagged as medical deserts, region order
    pub critical_regions: Vec<String>,
}

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityAnomalies {
    pub facility_id: String,
    pub facility_name: String,
    pub facility_type: Option<String>,
    pub region: Option<String>,
    pub anomalies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub total_facilities_with_anomalies: usize,
    pub total_anomaly_count: usize,
    pub anomalies: Vec<FacilityAnomalies>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialtyCoverage {
    pub region: String,
    pub specialties: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityOverview {
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,

    /// (region, count), most facilities first
    pub by_region: Vec<(String, usize)>,

    pub with_anomalies: usize,
    pub avg_completeness: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapRecommendation {
    /// Discovery order (region order, then gap order)
    pub id: usize,
    pub region: String,
    pub gap: String,
    pub severity: Severity,
    pub population_affected: u64,
    pub total_facilities_in_region: usize,
    pub nearest_region_with_capability: Option<String>,
    pub recommendation: String,
}

// ============================================================================
// ANALYTICS ENGINE
// ============================================================================

pub struct AnalyticsEngine<'r> {
    reference: &'r ReferenceData,
}

impl<'r> AnalyticsEngine<'r> {
    pub fn new(reference: &'r ReferenceData) -> Self {
        AnalyticsEngine { reference }
    }

    /// One entry per canonical region, reference order
    pub fn region_stats(&self, facilities: &[Facility]) -> Vec<RegionStats> {
        let categories = self.reference.capability_categories();

        // Service text once per facility, not once per (region, category)
        let service_texts: Vec<String> = facilities.iter().map(Facility::service_text).collect();

        self.reference
            .regions()
            .iter()
            .map(|region| {
                let members: Vec<usize> = facilities
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| f.normalized_region.as_deref() == Some(region.name.as_str()))
                    .map(|(i, _)| i)
                    .collect();

                let mut facility_types = BTreeMap::new();
                let mut specialties = BTreeSet::new();
                let mut anomaly_count = 0;
                for &i in &members {
                    let f = &facilities[i];
                    let t = f.facility_type.clone().unwrap_or_else(|| "unknown".to_string());
                    *facility_types.entry(t).or_insert(0) += 1;
                    specialties.extend(f.specialties.iter().cloned());
                    anomaly_count += f.anomalies.len();
                }

                let mut capabilities_coverage = BTreeMap::new();
                let mut desert_gaps = Vec::new();
                for category in categories {
                    let count = members
                        .iter()
                        .filter(|&&i| category.matches(&service_texts[i]))
                        .count();
                    if count == 0 {
                        desert_gaps.push(category.name.clone());
                    }
                    capabilities_coverage.insert(category.name.clone(), count);
                }

                let total = members.len();
                RegionStats {
                    region: region.name.clone(),
                    total_facilities: total,
                    hospitals: members.iter().filter(|&&i| facilities[i].is_type("hospital")).count(),
                    clinics: members.iter().filter(|&&i| facilities[i].is_type("clinic")).count(),
                    facility_types,
                    specialties_available: specialties.into_iter().collect(),
                    capabilities_coverage,
                    avg_data_completeness: mean_percent(
                        members.iter().map(|&i| facilities[i].data_completeness),
                    ),
                    anomaly_count,
                    is_medical_desert: desert_gaps.len() >= DESERT_GAP_THRESHOLD,
                    desert_gaps,
                    population: region.population,
                    facilities_per_100k: round_to(
                        total as f64 / region.population.max(1) as f64 * 100_000.0,
                        1,
                    ),
                }
            })
            .collect()
    }

    /// Region × category cells, region order then category order
    pub fn desert_matrix(&self, stats: &[RegionStats]) -> Vec<DesertMatrixEntry> {
        let categories = self.reference.capability_categories();
        let mut matrix = Vec::with_capacity(stats.len() * categories.len());

        for region in stats {
            for category in categories {
                let count = region.coverage(&category.name);
                matrix.push(DesertMatrixEntry {
                    region: region.region.clone(),
                    capability: category.name.clone(),
                    facility_count: count,
                    status: DesertStatus::from_count(count),
                });
            }
        }

        matrix
    }

    /// One recommendation per (region, desert gap), critical first then by population
    pub fn gap_recommendations(&self, stats: &[RegionStats]) -> Vec<GapRecommendation> {
        let mut recommendations = Vec::new();

        for region in stats {
            for gap in &region.desert_gaps {
                let severity = if region.total_facilities < CRITICAL_FACILITY_COUNT
                    || (region.population > CRITICAL_POPULATION && region.total_facilities == 0)
                {
                    Severity::Critical
                } else {
                    Severity::High
                };

                let nearest = self.nearest_region_with(stats, &region.region, gap);
                let recommendation = format!(
                    "Deploy {} services to {}. Currently 0 facilities offer this in a region with an estimated population of {}. Nearest {} is in {}.",
                    gap.to_lowercase(),
                    region.region,
                    with_thousands(region.population),
                    gap.to_lowercase(),
                    nearest.as_deref().unwrap_or("Unknown"),
                );

                recommendations.push(GapRecommendation {
                    id: recommendations.len() + 1,
                    region: region.region.clone(),
                    gap: gap.clone(),
                    severity,
                    population_affected: region.population,
                    total_facilities_in_region: region.total_facilities,
                    nearest_region_with_capability: nearest,
                    recommendation,
                });
            }
        }

        recommendations.sort_by_key(|r| (r.severity != Severity::Critical, Reverse(r.population_affected)));
        recommendations
    }

    /// Closest other region (centroid distance) covering the category
    fn nearest_region_with(&self, stats: &[RegionStats], region: &str, category: &str) -> Option<String> {
        let origin = self.reference.region_centroid(region)?;

        stats
            .iter()
            .filter(|s| s.region != region && s.coverage(category) > 0)
            .filter_map(|s| {
                let c = self.reference.region_centroid(&s.region)?;
                Some((haversine_km(origin.0, origin.1, c.0, c.1), &s.region))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, name)| name.clone())
    }
}

pub fn desert_summary(stats: &[RegionStats], matrix: &[DesertMatrixEntry]) -> DesertSummary {
    DesertSummary {
        total_critical_gaps: matrix
            .iter()
            .filter(|e| e.status == DesertStatus::Critical)
            .count(),
        critical_regions: stats
            .iter()
            .filter(|s| s.is_medical_desert)
            .map(|s| s.region.clone())
            .collect(),
    }
}

pub fn anomaly_report(facilities: &[Facility]) -> AnomalyReport {
    let anomalies: Vec<FacilityAnomalies> = facilities
        .iter()
        .filter(|f| f.has_anomalies())
        .map(|f| FacilityAnomalies {
            facility_id: f.unique_id.clone(),
            facility_name: f.name.clone(),
            facility_type: f.facility_type.clone(),
            region: f.normalized_region.clone(),
            anomalies: f.anomalies.clone(),
        })
        .collect();

    AnomalyReport {
        total_facilities_with_anomalies: anomalies.len(),
        total_anomaly_count: anomalies.iter().map(|a| a.anomalies.len()).sum(),
        anomalies,
    }
}

pub fn specialty_coverage(stats: &[RegionStats]) -> Vec<SpecialtyCoverage> {
    stats
        .iter()
        .map(|s| SpecialtyCoverage {
            region: s.region.clone(),
            specialties: s.specialties_available.clone(),
            count: s.specialties_available.len(),
        })
        .collect()
}

pub fn facility_overview(facilities: &[Facility]) -> FacilityOverview {
    let mut by_type = BTreeMap::new();
    let mut by_region: HashMap<String, usize> = HashMap::new();
    for f in facilities {
        let t = f.facility_type.clone().unwrap_or_else(|| "unknown".to_string());
        *by_type.entry(t).or_insert(0) += 1;
        let r = f.normalized_region.clone().unwrap_or_else(|| "Unknown".to_string());
        *by_region.entry(r).or_insert(0) += 1;
    }

    let mut by_region: Vec<(String, usize)> = by_region.into_iter().collect();
    by_region.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    FacilityOverview {
        total: facilities.len(),
        by_type,
        by_region,
        with_anomalies: facilities.iter().filter(|f| f.has_anomalies()).count(),
        avg_completeness: mean_percent(facilities.iter().map(|f| f.data_completeness)),
    }
}

/// 4200000 → "4,200,000"
fn with_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================
