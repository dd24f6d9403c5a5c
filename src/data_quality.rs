// ✅ Data Quality - completeness scoring and dataset-wide quality stats
//
// A field is "filled" when a list is non-empty or a scalar is present and,
// if textual, non-blank after trimming. The same rule drives the per-record
// score and the per-field breakdown.

use crate::entities::Facility;
use crate::parser::RawRecord;
use crate::reference::ReferenceData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The twelve key source columns scored for completeness
pub const KEY_FIELDS: [&str; 12] = [
    "name",
    "address_city",
    "address_stateOrRegion",
    "facilityTypeId",
    "specialties",
    "capability",
    "procedure",
    "equipment",
    "description",
    "phone_numbers",
    "email",
    "websites",
];

// ============================================================================
// COMPLETENESS
// ============================================================================

/// Fraction of key fields filled, rounded to two decimals
pub fn completeness_score(record: &RawRecord) -> f64 {
    let filled = KEY_FIELDS
        .iter()
        .filter(|field| record.get(field).is_filled())
        .count();

    round_to(filled as f64 / KEY_FIELDS.len() as f64, 2)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Mean as a percentage with one decimal (0.0 for no values)
pub(crate) fn mean_percent<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        0.0
    } else {
        round_to(sum / count as f64 * 100.0, 1)
    }
}

// ============================================================================
// FIELD COVERAGE
// ============================================================================

/// Running per-field fill counts over the deduplicated records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldCoverage {
    pub records: usize,
    pub filled: BTreeMap<String, usize>,
}

impl FieldCoverage {
    pub fn new() -> Self {
        FieldCoverage {
            records: 0,
            filled: KEY_FIELDS.iter().map(|f| (f.to_string(), 0)).collect(),
        }
    }

    pub fn observe(&mut self, record: &RawRecord) {
        self.records += 1;
        for field in KEY_FIELDS {
            if record.get(field).is_filled() {
                *self.filled.entry(field.to_string()).or_insert(0) += 1;
            }
        }
    }

    /// Percent of records with each key field filled, one decimal
    pub fn percentages(&self) -> BTreeMap<String, f64> {
        self.filled
            .iter()
            .map(|(field, &count)| {
                let pct = if self.records == 0 {
                    0.0
                } else {
                    round_to(count as f64 / self.records as f64 * 100.0, 1)
                };
                (field.clone(), pct)
            })
            .collect()
    }
}

// ============================================================================
// NORMALIZATION COUNTERS
// ============================================================================

/// How each raw row's region text was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionResolution {
    Exact,
    Fuzzy,
    CityInferred,
    Passthrough,
    Unresolved,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationCounters {
    pub exact: usize,
    pub fuzzy: usize,
    pub city_inferred: usize,
    pub passthrough: usize,
    pub unresolved: usize,

    /// Rows that had raw region text
    pub raw_present: usize,

    /// Rows whose resolved region differs from their raw text
    pub variants_fixed: usize,
}

impl NormalizationCounters {
    pub fn record(&mut self, raw: Option<&str>, resolved: Option<&str>, how: RegionResolution) {
        match how {
            RegionResolution::Exact => self.exact += 1,
            RegionResolution::Fuzzy => self.fuzzy += 1,
            RegionResolution::CityInferred => self.city_inferred += 1,
            RegionResolution::Passthrough => self.passthrough += 1,
            RegionResolution::Unresolved => self.unresolved += 1,
        }

        if let Some(raw) = raw {
            self.raw_present += 1;
            if resolved != Some(raw) {
                self.variants_fixed += 1;
            }
        }
    }

    pub fn resolved(&self) -> usize {
        self.exact + self.fuzzy + self.city_inferred + self.passthrough
    }

    /// Rows gaining a region minus rows that had one (signed)
    pub fn net_fields_normalized(&self) -> i64 {
        self.resolved() as i64 - self.raw_present as i64
    }
}

// ============================================================================
// DATA QUALITY STATS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityStats {
    /// Rows in the raw export
    pub total_facilities: usize,

    /// Facilities after deduplication
    pub unique_facilities: usize,

    pub duplicates_found: usize,

    /// Alias of avg_completeness
    pub enrichment_rate: f64,

    pub fields_normalized: i64,
    pub region_variants_fixed: usize,

    /// Percent, one decimal
    pub avg_completeness: f64,

    pub completeness_by_region: BTreeMap<String, f64>,
    pub completeness_by_field: BTreeMap<String, f64>,

    pub normalization: NormalizationCounters,
}

impl DataQualityStats {
    pub fn compute(
        original_rows: usize,
        facilities: &[Facility],
        coverage: &FieldCoverage,
        normalization: &NormalizationCounters,
        reference: &ReferenceData,
    ) -> Self {
        let avg = mean_percent(facilities.iter().map(|f| f.data_completeness));

        let completeness_by_region = reference
            .regions()
            .iter()
            .map(|region| {
                let pct = mean_percent(
                    facilities
                        .iter()
                        .filter(|f| f.normalized_region.as_deref() == Some(region.name.as_str()))
                        .map(|f| f.data_completeness),
                );
                (region.name.clone(), pct)
            })
            .collect();

        DataQualityStats {
            total_facilities: original_rows,
            unique_facilities: facilities.len(),
            duplicates_found: original_rows.saturating_sub(facilities.len()),
            enrichment_rate: avg,
            fields_normalized: normalization.net_fields_normalized(),
            region_variants_fixed: normalization.variants_fixed,
            avg_completeness: avg,
            completeness_by_region,
            completeness_by_field: coverage.percentages(),
            normalization: normalization.clone(),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Quality: {} rows → {} facilities ({} duplicates), {:.1}% avg completeness, {} region fixes",
            self.total_facilities,
            self.unique_facilities,
            self.duplicates_found,
            self.avg_completeness,
            self.region_variants_fixed
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::RawCell;

    fn text(s: &str) -> RawCell {
        RawCell::Text(s.to_string())
    }

    #[test]
    fn test_empty_record_scores_zero() {
        assert_eq!(completeness_score(&RawRecord::new(1)), 0.0);
    }

    #[test]
    fn test_full_record_scores_one() {
        let mut record = RawRecord::new(1);
        for field in KEY_FIELDS {
            record.set(field, text("x"));
        }
        assert_eq!(completeness_score(&record), 1.0);
    }

    #[test]
    fn test_score_rounds_to_two_decimals() {
        let record = RawRecord::new(1)
            .with("name", text("Tamale Teaching Hospital"))
            .with("address_city", text("Tamale"))
            .with("specialties", RawCell::List(vec!["cardiology".to_string()]))
            // Blank text and empty lists do not count
            .with("email", text("   "))
            .with("websites", RawCell::List(vec![]));

        // 3 / 12 = 0.25
        assert_eq!(completeness_score(&record), 0.25);

        let record = record.with("description", text("Regional referral hospital"));
        // 4 / 12 = 0.333.. → 0.33
        assert_eq!(completeness_score(&record), 0.33);
    }

    #[test]
    fn test_field_coverage_percentages() {
        let mut coverage = FieldCoverage::new();
        coverage.observe(&RawRecord::new(1).with("name", text("A")));
        coverage.observe(&RawRecord::new(2).with("name", text("B")).with("email", text("b@x.gh")));
        coverage.observe(&RawRecord::new(3));

        let pct = coverage.percentages();
        assert_eq!(pct["name"], 66.7);
        assert_eq!(pct["email"], 33.3);
        assert_eq!(pct["websites"], 0.0);
        assert_eq!(pct.len(), 12);
    }

    #[test]
    fn test_normalization_counters() {
        let mut counters = NormalizationCounters::default();
        counters.record(Some("Greater Accra"), Some("Greater Accra"), RegionResolution::Exact);
        counters.record(Some("accra region"), Some("Greater Accra"), RegionResolution::Exact);
        counters.record(None, Some("Ashanti"), RegionResolution::CityInferred);
        counters.record(None, None, RegionResolution::Unresolved);

        assert_eq!(counters.exact, 2);
        assert_eq!(counters.raw_present, 2);
        assert_eq!(counters.variants_fixed, 1);
        assert_eq!(counters.resolved(), 3);
        assert_eq!(counters.net_fields_normalized(), 1);
    }

    #[test]
    fn test_stats_on_empty_dataset() {
        let reference = ReferenceData::bundled().unwrap();
        let stats = DataQualityStats::compute(
            0,
            &[],
            &FieldCoverage::new(),
            &NormalizationCounters::default(),
            &reference,
        );

        assert_eq!(stats.avg_completeness, 0.0);
        assert_eq!(stats.completeness_by_region.len(), 16);
        assert!(stats.completeness_by_region.values().all(|&v| v == 0.0));
    }

    #[test]
    fn test_stats_by_region() {
        let reference = ReferenceData::bundled().unwrap();
        let mut a = Facility::new("a", "A");
        a.normalized_region = Some("Volta".to_string());
        a.data_completeness = 0.5;
        let mut b = Facility::new("b", "B");
        b.normalized_region = Some("Volta".to_string());
        b.data_completeness = 0.25;

        let stats = DataQualityStats::compute(
            3,
            &[a, b],
            &FieldCoverage::new(),
            &NormalizationCounters::default(),
            &reference,
        );

        assert_eq!(stats.duplicates_found, 1);
        assert_eq!(stats.completeness_by_region["Volta"], 37.5);
        assert_eq!(stats.completeness_by_region["Oti"], 0.0);
        assert_eq!(stats.avg_completeness, 37.5);
    }
}
