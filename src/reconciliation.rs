// ⚖️ Reconciliation Engine - raw export → canonical facility collection
//
// Order per load:
//   decode list columns + normalize region (per raw row) → deduplicate → coerce fields →
//   geocode → completeness → anomalies
//
// Every step degrades instead of failing: unknown regions pass through,
// unknown cities fall back to region centroids, malformed numbers become None.

use crate::data_quality::{
    completeness_score, FieldCoverage, NormalizationCounters, RegionResolution,
};
use crate::deduplication::{DeduplicationEngine, DuplicateGroup};
use crate::entities::{Facility, UNKNOWN_FACILITY_NAME};
use crate::parser::{as_int, RawCell, RawRecord, RawTable, JSON_ARRAY_COLUMNS};
use crate::reference::{LatLng, ReferenceData};
use crate::rules::AnomalyDetector;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Column added to each raw row holding its resolved region
pub const NORMALIZED_REGION_COLUMN: &str = "normalized_region";

/// Jitter (degrees) applied per geocoding tier
pub const CITY_JITTER_DEG: f64 = 0.01;
pub const REGION_JITTER_DEG: f64 = 0.05;
pub const NATIONAL_JITTER_DEG: f64 = 0.1;

// ============================================================================
// GEOCODE RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeSource {
    City,
    RegionCentroid,
    NationalCenter,
}

impl GeocodeSource {
    pub fn jitter(&self) -> f64 {
        match self {
            GeocodeSource::City => CITY_JITTER_DEG,
            GeocodeSource::RegionCentroid => REGION_JITTER_DEG,
            GeocodeSource::NationalCenter => NATIONAL_JITTER_DEG,
        }
    }
}

// ============================================================================
// RECONCILIATION OUTPUT
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReconciliationOutput {
    /// One facility per distinct natural key, first-occurrence order
    pub facilities: Vec<Facility>,

    /// Rows in the raw export
    pub original_rows: usize,

    pub merged_groups: Vec<DuplicateGroup>,
    pub normalization: NormalizationCounters,
    pub field_coverage: FieldCoverage,
}

impl ReconciliationOutput {
    pub fn duplicates_removed(&self) -> usize {
        self.original_rows - self.facilities.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "Reconciled {} rows into {} facilities ({} duplicate groups, {} regions resolved, {} anomalies)",
            self.original_rows,
            self.facilities.len(),
            self.merged_groups.len(),
            self.normalization.resolved(),
            self.facilities.iter().map(|f| f.anomalies.len()).sum::<usize>()
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine<'r> {
    reference: &'r ReferenceData,
    dedup: DeduplicationEngine,
    detector: AnomalyDetector,
}

impl<'r> ReconciliationEngine<'r> {
    pub fn new(reference: &'r ReferenceData) -> Self {
        ReconciliationEngine {
            reference,
            dedup: DeduplicationEngine::new(),
            detector: AnomalyDetector::new(),
        }
    }

    /// Replace the anomaly rule table
    pub fn with_detector(mut self, detector: AnomalyDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Run the whole pass over a raw table
    pub fn reconcile<R: Rng + ?Sized>(&self, table: RawTable, rng: &mut R) -> ReconciliationOutput {
        let original_rows = table.len();
        info!("Reconciling {} raw rows ({} columns)", original_rows, table.columns.len());

        // 1. Region normalization happens before merging so the merged
        //    record can keep the most specific resolved region
        let mut normalization = NormalizationCounters::default();
        let mut rows = table.rows;
        for row in rows.iter_mut() {
            row.decode_lists(&JSON_ARRAY_COLUMNS);

            let raw = row.text("address_stateOrRegion");
            let city = row.text("address_city");
            let (resolved, how) = self.normalize_region(raw.as_deref(), city.as_deref());

            normalization.record(raw.as_deref(), resolved.as_deref(), how);
            let cell = resolved.map(RawCell::Text).unwrap_or(RawCell::Missing);
            row.set(NORMALIZED_REGION_COLUMN, cell);
        }
        debug!("Region normalization: {:?}", normalization);

        // 2. Deduplicate by natural key
        let deduped = self.dedup.deduplicate(rows);
        info!(
            "Deduplicated {} rows into {} records ({} merged groups)",
            deduped.input_rows,
            deduped.records.len(),
            deduped.merged_groups.len()
        );

        // 3-6. Build facilities
        let mut field_coverage = FieldCoverage::new();
        let mut facilities = Vec::with_capacity(deduped.records.len());
        for (key, record) in &deduped.records {
            field_coverage.observe(record);
            facilities.push(self.build_facility(key, record, rng));
        }

        let output = ReconciliationOutput {
            facilities,
            original_rows,
            merged_groups: deduped.merged_groups,
            normalization,
            field_coverage,
        };
        info!("{}", output.summary());
        output
    }

    // ========================================================================
    // REGION NORMALIZATION
    // ========================================================================

    /// exact alias > substring alias (table order) > city inference > raw > None
    pub fn normalize_region(
        &self,
        raw_region: Option<&str>,
        city: Option<&str>,
    ) -> (Option<String>, RegionResolution) {
        let raw = raw_region.map(str::trim).filter(|r| !r.is_empty());

        if let Some(raw) = raw {
            let key = raw.to_lowercase();

            if let Some(region) = self.reference.alias(&key) {
                return (Some(region.to_string()), RegionResolution::Exact);
            }

            // Overlapping aliases resolve to whichever appears first in the table
            for (alias, region) in self.reference.region_aliases() {
                if alias.is_empty() {
                    continue;
                }
                if key.contains(alias.as_str()) || alias.contains(key.as_str()) {
                    return (Some(region.clone()), RegionResolution::Fuzzy);
                }
            }
        }

        if let Some(region) = city
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .and_then(|c| self.reference.city_region(c))
        {
            return (Some(region.to_string()), RegionResolution::CityInferred);
        }

        match raw {
            Some(raw) => (Some(raw.to_string()), RegionResolution::Passthrough),
            None => (None, RegionResolution::Unresolved),
        }
    }

    // ========================================================================
    // GEOCODING
    // ========================================================================

    /// Approximate coordinates: city table → region centroid → national centre
    pub fn geocode<R: Rng + ?Sized>(
        &self,
        city: Option<&str>,
        region: Option<&str>,
        rng: &mut R,
    ) -> (LatLng, GeocodeSource) {
        let (base, source) = if let Some(coords) = city.and_then(|c| self.reference.city_coords(c)) {
            (coords, GeocodeSource::City)
        } else if let Some(coords) = region.and_then(|r| self.reference.region_centroid(r)) {
            (coords, GeocodeSource::RegionCentroid)
        } else {
            (self.reference.national_center(), GeocodeSource::NationalCenter)
        };

        let jitter = source.jitter();
        let lat = base.0 + rng.gen_range(-jitter..=jitter);
        let lng = base.1 + rng.gen_range(-jitter..=jitter);
        ((lat, lng), source)
    }

    // ========================================================================
    // FACILITY CONSTRUCTION
    // ========================================================================

    fn build_facility<R: Rng + ?Sized>(&self, key: &str, record: &RawRecord, rng: &mut R) -> Facility {
        let clean_list = |column: &str| -> Vec<String> {
            record
                .list(column)
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        };

        let address_city = record.text("address_city");
        let normalized_region = record.text(NORMALIZED_REGION_COLUMN);
        let ((lat, lng), _) = self.geocode(address_city.as_deref(), normalized_region.as_deref(), rng);

        let mut facility = Facility {
            unique_id: key.to_string(),
            content_table_id: record.text("content_table_id"),
            name: record
                .text("name")
                .unwrap_or_else(|| UNKNOWN_FACILITY_NAME.to_string()),
            facility_type: record.text("facilityTypeId"),
            operator_type: record.text("operatorTypeId"),
            description: record.text("description"),
            specialties: clean_list("specialties"),
            capabilities: clean_list("capability"),
            procedures: clean_list("procedure"),
            equipment: clean_list("equipment"),
            address_city,
            address_region: record.text("address_stateOrRegion"),
            address_country: "Ghana".to_string(),
            phone_numbers: clean_list("phone_numbers"),
            email: record.text("email"),
            websites: clean_list("websites"),
            year_established: as_int(record.get("yearEstablished")),
            number_doctors: as_int(record.get("numberDoctors")),
            capacity: as_int(record.get("capacity")),
            lat: Some(lat),
            lng: Some(lng),
            data_completeness: completeness_score(record),
            anomalies: Vec::new(),
            normalized_region,
        };

        facility.anomalies = self.detector.detect(&facility);
        facility
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn reference() -> ReferenceData {
        ReferenceData::bundled().unwrap()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn table(csv: &str) -> RawTable {
        RawTable::from_csv_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_region_exact_match() {
        let reference = reference();
        let engine = ReconciliationEngine::new(&reference);

        let (region, how) = engine.normalize_region(Some(" Greater ACCRA "), None);
        assert_eq!(region.as_deref(), Some("Greater Accra"));
        assert_eq!(how, RegionResolution::Exact);
    }

    #[test]
    fn test_region_fuzzy_match_first_wins() {
        let reference = reference();
        let engine = ReconciliationEngine::new(&reference);

        // "volta region, ghana" contains the alias "volta region"
        let (region, how) = engine.normalize_region(Some("Volta Region, Ghana"), None);
        assert_eq!(region.as_deref(), Some("Volta"));
        assert_eq!(how, RegionResolution::Fuzzy);

        // Alias contains the key
        let (region, _) = engine.normalize_region(Some("Ashan"), None);
        assert_eq!(region.as_deref(), Some("Ashanti"));
    }

    #[test]
    fn test_region_inferred_from_city() {
        let reference = reference();
        let engine = ReconciliationEngine::new(&reference);

        let (region, how) = engine.normalize_region(None, Some("Tamale"));
        assert_eq!(region.as_deref(), Some("Northern"));
        assert_eq!(how, RegionResolution::CityInferred);

        // Unmatched region text still falls back to the city
        let (region, how) = engine.normalize_region(Some("Zzz"), Some("Bolgatanga"));
        assert_eq!(region.as_deref(), Some("Upper East"));
        assert_eq!(how, RegionResolution::CityInferred);
    }

    #[test]
    fn test_region_passthrough_and_null() {
        let reference = reference();
        let engine = ReconciliationEngine::new(&reference);

        let (region, how) = engine.normalize_region(Some("Lomé Prefecture"), Some("Lomé"));
        assert_eq!(region.as_deref(), Some("Lomé Prefecture"));
        assert_eq!(how, RegionResolution::Passthrough);

        let (region, how) = engine.normalize_region(Some("   "), None);
        assert_eq!(region, None);
        assert_eq!(how, RegionResolution::Unresolved);
    }

    #[test]
    fn test_geocode_tiers_and_jitter_bounds() {
        let reference = reference();
        let engine = ReconciliationEngine::new(&reference);
        let mut rng = rng();

        let accra = reference.city_coords("accra").unwrap();
        for _ in 0..50 {
            let ((lat, lng), source) = engine.geocode(Some("Accra"), Some("Greater Accra"), &mut rng);
            assert_eq!(source, GeocodeSource::City);
            assert!((lat - accra.0).abs() <= CITY_JITTER_DEG);
            assert!((lng - accra.1).abs() <= CITY_JITTER_DEG);
        }

        let centroid = reference.region_centroid("Oti").unwrap();
        let ((lat, _), source) = engine.geocode(Some("Nowhere"), Some("Oti"), &mut rng);
        assert_eq!(source, GeocodeSource::RegionCentroid);
        assert!((lat - centroid.0).abs() <= REGION_JITTER_DEG);

        let center = reference.national_center();
        let ((lat, lng), source) = engine.geocode(None, Some("Atlantis"), &mut rng);
        assert_eq!(source, GeocodeSource::NationalCenter);
        assert!((lat - center.0).abs() <= NATIONAL_JITTER_DEG);
        assert!((lng - center.1).abs() <= NATIONAL_JITTER_DEG);
    }

    #[test]
    fn test_reconcile_merges_and_scores() {
        let reference = reference();
        let engine = ReconciliationEngine::new(&reference);
        let csv = "pk_unique_id,name,facilityTypeId,address_city,address_stateOrRegion,capability,equipment,numberDoctors\n\
                   1,Ridge Clinic,clinic,Accra,Greater Accra,\"[\"\"general surgery available\"\"]\",,3.0\n\
                   1,Ridge Clinic Accra,clinic,Accra,,\"[\"\"antenatal care\"\"]\",,abc\n\
                   2,Tamale Hospital,hospital,Tamale,northern region,,\"[\"\"X-ray\"\"]\",\n";

        let output = engine.reconcile(table(csv), &mut rng());

        assert_eq!(output.original_rows, 3);
        assert_eq!(output.facilities.len(), 2);
        assert_eq!(output.duplicates_removed(), 1);

        let ridge = &output.facilities[0];
        assert_eq!(ridge.unique_id, "1");
        assert_eq!(ridge.name, "Ridge Clinic Accra");
        assert_eq!(ridge.normalized_region.as_deref(), Some("Greater Accra"));
        let mut caps = ridge.capabilities.clone();
        caps.sort();
        assert_eq!(caps, vec!["antenatal care", "general surgery available"]);
        // "3.0" and "abc" tie on length; the first row wins
        assert_eq!(ridge.number_doctors, Some(3));
        assert_eq!(ridge.anomalies, vec!["Clinic claims surgical capabilities - verify"]);

        let tamale = &output.facilities[1];
        assert_eq!(tamale.normalized_region.as_deref(), Some("Northern"));
        assert_eq!(tamale.equipment, vec!["X-ray"]);
        assert!(tamale.lat.is_some() && tamale.lng.is_some());
        // name, city, region, type, equipment → 5/12
        assert_eq!(tamale.data_completeness, 0.42);
    }

    #[test]
    fn test_missing_name_gets_placeholder() {
        let reference = reference();
        let engine = ReconciliationEngine::new(&reference);

        let output = engine.reconcile(table("pk_unique_id,name\n9,\n"), &mut rng());

        assert_eq!(output.facilities[0].name, UNKNOWN_FACILITY_NAME);
        assert_eq!(output.facilities[0].data_completeness, 0.0);
    }

    #[test]
    fn test_completeness_always_in_unit_range() {
        let reference = reference();
        let engine = ReconciliationEngine::new(&reference);
        let csv = "pk_unique_id,name,address_city,email,websites\n\
                   1,A,Ho,a@b.gh,\"[\"\"a.gh\"\"]\"\n\
                   2,,,,\n\
                   3,C,,,[]\n";

        let output = engine.reconcile(table(csv), &mut rng());

        for f in &output.facilities {
            assert!((0.0..=1.0).contains(&f.data_completeness));
        }
        assert_eq!(output.field_coverage.records, 3);
        assert_eq!(output.field_coverage.filled["websites"], 1);
    }
}
