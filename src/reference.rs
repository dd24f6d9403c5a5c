// 🗺️ Reference Data - Static lookup tables
// Region aliases, city coordinates, region centroids and capability keywords
//
// Loaded once per process. Every key is matched case-insensitively.

use anyhow::{bail, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Reference tables compiled into the binary
const BUNDLED_REFERENCE: &str = include_str!("../data/reference.json");

/// (latitude, longitude) in decimal degrees
pub type LatLng = (f64, f64);

// ============================================================================
// TABLE ROWS
// ============================================================================

/// One canonical administrative region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionInfo {
    /// Canonical name, the join key across all analytics
    pub name: String,

    /// Estimated population (used for per-capita figures)
    pub population: u64,

    /// Approximate geographic centre
    pub centroid: LatLng,
}

/// Capability category with the keywords that evidence it in free text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityCategory {
    pub name: String,
    pub keywords: Vec<String>,
}

impl CapabilityCategory {
    /// True if any keyword occurs in `text_lower` (caller lower-cases)
    pub fn matches(&self, text_lower: &str) -> bool {
        self.keywords.iter().any(|kw| text_lower.contains(kw.as_str()))
    }
}

#[derive(Debug, Deserialize)]
struct ReferenceFile {
    national_center: LatLng,
    regions: Vec<RegionInfo>,
    region_aliases: Vec<(String, String)>,
    cities: HashMap<String, LatLng>,
    city_to_region: HashMap<String, String>,
    capability_categories: Vec<CapabilityCategory>,
}

// ============================================================================
// REFERENCE DATA
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReferenceData {
    regions: Vec<RegionInfo>,

    /// lower-cased region name → position in `regions`
    region_index: HashMap<String, usize>,

    /// (lower-cased alias, canonical region), table order is authoritative
    region_aliases: Vec<(String, String)>,

    alias_lookup: HashMap<String, String>,

    cities: HashMap<String, LatLng>,

    /// City names sorted longest first, then alphabetically
    cities_longest_first: Vec<String>,

    city_to_region: HashMap<String, String>,

    national_center: LatLng,

    categories: Vec<CapabilityCategory>,
}

impl ReferenceData {
    /// Reference tables shipped with the crate
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_REFERENCE).context("Failed to parse bundled reference data")
    }

    /// Load reference tables from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read reference file: {:?}", path.as_ref()))?;

        Self::from_json(&content)
            .with_context(|| format!("Failed to parse reference file: {:?}", path.as_ref()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: ReferenceFile = serde_json::from_str(content)?;

        if file.regions.is_empty() {
            bail!("reference data defines no regions");
        }
        if file.capability_categories.is_empty() {
            bail!("reference data defines no capability categories");
        }

        let region_index: HashMap<String, usize> = file
            .regions
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.to_lowercase(), i))
            .collect();

        let canonical = |name: &str| -> Result<String> {
            match region_index.get(&name.to_lowercase()) {
                Some(&i) => Ok(file.regions[i].name.clone()),
                None => bail!("reference data maps to unknown region '{}'", name),
            }
        };

        let mut region_aliases = Vec::with_capacity(file.region_aliases.len());
        let mut alias_lookup = HashMap::new();
        for (alias, region) in &file.region_aliases {
            let key = alias.trim().to_lowercase();
            let region = canonical(region)?;
            // First definition of an alias wins
            alias_lookup.entry(key.clone()).or_insert_with(|| region.clone());
            region_aliases.push((key, region));
        }

        let mut city_to_region = HashMap::new();
        for (city, region) in &file.city_to_region {
            city_to_region.insert(city.trim().to_lowercase(), canonical(region)?);
        }

        let cities: HashMap<String, LatLng> = file
            .cities
            .into_iter()
            .map(|(city, coords)| (city.trim().to_lowercase(), coords))
            .collect();

        let mut cities_longest_first: Vec<String> = cities.keys().cloned().collect();
        cities_longest_first.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let categories = file
            .capability_categories
            .into_iter()
            .map(|c| CapabilityCategory {
                name: c.name,
                keywords: c.keywords.into_iter().map(|k| k.to_lowercase()).collect(),
            })
            .collect();

        Ok(ReferenceData {
            regions: file.regions,
            region_index,
            region_aliases,
            alias_lookup,
            cities,
            cities_longest_first,
            city_to_region,
            national_center: file.national_center,
            categories,
        })
    }

    // ========================================================================
    // REGIONS
    // ========================================================================

    /// Canonical regions in reference order
    pub fn regions(&self) -> &[RegionInfo] {
        &self.regions
    }

    pub fn region(&self, name: &str) -> Option<&RegionInfo> {
        self.region_index
            .get(&name.trim().to_lowercase())
            .map(|&i| &self.regions[i])
    }

    pub fn region_centroid(&self, name: &str) -> Option<LatLng> {
        self.region(name).map(|r| r.centroid)
    }

    /// Alias lookup by exact (case-insensitive) key
    pub fn alias(&self, key: &str) -> Option<&str> {
        self.alias_lookup
            .get(&key.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Ordered (lower-cased alias, canonical region) pairs
    pub fn region_aliases(&self) -> &[(String, String)] {
        &self.region_aliases
    }

    // ========================================================================
    // CITIES
    // ========================================================================

    pub fn city_coords(&self, city: &str) -> Option<LatLng> {
        self.cities.get(&city.trim().to_lowercase()).copied()
    }

    pub fn city_region(&self, city: &str) -> Option<&str> {
        self.city_to_region
            .get(&city.trim().to_lowercase())
            .map(String::as_str)
    }

    /// Lower-cased city names, longest first
    pub fn cities_longest_first(&self) -> &[String] {
        &self.cities_longest_first
    }

    pub fn national_center(&self) -> LatLng {
        self.national_center
    }

    // ========================================================================
    // CAPABILITY CATEGORIES
    // ========================================================================

    pub fn capability_categories(&self) -> &[CapabilityCategory] {
        &self.categories
    }

    pub fn capability_category(&self, name: &str) -> Option<&CapabilityCategory> {
        let wanted = name.trim().to_lowercase();
        self.categories.iter().find(|c| c.name.to_lowercase() == wanted)
    }
}

// ============================================================================
// TESTS
// ============================================================================
