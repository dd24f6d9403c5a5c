// 🗄️ Facility Store - immutable snapshots behind an atomic swap
//
// A load builds a complete Snapshot without holding any lock, then swaps
// the Arc. Readers clone the Arc and never see a half-built snapshot. A
// failed load leaves the previous snapshot in place.

use crate::analytics::{
    anomaly_report, desert_summary, facility_overview, specialty_coverage, AnalyticsEngine, AnomalyReport,
    DesertMatrixEntry, DesertSummary, FacilityOverview, GapRecommendation, RegionStats, SpecialtyCoverage,
};
use crate::config::Config;
use crate::data_quality::{round_to, DataQualityStats, FieldCoverage, NormalizationCounters};
use crate::deduplication::DuplicateGroup;
use crate::embedding::{EmbedError, Embedder, FallbackEmbedder, OpenAiService};
use crate::entities::{Facility, FacilitySummary, MapPoint};
use crate::geospatial::{build_response, GeoError, GeoQuery, GeoResponse};
use crate::parser::RawTable;
use crate::reconciliation::ReconciliationEngine;
use crate::reference::ReferenceData;
use crate::similarity::SimilarityIndex;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 200;
pub const MAX_TOP_K: usize = 50;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("facility '{0}' not found")]
    FacilityNotFound(String),

    #[error("region '{0}' not found")]
    RegionNotFound(String),

    #[error("page must be >= 1 and page_size between 1 and 200")]
    InvalidPagination,

    #[error("search query must not be blank")]
    EmptyQuery,

    #[error("top_k must be between 1 and 50")]
    InvalidTopK,

    #[error("similarity index is not available")]
    IndexUnavailable,

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error(transparent)]
    Embedding(#[from] EmbedError),
}

// ============================================================================
// QUERY TYPES
// ============================================================================

/// Listing filters; every field optional, all must hold
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacilityQuery {
    /// Canonical region, case-insensitive
    pub region: Option<String>,

    /// Type code, case-insensitive
    pub facility_type: Option<String>,

    /// Case-insensitive substring of any specialty
    pub specialty: Option<String>,

    pub has_anomalies: Option<bool>,
}

impl FacilityQuery {
    pub fn matches(&self, f: &Facility) -> bool {
        if let Some(region) = &self.region {
            let hit = f
                .normalized_region
                .as_deref()
                .map_or(false, |r| r.eq_ignore_ascii_case(region));
            if !hit {
                return false;
            }
        }
        if let Some(t) = &self.facility_type {
            if !f.is_type(t) {
                return false;
            }
        }
        if let Some(specialty) = &self.specialty {
            let needle = specialty.to_lowercase();
            if !f.specialties.iter().any(|s| s.to_lowercase().contains(&needle)) {
                return false;
            }
        }
        if let Some(wanted) = self.has_anomalies {
            if f.has_anomalies() != wanted {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityPage {
    pub facilities: Vec<FacilitySummary>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDetail {
    pub region: String,
    pub stats: RegionStats,
    pub matrix: Vec<DesertMatrixEntry>,
    pub population: u64,
    pub facilities_per_100k: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesertOverview {
    pub matrix: Vec<DesertMatrixEntry>,
    pub capabilities: Vec<String>,
    pub regions: Vec<String>,
    #[serde(flatten)]
    pub summary: DesertSummary,
    pub recommendations: Vec<GapRecommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub facility: FacilitySummary,
    pub similarity_score: f32,
}

/// Per-region headline counts for region pickers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub region: String,
    pub total_facilities: usize,
    pub hospitals: usize,
    pub clinics: usize,
    pub is_medical_desert: bool,
    pub desert_gaps: Vec<String>,
}

impl From<&RegionStats> for RegionSummary {
    fn from(stats: &RegionStats) -> Self {
        RegionSummary {
            region: stats.region.clone(),
            total_facilities: stats.total_facilities,
            hospitals: stats.hospitals,
            clinics: stats.clinics,
            is_medical_desert: stats.is_medical_desert,
            desert_gaps: stats.desert_gaps.clone(),
        }
    }
}

/// Identity and headline numbers of a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub version: u64,
    pub id: Uuid,
    pub loaded_at: DateTime<Utc>,
    pub source_fingerprint: String,
    pub facilities: usize,
    pub index_ready: bool,
    pub embedding_model: Option<String>,
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Everything derived from one load; never mutated after publication
pub struct Snapshot {
    pub version: u64,
    pub id: Uuid,
    pub loaded_at: DateTime<Utc>,

    /// SHA-256 of the source bytes, hex
    pub source_fingerprint: String,

    pub facilities: Vec<Facility>,
    by_id: HashMap<String, usize>,

    pub region_stats: Vec<RegionStats>,
    pub desert_matrix: Vec<DesertMatrixEntry>,
    pub data_quality: DataQualityStats,
    pub merged_groups: Vec<DuplicateGroup>,

    similarity: Option<SimilarityIndex>,
    reference: Arc<ReferenceData>,
}

impl Snapshot {
    /// Version 0: no data yet, every region empty
    pub fn empty(reference: Arc<ReferenceData>) -> Self {
        let analytics = AnalyticsEngine::new(&reference);
        let region_stats = analytics.region_stats(&[]);
        let desert_matrix = analytics.desert_matrix(&region_stats);
        let data_quality = DataQualityStats::compute(
            0,
            &[],
            &FieldCoverage::new(),
            &NormalizationCounters::default(),
            &reference,
        );

        Snapshot {
            version: 0,
            id: Uuid::new_v4(),
            loaded_at: Utc::now(),
            source_fingerprint: String::new(),
            facilities: Vec::new(),
            by_id: HashMap::new(),
            region_stats,
            desert_matrix,
            data_quality,
            merged_groups: Vec::new(),
            similarity: None,
            reference,
        }
    }

    /// Reconcile and aggregate; no similarity index yet
    pub fn prepare<R: Rng + ?Sized>(
        version: u64,
        source: &[u8],
        reference: Arc<ReferenceData>,
        rng: &mut R,
    ) -> Result<Self> {
        let source_fingerprint = format!("{:x}", Sha256::digest(source));
        let table = RawTable::from_csv_reader(source).context("Failed to read facility CSV")?;

        let output = ReconciliationEngine::new(&reference).reconcile(table, rng);

        let analytics = AnalyticsEngine::new(&reference);
        let region_stats = analytics.region_stats(&output.facilities);
        let desert_matrix = analytics.desert_matrix(&region_stats);
        let data_quality = DataQualityStats::compute(
            output.original_rows,
            &output.facilities,
            &output.field_coverage,
            &output.normalization,
            &reference,
        );
        info!("{}", data_quality.summary());

        let by_id = output
            .facilities
            .iter()
            .enumerate()
            .map(|(i, f)| (f.unique_id.clone(), i))
            .collect();

        Ok(Snapshot {
            version,
            id: Uuid::new_v4(),
            loaded_at: Utc::now(),
            source_fingerprint,
            facilities: output.facilities,
            by_id,
            region_stats,
            desert_matrix,
            data_quality,
            merged_groups: output.merged_groups,
            similarity: None,
            reference,
        })
    }

    pub async fn attach_index(&mut self, embedder: &dyn Embedder, batch_size: usize) -> Result<(), EmbedError> {
        self.similarity = Some(SimilarityIndex::build(&self.facilities, embedder, batch_size).await?);
        Ok(())
    }

    pub fn info(&self) -> SnapshotInfo {
        SnapshotInfo {
            version: self.version,
            id: self.id,
            loaded_at: self.loaded_at,
            source_fingerprint: self.source_fingerprint.clone(),
            facilities: self.facilities.len(),
            index_ready: self.similarity.is_some(),
            embedding_model: self.similarity.as_ref().map(|s| s.model().to_string()),
        }
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    // ========================================================================
    // FACILITIES
    // ========================================================================

    pub fn get_facility(&self, id: &str) -> Result<&Facility, QueryError> {
        self.by_id
            .get(id)
            .and_then(|&i| self.facilities.get(i))
            .ok_or_else(|| QueryError::FacilityNotFound(id.to_string()))
    }

    /// Filtered listing, 1-based pages
    pub fn list_facilities(&self, query: &FacilityQuery, page: usize, page_size: usize) -> Result<FacilityPage, QueryError> {
        if page < 1 || page_size < 1 || page_size > MAX_PAGE_SIZE {
            return Err(QueryError::InvalidPagination);
        }

        let matching: Vec<&Facility> = self.facilities.iter().filter(|f| query.matches(f)).collect();
        let total = matching.len();
        let facilities = matching
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .map(FacilitySummary::from)
            .collect();

        Ok(FacilityPage {
            facilities,
            total,
            page,
            page_size,
            total_pages: (total + page_size - 1) / page_size,
        })
    }

    pub fn map_points(&self) -> Vec<MapPoint> {
        self.facilities.iter().filter_map(MapPoint::from_facility).collect()
    }

    pub fn overview(&self) -> FacilityOverview {
        facility_overview(&self.facilities)
    }

    // ========================================================================
    // ANALYTICS
    // ========================================================================

    /// Case-insensitive canonical region name
    pub fn region_stats(&self, region: &str) -> Result<&RegionStats, QueryError> {
        self.region_stats
            .iter()
            .find(|s| s.region.eq_ignore_ascii_case(region.trim()))
            .ok_or_else(|| QueryError::RegionNotFound(region.to_string()))
    }

    pub fn region_summaries(&self) -> Vec<RegionSummary> {
        self.region_stats.iter().map(RegionSummary::from).collect()
    }

    pub fn region_detail(&self, region: &str) -> Result<RegionDetail, QueryError> {
        let stats = self.region_stats(region)?;
        Ok(RegionDetail {
            region: stats.region.clone(),
            matrix: self
                .desert_matrix
                .iter()
                .filter(|e| e.region == stats.region)
                .cloned()
                .collect(),
            population: stats.population,
            facilities_per_100k: stats.facilities_per_100k,
            stats: stats.clone(),
        })
    }

    pub fn medical_deserts(&self) -> DesertOverview {
        DesertOverview {
            matrix: self.desert_matrix.clone(),
            capabilities: self
                .reference
                .capability_categories()
                .iter()
                .map(|c| c.name.clone())
                .collect(),
            regions: self.reference.regions().iter().map(|r| r.name.clone()).collect(),
            summary: desert_summary(&self.region_stats, &self.desert_matrix),
            recommendations: self.recommendations(),
        }
    }

    pub fn recommendations(&self) -> Vec<GapRecommendation> {
        AnalyticsEngine::new(&self.reference).gap_recommendations(&self.region_stats)
    }

    pub fn anomaly_report(&self) -> AnomalyReport {
        anomaly_report(&self.facilities)
    }

    pub fn specialty_coverage(&self) -> Vec<SpecialtyCoverage> {
        specialty_coverage(&self.region_stats)
    }

    pub fn geospatial(&self, query: &GeoQuery) -> Result<GeoResponse, QueryError> {
        Ok(build_response(query, &self.facilities, &self.reference)?)
    }

    // ========================================================================
    // SEARCH
    // ========================================================================

    /// Top-k facilities for a non-blank query, k in 1..=50
    pub async fn search(&self, query: &str, k: usize, embedder: &dyn Embedder) -> Result<Vec<SearchHit>, QueryError> {
        validate_search(query, k)?;
        let index = self.similarity.as_ref().ok_or(QueryError::IndexUnavailable)?;

        let hits = index.search(query, k, embedder).await?;
        Ok(hits
            .into_iter()
            .filter_map(|(id, score)| {
                let facility = self.get_facility(&id).ok()?;
                Some(SearchHit {
                    facility: FacilitySummary::from(facility),
                    similarity_score: round_to(score as f64, 4) as f32,
                })
            })
            .collect())
    }
}

fn validate_search(query: &str, k: usize) -> Result<(), QueryError> {
    if query.trim().is_empty() {
        return Err(QueryError::EmptyQuery);
    }
    if k < 1 || k > MAX_TOP_K {
        return Err(QueryError::InvalidTopK);
    }
    Ok(())
}

// ============================================================================
// FACILITY STORE
// ============================================================================

/// Single writer, many readers
pub struct FacilityStore {
    current: RwLock<Arc<Snapshot>>,
    reference: Arc<ReferenceData>,
    embedder: Option<Arc<dyn Embedder>>,
    batch_size: usize,
    versions: AtomicU64,

    /// Serializes loads so versions publish in order
    load_lock: tokio::sync::Mutex<()>,
}

impl FacilityStore {
    pub fn new(reference: Arc<ReferenceData>, embedder: Option<Arc<dyn Embedder>>, batch_size: usize) -> Self {
        FacilityStore {
            current: RwLock::new(Arc::new(Snapshot::empty(reference.clone()))),
            reference,
            embedder,
            batch_size,
            versions: AtomicU64::new(0),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Store wired to the configured reference data and embedding service
    pub fn from_config(config: &Config) -> Result<Self> {
        let reference = Arc::new(config.load_reference()?);

        let embedder: Option<Arc<dyn Embedder>> = match &config.openai_api_key {
            Some(key) => Some(Arc::new(FallbackEmbedder::new(
                OpenAiService::new(key.clone(), &config.embedding_api_base),
                &config.embedding_model,
            ))),
            None => {
                warn!("OPENAI_API_KEY not set; semantic search disabled");
                None
            }
        };

        Ok(Self::new(reference, embedder, config.embedding_batch_size))
    }

    /// Current snapshot; cheap to clone and safe to hold across awaits
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub async fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<Arc<Snapshot>> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read facility CSV: {:?}", path))?;
        info!("Loading facilities from {:?} ({} bytes)", path, bytes.len());
        self.load_bytes(&bytes).await
    }

    pub async fn load_bytes(&self, source: &[u8]) -> Result<Arc<Snapshot>> {
        let mut rng = StdRng::from_entropy();
        self.load_with_rng(source, &mut rng).await
    }

    /// Build and publish a new snapshot; on error the old one stays
    pub async fn load_with_rng<R: Rng + Send + ?Sized>(&self, source: &[u8], rng: &mut R) -> Result<Arc<Snapshot>> {
        let _guard = self.load_lock.lock().await;
        let version = self.versions.load(Ordering::SeqCst) + 1;

        // Reconciliation runs on the blocking pool, seeded from `rng`
        let mut build_rng = StdRng::seed_from_u64(rng.gen());
        let source = source.to_vec();
        let reference = self.reference.clone();
        let mut snapshot = tokio::task::spawn_blocking(move || {
            Snapshot::prepare(version, &source, reference, &mut build_rng)
        })
        .await
        .context("Snapshot build task failed")??;
        if let Some(embedder) = &self.embedder {
            snapshot
                .attach_index(embedder.as_ref(), self.batch_size)
                .await
                .context("Failed to build similarity index")?;
        }

        let snapshot = Arc::new(snapshot);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = snapshot.clone();
        self.versions.store(version, Ordering::SeqCst);

        info!(
            "Published snapshot v{} ({} facilities, fingerprint {})",
            version,
            snapshot.facilities.len(),
            &snapshot.source_fingerprint[..12]
        );
        Ok(snapshot)
    }

    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, QueryError> {
        validate_search(query, k)?;
        let embedder = self.embedder.as_ref().ok_or(QueryError::IndexUnavailable)?;
        let snapshot = self.snapshot();
        snapshot.search(query, k, embedder.as_ref()).await
    }
}

// ============================================================================
// TESTS
// ============================================================================
