// Facility Intelligence - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod reference;      // Static lookup tables (regions, cities, categories)
pub mod parser;         // CSV export → raw cells
pub mod entities;       // Facility + projections
pub mod deduplication;  // Natural-key merge
pub mod rules;          // Anomaly rules as data
pub mod data_quality;   // Completeness + quality stats
pub mod reconciliation; // Raw table → facilities
pub mod analytics;      // Region stats, desert matrix, reports
pub mod geospatial;     // Distance / radius / cold-spot queries
pub mod embedding;      // Embedding service client + fallback
pub mod similarity;     // Flat inner-product index
pub mod store;          // Snapshots + atomic reload
pub mod config;         // Environment configuration

// Re-export commonly used types
pub use reference::{CapabilityCategory, LatLng, ReferenceData, RegionInfo};
pub use parser::{RawCell, RawRecord, RawTable};
pub use entities::{Facility, FacilitySummary, MapPoint};
pub use deduplication::{DeduplicationEngine, DuplicateGroup};
pub use rules::{AnomalyDetector, AnomalyRule};
pub use data_quality::{DataQualityStats, RegionResolution};
pub use reconciliation::{ReconciliationEngine, ReconciliationOutput};
pub use analytics::{AnalyticsEngine, DesertMatrixEntry, DesertStatus, GapRecommendation, RegionStats};
pub use geospatial::{build_response, GeoError, GeoQuery, GeoResponse, LocationSource};
pub use embedding::{EmbedError, Embedder, EmbeddingService, FallbackEmbedder, OpenAiService};
pub use similarity::SimilarityIndex;
pub use store::{FacilityPage, FacilityQuery, FacilityStore, QueryError, SearchHit, Snapshot};
pub use config::{init_tracing, Config};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
