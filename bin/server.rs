// Facility Intelligence - Web Server
// REST API over the current snapshot, with atomic reload

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use facility_intel::analytics::{AnomalyReport, FacilityOverview, SpecialtyCoverage};
use facility_intel::store::{DesertOverview, RegionDetail, RegionSummary, SnapshotInfo, DEFAULT_PAGE_SIZE};
use facility_intel::{
    init_tracing, Config, DataQualityStats, Facility, FacilityPage, FacilityQuery, FacilityStore, GeoQuery,
    GeoResponse, MapPoint, QueryError, RegionStats, SearchHit,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const DEFAULT_TOP_K: usize = 10;

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<FacilityStore>,
    csv_path: Arc<PathBuf>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn error(message: String) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message),
        }
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

/// Status code + message, rendered in the same envelope
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        let status = match &e {
            QueryError::FacilityNotFound(_) | QueryError::RegionNotFound(_) => StatusCode::NOT_FOUND,
            QueryError::InvalidPagination
            | QueryError::EmptyQuery
            | QueryError::InvalidTopK
            | QueryError::Geo(_) => StatusCode::BAD_REQUEST,
            QueryError::IndexUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            QueryError::Embedding(_) => StatusCode::BAD_GATEWAY,
        };
        ApiError {
            status,
            message: e.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{:#}", e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{}", self.message);
        }
        (self.status, Json(ApiResponse::error(self.message))).into_response()
    }
}

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListParams {
    region: Option<String>,
    #[serde(rename = "type")]
    facility_type: Option<String>,
    specialty: Option<String>,
    has_anomalies: Option<bool>,
    page: Option<usize>,
    page_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: String,
    top_k: Option<usize>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check with snapshot identity
async fn health_check(State(state): State<AppState>) -> ApiResult<SnapshotInfo> {
    ok(state.store.snapshot().info())
}

/// GET /api/facilities - Filtered, paginated listing
async fn list_facilities(State(state): State<AppState>, Query(params): Query<ListParams>) -> ApiResult<FacilityPage> {
    let query = FacilityQuery {
        region: params.region,
        facility_type: params.facility_type,
        specialty: params.specialty,
        has_anomalies: params.has_anomalies,
    };
    let page = state.store.snapshot().list_facilities(
        &query,
        params.page.unwrap_or(1),
        params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    )?;
    ok(page)
}

/// GET /api/facilities/stats
async fn facility_stats(State(state): State<AppState>) -> ApiResult<FacilityOverview> {
    ok(state.store.snapshot().overview())
}

/// GET /api/facilities/search?q=...&top_k=...
async fn search_facilities(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Vec<SearchHit>> {
    let hits = state
        .store
        .search(&params.q, params.top_k.unwrap_or(DEFAULT_TOP_K))
        .await?;
    ok(hits)
}

/// GET /api/facilities/regions - Per-region counts and desert flags
async fn facility_regions(State(state): State<AppState>) -> ApiResult<Vec<RegionSummary>> {
    ok(state.store.snapshot().region_summaries())
}

/// GET /api/facilities/map
async fn map_points(State(state): State<AppState>) -> ApiResult<Vec<MapPoint>> {
    ok(state.store.snapshot().map_points())
}

/// GET /api/facilities/:id
async fn get_facility(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Facility> {
    let snapshot = state.store.snapshot();
    let facility = snapshot.get_facility(&id)?.clone();
    ok(facility)
}

/// GET /api/analysis/medical-deserts
async fn medical_deserts(State(state): State<AppState>) -> ApiResult<DesertOverview> {
    ok(state.store.snapshot().medical_deserts())
}

/// GET /api/analysis/medical-deserts/:region
async fn region_deserts(State(state): State<AppState>, Path(region): Path<String>) -> ApiResult<RegionDetail> {
    ok(state.store.snapshot().region_detail(&region)?)
}

/// GET /api/analysis/anomalies
async fn anomalies(State(state): State<AppState>) -> ApiResult<AnomalyReport> {
    ok(state.store.snapshot().anomaly_report())
}

/// GET /api/analysis/data-quality
async fn data_quality(State(state): State<AppState>) -> ApiResult<DataQualityStats> {
    ok(state.store.snapshot().data_quality.clone())
}

/// GET /api/analysis/region-stats
async fn region_stats(State(state): State<AppState>) -> ApiResult<Vec<RegionStats>> {
    ok(state.store.snapshot().region_stats.clone())
}

/// GET /api/analysis/specialty-coverage
async fn specialty_coverage(State(state): State<AppState>) -> ApiResult<Vec<SpecialtyCoverage>> {
    ok(state.store.snapshot().specialty_coverage())
}

/// POST /api/geospatial
async fn geospatial(State(state): State<AppState>, Json(query): Json<GeoQuery>) -> ApiResult<GeoResponse> {
    ok(state.store.snapshot().geospatial(&query)?)
}

/// POST /api/reload - Re-read the CSV; the old snapshot stays on failure
async fn reload(State(state): State<AppState>) -> ApiResult<SnapshotInfo> {
    match state.store.load_path(state.csv_path.as_path()).await {
        Ok(snapshot) => ok(snapshot.info()),
        Err(e) => {
            warn!("Reload failed, keeping snapshot v{}", state.store.snapshot().version);
            Err(e.into())
        }
    }
}

// ============================================================================
// Main Server
// ============================================================================

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/facilities", get(list_facilities))
        .route("/facilities/stats", get(facility_stats))
        .route("/facilities/search", get(search_facilities))
        .route("/facilities/map", get(map_points))
        .route("/facilities/regions", get(facility_regions))
        .route("/facilities/:id", get(get_facility))
        .route("/analysis/medical-deserts", get(medical_deserts))
        .route("/analysis/medical-deserts/:region", get(region_deserts))
        .route("/analysis/anomalies", get(anomalies))
        .route("/analysis/data-quality", get(data_quality))
        .route("/analysis/region-stats", get(region_stats))
        .route("/analysis/specialty-coverage", get(specialty_coverage))
        .route("/geospatial", post(geospatial))
        .route("/reload", post(reload))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(None)?;
    info!("🌐 Facility Intelligence - Web Server v{}", facility_intel::VERSION);

    let config = Config::from_env()?;
    let store = Arc::new(FacilityStore::from_config(&config)?);
    store.load_path(&config.csv_path).await?;

    let state = AppState {
        store,
        csv_path: Arc::new(config.csv_path.clone()),
    };

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("🚀 Server running on http://{}/api", addr);

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;
    Ok(())
}
