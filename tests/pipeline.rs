// 🧪 End-to-end pipeline: CSV on disk → snapshot → queries → reload

use async_trait::async_trait;
use facility_intel::embedding::{EmbeddingData, DEFAULT_EMBEDDING_MODEL};
use facility_intel::{
    EmbedError, Embedder, EmbeddingService, FacilityQuery, FacilityStore, FallbackEmbedder, GeoError, GeoQuery,
    QueryError, ReferenceData,
};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

const HEADER: &str = "pk_unique_id,name,facilityTypeId,address_city,address_stateOrRegion,specialties,capability,procedure,numberDoctors,capacity,description";

const ROWS: &[&str] = &[
    r#"1,Korle Bu Teaching Hospital,hospital,Accra,Greater Accra Region,"[""generalSurgery"",""cardiology""]","[""Emergency department"",""Operating theatre""]","[""Open heart surgery""]",300,2000,"#,
    r#"1,Korle-Bu Teaching Hospital Accra,hospital,Accra,Greater Accra,"[""pediatrics""]","[""Cardiac ICU""]",[],,,"Largest referral hospital""#,
    r#"2,Tamale Teaching Hospital,hospital,Tamale,Northern Region,"[""generalSurgery""]","[""Surgical theatre"",""Maternity ward""]",[],120,800,"#,
    r#"3,Bolga Dental Clinic,dentist,Bolgatanga,Upper East,"[""dentistry""]","[""Dental x-ray""]",[],2,,"#,
    r#"4,Kasoa Community Clinic,clinic,Kasoa,,[],"[""Laboratory services""]",[],,,"#,
];

/// Knows only the default model; vectors are keyword counts
struct KeywordService {
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl EmbeddingService for KeywordService {
    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<EmbeddingData>, EmbedError> {
        self.calls.lock().unwrap().push(model.to_string());
        if model != DEFAULT_EMBEDDING_MODEL {
            return Err(EmbedError::UnknownModel(model.to_string()));
        }
        Ok(inputs
            .iter()
            .enumerate()
            .map(|(index, text)| {
                let text = text.to_lowercase();
                let embedding = ["dent", "surg", "cardi", "lab"]
                    .iter()
                    .map(|kw| text.matches(kw).count() as f32)
                    .collect();
                EmbeddingData { embedding, index }
            })
            .collect())
    }
}

fn create_test_csv(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for row in rows {
        writeln!(file, "{}", row).unwrap();
    }
    file.flush().unwrap();
    file
}

fn create_test_store(embedder: Option<Arc<dyn Embedder>>) -> FacilityStore {
    FacilityStore::new(Arc::new(ReferenceData::bundled().unwrap()), embedder, 2)
}

#[tokio::test]
async fn test_load_reconciles_and_aggregates() {
    let csv = create_test_csv(ROWS);
    let store = create_test_store(None);

    let snapshot = store.load_path(csv.path()).await.unwrap();
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.data_quality.total_facilities, 5);
    assert_eq!(snapshot.data_quality.unique_facilities, 4);
    assert_eq!(snapshot.data_quality.duplicates_found, 1);

    let korle_bu = snapshot.get_facility("1").unwrap();
    assert_eq!(korle_bu.name, "Korle-Bu Teaching Hospital Accra");
    assert_eq!(korle_bu.specialties, vec!["generalSurgery", "cardiology", "pediatrics"]);
    assert_eq!(korle_bu.number_doctors, Some(300));
    assert_eq!(korle_bu.normalized_region.as_deref(), Some("Greater Accra"));

    // Blank region resolved through the city table
    let kasoa = snapshot.get_facility("4").unwrap();
    assert_eq!(kasoa.normalized_region.as_deref(), Some("Central"));

    let northern = snapshot.region_stats("northern").unwrap();
    assert_eq!(northern.total_facilities, 1);
    assert_eq!(northern.coverage("Surgery"), 1);
    assert_eq!(northern.coverage("Maternal/Obstetric"), 1);

    let page = snapshot
        .list_facilities(
            &FacilityQuery {
                facility_type: Some("HOSPITAL".to_string()),
                ..FacilityQuery::default()
            },
            1,
            10,
        )
        .unwrap();
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn test_deserts_and_geospatial() {
    let csv = create_test_csv(ROWS);
    let store = create_test_store(None);
    let snapshot = store.load_path(csv.path()).await.unwrap();

    let deserts = snapshot.medical_deserts();
    assert_eq!(deserts.matrix.len(), 16 * 10);
    assert!(deserts.summary.critical_regions.contains(&"Ashanti".to_string()));
    assert!(deserts.summary.total_critical_gaps > 0);

    let accra = snapshot.region_detail("Greater Accra").unwrap();
    let surgery = accra.matrix.iter().find(|e| e.capability == "Surgery").unwrap();
    assert_eq!(surgery.facility_count, 1);

    let response = snapshot
        .geospatial(&GeoQuery::from_message("hospitals with surgery within 100km of Tamale"))
        .unwrap();
    assert_eq!(response.location.label, "Tamale");
    assert_eq!(response.radius_km, Some(100.0));
    assert_eq!(response.within_radius.len(), 1);
    assert_eq!(response.within_radius[0].unique_id, "2");
    assert!(response.nearest.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));

    let accra = snapshot
        .geospatial(&GeoQuery::from_message("within 50km of Accra"))
        .unwrap();
    assert_eq!(Some(accra.location.coords), snapshot.reference().city_coords("accra"));
    assert_eq!(accra.radius_km, Some(50.0));
    assert_eq!(accra.time_hours, None);
    // Korle Bu (Accra) and Kasoa are both within 50 km
    assert_eq!(accra.within_radius.len(), 2);

    let err = snapshot
        .geospatial(&GeoQuery::from_message("clinics near the moon"))
        .unwrap_err();
    assert!(matches!(err, QueryError::Geo(GeoError::LocationNotFound(_))));
}

#[tokio::test]
async fn test_search_falls_back_to_default_model() {
    let csv = create_test_csv(ROWS);
    let service = KeywordService {
        calls: Mutex::new(Vec::new()),
    };
    let embedder = Arc::new(FallbackEmbedder::new(service, "text-embedding-retired"));
    let store = create_test_store(Some(embedder.clone()));

    let snapshot = store.load_path(csv.path()).await.unwrap();
    let info = snapshot.info();
    assert!(info.index_ready);
    assert_eq!(info.embedding_model.as_deref(), Some(DEFAULT_EMBEDDING_MODEL));
    assert_eq!(embedder.model_name(), DEFAULT_EMBEDDING_MODEL);

    let hits = store.search("dentist", 3).await.unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].facility.unique_id, "3");
    assert!(hits.windows(2).all(|w| w[0].similarity_score >= w[1].similarity_score));
}

#[tokio::test]
async fn test_reload_swaps_snapshot_and_keeps_it_on_failure() {
    let csv = create_test_csv(ROWS);
    let store = create_test_store(None);
    store.load_path(csv.path()).await.unwrap();

    let smaller = create_test_csv(&ROWS[2..]);
    let held = store.snapshot();
    let reloaded = store.load_path(smaller.path()).await.unwrap();

    assert_eq!(reloaded.version, 2);
    assert_eq!(reloaded.facilities.len(), 3);
    assert_ne!(reloaded.source_fingerprint, held.source_fingerprint);
    // Readers holding the old Arc keep a consistent view
    assert_eq!(held.facilities.len(), 4);

    let missing = csv.path().with_extension("missing");
    assert!(store.load_path(&missing).await.is_err());
    assert_eq!(store.snapshot().version, 2);
}
