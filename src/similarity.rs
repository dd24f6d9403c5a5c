// 🔎 Similarity Index - exact inner-product search over facility documents
//
// Vectors are L2-normalized before insertion and at query time, so the
// inner product is cosine similarity.

use crate::embedding::{EmbedError, Embedder, Embedding};
use crate::entities::Facility;
use tracing::info;

pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Items kept from each list section of a document
const LIST_SECTION_LIMIT: usize = 20;
const DESCRIPTION_CHAR_LIMIT: usize = 500;

// ============================================================================
// DOCUMENTS
// ============================================================================

/// Searchable text for one facility; empty sections are omitted
pub fn facility_document(f: &Facility) -> String {
    let mut parts = vec![
        format!("Name: {}", f.name),
        format!("Type: {}", f.facility_type.as_deref().unwrap_or("Unknown")),
        format!(
            "Location: {}, {}",
            f.address_city.as_deref().unwrap_or(""),
            f.display_region().unwrap_or("")
        ),
    ];

    if !f.specialties.is_empty() {
        parts.push(format!("Specialties: {}", f.specialties.join(", ")));
    }

    let sections = [
        ("Capabilities", &f.capabilities),
        ("Procedures", &f.procedures),
        ("Equipment", &f.equipment),
    ];
    for (label, items) in sections {
        if !items.is_empty() {
            let head: Vec<&str> = items.iter().take(LIST_SECTION_LIMIT).map(String::as_str).collect();
            parts.push(format!("{}: {}", label, head.join(", ")));
        }
    }

    if let Some(description) = f.description.as_deref().filter(|d| !d.is_empty()) {
        let head: String = description.chars().take(DESCRIPTION_CHAR_LIMIT).collect();
        parts.push(format!("Description: {}", head));
    }

    parts.join(" | ")
}

/// Scale to unit length; zero vectors stay zero
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

// ============================================================================
// FLAT INDEX
// ============================================================================

/// Row-major vectors of one fixed dimension
#[derive(Debug, Clone, Default)]
pub struct FlatIpIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIpIndex {
    pub fn new(dim: usize) -> Self {
        FlatIpIndex { dim, data: Vec::new() }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<(), EmbedError> {
        if vector.len() != self.dim {
            return Err(EmbedError::Malformed(format!(
                "vector dimension {} does not match index dimension {}",
                vector.len(),
                self.dim
            )));
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Top-k (position, score), descending score; ties keep insertion order
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, EmbedError> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(EmbedError::Malformed(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dim
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(i, row)| (i, row.iter().zip(query).map(|(a, b)| a * b).sum()))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }
}

// ============================================================================
// SIMILARITY INDEX
// ============================================================================

pub struct SimilarityIndex {
    index: FlatIpIndex,

    /// Position → facility id
    ids: Vec<String>,

    /// Model that produced the stored vectors
    model: String,
}

impl SimilarityIndex {
    /// Embed every facility document in fixed-size batches
    ///
    /// Any embedding failure aborts the build.
    pub async fn build(
        facilities: &[Facility],
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self, EmbedError> {
        let documents: Vec<String> = facilities.iter().map(facility_document).collect();
        let ids: Vec<String> = facilities.iter().map(|f| f.unique_id.clone()).collect();

        let mut vectors: Vec<Embedding> = Vec::with_capacity(documents.len());
        for batch in documents.chunks(batch_size.max(1)) {
            let embedded = embedder.embed(batch).await?;
            if embedded.len() != batch.len() {
                return Err(EmbedError::Malformed(format!(
                    "expected {} embeddings for batch, got {}",
                    batch.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
        }
        if vectors.len() != ids.len() {
            return Err(EmbedError::Malformed(format!(
                "expected {} embeddings, got {}",
                ids.len(),
                vectors.len()
            )));
        }

        let dim = vectors.first().map_or(0, Vec::len);
        let mut index = FlatIpIndex::new(dim);
        for mut v in vectors {
            l2_normalize(&mut v);
            index.add(&v)?;
        }

        let model = embedder.model_name();
        info!(
            "Built similarity index: {} facilities, dim {}, model {}",
            index.len(),
            dim,
            model
        );

        Ok(SimilarityIndex { index, ids, model })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// (facility id, score) for the k most similar facilities
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<(String, f32)>, EmbedError> {
        let k = k.min(self.ids.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut vectors = embedder.embed(&[query.to_string()]).await?;
        let mut q = vectors
            .pop()
            .ok_or_else(|| EmbedError::Malformed("no embedding for query".to_string()))?;
        l2_normalize(&mut q);

        Ok(self
            .index
            .search(&q, k)?
            .into_iter()
            .filter_map(|(pos, score)| self.ids.get(pos).map(|id| (id.clone(), score)))
            .collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const VOCAB: [&str; 4] = ["cardio", "dental", "maternity", "surgery"];

    /// Bag-of-keywords vectors; counts calls
    struct KeywordEmbedder {
        calls: AtomicUsize,
    }

    impl KeywordEmbedder {
        fn new() -> Self {
            KeywordEmbedder {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    VOCAB
                        .iter()
                        .map(|kw| t.matches(kw).count() as f32)
                        .collect()
                })
                .collect())
        }

        fn model_name(&self) -> String {
            "keywords".to_string()
        }
    }

    fn create_test_facility(id: &str, caps: &[&str]) -> Facility {
        let mut f = Facility::new(id, &format!("Facility {}", id));
        f.capabilities = caps.iter().map(|c| c.to_string()).collect();
        f
    }

    #[test]
    fn test_document_sections_and_limits() {
        let mut f = Facility::new("1", "Ho Teaching Hospital");
        f.facility_type = Some("hospital".to_string());
        f.address_city = Some("Ho".to_string());
        f.normalized_region = Some("Volta".to_string());
        f.capabilities = (0..25).map(|i| format!("c{}", i)).collect();
        f.description = Some("x".repeat(600));

        let doc = facility_document(&f);

        assert!(doc.starts_with("Name: Ho Teaching Hospital | Type: hospital | Location: Ho, Volta | Capabilities: c0, "));
        assert!(doc.contains("c19"));
        assert!(!doc.contains("c20"));
        assert!(!doc.contains("Procedures:"));
        assert!(doc.ends_with(&format!("Description: {}", "x".repeat(500))));
    }

    #[test]
    fn test_document_defaults() {
        let doc = facility_document(&Facility::new("1", "Bare"));
        assert_eq!(doc, "Name: Bare | Type: Unknown | Location: , ");
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);

        let mut tiny = vec![1e-10, 0.0];
        l2_normalize(&mut tiny);
        assert!((tiny[0] - 1.0).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_flat_index_rejects_wrong_dimension() {
        let mut index = FlatIpIndex::new(2);
        assert!(index.add(&[1.0, 0.0]).is_ok());
        assert!(index.add(&[1.0]).is_err());
        assert_eq!(index.len(), 1);
        assert!(matches!(index.search(&[1.0], 1), Err(EmbedError::Malformed(_))));
        assert_eq!(index.search(&[1.0, 0.0], 1).unwrap(), vec![(0, 1.0)]);
    }

    /// Drops the first text of every batch
    struct LossyEmbedder;

    #[async_trait]
    impl Embedder for LossyEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbedError> {
            Ok(texts.iter().skip(1).map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn model_name(&self) -> String {
            "lossy".to_string()
        }
    }

    /// Vector width fixed at construction
    struct WidthEmbedder {
        width: usize,
    }

    #[async_trait]
    impl Embedder for WidthEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbedError> {
            Ok(texts.iter().map(|_| vec![1.0; self.width]).collect())
        }

        fn model_name(&self) -> String {
            format!("width-{}", self.width)
        }
    }

    #[tokio::test]
    async fn test_short_embedder_fails_build() {
        let facilities = vec![
            create_test_facility("id-alpha", &["dental"]),
            create_test_facility("id-beta", &["surgery"]),
        ];

        let result = SimilarityIndex::build(&facilities, &LossyEmbedder, DEFAULT_BATCH_SIZE).await;

        assert!(matches!(result, Err(EmbedError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch_is_an_error() {
        let facilities = vec![create_test_facility("a", &["dental"])];
        let index = SimilarityIndex::build(&facilities, &WidthEmbedder { width: 3 }, DEFAULT_BATCH_SIZE)
            .await
            .unwrap();

        let result = index.search("dental", 1, &WidthEmbedder { width: 5 }).await;

        assert!(matches!(result, Err(EmbedError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_build_batches_and_search_orders_by_score() {
        let embedder = KeywordEmbedder::new();
        let facilities = vec![
            create_test_facility("a", &["dental care"]),
            create_test_facility("b", &["surgery", "cardio surgery"]),
            create_test_facility("c", &["maternity"]),
            create_test_facility("d", &["cardio clinic"]),
            create_test_facility("e", &["surgery theatre"]),
        ];

        let index = SimilarityIndex::build(&facilities, &embedder, 2).await.unwrap();
        assert_eq!(index.len(), 5);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        assert_eq!(index.model(), "keywords");

        let results = index.search("surgery", 3, &embedder).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, "e");
        assert_eq!(results[1].0, "b");
        assert!(results.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[tokio::test]
    async fn test_search_clamps_k() {
        let embedder = KeywordEmbedder::new();
        let facilities = vec![create_test_facility("a", &["dental"]), create_test_facility("b", &["cardio"])];
        let index = SimilarityIndex::build(&facilities, &embedder, DEFAULT_BATCH_SIZE).await.unwrap();

        let results = index.search("dental", 50, &embedder).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "a");
    }

    #[tokio::test]
    async fn test_empty_corpus() {
        let embedder = KeywordEmbedder::new();
        let index = SimilarityIndex::build(&[], &embedder, DEFAULT_BATCH_SIZE).await.unwrap();

        assert!(index.is_empty());
        assert!(index.search("anything", 5, &embedder).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }
}
