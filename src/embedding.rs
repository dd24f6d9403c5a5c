// 🧠 Embedding - text → vector through an external embedding service
//
// Two seams: `EmbeddingService` is one HTTP call for one model, `Embedder`
// is what the similarity index talks to. `FallbackEmbedder` sits between
// them and owns the active model name.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

/// Model used when the configured one is unknown to the service
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

pub type Embedding = Vec<f32>;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding model '{0}' is not available")]
    UnknownModel(String),

    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("embedding service returned HTTP {status}: {body}")]
    Service { status: u16, body: String },

    #[error("malformed embedding response: {0}")]
    Malformed(String),
}

/// One vector of a batch response; `index` is the input position
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Embedding,
    pub index: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

// ============================================================================
// SERVICE
// ============================================================================

/// A single batch call against a named model
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<EmbeddingData>, EmbedError>;
}

/// OpenAI-compatible `/embeddings` endpoint
pub struct OpenAiService {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl OpenAiService {
    pub fn new(api_key: String, api_base: &str) -> Self {
        OpenAiService {
            client: reqwest::Client::new(),
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingService for OpenAiService {
    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<EmbeddingData>, EmbedError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": model,
                "input": inputs,
            }))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EmbedError::UnknownModel(model.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = response
            .json::<EmbeddingResponse>()
            .await
            .map_err(|e| EmbedError::Malformed(e.to_string()))?;
        Ok(parsed.data)
    }
}

// ============================================================================
// EMBEDDER
// ============================================================================

/// Texts in, one vector per text out, in input order
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbedError>;

    /// Model currently in use
    fn model_name(&self) -> String;
}

/// Retries a batch once with the default model when the configured model is
/// unknown, then keeps the default for the rest of the process
pub struct FallbackEmbedder<S> {
    service: S,
    model: RwLock<String>,
}

impl<S: EmbeddingService> FallbackEmbedder<S> {
    pub fn new(service: S, model: &str) -> Self {
        FallbackEmbedder {
            service,
            model: RwLock::new(model.to_string()),
        }
    }

    fn switch_to_default(&self) {
        let mut model = self.model.write().unwrap_or_else(|e| e.into_inner());
        *model = DEFAULT_EMBEDDING_MODEL.to_string();
    }
}

#[async_trait]
impl<S: EmbeddingService> Embedder for FallbackEmbedder<S> {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model_name();
        let mut data = match self.service.embed(&model, texts).await {
            Err(EmbedError::UnknownModel(missing)) if missing != DEFAULT_EMBEDDING_MODEL => {
                warn!(
                    "Embedding model '{}' not found, falling back to '{}'",
                    missing, DEFAULT_EMBEDDING_MODEL
                );
                self.switch_to_default();
                self.service.embed(DEFAULT_EMBEDDING_MODEL, texts).await?
            }
            other => other?,
        };

        if data.len() != texts.len() {
            return Err(EmbedError::Malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }

        let mut seen = vec![false; data.len()];
        for d in &data {
            match seen.get_mut(d.index) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(EmbedError::Malformed(format!(
                        "embedding index {} is out of range or repeated",
                        d.index
                    )))
                }
            }
        }

        data.sort_by_key(|d| d.index);
        debug!("Embedded {} texts", data.len());
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn model_name(&self) -> String {
        self.model.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

// ============================================================================
// TESTS
// ============================================================================
