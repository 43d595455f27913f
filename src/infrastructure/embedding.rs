use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::Embedder;

/// Looks up a fastembed model by variant name (`AllMiniLML6V2`) or model code
/// (`Qdrant/all-MiniLM-L6-v2`), returning it with its vector dimension.
pub fn resolve_fastembed_model(name: &str) -> Result<(EmbeddingModel, usize)> {
    TextEmbedding::list_supported_models()
        .into_iter()
        .find(|info| {
            format!("{:?}", info.model).eq_ignore_ascii_case(name)
                || info.model_code.eq_ignore_ascii_case(name)
        })
        .map(|info| (info.model, info.dim))
        .ok_or_else(|| anyhow!("Unknown fastembed model: {}", name))
}

/// Local embeddings computed in-process with fastembed (ONNX runtime).
pub struct FastEmbedEmbedder {
    model: Arc<TextEmbedding>,
    dimension: usize,
}

impl FastEmbedEmbedder {
    /// Initializes the model, downloading it into `cache_dir` on first use.
    ///
    /// This blocks while the model loads; call it from `spawn_blocking` in async code.
    pub fn new(model_name: EmbeddingModel, cache_dir: Option<PathBuf>) -> Result<Self> {
        let dimension = TextEmbedding::list_supported_models()
            .iter()
            .find(|m| m.model == model_name)
            .map(|m| m.dim)
            .ok_or_else(|| anyhow!("No model info for {:?}", model_name))?;
        let mut opts = InitOptions::new(model_name);
        if let Some(dir) = cache_dir {
            opts = opts.with_cache_dir(dir);
        }
        let model = TextEmbedding::try_new(opts)?;
        Ok(Self { model: Arc::new(model), dimension })
    }
}

#[async_trait]
impl Embedder for FastEmbedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.model.clone();
        let texts = texts.to_vec();
        let embeddings = tokio::task::spawn_blocking(move || model.embed(texts, None))
            .await
            .context("fastembed task panicked")??;
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Embeddings from an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            dimension,
        })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        log::debug!(
            "Sending embedding request: url={}, model={}, inputs={}",
            url,
            self.model,
            texts.len()
        );

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            encoding_format: "float",
        };
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send embedding request to {}", self.base_url))?;

        let status = response.status();
        let mut result: EmbeddingResponse = response
            .error_for_status()
            .with_context(|| format!("Embedding endpoint returned error status: {}", status))?
            .json()
            .await
            .context("Failed to parse embedding response")?;

        if result.data.len() != texts.len() {
            return Err(anyhow!(
                "Expected {} embeddings, got {}",
                texts.len(),
                result.data.len()
            ));
        }
        result.data.sort_by_key(|d| d.index);
        let embeddings: Vec<Vec<f32>> = result.data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimension) {
            return Err(anyhow!(
                "Embedding dimension ({}) does not match configured dimension ({})",
                bad.len(),
                self.dimension
            ));
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
