//! HTTP embedder for OpenAI-compatible services (vLLM, OpenAI, etc.)

use super::EmbeddingBackend;
use crate::config::EmbeddingServiceConfig;
use crate::error::{DataLensError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Embedder backed by an external `/v1/embeddings` endpoint
pub struct HttpEmbedder {
    http_client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    /// Connect to the configured service and verify it answers with a probe
    /// embedding. The probe also pins the actual dimension, which overrides
    /// the configured value if the service disagrees.
    pub async fn connect(config: &EmbeddingServiceConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| DataLensError::Config("no embedding service URL configured".into()))?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(DataLensError::Http)?;

        let mut embedder = Self {
            http_client,
            url,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            dimension: config.dimension,
        };

        let probe = embedder.request(&["dimension probe".to_string()]).await?;
        let actual = probe
            .first()
            .map(|v| v.len())
            .ok_or_else(|| DataLensError::Embedding("probe returned no embedding".into()))?;
        if actual != embedder.dimension {
            tracing::warn!(
                configured = embedder.dimension,
                actual,
                "embedding service dimension differs from config; using actual"
            );
            embedder.dimension = actual;
        }

        Ok(embedder)
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        let url = format!("{}/v1/embeddings", self.url.trim_end_matches('/'));
        let mut req = self.http_client.post(&url).json(&request);
        if let Some(ref api_key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req.send().await.map_err(DataLensError::Http)?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DataLensError::ExternalError(format!(
                "Embedding service error (HTTP {}): {}",
                status, body
            )));
        }

        let embed_response: EmbedResponse = response.json().await.map_err(DataLensError::Http)?;
        if embed_response.data.len() != texts.len() {
            return Err(DataLensError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embed_response.data.len()
            )));
        }

        Ok(embed_response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingBackend for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
