use crate::client::OpenAiClient;
use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use risk_agent_core::{AgentError, EmbeddingSource, MarketFeatures, Result};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embeds the textual description of market features with an OpenAI embedding model.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    /// `dimension` is requested from the API and enforced on every response.
    #[must_use]
    pub fn new(client: OpenAiClient, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            client,
            model: model.into(),
            dimension,
        }
    }

    async fn request(&self, text: &str) -> AnyResult<Vec<f32>> {
        let body = json!({
            "model": self.model,
            "input": text,
            "dimensions": self.dimension,
        });
        let response: EmbeddingResponse =
            serde_json::from_value(self.client.post("/embeddings", &body).await?)
                .context("Unexpected embeddings payload")?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("Embeddings response had no data")
    }
}

#[async_trait]
impl EmbeddingSource for OpenAiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, features: &MarketFeatures) -> Result<Vec<f32>> {
        features.validate()?;
        let vector = self
            .request(&features.describe())
            .await
            .map_err(|e| AgentError::collaborator(format!("embedding {}: {e:#}", features.symbol)))?;

        if vector.len() != self.dimension {
            return Err(AgentError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }
}
