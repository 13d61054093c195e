use crate::store::RiskMemoryStore;
use chrono::Utc;
use risk_agent_core::risk::{clamp_score, validate_score};
use risk_agent_core::{
    with_timeout, AgentError, CategoryThresholds, EmbeddingSource, MarketFeatures, Neighbor,
    Result, RiskAssessment, RiskMemoryEntry, RiskModel,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Neighbours retrieved per assessment.
    pub neighbors_k: usize,
    /// Share of the final score taken from memory, in `[0, 1]`.
    pub memory_weight: f64,
    pub categories: CategoryThresholds,
    /// Budget for each embedding, retrieval and scoring call.
    pub call_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            neighbors_k: 5,
            memory_weight: 0.5,
            categories: CategoryThresholds::default(),
            call_timeout: Duration::from_secs(15),
        }
    }
}

/// Blends a fresh model score with the scores of similar past assessments.
#[derive(Clone)]
pub struct RiskAssessmentEngine {
    embedder: Arc<dyn EmbeddingSource>,
    model: Arc<dyn RiskModel>,
    memory: RiskMemoryStore,
    settings: EngineSettings,
}

impl RiskAssessmentEngine {
    /// # Errors
    /// Returns `DimensionMismatch` if the embedder and the memory store disagree on
    /// vector length.
    pub fn new(
        embedder: Arc<dyn EmbeddingSource>,
        model: Arc<dyn RiskModel>,
        memory: RiskMemoryStore,
        settings: EngineSettings,
    ) -> Result<Self> {
        if embedder.dimension() != memory.dimension() {
            return Err(AgentError::DimensionMismatch {
                expected: memory.dimension(),
                actual: embedder.dimension(),
            });
        }
        Ok(Self {
            embedder,
            model,
            memory,
            settings,
        })
    }

    #[must_use]
    pub const fn memory(&self) -> &RiskMemoryStore {
        &self.memory
    }

    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Scores `token` from its current `features` and similar past assessments.
    /// Nothing is written to memory; see [`Self::record`].
    ///
    /// # Errors
    /// Returns `MalformedFeatures`, `DimensionMismatch`, `ScoreOutOfBounds`,
    /// `CollaboratorTimeout` or the failure of the embedding source, index or model.
    pub async fn assess(&self, token: &str, features: &MarketFeatures) -> Result<RiskAssessment> {
        features.validate()?;
        let limit = self.settings.call_timeout;

        let recall = async {
            let embedding =
                with_timeout("embed", limit, self.embedder.embed(features)).await?;
            if embedding.len() != self.memory.dimension() {
                return Err(AgentError::DimensionMismatch {
                    expected: self.memory.dimension(),
                    actual: embedding.len(),
                });
            }
            let neighbors = with_timeout(
                "retrieve_similar",
                limit,
                self.memory.retrieve_similar(&embedding, self.settings.neighbors_k),
            )
            .await?;
            Ok::<_, AgentError>((embedding, neighbors))
        };
        let fresh = async {
            let score = with_timeout("risk_score", limit, self.model.score(features)).await?;
            validate_score(score)
        };

        let ((embedding, evidence), fresh_score) = tokio::try_join!(recall, fresh)?;

        let memory_score = memory_score(&evidence);
        let score = match memory_score {
            Some(remembered) => clamp_score(
                (1.0 - self.settings.memory_weight) * fresh_score
                    + self.settings.memory_weight * remembered,
            ),
            None => fresh_score,
        };
        let category = self.settings.categories.categorize(score);

        tracing::debug!(
            token,
            score,
            fresh_score,
            ?memory_score,
            neighbors = evidence.len(),
            %category,
            model = self.model.name(),
            "Assessed risk"
        );

        Ok(RiskAssessment {
            token: token.to_string(),
            score,
            category,
            fresh_score,
            memory_score,
            evidence,
            embedding,
            assessed_at: Utc::now(),
        })
    }

    /// Appends an assessment's final score and embedding to memory.
    ///
    /// # Errors
    /// See [`RiskMemoryStore::record`].
    pub async fn record(&self, assessment: &RiskAssessment) -> Result<RiskMemoryEntry> {
        with_timeout(
            "record_memory",
            self.settings.call_timeout,
            self.memory.record(
                &assessment.token,
                assessment.score,
                assessment.embedding.clone(),
            ),
        )
        .await
    }
}

/// Distance-weighted mean of neighbour scores, weight `1 / (1 + distance)`.
#[must_use]
pub fn memory_score(neighbors: &[Neighbor]) -> Option<f64> {
    if neighbors.is_empty() {
        return None;
    }
    let (weighted, total) = neighbors.iter().fold((0.0, 0.0), |(sum, weights), n| {
        let w = 1.0 / (1.0 + n.distance.max(0.0));
        (sum + w * n.entry.risk_score, weights + w)
    });
    Some(weighted / total)
}
