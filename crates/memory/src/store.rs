use crate::index::InMemoryVectorIndex;
use risk_agent_core::risk::validate_score;
use risk_agent_core::{
    AgentError, Neighbor, NewRiskMemoryEntry, Result, RiskMemoryEntry, VectorIndex,
};
use std::sync::Arc;

/// Append-only memory of past risk assessments with similarity retrieval.
///
/// Every embedding, stored or queried, must have the dimension declared at
/// construction.
#[derive(Clone)]
pub struct RiskMemoryStore {
    index: Arc<dyn VectorIndex>,
    dimension: usize,
}

impl RiskMemoryStore {
    pub fn new(index: Arc<dyn VectorIndex>, dimension: usize) -> Self {
        Self { index, dimension }
    }

    #[must_use]
    pub fn in_memory(dimension: usize) -> Self {
        Self::new(Arc::new(InMemoryVectorIndex::new()), dimension)
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Appends an assessment. Duplicate tokens are kept as separate entries.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` for a wrong-length embedding and
    /// `ScoreOutOfBounds` for scores outside `[0, 100]`.
    pub async fn record(
        &self,
        token: &str,
        risk_score: f64,
        embedding: Vec<f32>,
    ) -> Result<RiskMemoryEntry> {
        self.check_dimension(&embedding)?;
        validate_score(risk_score)?;

        let entry = self
            .index
            .insert(NewRiskMemoryEntry {
                token: token.to_string(),
                risk_score,
                embedding,
            })
            .await?;

        tracing::debug!(id = entry.id, token, risk_score, "Recorded risk memory");
        Ok(entry)
    }

    /// Returns up to `k` stored entries nearest to `embedding`, nearest first.
    ///
    /// # Errors
    /// Returns `DimensionMismatch` for a wrong-length query.
    pub async fn retrieve_similar(&self, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.check_dimension(embedding)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        self.index.nearest(embedding, k).await
    }

    /// Most recent entries first, optionally for a single token.
    ///
    /// # Errors
    /// Propagates index failures.
    pub async fn recent(&self, token: Option<&str>, limit: usize) -> Result<Vec<RiskMemoryEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.index.recent(token, limit).await
    }

    /// # Errors
    /// Propagates index failures.
    pub async fn len(&self) -> Result<usize> {
        self.index.len().await
    }

    /// # Errors
    /// Propagates index failures.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() == self.dimension {
            Ok(())
        } else {
            Err(AgentError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            })
        }
    }
}
