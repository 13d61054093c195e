//! Brute-force cosine k-NN over an in-process vector list.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use risk_agent_core::{
    AgentError, Neighbor, NewRiskMemoryEntry, Result, RiskMemoryEntry, VectorIndex,
};
use std::cmp::Ordering;

/// Cosine distance `1 - cos(a, b)`, in `[0, 2]`.
///
/// A zero vector has no direction; its distance to anything is defined as 1.
/// Callers must pass equal-length slices.
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 2.0)
}

/// Nearest first; equal distances put the most recent insertion first.
fn rank(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| b.entry.id.cmp(&a.entry.id))
}

#[derive(Default)]
struct Entries {
    next_id: i64,
    rows: Vec<RiskMemoryEntry>,
}

/// Process-local [`VectorIndex`]. Suitable for paper trading and tests; memory is
/// lost on restart.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    entries: RwLock<Entries>,
}

impl InMemoryVectorIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn insert(&self, entry: NewRiskMemoryEntry) -> Result<RiskMemoryEntry> {
        let mut entries = self.entries.write();

        if let Some(first) = entries.rows.first() {
            if first.embedding.len() != entry.embedding.len() {
                return Err(AgentError::DimensionMismatch {
                    expected: first.embedding.len(),
                    actual: entry.embedding.len(),
                });
            }
        }

        entries.next_id += 1;
        let stored = RiskMemoryEntry {
            id: entries.next_id,
            token: entry.token,
            risk_score: entry.risk_score,
            embedding: entry.embedding,
            created_at: Utc::now(),
        };
        entries.rows.push(stored.clone());
        Ok(stored)
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read();
        let mut neighbors = Vec::with_capacity(entries.rows.len());
        for entry in &entries.rows {
            if entry.embedding.len() != query.len() {
                return Err(AgentError::DimensionMismatch {
                    expected: entry.embedding.len(),
                    actual: query.len(),
                });
            }
            neighbors.push(Neighbor {
                distance: cosine_distance(query, &entry.embedding),
                entry: entry.clone(),
            });
        }
        drop(entries);

        neighbors.sort_by(rank);
        neighbors.truncate(k);
        Ok(neighbors)
    }

    async fn recent(&self, token: Option<&str>, limit: usize) -> Result<Vec<RiskMemoryEntry>> {
        let entries = self.entries.read();
        Ok(entries
            .rows
            .iter()
            .rev()
            .filter(|entry| token.map_or(true, |t| entry.token == t))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(token: &str, score: f64, embedding: Vec<f32>) -> NewRiskMemoryEntry {
        NewRiskMemoryEntry {
            token: token.to_string(),
            risk_score: score,
            embedding,
        }
    }

    #[test]
    fn test_cosine_distance_range() {
        assert!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-12);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 3.0]) - 1.0).abs() < 1e-12);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-12);
        assert!((cosine_distance(&[0.0, 0.0], &[1.0, 1.0]) - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_nearest_sorted_ascending() {
        let index = InMemoryVectorIndex::new();
        index.insert(entry("FAR", 90.0, vec![-1.0, 0.0])).await.unwrap();
        index.insert(entry("MID", 50.0, vec![0.0, 1.0])).await.unwrap();
        index.insert(entry("NEAR", 10.0, vec![1.0, 0.1])).await.unwrap();

        let found = index.nearest(&[1.0, 0.0], 3).await.unwrap();
        let tokens: Vec<_> = found.iter().map(|n| n.entry.token.as_str()).collect();
        assert_eq!(tokens, vec!["NEAR", "MID", "FAR"]);
        assert!(found.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_ties_prefer_most_recent() {
        let index = InMemoryVectorIndex::new();
        let older = index.insert(entry("BTC", 20.0, vec![1.0, 1.0])).await.unwrap();
        let newer = index.insert(entry("BTC", 30.0, vec![1.0, 1.0])).await.unwrap();

        let found = index.nearest(&[0.5, 0.5], 2).await.unwrap();
        assert_eq!(found[0].entry.id, newer.id);
        assert_eq!(found[1].entry.id, older.id);
    }

    #[tokio::test]
    async fn test_fewer_than_k_and_k_zero() {
        let index = InMemoryVectorIndex::new();
        assert!(index.nearest(&[1.0], 5).await.unwrap().is_empty());

        index.insert(entry("ETH", 40.0, vec![1.0])).await.unwrap();
        assert_eq!(index.nearest(&[1.0], 5).await.unwrap().len(), 1);
        assert!(index.nearest(&[1.0], 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recent_is_newest_first_and_filters_by_token() {
        let index = InMemoryVectorIndex::new();
        index.insert(entry("BTC", 20.0, vec![1.0])).await.unwrap();
        index.insert(entry("ETH", 40.0, vec![1.0])).await.unwrap();
        index.insert(entry("BTC", 30.0, vec![1.0])).await.unwrap();

        let all = index.recent(None, 10).await.unwrap();
        let ids: Vec<_> = all.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        let btc = index.recent(Some("BTC"), 10).await.unwrap();
        let scores: Vec<_> = btc.iter().map(|e| e.risk_score).collect();
        assert_eq!(scores, vec![30.0, 20.0]);

        assert_eq!(index.recent(None, 1).await.unwrap()[0].token, "BTC");
        assert!(index.recent(Some("SOL"), 10).await.unwrap().is_empty());
        assert!(index.recent(None, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_vector_sorts_at_distance_one() {
        let index = InMemoryVectorIndex::new();
        index.insert(entry("ZERO", 50.0, vec![0.0, 0.0])).await.unwrap();
        index.insert(entry("FAR", 90.0, vec![-1.0, 0.0])).await.unwrap();
        index.insert(entry("NEAR", 10.0, vec![1.0, 0.0])).await.unwrap();

        let found = index.nearest(&[1.0, 0.0], 3).await.unwrap();
        let tokens: Vec<_> = found.iter().map(|n| n.entry.token.as_str()).collect();
        assert_eq!(tokens, vec!["NEAR", "ZERO", "FAR"]);
        assert!(found.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn test_mixed_dimensions_rejected() {
        let index = InMemoryVectorIndex::new();
        index.insert(entry("ETH", 40.0, vec![1.0, 0.0])).await.unwrap();
        assert!(matches!(
            index.insert(entry("ETH", 40.0, vec![1.0])).await,
            Err(AgentError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            index.nearest(&[1.0, 0.0, 0.0], 1).await,
            Err(AgentError::DimensionMismatch { .. })
        ));
    }
}
