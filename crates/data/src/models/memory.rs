use chrono::{DateTime, Utc};
use pgvector::Vector;
use risk_agent_core::{Neighbor, RiskMemoryEntry};
use std::cmp::Ordering;

/// Row of `risk_trade_memory`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MemoryRow {
    pub id: i64,
    pub token: String,
    pub risk_score: f64,
    pub embedding: Vector,
    pub created_at: DateTime<Utc>,
}

/// `MemoryRow` plus the cosine distance computed by the query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NeighborRow {
    #[sqlx(flatten)]
    pub row: MemoryRow,
    pub distance: Option<f64>,
}

impl From<MemoryRow> for RiskMemoryEntry {
    fn from(row: MemoryRow) -> Self {
        Self {
            id: row.id,
            embedding: row.embedding.to_vec(),
            token: row.token,
            risk_score: row.risk_score,
            created_at: row.created_at,
        }
    }
}

impl From<NeighborRow> for Neighbor {
    fn from(row: NeighborRow) -> Self {
        // pgvector yields NaN for zero vectors; their distance is defined as 1
        let distance = row.distance.filter(|d| d.is_finite()).unwrap_or(1.0);
        Self {
            entry: row.row.into(),
            distance,
        }
    }
}

/// Converts query rows into neighbors, nearest first with ties going to the most
/// recent entry.
#[must_use]
pub fn into_neighbors(rows: Vec<NeighborRow>) -> Vec<Neighbor> {
    let mut neighbors: Vec<Neighbor> = rows.into_iter().map(Neighbor::from).collect();
    neighbors.sort_by(|a, b| match a.distance.total_cmp(&b.distance) {
        Ordering::Equal => b.entry.id.cmp(&a.entry.id),
        other => other,
    });
    neighbors
}
