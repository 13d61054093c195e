//! pgvector-backed risk memory index.
//!
//! Several embedders may share one table, so every query is restricted to rows of
//! this index's dimension. Nearest-neighbour queries are an exact scan: the
//! `id DESC` tie-break and the zero-vector distance cannot be served by an
//! approximate index, and the table grows by one row per assessment.

use crate::models::{into_neighbors, MemoryRow, NeighborRow};
use async_trait::async_trait;
use pgvector::Vector;
use risk_agent_core::{
    AgentError, Neighbor, NewRiskMemoryEntry, Result, RiskMemoryEntry, VectorIndex,
};
use sqlx::PgPool;

#[derive(Debug, Clone)]
pub struct PgVectorIndex {
    pool: PgPool,
    dimension: usize,
}

impl PgVectorIndex {
    #[must_use]
    pub fn new(pool: PgPool, dimension: usize) -> Self {
        Self { pool, dimension }
    }

    fn check(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() == self.dimension {
            Ok(())
        } else {
            Err(AgentError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            })
        }
    }

    fn dims(&self) -> i32 {
        i32::try_from(self.dimension).unwrap_or(i32::MAX)
    }
}

fn storage_error(operation: &str, e: &sqlx::Error) -> AgentError {
    AgentError::storage(format!("{operation}: {e}"))
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn insert(&self, entry: NewRiskMemoryEntry) -> Result<RiskMemoryEntry> {
        self.check(&entry.embedding)?;

        let row = sqlx::query_as::<_, MemoryRow>(
            r"
            INSERT INTO risk_trade_memory (token, risk_score, embedding)
            VALUES ($1, $2, $3)
            RETURNING id, token, risk_score, embedding, created_at
            ",
        )
        .bind(&entry.token)
        .bind(entry.risk_score)
        .bind(Vector::from(entry.embedding))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_error("insert risk memory", &e))?;

        Ok(row.into())
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.check(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        // A zero vector on either side gives NaN, which Postgres orders after every
        // number; rank it at distance 1 instead.
        let rows = sqlx::query_as::<_, NeighborRow>(
            r"
            SELECT id, token, risk_score, embedding, created_at,
                   COALESCE(NULLIF(embedding <=> $1, 'NaN'::float8), 1.0) AS distance
            FROM risk_trade_memory
            WHERE vector_dims(embedding) = $2
            ORDER BY distance, id DESC
            LIMIT $3
            ",
        )
        .bind(Vector::from(query.to_vec()))
        .bind(self.dims())
        .bind(sql_limit(k))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("query nearest risk memory", &e))?;

        Ok(into_neighbors(rows))
    }

    async fn recent(&self, token: Option<&str>, limit: usize) -> Result<Vec<RiskMemoryEntry>> {
        let rows = sqlx::query_as::<_, MemoryRow>(
            r"
            SELECT id, token, risk_score, embedding, created_at
            FROM risk_trade_memory
            WHERE vector_dims(embedding) = $1
              AND ($2::text IS NULL OR token = $2)
            ORDER BY id DESC
            LIMIT $3
            ",
        )
        .bind(self.dims())
        .bind(token)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage_error("list risk memory", &e))?;

        Ok(rows.into_iter().map(RiskMemoryEntry::from).collect())
    }

    async fn len(&self) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM risk_trade_memory WHERE vector_dims(embedding) = $1",
        )
        .bind(self.dims())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_error("count risk memory", &e))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
