use crate::repositories::{PgTradeStore, PgVectorIndex};
use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

#[derive(Debug, Clone)]
pub struct DatabaseClient {
    pool: PgPool,
}

impl DatabaseClient {
    /// Connects to `PostgreSQL` and applies pending migrations.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established or a migration fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[must_use]
    pub fn trade_store(&self) -> PgTradeStore {
        PgTradeStore::new(self.pool.clone())
    }

    /// Opens the risk memory index for embeddings of `dimension`.
    #[must_use]
    pub fn vector_index(&self, dimension: usize) -> PgVectorIndex {
        PgVectorIndex::new(self.pool.clone(), dimension)
    }
}
