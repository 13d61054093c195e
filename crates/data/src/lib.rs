//! `PostgreSQL` persistence for the risk agent.
//!
//! This crate provides:
//! - Database client with embedded migrations
//! - Row models for trades and risk memory
//! - `TradeStore` and `VectorIndex` implementations over sqlx and pgvector

pub mod database;
pub mod models;
pub mod repositories;

pub use database::DatabaseClient;
pub use models::{MemoryRow, NeighborRow, TradeRow};
pub use repositories::{PgTradeStore, PgVectorIndex};
