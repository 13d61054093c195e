//! Capability interfaces injected into the agent at construction.

use crate::error::Result;
use crate::market::{AssetMeta, MarketFeatures, OrderRequest, OrderResult, OrderStatus};
use crate::risk::{Neighbor, NewRiskMemoryEntry, RiskMemoryEntry};
use crate::types::{InstrumentSide, NewTrade, Trade, TradeStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[async_trait]
pub trait Exchange: Send + Sync {
    /// Submits an order and returns once the exchange has confirmed the fill.
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderResult>;

    async fn get_market_price(&self, symbol: &str) -> Result<Decimal>;

    /// Size and precision constraints for `symbol`.
    async fn asset_meta(&self, symbol: &str) -> Result<AssetMeta>;

    /// Looks up an order previously passed to `submit_order` by its client order id.
    async fn order_status(&self, symbol: &str, client_order_id: &str) -> Result<OrderStatus>;
}

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn features(&self, symbol: &str) -> Result<MarketFeatures>;
}

#[async_trait]
pub trait EmbeddingSource: Send + Sync {
    /// Length of every vector this source produces.
    fn dimension(&self) -> usize;

    async fn embed(&self, features: &MarketFeatures) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait RiskModel: Send + Sync {
    fn name(&self) -> &str;

    /// Scores current features in `[0, 100]`, higher meaning riskier.
    async fn score(&self, features: &MarketFeatures) -> Result<f64>;
}

/// Vector-indexed persistence for risk memory.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Appends an entry, assigning its id and timestamp.
    async fn insert(&self, entry: NewRiskMemoryEntry) -> Result<RiskMemoryEntry>;

    /// Returns up to `k` entries ordered by ascending cosine distance, ties broken by
    /// most recent insertion first.
    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Returns up to `limit` entries, newest first, optionally for one token only.
    async fn recent(&self, token: Option<&str>, limit: usize) -> Result<Vec<RiskMemoryEntry>>;

    async fn len(&self) -> Result<usize>;
}

/// Transactional persistence for the trade ledger.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Inserts an open trade unless one is already open for the same symbol and side.
    /// The check and the insert must be a single atomic step.
    async fn insert_open(&self, trade: NewTrade) -> Result<Trade>;

    /// Marks an open trade closed, setting exit price and close time together.
    async fn close(&self, trade_id: i64, exit_price: Decimal, closed_at: DateTime<Utc>)
        -> Result<Trade>;

    async fn find_open(&self, symbol: &str, side: InstrumentSide) -> Result<Option<Trade>>;

    /// Lists trades ordered by creation time, then id.
    async fn list(&self, status: Option<TradeStatus>) -> Result<Vec<Trade>>;
}
