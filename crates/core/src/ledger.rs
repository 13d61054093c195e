//! Trade ledger: the authoritative record of position lifecycles.

use crate::error::{AgentError, Result};
use crate::traits::TradeStore;
use crate::types::{InstrumentSide, NewTrade, Trade, TradeStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Validating front for a [`TradeStore`].
#[derive(Clone)]
pub struct TradeLedger {
    store: Arc<dyn TradeStore>,
}

impl TradeLedger {
    pub fn new(store: Arc<dyn TradeStore>) -> Self {
        Self { store }
    }

    /// Ledger backed by a process-local store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryTradeStore::new()))
    }

    /// Opens a trade for `symbol` on `option_type`.
    ///
    /// # Errors
    /// Returns `DuplicateOpenTrade` if a trade is already open for the same symbol and
    /// side, `Storage` for non-positive prices or quantity.
    pub async fn open(
        &self,
        symbol: &str,
        option_type: InstrumentSide,
        strike_price: Decimal,
        entry_price: Decimal,
        quantity: Decimal,
    ) -> Result<Trade> {
        if entry_price <= Decimal::ZERO || quantity <= Decimal::ZERO {
            return Err(AgentError::storage(format!(
                "refusing to open {symbol} with entry {entry_price} and quantity {quantity}"
            )));
        }

        let trade = self
            .store
            .insert_open(NewTrade {
                symbol: symbol.to_string(),
                option_type,
                strike_price,
                entry_price,
                quantity,
            })
            .await?;

        tracing::info!(
            trade_id = trade.id,
            symbol = %trade.symbol,
            side = %trade.option_type,
            entry_price = %trade.entry_price,
            quantity = %trade.quantity,
            "Opened trade"
        );
        Ok(trade)
    }

    /// Closes an open trade at `exit_price`.
    ///
    /// # Errors
    /// Returns `TradeNotFound` or `AlreadyClosed`.
    pub async fn close(&self, trade_id: i64, exit_price: Decimal) -> Result<Trade> {
        if exit_price <= Decimal::ZERO {
            return Err(AgentError::storage(format!(
                "refusing to close trade {trade_id} at {exit_price}"
            )));
        }

        let trade = self.store.close(trade_id, exit_price, Utc::now()).await?;

        tracing::info!(
            trade_id = trade.id,
            symbol = %trade.symbol,
            exit_price = %exit_price,
            pnl = ?trade.realized_pnl(),
            "Closed trade"
        );
        Ok(trade)
    }

    /// # Errors
    /// Propagates store failures.
    pub async fn list(&self, status: Option<TradeStatus>) -> Result<Vec<Trade>> {
        self.store.list(status).await
    }

    /// # Errors
    /// Propagates store failures.
    pub async fn find_open(&self, symbol: &str, side: InstrumentSide) -> Result<Option<Trade>> {
        self.store.find_open(symbol, side).await
    }
}

/// Process-local [`TradeStore`]; one mutex guards check-and-insert and close.
#[derive(Default)]
pub struct InMemoryTradeStore {
    trades: Mutex<Vec<Trade>>,
}

impl InMemoryTradeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn insert_open(&self, trade: NewTrade) -> Result<Trade> {
        let mut trades = self.trades.lock().await;

        if trades
            .iter()
            .any(|t| t.is_open() && t.symbol == trade.symbol && t.option_type == trade.option_type)
        {
            return Err(AgentError::DuplicateOpenTrade {
                symbol: trade.symbol,
                side: trade.option_type,
            });
        }

        let id = trades.last().map_or(1, |t| t.id + 1);
        let stored = Trade {
            id,
            symbol: trade.symbol,
            option_type: trade.option_type,
            strike_price: trade.strike_price,
            entry_price: trade.entry_price,
            quantity: trade.quantity,
            exit_price: None,
            status: TradeStatus::Open,
            created_at: Utc::now(),
            closed_at: None,
        };
        trades.push(stored.clone());
        Ok(stored)
    }

    async fn close(
        &self,
        trade_id: i64,
        exit_price: Decimal,
        closed_at: DateTime<Utc>,
    ) -> Result<Trade> {
        let mut trades = self.trades.lock().await;
        let trade = trades
            .iter_mut()
            .find(|t| t.id == trade_id)
            .ok_or(AgentError::TradeNotFound { trade_id })?;

        if !trade.is_open() {
            return Err(AgentError::AlreadyClosed { trade_id });
        }

        trade.exit_price = Some(exit_price);
        trade.closed_at = Some(closed_at);
        trade.status = TradeStatus::Closed;
        Ok(trade.clone())
    }

    async fn find_open(&self, symbol: &str, side: InstrumentSide) -> Result<Option<Trade>> {
        let trades = self.trades.lock().await;
        Ok(trades
            .iter()
            .find(|t| t.is_open() && t.symbol == symbol && t.option_type == side)
            .cloned())
    }

    async fn list(&self, status: Option<TradeStatus>) -> Result<Vec<Trade>> {
        let trades = self.trades.lock().await;
        let mut out: Vec<Trade> = trades
            .iter()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }
}
