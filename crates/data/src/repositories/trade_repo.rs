//! Postgres-backed trade ledger store.

use crate::models::TradeRow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use risk_agent_core::{
    AgentError, InstrumentSide, NewTrade, Result, Trade, TradeStatus, TradeStore,
};
use rust_decimal::Decimal;
use sqlx::PgPool;

/// Partial unique index that admits one open trade per symbol and side.
pub const ONE_OPEN_PER_SIDE: &str = "trades_one_open_per_side";

const TRADE_COLUMNS: &str = "id, symbol, option_type, strike_price, entry_price, quantity, \
     exit_price, status, created_at, closed_at";

#[derive(Debug, Clone)]
pub struct PgTradeStore {
    pool: PgPool,
}

impl PgTradeStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage_error(operation: &str, e: &sqlx::Error) -> AgentError {
    AgentError::storage(format!("{operation}: {e}"))
}

/// True when `e` is the unique violation raised by the open-trade index.
pub fn is_duplicate_open(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            db.code().as_deref() == Some("23505") && db.constraint() == Some(ONE_OPEN_PER_SIDE)
        }
        _ => false,
    }
}

#[async_trait]
impl TradeStore for PgTradeStore {
    async fn insert_open(&self, trade: NewTrade) -> Result<Trade> {
        let sql = format!(
            "INSERT INTO trades (symbol, option_type, strike_price, entry_price, quantity, status)
             VALUES ($1, $2, $3, $4, $5, 'open')
             RETURNING {TRADE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, TradeRow>(&sql)
            .bind(&trade.symbol)
            .bind(trade.option_type.as_str())
            .bind(trade.strike_price)
            .bind(trade.entry_price)
            .bind(trade.quantity)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_duplicate_open(&e) {
                    AgentError::DuplicateOpenTrade {
                        symbol: trade.symbol.clone(),
                        side: trade.option_type,
                    }
                } else {
                    storage_error("insert trade", &e)
                }
            })?;

        row.try_into()
    }

    async fn close(
        &self,
        trade_id: i64,
        exit_price: Decimal,
        closed_at: DateTime<Utc>,
    ) -> Result<Trade> {
        let sql = format!(
            "UPDATE trades
             SET status = 'closed', exit_price = $2, closed_at = $3
             WHERE id = $1 AND status = 'open'
             RETURNING {TRADE_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, TradeRow>(&sql)
            .bind(trade_id)
            .bind(exit_price)
            .bind(closed_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("close trade", &e))?;

        if let Some(row) = updated {
            return row.try_into();
        }

        // Nothing updated: either the id is unknown or the trade was already closed
        let exists: Option<(String,)> = sqlx::query_as("SELECT status FROM trades WHERE id = $1")
            .bind(trade_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("load trade status", &e))?;

        Err(match exists {
            Some(_) => AgentError::AlreadyClosed { trade_id },
            None => AgentError::TradeNotFound { trade_id },
        })
    }

    async fn find_open(&self, symbol: &str, side: InstrumentSide) -> Result<Option<Trade>> {
        let sql = format!(
            "SELECT {TRADE_COLUMNS} FROM trades
             WHERE symbol = $1 AND option_type = $2 AND status = 'open'"
        );
        sqlx::query_as::<_, TradeRow>(&sql)
            .bind(symbol)
            .bind(side.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("find open trade", &e))?
            .map(Trade::try_from)
            .transpose()
    }

    async fn list(&self, status: Option<TradeStatus>) -> Result<Vec<Trade>> {
        let sql = format!(
            "SELECT {TRADE_COLUMNS} FROM trades
             WHERE $1::text IS NULL OR status = $1
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, TradeRow>(&sql)
            .bind(status.map(TradeStatus::as_str))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error("list trades", &e))?
            .into_iter()
            .map(Trade::try_from)
            .collect()
    }
}
