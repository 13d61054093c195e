//! Error taxonomy shared by every component of the agent.
//!
//! Adapters are free to use `anyhow` internally, but anything crossing a
//! collaborator trait boundary is converted into [`AgentError`] so the decision
//! loop can tell sizing, ledger, memory and collaborator failures apart.

use crate::types::InstrumentSide;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Reasons the precision normalizer refuses to produce a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizeRejection {
    /// Price or desired notional was zero or negative.
    #[error("non-positive input: desired notional {desired_notional}, price {market_price}")]
    NonPositiveInput {
        desired_notional: Decimal,
        market_price: Decimal,
    },

    /// Truncation to the venue precision left nothing to trade.
    #[error("quantity truncates to zero at {size_decimals} decimals")]
    ZeroQuantity { size_decimals: u32 },

    /// Resulting order value is under the venue minimum and outside the bump tolerance.
    #[error("notional {notional} below minimum {min_notional}")]
    BelowMinNotional {
        notional: Decimal,
        min_notional: Decimal,
    },

    /// Resulting position value is under the venue position floor.
    #[error("position value {value} below minimum position size {min_position_size}")]
    BelowMinPositionSize {
        value: Decimal,
        min_position_size: Decimal,
    },
}

/// Errors that can occur anywhere in the agent core.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Order sizing fell below what the venue accepts.
    #[error("rejected size: {0}")]
    RejectedSize(#[from] SizeRejection),

    /// Embedding length disagrees with the memory store.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A second open trade was requested for the same instrument side.
    #[error("open trade already exists for {symbol} ({side})")]
    DuplicateOpenTrade { symbol: String, side: InstrumentSide },

    /// No trade with the given id.
    #[error("trade not found: {trade_id}")]
    TradeNotFound { trade_id: i64 },

    /// Close requested for a trade that is already closed.
    #[error("trade {trade_id} already closed")]
    AlreadyClosed { trade_id: i64 },

    /// Network failure or order rejection from the exchange.
    #[error("exchange error: {0}")]
    Exchange(String),

    /// A collaborator call exceeded its time budget.
    #[error("{operation} timed out after {timeout_ms}ms")]
    CollaboratorTimeout { operation: String, timeout_ms: u64 },

    /// Risk score outside the declared [0, 100] bound.
    #[error("risk score {score} outside [0, 100]")]
    ScoreOutOfBounds { score: f64 },

    /// Market features could not be used for an assessment.
    #[error("malformed market features: {0}")]
    MalformedFeatures(String),

    /// Embedding service, risk model or market data source failed.
    #[error("collaborator failure: {0}")]
    Collaborator(String),

    /// Persistence backend failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl AgentError {
    /// Creates a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, limit: Duration) -> Self {
        Self::CollaboratorTimeout {
            operation: operation.into(),
            timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Creates an exchange error.
    pub fn exchange(message: impl Into<String>) -> Self {
        Self::Exchange(message.into())
    }

    /// Creates a collaborator error.
    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::Collaborator(message.into())
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Returns true for ledger/memory invariant violations that indicate a logic error
    /// rather than a transient condition.
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::DuplicateOpenTrade { .. }
                | Self::AlreadyClosed { .. }
                | Self::TradeNotFound { .. }
                | Self::DimensionMismatch { .. }
                | Self::ScoreOutOfBounds { .. }
        )
    }

    /// Returns true if the error came from a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::CollaboratorTimeout { .. })
    }
}
