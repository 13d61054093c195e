use crate::error::{AgentError, Result};
use crate::sizing::SizingRules;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Snapshot of an instrument's recent market behaviour, the input to a risk assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketFeatures {
    pub symbol: String,
    /// Latest mid or close price.
    pub price: Decimal,
    /// Percent change over the feature window.
    pub change_pct: f64,
    /// Standard deviation of per-candle returns, in percent.
    pub volatility_pct: f64,
    /// (high - low) / low over the window, in percent.
    pub range_pct: f64,
    /// Traded quote volume over the window.
    pub volume: f64,
    /// Market capitalisation in quote currency, or the venue's closest proxy
    /// (open interest notional on perpetuals). `None` when the source has neither.
    pub market_cap: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

impl MarketFeatures {
    /// Rejects features that cannot produce a meaningful score.
    ///
    /// # Errors
    /// Returns `MalformedFeatures` for non-positive prices, non-finite statistics or
    /// negative volume.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(AgentError::MalformedFeatures("empty symbol".to_string()));
        }
        if self.price <= Decimal::ZERO {
            return Err(AgentError::MalformedFeatures(format!(
                "{}: non-positive price {}",
                self.symbol, self.price
            )));
        }
        let stats = [
            ("change_pct", self.change_pct),
            ("volatility_pct", self.volatility_pct),
            ("range_pct", self.range_pct),
            ("volume", self.volume),
        ];
        for (name, value) in stats {
            if !value.is_finite() {
                return Err(AgentError::MalformedFeatures(format!(
                    "{}: {name} is not finite",
                    self.symbol
                )));
            }
        }
        if let Some(cap) = self.market_cap {
            if !cap.is_finite() || cap < 0.0 {
                return Err(AgentError::MalformedFeatures(format!(
                    "{}: invalid market cap {cap}",
                    self.symbol
                )));
            }
        }
        if self.volatility_pct < 0.0 || self.range_pct < 0.0 || self.volume < 0.0 {
            return Err(AgentError::MalformedFeatures(format!(
                "{}: negative volatility, range or volume",
                self.symbol
            )));
        }
        Ok(())
    }

    /// Canonical text form handed to text embedding services and language models.
    #[must_use]
    pub fn describe(&self) -> String {
        let market_cap = self
            .market_cap
            .map_or_else(|| "unknown".to_string(), |cap| format!("{cap:.0}"));
        format!(
            "token: {}; price: {}; change_pct: {:.4}; volatility_pct: {:.4}; range_pct: {:.4}; volume: {:.2}; market_cap: {}",
            self.symbol,
            self.price.normalize(),
            self.change_pct,
            self.volatility_pct,
            self.range_pct,
            self.volume,
            market_cap
        )
    }
}

/// Per-instrument size and precision constraints published by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMeta {
    pub symbol: String,
    /// Maximum number of decimals allowed in an order quantity.
    pub size_decimals: u32,
    /// Minimum order value in quote currency.
    pub min_notional: Decimal,
    /// Minimum position value in quote currency.
    pub min_position_size: Decimal,
}

impl AssetMeta {
    #[must_use]
    pub fn sizing_rules(&self) -> SizingRules {
        SizingRules {
            min_notional: self.min_notional,
            min_position_size: self.min_position_size,
            size_decimals: self.size_decimals,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    #[must_use]
    pub const fn is_buy(self) -> bool {
        matches!(self, Self::Buy)
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("buy"),
            Self::Sell => f.write_str("sell"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    /// Limit price; `None` submits at market.
    pub price: Option<Decimal>,
    pub reduce_only: bool,
    /// Caller-assigned id the venue echoes back, so an order whose confirmation was
    /// lost can still be looked up.
    pub client_order_id: String,
}

impl OrderRequest {
    /// Market order with a fresh client order id.
    #[must_use]
    pub fn market(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        reduce_only: bool,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            price: None,
            reduce_only,
            client_order_id: new_client_order_id(),
        }
    }
}

/// 128-bit random id as `0x` plus 32 hex digits, the form Hyperliquid accepts as `cloid`.
#[must_use]
pub fn new_client_order_id() -> String {
    format!("0x{}", Uuid::new_v4().simple())
}

/// Exchange confirmation of a filled order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub filled_quantity: Decimal,
    pub avg_price: Decimal,
    pub commission: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl OrderResult {
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.filled_quantity * self.avg_price
    }
}

/// Venue view of an earlier order, looked up by its client order id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OrderStatus {
    /// Final with a non-zero fill.
    Filled(OrderResult),
    /// Known to the venue and not final yet.
    Pending,
    /// Final without a fill, or never reached the venue.
    NotFilled,
}
