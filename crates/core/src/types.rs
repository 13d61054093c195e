use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side of an instrument position. Options carry `Call`/`Put`; spot and perp
/// positions opened by the agent use `Long`/`Short`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentSide {
    Call,
    Put,
    Long,
    Short,
}

impl InstrumentSide {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

impl fmt::Display for InstrumentSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstrumentSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "call" => Ok(Self::Call),
            "put" => Ok(Self::Put),
            "long" => Ok(Self::Long),
            "short" => Ok(Self::Short),
            other => Err(format!("unknown instrument side: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

impl TradeStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown trade status: {other}")),
        }
    }
}

/// One position lifecycle, open → closed.
///
/// `exit_price` and `closed_at` are populated exactly when `status` is `Closed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub symbol: String,
    pub option_type: InstrumentSide,
    pub strike_price: Decimal,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    pub exit_price: Option<Decimal>,
    pub status: TradeStatus,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Trade {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    /// Realized `PnL` for closed long/call trades, inverted for short/put.
    #[must_use]
    pub fn realized_pnl(&self) -> Option<Decimal> {
        let exit = self.exit_price?;
        let per_unit = match self.option_type {
            InstrumentSide::Long | InstrumentSide::Call => exit - self.entry_price,
            InstrumentSide::Short | InstrumentSide::Put => self.entry_price - exit,
        };
        Some(per_unit * self.quantity)
    }
}

/// Fields required to open a trade; id and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrade {
    pub symbol: String,
    pub option_type: InstrumentSide,
    pub strike_price: Decimal,
    pub entry_price: Decimal,
    pub quantity: Decimal,
}

/// A tracked instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub symbol: String,
    /// Market pair, e.g. `BTC/USDC`.
    pub pair: String,
    pub added_at: DateTime<Utc>,
}

impl WatchlistEntry {
    #[must_use]
    pub fn new(symbol: impl Into<String>, pair: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            pair: pair.into(),
            added_at: Utc::now(),
        }
    }

    /// Builds an entry quoted against USDC, the default settlement asset.
    #[must_use]
    pub fn usdc(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        let pair = format!("{symbol}/USDC");
        Self::new(symbol, pair)
    }
}
