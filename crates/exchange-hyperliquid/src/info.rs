//! Wire types for the `/info` endpoint.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct MetaResponse {
    pub universe: Vec<AssetInfo>,
}

impl MetaResponse {
    /// Position of `coin` in the universe, which is its asset id for orders.
    #[must_use]
    pub fn find(&self, coin: &str) -> Option<(u32, &AssetInfo)> {
        self.universe
            .iter()
            .enumerate()
            .find(|(_, asset)| asset.name.eq_ignore_ascii_case(coin))
            .and_then(|(i, asset)| u32::try_from(i).ok().map(|i| (i, asset)))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub name: String,
    pub sz_decimals: u32,
    #[serde(default)]
    pub max_leverage: Option<u32>,
}

/// Per-asset context from `metaAndAssetCtxs`, aligned with the universe order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetContext {
    pub mark_px: String,
    /// Open interest in base units.
    pub open_interest: String,
    #[serde(default)]
    pub day_ntl_vlm: Option<String>,
}

impl AssetContext {
    /// Open interest valued at the mark price.
    ///
    /// # Errors
    /// Returns an error if either field is not a decimal.
    pub fn open_interest_notional(&self) -> Result<Decimal> {
        Ok(parse_decimal("openInterest", &self.open_interest)?
            * parse_decimal("markPx", &self.mark_px)?)
    }
}

/// `orderStatus` reply; `order` is absent when the venue does not know the id.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatusResponse {
    pub status: String,
    #[serde(default)]
    pub order: Option<OrderInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInfo {
    pub order: BasicOrderInfo,
    /// `open`, `filled`, `canceled`, `rejected`, ...
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicOrderInfo {
    pub coin: String,
    /// `B` for bids, `A` for asks.
    pub side: String,
    pub oid: u64,
    /// Remaining size.
    pub sz: String,
    pub orig_sz: String,
    #[serde(default)]
    pub cloid: Option<String>,
}

impl BasicOrderInfo {
    /// Size executed so far.
    ///
    /// # Errors
    /// Returns an error if either size is not a decimal.
    pub fn filled_size(&self) -> Result<Decimal> {
        Ok(parse_decimal("origSz", &self.orig_sz)? - parse_decimal("sz", &self.sz)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserFill {
    pub coin: String,
    pub oid: u64,
    pub px: String,
    pub sz: String,
    #[serde(default)]
    pub fee: Option<String>,
    pub time: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCandle {
    /// Open time, ms.
    pub t: i64,
    /// Close time, ms.
    #[serde(rename = "T")]
    pub close_t: i64,
    pub o: String,
    pub h: String,
    pub l: String,
    pub c: String,
    pub v: String,
    #[serde(default)]
    pub n: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// Base-asset volume.
    pub volume: Decimal,
    pub trades: u64,
}

pub(crate) fn parse_decimal(field: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value).with_context(|| format!("Invalid {field}: {value}"))
}

fn parse_millis(value: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value).with_context(|| format!("Invalid timestamp {value}"))
}

impl TryFrom<RawCandle> for Candle {
    type Error = anyhow::Error;

    fn try_from(raw: RawCandle) -> Result<Self> {
        Ok(Self {
            open_time: parse_millis(raw.t)?,
            close_time: parse_millis(raw.close_t)?,
            open: parse_decimal("open", &raw.o)?,
            high: parse_decimal("high", &raw.h)?,
            low: parse_decimal("low", &raw.l)?,
            close: parse_decimal("close", &raw.c)?,
            volume: parse_decimal("volume", &raw.v)?,
            trades: raw.n,
        })
    }
}
