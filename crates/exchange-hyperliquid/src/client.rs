use crate::info::{
    AssetContext, Candle, MetaResponse, OrderStatusResponse, RawCandle, UserFill,
};
use anyhow::{Context, Result};
use governor::{clock::DefaultClock, state::InMemoryState, Quota, RateLimiter};
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const MAINNET_URL: &str = "https://api.hyperliquid.xyz";
pub const TESTNET_URL: &str = "https://api.hyperliquid-testnet.xyz";

#[derive(Clone)]
pub struct HyperliquidClient {
    http_client: Client,
    base_url: String,
    rate_limiter: Arc<RateLimiter<governor::state::direct::NotKeyed, InMemoryState, DefaultClock>>,
}

impl HyperliquidClient {
    /// Creates a client limited to `requests_per_second` (clamped to at least 1).
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        requests_per_second: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Hyperliquid HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn is_mainnet(&self) -> bool {
        self.base_url == MAINNET_URL
    }

    /// # Errors
    /// Returns an error on transport failure, a non-success status or invalid JSON.
    pub async fn post(&self, endpoint: &str, body: &Value) -> Result<Value> {
        self.rate_limiter.until_ready().await;
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {endpoint} failed"))?
            .error_for_status()
            .with_context(|| format!("POST {endpoint} returned an error status"))?;
        let json = response.json().await.context("Invalid JSON response")?;
        Ok(json)
    }

    /// # Errors
    /// Returns an error if the request fails.
    pub async fn info(&self, body: &Value) -> Result<Value> {
        self.post("/info", body).await
    }

    /// Mid prices for every listed coin.
    ///
    /// # Errors
    /// Returns an error if the request fails or a price is not a decimal.
    pub async fn all_mids(&self) -> Result<HashMap<String, Decimal>> {
        let raw: HashMap<String, String> =
            serde_json::from_value(self.info(&json!({ "type": "allMids" })).await?)
                .context("Unexpected allMids payload")?;

        raw.into_iter()
            .map(|(coin, px)| {
                let px = Decimal::from_str(&px)
                    .with_context(|| format!("Invalid mid price for {coin}: {px}"))?;
                Ok((coin, px))
            })
            .collect()
    }

    /// Perpetuals universe with per-asset size precision.
    ///
    /// # Errors
    /// Returns an error if the request fails or the payload is malformed.
    pub async fn meta(&self) -> Result<MetaResponse> {
        serde_json::from_value(self.info(&json!({ "type": "meta" })).await?)
            .context("Unexpected meta payload")
    }

    /// Universe together with the live context of each asset.
    ///
    /// # Errors
    /// Returns an error if the request fails or the payload is malformed.
    pub async fn meta_and_asset_contexts(&self) -> Result<(MetaResponse, Vec<AssetContext>)> {
        serde_json::from_value(self.info(&json!({ "type": "metaAndAssetCtxs" })).await?)
            .context("Unexpected metaAndAssetCtxs payload")
    }

    /// Open interest notional of `coin`, `None` if the venue does not list it.
    ///
    /// # Errors
    /// Returns an error if the request fails or the payload is malformed.
    pub async fn open_interest_notional(&self, coin: &str) -> Result<Option<Decimal>> {
        let (meta, contexts) = self.meta_and_asset_contexts().await?;
        let Some((index, _)) = meta.find(coin) else {
            return Ok(None);
        };
        contexts
            .get(index as usize)
            .map(AssetContext::open_interest_notional)
            .transpose()
    }

    /// Status of `user`'s order with client order id `cloid`.
    ///
    /// # Errors
    /// Returns an error if the request fails or the payload is malformed.
    pub async fn order_status(&self, user: &str, cloid: &str) -> Result<OrderStatusResponse> {
        let body = json!({ "type": "orderStatus", "user": user, "oid": cloid });
        serde_json::from_value(self.info(&body).await?).context("Unexpected orderStatus payload")
    }

    /// Most recent fills for `user`.
    ///
    /// # Errors
    /// Returns an error if the request fails or the payload is malformed.
    pub async fn user_fills(&self, user: &str) -> Result<Vec<UserFill>> {
        serde_json::from_value(self.info(&json!({ "type": "userFills", "user": user })).await?)
            .context("Unexpected userFills payload")
    }

    /// Candles for `coin` between two millisecond timestamps, oldest first.
    ///
    /// # Errors
    /// Returns an error if the request fails or a candle is malformed.
    pub async fn candles(
        &self,
        coin: &str,
        interval: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Candle>> {
        let body = json!({
            "type": "candleSnapshot",
            "req": {
                "coin": coin,
                "interval": interval,
                "startTime": start_ms,
                "endTime": end_ms,
            }
        });
        let raw: Vec<RawCandle> = serde_json::from_value(self.info(&body).await?)
            .context("Unexpected candleSnapshot payload")?;

        let mut candles = raw
            .into_iter()
            .map(Candle::try_from)
            .collect::<Result<Vec<_>>>()?;
        candles.sort_by_key(|c| c.open_time);
        Ok(candles)
    }
}
