use crate::client::HyperliquidClient;
use crate::info::Candle;
use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use risk_agent_core::{AgentError, MarketDataSource, MarketFeatures, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Builds [`MarketFeatures`] from a trailing window of Hyperliquid candles. Perpetuals
/// have no market cap, so open interest notional stands in for it.
#[derive(Clone)]
pub struct HyperliquidMarketData {
    client: HyperliquidClient,
    interval: String,
    lookback: u32,
}

impl HyperliquidMarketData {
    #[must_use]
    pub fn new(client: HyperliquidClient, interval: impl Into<String>, lookback: u32) -> Self {
        Self {
            client,
            interval: interval.into(),
            lookback,
        }
    }

    async fn fetch(&self, symbol: &str) -> AnyResult<MarketFeatures> {
        let minutes = parse_interval_minutes(&self.interval)? * i64::from(self.lookback.max(2));
        let end = Utc::now();
        let start = end - Duration::minutes(minutes);

        let (candles, open_interest) = tokio::try_join!(
            self.client.candles(
                symbol,
                &self.interval,
                start.timestamp_millis(),
                end.timestamp_millis()
            ),
            self.client.open_interest_notional(symbol),
        )?;
        let mut features = features_from_candles(symbol, &candles)?;
        features.market_cap = open_interest.map(to_f64);
        Ok(features)
    }
}

#[async_trait]
impl MarketDataSource for HyperliquidMarketData {
    async fn features(&self, symbol: &str) -> Result<MarketFeatures> {
        self.fetch(symbol)
            .await
            .map_err(|e| AgentError::collaborator(format!("market data for {symbol}: {e:#}")))
    }
}

/// Parse interval string (e.g., "1m", "5m", "1h") to minutes
///
/// # Errors
/// Returns an error for unknown units or non-numeric prefixes.
pub fn parse_interval_minutes(interval: &str) -> AnyResult<i64> {
    let unit_at = interval.char_indices().last().map_or(0, |(i, _)| i);
    let (value, unit) = interval.split_at(unit_at);
    let value: i64 = value
        .parse()
        .with_context(|| format!("Invalid interval format: {interval}"))?;
    match unit {
        "m" => Ok(value),
        "h" => Ok(value * 60),
        "d" => Ok(value * 1440),
        _ => anyhow::bail!("Invalid interval format: {interval}. Expected format: 1m, 5m, 1h, 1d"),
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Summarizes `candles` (oldest first) into trend, volatility, range and quote volume.
///
/// # Errors
/// Returns an error if there are no candles or prices are not positive.
pub fn features_from_candles(symbol: &str, candles: &[Candle]) -> AnyResult<MarketFeatures> {
    let (first, last) = match (candles.first(), candles.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => anyhow::bail!("No candles returned for {symbol}"),
    };
    if first.open <= Decimal::ZERO || last.close <= Decimal::ZERO {
        anyhow::bail!("Non-positive prices in candles for {symbol}");
    }

    let change_pct = to_f64((last.close - first.open) / first.open) * 100.0;

    let returns: Vec<f64> = candles
        .windows(2)
        .filter(|w| w[0].close > Decimal::ZERO)
        .map(|w| to_f64((w[1].close - w[0].close) / w[0].close))
        .collect();
    let volatility_pct = if returns.len() < 2 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
        variance.sqrt() * 100.0
    };

    let high = candles.iter().map(|c| c.high).max().unwrap_or(last.high);
    let low = candles.iter().map(|c| c.low).min().unwrap_or(last.low);
    let range_pct = if low > Decimal::ZERO {
        to_f64((high - low) / low) * 100.0
    } else {
        0.0
    };

    let volume = candles.iter().map(|c| to_f64(c.volume * c.close)).sum();

    Ok(MarketFeatures {
        symbol: symbol.to_string(),
        price: last.close,
        change_pct,
        volatility_pct,
        range_pct,
        volume,
        market_cap: None,
        observed_at: last.close_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::time::Duration as StdDuration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candle(hour: u32, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        let open_time = Utc.with_ymd_and_hms(2025, 1, 1, hour, 0, 0).unwrap();
        Candle {
            open_time,
            close_time: open_time + Duration::minutes(59),
            open,
            high,
            low,
            close,
            volume: dec!(2),
            trades: 10,
        }
    }

    #[test]
    fn test_interval_parsing() {
        assert_eq!(parse_interval_minutes("5m").unwrap(), 5);
        assert_eq!(parse_interval_minutes("1h").unwrap(), 60);
        assert_eq!(parse_interval_minutes("1d").unwrap(), 1440);
        assert!(parse_interval_minutes("1w").is_err());
        assert!(parse_interval_minutes("").is_err());
    }

    #[test]
    fn test_features_from_candles() {
        let candles = vec![
            candle(0, dec!(100), dec!(102), dec!(99), dec!(101)),
            candle(1, dec!(101), dec!(104), dec!(100), dec!(103)),
            candle(2, dec!(103), dec!(105), dec!(100), dec!(102)),
        ];
        let f = features_from_candles("SOL", &candles).unwrap();

        assert_eq!(f.price, dec!(102));
        assert!((f.change_pct - 2.0).abs() < 1e-9);
        // (105 - 99) / 99
        assert!((f.range_pct - 6.0606).abs() < 1e-3);
        assert!(f.volatility_pct > 0.0);
        // 2 * (101 + 103 + 102)
        assert!((f.volume - 612.0).abs() < 1e-9);
        f.validate().unwrap();
    }

    #[test]
    fn test_no_candles_is_an_error() {
        assert!(features_from_candles("SOL", &[]).is_err());
    }

    #[tokio::test]
    async fn test_features_via_candle_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/info"))
            .and(body_partial_json(json!({
                "type": "candleSnapshot",
                "req": { "coin": "BTC", "interval": "1h" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "t": 1_735_689_600_000_i64, "T": 1_735_693_199_999_i64, "s": "BTC", "i": "1h",
                  "o": "50000", "h": "50500", "l": "49500", "c": "50250", "v": "10", "n": 100 },
                { "t": 1_735_693_200_000_i64, "T": 1_735_696_799_999_i64, "s": "BTC", "i": "1h",
                  "o": "50250", "h": "51000", "l": "50000", "c": "50900", "v": "12", "n": 120 }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/info"))
            .and(body_partial_json(json!({ "type": "metaAndAssetCtxs" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "universe": [{ "name": "BTC", "szDecimals": 5 }] },
                [{ "markPx": "50900", "openInterest": "500" }]
            ])))
            .mount(&server)
            .await;

        let client = HyperliquidClient::new(server.uri(), 100, StdDuration::from_secs(5)).unwrap();
        let source = HyperliquidMarketData::new(client, "1h", 24);
        let f = source.features("BTC").await.unwrap();
        assert_eq!(f.symbol, "BTC");
        assert_eq!(f.price, dec!(50900));
        assert!(f.change_pct > 0.0);
        assert_eq!(f.market_cap, Some(25_450_000.0));
    }

    #[tokio::test]
    async fn test_empty_snapshot_is_collaborator_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = HyperliquidClient::new(server.uri(), 100, StdDuration::from_secs(5)).unwrap();
        let source = HyperliquidMarketData::new(client, "1h", 24);
        assert!(matches!(
            source.features("BTC").await,
            Err(AgentError::Collaborator(_))
        ));
    }
}
