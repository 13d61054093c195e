use async_trait::async_trait;
use risk_agent_core::{EmbeddingSource, MarketFeatures, Result};

/// Length of vectors produced by [`FeatureEmbedder`].
pub const FEATURE_DIMENSION: usize = 8;

/// Embeds market features directly, without a remote model.
///
/// Each component is squashed into a bounded range so no single statistic dominates
/// the cosine similarity. The last two components are a stable hash of the symbol,
/// which nudges an instrument's own history ahead of other instruments with
/// similar statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEmbedder;

impl FeatureEmbedder {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Synchronous form of [`EmbeddingSource::embed`].
    #[must_use]
    pub fn vectorize(features: &MarketFeatures) -> Vec<f32> {
        let (h1, h2) = symbol_components(&features.symbol);
        let log_volume = (features.volume.max(0.0) + 1.0).ln();
        let log_cap = features.market_cap.map_or(0.0, |cap| (cap.max(0.0) + 1.0).ln());

        let components = [
            (features.change_pct / 10.0).tanh(),
            (features.volatility_pct / 5.0).tanh(),
            (features.range_pct / 10.0).tanh(),
            (log_volume / 25.0).min(1.0),
            (log_cap / 30.0).min(1.0),
            1.0,
            h1,
            h2,
        ];

        #[allow(clippy::cast_possible_truncation)]
        components.iter().map(|c| *c as f32).collect()
    }
}

#[async_trait]
impl EmbeddingSource for FeatureEmbedder {
    fn dimension(&self) -> usize {
        FEATURE_DIMENSION
    }

    async fn embed(&self, features: &MarketFeatures) -> Result<Vec<f32>> {
        Ok(Self::vectorize(features))
    }
}

/// FNV-1a of the symbol, split into two components in `[-0.25, 0.25]`.
fn symbol_components(symbol: &str) -> (f64, f64) {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in symbol.to_ascii_uppercase().bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    let scale = |bits: u64| (f64::from((bits & 0xffff) as u16) / f64::from(u16::MAX) - 0.5) * 0.5;
    (scale(hash), scale(hash >> 32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::cosine_distance;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn features(symbol: &str, volatility: f64) -> MarketFeatures {
        MarketFeatures {
            symbol: symbol.to_string(),
            price: dec!(100),
            change_pct: -2.0,
            volatility_pct: volatility,
            range_pct: 4.0,
            volume: 5_000_000.0,
            market_cap: None,
            observed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_dimension_is_fixed() {
        let embedder = FeatureEmbedder::new();
        let v = embedder.embed(&features("BTC", 1.0)).await.unwrap();
        assert_eq!(v.len(), embedder.dimension());
        assert!(v.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(
            FeatureEmbedder::vectorize(&features("ETH", 2.0)),
            FeatureEmbedder::vectorize(&features("eth", 2.0))
        );
    }

    #[test]
    fn test_similar_markets_are_closer() {
        let base = FeatureEmbedder::vectorize(&features("BTC", 1.0));
        let calm = FeatureEmbedder::vectorize(&features("BTC", 1.2));
        let wild = FeatureEmbedder::vectorize(&features("BTC", 12.0));
        assert!(cosine_distance(&base, &calm) < cosine_distance(&base, &wild));
    }
}
