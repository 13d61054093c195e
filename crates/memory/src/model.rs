use async_trait::async_trait;
use risk_agent_core::risk::clamp_score;
use risk_agent_core::{MarketFeatures, Result, RiskModel};

/// Offline scorer from volatility, liquidity and trend.
///
/// Contributions (maximum points): volatility 40, intraperiod range 25,
/// downtrend 20, thin liquidity 15.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicRiskModel;

impl HeuristicRiskModel {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn evaluate(features: &MarketFeatures) -> f64 {
        let volatility = (features.volatility_pct / 5.0).min(1.0) * 40.0;
        let range = (features.range_pct / 20.0).min(1.0) * 25.0;
        let downtrend = if features.change_pct < 0.0 {
            (-features.change_pct / 15.0).min(1.0) * 20.0
        } else {
            0.0
        };
        // $1bn of window volume counts as fully liquid
        let depth = ((features.volume.max(0.0) + 1.0).ln() / 1e9_f64.ln()).min(1.0);
        let liquidity = (1.0 - depth) * 15.0;

        clamp_score(volatility + range + downtrend + liquidity)
    }
}

#[async_trait]
impl RiskModel for HeuristicRiskModel {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn score(&self, features: &MarketFeatures) -> Result<f64> {
        features.validate()?;
        Ok(Self::evaluate(features))
    }
}
