use crate::risk::CategoryThresholds;
use crate::sizing::MinSizePolicy;
use crate::types::InstrumentSide;
use anyhow::{ensure, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub hyperliquid: HyperliquidConfig,
    pub embeddings: EmbeddingConfig,
    pub risk_model: RiskModelConfig,
    pub agent: AgentConfig,
    pub policy: PolicyConfig,
    pub categories: CategoryThresholds,
    pub sizing: MinSizePolicy,
}

impl AppConfig {
    /// Checks cross-field constraints figment cannot express.
    ///
    /// # Errors
    /// Returns an error describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        let agent = &self.agent;
        ensure!(agent.tick_interval_secs > 0, "agent.tick_interval_secs must be positive");
        ensure!(agent.max_concurrency > 0, "agent.max_concurrency must be positive");
        ensure!(
            agent.budget_per_trade > Decimal::ZERO,
            "agent.budget_per_trade must be positive"
        );
        ensure!(
            (0.0..=1.0).contains(&agent.memory_weight),
            "agent.memory_weight must lie in [0, 1], got {}",
            agent.memory_weight
        );
        ensure!(
            self.policy.buy_below <= self.policy.sell_above,
            "policy.buy_below ({}) must not exceed policy.sell_above ({})",
            self.policy.buy_below,
            self.policy.sell_above
        );
        ensure!(
            self.categories.low_below <= self.categories.high_at_or_above,
            "categories.low_below must not exceed categories.high_at_or_above"
        );
        if let Some(floor) = agent.min_market_cap {
            ensure!(
                floor.is_finite() && floor >= 0.0,
                "agent.min_market_cap must be a non-negative number, got {floor}"
            );
        }
        ensure!(self.embeddings.dimension > 0, "embeddings.dimension must be positive");
        if let MinSizePolicy::BumpWithinTolerance { tolerance } = self.sizing {
            ensure!(tolerance >= Decimal::ZERO, "sizing.tolerance must not be negative");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    #[default]
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            url: "postgresql://localhost/risk_agent".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Live,
    #[default]
    Paper,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HyperliquidConfig {
    pub api_url: String,
    pub execution_mode: ExecutionMode,
    /// Venue minimum order value in USDC.
    pub min_notional: Decimal,
    /// Venue minimum position value in USDC.
    pub min_position_size: Decimal,
    /// Simulated slippage for paper fills, in basis points.
    pub paper_slippage_bps: Decimal,
    /// Simulated taker fee for paper fills, as a fraction of notional.
    pub paper_commission_rate: Decimal,
    /// Worst price accepted by live IOC orders, in basis points from the mid.
    pub max_slippage_bps: Decimal,
    pub candle_interval: String,
    pub candle_lookback: u32,
    pub requests_per_second: u32,
    pub request_timeout_ms: u64,
}

impl Default for HyperliquidConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.hyperliquid.xyz".to_string(),
            execution_mode: ExecutionMode::Paper,
            min_notional: Decimal::TEN,
            min_position_size: Decimal::new(1, 3),
            paper_slippage_bps: Decimal::new(5, 0),
            paper_commission_rate: Decimal::new(35, 5),
            max_slippage_bps: Decimal::new(50, 0),
            candle_interval: "1h".to_string(),
            candle_lookback: 24,
            requests_per_second: 20,
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAi,
    /// Deterministic embedding computed from the market features themselves.
    #[default]
    Features,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub dimension: usize,
    pub api_url: String,
    pub requests_per_second: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Features,
            model: "text-embedding-3-small".to_string(),
            dimension: 8,
            api_url: "https://api.openai.com/v1".to_string(),
            requests_per_second: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskModelProvider {
    OpenAi,
    #[default]
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskModelConfig {
    pub provider: RiskModelProvider,
    pub model: String,
    pub api_url: String,
    pub temperature: f32,
    pub requests_per_second: u32,
}

impl Default for RiskModelConfig {
    fn default() -> Self {
        Self {
            provider: RiskModelProvider::Heuristic,
            model: "gpt-4o-mini".to_string(),
            api_url: "https://api.openai.com/v1".to_string(),
            temperature: 0.0,
            requests_per_second: 2,
        }
    }
}

/// Which assessments are appended to risk memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPolicy {
    #[default]
    EveryAssessment,
    ExecutedOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub tick_interval_secs: u64,
    /// Quote-currency value spent on each opened position.
    pub budget_per_trade: Decimal,
    pub collaborator_timeout_ms: u64,
    /// Instruments evaluated in parallel within one tick.
    pub max_concurrency: usize,
    pub neighbors_k: usize,
    /// Share of the final score taken from retrieved memory.
    pub memory_weight: f64,
    pub record_policy: RecordPolicy,
    /// Side opened on a buy decision.
    pub position_side: InstrumentSide,
    /// Symbols tracked at startup.
    pub watchlist: Vec<String>,
    /// Start ticking immediately when the process boots.
    pub autostart: bool,
    /// Positions are only opened on instruments whose `market_cap` reaches this.
    /// Unset disables the screen.
    pub min_market_cap: Option<f64>,
}

impl AgentConfig {
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    #[must_use]
    pub const fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 300,
            budget_per_trade: Decimal::new(15, 0),
            collaborator_timeout_ms: 15_000,
            max_concurrency: 4,
            neighbors_k: 5,
            memory_weight: 0.5,
            record_policy: RecordPolicy::EveryAssessment,
            position_side: InstrumentSide::Long,
            watchlist: vec!["BTC".to_string(), "ETH".to_string()],
            autostart: false,
            min_market_cap: None,
        }
    }
}

/// Score thresholds for buy and sell decisions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Open when the score is strictly below this and nothing is open.
    pub buy_below: f64,
    /// Close when the score is strictly above this and a trade is open.
    pub sell_above: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            buy_below: 40.0,
            sell_above: 70.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn test_memory_weight_out_of_range() {
        let mut config = AppConfig::default();
        config.agent.memory_weight = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_market_cap_floor_rejected() {
        let mut config = AppConfig::default();
        config.agent.min_market_cap = Some(-1.0);
        assert!(config.validate().is_err());
        config.agent.min_market_cap = Some(20_000_000.0);
        config.validate().unwrap();
    }

    #[test]
    fn test_inverted_policy_rejected() {
        let mut config = AppConfig::default();
        config.policy.buy_below = 80.0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("buy_below"));
    }

    #[test]
    fn test_default_sizing_tolerance_is_one_dollar() {
        assert_eq!(
            AppConfig::default().sizing,
            MinSizePolicy::BumpWithinTolerance {
                tolerance: Decimal::ONE
            }
        );
    }
}
