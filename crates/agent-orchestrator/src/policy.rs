use risk_agent_core::PolicyConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("buy"),
            Self::Sell => f.write_str("sell"),
            Self::Hold => f.write_str("hold"),
        }
    }
}

/// Maps a risk score and the current position to an action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionPolicy {
    pub buy_below: f64,
    pub sell_above: f64,
}

impl DecisionPolicy {
    /// Buy on low risk with nothing open, sell on high risk with a position open.
    #[must_use]
    pub fn decide(&self, score: f64, has_open_trade: bool) -> Decision {
        if !has_open_trade && score < self.buy_below {
            Decision::Buy
        } else if has_open_trade && score > self.sell_above {
            Decision::Sell
        } else {
            Decision::Hold
        }
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        PolicyConfig::default().into()
    }
}

impl From<PolicyConfig> for DecisionPolicy {
    fn from(config: PolicyConfig) -> Self {
        Self {
            buy_below: config.buy_below,
            sell_above: config.sell_above,
        }
    }
}
