use crate::status::{AgentState, TickReport};
use chrono::{DateTime, Utc};
use risk_agent_core::OrderSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Broadcast to subscribers as the agent works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    StateChanged {
        state: AgentState,
        timestamp: DateTime<Utc>,
    },

    OrderExecuted {
        symbol: String,
        side: OrderSide,
        order_id: String,
        quantity: Decimal,
        price: Decimal,
        trade_id: Option<i64>,
    },

    InstrumentFailed {
        symbol: String,
        reason: String,
    },

    TickCompleted {
        tick: u64,
        instruments: usize,
        executed: usize,
        failures: usize,
        finished_at: DateTime<Utc>,
    },
}

impl AgentEvent {
    /// Events describing a completed tick, per-instrument first.
    #[must_use]
    pub fn from_report(report: &TickReport) -> Vec<Self> {
        let mut events = Vec::new();
        for outcome in &report.outcomes {
            if let Some(execution) = &outcome.execution {
                events.push(Self::OrderExecuted {
                    symbol: outcome.symbol.clone(),
                    side: execution.side,
                    order_id: execution.order_id.clone(),
                    quantity: execution.quantity,
                    price: execution.price,
                    trade_id: execution.trade_id,
                });
            }
            if let Some(reason) = &outcome.error {
                events.push(Self::InstrumentFailed {
                    symbol: outcome.symbol.clone(),
                    reason: reason.clone(),
                });
            }
        }
        events.push(Self::TickCompleted {
            tick: report.tick,
            instruments: report.outcomes.len(),
            executed: report.executed(),
            failures: report.failures(),
            finished_at: report.finished_at,
        });
        events
    }
}
