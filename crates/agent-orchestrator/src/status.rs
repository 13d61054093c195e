use crate::policy::Decision;
use chrono::{DateTime, Utc};
use risk_agent_core::{OrderSide, RiskCategory};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-instrument state within one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Assessing,
    Deciding,
    Executing,
}

/// A confirmed order and what happened to its ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub side: OrderSide,
    pub order_id: String,
    pub quantity: Decimal,
    pub price: Decimal,
    /// Ledger trade opened or closed by this order, once recorded.
    pub trade_id: Option<i64>,
    /// Set when the order was raised to the venue minimum.
    pub bumped: bool,
    /// False while the ledger write is queued for replay.
    pub recorded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentOutcome {
    pub symbol: String,
    /// Phases visited, always starting and ending in `Idle`.
    pub phases: Vec<Phase>,
    pub score: Option<f64>,
    pub category: Option<RiskCategory>,
    pub decision: Option<Decision>,
    /// A buy was turned into a hold by the market cap floor.
    pub screened_out: bool,
    pub execution: Option<ExecutionReport>,
    /// Pending ledger writes and unconfirmed orders resolved before this evaluation.
    pub replayed: usize,
    pub error: Option<String>,
}

impl InstrumentOutcome {
    pub(crate) fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            phases: vec![Phase::Idle],
            score: None,
            category: None,
            decision: None,
            screened_out: false,
            execution: None,
            replayed: 0,
            error: None,
        }
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        self.phases.push(phase);
    }

    /// Ends the evaluation, returning to `Idle`.
    pub(crate) fn finish(mut self) -> Self {
        self.phases.push(Phase::Idle);
        self
    }

    pub(crate) fn fail(mut self, reason: impl Into<String>) -> Self {
        self.error = Some(reason.into());
        self.finish()
    }

    #[must_use]
    pub fn reached(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per watchlist instrument, in watchlist order.
    pub outcomes: Vec<InstrumentOutcome>,
}

impl TickReport {
    #[must_use]
    pub fn outcome(&self, symbol: &str) -> Option<&InstrumentOutcome> {
        self.outcomes.iter().find(|o| o.symbol == symbol)
    }

    #[must_use]
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    #[must_use]
    pub fn executed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.execution.is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub reason: String,
    pub tick: u64,
    pub at: DateTime<Utc>,
}

/// Snapshot published after every completed tick and state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub state: AgentState,
    pub tick_interval_secs: u64,
    pub ticks_completed: u64,
    pub last_tick: Option<TickReport>,
    /// Most recent failure per instrument.
    pub last_failures: BTreeMap<String, FailureRecord>,
    pub pending_records: usize,
    pub memory_entries: Option<usize>,
    pub updated_at: DateTime<Utc>,
}

impl AgentStatus {
    #[must_use]
    pub fn new(tick_interval_secs: u64) -> Self {
        Self {
            state: AgentState::Stopped,
            tick_interval_secs,
            ticks_completed: 0,
            last_tick: None,
            last_failures: BTreeMap::new(),
            pending_records: 0,
            memory_entries: None,
            updated_at: Utc::now(),
        }
    }

    /// Folds a completed tick into the status.
    pub fn apply(&mut self, report: TickReport) {
        for outcome in &report.outcomes {
            if let Some(reason) = &outcome.error {
                self.last_failures.insert(
                    outcome.symbol.clone(),
                    FailureRecord {
                        reason: reason.clone(),
                        tick: report.tick,
                        at: report.finished_at,
                    },
                );
            }
        }
        self.ticks_completed = self.ticks_completed.max(report.tick);
        self.updated_at = report.finished_at;
        self.last_tick = Some(report);
    }
}
