//! Per-tick evaluation of every watchlist instrument.
//!
//! Each instrument walks `Idle → Assessing → Deciding → {Executing | Idle}` under its
//! own lock, so one instrument's slow collaborator never holds up another and the
//! next tick always observes the previous tick's ledger writes.
//!
//! Ledger writes happen only after the exchange confirms a fill. A write that fails is
//! queued on the instrument and replayed before its next decision; replay treats
//! `DuplicateOpenTrade` and `AlreadyClosed` as already applied. A submit that fails or
//! times out may still have filled, so the order is queued as unconfirmed and looked up
//! by client order id before the instrument may trade again.

use crate::policy::{Decision, DecisionPolicy};
use crate::status::{ExecutionReport, InstrumentOutcome, Phase, TickReport};
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use parking_lot::{Mutex as SyncMutex, RwLock};
use risk_agent_core::sizing::truncate_quantity;
use risk_agent_core::{
    normalize_for, with_timeout, AgentError, AppConfig, Exchange, InstrumentSide,
    MarketDataSource, MarketFeatures, MinSizePolicy, OrderRequest, OrderResult, OrderSide,
    OrderStatus, RecordPolicy, Result, RiskAssessment, SizeRejection, Trade, TradeLedger,
    WatchlistEntry,
};
use risk_agent_memory::RiskAssessmentEngine;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    /// Quote-currency value of each opened position.
    pub budget_per_trade: Decimal,
    /// Side recorded in the ledger for positions this agent opens.
    pub position_side: InstrumentSide,
    pub sizing: MinSizePolicy,
    pub record_policy: RecordPolicy,
    pub max_concurrency: usize,
    pub call_timeout: Duration,
    /// Buys are skipped below this market cap; unknown caps fail the screen.
    pub min_market_cap: Option<f64>,
}

impl LoopSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            budget_per_trade: config.agent.budget_per_trade,
            position_side: config.agent.position_side,
            sizing: config.sizing,
            record_policy: config.agent.record_policy,
            max_concurrency: config.agent.max_concurrency.max(1),
            call_timeout: config.agent.collaborator_timeout(),
            min_market_cap: config.agent.min_market_cap,
        }
    }

    fn passes_screen(&self, features: &MarketFeatures) -> bool {
        match (self.min_market_cap, features.market_cap) {
            (None, _) => true,
            (Some(floor), Some(cap)) => cap >= floor,
            (Some(_), None) => false,
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// A ledger write for an order the exchange confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWrite {
    Open {
        side: InstrumentSide,
        strike_price: Decimal,
        entry_price: Decimal,
        quantity: Decimal,
    },
    Close {
        trade_id: i64,
        exit_price: Decimal,
    },
}

/// What a fill of a submitted order does to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillTarget {
    Open {
        side: InstrumentSide,
        strike_price: Decimal,
    },
    Close {
        trade_id: i64,
    },
}

impl FillTarget {
    #[must_use]
    pub fn write_for(self, fill: &OrderResult) -> LedgerWrite {
        match self {
            Self::Open { side, strike_price } => LedgerWrite::Open {
                side,
                strike_price,
                entry_price: fill.avg_price,
                quantity: fill.filled_quantity,
            },
            Self::Close { trade_id } => LedgerWrite::Close {
                trade_id,
                exit_price: fill.avg_price,
            },
        }
    }
}

/// Work an instrument must finish before its next decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRecord {
    /// Confirmed fill whose ledger write failed.
    Write(LedgerWrite),
    /// Submitted order whose outcome never reached us.
    Unconfirmed {
        order: OrderRequest,
        on_fill: FillTarget,
    },
}

#[derive(Default)]
struct InstrumentSlot {
    pending: VecDeque<PendingRecord>,
}

struct Execution {
    report: ExecutionReport,
    record_error: Option<AgentError>,
}

pub struct DecisionLoop {
    engine: RiskAssessmentEngine,
    ledger: TradeLedger,
    exchange: Arc<dyn Exchange>,
    market_data: Arc<dyn MarketDataSource>,
    policy: RwLock<DecisionPolicy>,
    settings: LoopSettings,
    slots: SyncMutex<HashMap<String, Arc<Mutex<InstrumentSlot>>>>,
    ticks: AtomicU64,
}

impl DecisionLoop {
    #[must_use]
    pub fn new(
        engine: RiskAssessmentEngine,
        ledger: TradeLedger,
        exchange: Arc<dyn Exchange>,
        market_data: Arc<dyn MarketDataSource>,
        policy: DecisionPolicy,
        settings: LoopSettings,
    ) -> Self {
        Self {
            engine,
            ledger,
            exchange,
            market_data,
            policy: RwLock::new(policy),
            settings,
            slots: SyncMutex::new(HashMap::new()),
            ticks: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    #[must_use]
    pub const fn engine(&self) -> &RiskAssessmentEngine {
        &self.engine
    }

    #[must_use]
    pub const fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    #[must_use]
    pub fn policy(&self) -> DecisionPolicy {
        *self.policy.read()
    }

    /// Replaces the decision thresholds; takes effect from the next tick.
    pub fn set_policy(&self, policy: DecisionPolicy) {
        tracing::info!(
            buy_below = policy.buy_below,
            sell_above = policy.sell_above,
            "Decision policy updated"
        );
        *self.policy.write() = policy;
    }

    #[must_use]
    pub fn ticks_completed(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Pending ledger writes and unconfirmed orders, across all instruments.
    pub async fn pending_records(&self) -> usize {
        let slots: Vec<_> = self.slots.lock().values().cloned().collect();
        let mut total = 0;
        for slot in slots {
            total += slot.lock().await.pending.len();
        }
        total
    }

    /// Replays every instrument's pending work once more and returns what is still
    /// owed, ordered by symbol.
    pub async fn flush_pending(&self) -> Vec<(String, PendingRecord)> {
        let mut slots: Vec<(String, Arc<Mutex<InstrumentSlot>>)> = self
            .slots
            .lock()
            .iter()
            .map(|(symbol, slot)| (symbol.clone(), Arc::clone(slot)))
            .collect();
        slots.sort_by(|a, b| a.0.cmp(&b.0));

        let mut remaining = Vec::new();
        for (symbol, slot) in slots {
            let mut slot = slot.lock().await;
            if slot.pending.is_empty() {
                continue;
            }
            if let Err(e) = self.replay_pending(&symbol, &mut slot).await {
                tracing::warn!(%symbol, error = %e, "Final replay failed");
            }
            remaining.extend(slot.pending.iter().map(|r| (symbol.clone(), r.clone())));
        }
        remaining
    }

    fn slot(&self, symbol: &str) -> Arc<Mutex<InstrumentSlot>> {
        Arc::clone(self.slots.lock().entry(symbol.to_string()).or_default())
    }

    /// Evaluates every entry of `entries`, at most `max_concurrency` at a time.
    /// Failures stay with their instrument; the tick itself always completes.
    pub async fn tick(self: &Arc<Self>, entries: &[WatchlistEntry]) -> TickReport {
        let started_at = Utc::now();
        let policy = self.policy();

        let jobs: Vec<(usize, String)> = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (index, entry.symbol.clone()))
            .collect();
        let this = Arc::clone(self);
        let mut outcomes: Vec<(usize, InstrumentOutcome)> = stream::iter(jobs)
            .map(move |(index, symbol)| {
                let this = Arc::clone(&this);
                async move {
                    let outcome = this.evaluate(&symbol, policy).await;
                    (index, outcome)
                }
            })
            .buffer_unordered(self.settings.max_concurrency.max(1))
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let report = TickReport {
            tick,
            started_at,
            finished_at: Utc::now(),
            outcomes: outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
        };
        tracing::info!(
            tick,
            instruments = report.outcomes.len(),
            executed = report.executed(),
            failures = report.failures(),
            "Tick complete"
        );
        report
    }

    async fn evaluate(&self, symbol: &str, policy: DecisionPolicy) -> InstrumentOutcome {
        let slot = self.slot(symbol);
        let mut slot = slot.lock().await;
        let mut outcome = InstrumentOutcome::new(symbol);

        match self.replay_pending(symbol, &mut slot).await {
            Ok(replayed) => outcome.replayed = replayed,
            Err(e) => {
                tracing::error!(%symbol, error = %e, "Pending work still unresolved");
                return outcome.fail(format!("pending work not resolved: {e}"));
            }
        }

        outcome.enter(Phase::Assessing);
        let (features, assessment) = match self.assess(symbol).await {
            Ok(assessed) => assessed,
            Err(e) => {
                log_failure(symbol, Phase::Assessing, &e);
                return outcome.fail(e.to_string());
            }
        };
        outcome.score = Some(assessment.score);
        outcome.category = Some(assessment.category);
        if self.settings.record_policy == RecordPolicy::EveryAssessment {
            self.remember(&assessment).await;
        }

        outcome.enter(Phase::Deciding);
        let side = self.settings.position_side;
        let open = match with_timeout(
            "find_open_trade",
            self.settings.call_timeout,
            self.ledger.find_open(symbol, side),
        )
        .await
        {
            Ok(open) => open,
            Err(e) => {
                log_failure(symbol, Phase::Deciding, &e);
                return outcome.fail(e.to_string());
            }
        };
        let mut decision = policy.decide(assessment.score, open.is_some());
        if decision == Decision::Buy && !self.settings.passes_screen(&features) {
            tracing::info!(
                %symbol,
                market_cap = ?features.market_cap,
                floor = ?self.settings.min_market_cap,
                "Below market cap floor, not opening"
            );
            outcome.screened_out = true;
            decision = Decision::Hold;
        }
        outcome.decision = Some(decision);
        tracing::debug!(
            %symbol,
            score = assessment.score,
            %decision,
            open_trade = open.as_ref().map(|t| t.id),
            "Decided"
        );

        let execution = match (decision, open) {
            (Decision::Buy, None) => {
                outcome.enter(Phase::Executing);
                self.open_position(symbol, &mut slot).await
            }
            (Decision::Sell, Some(trade)) => {
                outcome.enter(Phase::Executing);
                self.close_position(&trade, &mut slot).await
            }
            _ => return outcome.finish(),
        };

        match execution {
            Ok(Execution {
                report,
                record_error,
            }) => {
                if self.settings.record_policy == RecordPolicy::ExecutedOnly {
                    self.remember(&assessment).await;
                }
                if let Some(e) = record_error {
                    outcome.error = Some(format!(
                        "order {} filled but not recorded: {e}",
                        report.order_id
                    ));
                }
                outcome.execution = Some(report);
                outcome.finish()
            }
            Err(e) => {
                log_failure(symbol, Phase::Executing, &e);
                outcome.fail(e.to_string())
            }
        }
    }

    async fn assess(&self, symbol: &str) -> Result<(MarketFeatures, RiskAssessment)> {
        let features = with_timeout(
            "market_data",
            self.settings.call_timeout,
            self.market_data.features(symbol),
        )
        .await?;
        let assessment = self.engine.assess(symbol, &features).await?;
        Ok((features, assessment))
    }

    async fn remember(&self, assessment: &RiskAssessment) {
        if let Err(e) = self.engine.record(assessment).await {
            log_failure(&assessment.token, Phase::Assessing, &e);
        }
    }

    async fn open_position(&self, symbol: &str, slot: &mut InstrumentSlot) -> Result<Execution> {
        let limit = self.settings.call_timeout;
        let price = with_timeout(
            "get_market_price",
            limit,
            self.exchange.get_market_price(symbol),
        )
        .await?;
        let meta = with_timeout("asset_meta", limit, self.exchange.asset_meta(symbol)).await?;
        let size = normalize_for(self.settings.budget_per_trade, price, &meta, self.settings.sizing)?;

        let side = self.settings.position_side;
        let order = OrderRequest::market(symbol, entry_order_side(side), size.quantity, false);
        let target = FillTarget::Open {
            side,
            strike_price: price,
        };
        let fill = self.submit(&order, target, slot).await?;

        let (trade_id, record_error) = self
            .record_fill(symbol, target.write_for(&fill), slot)
            .await;
        Ok(Execution {
            report: report(&fill, trade_id, size.bumped),
            record_error,
        })
    }

    async fn close_position(&self, trade: &Trade, slot: &mut InstrumentSlot) -> Result<Execution> {
        let meta = with_timeout(
            "asset_meta",
            self.settings.call_timeout,
            self.exchange.asset_meta(&trade.symbol),
        )
        .await?;
        let quantity = truncate_quantity(trade.quantity, meta.size_decimals);
        if quantity.is_zero() {
            return Err(SizeRejection::ZeroQuantity {
                size_decimals: meta.size_decimals,
            }
            .into());
        }

        let order =
            OrderRequest::market(&trade.symbol, exit_order_side(trade.option_type), quantity, true);
        let target = FillTarget::Close { trade_id: trade.id };
        let fill = self.submit(&order, target, slot).await?;

        let (trade_id, record_error) = self
            .record_fill(&trade.symbol, target.write_for(&fill), slot)
            .await;
        Ok(Execution {
            report: report(&fill, trade_id, false),
            record_error,
        })
    }

    /// Submits `order`. If the call fails without a definite answer the order is
    /// queued as unconfirmed, since the venue may have filled it anyway.
    async fn submit(
        &self,
        order: &OrderRequest,
        on_fill: FillTarget,
        slot: &mut InstrumentSlot,
    ) -> Result<OrderResult> {
        let submitted = with_timeout(
            "submit_order",
            self.settings.call_timeout,
            self.exchange.submit_order(order),
        )
        .await;
        let fill = match submitted {
            Ok(fill) => fill,
            Err(e) => {
                tracing::error!(
                    symbol = %order.symbol,
                    cloid = %order.client_order_id,
                    error = %e,
                    "Order outcome unknown, reconciling before the next decision"
                );
                slot.pending.push_back(PendingRecord::Unconfirmed {
                    order: order.clone(),
                    on_fill,
                });
                return Err(e);
            }
        };
        if fill.filled_quantity <= Decimal::ZERO || fill.avg_price <= Decimal::ZERO {
            return Err(AgentError::exchange(format!(
                "order {} for {} reported no fill",
                fill.order_id, order.symbol
            )));
        }
        Ok(fill)
    }

    /// Writes the ledger record for a confirmed fill, queueing it on failure.
    async fn record_fill(
        &self,
        symbol: &str,
        record: LedgerWrite,
        slot: &mut InstrumentSlot,
    ) -> (Option<i64>, Option<AgentError>) {
        match self.write(symbol, &record).await {
            Ok(trade_id) => (Some(trade_id), None),
            Err(e) if e.is_invariant_violation() => {
                tracing::error!(%symbol, ?record, error = %e, "Ledger rejected a confirmed fill");
                (None, Some(e))
            }
            Err(e) => {
                tracing::error!(
                    %symbol,
                    ?record,
                    error = %e,
                    "Confirmed fill not recorded, queued for replay"
                );
                slot.pending.push_back(PendingRecord::Write(record));
                (None, Some(e))
            }
        }
    }

    /// Resolves queued work front to back; stops at the first entry that cannot be
    /// resolved yet.
    async fn replay_pending(&self, symbol: &str, slot: &mut InstrumentSlot) -> Result<usize> {
        let mut applied = 0;
        while let Some(record) = slot.pending.front().cloned() {
            match record {
                PendingRecord::Write(write) => match self.write(symbol, &write).await {
                    Ok(trade_id) => {
                        tracing::info!(%symbol, trade_id, "Replayed pending ledger write");
                    }
                    Err(
                        AgentError::DuplicateOpenTrade { .. } | AgentError::AlreadyClosed { .. },
                    ) => {
                        tracing::info!(%symbol, ?write, "Pending ledger write was already applied");
                    }
                    Err(e) => return Err(e),
                },
                PendingRecord::Unconfirmed { order, on_fill } => {
                    if let Some(fill) = self.reconcile(&order).await? {
                        tracing::warn!(
                            %symbol,
                            cloid = %order.client_order_id,
                            order_id = %fill.order_id,
                            quantity = %fill.filled_quantity,
                            price = %fill.avg_price,
                            "Unconfirmed order was filled, recording it"
                        );
                        if let Some(front) = slot.pending.front_mut() {
                            *front = PendingRecord::Write(on_fill.write_for(&fill));
                        }
                        continue;
                    }
                    tracing::info!(
                        %symbol,
                        cloid = %order.client_order_id,
                        "Unconfirmed order did not fill"
                    );
                }
            }
            slot.pending.pop_front();
            applied += 1;
        }
        Ok(applied)
    }

    /// Asks the venue what became of `order`; `None` means it did not fill.
    async fn reconcile(&self, order: &OrderRequest) -> Result<Option<OrderResult>> {
        let status = with_timeout(
            "order_status",
            self.settings.call_timeout,
            self.exchange.order_status(&order.symbol, &order.client_order_id),
        )
        .await?;
        match status {
            OrderStatus::Filled(fill) if fill.filled_quantity > Decimal::ZERO => Ok(Some(fill)),
            OrderStatus::Filled(_) | OrderStatus::NotFilled => Ok(None),
            OrderStatus::Pending => Err(AgentError::exchange(format!(
                "order {} for {} is still unresolved at the venue",
                order.client_order_id, order.symbol
            ))),
        }
    }

    async fn write(&self, symbol: &str, record: &LedgerWrite) -> Result<i64> {
        let limit = self.settings.call_timeout;
        let trade = match *record {
            LedgerWrite::Open {
                side,
                strike_price,
                entry_price,
                quantity,
            } => {
                with_timeout(
                    "record_trade",
                    limit,
                    self.ledger
                        .open(symbol, side, strike_price, entry_price, quantity),
                )
                .await?
            }
            LedgerWrite::Close {
                trade_id,
                exit_price,
            } => with_timeout("record_trade", limit, self.ledger.close(trade_id, exit_price)).await?,
        };
        Ok(trade.id)
    }
}

const fn entry_order_side(side: InstrumentSide) -> OrderSide {
    match side {
        InstrumentSide::Long | InstrumentSide::Call => OrderSide::Buy,
        InstrumentSide::Short | InstrumentSide::Put => OrderSide::Sell,
    }
}

const fn exit_order_side(side: InstrumentSide) -> OrderSide {
    match entry_order_side(side) {
        OrderSide::Buy => OrderSide::Sell,
        OrderSide::Sell => OrderSide::Buy,
    }
}

fn report(fill: &OrderResult, trade_id: Option<i64>, bumped: bool) -> ExecutionReport {
    ExecutionReport {
        side: fill.side,
        order_id: fill.order_id.clone(),
        quantity: fill.filled_quantity,
        price: fill.avg_price,
        trade_id,
        bumped,
        recorded: trade_id.is_some(),
    }
}

fn log_failure(symbol: &str, phase: Phase, error: &AgentError) {
    if error.is_invariant_violation() {
        tracing::error!(%symbol, ?phase, %error, "Invariant violation");
    } else {
        tracing::warn!(%symbol, ?phase, %error, "Instrument evaluation failed");
    }
}
