//! In-process collaborators for driving the decision loop in tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use risk_agent_core::{
    AgentError, AssetMeta, Exchange, InMemoryTradeStore, InstrumentSide, MarketDataSource,
    MarketFeatures, NewTrade, OrderRequest, OrderResult, OrderStatus, Result, RiskModel, Trade, TradeLedger,
    TradeStatus, TradeStore,
};
use risk_agent_memory::{EngineSettings, FeatureEmbedder, RiskAssessmentEngine, RiskMemoryStore};
use risk_agent_orchestrator::{DecisionLoop, DecisionPolicy, LoopSettings};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CALL_TIMEOUT: Duration = Duration::from_secs(1);

/// Features for every symbol; selected symbols answer only after a delay.
#[derive(Default)]
pub struct ScriptedMarket {
    pub delays: Mutex<HashMap<String, Duration>>,
    pub market_caps: Mutex<HashMap<String, f64>>,
}

impl ScriptedMarket {
    pub fn delay(&self, symbol: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(symbol.to_string(), delay);
    }

    pub fn set_market_cap(&self, symbol: &str, market_cap: f64) {
        self.market_caps
            .lock()
            .unwrap()
            .insert(symbol.to_string(), market_cap);
    }
}

pub fn features(symbol: &str) -> MarketFeatures {
    MarketFeatures {
        symbol: symbol.to_string(),
        price: dec!(50000),
        change_pct: 0.5,
        volatility_pct: 0.4,
        range_pct: 1.2,
        volume: 2_000_000.0,
        market_cap: None,
        observed_at: Utc::now(),
    }
}

#[async_trait]
impl MarketDataSource for ScriptedMarket {
    async fn features(&self, symbol: &str) -> Result<MarketFeatures> {
        let delay = self.delays.lock().unwrap().get(symbol).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut features = features(symbol);
        features.market_cap = self.market_caps.lock().unwrap().get(symbol).copied();
        Ok(features)
    }
}

/// Returns a settable score per symbol, 50 when unset.
#[derive(Default)]
pub struct ScriptedModel {
    pub scores: Mutex<HashMap<String, f64>>,
}

impl ScriptedModel {
    pub fn set(&self, symbol: &str, score: f64) {
        self.scores.lock().unwrap().insert(symbol.to_string(), score);
    }
}

#[async_trait]
impl RiskModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn score(&self, features: &MarketFeatures) -> Result<f64> {
        Ok(self
            .scores
            .lock()
            .unwrap()
            .get(&features.symbol)
            .copied()
            .unwrap_or(50.0))
    }
}

/// Fills every order at a fixed price unless told to reject. Fills are kept by
/// client order id so `order_status` can answer for them later.
pub struct MockExchange {
    pub price: Decimal,
    pub size_decimals: u32,
    pub reject: AtomicBool,
    /// `order_status` reports every order as still open.
    pub status_pending: AtomicBool,
    /// Fill is registered at once but the reply only comes after this delay.
    pub confirm_delay: Mutex<Option<Duration>>,
    pub orders: Mutex<Vec<OrderRequest>>,
    pub fills: Mutex<HashMap<String, OrderResult>>,
    pub status_queries: AtomicUsize,
}

impl Default for MockExchange {
    fn default() -> Self {
        Self {
            price: dec!(50000),
            size_decimals: 5,
            reject: AtomicBool::new(false),
            status_pending: AtomicBool::new(false),
            confirm_delay: Mutex::new(None),
            orders: Mutex::new(Vec::new()),
            fills: Mutex::new(HashMap::new()),
            status_queries: AtomicUsize::new(0),
        }
    }
}

impl MockExchange {
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }

    pub fn fill_count(&self) -> usize {
        self.fills.lock().unwrap().len()
    }

    pub fn confirm_after(&self, delay: Duration) {
        *self.confirm_delay.lock().unwrap() = Some(delay);
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderResult> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(AgentError::exchange("insufficient margin"));
        }
        let fill = {
            let mut orders = self.orders.lock().unwrap();
            orders.push(order.clone());
            let fill = OrderResult {
                order_id: format!("mock-{}", orders.len()),
                symbol: order.symbol.clone(),
                side: order.side,
                filled_quantity: order.quantity,
                avg_price: self.price,
                commission: Decimal::ZERO,
                timestamp: Utc::now(),
            };
            self.fills
                .lock()
                .unwrap()
                .insert(order.client_order_id.clone(), fill.clone());
            fill
        };
        let delay = *self.confirm_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(fill)
    }

    async fn order_status(&self, _symbol: &str, client_order_id: &str) -> Result<OrderStatus> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        if self.status_pending.load(Ordering::SeqCst) {
            return Ok(OrderStatus::Pending);
        }
        Ok(self
            .fills
            .lock()
            .unwrap()
            .get(client_order_id)
            .cloned()
            .map_or(OrderStatus::NotFilled, OrderStatus::Filled))
    }

    async fn get_market_price(&self, _symbol: &str) -> Result<Decimal> {
        Ok(self.price)
    }

    async fn asset_meta(&self, symbol: &str) -> Result<AssetMeta> {
        Ok(AssetMeta {
            symbol: symbol.to_string(),
            size_decimals: self.size_decimals,
            min_notional: dec!(10),
            min_position_size: Decimal::ZERO,
        })
    }
}

/// Trade store whose next `n` writes fail with a storage error.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryTradeStore,
    failures: AtomicUsize,
}

impl FlakyStore {
    pub fn fail_next(&self, writes: usize) {
        self.failures.store(writes, Ordering::SeqCst);
    }

    fn should_fail(&self) -> bool {
        self.failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl TradeStore for FlakyStore {
    async fn insert_open(&self, trade: NewTrade) -> Result<Trade> {
        if self.should_fail() {
            return Err(AgentError::storage("connection reset"));
        }
        self.inner.insert_open(trade).await
    }

    async fn close(
        &self,
        trade_id: i64,
        exit_price: Decimal,
        closed_at: DateTime<Utc>,
    ) -> Result<Trade> {
        if self.should_fail() {
            return Err(AgentError::storage("connection reset"));
        }
        self.inner.close(trade_id, exit_price, closed_at).await
    }

    async fn find_open(&self, symbol: &str, side: InstrumentSide) -> Result<Option<Trade>> {
        self.inner.find_open(symbol, side).await
    }

    async fn list(&self, status: Option<TradeStatus>) -> Result<Vec<Trade>> {
        self.inner.list(status).await
    }
}

pub struct Harness {
    pub market: Arc<ScriptedMarket>,
    pub model: Arc<ScriptedModel>,
    pub exchange: Arc<MockExchange>,
    pub store: Arc<FlakyStore>,
    pub decision_loop: Arc<DecisionLoop>,
}

impl Harness {
    /// Memory weight 0 so each tick acts on the scripted score alone.
    pub fn new() -> Self {
        Self::with_settings(LoopSettings {
            call_timeout: CALL_TIMEOUT,
            ..LoopSettings::default()
        })
    }

    pub fn with_settings(settings: LoopSettings) -> Self {
        let market = Arc::new(ScriptedMarket::default());
        let model = Arc::new(ScriptedModel::default());
        let exchange = Arc::new(MockExchange::default());
        let store = Arc::new(FlakyStore::default());

        let memory = RiskMemoryStore::in_memory(risk_agent_memory::FEATURE_DIMENSION);
        let engine = RiskAssessmentEngine::new(
            Arc::new(FeatureEmbedder::new()),
            model.clone(),
            memory,
            EngineSettings {
                memory_weight: 0.0,
                call_timeout: settings.call_timeout,
                ..EngineSettings::default()
            },
        )
        .unwrap();

        let decision_loop = Arc::new(DecisionLoop::new(
            engine,
            TradeLedger::new(store.clone()),
            exchange.clone(),
            market.clone(),
            DecisionPolicy::default(),
            settings,
        ));

        Self {
            market,
            model,
            exchange,
            store,
            decision_loop,
        }
    }
}
