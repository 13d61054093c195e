use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use risk_agent_core::{
    AssetMeta, Exchange, MarketDataSource, MarketFeatures, OrderRequest, OrderResult,
    OrderStatus, Result, RiskModel, TradeLedger,
};
use risk_agent_memory::{
    EngineSettings, FeatureEmbedder, RiskAssessmentEngine, RiskMemoryStore, FEATURE_DIMENSION,
};
use risk_agent_orchestrator::{
    AgentActor, AgentHandle, DecisionLoop, DecisionPolicy, LoopSettings, Watchlist,
};
use risk_agent_web_api::ApiServer;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct FlatMarket;

#[async_trait]
impl MarketDataSource for FlatMarket {
    async fn features(&self, symbol: &str) -> Result<MarketFeatures> {
        Ok(MarketFeatures {
            symbol: symbol.to_string(),
            price: dec!(2000),
            change_pct: 0.1,
            volatility_pct: 0.2,
            range_pct: 0.5,
            volume: 1_000_000.0,
            market_cap: None,
            observed_at: chrono::Utc::now(),
        })
    }
}

/// Always low risk, so every untracked instrument is bought.
struct CalmModel;

#[async_trait]
impl RiskModel for CalmModel {
    fn name(&self) -> &str {
        "calm"
    }

    async fn score(&self, _features: &MarketFeatures) -> Result<f64> {
        Ok(15.0)
    }
}

struct InstantExchange;

#[async_trait]
impl Exchange for InstantExchange {
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderResult> {
        Ok(OrderResult {
            order_id: "test-1".to_string(),
            symbol: order.symbol.clone(),
            side: order.side,
            filled_quantity: order.quantity,
            avg_price: dec!(2000),
            commission: Decimal::ZERO,
            timestamp: chrono::Utc::now(),
        })
    }

    async fn order_status(&self, _symbol: &str, _client_order_id: &str) -> Result<OrderStatus> {
        Ok(OrderStatus::NotFilled)
    }

    async fn get_market_price(&self, _symbol: &str) -> Result<Decimal> {
        Ok(dec!(2000))
    }

    async fn asset_meta(&self, symbol: &str) -> Result<AssetMeta> {
        Ok(AssetMeta {
            symbol: symbol.to_string(),
            size_decimals: 4,
            min_notional: dec!(10),
            min_position_size: Decimal::ZERO,
        })
    }
}

fn spawn_agent(symbols: &[&str]) -> AgentHandle {
    let engine = RiskAssessmentEngine::new(
        Arc::new(FeatureEmbedder::new()),
        Arc::new(CalmModel),
        RiskMemoryStore::in_memory(FEATURE_DIMENSION),
        EngineSettings::default(),
    )
    .unwrap();
    let decision_loop = Arc::new(DecisionLoop::new(
        engine,
        TradeLedger::in_memory(),
        Arc::new(InstantExchange),
        Arc::new(FlatMarket),
        DecisionPolicy::default(),
        LoopSettings::default(),
    ));
    let (handle, _task) = AgentActor::spawn(
        decision_loop,
        Watchlist::from_symbols(symbols),
        Duration::from_secs(3600),
    );
    handle
}

fn app(agent: &AgentHandle) -> Router {
    ApiServer::new(agent.clone()).router()
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_status_starts_stopped() {
    let agent = spawn_agent(&["BTC"]);
    let (status, body) = send(app(&agent), "GET", "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "stopped");
    assert_eq!(body["ticks_completed"], 0);
}

#[tokio::test]
async fn test_watchlist_add_list_remove() {
    let agent = spawn_agent(&["BTC"]);

    let (status, body) = send(
        app(&agent),
        "POST",
        "/api/watchlist",
        Some(json!({ "symbol": " eth " })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["symbol"], "ETH");
    assert_eq!(body["pair"], "ETH/USDC");

    let (status, _) = send(
        app(&agent),
        "POST",
        "/api/watchlist",
        Some(json!({ "symbol": "ETH" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        app(&agent),
        "POST",
        "/api/watchlist",
        Some(json!({ "symbol": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(app(&agent), "GET", "/api/watchlist", None).await;
    let symbols: Vec<_> = body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["symbol"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(symbols, vec!["BTC", "ETH"]);

    let (status, _) = send(app(&agent), "DELETE", "/api/watchlist/btc", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(app(&agent), "DELETE", "/api/watchlist/BTC", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(agent.watchlist().len(), 1);
}

#[tokio::test]
async fn test_manual_tick_then_trades_by_status() {
    let agent = spawn_agent(&["ETH"]);

    let (status, report) = send(app(&agent), "POST", "/api/agent/tick", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["tick"], 1);
    assert_eq!(report["outcomes"][0]["symbol"], "ETH");
    assert_eq!(report["outcomes"][0]["decision"], "buy");

    let (status, trades) = send(app(&agent), "GET", "/api/trades?status=open", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trades.as_array().unwrap().len(), 1);

    let (_, trades) = send(app(&agent), "GET", "/api/trades?status=closed", None).await;
    assert!(trades.as_array().unwrap().is_empty());

    let (status, _) = send(app(&agent), "GET", "/api/trades?status=pending", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(app(&agent), "GET", "/api/status", None).await;
    assert_eq!(body["ticks_completed"], 1);
}

#[tokio::test]
async fn test_start_and_stop_are_accepted() {
    let agent = spawn_agent(&[]);
    let mut updates = agent.status_updates();

    let (status, _) = send(app(&agent), "POST", "/api/agent/start", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    tokio::time::timeout(
        Duration::from_secs(5),
        updates.wait_for(|s| s.state == risk_agent_orchestrator::AgentState::Running),
    )
    .await
    .unwrap()
    .unwrap();

    let (status, _) = send(app(&agent), "POST", "/api/agent/stop", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    agent.shutdown().await.unwrap();
    // Give the actor a moment to drop its receiver.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let (status, _) = send(app(&agent), "POST", "/api/agent/start", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_memory_lists_newest_first_by_token() {
    let agent = spawn_agent(&["ETH", "BTC"]);

    let (_, body) = send(app(&agent), "GET", "/api/memory", None).await;
    assert!(body["entries"].as_array().unwrap().is_empty());

    agent.tick().await.unwrap();
    agent.tick().await.unwrap();

    let (status, body) = send(app(&agent), "GET", "/api/memory", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 4);
    let ids: Vec<_> = entries.iter().map(|e| e["id"].as_i64().unwrap()).collect();
    assert!(ids.windows(2).all(|w| w[0] > w[1]));
    assert!(entries[0].get("embedding").is_none());

    let (_, body) = send(app(&agent), "GET", "/api/memory?token=eth&limit=1", None).await;
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["token"], "ETH");

    let (status, _) = send(app(&agent), "GET", "/api/memory?limit=many", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
