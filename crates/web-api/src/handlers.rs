use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use risk_agent_core::{RiskMemoryEntry, Trade, TradeStatus, WatchlistEntry};
use risk_agent_orchestrator::{AgentHandle, AgentStatus, TickReport};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct WatchlistResponse {
    pub entries: Vec<WatchlistEntry>,
}

#[derive(Debug, Deserialize)]
pub struct AddWatchlistRequest {
    pub symbol: String,
    /// Defaults to `{symbol}/USDC`.
    pub pair: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TradesQuery {
    pub status: Option<String>,
}

const DEFAULT_MEMORY_LIMIT: usize = 50;
const MAX_MEMORY_LIMIT: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub struct MemoryQuery {
    pub token: Option<String>,
    pub limit: Option<usize>,
}

/// A remembered assessment. The embedding stays server-side.
#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryEntryResponse {
    pub id: i64,
    pub token: String,
    pub risk_score: f64,
    pub created_at: DateTime<Utc>,
}

impl From<RiskMemoryEntry> for MemoryEntryResponse {
    fn from(entry: RiskMemoryEntry) -> Self {
        Self {
            id: entry.id,
            token: entry.token,
            risk_score: entry.risk_score,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryResponse {
    pub entries: Vec<MemoryEntryResponse>,
}

/// Agent status as of the last completed tick or state change.
pub async fn get_status(State(agent): State<AgentHandle>) -> Json<AgentStatus> {
    Json(agent.status())
}

/// Starts periodic ticking.
///
/// # Errors
/// Returns `StatusCode::SERVICE_UNAVAILABLE` if the agent has shut down.
pub async fn start_agent(State(agent): State<AgentHandle>) -> Result<StatusCode, StatusCode> {
    agent.start().await.map_err(|e| {
        tracing::error!("Failed to start agent: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok(StatusCode::ACCEPTED)
}

/// Stops periodic ticking. A tick already in flight runs to completion.
///
/// # Errors
/// Returns `StatusCode::SERVICE_UNAVAILABLE` if the agent has shut down.
pub async fn stop_agent(State(agent): State<AgentHandle>) -> Result<StatusCode, StatusCode> {
    agent.stop().await.map_err(|e| {
        tracing::error!("Failed to stop agent: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok(StatusCode::ACCEPTED)
}

/// Runs one tick now and returns its report.
///
/// # Errors
/// Returns `StatusCode::SERVICE_UNAVAILABLE` if the agent has shut down.
pub async fn run_tick(State(agent): State<AgentHandle>) -> Result<Json<TickReport>, StatusCode> {
    let report = agent.tick().await.map_err(|e| {
        tracing::error!("Manual tick failed: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;
    Ok(Json(report))
}

pub async fn list_watchlist(State(agent): State<AgentHandle>) -> Json<WatchlistResponse> {
    Json(WatchlistResponse {
        entries: agent.watchlist().as_ref().clone(),
    })
}

/// Adds an instrument; the decision loop picks it up from the next tick.
///
/// # Errors
/// Returns `StatusCode::BAD_REQUEST` for a blank symbol and
/// `StatusCode::CONFLICT` if the symbol is already tracked.
pub async fn add_to_watchlist(
    State(agent): State<AgentHandle>,
    Json(req): Json<AddWatchlistRequest>,
) -> Result<(StatusCode, Json<WatchlistEntry>), StatusCode> {
    let symbol = req.symbol.trim().to_ascii_uppercase();
    if symbol.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let entry = match req.pair {
        Some(pair) if !pair.trim().is_empty() => WatchlistEntry::new(symbol, pair.trim()),
        _ => WatchlistEntry::usdc(symbol),
    };

    if !agent.add_to_watchlist(entry.clone()) {
        return Err(StatusCode::CONFLICT);
    }
    Ok((StatusCode::CREATED, Json(entry)))
}

/// # Errors
/// Returns `StatusCode::NOT_FOUND` if the symbol is not tracked.
pub async fn remove_from_watchlist(
    State(agent): State<AgentHandle>,
    Path(symbol): Path<String>,
) -> Result<StatusCode, StatusCode> {
    if agent.remove_from_watchlist(&symbol) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

/// Lists ledger trades, optionally filtered by `?status=open|closed`.
///
/// # Errors
/// Returns `StatusCode::BAD_REQUEST` for an unknown status and
/// `StatusCode::INTERNAL_SERVER_ERROR` if the ledger cannot be read.
pub async fn list_trades(
    State(agent): State<AgentHandle>,
    Query(query): Query<TradesQuery>,
) -> Result<Json<Vec<Trade>>, StatusCode> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<TradeStatus>)
        .transpose()
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let trades = agent.trades(status).await.map_err(|e| {
        tracing::error!("Failed to list trades: {:#}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(trades))
}

/// Lists remembered assessments, newest first, optionally for `?token=`.
/// `?limit=` defaults to 50 and is capped at 500.
///
/// # Errors
/// Returns `StatusCode::INTERNAL_SERVER_ERROR` if the memory index cannot be read.
pub async fn list_memory(
    State(agent): State<AgentHandle>,
    Query(query): Query<MemoryQuery>,
) -> Result<Json<MemoryResponse>, StatusCode> {
    let token = query
        .token
        .map(|t| t.trim().to_ascii_uppercase())
        .filter(|t| !t.is_empty());
    let limit = query
        .limit
        .unwrap_or(DEFAULT_MEMORY_LIMIT)
        .min(MAX_MEMORY_LIMIT);

    let entries = agent.memory(token.as_deref(), limit).await.map_err(|e| {
        tracing::error!("Failed to list risk memory: {:#}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(MemoryResponse {
        entries: entries.into_iter().map(MemoryEntryResponse::from).collect(),
    }))
}
