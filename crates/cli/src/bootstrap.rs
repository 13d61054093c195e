//! Builds the agent's collaborators from configuration.

use anyhow::{Context, Result};
use risk_agent_core::{
    AppConfig, EmbeddingProvider, EmbeddingSource, ExecutionMode, RiskModel, RiskModelProvider,
    StorageBackend, TradeLedger,
};
use risk_agent_data::DatabaseClient;
use risk_agent_hyperliquid::{
    Executor, HyperliquidClient, HyperliquidExchange, HyperliquidMarketData, LiveExecution,
    PaperExecution, WalletConfig,
};
use risk_agent_memory::{
    EngineSettings, FeatureEmbedder, HeuristicRiskModel, RiskAssessmentEngine, RiskMemoryStore,
    FEATURE_DIMENSION,
};
use risk_agent_openai::{OpenAiClient, OpenAiEmbedder, OpenAiRiskModel};
use risk_agent_orchestrator::{DecisionLoop, DecisionPolicy, LoopSettings};
use std::sync::Arc;
use std::time::Duration;

/// Persistence chosen by `database.backend`.
pub enum Storage {
    Memory,
    Postgres(DatabaseClient),
}

impl Storage {
    /// # Errors
    /// Returns an error if `PostgreSQL` is selected and cannot be reached.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        match config.database.backend {
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; trades and memory are lost on exit");
                Ok(Self::Memory)
            }
            StorageBackend::Postgres => {
                let client =
                    DatabaseClient::connect(&config.database.url, config.database.max_connections)
                        .await?;
                Ok(Self::Postgres(client))
            }
        }
    }

    #[must_use]
    pub fn ledger(&self) -> TradeLedger {
        match self {
            Self::Memory => TradeLedger::in_memory(),
            Self::Postgres(db) => TradeLedger::new(Arc::new(db.trade_store())),
        }
    }

    /// # Errors
    /// Returns an error if the vector index cannot be prepared.
    pub async fn memory(&self, dimension: usize) -> Result<RiskMemoryStore> {
        match self {
            Self::Memory => Ok(RiskMemoryStore::in_memory(dimension)),
            Self::Postgres(db) => {
                let index = db.vector_index(dimension);
                Ok(RiskMemoryStore::new(Arc::new(index), dimension))
            }
        }
    }
}

fn embedder(config: &AppConfig) -> Result<Arc<dyn EmbeddingSource>> {
    let embeddings = &config.embeddings;
    match embeddings.provider {
        EmbeddingProvider::Features => {
            if embeddings.dimension != FEATURE_DIMENSION {
                tracing::warn!(
                    configured = embeddings.dimension,
                    actual = FEATURE_DIMENSION,
                    "Feature embeddings have a fixed dimension, ignoring embeddings.dimension"
                );
            }
            Ok(Arc::new(FeatureEmbedder::new()))
        }
        EmbeddingProvider::OpenAi => {
            let client = OpenAiClient::from_env(
                embeddings.api_url.clone(),
                embeddings.requests_per_second,
                config.agent.collaborator_timeout(),
            )?;
            Ok(Arc::new(OpenAiEmbedder::new(
                client,
                embeddings.model.clone(),
                embeddings.dimension,
            )))
        }
    }
}

fn risk_model(config: &AppConfig) -> Result<Arc<dyn RiskModel>> {
    let model = &config.risk_model;
    match model.provider {
        RiskModelProvider::Heuristic => Ok(Arc::new(HeuristicRiskModel::new())),
        RiskModelProvider::OpenAi => {
            let client = OpenAiClient::from_env(
                model.api_url.clone(),
                model.requests_per_second,
                config.agent.collaborator_timeout(),
            )?;
            Ok(Arc::new(OpenAiRiskModel::new(
                client,
                model.model.clone(),
                model.temperature,
            )))
        }
    }
}

fn hyperliquid_client(config: &AppConfig) -> Result<HyperliquidClient> {
    let venue = &config.hyperliquid;
    HyperliquidClient::new(
        venue.api_url.clone(),
        venue.requests_per_second,
        Duration::from_millis(venue.request_timeout_ms),
    )
}

fn exchange(config: &AppConfig, client: HyperliquidClient) -> Result<HyperliquidExchange> {
    let venue = &config.hyperliquid;
    let executor = match venue.execution_mode {
        ExecutionMode::Paper => {
            tracing::info!("Paper execution: orders are simulated at the mid price");
            Executor::Paper(PaperExecution::new(
                venue.paper_slippage_bps,
                venue.paper_commission_rate,
            ))
        }
        ExecutionMode::Live => {
            let wallet = WalletConfig::from_env().context("Live execution needs a wallet")?;
            tracing::warn!(
                account = %wallet.account_address,
                "LIVE execution enabled, orders are sent to the venue"
            );
            Executor::Live(LiveExecution::new(
                client.clone(),
                wallet,
                venue.max_slippage_bps,
            ))
        }
    };
    Ok(HyperliquidExchange::new(
        client,
        executor,
        venue.min_notional,
        venue.min_position_size,
    ))
}

/// Wires storage, models and the venue into a ready decision loop.
///
/// # Errors
/// Returns an error if any collaborator cannot be constructed, including when the
/// embedder's dimension does not match the memory store.
pub async fn decision_loop(config: &AppConfig, storage: &Storage) -> Result<Arc<DecisionLoop>> {
    let embedder = embedder(config)?;
    let memory = storage.memory(embedder.dimension()).await?;
    let engine = RiskAssessmentEngine::new(
        embedder,
        risk_model(config)?,
        memory,
        EngineSettings {
            neighbors_k: config.agent.neighbors_k,
            memory_weight: config.agent.memory_weight,
            categories: config.categories,
            call_timeout: config.agent.collaborator_timeout(),
        },
    )?;

    let client = hyperliquid_client(config)?;
    let market_data = HyperliquidMarketData::new(
        client.clone(),
        config.hyperliquid.candle_interval.clone(),
        config.hyperliquid.candle_lookback,
    );
    let exchange = exchange(config, client)?;

    Ok(Arc::new(DecisionLoop::new(
        engine,
        storage.ledger(),
        Arc::new(exchange),
        Arc::new(market_data),
        DecisionPolicy::from(config.policy),
        LoopSettings::from_config(config),
    )))
}
