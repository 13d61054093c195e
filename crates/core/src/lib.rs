pub mod config;
pub mod config_loader;
pub mod config_watcher;
pub mod error;
pub mod ledger;
pub mod market;
pub mod risk;
pub mod sizing;
pub mod timeout;
pub mod traits;
pub mod types;

pub use config::{
    AgentConfig, AppConfig, DatabaseConfig, EmbeddingConfig, EmbeddingProvider, ExecutionMode,
    HyperliquidConfig, PolicyConfig, RecordPolicy, RiskModelConfig, RiskModelProvider,
    ServerConfig, StorageBackend,
};
pub use config_loader::ConfigLoader;
pub use config_watcher::ConfigWatcher;
pub use error::{AgentError, Result, SizeRejection};
pub use ledger::{InMemoryTradeStore, TradeLedger};
pub use market::{
    new_client_order_id, AssetMeta, MarketFeatures, OrderRequest, OrderResult, OrderSide,
    OrderStatus,
};
pub use risk::{
    CategoryThresholds, Neighbor, NewRiskMemoryEntry, RiskAssessment, RiskCategory,
    RiskMemoryEntry,
};
pub use sizing::{normalize, normalize_for, MinSizePolicy, NormalizedSize, SizingRules};
pub use timeout::with_timeout;
pub use traits::{EmbeddingSource, Exchange, MarketDataSource, RiskModel, TradeStore, VectorIndex};
pub use types::{InstrumentSide, NewTrade, Trade, TradeStatus, WatchlistEntry};
