pub mod client;
pub mod exchange;
pub mod execution;
pub mod info;
pub mod market_data;
pub mod paper_execution;
pub mod signing;
pub mod wallet;

pub use client::{HyperliquidClient, MAINNET_URL, TESTNET_URL};
pub use exchange::{Executor, HyperliquidExchange};
pub use execution::LiveExecution;
pub use market_data::HyperliquidMarketData;
pub use paper_execution::PaperExecution;
pub use wallet::WalletConfig;
