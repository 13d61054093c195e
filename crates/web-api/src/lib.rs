pub mod handlers;
pub mod server;
pub mod websocket;

pub use handlers::{AddWatchlistRequest, TradesQuery, WatchlistResponse};
pub use server::ApiServer;
