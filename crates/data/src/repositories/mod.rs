pub mod memory_repo;
pub mod trade_repo;

pub use memory_repo::PgVectorIndex;
pub use trade_repo::{is_duplicate_open, PgTradeStore};
