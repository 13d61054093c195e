pub mod memory;
pub mod trade;

pub use memory::{into_neighbors, MemoryRow, NeighborRow};
pub use trade::TradeRow;
