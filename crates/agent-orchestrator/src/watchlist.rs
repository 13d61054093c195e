use risk_agent_core::WatchlistEntry;
use std::sync::Arc;
use tokio::sync::watch;

pub type Snapshot = Arc<Vec<WatchlistEntry>>;

/// Tracked instruments, unique by symbol.
///
/// Readers take an `Arc` snapshot that stays consistent for as long as they hold it.
/// Writers build a new list and swap it in, so a running tick never sees a
/// half-applied change.
#[derive(Clone)]
pub struct Watchlist {
    tx: Arc<watch::Sender<Snapshot>>,
}

impl Watchlist {
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = WatchlistEntry>) -> Self {
        let mut list: Vec<WatchlistEntry> = Vec::new();
        for mut entry in entries {
            entry.symbol = canonical(&entry.symbol);
            if !entry.symbol.is_empty() && !list.iter().any(|e| e.symbol == entry.symbol) {
                list.push(entry);
            }
        }
        let (tx, _) = watch::channel(Arc::new(list));
        Self { tx: Arc::new(tx) }
    }

    /// USDC-quoted entries for each symbol.
    #[must_use]
    pub fn from_symbols<S: AsRef<str>>(symbols: &[S]) -> Self {
        Self::new(symbols.iter().map(|s| WatchlistEntry::usdc(s.as_ref())))
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.tx.borrow())
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    /// Adds `entry` unless its symbol is already tracked. Returns whether it was added.
    pub fn add(&self, mut entry: WatchlistEntry) -> bool {
        entry.symbol = canonical(&entry.symbol);
        if entry.symbol.is_empty() {
            return false;
        }
        let added = self.tx.send_if_modified(|current| {
            if current.iter().any(|e| e.symbol == entry.symbol) {
                return false;
            }
            let mut next = current.as_ref().clone();
            next.push(entry.clone());
            *current = Arc::new(next);
            true
        });
        if added {
            tracing::info!(symbol = %entry.symbol, pair = %entry.pair, "Added to watchlist");
        }
        added
    }

    /// Removes `symbol`. Returns whether it was tracked.
    pub fn remove(&self, symbol: &str) -> bool {
        let symbol = canonical(symbol);
        let removed = self.tx.send_if_modified(|current| {
            if !current.iter().any(|e| e.symbol == symbol) {
                return false;
            }
            let next: Vec<_> = current.iter().filter(|e| e.symbol != symbol).cloned().collect();
            *current = Arc::new(next);
            true
        });
        if removed {
            tracing::info!(%symbol, "Removed from watchlist");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn canonical(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}
