use crate::commands::AgentCommand;
use crate::events::AgentEvent;
use crate::policy::DecisionPolicy;
use crate::status::{AgentStatus, TickReport};
use crate::watchlist::{Snapshot, Watchlist};
use anyhow::{Context, Result};
use risk_agent_core::{RiskMemoryEntry, Trade, TradeLedger, TradeStatus, WatchlistEntry};
use risk_agent_memory::RiskMemoryStore;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Cloneable front for a running [`crate::AgentActor`].
#[derive(Clone)]
pub struct AgentHandle {
    tx: mpsc::Sender<AgentCommand>,
    status_rx: watch::Receiver<AgentStatus>,
    event_tx: broadcast::Sender<AgentEvent>,
    watchlist: Watchlist,
    ledger: TradeLedger,
    memory: RiskMemoryStore,
}

impl AgentHandle {
    #[must_use]
    pub const fn new(
        tx: mpsc::Sender<AgentCommand>,
        status_rx: watch::Receiver<AgentStatus>,
        event_tx: broadcast::Sender<AgentEvent>,
        watchlist: Watchlist,
        ledger: TradeLedger,
        memory: RiskMemoryStore,
    ) -> Self {
        Self {
            tx,
            status_rx,
            event_tx,
            watchlist,
            ledger,
            memory,
        }
    }

    /// # Errors
    /// Returns an error if the actor has exited.
    pub async fn start(&self) -> Result<()> {
        self.send(AgentCommand::Start).await
    }

    /// # Errors
    /// Returns an error if the actor has exited.
    pub async fn stop(&self) -> Result<()> {
        self.send(AgentCommand::Stop).await
    }

    /// Runs one tick now and waits for its report.
    ///
    /// # Errors
    /// Returns an error if the actor has exited.
    pub async fn tick(&self) -> Result<TickReport> {
        let (tx, rx) = oneshot::channel();
        self.send(AgentCommand::Tick(tx)).await?;
        rx.await.context("Agent dropped the tick reply")
    }

    /// # Errors
    /// Returns an error if the actor has exited.
    pub async fn update_policy(&self, policy: DecisionPolicy) -> Result<()> {
        self.send(AgentCommand::UpdatePolicy(policy)).await
    }

    /// # Errors
    /// Returns an error if the actor has already exited.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(AgentCommand::Shutdown).await
    }

    /// Status as of the last completed tick or state change.
    #[must_use]
    pub fn status(&self) -> AgentStatus {
        self.status_rx.borrow().clone()
    }

    #[must_use]
    pub fn status_updates(&self) -> watch::Receiver<AgentStatus> {
        self.status_rx.clone()
    }

    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<AgentEvent> {
        self.event_tx.subscribe()
    }

    #[must_use]
    pub fn watchlist(&self) -> Snapshot {
        self.watchlist.snapshot()
    }

    /// Visible to the decision loop from the next tick.
    pub fn add_to_watchlist(&self, entry: WatchlistEntry) -> bool {
        self.watchlist.add(entry)
    }

    pub fn remove_from_watchlist(&self, symbol: &str) -> bool {
        self.watchlist.remove(symbol)
    }

    /// # Errors
    /// Propagates ledger storage failures.
    pub async fn trades(&self, status: Option<TradeStatus>) -> Result<Vec<Trade>> {
        Ok(self.ledger.list(status).await?)
    }

    /// Most recent risk memory entries, optionally for one token.
    ///
    /// # Errors
    /// Propagates memory index failures.
    pub async fn memory(&self, token: Option<&str>, limit: usize) -> Result<Vec<RiskMemoryEntry>> {
        Ok(self.memory.recent(token, limit).await?)
    }

    async fn send(&self, command: AgentCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("Agent is not running"))
    }
}
