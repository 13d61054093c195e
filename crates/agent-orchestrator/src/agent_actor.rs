use crate::agent_handle::AgentHandle;
use crate::commands::AgentCommand;
use crate::decision_loop::DecisionLoop;
use crate::events::AgentEvent;
use crate::status::{AgentState, AgentStatus, TickReport};
use crate::watchlist::Watchlist;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;

/// Owns the periodic driver. Commands are handled between ticks, so a stop never
/// interrupts an instrument halfway through execution.
pub struct AgentActor {
    decision_loop: Arc<DecisionLoop>,
    watchlist: Watchlist,
    tick_interval: Duration,
    state: AgentState,
    rx: mpsc::Receiver<AgentCommand>,
    status_tx: watch::Sender<AgentStatus>,
    event_tx: broadcast::Sender<AgentEvent>,
}

impl AgentActor {
    /// Spawns the actor and returns a handle to it.
    #[must_use]
    pub fn spawn(
        decision_loop: Arc<DecisionLoop>,
        watchlist: Watchlist,
        tick_interval: Duration,
    ) -> (AgentHandle, JoinHandle<Result<()>>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (status_tx, status_rx) = watch::channel(AgentStatus::new(tick_interval.as_secs()));
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

        let handle = AgentHandle::new(
            tx,
            status_rx,
            event_tx.clone(),
            watchlist.clone(),
            decision_loop.ledger().clone(),
            decision_loop.engine().memory().clone(),
        );
        let actor = Self {
            decision_loop,
            watchlist,
            tick_interval,
            state: AgentState::Stopped,
            rx,
            status_tx,
            event_tx,
        };
        (handle, tokio::spawn(actor.run()))
    }

    /// # Errors
    /// Never fails today; the signature leaves room for fatal startup errors.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(interval_secs = self.tick_interval.as_secs(), "Agent actor started");
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                command = self.rx.recv() => {
                    let Some(command) = command else { break };
                    match command {
                        AgentCommand::Start => {
                            if self.state == AgentState::Running {
                                tracing::warn!("Agent already running, ignoring start");
                                continue;
                            }
                            ticker.reset_immediately();
                            self.set_state(AgentState::Running);
                        }
                        AgentCommand::Stop => {
                            if self.state == AgentState::Stopped {
                                tracing::warn!("Agent already stopped, ignoring stop");
                                continue;
                            }
                            self.set_state(AgentState::Stopped);
                        }
                        AgentCommand::Tick(reply) => {
                            let report = self.run_tick().await;
                            let _ = reply.send(report);
                        }
                        AgentCommand::UpdatePolicy(policy) => {
                            self.decision_loop.set_policy(policy);
                        }
                        AgentCommand::Shutdown => {
                            tracing::info!("Agent shutting down");
                            break;
                        }
                    }
                }
                _ = ticker.tick(), if self.state == AgentState::Running => {
                    self.run_tick().await;
                }
            }
        }

        self.flush_pending().await;
        self.set_state(AgentState::Stopped);
        tracing::info!("Agent actor stopped");
        Ok(())
    }

    /// Last chance for queued ledger writes and unconfirmed orders. Anything still
    /// owed afterwards must be reconciled by hand.
    async fn flush_pending(&self) {
        let remaining = self.decision_loop.flush_pending().await;
        for (symbol, record) in &remaining {
            tracing::error!(
                %symbol,
                ?record,
                "Pending work left unresolved at shutdown; reconcile manually"
            );
        }
        let pending_records = remaining.len();
        self.status_tx.send_modify(|status| {
            status.pending_records = pending_records;
        });
    }

    async fn run_tick(&mut self) -> TickReport {
        let snapshot = self.watchlist.snapshot();
        let report = self.decision_loop.tick(&snapshot).await;

        let pending_records = self.decision_loop.pending_records().await;
        let memory_entries = self.decision_loop.engine().memory().len().await.ok();
        self.status_tx.send_modify(|status| {
            status.apply(report.clone());
            status.pending_records = pending_records;
            status.memory_entries = memory_entries;
        });
        for event in AgentEvent::from_report(&report) {
            // No subscribers is fine.
            let _ = self.event_tx.send(event);
        }
        report
    }

    fn set_state(&mut self, state: AgentState) {
        self.state = state;
        self.status_tx.send_modify(|status| {
            status.state = state;
            status.updated_at = Utc::now();
        });
        let _ = self.event_tx.send(AgentEvent::StateChanged {
            state,
            timestamp: Utc::now(),
        });
        tracing::info!(?state, "Agent state changed");
    }
}
