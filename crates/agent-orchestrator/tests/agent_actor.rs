mod common;

use common::Harness;
use risk_agent_core::{TradeStatus, WatchlistEntry};
use risk_agent_orchestrator::{
    AgentActor, AgentEvent, AgentState, DecisionPolicy, LedgerWrite, PendingRecord, Watchlist,
};
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_manual_tick_updates_status_and_events() {
    let harness = Harness::new();
    harness.model.set("BTC", 10.0);
    let (handle, task) = AgentActor::spawn(
        harness.decision_loop.clone(),
        Watchlist::from_symbols(&["BTC"]),
        Duration::from_secs(3600),
    );
    let mut events = handle.subscribe_events();

    let report = handle.tick().await.unwrap();
    assert_eq!(report.tick, 1);
    assert_eq!(report.executed(), 1);

    let status = handle.status();
    assert_eq!(status.state, AgentState::Stopped);
    assert_eq!(status.ticks_completed, 1);
    assert_eq!(status.memory_entries, Some(1));
    assert_eq!(status.last_tick.unwrap().tick, 1);

    let mut saw_order = false;
    loop {
        match timeout(WAIT, events.recv()).await.unwrap().unwrap() {
            AgentEvent::OrderExecuted { symbol, .. } => {
                assert_eq!(symbol, "BTC");
                saw_order = true;
            }
            AgentEvent::TickCompleted { tick, executed, .. } => {
                assert_eq!(tick, 1);
                assert_eq!(executed, 1);
                break;
            }
            _ => {}
        }
    }
    assert!(saw_order);

    assert_eq!(handle.trades(Some(TradeStatus::Open)).await.unwrap().len(), 1);
    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_start_ticks_immediately_and_stop_halts() {
    let harness = Harness::new();
    let (handle, task) = AgentActor::spawn(
        harness.decision_loop.clone(),
        Watchlist::from_symbols(&["ETH"]),
        Duration::from_secs(3600),
    );
    let mut events = handle.subscribe_events();

    handle.start().await.unwrap();
    loop {
        if let AgentEvent::TickCompleted { tick, .. } =
            timeout(WAIT, events.recv()).await.unwrap().unwrap()
        {
            assert_eq!(tick, 1);
            break;
        }
    }
    assert_eq!(handle.status().state, AgentState::Running);

    handle.stop().await.unwrap();
    loop {
        if let AgentEvent::StateChanged { state, .. } =
            timeout(WAIT, events.recv()).await.unwrap().unwrap()
        {
            assert_eq!(state, AgentState::Stopped);
            break;
        }
    }
    assert_eq!(handle.status().ticks_completed, 1);

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
    assert!(handle.start().await.is_err());
}

#[tokio::test]
async fn test_watchlist_changes_apply_from_next_tick() {
    let harness = Harness::new();
    let (handle, task) = AgentActor::spawn(
        harness.decision_loop.clone(),
        Watchlist::from_symbols(&["BTC"]),
        Duration::from_secs(3600),
    );

    assert_eq!(handle.tick().await.unwrap().outcomes.len(), 1);

    assert!(handle.add_to_watchlist(WatchlistEntry::usdc("SOL")));
    assert!(handle.remove_from_watchlist("BTC"));
    let report = handle.tick().await.unwrap();
    let symbols: Vec<_> = report.outcomes.iter().map(|o| o.symbol.clone()).collect();
    assert_eq!(symbols, vec!["SOL"]);
    assert_eq!(handle.watchlist().len(), 1);

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_policy_update_reaches_the_loop() {
    let harness = Harness::new();
    harness.model.set("BTC", 50.0);
    let (handle, task) = AgentActor::spawn(
        harness.decision_loop.clone(),
        Watchlist::from_symbols(&["BTC"]),
        Duration::from_secs(3600),
    );

    assert_eq!(handle.tick().await.unwrap().executed(), 0);

    handle
        .update_policy(DecisionPolicy {
            buy_below: 60.0,
            sell_above: 80.0,
        })
        .await
        .unwrap();
    // Commands are processed in order, so the next tick sees the new policy.
    assert_eq!(handle.tick().await.unwrap().executed(), 1);

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_actor_runs_on_multi_thread_runtime() {
    let harness = Harness::new();
    harness.model.set("BTC", 10.0);
    harness.model.set("ETH", 10.0);
    let (handle, task) = AgentActor::spawn(
        harness.decision_loop.clone(),
        Watchlist::from_symbols(&["BTC", "ETH", "SOL"]),
        Duration::from_secs(3600),
    );

    let report = timeout(WAIT, handle.tick()).await.unwrap().unwrap();
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.executed(), 2);

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_replays_pending_ledger_writes() {
    let harness = Harness::new();
    harness.model.set("BTC", 10.0);
    harness.store.fail_next(1);
    let (handle, task) = AgentActor::spawn(
        harness.decision_loop.clone(),
        Watchlist::from_symbols(&["BTC"]),
        Duration::from_secs(3600),
    );

    handle.tick().await.unwrap();
    assert_eq!(handle.status().pending_records, 1);
    assert!(handle.trades(None).await.unwrap().is_empty());

    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(handle.status().pending_records, 0);
    assert_eq!(handle.status().state, AgentState::Stopped);
    let open = harness
        .decision_loop
        .ledger()
        .list(Some(TradeStatus::Open))
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(harness.decision_loop.pending_records().await, 0);
}

#[tokio::test]
async fn test_shutdown_reports_writes_that_still_fail() {
    let harness = Harness::new();
    harness.model.set("BTC", 10.0);
    harness.store.fail_next(usize::MAX);
    let (handle, task) = AgentActor::spawn(
        harness.decision_loop.clone(),
        Watchlist::from_symbols(&["BTC"]),
        Duration::from_secs(3600),
    );

    handle.tick().await.unwrap();
    handle.shutdown().await.unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(handle.status().pending_records, 1);
    assert!(harness.decision_loop.ledger().list(None).await.unwrap().is_empty());
    let remaining = harness.decision_loop.flush_pending().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].0, "BTC");
    assert!(matches!(remaining[0].1, PendingRecord::Write(LedgerWrite::Open { .. })));
}
