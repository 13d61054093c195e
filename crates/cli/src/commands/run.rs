use super::ConfigArgs;
use crate::bootstrap::{self, Storage};
use anyhow::{Context, Result};
use clap::Args;
use risk_agent_core::{AppConfig, ConfigWatcher};
use risk_agent_orchestrator::{AgentActor, AgentHandle, DecisionPolicy, Watchlist};
use risk_agent_web_api::ApiServer;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Start ticking without waiting for `POST /api/agent/start`.
    #[arg(long)]
    pub autostart: bool,

    /// Don't watch the config directory for policy changes.
    #[arg(long)]
    pub no_watch: bool,
}

/// Runs the agent, its REST control surface and the config watcher until SIGINT/SIGTERM.
pub async fn run_agent(args: RunArgs) -> Result<()> {
    let config = args.config.load()?;
    tracing::info!(
        config_dir = %args.config.config_dir.display(),
        profile = ?args.config.profile,
        mode = ?config.hyperliquid.execution_mode,
        "Starting risk agent"
    );

    let storage = Storage::connect(&config).await?;
    let decision_loop = bootstrap::decision_loop(&config, &storage).await?;
    let watchlist = Watchlist::from_symbols(&config.agent.watchlist);
    let (handle, actor_task) =
        AgentActor::spawn(decision_loop, watchlist, config.agent.tick_interval());

    let mut policy_task = None;
    if !args.no_watch {
        let (watcher, updates) = ConfigWatcher::new(
            config.clone(),
            args.config.config_dir.clone(),
            args.config.profile.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = watcher.watch().await {
                tracing::error!("Config watcher stopped: {:#}", e);
            }
        });
        policy_task = Some(tokio::spawn(forward_policy(updates, handle.clone())));
    }

    let server = ApiServer::new(handle.clone());
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.serve(&addr).await {
            tracing::error!("Server error: {}", e);
        }
    });

    if args.autostart || config.agent.autostart {
        handle.start().await?;
    }

    shutdown_signal().await?;

    tracing::info!("Stopping agent after the current tick...");
    handle.shutdown().await?;
    actor_task.await.context("Agent task panicked")??;
    server_task.abort();
    // Dropping the last config receiver lets the watcher thread exit.
    if let Some(task) = policy_task {
        task.abort();
    }

    tracing::info!("Risk agent stopped");
    Ok(())
}

/// Pushes decision thresholds from reloaded config into the running agent.
/// Other settings take effect on restart.
async fn forward_policy(mut updates: watch::Receiver<AppConfig>, agent: AgentHandle) {
    let mut current = DecisionPolicy::from(updates.borrow().policy);
    while updates.changed().await.is_ok() {
        let policy = DecisionPolicy::from(updates.borrow_and_update().policy);
        if policy == current {
            continue;
        }
        tracing::info!(
            buy_below = policy.buy_below,
            sell_above = policy.sell_above,
            "Applying reloaded decision policy"
        );
        if agent.update_policy(policy).await.is_err() {
            break;
        }
        current = policy;
    }
}

async fn shutdown_signal() -> Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        }
    }
    Ok(())
}
