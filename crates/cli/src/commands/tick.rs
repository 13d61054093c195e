use super::ConfigArgs;
use crate::bootstrap::{self, Storage};
use anyhow::Result;
use clap::Args;
use risk_agent_orchestrator::Watchlist;

#[derive(Args, Debug)]
pub struct TickArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Evaluate these symbols instead of the configured watchlist.
    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<String>,
}

/// Runs a single tick over the watchlist and prints its report as JSON.
pub async fn run_tick(args: TickArgs) -> Result<()> {
    let config = args.config.load()?;
    let symbols = if args.symbols.is_empty() {
        config.agent.watchlist.clone()
    } else {
        args.symbols
    };

    let storage = Storage::connect(&config).await?;
    let decision_loop = bootstrap::decision_loop(&config, &storage).await?;
    let watchlist = Watchlist::from_symbols(&symbols);

    let report = decision_loop.tick(&watchlist.snapshot()).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    for (symbol, record) in decision_loop.flush_pending().await {
        tracing::error!(
            %symbol,
            ?record,
            "Exiting with pending work unresolved; reconcile manually"
        );
    }
    Ok(())
}
