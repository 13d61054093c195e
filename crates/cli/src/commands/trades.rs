use super::ConfigArgs;
use crate::bootstrap::Storage;
use anyhow::Result;
use clap::Args;
use risk_agent_core::TradeStatus;

#[derive(Args, Debug)]
pub struct TradesArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Only show `open` or `closed` trades.
    #[arg(long)]
    pub status: Option<TradeStatus>,
}

/// Prints ledger trades, oldest first.
pub async fn run_trades(args: TradesArgs) -> Result<()> {
    let config = args.config.load()?;
    let ledger = Storage::connect(&config).await?.ledger();
    let trades = ledger.list(args.status).await?;

    if trades.is_empty() {
        println!("No trades");
        return Ok(());
    }

    println!(
        "{:>6}  {:<8} {:<6} {:>14} {:>14} {:>12} {:<7} {}",
        "ID", "SYMBOL", "SIDE", "ENTRY", "EXIT", "QTY", "STATUS", "OPENED"
    );
    for trade in &trades {
        let exit = trade
            .exit_price
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        println!(
            "{:>6}  {:<8} {:<6} {:>14} {:>14} {:>12} {:<7} {}",
            trade.id,
            trade.symbol,
            trade.option_type.as_str(),
            trade.entry_price,
            exit,
            trade.quantity,
            trade.status.as_str(),
            trade.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}
