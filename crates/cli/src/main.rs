use clap::{Parser, Subcommand};

mod bootstrap;
mod commands;

use commands::{RunArgs, SizeArgs, TickArgs, TradesArgs};

#[derive(Parser)]
#[command(name = "risk-agent")]
#[command(about = "Unattended risk-memory trading agent for Hyperliquid", long_about = None)]
struct Cli {
    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent with the web API and config hot-reload
    Run(RunArgs),
    /// Evaluate the watchlist once and print the tick report
    Tick(TickArgs),
    /// List trades from the ledger
    Trades(TradesArgs),
    /// Compute the exchange-legal order size for a budget
    Size(SizeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if let Some(path) = &cli.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        // stdout carries command output; logs go to stderr
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Run(args) => commands::run_agent(args).await?,
        Commands::Tick(args) => commands::run_tick(args).await?,
        Commands::Trades(args) => commands::run_trades(args).await?,
        Commands::Size(args) => commands::run_size(&args)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use risk_agent_core::TradeStatus;

    #[test]
    fn test_trades_status_filter_parses() {
        let cli = Cli::try_parse_from(["risk-agent", "trades", "--status", "closed"]).unwrap();
        let Commands::Trades(args) = cli.command else {
            panic!("expected trades command");
        };
        assert_eq!(args.status, Some(TradeStatus::Closed));
        assert_eq!(args.config.config_dir, std::path::PathBuf::from("config"));
    }

    #[test]
    fn test_tick_accepts_symbol_list() {
        let cli = Cli::try_parse_from(["risk-agent", "tick", "--symbols", "BTC,ETH"]).unwrap();
        let Commands::Tick(args) = cli.command else {
            panic!("expected tick command");
        };
        assert_eq!(args.symbols, vec!["BTC", "ETH"]);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!(Cli::try_parse_from(["risk-agent", "trades", "--status", "pending"]).is_err());
    }
}
