//! Subcommands of the `risk-agent` binary.

pub mod run;
pub mod size;
pub mod tick;
pub mod trades;

pub use run::{run_agent, RunArgs};
pub use size::{run_size, SizeArgs};
pub use tick::{run_tick, TickArgs};
pub use trades::{run_trades, TradesArgs};

use anyhow::Result;
use clap::Args;
use risk_agent_core::{AppConfig, ConfigLoader};
use std::path::PathBuf;

/// Where configuration is read from; shared by every command that needs it.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Directory holding `Config.toml`.
    #[arg(short, long, default_value = "config")]
    pub config_dir: PathBuf,

    /// Overlay `Config.{profile}.toml` on top of the base file.
    #[arg(short, long, env = "RISK_AGENT_PROFILE")]
    pub profile: Option<String>,
}

impl ConfigArgs {
    /// # Errors
    /// Returns an error if the configuration cannot be parsed or fails validation.
    pub fn load(&self) -> Result<AppConfig> {
        ConfigLoader::load_from(&self.config_dir, self.profile.as_deref())
    }
}
