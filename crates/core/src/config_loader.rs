use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use std::path::Path;

/// Prefix for environment overrides; `__` separates nested keys,
/// e.g. `RISK_AGENT_AGENT__TICK_INTERVAL_SECS=60`.
pub const ENV_PREFIX: &str = "RISK_AGENT_";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from `config/` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be parsed or the merged result fails
    /// validation.
    pub fn load() -> Result<AppConfig> {
        Self::load_from("config", None)
    }

    /// Loads configuration with a profile overlay (`config/Config.{profile}.toml`).
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be parsed or the merged result fails
    /// validation.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        Self::load_from("config", Some(profile))
    }

    /// Merges defaults, `Config.toml`, the optional profile file, environment
    /// variables and `Config.json` found under `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be parsed or the merged result fails
    /// validation.
    pub fn load_from(dir: impl AsRef<Path>, profile: Option<&str>) -> Result<AppConfig> {
        let dir = dir.as_ref();

        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(dir.join("Config.toml")));
        if let Some(profile) = profile {
            figment = figment.merge(Toml::file(dir.join(format!("Config.{profile}.toml"))));
        }

        let config: AppConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .join(Json::file(dir.join("Config.json")))
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", dir.display()))?;

        config.validate()?;
        Ok(config)
    }
}
