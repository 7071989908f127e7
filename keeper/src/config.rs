//! Keeper configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use strata_controller::StrataConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// JSON system snapshot the keeper starts from and refreshes market data from
    pub snapshot_path: String,

    /// Protocol parameters (TOML); built-in defaults when absent
    pub protocol_config_path: Option<String>,

    /// Polling interval in seconds
    pub poll_interval_secs: u64,

    /// Maximum vault investments per tick
    pub max_invests_per_tick: usize,

    /// Log decisions without executing them
    pub dry_run: bool,
}

impl KeeperConfig {
    /// Load configuration from TOML file
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("STRATA_KEEPER_CONFIG").unwrap_or_else(|_| "keeper-config.toml".to_string());

        let config_str = std::fs::read_to_string(&config_path)
            .context(format!("Failed to read config file: {}", config_path))?;

        let config: KeeperConfig = toml::from_str(&config_str).context("Failed to parse config TOML")?;

        Ok(config)
    }

    /// Configuration for a local run against `./snapshot.json`
    pub fn default_local() -> Self {
        Self {
            snapshot_path: "./snapshot.json".to_string(),
            protocol_config_path: None,
            poll_interval_secs: 30,
            max_invests_per_tick: 2,
            dry_run: false,
        }
    }

    /// Write default config to file
    #[allow(dead_code)]
    pub fn write_default(path: &str) -> Result<()> {
        let config = Self::default_local();
        let toml_str = toml::to_string_pretty(&config).context("Failed to serialize config")?;

        std::fs::write(path, toml_str).context(format!("Failed to write config to {}", path))?;

        log::info!("Created default config at {}", path);
        Ok(())
    }

    /// Protocol parameters, read from `protocol_config_path` when set
    pub fn protocol(&self) -> Result<StrataConfig> {
        let Some(path) = &self.protocol_config_path else {
            return Ok(StrataConfig::default());
        };
        let expanded = shellexpand::tilde(path);
        let s = std::fs::read_to_string(expanded.as_ref())
            .context(format!("Failed to read protocol config from {}", path))?;
        StrataConfig::from_toml_str(&s).context("Failed to parse protocol config TOML")
    }
}
