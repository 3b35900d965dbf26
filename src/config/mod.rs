//! Configuration file loading for the binary.

pub use lyricsync_core::config::{ClockConfig, ClockKind, Config, PlayerConfig};

use anyhow::{Context, Result};
use std::path::Path;

const DEFAULT_PATHS: [&str; 3] = [
    "./lyricsync.toml",
    "~/.config/lyricsync/config.toml",
    "/etc/lyricsync/config.toml",
];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    for path_str in DEFAULT_PATHS {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Reject configurations the player cannot run with; log the rest.
fn validate_config(config: &Config) -> Result<()> {
    if !(config.player.fps.is_finite() && config.player.fps > 0.0) {
        anyhow::bail!("player.fps must be a positive number");
    }

    for warning in config.validate() {
        tracing::warn!("Config: {}", warning);
    }

    Ok(())
}
