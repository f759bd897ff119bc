pub mod model;
pub mod nickname;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub use model::{
    ClientConfig, DialectKind, LoggingConfig, RegistrationInfo, ServerConfig,
    ServiceRegistration, UserRegistration, UserTracking,
};

fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crabirc")
        .join("config.toml")
}

/// Load `<config_dir>/crabirc/config.toml`, or defaults if it does not exist.
pub fn load_config() -> Result<ClientConfig> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        return Ok(ClientConfig::default());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: ClientConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

pub fn save_config(config: &ClientConfig) -> Result<()> {
    save_config_to(config, &config_path())
}

pub fn save_config_to(config: &ClientConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }
    let contents = toml::to_string_pretty(config).with_context(|| "Failed to serialize config")?;
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    Ok(())
}

/// Whether the default config file exists yet.
pub fn config_exists() -> bool {
    config_path().exists()
}
