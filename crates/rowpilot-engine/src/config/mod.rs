//! Locating and reading `rowpilot.yaml`.
//!
//! An explicit `--config` path must exist. Otherwise the file named by
//! `ROWPILOT_CONFIG`, then `./rowpilot.yaml`, then
//! `~/.rowpilot/config.yaml` are tried in turn, and built-in defaults apply
//! when none of them exists.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub use rowpilot_core::config::schema::{
    BrowserSettings, ExecutionConfig, RowpilotConfig, SelectorPolicy,
};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "ROWPILOT_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Config {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

/// Where the active settings came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => f.write_str("built-in defaults"),
        }
    }
}

/// Implicit config locations, most specific first.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        paths.push(PathBuf::from(path));
    }
    paths.push(PathBuf::from("rowpilot.yaml"));
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".rowpilot").join("config.yaml"));
    }
    paths
}

/// Load settings from `explicit`, or from the first implicit location that
/// exists.
pub async fn load_config(
    explicit: Option<&Path>,
) -> Result<(RowpilotConfig, ConfigSource), ConfigError> {
    if let Some(path) = explicit {
        let config = read_config(path).await?;
        return Ok((config, ConfigSource::File(path.to_path_buf())));
    }

    for path in search_paths() {
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let config = read_config(&path).await?;
            info!(path = %path.display(), "Loaded config");
            return Ok((config, ConfigSource::File(path)));
        }
        debug!(path = %path.display(), "No config here");
    }
    Ok((RowpilotConfig::default(), ConfigSource::Defaults))
}

/// Parse and sanity-check a single config file.
pub async fn read_config(path: &Path) -> Result<RowpilotConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let config: RowpilotConfig =
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    check(&config).map_err(|reason| ConfigError::Invalid {
        path: path.to_path_buf(),
        reason,
    })?;
    Ok(config)
}

fn check(config: &RowpilotConfig) -> Result<(), String> {
    if config.execution.action_timeout_ms == 0 {
        return Err("execution.action_timeout_ms must be positive".into());
    }
    if config.execution.pick_timeout_ms == 0 {
        return Err("execution.pick_timeout_ms must be positive".into());
    }
    let selectors = &config.selectors;
    if selectors.min_length > selectors.max_length {
        return Err(format!(
            "selectors.min_length ({}) exceeds selectors.max_length ({})",
            selectors.min_length, selectors.max_length
        ));
    }
    Ok(())
}
