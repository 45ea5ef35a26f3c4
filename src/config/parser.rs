//! Configuration parser for loading configuration files.
//!
//! This module handles loading configuration from YAML files and environment
//! variables, with proper precedence and error handling.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ConfigError, Result};

use super::spec::ConvergeConfig;

/// Overrides `api.base_url`.
pub const ENV_API_BASE_URL: &str = "CONVERGE_API_BASE_URL";

/// Overrides `api.token_env`.
pub const ENV_API_TOKEN_ENV: &str = "CONVERGE_API_TOKEN_ENV";

/// Overrides `polling.interval_ms`.
pub const ENV_POLL_INTERVAL_MS: &str = "CONVERGE_POLL_INTERVAL_MS";

/// Overrides `polling.transient_retries`.
pub const ENV_POLL_TRANSIENT_RETRIES: &str = "CONVERGE_POLL_TRANSIENT_RETRIES";

/// Configuration parser.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Directory holding the `.env` file.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory searched for `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ConvergeConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ConvergeConfig> {
        debug!("Parsing YAML configuration");

        let config: ConvergeConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })?;

        debug!("Parsed configuration for API at {}", config.api.base_url);
        Ok(config)
    }

    /// Loads `.env`, then the file, then applies `CONVERGE_*` overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, or an override
    /// holds an invalid number.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<ConvergeConfig> {
        self.load_dotenv()?;
        let mut config = self.load_file(path)?;
        apply_overrides(&mut config, |name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| ConfigError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Applies `CONVERGE_*` overrides read through `lookup`.
fn apply_overrides(
    config: &mut ConvergeConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(url) = lookup(ENV_API_BASE_URL) {
        debug!("Overriding api.base_url from environment");
        config.api.base_url = url;
    }

    if let Some(var) = lookup(ENV_API_TOKEN_ENV) {
        debug!("Overriding api.token_env from environment");
        config.api.token_env = Some(var);
    }

    if let Some(raw) = lookup(ENV_POLL_INTERVAL_MS) {
        debug!("Overriding polling.interval_ms from environment");
        config.polling.interval_ms = parse_override(ENV_POLL_INTERVAL_MS, &raw)?;
    }

    if let Some(raw) = lookup(ENV_POLL_TRANSIENT_RETRIES) {
        debug!("Overriding polling.transient_retries from environment");
        config.polling.transient_retries = parse_override(ENV_POLL_TRANSIENT_RETRIES, &raw)?;
    }

    Ok(())
}

fn parse_override<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        ConfigError::ParseError {
            message: format!("'{raw}' is not a valid number"),
            location: Some(name.to_string()),
        }
        .into()
    })
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["converge.yaml", "converge.yml", ".converge.yaml"];

/// Finds the configuration file.
///
/// Walks up from `start_dir`, then looks in the user configuration directory
/// (`~/.config/converge/` on Linux).
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let user_dir = dirs::config_dir().map(|dir| dir.join("converge"));
    search_config(start_dir.as_ref(), user_dir.as_deref())
}

fn search_config(start: &Path, fallback: Option<&Path>) -> Result<PathBuf> {
    let found = start
        .ancestors()
        .chain(fallback)
        .flat_map(|dir| DEFAULT_CONFIG_FILES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file());

    match found {
        Some(path) => {
            info!("Found configuration file: {}", path.display());
            Ok(path)
        }
        None => Err(ConfigError::FileNotFound {
            path: start.join(DEFAULT_CONFIG_FILES[0]),
        }
        .into()),
    }
}
