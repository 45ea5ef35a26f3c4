//! Configuration module.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `converge.yaml`
//! - Environment overrides and `.env` loading
//! - Validation of configuration values

mod parser;
mod spec;
mod validator;

pub use parser::{
    find_config_file, ConfigParser, DEFAULT_CONFIG_FILES, ENV_API_BASE_URL, ENV_API_TOKEN_ENV,
    ENV_POLL_INTERVAL_MS, ENV_POLL_TRANSIENT_RETRIES,
};
pub use spec::{
    ApiConfig, ConvergeConfig, PollingConfig, TagsConfig, WaitProfile, PROFILE_ABSENT,
    PROFILE_PRESENT,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
