//! Configuration validation.
//!
//! Collects every problem in a configuration before anything talks to the
//! remote API, so a broken file is reported in one pass.

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::spec::{ApiConfig, ConvergeConfig, PollingConfig, TagsConfig};

/// Placeholder every configured path must contain.
const ID_PLACEHOLDER: &str = "{id}";

/// Validator for convergence configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a configuration and returns the collected findings.
    ///
    /// # Errors
    ///
    /// Returns the first error found as a [`ConfigError::ValidationError`].
    pub fn validate(&self, config: &ConvergeConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        if let Some(first_error) = result.errors.first() {
            return Err(ConfigError::validation(
                first_error.message.clone(),
                first_error.field.clone(),
            )
            .into());
        }

        debug!(
            "Configuration validation passed with {} warning(s)",
            result.warning_count()
        );
        Ok(result)
    }

    /// Collects all errors and warnings without failing.
    #[must_use]
    pub fn check(&self, config: &ConvergeConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_api(&config.api, &mut result);
        Self::validate_polling(&config.polling, &mut result);
        Self::validate_profiles(config, &mut result);
        Self::validate_tags(&config.tags, &mut result);

        result
    }

    fn validate_api(api: &ApiConfig, result: &mut ValidationResult) {
        match reqwest::Url::parse(&api.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => result.error(
                "api.base_url",
                format!("Unsupported URL scheme '{}'; use http or https", url.scheme()),
            ),
            Err(e) => result.error("api.base_url", format!("Invalid URL '{}': {e}", api.base_url)),
        }

        for (field, path) in [("api.resource_path", &api.resource_path), ("api.tags_path", &api.tags_path)] {
            if !path.contains(ID_PLACEHOLDER) {
                result.error(field, format!("Path '{path}' must contain {ID_PLACEHOLDER}"));
            }
        }

        if api.status_field.trim().is_empty() {
            result.error("api.status_field", "Status field cannot be empty");
        }

        if api.tag_keys_param.trim().is_empty() {
            result.error("api.tag_keys_param", "Tag keys parameter cannot be empty");
        }

        if api.timeout_secs == 0 {
            result.error("api.timeout_secs", "Request timeout must be at least 1 second");
        }
    }

    fn validate_polling(polling: &PollingConfig, result: &mut ValidationResult) {
        if polling.interval_ms == 0 {
            result.error("polling.interval_ms", "Poll interval must be greater than zero");
        }

        if polling.max_interval_ms < polling.interval_ms {
            result.error(
                "polling.max_interval_ms",
                format!(
                    "Maximum interval {}ms is below the initial interval {}ms",
                    polling.max_interval_ms, polling.interval_ms
                ),
            );
        }

        if !polling.multiplier.is_finite() || polling.multiplier < 1.0 {
            result.error("polling.multiplier", "Multiplier must be at least 1.0");
        }

        if polling.continuous_target_occurrence == 0 {
            result.error(
                "polling.continuous_target_occurrence",
                "Continuous target occurrence must be at least 1",
            );
        }

        if polling.transient_retries == 0 {
            result
                .warnings
                .push(String::from("polling.transient_retries: any transient error ends a wait"));
        }
    }

    fn validate_profiles(config: &ConvergeConfig, result: &mut ValidationResult) {
        // Built-in profiles inherit the polling section too.
        for (name, profile) in config.all_profiles() {
            if let Err(e) = config.poll_spec(&profile).validate() {
                result.error(&format!("profiles.{name}"), e.to_string());
            }
        }

        for (name, profile) in &config.profiles {
            let prefix = format!("profiles.{name}");

            if !is_valid_name(name) {
                result.error(
                    &prefix,
                    format!("Profile name '{name}' is invalid. Must be lowercase alphanumeric with hyphens."),
                );
            }

            if profile.pending.is_empty() {
                result.warnings.push(format!(
                    "{prefix}: no pending states, so any non-target state fails the wait at once"
                ));
            }
        }
    }

    fn validate_tags(tags: &TagsConfig, result: &mut ValidationResult) {
        for (i, prefix) in tags.reserved_prefixes.iter().enumerate() {
            if prefix.is_empty() {
                result.error(
                    &format!("tags.reserved_prefixes[{i}]"),
                    "Reserved prefix cannot be empty; it would reserve every key",
                );
            }
        }

        let reserved = tags.reserved_keys();
        for (key, _) in tags.defaults.iter().filter(|(key, _)| reserved.is_reserved(key)) {
            result.warnings.push(format!(
                "tags.defaults.{key}: key is reserved and will never be applied"
            ));
        }
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_lowercase() {
        return false;
    }

    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.ends_with('-')
        && !name.contains("--")
}

impl ValidationResult {
    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigParser, WaitProfile};
    use std::time::Duration;

    fn config(yaml: &str) -> ConvergeConfig {
        ConfigParser::new().parse_yaml(yaml, None).expect("config parses")
    }

    fn minimal() -> ConvergeConfig {
        config("api:\n  base_url: https://api.example.com\n")
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("present"));
        assert!(is_valid_name("db-ready-2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("Present"));
        assert!(!is_valid_name("2fast"));
        assert!(!is_valid_name("a_b"));
        assert!(!is_valid_name("a-"));
        assert!(!is_valid_name("a--b"));
    }

    #[test]
    fn test_minimal_config_is_valid() {
        let result = ConfigValidator::new().validate(&minimal()).expect("valid");
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_api_errors_are_collected() {
        let mut config = minimal();
        config.api.base_url = String::from("ftp://example.com");
        config.api.resource_path = String::from("/resources");
        config.api.status_field = String::new();

        let result = ConfigValidator::new().check(&config);
        assert_eq!(result.error_count(), 3);

        let err = ConfigValidator::new().validate(&config).expect_err("invalid");
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn test_polling_bounds() {
        let mut config = minimal();
        config.polling.interval_ms = 5000;
        config.polling.max_interval_ms = 1000;
        config.polling.multiplier = 0.5;

        let result = ConfigValidator::new().check(&config);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["polling.max_interval_ms", "polling.multiplier"]);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = minimal();
        config.polling.interval_ms = 0;
        config.polling.max_interval_ms = 0;

        let err = ConfigValidator::new().validate(&config).expect_err("zero interval");
        assert!(err.to_string().contains("interval"));
    }

    #[test]
    fn test_delay_longer_than_builtin_timeout() {
        let mut config = minimal();
        config.polling.delay_ms = 300_000;

        let result = ConfigValidator::new().check(&config);
        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["profiles.absent", "profiles.present"]);
    }

    #[test]
    fn test_large_multiplier_is_usable() {
        let mut config = minimal();
        config.polling.multiplier = 16.0;
        config.polling.jitter_ms = 0;

        ConfigValidator::new().validate(&config).expect("valid");
        let backoff = config.polling.backoff();
        for i in 0..32 {
            assert!(backoff.delay(i) <= Duration::from_millis(config.polling.max_interval_ms));
        }
    }

    #[test]
    fn test_profile_overlap_is_an_error() {
        let mut config = minimal();
        config.profiles.insert(
            String::from("ready"),
            WaitProfile {
                pending: vec![String::from("pending"), String::from("ready")],
                target: vec![String::from("READY")],
                timeout_secs: 60,
            },
        );

        let result = ConfigValidator::new().check(&config);
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.errors[0].field, "profiles.ready");
    }

    #[test]
    fn test_warnings() {
        let config = config(
            r#"
api:
  base_url: https://api.example.com
profiles:
  gone:
    target: [NOT_FOUND]
tags:
  defaults:
    "aws:owner": me
    team: core
"#,
        );

        let result = ConfigValidator::new().validate(&config).expect("warnings only");
        assert_eq!(result.warning_count(), 2);
        assert!(result.warnings.iter().any(|w| w.contains("aws:owner")));
    }
}
