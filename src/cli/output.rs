//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::api::ResourceView;
use crate::config::ValidationResult;
use crate::error::WaitError;
use crate::poller::PollOutcome;
use crate::status::{Observation, ResourceState};
use crate::tags::{TagDiff, TagSet};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Tag row for table display.
#[derive(Tabled)]
struct TagRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Tag change row for table display.
#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats one observation of a resource.
    #[must_use]
    pub fn format_observation(&self, id: &str, observation: &Observation<ResourceView>) -> String {
        match self.format {
            OutputFormat::Json => to_json(&StatusJson {
                id,
                state: &observation.state,
                exists: observation.payload.is_some(),
                observed_at: observation
                    .payload
                    .as_ref()
                    .map(|view| view.observed_at.to_rfc3339()),
                body: observation.payload.as_ref().map(|view| &view.body),
            }),
            OutputFormat::Text => {
                format!("{id}: {}\n", Self::format_state(&observation.state))
            }
        }
    }

    /// Formats a successful wait.
    #[must_use]
    pub fn format_outcome(&self, id: &str, outcome: &PollOutcome<ResourceView>) -> String {
        match self.format {
            OutputFormat::Json => to_json(&WaitJson {
                id,
                status: "converged",
                state: Some(&outcome.state),
                attempts: Some(outcome.attempts),
                elapsed_ms: Some(outcome.elapsed.as_millis()),
                error: None,
            }),
            OutputFormat::Text => format!(
                "{} {id} reached {} after {} attempt(s) in {:.1}s\n",
                "✓".green(),
                Self::format_state(&outcome.state),
                outcome.attempts,
                outcome.elapsed.as_secs_f64()
            ),
        }
    }

    /// Formats a failed wait.
    #[must_use]
    pub fn format_wait_error(&self, id: &str, error: &WaitError) -> String {
        match self.format {
            OutputFormat::Json => to_json(&WaitJson {
                id,
                status: error.kind(),
                state: error.last_state(),
                attempts: None,
                elapsed_ms: None,
                error: Some(error.to_string()),
            }),
            OutputFormat::Text => format!("{} {error}\n", "✗".red()),
        }
    }

    /// Formats the tags on a resource.
    #[must_use]
    pub fn format_tags(&self, id: &str, tags: &TagSet) -> String {
        match self.format {
            OutputFormat::Json => to_json(&TagsJson { id, tags }),
            OutputFormat::Text => {
                if tags.is_empty() {
                    return format!("{id} has no tags.\n");
                }

                let rows: Vec<TagRow> = tags
                    .iter()
                    .map(|(key, value)| TagRow {
                        key: key.to_string(),
                        value: value.to_string(),
                    })
                    .collect();

                let mut output = format!("\nTags on {id}:\n\n");
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
                output
            }
        }
    }

    /// Formats a tag diff; `applied` tells whether it has been carried out.
    #[must_use]
    pub fn format_diff(&self, id: &str, diff: &TagDiff, applied: bool) -> String {
        match self.format {
            OutputFormat::Json => to_json(&DiffJson { id, applied, diff }),
            OutputFormat::Text => {
                if diff.is_empty() {
                    return format!("{} Tags on {id} are up to date.\n", "✓".green());
                }

                let rows: Vec<ChangeRow> = diff
                    .to_remove
                    .iter()
                    .map(|key| ChangeRow {
                        action: "-remove".red().to_string(),
                        key: key.clone(),
                        value: String::new(),
                    })
                    .chain(diff.to_upsert.iter().map(|(key, value)| ChangeRow {
                        action: "+upsert".green().to_string(),
                        key: key.to_string(),
                        value: value.to_string(),
                    }))
                    .collect();

                let mut output = format!("\nTag changes for {id}:\n\n");
                output.push_str(&Table::new(rows).to_string());
                let _ = write!(
                    output,
                    "\n\n{} to remove, {} to upsert{}\n",
                    diff.to_remove.len().to_string().red(),
                    diff.to_upsert.len().to_string().green(),
                    if applied { " (applied)" } else { "" }
                );
                output
            }
        }
    }

    /// Formats validation findings.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => to_json(&ValidationJson {
                valid: result.is_valid(),
                errors: result.errors.iter().map(ToString::to_string).collect(),
                warnings: if show_warnings { result.warnings.clone() } else { Vec::new() },
            }),
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid!\n", "✓".green())
                } else {
                    format!("{} Configuration is invalid:\n", "✗".red())
                };

                for error in &result.errors {
                    let _ = writeln!(output, "   - {error}");
                }

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output
            }
        }
    }

    /// Formats a state with color.
    fn format_state(state: &ResourceState) -> String {
        let text = state.as_str();
        if state.is_not_found() {
            text.dimmed().to_string()
        } else if text.ends_with("FAILED") || text.ends_with("ERROR") {
            text.red().to_string()
        } else if text.contains("PROGRESS") || text.ends_with("ING") || text == "PENDING" {
            text.yellow().to_string()
        } else {
            text.green().to_string()
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.message("success", &"✓".green(), message)
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.message("error", &"✗".red(), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.message("warning", &"⚠".yellow(), message)
    }

    fn message(&self, status: &str, symbol: &colored::ColoredString, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                to_json(&serde_json::json!({ "status": status, "message": message }))
            }
            OutputFormat::Text => format!("{symbol} {message}\n"),
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    let mut json = serde_json::to_string_pretty(value).unwrap_or_default();
    json.push('\n');
    json
}

// JSON serialization helpers

#[derive(Serialize)]
struct StatusJson<'a> {
    id: &'a str,
    state: &'a ResourceState,
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    observed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a serde_json::Value>,
}

#[derive(Serialize)]
struct WaitJson<'a> {
    id: &'a str,
    status: &'a str,
    state: Option<&'a ResourceState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct TagsJson<'a> {
    id: &'a str,
    tags: &'a TagSet,
}

#[derive(Serialize)]
struct DiffJson<'a> {
    id: &'a str,
    applied: bool,
    #[serde(flatten)]
    diff: &'a TagDiff,
}

#[derive(Serialize)]
struct ValidationJson {
    valid: bool,
    errors: Vec<String>,
    warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn json_of(output: &str) -> Value {
        serde_json::from_str(output).expect("output is JSON")
    }

    #[test]
    fn test_observation_json() {
        let view = ResourceView::new("hub-1", "enabled", json!({ "status": "enabled" }));
        let obs = Observation::found(view.state.clone(), view);

        let value = json_of(&OutputFormatter::new(OutputFormat::Json).format_observation("hub-1", &obs));
        assert_eq!(value["state"], "ENABLED");
        assert_eq!(value["exists"], true);
        assert_eq!(value["body"]["status"], "enabled");

        let absent = Observation::<ResourceView>::not_found();
        let value = json_of(&OutputFormatter::new(OutputFormat::Json).format_observation("hub-1", &absent));
        assert_eq!(value["state"], "NOT_FOUND");
        assert_eq!(value["exists"], false);
        assert!(value.get("body").is_none());
    }

    #[test]
    fn test_outcome_and_failure_json() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let outcome = PollOutcome {
            state: ResourceState::new("ENABLED"),
            payload: None,
            attempts: 3,
            elapsed: Duration::from_millis(6000),
        };
        let value = json_of(&formatter.format_outcome("hub-1", &outcome));
        assert_eq!(value["status"], "converged");
        assert_eq!(value["attempts"], 3);
        assert_eq!(value["elapsed_ms"], 6000);

        let error = WaitError::Timeout {
            resource: String::from("hub-1"),
            expected: String::from("ENABLED"),
            last_state: Some(ResourceState::new("PENDING")),
            attempts: 9,
            elapsed: Duration::from_secs(300),
        };
        let value = json_of(&formatter.format_wait_error("hub-1", &error));
        assert_eq!(value["status"], "timeout");
        assert_eq!(value["state"], "PENDING");
    }

    #[test]
    fn test_diff_text_and_json() {
        let diff = TagDiff {
            to_remove: ["old".to_string()].into_iter().collect(),
            to_upsert: [("env", "prod")].into_iter().collect(),
        };

        let text = OutputFormatter::new(OutputFormat::Text).format_diff("r-1", &diff, false);
        assert!(text.contains("old"));
        assert!(text.contains("prod"));
        assert!(!text.contains("(applied)"));

        let value = json_of(&OutputFormatter::new(OutputFormat::Json).format_diff("r-1", &diff, true));
        assert_eq!(value["applied"], true);
        assert_eq!(value["to_remove"], json!(["old"]));
        assert_eq!(value["to_upsert"]["env"], "prod");

        let empty = OutputFormatter::new(OutputFormat::Text).format_diff("r-1", &TagDiff::default(), false);
        assert!(empty.contains("up to date"));
    }

    #[test]
    fn test_tags_text() {
        let tags: TagSet = [("team", "core")].into_iter().collect();
        let text = OutputFormatter::new(OutputFormat::Text).format_tags("r-1", &tags);
        assert!(text.contains("team"));
        assert!(text.contains("core"));

        let none = OutputFormatter::new(OutputFormat::Text).format_tags("r-1", &TagSet::new());
        assert!(none.contains("no tags"));
    }

    #[test]
    fn test_messages() {
        let value = json_of(&OutputFormatter::new(OutputFormat::Json).warning("careful"));
        assert_eq!(value["status"], "warning");
        assert!(OutputFormatter::new(OutputFormat::Text).success("done").contains("done"));
        assert!(OutputFormatter::new(OutputFormat::Text).error("boom").contains("boom"));
    }
}
