//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::tags::TagSet;

/// converge - wait for remote resources to settle and keep their tags in line.
#[derive(Parser, Debug)]
#[command(name = "converge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "CONVERGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a template configuration file.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Fetch the current state of a resource once.
    Status {
        /// Resource identifier.
        id: String,
    },

    /// Wait until a resource reaches a profile's target state.
    Wait {
        /// Resource identifier.
        id: String,

        /// Wait profile name.
        #[arg(short, long, default_value = "present")]
        profile: String,

        /// Override the profile's timeout in seconds.
        #[arg(short, long)]
        timeout: Option<u64>,
    },

    /// Inspect and reconcile resource tags.
    Tags {
        /// Tags subcommand.
        #[command(subcommand)]
        command: TagCommands,
    },
}

/// Tag subcommands.
#[derive(Subcommand, Debug)]
pub enum TagCommands {
    /// List the tags on a resource.
    Show {
        /// Resource identifier.
        id: String,
    },

    /// Show the changes a sync would make.
    Diff {
        /// Resource identifier.
        id: String,

        /// Desired tag as key=value; repeat for more.
        #[arg(short, long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,
    },

    /// Reconcile the resource's tags to the desired set.
    Sync {
        /// Resource identifier.
        id: String,

        /// Desired tag as key=value; repeat for more.
        #[arg(short, long = "tag", value_parser = parse_tag)]
        tags: Vec<(String, String)>,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Collects `--tag` pairs into a tag set.
#[must_use]
pub fn desired_tags(pairs: &[(String, String)]) -> TagSet {
    pairs.iter().cloned().collect()
}

fn parse_tag(raw: &str) -> Result<(String, String), String> {
    TagSet::parse_pair(raw).ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_wait() {
        let cli = Cli::try_parse_from(["converge", "wait", "hub-1", "--profile", "absent", "-t", "60"])
            .expect("valid arguments");

        match cli.command {
            Commands::Wait { id, profile, timeout } => {
                assert_eq!(id, "hub-1");
                assert_eq!(profile, "absent");
                assert_eq!(timeout, Some(60));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_tags_sync() {
        let cli = Cli::try_parse_from([
            "converge", "--output", "json", "tags", "sync", "r-1", "--tag", "env=prod", "--tag",
            "team=core", "--yes",
        ])
        .expect("valid arguments");

        assert_eq!(cli.output, OutputFormat::Json);
        match cli.command {
            Commands::Tags {
                command: TagCommands::Sync { id, tags, yes },
            } => {
                assert_eq!(id, "r-1");
                assert!(yes);
                let set = desired_tags(&tags);
                assert_eq!(set.get("env"), Some("prod"));
                assert_eq!(set.len(), 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_bad_tag_is_rejected() {
        let result = Cli::try_parse_from(["converge", "tags", "diff", "r-1", "--tag", "novalue"]);
        assert!(result.is_err());
    }
}
