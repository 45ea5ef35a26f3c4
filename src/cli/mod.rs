//! CLI module for the convergence tool.
//!
//! This module provides the command-line interface for checking, waiting on
//! and re-tagging remote resources.

mod commands;
mod output;

pub use commands::{desired_tags, Cli, Commands, OutputFormat, TagCommands};
pub use output::OutputFormatter;
