//! converge CLI entrypoint.
//!
//! This is the main entrypoint for the converge command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use halldyll_converge::api::{observe, HttpResourceClient, ResourceApi};
use halldyll_converge::cli::{desired_tags, Cli, Commands, OutputFormatter, TagCommands};
use halldyll_converge::config::{find_config_file, ConfigParser, ConfigValidator, ConvergeConfig};
use halldyll_converge::error::{ConvergeError, Result};
use halldyll_converge::poller::{cancellation, CancelSignal};
use halldyll_converge::waiter::ResourceWaiter;

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_json);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// `RUST_LOG` takes precedence over the verbosity flag.
fn init_logging(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force, &formatter),
        Commands::Validate { warnings } => cmd_validate(config_path, warnings, &formatter),
        Commands::Status { id } => cmd_status(config_path, &id, &formatter).await,
        Commands::Wait {
            id,
            profile,
            timeout,
        } => cmd_wait(config_path, &id, &profile, timeout, &formatter).await,
        Commands::Tags { command } => cmd_tags(config_path, command, &formatter).await,
    }
}

/// Writes command output to stdout.
fn emit(output: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// Write a template configuration file.
fn cmd_init(path: &Path, force: bool, formatter: &OutputFormatter) -> Result<()> {
    info!("Initializing converge configuration in: {}", path.display());

    let config_path = path.join("converge.yaml");

    if !force && config_path.exists() {
        eprint!(
            "{}",
            formatter.warning(&format!(
                "Configuration file already exists: {} (use --force to overwrite)",
                config_path.display()
            ))
        );
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    std::fs::write(&config_path, include_str!("../templates/converge.yaml"))?;
    emit(&formatter.success(&format!("Created: {}", config_path.display())))?;

    eprintln!("\nNext steps:");
    eprintln!("  1. Set api.base_url and the paths for your service");
    eprintln!("  2. Put the API token in .env (CONVERGE_API_TOKEN=...)");
    eprintln!("  3. Run 'converge validate' to check your configuration");
    eprintln!("  4. Run 'converge wait <ID>' to wait for a resource");

    Ok(())
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&Path>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, config_file) = load_config(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let result = ConfigValidator::new().check(&config);
    emit(&formatter.format_validation(&result, show_warnings))?;

    // Surface the first error as the exit status.
    ConfigValidator::new().validate(&config).map(|_| ())
}

/// Fetch one observation.
async fn cmd_status(config_path: Option<&Path>, id: &str, formatter: &OutputFormatter) -> Result<()> {
    let config = load_valid_config(config_path)?;
    let client = HttpResourceClient::from_config(&config.api)?;

    let observation = observe(&client, id).await?;
    emit(&formatter.format_observation(id, &observation))
}

/// Wait for a resource to converge.
async fn cmd_wait(
    config_path: Option<&Path>,
    id: &str,
    profile_name: &str,
    timeout: Option<u64>,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_valid_config(config_path)?;
    let client = HttpResourceClient::from_config(&config.api)?;
    let waiter = ResourceWaiter::from_config(&client, &config);

    let mut profile = waiter.profile(profile_name)?.clone();
    if let Some(secs) = timeout {
        profile = profile.with_timeout_secs(secs);
    }

    let cancel = cancel_on_ctrl_c();
    match waiter.wait_for(id, &profile, &cancel).await {
        Ok(outcome) => emit(&formatter.format_outcome(id, &outcome)),
        Err(ConvergeError::Wait(err)) => {
            emit(&formatter.format_wait_error(id, &err))?;
            Err(err.into())
        }
        Err(err) => Err(err),
    }
}

/// Tag subcommands.
async fn cmd_tags(
    config_path: Option<&Path>,
    command: TagCommands,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_valid_config(config_path)?;
    let client = HttpResourceClient::from_config(&config.api)?;
    let reconciler = config.tag_reconciler();

    match command {
        TagCommands::Show { id } => {
            let tags = client.list_tags(&id).await?;
            emit(&formatter.format_tags(&id, &tags))
        }
        TagCommands::Diff { id, tags } => {
            let observed = client.list_tags(&id).await?;
            let diff = reconciler.plan(&observed, &desired_tags(&tags));
            emit(&formatter.format_diff(&id, &diff, false))
        }
        TagCommands::Sync { id, tags, yes } => {
            let desired = desired_tags(&tags);

            if !yes {
                let observed = client.list_tags(&id).await?;
                let diff = reconciler.plan(&observed, &desired);
                if diff.is_empty() {
                    return emit(&formatter.format_diff(&id, &diff, false));
                }

                eprint!("{}", formatter.format_diff(&id, &diff, false));
                if !confirm("Apply these tag changes?")? {
                    eprintln!("Tag sync cancelled.");
                    return Ok(());
                }
            }

            let diff = reconciler.sync(&client, &id, &desired).await?;
            emit(&formatter.format_diff(&id, &diff, true))
        }
    }
}

/// Asks a yes/no question on stderr.
fn confirm(question: &str) -> Result<bool> {
    eprint!("\n{question} [y/N] ");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Returns a signal that fires on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancelSignal {
    let (handle, signal) = cancellation();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupted, cancelling wait");
                handle.cancel();
            }
            Err(e) => debug!("Ctrl-C handler unavailable: {e}"),
        }
    });

    signal
}

/// Loads the configuration and rejects it unless it validates.
fn load_valid_config(config_path: Option<&Path>) -> Result<ConvergeConfig> {
    let (config, config_file) = load_config(config_path)?;
    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{}: {warning}", config_file.display());
    }
    Ok(config)
}

/// Resolves, loads and parses the configuration.
fn load_config(config_path: Option<&Path>) -> Result<(ConvergeConfig, PathBuf)> {
    let config_file = config_path.map_or_else(
        || find_config_file(std::env::current_dir()?),
        |path| Ok(path.to_path_buf()),
    )?;

    let parser = ConfigParser::new().with_base_path(
        config_file
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new(".")),
    );
    let config = parser.load_with_env(&config_file)?;
    Ok((config, config_file))
}
