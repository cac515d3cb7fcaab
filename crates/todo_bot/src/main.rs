use clap::Parser;
use clap::error::ErrorKind;
use std::time::Duration;
use time::UtcOffset;
use todo_bot::cli::{Cli, normalize_parse_error};
use todo_core::config::{BotConfig, ConfigOverrides, load_config_with_fallback, merge_overrides};
use todo_core::error::AppError;
use tracing_subscriber::EnvFilter;

const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn resolve_config(cli: &Cli) -> Result<BotConfig, AppError> {
    let overrides = ConfigOverrides::parse(&cli.config_override)?;
    let loaded = load_config_with_fallback(cli.config.as_deref());
    if let Some(err) = loaded.error {
        tracing::warn!(error = %err, "config file ignored, using defaults");
    }
    Ok(merge_overrides(&loaded.config, &overrides))
}

fn run(cli: Cli) -> Result<(), AppError> {
    // Must be read while the process is still single-threaded.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    let config = resolve_config(&cli)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::io(format!("failed to start runtime: {err}")))?;

    let result = runtime.block_on(todo_bot::app::run(config, cli.command, offset));
    // A blocked stdin read must not hold the process open.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
