//! DWD Fetcher CLI application
//!
//! Command-line interface for downloading DWD numerical weather model output
//! from the open data server. The exit status of a download is the number of
//! failed files, capped at 254; fatal errors exit with 255.

use std::process;

use tracing::{info, warn};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, EnvFilter};

use dwd_fetcher::cli::{
    handle_config, handle_download, handle_models, handle_timestamp, Cli, Commands,
};
use dwd_fetcher::config::AppConfig;
use dwd_fetcher::constants::{exit, logging};
use dwd_fetcher::errors::Result;

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit::FATAL_EXIT_CODE
        }
    };
    process::exit(code);
}

/// Main application logic, returning the process exit status
async fn run() -> Result<i32> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = match Cli::parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version requests are printed to stdout and succeed
            let _ = e.print();
            return Ok(if e.use_stderr() {
                exit::FATAL_EXIT_CODE
            } else {
                0
            });
        }
    };
    let config = AppConfig::load(cli.global.config.clone()).await?;

    init_logging(&cli, &config);
    info!("DWD Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Download(args) => {
            info!("Executing download command");
            let result = handle_download(args, config, !cli.global.quiet).await?;
            if !cli.global.quiet {
                eprintln!("{}", result.summary());
            }
            Ok(result.exit_code())
        }
        Commands::Timestamp(args) => {
            handle_timestamp(args, &config).await?;
            Ok(0)
        }
        Commands::Models(args) => {
            handle_models(args, &config).await?;
            Ok(0)
        }
        Commands::Config(args) => {
            handle_config(args, &config, cli.global.config.as_deref()).await?;
            Ok(0)
        }
    }
}

/// Initialize logging from CLI verbosity, falling back to the configured level
fn init_logging(cli: &Cli, config: &AppConfig) {
    let level = match cli.log_level() {
        Some(level) => level.to_string().to_lowercase(),
        None => config.logging.level.clone(),
    };

    let mut invalid_level = false;
    let directive: Directive = match format!("dwd_fetcher={}", level).parse() {
        Ok(directive) => directive,
        Err(_) => {
            invalid_level = true;
            tracing::Level::WARN.into()
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(directive);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .with_writer(std::io::stderr)
        .init();

    if invalid_level {
        warn!("Invalid log level '{}', using {}", level, logging::DEFAULT_LOG_LEVEL);
    }
}
