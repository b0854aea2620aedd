//! Command-line argument parsing for DWD Fetcher
//!
//! This module defines the CLI structure using clap derive macros: the
//! download command with its field and range selections, plus small helper
//! commands for the latest run, the model catalog and the config file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::app::{LevelSelection, LevelType};
use crate::errors::{RequestError, RequestResult};

/// DWD Fetcher - Download numerical weather model output from DWD open data
#[derive(Parser, Debug)]
#[command(
    name = "dwd_fetcher",
    version,
    about = "Download GRIB files of DWD weather models from opendata.dwd.de",
    long_about = "Downloads forecast fields of the DWD ICON model family from the open data server.
Resolves the latest published model run, expands fields, steps and levels into individual
files and fetches them concurrently with rate limiting and retries."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - only errors and the final summary
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download model fields for one model run
    Download(DownloadArgs),

    /// Print the latest available model run as YYYYMMDDHH
    Timestamp(TimestampArgs),

    /// List the models of the catalog
    Models(ModelsArgs),

    /// Show or create the configuration file
    Config(ConfigArgs),
}

/// Arguments for the download command
#[derive(Args, Debug, Clone, Default)]
pub struct DownloadArgs {
    /// Model name (e.g. icon, icon-eu, icon-d2)
    #[arg(long)]
    pub model: String,

    /// Grid, defaults to the first grid the model offers
    #[arg(long)]
    pub grid: Option<String>,

    /// Single-level fields (e.g. t_2m tot_prec)
    #[arg(long, num_args = 1.., value_delimiter = ',', value_name = "FIELD")]
    pub single_level_fields: Vec<String>,

    /// Model-level fields
    #[arg(long, num_args = 1.., value_delimiter = ',', value_name = "FIELD")]
    pub model_level_fields: Vec<String>,

    /// Pressure-level fields, used with --pressure-levels
    #[arg(long, num_args = 1.., value_delimiter = ',', value_name = "FIELD")]
    pub pressure_level_fields: Vec<String>,

    /// Time-invariant fields (e.g. hsurf)
    #[arg(long, num_args = 1.., value_delimiter = ',', value_name = "FIELD")]
    pub time_invariant_fields: Vec<String>,

    /// First forecast step in hours
    #[arg(long, default_value_t = 0)]
    pub min_time_step: u32,

    /// Last forecast step in hours; nothing is downloaded without it
    #[arg(long)]
    pub max_time_step: Option<u32>,

    /// Lowest model level (default: model minimum)
    #[arg(long)]
    pub min_model_level: Option<u32>,

    /// Highest model level (default: model maximum)
    #[arg(long)]
    pub max_model_level: Option<u32>,

    /// Pressure levels in hPa (e.g. 500 850 1000)
    #[arg(long, num_args = 1.., value_delimiter = ',', value_name = "HPA")]
    pub pressure_levels: Vec<u32>,

    /// Download directory
    #[arg(long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Explicit model run, e.g. 2020121212
    #[arg(long, value_name = "YYYYMMDDHH")]
    pub modelrun: Option<String>,

    /// HTTP proxy as host:port or URL
    #[arg(long, value_name = "PROXY")]
    pub http_proxy: Option<String>,

    /// Number of concurrent download workers
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Write all files directly into the download directory
    #[arg(long)]
    pub flat: bool,

    /// Store files as published (.bz2) instead of decompressing
    #[arg(short, long)]
    pub compressed: bool,

    /// Show what would be downloaded without downloading
    #[arg(short, long)]
    pub dry_run: bool,

    /// Download files even if they already exist
    #[arg(short, long)]
    pub reload: bool,

    /// Print the latest available run for the model and exit
    #[arg(long)]
    pub get_latest_timestamp: bool,

    /// JSON model catalog replacing the built-in one
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Write a JSON report of the batch
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

/// Arguments for the timestamp command
#[derive(Args, Debug, Clone)]
pub struct TimestampArgs {
    /// Model name
    #[arg(long)]
    pub model: String,

    /// JSON model catalog replacing the built-in one
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,
}

/// Arguments for the models command
#[derive(Args, Debug, Clone)]
pub struct ModelsArgs {
    /// JSON model catalog replacing the built-in one
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write the default configuration file
    Init {
        /// Target file (default: user config directory)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// Usage errors are returned rather than exiting, so the caller decides
    /// the exit status.
    pub fn parse_args() -> std::result::Result<Self, clap::Error> {
        Self::try_parse()
    }

    /// Log level selected by verbosity flags
    ///
    /// Returns `None` when no flag is given, in which case the configured
    /// level applies.
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}

impl DownloadArgs {
    /// Check the arguments before any network access
    ///
    /// # Errors
    ///
    /// `InvalidConcurrency` for zero workers, `NoFields` when no field list is
    /// given (unless only the latest timestamp is requested).
    pub fn validate(&self) -> RequestResult<()> {
        if self.workers == Some(0) {
            return Err(RequestError::InvalidConcurrency { value: 0 });
        }

        if !self.get_latest_timestamp && self.field_groups().is_empty() {
            return Err(RequestError::NoFields {
                level_type: "any".to_string(),
            });
        }

        Ok(())
    }

    /// Non-empty field lists, one per level type
    pub fn field_groups(&self) -> Vec<(LevelType, &[String])> {
        [
            (LevelType::SingleLevel, &self.single_level_fields),
            (LevelType::ModelLevel, &self.model_level_fields),
            (LevelType::PressureLevel, &self.pressure_level_fields),
            (LevelType::TimeInvariant, &self.time_invariant_fields),
        ]
        .into_iter()
        .filter(|(_, fields)| !fields.is_empty())
        .map(|(level_type, fields)| (level_type, fields.as_slice()))
        .collect()
    }

    /// Level selection for one level type
    pub fn level_selection(&self, level_type: LevelType) -> LevelSelection {
        match level_type {
            LevelType::ModelLevel => {
                // Zero stands for "not given", as in the published defaults
                let min = self.min_model_level.filter(|&level| level > 0);
                let max = self.max_model_level.filter(|&level| level > 0);
                match (min, max) {
                    (None, None) => LevelSelection::Default,
                    (min, max) => LevelSelection::Range { min, max },
                }
            }
            LevelType::PressureLevel => LevelSelection::List(self.pressure_levels.clone()),
            _ => LevelSelection::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn download(args: &[&str]) -> DownloadArgs {
        let mut full = vec!["dwd_fetcher", "download"];
        full.extend_from_slice(args);
        match parse(&full).command {
            Commands::Download(args) => args,
            other => panic!("expected download command, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    /// Test download argument parsing
    ///
    /// Verifies multi-value field lists, comma separated lists and the
    /// boolean flags
    #[test]
    fn test_download_args() {
        let args = download(&[
            "--model",
            "icon-d2",
            "--single-level-fields",
            "t_2m",
            "tot_prec",
            "--pressure-level-fields",
            "t,fi",
            "--pressure-levels",
            "500,850",
            "--max-time-step",
            "12",
            "--modelrun",
            "2020121212",
            "-c",
            "--reload",
            "--flat",
        ]);

        assert_eq!(args.model, "icon-d2");
        assert_eq!(args.single_level_fields, vec!["t_2m", "tot_prec"]);
        assert_eq!(args.pressure_level_fields, vec!["t", "fi"]);
        assert_eq!(args.pressure_levels, vec![500, 850]);
        assert_eq!(args.min_time_step, 0);
        assert_eq!(args.max_time_step, Some(12));
        assert_eq!(args.modelrun.as_deref(), Some("2020121212"));
        assert!(args.compressed && args.reload && args.flat);
        assert!(!args.dry_run);
        assert!(args.validate().is_ok());

        let groups = args.field_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, LevelType::SingleLevel);
        assert_eq!(groups[1].0, LevelType::PressureLevel);
    }

    #[test]
    fn test_download_args_validation() {
        let args = download(&["--model", "icon"]);
        assert!(matches!(
            args.validate(),
            Err(RequestError::NoFields { .. })
        ));

        let args = download(&["--model", "icon", "--get-latest-timestamp"]);
        assert!(args.validate().is_ok());

        let args = download(&["--model", "icon", "--single-level-fields", "t_2m", "-w", "0"]);
        assert!(matches!(
            args.validate(),
            Err(RequestError::InvalidConcurrency { value: 0 })
        ));
    }

    #[test]
    fn test_level_selection() {
        let args = download(&["--model", "icon-eu", "--model-level-fields", "t"]);
        assert_eq!(
            args.level_selection(LevelType::ModelLevel),
            LevelSelection::Default
        );

        let args = download(&[
            "--model",
            "icon-eu",
            "--model-level-fields",
            "t",
            "--min-model-level",
            "10",
            "--max-model-level",
            "12",
        ]);
        assert_eq!(
            args.level_selection(LevelType::ModelLevel),
            LevelSelection::range(10, 12)
        );
        assert_eq!(
            args.level_selection(LevelType::PressureLevel),
            LevelSelection::List(Vec::new())
        );
        assert_eq!(
            args.level_selection(LevelType::SingleLevel),
            LevelSelection::Default
        );
    }

    #[test]
    fn test_partial_model_level_bounds() {
        let args = download(&[
            "--model",
            "icon-d2",
            "--model-level-fields",
            "u",
            "--min-model-level",
            "60",
        ]);
        assert_eq!(
            args.level_selection(LevelType::ModelLevel),
            LevelSelection::Range {
                min: Some(60),
                max: None
            }
        );

        let args = download(&[
            "--model",
            "icon-d2",
            "--model-level-fields",
            "u",
            "--min-model-level",
            "0",
            "--max-model-level",
            "0",
        ]);
        assert_eq!(
            args.level_selection(LevelType::ModelLevel),
            LevelSelection::Default
        );
    }

    #[test]
    fn test_log_level() {
        let cli = parse(&["dwd_fetcher", "-q", "models"]);
        assert_eq!(cli.log_level(), Some(tracing::Level::ERROR));

        let cli = parse(&["dwd_fetcher", "models", "-v"]);
        assert_eq!(cli.log_level(), Some(tracing::Level::INFO));

        let cli = parse(&["dwd_fetcher", "--very-verbose", "models"]);
        assert_eq!(cli.log_level(), Some(tracing::Level::DEBUG));

        let cli = parse(&["dwd_fetcher", "models"]);
        assert_eq!(cli.log_level(), None);
    }

    #[test]
    fn test_config_commands() {
        let cli = parse(&["dwd_fetcher", "--config", "my.toml", "config", "init", "-f"]);
        assert_eq!(cli.global.config, Some(PathBuf::from("my.toml")));
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Init { path, force },
            }) => {
                assert!(path.is_none());
                assert!(force);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
