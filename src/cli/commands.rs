//! Command handlers for DWD Fetcher CLI
//!
//! This module implements the command handlers that connect CLI arguments and
//! the loaded configuration to the core application: catalog lookup, run
//! resolution, job expansion and the orchestrated download.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::app::orchestrator::SignalHandler;
use crate::app::{
    expand, format_run_timestamp, resolve_run_timestamp, BatchResult, Clock, DownloadJob,
    DownloadRequest, FetchOptions, FetchWorker, JobOutcome, ModelCatalog, ModelSpec, OpenDataClient,
    Orchestrator, SystemClock,
};
use crate::cli::{
    ConfigAction, ConfigArgs, DownloadArgs, ModelsArgs, ProgressConfig, ProgressDisplay,
    TimestampArgs,
};
use crate::config::AppConfig;
use crate::errors::{AppError, RequestError, Result};

/// Jobs of one download invocation, all for the same model run
#[derive(Debug)]
pub struct DownloadPlan {
    pub run: DateTime<Utc>,
    /// Flags shared by every request of the invocation
    pub options: FetchOptions,
    pub jobs: Vec<DownloadJob>,
}

/// Handle the download command
///
/// Validates the request, resolves the model run once, expands every given
/// field list into jobs and runs them as a single batch. With
/// `--get-latest-timestamp` only the resolved run is printed.
///
/// # Errors
///
/// Request, catalog and configuration problems are returned before any job
/// runs. Per-file failures are part of the returned [`BatchResult`].
pub async fn handle_download(
    args: DownloadArgs,
    mut config: AppConfig,
    show_progress: bool,
) -> Result<BatchResult> {
    args.validate()?;
    apply_download_overrides(&mut config, &args);
    config.validate()?;

    let catalog = ModelCatalog::load_or_builtin(config.catalog.path.as_deref()).await?;
    let spec = catalog.require(&args.model)?;

    if args.get_latest_timestamp {
        let run = resolve_run(args.modelrun.as_deref(), &spec, &SystemClock)?;
        println!("{}", format_run_timestamp(run));
        return Ok(BatchResult::empty());
    }

    let plan = plan_download(&args, &config, &spec, &SystemClock)?;
    info!(
        "Model {} run {}: {} files",
        spec.id,
        format_run_timestamp(plan.run),
        plan.jobs.len()
    );

    let client = Arc::new(OpenDataClient::with_config(config.client.clone())?);
    let worker = FetchWorker::new(client, plan.options);
    let orchestrator = Orchestrator::new(config.orchestrator.clone(), worker);

    let signal_task = SignalHandler::new(orchestrator.cancellation_token()).setup();

    let total = plan.jobs.len();
    let (orchestrator, progress_task) = if show_progress && total > 0 {
        let (tx, rx) = mpsc::channel(config.orchestrator.channel_buffer.max(1));
        let display = ProgressDisplay::new(ProgressConfig {
            enable_progress_bars: config.orchestrator.enable_progress_bar,
            ..Default::default()
        });
        (orchestrator.with_progress(tx), Some(display.spawn(total, rx)))
    } else {
        (orchestrator, None)
    };

    let result = orchestrator.run(plan.jobs).await;
    // Closes the progress channel
    drop(orchestrator);
    signal_task.abort();
    if let Some(task) = progress_task {
        let _ = task.await;
    }
    let result = result?;

    if args.dry_run {
        print_dry_run(&result);
    }
    print_failures(&result);

    if let Some(report) = &args.report {
        write_report(&result, report).await?;
    }

    Ok(result)
}

/// Apply download flags on top of the loaded configuration
pub fn apply_download_overrides(config: &mut AppConfig, args: &DownloadArgs) {
    if let Some(proxy) = &args.http_proxy {
        config.client.proxy = Some(proxy.clone());
    }
    if let Some(workers) = args.workers {
        config.orchestrator.concurrency = workers;
    }
    if let Some(directory) = &args.directory {
        config.output.directory = directory.clone();
    }
    if let Some(catalog) = &args.catalog {
        config.catalog.path = Some(catalog.clone());
    }
    config.output.flat |= args.flat;
    config.output.compressed |= args.compressed;
    if args.reload {
        config.output.skip_existing = false;
    }
}

/// Resolve the run used for every request of the invocation
pub fn resolve_run(
    explicit_run: Option<&str>,
    spec: &ModelSpec,
    clock: &dyn Clock,
) -> Result<DateTime<Utc>> {
    Ok(resolve_run_timestamp(
        explicit_run,
        spec.publication_delay_minutes,
        spec.run_interval_hours,
        clock,
    )?)
}

/// One request per given field list
pub fn build_requests(args: &DownloadArgs, config: &AppConfig) -> Vec<DownloadRequest> {
    let options = config.output.fetch_options().with_dry_run(args.dry_run);

    args.field_groups()
        .into_iter()
        .map(|(level_type, fields)| {
            let mut request = DownloadRequest::new(&args.model, level_type, fields.to_vec())
                .with_levels(args.level_selection(level_type))
                .with_dest_root(&config.output.directory)
                .with_flatten(config.output.flat)
                .with_options(options);
            request.min_step = args.min_time_step;
            request.max_step = args.max_time_step;
            if let Some(grid) = &args.grid {
                request = request.with_grid(grid);
            }
            if let Some(run) = &args.modelrun {
                request = request.with_run(run);
            }
            request
        })
        .collect()
}

/// Resolve the run and expand every request into jobs
///
/// Fails on the first invalid request, so nothing is downloaded unless the
/// whole invocation is valid.
pub fn plan_download(
    args: &DownloadArgs,
    config: &AppConfig,
    spec: &Arc<ModelSpec>,
    clock: &dyn Clock,
) -> Result<DownloadPlan> {
    let requests = build_requests(args, config);
    // Every request of one invocation carries the same run and flags
    let Some(first) = requests.first() else {
        return Err(RequestError::NoFields {
            level_type: "any".to_string(),
        }
        .into());
    };
    let run = resolve_run(first.run.as_deref(), spec, clock)?;
    let options = first.options;

    let mut jobs = Vec::new();
    for request in &requests {
        let expanded = expand(request, spec, run)?;
        debug!(
            "{} {} fields expanded to {} jobs",
            request.fields.len(),
            request.level_type,
            expanded.len()
        );
        jobs.extend(expanded);
    }

    Ok(DownloadPlan { run, options, jobs })
}

fn print_dry_run(result: &BatchResult) {
    for outcome in &result.completed {
        if let JobOutcome::Success { url, path, .. } = outcome {
            println!("{} -> {}", url, path.display());
        }
    }
}

fn print_failures(result: &BatchResult) {
    for failure in &result.failures {
        if let JobOutcome::Failed { url, cause, .. } = failure {
            eprintln!("Failed: {} ({})", url, cause);
        }
    }
}

/// Write the batch result as pretty JSON
pub async fn write_report(result: &BatchResult, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    tokio::fs::write(path, json).await.map_err(|e| {
        AppError::generic(format!("Failed to write report {}: {}", path.display(), e))
    })?;
    info!("Wrote batch report to {}", path.display());
    Ok(())
}

/// Handle the timestamp command
pub async fn handle_timestamp(args: TimestampArgs, config: &AppConfig) -> Result<()> {
    let catalog_path = args.catalog.as_deref().or(config.catalog.path.as_deref());
    let catalog = ModelCatalog::load_or_builtin(catalog_path).await?;
    let spec = catalog.require(&args.model)?;

    let run = resolve_run_timestamp(
        None,
        spec.publication_delay_minutes,
        spec.run_interval_hours,
        &SystemClock,
    )?;
    println!("{}", format_run_timestamp(run));
    Ok(())
}

/// Handle the models command
pub async fn handle_models(args: ModelsArgs, config: &AppConfig) -> Result<()> {
    let catalog_path = args.catalog.as_deref().or(config.catalog.path.as_deref());
    let catalog = ModelCatalog::load_or_builtin(catalog_path).await?;

    for line in model_listing(&catalog) {
        println!("{}", line);
    }
    Ok(())
}

/// One line per catalog model
pub fn model_listing(catalog: &ModelCatalog) -> Vec<String> {
    catalog
        .models()
        .map(|spec| {
            let level_types: Vec<String> = spec
                .level_types()
                .into_iter()
                .map(|lt| lt.to_string())
                .collect();
            let mut line = format!(
                "{:<12} {:<8} grids: {:<30} levels: {} (runs every {}h, +{}min)",
                spec.id,
                spec.scope,
                spec.grids.join(","),
                level_types.join(","),
                spec.run_interval_hours,
                spec.publication_delay_minutes
            );
            if let Some(description) = &spec.description {
                line.push_str(&format!(" - {}", description));
            }
            line
        })
        .collect()
}

/// Handle the config command
pub async fn handle_config(
    args: ConfigArgs,
    config: &AppConfig,
    config_override: Option<&Path>,
) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Init { path, force } => {
            let target = path.or_else(|| config_override.map(Path::to_path_buf));
            let written = AppConfig::init(target, force).await?;
            println!("Created configuration file: {}", written.display());
        }
    }
    Ok(())
}
