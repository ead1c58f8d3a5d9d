//! rust-asmr-downloader - Main entry point
//!
//! A concurrent, resumable bulk downloader for asmr.one works.

use anyhow::{Context, Result};
use rust_asmr_downloader::catalog::build_http_client;
use rust_asmr_downloader::manifest::collect_work_ids;
use rust_asmr_downloader::storage::WorkHistory;
use rust_asmr_downloader::{
    Catalog, CatalogClient, CliArgs, Config, ConsoleInput, IntegrityCheck, RetryPolicy, RunSummary,
    SchedulerSettings, TransferSettings, WorkPipeline, WorkSettings,
};
use rust_asmr_downloader::storage::scheduler::DEFAULT_ROUNDS;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Set up panic handler for unexpected errors
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();

        if let Some(location) = panic_info.location() {
            error!(
                "PANIC occurred at {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }
        let payload = panic_info.payload();
        if let Some(s) = payload.downcast_ref::<&str>() {
            error!("Panic message: {}", s);
        } else if let Some(s) = payload.downcast_ref::<String>() {
            error!("Panic message: {}", s);
        } else {
            error!("Panic message: unknown");
        }
        error!("Backtrace:\n{:?}", backtrace);
        default_hook(panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_panic_handler();

    let args = CliArgs::parse_args();
    let _log_guard = init_logging(&args)?;
    info!("rust-asmr-downloader starting");
    debug!("CLI arguments: {:?}", args);

    let mut config = Config::load(&args.config_file).context("Failed to load configuration")?;
    config.apply_args(&args);
    config.validate().context("Invalid configuration")?;

    if args.show_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }
    if args.save_config {
        config.save(&args.config_file)?;
    }
    if args.history {
        print_history(&config.output_dir).await;
        return Ok(());
    }

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", config.output_dir.display()))?;
    info!("Output directory: {}", config.output_dir.display());

    let client = build_http_client(config.proxy()).context("Failed to set up HTTP client")?;
    let catalog = Arc::new(CatalogClient::new(client.clone())?);

    let mut inputs = args.rj_ids.clone();
    if let Some((query, limit)) = args.search_request() {
        match catalog.search(&query, limit).await {
            Ok(found) => {
                info!("Found {} works for '{}'", found.len(), query);
                inputs.extend(found);
            }
            Err(e) => error!("Search for '{}' failed: {}", query, e),
        }
    } else if args.search.is_some() {
        warn!("--search expects a query and a numeric limit");
    }

    let work_ids = collect_work_ids(&inputs);
    if work_ids.is_empty() {
        if !args.save_config {
            println!("No valid RJ IDs given. Pass work ids (e.g. RJ387142) or --search QUERY LIMIT.");
        }
        return Ok(());
    }
    info!("Processing {} works", work_ids.len());

    let settings = WorkSettings {
        output_dir: config.output_dir.clone(),
        selection: args.select.clone(),
        hq_audio_only: config.hq_audio_only,
        default_kinds: config.default_kinds()?,
        scheduler: SchedulerSettings {
            concurrency: config.concurrency_limit,
            rounds: RetryPolicy::new(DEFAULT_ROUNDS, Duration::ZERO),
            transfer: TransferSettings::default(),
            integrity: IntegrityCheck::from_verify_size(config.verify_size),
        },
        tag_audio: config.tag_audio,
        quiet: args.is_quiet(),
    };
    let pipeline = WorkPipeline::new(catalog, client, settings);
    let mut console = ConsoleInput::spawn();

    let started = Instant::now();
    let mut run = RunSummary::default();
    for work_id in &work_ids {
        match pipeline.process(work_id, Some(&mut console)).await {
            Ok(outcome) => run.add(&outcome),
            Err(e) => {
                error!("Skipping RJ{}: {}", work_id, e);
                run.add_failure();
            }
        }
    }

    for line in run.summary_lines(started.elapsed()) {
        if !args.is_quiet() {
            println!("{}", line);
        }
        info!("{}", line);
    }

    Ok(())
}

/// Console and log file subscribers.
///
/// The returned guard flushes the log file on drop and must live until exit.
fn init_logging(args: &CliArgs) -> Result<WorkerGuard> {
    let level = args.log_level();

    let log_dir = args
        .log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let log_name = args
        .log_file
        .file_name()
        .context("Log file path has no file name")?;
    let file_appender = tracing_appender::rolling::never(log_dir, log_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    let console = if args.is_verbose() {
        console.pretty().boxed()
    } else {
        console.compact().boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false).with_target(false))
        .try_init()
        .context("Failed to initialize logging")?;

    debug!("Logging initialized at {:?}, writing to {}", level, args.log_file.display());
    Ok(guard)
}

async fn print_history(output_dir: &Path) {
    let history = WorkHistory::new(output_dir);
    let entries = history.load().await;
    if entries.is_empty() {
        println!("No completed works recorded in {}", history.path().display());
        return;
    }

    println!("Completed works ({}):", entries.len());
    for entry in entries {
        println!(
            "- RJ{} {} ({} files, {})",
            entry.work_id,
            entry.title.as_deref().unwrap_or("(untitled)"),
            entry.files,
            entry.completed_at.to_rfc3339()
        );
    }
}
