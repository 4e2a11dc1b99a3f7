//! Crawl-Sentinel main entry point
//!
//! This is the command-line interface for the Crawl-Sentinel crawl job orchestrator.

use anyhow::Context;
use clap::Parser;
use crawl_sentinel::config::{
    load_config_with_hash, validate_run_config, Config, Target, MAX_TIMEOUT_SECS,
};
use crawl_sentinel::output::{load_meta, print_run_meta, ArtifactLayout};
use crawl_sentinel::process::{ProcessGroupGuard, ToolLauncher};
use crawl_sentinel::Coordinator;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Crawl-Sentinel: a guarded crawl job orchestrator
///
/// Crawl-Sentinel runs an external crawl tool under a hard time limit, retries stalled
/// remote jobs with tighter parameters, checks the result against the listing content
/// policy and records the whole run in a single summary artifact.
#[derive(Parser, Debug)]
#[command(name = "crawl-sentinel")]
#[command(version = "1.0.0")]
#[command(about = "A guarded crawl job orchestrator", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Override the target URL
    #[arg(long)]
    url: Option<String>,

    /// Override the artifact slug
    #[arg(long)]
    slug: Option<String>,

    /// Override the crawl timeout (seconds)
    #[arg(
        long,
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS)
    )]
    timeout: Option<u64>,

    /// Override the page limit
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    limit: Option<u32>,

    /// Never run the reduced second attempt
    #[arg(long)]
    no_retry: bool,

    /// Report an exhausted crawl as failed instead of handing off to the whitelist scrape
    #[arg(long)]
    no_fallback: bool,

    /// Show the commands and artifact paths a run would use without running anything
    #[arg(long, conflicts_with = "show_meta")]
    dry_run: bool,

    /// Print the stored run summary for the target and exit
    #[arg(long, conflicts_with = "dry_run")]
    show_meta: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            1
        }
    };

    std::process::exit(code);
}

/// Loads configuration, dispatches to the selected mode and returns the process exit code
async fn run(cli: Cli) -> anyhow::Result<i32> {
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    apply_overrides(&mut config, &cli);
    validate_run_config(&config.crawl).context("invalid command-line override")?;

    if cli.show_meta {
        return handle_show_meta(&config, &cli);
    }

    let target = config
        .resolve_target(cli.url.as_deref(), cli.slug.as_deref())
        .context("failed to resolve crawl target")?;

    if cli.dry_run {
        handle_dry_run(&config, &target);
        return Ok(0);
    }

    handle_run(&config, target, config_hash).await
}

/// Applies command-line overrides on top of the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(timeout) = cli.timeout {
        config.crawl.timeout_secs = Some(timeout);
    }
    if let Some(limit) = cli.limit {
        config.crawl.limit = limit;
    }
    if cli.no_retry {
        config.retry.enabled = false;
    }
    if cli.no_fallback {
        config.fallback.enabled = false;
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crawl_sentinel=info,warn"),
            1 => EnvFilter::new("crawl_sentinel=debug,info"),
            2 => EnvFilter::new("crawl_sentinel=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn layout_for(config: &Config, slug: &str) -> ArtifactLayout {
    ArtifactLayout::new(&config.output.artifact_root, slug, &config.tool.output_file)
}

/// Handles the --dry-run mode: shows both attempts' command lines and the artifact paths
fn handle_dry_run(config: &Config, target: &Target) {
    let layout = layout_for(config, &target.slug);
    let launcher = ToolLauncher::new(
        config.tool.clone(),
        target.url.clone(),
        layout.crawl_output(),
        Arc::new(ProcessGroupGuard::new()),
    );

    println!("=== Crawl-Sentinel Dry Run ===\n");

    println!("Target:");
    println!("  URL: {}", target.url);
    println!("  Slug: {}", target.slug);

    println!("\nAttempt 1:");
    println!("  {}", launcher.command_for(&config.crawl));
    match config.crawl.timeout_secs {
        Some(secs) => println!("  Timeout: {}s", secs),
        None => println!("  Timeout: none"),
    }

    if config.retry.enabled {
        let (retry_params, overrides) = config.crawl.for_retry(config.retry.sitemap);
        println!("\nAttempt 2 (only if attempt 1 stalls):");
        println!("  {}", launcher.command_for(&retry_params));
        println!(
            "  Overrides: limit={} max-depth={} max-concurrency={} delay-ms={} sitemap={}",
            overrides.limit,
            overrides.max_depth,
            overrides.max_concurrency,
            overrides.delay_ms,
            overrides.sitemap
        );
    } else {
        println!("\nAttempt 2: disabled");
    }

    println!("\nJob API:");
    println!("  Base URL: {}", config.api.base_url);
    println!(
        "  Credential: {} ({})",
        config.api.api_key_env,
        if config.api.api_key().is_some() {
            "set"
        } else {
            "not set"
        }
    );

    println!("\nArtifacts:");
    println!("  Directory: {}", layout.dir().display());
    println!("  Crawl output: {}", layout.crawl_output().display());
    println!("  Run summary: {}", layout.meta().display());
    println!(
        "  Fallback: {}",
        if config.fallback.enabled {
            "whitelist scrape"
        } else {
            "disabled"
        }
    );

    println!("\n✓ Configuration is valid");
}

/// Handles the --show-meta mode: prints the stored run summary
fn handle_show_meta(config: &Config, cli: &Cli) -> anyhow::Result<i32> {
    let slug = match cli.slug.clone().or_else(|| config.target.slug.clone()) {
        Some(slug) => slug,
        None => {
            config
                .resolve_target(cli.url.as_deref(), None)
                .context("failed to resolve crawl target")?
                .slug
        }
    };

    let path = layout_for(config, &slug).meta();
    let meta = load_meta(&path)
        .with_context(|| format!("no readable run summary at {}", path.display()))?;
    print_run_meta(&meta);

    Ok(0)
}

/// Handles the main run: crawls until done or interrupted and returns the run's exit code
async fn handle_run(config: &Config, target: Target, config_hash: String) -> anyhow::Result<i32> {
    tracing::info!(
        "Crawl parameters: limit={}, max-depth={}, max-concurrency={}, timeout={}",
        config.crawl.limit,
        config.crawl.max_depth,
        config.crawl.max_concurrency,
        config
            .crawl
            .timeout_secs
            .map(|t| format!("{}s", t))
            .unwrap_or_else(|| "none".to_string())
    );

    let coordinator = Coordinator::from_config(config, target)
        .context("failed to initialize orchestrator")?
        .with_config_hash(config_hash);

    let outcome = coordinator.run_until(shutdown_signal()).await;

    // Dropping the coordinator tears down any process group still registered
    drop(coordinator);

    tracing::info!(
        "Run finished: {} (exit code {}), summary at {}",
        outcome.result,
        outcome.exit_code,
        outcome.meta_path.display()
    );

    Ok(outcome.exit_code)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                let _ = sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::warn!("Received interrupt"),
        _ = terminate => tracing::warn!("Received termination signal"),
    }
}
