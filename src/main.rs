//! EcGrow - multi-site EC treatment trial pipeline
//!
//! A CLI tool that ingests per-group environment CSV files and the
//! combined growth workbook, reconciles Unicode-variant file and sheet
//! names, and reports per-group summaries plus the best-performing
//! treatment group.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, I/O, malformed workbook, etc.)
//!   2 - No usable data (every source missing or skipped)

mod analysis;
mod cli;
mod config;
mod error;
mod loader;
mod models;
mod pipeline;
mod report;
mod resolver;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use error::PipelineError;
use pipeline::Pipeline;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("EcGrow v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args) {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            // An empty dataset gets its own exit code so callers can
            // tell "nothing to summarize" from a genuine failure.
            if matches!(
                e.downcast_ref::<PipelineError>(),
                Some(PipelineError::EmptyPipeline(_))
            ) {
                error!("{}", e);
                eprintln!("\n⛔ {}", e);
                std::process::exit(2);
            }
            error!("Run failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default ecgrow.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new("ecgrow.toml");

    if path.exists() {
        eprintln!("⚠️  ecgrow.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write ecgrow.toml")?;

    println!("✅ Created ecgrow.toml with default settings.");
    println!("   Edit it to customize the data directory and treatment groups.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete pipeline. Returns the process exit code.
fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let data_dir = PathBuf::from(&config.data.dir);
    if !data_dir.is_dir() {
        anyhow::bail!("data directory does not exist: {}", data_dir.display());
    }

    let registry = config.registry()?;
    info!(
        "registry has {} groups, data directory {}",
        registry.len(),
        data_dir.display()
    );

    let mut pipeline = Pipeline::new(
        registry,
        config.data.env_file_suffix.clone(),
        config.data.growth_workbook_suffix.clone(),
    );

    // Handle --dry-run: resolve sources and exit
    if args.dry_run {
        return handle_dry_run(&pipeline, &data_dir);
    }

    println!("📂 Loading trial data from {}", data_dir.display());
    let data = pipeline.run(&data_dir)?;

    for warning in &data.warnings {
        warn!("{}", warning);
    }
    for series in &data.env_by_group {
        debug!(
            "group '{}': {} environment rows",
            series.group_id,
            series.records.len()
        );
    }
    for series in &data.growth_by_group {
        debug!(
            "group '{}': {} growth rows",
            series.group_id,
            series.records.len()
        );
    }

    // Render the report
    let ctx = report::ReportContext {
        data_dir: data_dir.display().to_string(),
        generated_at: Utc::now(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&data, &ctx)?,
        OutputFormat::Markdown => report::generate_markdown_report(&data, &ctx),
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("✅ Report saved to: {}", path.display());
        }
        None => {
            println!("\n{}", output);
        }
    }

    // Print summary
    println!("📊 Summary:");
    println!(
        "   Groups with data: {} environment, {} growth",
        data.env_summaries.len(),
        data.growth_summaries.len()
    );
    println!(
        "   Best group: {} (target EC {}, {:.2} g mean fresh weight)",
        data.optimal.group_id, data.optimal.target_ec, data.optimal.avg_fresh_weight
    );
    if !data.warnings.is_empty() {
        println!("   ⚠️  {} warning(s); see report", data.warnings.len());
    }

    Ok(0)
}

/// Handle --dry-run: resolve expected sources, print the result, exit.
fn handle_dry_run(pipeline: &Pipeline, data_dir: &Path) -> Result<i32> {
    println!("\n🔍 Dry run: resolving sources (no parsing)...\n");

    let statuses = pipeline.resolve_sources(data_dir)?;

    for status in &statuses {
        match &status.resolved {
            Some(file_name) => println!("   📄 {} -> {}", status.logical_name, file_name),
            None => println!("   ❌ {} -> not found", status.logical_name),
        }
    }

    let found = statuses.iter().filter(|s| s.resolved.is_some()).count();
    println!("\n   Resolved {} of {} sources", found, statuses.len());
    println!("\n✅ Dry run complete. Nothing was parsed.");

    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from ecgrow.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
