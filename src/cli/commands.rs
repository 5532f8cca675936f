//! Command implementations for the B3 refiner CLI
//!
//! Logging setup, layered configuration loading and the human-readable
//! summary printed after a run.

use crate::cli::args::{Args, CommonArgs, Commands, PartitionsArgs, RunArgs};
use crate::config::PipelineConfig;
use crate::models::ProcessingStats;
use crate::processor::SnapshotPipeline;
use anyhow::{Context, Result};
use colored::*;
use indicatif::HumanDuration;
use std::time::Duration;
use tracing::{debug, info};

/// Dispatch to the selected subcommand
pub async fn run(args: Args) -> Result<()> {
    setup_logging(args.command.common());

    match args.command {
        Commands::Run(run_args) => run_refine(run_args).await,
        Commands::Partitions(partitions_args) => run_partitions(partitions_args).await,
    }
}

/// Refine the most recent raw partition and report
async fn run_refine(args: RunArgs) -> Result<()> {
    match &args.job_name {
        Some(job_name) => info!("Starting job {}", job_name),
        None => info!("Starting B3 refiner"),
    }
    debug!("Command line arguments: {:?}", args);

    let config = load_configuration(&args.common, Some(&args))?;
    debug!("Loaded configuration: {:?}", config);

    let pipeline = SnapshotPipeline::new(config)?;
    let stats = pipeline.run().await?;

    if !args.common.quiet {
        print_summary(&stats);
    }
    Ok(())
}

/// Print the discovered raw partitions, most recent first
async fn run_partitions(args: PartitionsArgs) -> Result<()> {
    let config = load_configuration(&args.common, None)?;
    let pipeline = SnapshotPipeline::new(config)?;

    let partitions = pipeline.partitions().await?;
    println!(
        "{} {}",
        "Raw partitions in".bright_green().bold(),
        pipeline.config().raw_location().display()
    );
    for (i, partition) in partitions.iter().enumerate() {
        let marker = if i == 0 { " (latest)" } else { "" };
        println!(
            "  {} {}{}",
            partition.date.to_string().bright_cyan(),
            partition.segment,
            marker.bright_yellow()
        );
    }
    Ok(())
}

/// Set up structured logging on stderr
///
/// `RUST_LOG` takes precedence over the verbosity flags.
pub fn setup_logging(args: &CommonArgs) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("b3_refiner={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    debug!("Logging initialized at level: {}", log_level);
}

/// Load configuration using the layered approach (file -> args), then validate
pub fn load_configuration(common: &CommonArgs, run: Option<&RunArgs>) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load(common.config_file.as_deref()).with_context(|| {
        match &common.config_file {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Failed to load default configuration".to_string(),
        }
    })?;

    apply_cli_overrides(&mut config, common, run);

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Apply CLI argument overrides to configuration
pub fn apply_cli_overrides(config: &mut PipelineConfig, common: &CommonArgs, run: Option<&RunArgs>) {
    if let Some(raw_bucket) = &common.raw_bucket {
        config.raw_bucket = raw_bucket.clone();
    }
    if let Some(raw_prefix) = &common.raw_prefix {
        config.raw_prefix = raw_prefix.clone();
    }
    if let Some(show_progress) = common.show_progress() {
        config.show_progress = show_progress;
    }

    let Some(run) = run else {
        return;
    };
    if let Some(output_path) = &run.output_path {
        config.output_path = output_path.clone();
    }
    if let Some(cast_policy) = run.cast_policy {
        config.cast_policy = cast_policy;
    }
    if let Some(write_mode) = run.write_mode {
        config.write_mode = write_mode;
    }
    if run.dry_run {
        config.dry_run = true;
    }
}

/// Print the run summary
fn print_summary(stats: &ProcessingStats) {
    let duration = HumanDuration(Duration::from_millis(stats.processing_time_ms as u64));
    let date = |d: Option<chrono::NaiveDate>| {
        d.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
    };

    println!();
    if stats.dry_run {
        println!("{}", "Dry Run Summary".bright_yellow().bold());
    } else {
        println!("{}", "Processing Summary".bright_green().bold());
    }
    println!("{} {}", "Reference date:".bright_cyan(), date(stats.reference_date));
    println!("{} {}", "Previous date:".bright_cyan(), date(stats.previous_date));
    println!(
        "{} {}",
        "Days since previous:".bright_cyan(),
        stats.days_since_previous
    );
    println!(
        "{} {}",
        "Partitions found:".bright_cyan(),
        stats.partitions_found
    );
    println!("{} {}", "Rows read:".bright_cyan(), stats.rows_read);
    println!("{} {}", "Companies:".bright_cyan(), stats.distinct_groups);
    if stats.values_nulled > 0 {
        println!(
            "{} {}",
            "Values nulled:".bright_yellow(),
            stats.values_nulled
        );
    }
    if !stats.dry_run {
        println!("{} {}", "Rows written:".bright_cyan(), stats.rows_written);
        println!(
            "{} {} ({} files)",
            "Partitions written:".bright_cyan(),
            stats.partitions_written,
            stats.files_written
        );
        println!("{} {}", "Output:".bright_cyan(), stats.output_path.display());
    }
    println!("{} {}", "Time elapsed:".bright_cyan(), duration);
}
