//! Command-line argument definitions for the B3 refiner
//!
//! The job runner passes nothing but a job name; every other flag exists for
//! local runs and overrides the configuration file.

use crate::config::{CastPolicy, WriteMode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Refine the latest B3 index-composition snapshot into partitioned parquet
#[derive(Debug, Clone, Parser)]
#[command(
    name = "b3-refiner",
    version,
    about = "Refine the latest raw B3 index-composition snapshot into a partitioned dataset",
    long_about = "Reads the most recent daily snapshot of the B3 index composition from the raw \
                  zone, normalizes its columns, annotates it with the reference date and the gap \
                  to the previous snapshot, aggregates per company and writes the result as a \
                  Hive-partitioned parquet dataset."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Refine the most recent raw partition
    Run(RunArgs),
    /// List the raw partitions, most recent first, and exit
    Partitions(PartitionsArgs),
}

/// Storage, config and logging options shared by every command
#[derive(Debug, Clone, clap::Args)]
pub struct CommonArgs {
    /// Configuration file (TOML)
    ///
    /// Defaults to `b3-refiner/config.toml` under the user config directory
    /// when that file exists.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Root directory of the raw bucket
    #[arg(long = "raw-bucket", value_name = "DIR")]
    pub raw_bucket: Option<PathBuf>,

    /// Prefix of the raw partitions inside the bucket
    #[arg(long = "raw-prefix", value_name = "PREFIX")]
    pub raw_prefix: Option<String>,

    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Only show errors
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Show a progress bar while writing partitions
    #[arg(long = "progress", conflicts_with = "quiet")]
    pub progress: bool,
}

impl CommonArgs {
    /// Determine the log level from the verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Progress bar setting requested on the command line, if any
    pub fn show_progress(&self) -> Option<bool> {
        if self.quiet {
            Some(false)
        } else if self.progress {
            Some(true)
        } else {
            None
        }
    }
}

/// Arguments for the run command
#[derive(Debug, Clone, Parser)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Root directory of the refined dataset
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output_path: Option<PathBuf>,

    /// How malformed numeric values are handled
    #[arg(long = "cast-policy", value_enum)]
    pub cast_policy: Option<CastPolicy>,

    /// How existing output partitions are treated
    #[arg(long = "write-mode", value_enum)]
    pub write_mode: Option<WriteMode>,

    /// Run every stage except the write
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Name of the triggering job, recorded in the logs
    #[arg(long = "job-name", value_name = "NAME")]
    pub job_name: Option<String>,
}

/// Arguments for the partitions command
#[derive(Debug, Clone, Parser)]
pub struct PartitionsArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

impl Commands {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Commands::Run(args) => &args.common,
            Commands::Partitions(args) => &args.common,
        }
    }
}
