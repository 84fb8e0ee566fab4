//! CLI parse: clap types for Holicast. No behavior; definitions only.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Holicast CLI - daily holiday illustrations
#[derive(Parser)]
#[command(name = "holicast")]
#[command(about = "Generate and store illustrations for today's holidays")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Working root (config/, gallery, records and holiday files live here)
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long)]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long)]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Illustrate the day's holidays and store the records
    Run {
        /// Regenerate even if records for the day exist
        #[arg(long)]
        force: bool,
        /// Day to process (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Generate images for ad-hoc prompts
    Generate {
        /// Prompts, one image each
        #[arg(required = true)]
        prompts: Vec<String>,
        /// Gallery root to write into (default: the configured gallery)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Remove gallery folders and records from previous days
    Clean,
    /// Keep running: generate, publish and clean on the configured schedule
    Serve,
    /// Print the effective configuration as TOML
    Config,
}
