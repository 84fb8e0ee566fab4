//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::cli::output::{format_generate_report, format_holidays};
use crate::cli::parse::Commands;
use crate::config::{ConfigLoader, HolicastConfig};
use crate::daily::{today, DailyRun};
use crate::error::ApiError;
use crate::gallery::Gallery;
use crate::pipeline::Pipeline;
use crate::schedule::{DailySchedule, LogPublisher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Runtime context for CLI execution: root directory and validated configuration.
pub struct RunContext {
    root: PathBuf,
    config: HolicastConfig,
}

impl RunContext {
    /// Create run context from the root and an optional explicit config file.
    pub fn new(root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let mut config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&root)?,
        };
        if config.storage.root == Path::new(".") {
            config.storage.root = root.clone();
        }
        Ok(Self {
            root,
            config: config.validated()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &HolicastConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Run { force, date } => {
                let date = match date {
                    Some(date) => *date,
                    None => today(self.config.storage.timezone_offset_hours)?,
                };
                let daily = DailyRun::from_config(&self.config)?;
                let holidays = daily.run(date, *force).await?;
                Ok(format_holidays(&holidays, &mut rand::thread_rng()))
            }
            Commands::Generate { prompts, out } => {
                let pipeline = Pipeline::from_config(&self.config)?;
                let report = pipeline.run(prompts).await?;

                let storage = &self.config.storage;
                let gallery_root = out.clone().unwrap_or_else(|| storage.gallery_path());
                let gallery = Gallery::new(gallery_root, storage.image_extension.clone());
                let date = today(storage.timezone_offset_hours)?;
                let paths = gallery.save_images(date, &report.artifacts)?;
                Ok(format_generate_report(&report.summary, &paths))
            }
            Commands::Clean => {
                let date = today(self.config.storage.timezone_offset_hours)?;
                let daily = DailyRun::from_config(&self.config)?;
                let report = daily.clean(date)?;
                Ok(format!(
                    "Removed {} gallery folder(s) and {} record file(s)",
                    report.gallery_folders, report.record_files
                ))
            }
            Commands::Serve => {
                let daily = Arc::new(DailyRun::from_config(&self.config)?);
                let schedule =
                    DailySchedule::from_config(&self.config, daily, Arc::new(LogPublisher))?;
                schedule
                    .serve_until(async {
                        if let Err(e) = tokio::signal::ctrl_c().await {
                            warn!(error = %e, "Cannot listen for Ctrl-C, serving until killed");
                            std::future::pending::<()>().await;
                        }
                    })
                    .await;
                Ok("Scheduler stopped".to_string())
            }
            Commands::Config => {
                info!(root = %self.root.display(), "Printing effective configuration");
                toml::to_string_pretty(&self.config).map_err(|e| {
                    ApiError::ConfigError(format!("Failed to render configuration: {}", e))
                })
            }
        }
    }
}
