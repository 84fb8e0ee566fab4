//! Entry point for loading [`HolicastConfig`] from the layered sources.

use super::merge::builder_with_defaults;
use super::sources::{environment, global_file, workspace_file};
use super::HolicastConfig;
use crate::error::ApiError;
use config::File;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for `root`: defaults, user file, workspace files, env.
    pub fn load(root: &Path) -> Result<HolicastConfig, ApiError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, root)?;
        let builder = environment::add_to_builder(builder);

        let mut config: HolicastConfig = builder.build()?.try_deserialize()?;
        if config.storage.root == Path::new(".") {
            config.storage.root = root.to_path_buf();
        }
        debug!(root = %root.display(), backend = config.generator.backend.slug(), "Configuration loaded");
        Ok(config)
    }

    /// Load a single explicit file on top of the defaults and environment.
    pub fn load_from_file(path: &Path) -> Result<HolicastConfig, ApiError> {
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let builder = builder_with_defaults()?.add_source(File::from(path.to_path_buf()));
        let builder = environment::add_to_builder(builder);
        let config: HolicastConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}
