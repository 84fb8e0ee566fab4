//! Merge rules: defaults, override order, conflict handling.
//!
//! Later sources win key by key. Only scalar defaults live here; structured
//! defaults (style lists, nested tables) come from the serde `default` hooks.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("generator.backend", "fusion_brain")?
        .set_default("pipeline.rounds", 1)?
        .set_default("storage.root", ".")?
        .set_default("storage.image_extension", "png")
}
