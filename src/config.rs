//! Configuration System
//!
//! Layered configuration for the generation pipeline: built-in defaults, the
//! user-level file, workspace files, then `HOLICAST__*` environment variables.
//! The generation core never reads this directly; it receives an immutable
//! [`GeneratorSettings`] snapshot at construction time.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::types::{Dimensions, RateBudget};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HolicastConfig {
    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which text-to-image provider to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Asynchronous UUID-poll backend returning base64 images.
    #[default]
    FusionBrain,
    /// DALL-E: synchronous, answers with an image URL.
    OpenAi,
    /// Hugging Face inference: model-direct, answers with raw bytes.
    HuggingFace,
}

impl BackendKind {
    /// Provider-imposed requests-per-minute budget per account.
    pub fn default_requests_per_minute(self) -> u32 {
        match self {
            BackendKind::FusionBrain => 5,
            BackendKind::OpenAi => 5,
            BackendKind::HuggingFace => 3,
        }
    }

    pub fn requires_api_key(self) -> bool {
        !matches!(self, BackendKind::FusionBrain)
    }

    pub fn slug(self) -> &'static str {
        match self {
            BackendKind::FusionBrain => "fusion_brain",
            BackendKind::OpenAi => "openai",
            BackendKind::HuggingFace => "hugging_face",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Overrides the backend's own budget when set.
    #[serde(default)]
    pub requests_per_minute: Option<u32>,

    #[serde(default = "default_delay_margin")]
    pub delay_margin_secs: f64,

    #[serde(default = "default_side")]
    pub width: u32,

    #[serde(default = "default_side")]
    pub height: u32,

    /// Candidate styles; an empty string stands for "no style".
    #[serde(default = "default_styles")]
    pub styles: Vec<String>,

    #[serde(default = "default_soft_prompt")]
    pub soft_prompt: String,

    #[serde(default = "default_true")]
    pub translate_prompt: bool,

    #[serde(default = "default_target_language")]
    pub target_language: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: f64,

    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL override, mostly for self-hosted or proxied providers.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Seed for style selection. Unset means a fresh seed per process.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Seconds from configuration; values `validate` rejects fall back to `fallback`.
fn secs_to_duration(value: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_else(|_| Duration::from_secs_f64(fallback))
}

fn default_delay_margin() -> f64 {
    1.0
}

fn default_side() -> u32 {
    512
}

fn default_styles() -> Vec<String> {
    vec![String::new()]
}

fn default_soft_prompt() -> String {
    "A festive greeting card with balloons and confetti".to_string()
}

fn default_true() -> bool {
    true
}

fn default_target_language() -> String {
    "en".to_string()
}

fn default_poll_interval() -> f64 {
    3.0
}

fn default_max_poll_attempts() -> u32 {
    40
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            requests_per_minute: None,
            delay_margin_secs: default_delay_margin(),
            width: default_side(),
            height: default_side(),
            styles: default_styles(),
            soft_prompt: default_soft_prompt(),
            translate_prompt: default_true(),
            target_language: default_target_language(),
            poll_interval_secs: default_poll_interval(),
            max_poll_attempts: default_max_poll_attempts(),
            request_timeout_secs: default_request_timeout(),
            api_key: None,
            endpoint: None,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn rate_budget(&self) -> RateBudget {
        RateBudget::new(
            self.requests_per_minute
                .unwrap_or_else(|| self.backend.default_requests_per_minute()),
            secs_to_duration(self.delay_margin_secs, default_delay_margin()),
        )
    }

    /// Resolve the API key: explicit config first, then the backend's env var.
    pub fn resolved_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Some(key.clone());
        }
        let var = match self.backend {
            BackendKind::OpenAi => "HOLICAST_OPENAI_TOKEN",
            BackendKind::HuggingFace => "HOLICAST_HF_TOKEN",
            BackendKind::FusionBrain => return None,
        };
        std::env::var(var).ok().filter(|k| !k.trim().is_empty())
    }

    /// Immutable snapshot consumed by the generation core.
    pub fn settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            dimensions: Dimensions::new(self.width, self.height),
            styles: self
                .styles
                .iter()
                .map(|s| s.trim().to_string())
                .map(|s| if s.is_empty() { None } else { Some(s) })
                .collect(),
            soft_prompt: self.soft_prompt.clone(),
            translate_prompt: self.translate_prompt,
            target_language: self.target_language.clone(),
            poll_interval: secs_to_duration(self.poll_interval_secs, default_poll_interval()),
            max_poll_attempts: self.max_poll_attempts,
            rate_budget: self.rate_budget(),
            seed: self.seed,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.requests_per_minute == Some(0) {
            return Err("requests_per_minute must be greater than zero".to_string());
        }
        if self.width == 0 || self.height == 0 {
            return Err("Image dimensions must be non-zero".to_string());
        }
        if self.max_poll_attempts == 0 {
            return Err("max_poll_attempts must be at least 1".to_string());
        }
        for (name, value) in [
            ("delay_margin_secs", self.delay_margin_secs),
            ("poll_interval_secs", self.poll_interval_secs),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(format!(
                    "{} must be a finite, non-negative number of seconds (got {})",
                    name, value
                ));
            }
        }
        if self.soft_prompt.trim().is_empty() {
            return Err("soft_prompt cannot be empty".to_string());
        }
        if self.backend.requires_api_key() && self.resolved_api_key().is_none() {
            return Err(format!(
                "Backend '{}' requires an API key",
                self.backend.slug()
            ));
        }
        Ok(())
    }
}

/// Read-only view of the generator configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSettings {
    pub dimensions: Dimensions,
    /// `None` entries mean "no style".
    pub styles: Vec<Option<String>>,
    pub soft_prompt: String,
    pub translate_prompt: bool,
    pub target_language: String,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub rate_budget: RateBudget,
    pub seed: Option<u64>,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        GeneratorConfig::default().settings()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Passes over the batch; failed prompts are retried in later rounds.
    #[serde(default = "default_rounds")]
    pub rounds: u32,

    /// Overall batch deadline. Unfinished prompts become empty artifacts.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

fn default_rounds() -> u32 {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rounds: default_rounds(),
            deadline_secs: None,
        }
    }
}

impl PipelineConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,

    #[serde(default = "default_gallery_dir")]
    pub gallery_dir: PathBuf,

    #[serde(default = "default_records_dir")]
    pub records_dir: PathBuf,

    #[serde(default = "default_holidays_dir")]
    pub holidays_dir: PathBuf,

    #[serde(default = "default_image_extension")]
    pub image_extension: String,

    /// Fixed UTC offset used to decide what "today" is.
    #[serde(default = "default_timezone_offset")]
    pub timezone_offset_hours: i32,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_gallery_dir() -> PathBuf {
    PathBuf::from("gallery")
}

fn default_records_dir() -> PathBuf {
    PathBuf::from("storage")
}

fn default_holidays_dir() -> PathBuf {
    PathBuf::from("holiday_storage")
}

fn default_image_extension() -> String {
    "png".to_string()
}

fn default_timezone_offset() -> i32 {
    3
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            gallery_dir: default_gallery_dir(),
            records_dir: default_records_dir(),
            holidays_dir: default_holidays_dir(),
            image_extension: default_image_extension(),
            timezone_offset_hours: default_timezone_offset(),
        }
    }
}

impl StorageConfig {
    pub fn gallery_path(&self) -> PathBuf {
        self.root.join(&self.gallery_dir)
    }

    pub fn records_path(&self) -> PathBuf {
        self.root.join(&self.records_dir)
    }

    pub fn holidays_path(&self) -> PathBuf {
        self.root.join(&self.holidays_dir)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.image_extension.trim().is_empty() {
            return Err("image_extension cannot be empty".to_string());
        }
        if !(-12..=14).contains(&self.timezone_offset_hours) {
            return Err(format!(
                "timezone_offset_hours out of range: {}",
                self.timezone_offset_hours
            ));
        }
        Ok(())
    }
}

/// Times of day for the long-running `serve` mode, in the storage timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// "HH:MM" at which the day's records are generated ahead of posting.
    #[serde(default = "default_generate_at")]
    pub generate_at: String,

    /// "HH:MM" at which the day's records are published. Generates first when
    /// nothing is stored yet.
    #[serde(default = "default_post_at")]
    pub post_at: String,

    #[serde(default = "default_clean_every_days")]
    pub clean_every_days: u32,
}

fn default_generate_at() -> String {
    "00:05".to_string()
}

fn default_post_at() -> String {
    "09:00".to_string()
}

fn default_clean_every_days() -> u32 {
    7
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            generate_at: default_generate_at(),
            post_at: default_post_at(),
            clean_every_days: default_clean_every_days(),
        }
    }
}

fn parse_time_of_day(name: &str, value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| format!("{} must look like HH:MM (got '{}')", name, value))
}

impl ScheduleConfig {
    pub fn generate_time(&self) -> Result<NaiveTime, ApiError> {
        parse_time_of_day("generate_at", &self.generate_at).map_err(ApiError::ConfigError)
    }

    pub fn post_time(&self) -> Result<NaiveTime, ApiError> {
        parse_time_of_day("post_at", &self.post_at).map_err(ApiError::ConfigError)
    }

    pub fn clean_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.clean_every_days.max(1)) * 24 * 3600)
    }

    pub fn validate(&self) -> Result<(), String> {
        parse_time_of_day("generate_at", &self.generate_at)?;
        parse_time_of_day("post_at", &self.post_at)?;
        if self.clean_every_days == 0 {
            return Err("clean_every_days must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Generator(String),
    Pipeline(String),
    Storage(String),
    Schedule(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Generator(msg) => write!(f, "Generator: {}", msg),
            ValidationError::Pipeline(msg) => write!(f, "Pipeline: {}", msg),
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Schedule(msg) => write!(f, "Schedule: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl HolicastConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.generator.validate() {
            errors.push(ValidationError::Generator(e));
        }
        if self.pipeline.rounds == 0 {
            errors.push(ValidationError::Pipeline(
                "rounds must be at least 1".to_string(),
            ));
        }
        if let Err(e) = self.storage.validate() {
            errors.push(ValidationError::Storage(e));
        }

        if let Err(e) = self.schedule.validate() {
            errors.push(ValidationError::Schedule(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate and fold every problem into a single [`ApiError`].
    pub fn validated(self) -> Result<Self, ApiError> {
        self.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(self)
    }
}
