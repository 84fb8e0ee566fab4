//! Error types for the Holicast generation pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Outcome of a single failed generation attempt.
///
/// These never cross the batch boundary: the degradation policy reacts to
/// `Rejected`, everything else collapses into an empty artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request rejected by provider: {0}")]
    Rejected(String),

    #[error("Job did not finish after {attempts} status polls")]
    TimedOut { attempts: u32 },

    #[error("Translation failed: {0}")]
    TranslationFailed(String),
}

impl GenerationError {
    /// Whether the provider declined the prompt on policy grounds.
    pub fn is_rejected(&self) -> bool {
        matches!(self, GenerationError::Rejected(_))
    }
}

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(PathBuf),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Fatal errors surfaced by the public API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid prompt at index {index}: prompt text is empty")]
    InvalidPrompt { index: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Prompt source error: {0}")]
    SourceError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            GenerationError::Transport(format!("Request timeout: {}", error))
        } else if error.is_connect() {
            GenerationError::Transport(format!("Connection error: {}", error))
        } else if error.is_decode() {
            GenerationError::Transport(format!("Malformed payload: {}", error))
        } else {
            GenerationError::Transport(format!("HTTP error: {}", error))
        }
    }
}
