//! Core data model shared by the generation pipeline.

use crate::error::GenerationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Text description submitted to an image backend. Never blank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Prompt(String);

impl Prompt {
    /// `None` for empty or whitespace-only text.
    pub fn parse(text: &str) -> Option<Self> {
        if text.trim().is_empty() {
            None
        } else {
            Some(Prompt(text.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Requested image size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(512, 512)
    }
}

/// One generation attempt, built fresh for the original and the softened prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// `None` means "no style".
    pub style: Option<String>,
    pub dimensions: Dimensions,
}

/// Backend-specific correlation token for an asynchronous job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        JobHandle(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw image bytes. Empty means "no image produced".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ImageBytes(Vec<u8>);

impl ImageBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        ImageBytes(bytes)
    }

    pub fn empty() -> Self {
        ImageBytes(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for ImageBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageBytes({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for ImageBytes {
    fn from(value: Vec<u8>) -> Self {
        ImageBytes(value)
    }
}

/// Where a finished image can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    Bytes(ImageBytes),
    /// Needs a separate fetch call.
    Url(String),
}

/// Result of a submission call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Synchronous backends answer with the image directly.
    Ready(ImagePayload),
    /// Asynchronous backends hand out a job to poll.
    Pending(JobHandle),
}

/// Status reported by a polled job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Done(ImagePayload),
    Rejected(String),
    Error(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

/// Image produced for the prompt at `index` of the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub index: usize,
    pub bytes: ImageBytes,
}

impl ImageArtifact {
    pub fn new(index: usize, bytes: ImageBytes) -> Self {
        Self { index, bytes }
    }

    pub fn placeholder(index: usize) -> Self {
        Self::new(index, ImageBytes::empty())
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// What one attempt (or one policy run) produced, plus how many provider
/// requests it charged against the rate budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome<T> {
    pub result: T,
    pub requests_made: u32,
}

impl<T> AttemptOutcome<T> {
    pub fn new(result: T, requests_made: u32) -> Self {
        Self {
            result,
            requests_made,
        }
    }
}

pub type AttemptResult = AttemptOutcome<Result<ImageBytes, GenerationError>>;

/// N requests per rolling 60-second window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateBudget {
    pub requests_per_minute: u32,
    /// Extra slack added to every request slot.
    pub margin: Duration,
}

impl RateBudget {
    pub fn new(requests_per_minute: u32, margin: Duration) -> Self {
        Self {
            requests_per_minute: requests_per_minute.max(1),
            margin,
        }
    }

    /// Minimum spacing between two requests: `60 / rate + margin`.
    pub fn per_request_delay(&self) -> Duration {
        Duration::from_secs_f64(60.0 / f64::from(self.requests_per_minute)) + self.margin
    }
}
