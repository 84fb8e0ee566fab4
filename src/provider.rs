//! Text-to-image providers behind one submit call.
//!
//! A single interface over interchangeable text-to-image backends: synchronous
//! URL-style (DALL-E), asynchronous UUID-poll style (Fusion Brain) and
//! model-direct style (Hugging Face inference). The rest of the pipeline only
//! sees [`ImageBackend`] and [`ImageJobClient`]; adding a provider means adding
//! one implementation here.

use crate::clock::Clock;
use crate::config::{BackendKind, GeneratorConfig, GeneratorSettings};
use crate::error::{ApiError, GenerationError};
use crate::translate::{prepare_prompt, Translator};
use crate::types::{
    AttemptOutcome, AttemptResult, Dimensions, GenerationRequest, ImageBytes, ImagePayload,
    JobHandle, JobStatus, Submission,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub mod fusion_brain;
pub mod hugging_face;
pub mod openai;

pub use fusion_brain::FusionBrainBackend;
pub use hugging_face::HuggingFaceBackend;
pub use openai::OpenAiBackend;

/// A text-to-image provider.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Start a generation. Synchronous backends return the image right away.
    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, GenerationError>;

    /// Query the status of a job returned by [`ImageBackend::submit`].
    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, GenerationError>;

    /// Turn a finished payload into bytes.
    async fn fetch(&self, payload: ImagePayload) -> Result<ImageBytes, GenerationError> {
        match payload {
            ImagePayload::Bytes(bytes) => Ok(bytes),
            ImagePayload::Url(url) => Err(GenerationError::Transport(format!(
                "Backend '{}' cannot download {}",
                self.name(),
                url
            ))),
        }
    }

    /// Get the provider name
    fn name(&self) -> &str;

    /// Whether every status poll re-issues a generation request that the
    /// provider bills against the rate budget.
    fn poll_is_request(&self) -> bool {
        false
    }

    /// Forget any state kept for `handle`. Called exactly once when the client
    /// stops tracking a job, whatever the outcome.
    fn release(&self, _handle: &JobHandle) {}
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_provider_http_client(request_timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .build()
        .map_err(|e| ApiError::HttpClient(format!("Failed to create HTTP client: {}", e)))
}

/// Map a non-success response to a transport error, keeping a bounded body excerpt.
pub(crate) fn status_error(backend: &str, status: StatusCode, body: &str) -> GenerationError {
    GenerationError::Transport(format!(
        "{} request failed with status {}: {}",
        backend,
        status,
        truncate(body, 256)
    ))
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}

/// Download an image referenced by URL.
pub(crate) async fn download_image(client: &Client, url: &str) -> Result<ImageBytes, GenerationError> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        let status = response.status();
        return Err(status_error("Image download", status, ""));
    }
    let bytes = response.bytes().await?;
    Ok(ImageBytes::new(bytes.to_vec()))
}

/// Create the backend selected by configuration.
pub struct BackendFactory;

impl BackendFactory {
    pub fn create(config: &GeneratorConfig) -> Result<Arc<dyn ImageBackend>, ApiError> {
        let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
        let backend: Arc<dyn ImageBackend> = match config.backend {
            BackendKind::FusionBrain => Arc::new(FusionBrainBackend::new(
                config.endpoint.clone(),
                timeout,
            )?),
            BackendKind::OpenAi => {
                let api_key = config.resolved_api_key().ok_or_else(|| {
                    ApiError::ProviderNotConfigured("OpenAI API key is missing".to_string())
                })?;
                Arc::new(OpenAiBackend::new(api_key, config.endpoint.clone(), timeout)?)
            }
            BackendKind::HuggingFace => {
                let api_key = config.resolved_api_key().ok_or_else(|| {
                    ApiError::ProviderNotConfigured("Hugging Face token is missing".to_string())
                })?;
                Arc::new(HuggingFaceBackend::new(
                    api_key,
                    config.endpoint.clone(),
                    timeout,
                )?)
            }
        };
        Ok(backend)
    }
}

/// Performs one generation attempt for one prompt against one backend.
///
/// Submission, then at most `max_poll_attempts` fixed-interval polls. Every
/// failure ends as a [`GenerationError`] value; nothing is retried here.
pub struct ImageJobClient {
    backend: Arc<dyn ImageBackend>,
    translator: Option<Arc<dyn Translator>>,
    settings: GeneratorSettings,
    clock: Arc<dyn Clock>,
}

impl ImageJobClient {
    pub fn new(
        backend: Arc<dyn ImageBackend>,
        translator: Option<Arc<dyn Translator>>,
        settings: GeneratorSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            translator,
            settings,
            clock,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// One attempt: sanitize/translate, submit, poll until terminal or budget spent.
    pub async fn submit(
        &self,
        prompt: &str,
        style: Option<&str>,
        dimensions: Dimensions,
    ) -> AttemptResult {
        let translator = if self.settings.translate_prompt {
            self.translator.as_deref()
        } else {
            None
        };
        let prepared = prepare_prompt(prompt, translator, &self.settings.target_language).await;
        let request = GenerationRequest {
            prompt: prepared,
            style: style.map(str::to_string),
            dimensions,
        };

        let started = self.clock.now();
        debug!(
            backend = self.backend.name(),
            style = ?request.style,
            prompt_chars = request.prompt.chars().count(),
            "Submitting generation request"
        );

        // Submissions always count; polls only where the backend bills them.
        let mut requests_made = 1;
        let result = match self.backend.submit(&request).await {
            Ok(Submission::Ready(payload)) => self.fetch(payload).await,
            Ok(Submission::Pending(handle)) => {
                let (result, billed_polls) = self.await_job(&handle).await;
                requests_made += billed_polls;
                result
            }
            Err(e) => Err(e),
        };

        let duration_ms = (self.clock.now().saturating_sub(started)).as_millis();
        match &result {
            Ok(bytes) => info!(
                backend = self.backend.name(),
                bytes = bytes.len(),
                requests = requests_made,
                duration_ms,
                "Image generated"
            ),
            Err(e) if e.is_rejected() => warn!(
                backend = self.backend.name(),
                error = %e,
                duration_ms,
                "Generation rejected by provider"
            ),
            Err(e) => warn!(
                backend = self.backend.name(),
                error = %e,
                duration_ms,
                "Generation attempt failed"
            ),
        }

        AttemptOutcome::new(result, requests_made)
    }

    /// Poll until the job is terminal or the poll budget is spent. Returns the
    /// result and the number of polls the provider billed as requests.
    async fn await_job(&self, handle: &JobHandle) -> (Result<ImageBytes, GenerationError>, u32) {
        let _lease = JobLease {
            backend: self.backend.as_ref(),
            handle,
        };
        let billable = self.backend.poll_is_request();
        let interval = if billable {
            self.settings
                .poll_interval
                .max(self.settings.rate_budget.per_request_delay())
        } else {
            self.settings.poll_interval
        };

        let max_attempts = self.settings.max_poll_attempts;
        let mut billed = 0;
        for attempt in 1..=max_attempts {
            self.clock.sleep(interval).await;
            if billable {
                billed += 1;
            }
            let status = match self.backend.poll(handle).await {
                Ok(status) => status,
                Err(e) => return (Err(e), billed),
            };
            debug!(
                backend = self.backend.name(),
                job = %handle,
                attempt,
                terminal = status.is_terminal(),
                "Polled job status"
            );
            let result = match status {
                JobStatus::Pending => continue,
                JobStatus::Done(payload) => self.fetch(payload).await,
                JobStatus::Rejected(reason) => Err(GenerationError::Rejected(reason)),
                JobStatus::Error(reason) => Err(GenerationError::Transport(reason)),
            };
            return (result, billed);
        }
        (
            Err(GenerationError::TimedOut {
                attempts: max_attempts,
            }),
            billed,
        )
    }

    async fn fetch(&self, payload: ImagePayload) -> Result<ImageBytes, GenerationError> {
        let bytes = self.backend.fetch(payload).await?;
        if bytes.is_empty() {
            return Err(GenerationError::Transport(
                "Provider returned an empty image".to_string(),
            ));
        }
        Ok(bytes)
    }
}

/// Releases backend job state when dropped, so cancelled attempts clean up too.
struct JobLease<'a> {
    backend: &'a dyn ImageBackend,
    handle: &'a JobHandle,
}

impl Drop for JobLease<'_> {
    fn drop(&mut self) {
        self.backend.release(self.handle);
    }
}
