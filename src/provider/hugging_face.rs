//! Hugging Face inference backend: model-direct style.
//!
//! The style picks the model. Inference answers with raw image bytes, or with
//! HTTP 503 and an `estimated_time` while the model is being loaded; such a
//! request becomes a pending job and every poll re-issues the inference call,
//! so polls count against the rate budget.

use super::{build_provider_http_client, status_error, ImageBackend};
use crate::error::{ApiError, GenerationError};
use crate::types::{GenerationRequest, ImageBytes, ImagePayload, JobHandle, JobStatus, Submission};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co/models/";
const BASE_MODEL: &str = "stabilityai/stable-diffusion-xl-base-1.0";

const STYLE_MODELS: &[(&str, &str)] = &[
    ("PIXELART", "nerijs/pixel-art-xl"),
    ("ANIME", "Linaqruf/animagine-xl"),
    ("REALISTIC1", "digiplay/AbsoluteReality_v1.8.1"),
    ("REALISTIC2", "Yntec/epiCPhotoGasm"),
    ("INKPUNK", "Envvi/Inkpunk-Diffusion"),
    ("HUM", "Yntec/humu"),
    ("CARTOON", "Yntec/sexyToons"),
    ("IKEA", "ostris/ikea-instructions-lora-sdxl"),
];

/// Model and final prompt for a request.
///
/// Known styles map to a dedicated model; any other non-empty style is folded
/// into the prompt for the base model.
pub(crate) fn resolve_model(style: Option<&str>, prompt: &str) -> (&'static str, String) {
    match style {
        Some(style) => match STYLE_MODELS.iter().find(|(name, _)| *name == style) {
            Some((_, model)) => (*model, prompt.to_string()),
            None => (BASE_MODEL, format!("{} in style '{}'", prompt, style)),
        },
        None => (BASE_MODEL, prompt.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct LoadingResponse {
    estimated_time: Option<f64>,
}

enum InferenceOutcome {
    Image(ImageBytes),
    Loading(Option<f64>),
}

pub struct HuggingFaceBackend {
    client: Client,
    api_key: String,
    base_url: String,
    pending: Mutex<HashMap<String, GenerationRequest>>,
    next_job: AtomicU64,
}

impl HuggingFaceBackend {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let mut base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            client: build_provider_http_client(request_timeout)?,
            api_key,
            base_url,
            pending: Mutex::new(HashMap::new()),
            next_job: AtomicU64::new(1),
        })
    }

    /// Jobs still waiting for their model to load.
    pub fn pending_jobs(&self) -> usize {
        self.pending.lock().len()
    }

    async fn infer(&self, request: &GenerationRequest) -> Result<InferenceOutcome, GenerationError> {
        let (model, prompt) = resolve_model(request.style.as_deref(), &request.prompt);
        let url = format!("{}{}", self.base_url, model);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "inputs": prompt }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await?;
            return Ok(InferenceOutcome::Image(ImageBytes::new(bytes.to_vec())));
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            // Some deployments answer with single-quoted pseudo JSON.
            let normalized = body.replace('\'', "\"");
            if let Ok(loading) = serde_json::from_str::<LoadingResponse>(&normalized) {
                return Ok(InferenceOutcome::Loading(loading.estimated_time));
            }
        }
        Err(status_error("Hugging Face", status, &body))
    }
}

#[async_trait]
impl ImageBackend for HuggingFaceBackend {
    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, GenerationError> {
        match self.infer(request).await? {
            InferenceOutcome::Image(bytes) => Ok(Submission::Ready(ImagePayload::Bytes(bytes))),
            InferenceOutcome::Loading(estimated_time) => {
                let id = format!("hf-{}", self.next_job.fetch_add(1, Ordering::Relaxed));
                debug!(job = %id, ?estimated_time, "Model is loading, deferring inference");
                self.pending.lock().insert(id.clone(), request.clone());
                Ok(Submission::Pending(JobHandle::new(id)))
            }
        }
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, GenerationError> {
        let request = self
            .pending
            .lock()
            .get(handle.as_str())
            .cloned()
            .ok_or_else(|| GenerationError::Transport(format!("Unknown job {}", handle)))?;

        match self.infer(&request).await? {
            InferenceOutcome::Loading(_) => Ok(JobStatus::Pending),
            InferenceOutcome::Image(bytes) => Ok(JobStatus::Done(ImagePayload::Bytes(bytes))),
        }
    }

    fn name(&self) -> &str {
        "hugging_face"
    }

    fn poll_is_request(&self) -> bool {
        true
    }

    fn release(&self, handle: &JobHandle) {
        self.pending.lock().remove(handle.as_str());
    }
}
