//! Fusion Brain (Kandinsky) backend: asynchronous, UUID-poll style.
//!
//! `run` accepts a multipart form whose `params` part is a JSON blob and answers
//! with a job uuid; `status/{uuid}` reports `INITIAL`/`PROCESSING` until the job
//! is `DONE` (base64 images) or `FAIL`.

use super::{build_provider_http_client, status_error, ImageBackend};
use crate::error::{ApiError, GenerationError};
use crate::types::{GenerationRequest, ImageBytes, ImagePayload, JobHandle, JobStatus, Submission};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.fusionbrain.ai";
const EDITOR_ORIGIN: &str = "https://editor.fusionbrain.ai";
const MODEL_ID: u32 = 1;

pub struct FusionBrainBackend {
    client: Client,
    base_url: String,
}

impl FusionBrainBackend {
    pub fn new(base_url: Option<String>, request_timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_provider_http_client(request_timeout)?,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    fn run_url(&self) -> String {
        format!(
            "{}/web/api/v1/text2image/run?model_id={}",
            self.base_url, MODEL_ID
        )
    }

    fn status_url(&self, handle: &JobHandle) -> String {
        format!("{}/web/api/v1/text2image/status/{}", self.base_url, handle)
    }
}

/// JSON blob carried in the `params` multipart field.
pub(crate) fn build_params(request: &GenerationRequest) -> serde_json::Value {
    json!({
        "type": "GENERATE",
        "generateParams": { "query": request.prompt },
        "width": request.dimensions.width,
        "height": request.dimensions.height,
        "style": request.style.as_deref().unwrap_or(""),
    })
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    uuid: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    censored: bool,
    #[serde(default)]
    error_description: Option<String>,
}

/// Map a status document onto the shared job status.
pub(crate) fn interpret_status(response: StatusResponse) -> JobStatus {
    match response.status.as_str() {
        "DONE" => {
            if response.censored {
                return JobStatus::Rejected("Image was censored by the provider".to_string());
            }
            let Some(encoded) = response.images.into_iter().next() else {
                return JobStatus::Error("Job finished without images".to_string());
            };
            match BASE64.decode(encoded.trim().as_bytes()) {
                Ok(bytes) => JobStatus::Done(ImagePayload::Bytes(ImageBytes::new(bytes))),
                Err(e) => JobStatus::Error(format!("Malformed base64 image: {}", e)),
            }
        }
        "FAIL" => JobStatus::Rejected(
            response
                .error_description
                .unwrap_or_else(|| "Generation failed".to_string()),
        ),
        _ => JobStatus::Pending,
    }
}

#[async_trait]
impl ImageBackend for FusionBrainBackend {
    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, GenerationError> {
        let params = build_params(request).to_string();
        let part = Part::text(params)
            .file_name("blob")
            .mime_str("application/json")
            .map_err(|e| GenerationError::Transport(format!("Invalid multipart part: {}", e)))?;
        let form = Form::new().part("params", part);

        let response = self
            .client
            .post(self.run_url())
            .header("Origin", EDITOR_ORIGIN)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("Fusion Brain", status, &body));
        }

        let run: RunResponse = response.json().await?;
        let uuid = run
            .uuid
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| GenerationError::Transport("Run response has no uuid".to_string()))?;
        Ok(Submission::Pending(JobHandle::new(uuid)))
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, GenerationError> {
        let response = self.client.get(self.status_url(handle)).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("Fusion Brain status", status, &body));
        }
        let status: StatusResponse = response.json().await?;
        Ok(interpret_status(status))
    }

    fn name(&self) -> &str {
        "fusion_brain"
    }
}
