//! OpenAI DALL-E backend: synchronous, URL style.
//!
//! A single `images/generations` call answers with an image URL which is then
//! downloaded. HTTP 400 is how the API reports an inappropriate prompt.

use super::{build_provider_http_client, download_image, status_error, ImageBackend};
use crate::error::{ApiError, GenerationError};
use crate::types::{GenerationRequest, ImageBytes, ImagePayload, JobHandle, JobStatus, Submission};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiBackend {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_provider_http_client(request_timeout)?,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct ImageGenerationRequest {
    prompt: String,
    n: u32,
    size: String,
}

impl ImageGenerationRequest {
    pub(crate) fn from_request(request: &GenerationRequest) -> Self {
        // DALL-E has no style parameter, the style travels in the prompt.
        let prompt = match request.style.as_deref() {
            Some(style) => format!("{} in style '{}'", request.prompt, style),
            None => request.prompt.clone(),
        };
        Self {
            prompt,
            n: 1,
            size: format!(
                "{}x{}",
                request.dimensions.width, request.dimensions.height
            ),
        }
    }
}

#[derive(Deserialize)]
struct ImageGenerationResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[async_trait]
impl ImageBackend for OpenAiBackend {
    async fn submit(&self, request: &GenerationRequest) -> Result<Submission, GenerationError> {
        let body = ImageGenerationRequest::from_request(request);
        let url = format!("{}/images/generations", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Rejected(super::truncate(&error_text, 256)));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error("OpenAI", status, &error_text));
        }

        let generation: ImageGenerationResponse = response.json().await?;
        let image_url = generation
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or_else(|| GenerationError::Transport("No image URL in response".to_string()))?;
        Ok(Submission::Ready(ImagePayload::Url(image_url)))
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, GenerationError> {
        Err(GenerationError::Transport(format!(
            "OpenAI images are synchronous, no job {} to poll",
            handle
        )))
    }

    async fn fetch(&self, payload: ImagePayload) -> Result<ImageBytes, GenerationError> {
        match payload {
            ImagePayload::Bytes(bytes) => Ok(bytes),
            ImagePayload::Url(url) => download_image(&self.client, &url).await,
        }
    }

    fn name(&self) -> &str {
        "openai"
    }
}
