//! Best-effort prompt translation.
//!
//! Prompts are scraped in Russian while most backends draw more precise images
//! from English text. Translation is best-effort: any failure falls back to the
//! sanitized original.

use crate::error::GenerationError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

const GOOGLE_TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";
const TRANSLATE_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, GenerationError>;
}

/// Normalize quotation characters that confuse JSON-ish provider payloads.
pub fn sanitize_prompt(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '«' | '»' | '“' | '”' | '„' | '"' => '\'',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Sanitize `text` and, when a translator is supplied, translate it into
/// `target_lang`. Never fails.
pub async fn prepare_prompt(
    text: &str,
    translator: Option<&dyn Translator>,
    target_lang: &str,
) -> String {
    let sanitized = sanitize_prompt(text);
    let Some(translator) = translator else {
        return sanitized;
    };

    match translator.translate(&sanitized, "auto", target_lang).await {
        Ok(translated) if !translated.trim().is_empty() => translated.trim().to_string(),
        Ok(_) => sanitized,
        Err(e) => {
            warn!(error = %e, "Prompt translation failed, using original text");
            sanitized
        }
    }
}

/// Client for the public Google Translate web endpoint.
pub struct GoogleTranslator {
    client: Client,
    base_url: String,
}

impl GoogleTranslator {
    pub fn new() -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(TRANSLATE_TIMEOUT)
            .build()
            .map_err(|e| {
                GenerationError::TranslationFailed(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            base_url: GOOGLE_TRANSLATE_URL.to_string(),
        })
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, GenerationError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("client", "gtx"),
                ("sl", source_lang),
                ("tl", target_lang),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .map_err(|e| GenerationError::TranslationFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GenerationError::TranslationFailed(format!(
                "Translate request failed with status {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::TranslationFailed(e.to_string()))?;
        parse_google_response(&body)
    }
}

/// The endpoint answers `[[["translated", "original", ...], ...], ...]`;
/// long inputs come back split into several segments.
fn parse_google_response(body: &Value) -> Result<String, GenerationError> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| GenerationError::TranslationFailed("Unexpected response shape".into()))?;

    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect();

    if translated.is_empty() {
        return Err(GenerationError::TranslationFailed(
            "Empty translation".to_string(),
        ));
    }
    Ok(translated)
}
