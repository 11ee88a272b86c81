use crate::error::{DecodeError, TranslateError};
use crate::language::TARGET_LANGUAGE;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Translation API request body
#[derive(Debug, Serialize)]
pub struct TranslationRequest<'a> {
    pub text: &'a str,
    pub target_language: &'a str,
    /// Left unset so the service auto-detects the source language
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_language: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    pub text: String,
}

/// Extracts the translated text from a successful response body.
///
/// The service's field names are not a stable contract, so the schema lives
/// behind this trait rather than in the client.
pub trait ResponseDecoder: Send + Sync {
    fn decode(&self, body: &[u8]) -> Result<TranslationResult, DecodeError>;
}

/// Flat JSON object with a text field and an optional error field,
/// e.g. `{"translation": "Hello"}` or `{"error": "quota exceeded"}`.
#[derive(Debug, Clone)]
pub struct JsonFieldDecoder {
    text_field: String,
    error_field: String,
}

impl JsonFieldDecoder {
    pub fn new(text_field: impl Into<String>, error_field: impl Into<String>) -> Self {
        Self {
            text_field: text_field.into(),
            error_field: error_field.into(),
        }
    }
}

impl Default for JsonFieldDecoder {
    fn default() -> Self {
        Self::new("translation", "error")
    }
}

impl ResponseDecoder for JsonFieldDecoder {
    fn decode(&self, body: &[u8]) -> Result<TranslationResult, DecodeError> {
        let value: serde_json::Value = serde_json::from_slice(body)?;

        let error = value
            .get(&self.error_field)
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if !error.is_empty() {
            return Err(DecodeError::Upstream(error.to_string()));
        }

        let text = value
            .get(&self.text_field)
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(DecodeError::Empty);
        }

        Ok(TranslationResult {
            text: text.to_string(),
        })
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

/// HTTP client for the external translation service.
///
/// One attempt per call, bounded by the client timeout.
pub struct TranslateClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    decoder: Box<dyn ResponseDecoder>,
}

impl TranslateClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
        decoder: Box<dyn ResponseDecoder>,
    ) -> Result<Self, TranslateError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: format!("{}/translate", base_url.trim_end_matches('/')),
            decoder,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Translator for TranslateClient {
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let request = TranslationRequest {
            text,
            target_language: TARGET_LANGUAGE,
            source_language: None,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(TranslateError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let result = self.decoder.decode(&body)?;
        Ok(result.text)
    }
}
