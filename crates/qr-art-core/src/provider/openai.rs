//! Провайдер OpenAI Images (DALL-E 3)
//!
//! Ключ API передаётся вызывающей стороной, откуда он взят, провайдеру
//! неизвестно.

use super::{GeneratedImage, ImageProvider, ProviderError, ProviderFuture};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Параметры запроса к images API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub endpoint: String,
    pub model: String,
    pub size: String,
    pub quality: String,
    pub style: String,
    pub timeout_ms: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/images/generations".to_string(),
            model: "dall-e-3".to_string(),
            size: "1024x1024".to_string(),
            quality: "standard".to_string(),
            style: "vivid".to_string(),
            timeout_ms: 60_000,
        }
    }
}

#[derive(Serialize)]
struct GenerationBody<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    size: &'a str,
    quality: &'a str,
    style: &'a str,
}

#[derive(Deserialize)]
struct GenerationResponse {
    data: Vec<GenerationItem>,
}

#[derive(Deserialize)]
struct GenerationItem {
    url: Option<String>,
    b64_json: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Провайдер OpenAI
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_config(api_key, OpenAiConfig::default())
    }

    pub fn with_config(api_key: impl Into<String>, config: OpenAiConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            http,
            api_key: api_key.into(),
            config,
        }
    }

    async fn request(&self, prompt: &str) -> Result<GeneratedImage, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::MissingCredentials);
        }

        let body = GenerationBody {
            model: &self.config.model,
            prompt,
            n: 1,
            size: &self.config.size,
            quality: &self.config.quality,
            style: &self.config.style,
        };

        let resp = self
            .http
            .post(&self.config.endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key.trim()))
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| "Failed to generate image".to_string());
            log::warn!("OpenAI returned HTTP {}: {}", status.as_u16(), message);
            return Err(ProviderError::from_status(status.as_u16(), message));
        }

        parse_generation(&text)
    }
}

/// Разбор успешного ответа: первый элемент `data`
fn parse_generation(text: &str) -> Result<GeneratedImage, ProviderError> {
    use base64::Engine;

    let parsed: GenerationResponse =
        serde_json::from_str(text).map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;

    let item = parsed
        .data
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse("empty data array".to_string()))?;

    match (item.url, item.b64_json) {
        (Some(url), _) => Ok(GeneratedImage::Url(url)),
        (None, Some(b64)) => base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map(GeneratedImage::Bytes)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string())),
        (None, None) => Err(ProviderError::MalformedResponse("no url or b64_json".to_string())),
    }
}

impl ImageProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn generate<'a>(&'a self, prompt: &'a str) -> ProviderFuture<'a> {
        Box::pin(self.request(prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_response() {
        let json = r#"{"created":1,"data":[{"url":"https://cdn.example.com/img.png","revised_prompt":"x"}]}"#;
        assert_eq!(
            parse_generation(json).unwrap(),
            GeneratedImage::Url("https://cdn.example.com/img.png".to_string())
        );
    }

    #[test]
    fn test_parse_b64_response() {
        let json = r#"{"data":[{"b64_json":"aGVsbG8="}]}"#;
        assert_eq!(parse_generation(json).unwrap(), GeneratedImage::Bytes(b"hello".to_vec()));
    }

    #[test]
    fn test_parse_empty_response() {
        assert!(matches!(
            parse_generation(r#"{"data":[]}"#),
            Err(ProviderError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let provider = OpenAiProvider::new("  ");
        let err = provider.generate("a cat").await.unwrap_err();
        assert_eq!(err, ProviderError::MissingCredentials);
    }
}
