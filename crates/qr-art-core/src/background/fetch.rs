//! Загрузка внешних изображений по HTTP
//!
//! Время ожидания всегда ограничено: таймаут соединения и запроса в клиенте
//! плюс общий `tokio::time::timeout` на весь цикл чтения тела.

use super::FetchError;
use reqwest::header::{ACCESS_CONTROL_ALLOW_ORIGIN, ACCEPT, CONTENT_LENGTH};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Настройки загрузки
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// Общий лимит времени на загрузку (мс)
    pub timeout_ms: u64,
    /// Лимит времени на установку соединения (мс)
    pub connect_timeout_ms: u64,
    /// Максимальный размер тела ответа
    pub max_bytes: usize,
    /// Требовать заголовок Access-Control-Allow-Origin для экспорта результата
    pub enforce_cors: bool,
    /// Собственный origin, который принимается в Access-Control-Allow-Origin
    /// наравне с `*`
    pub origin: Option<String>,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            connect_timeout_ms: 5_000,
            max_bytes: 20 * 1024 * 1024,
            enforce_cors: false,
            origin: None,
            user_agent: format!("qr-art/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Загруженные байты изображения
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    /// Источник разрешает использовать пиксели
    pub origin_clean: bool,
}

/// HTTP-загрузчик изображений
pub struct ImageFetcher {
    http: reqwest::Client,
    config: FetchConfig,
}

impl ImageFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Загрузка изображения. Таймаут возвращается как `FetchError::Timeout`.
    pub async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!("unsupported scheme: {}", parsed.scheme())));
        }

        let limit = Duration::from_millis(self.config.timeout_ms);
        match tokio::time::timeout(limit, self.fetch_inner(parsed)).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("Background fetch timed out after {} ms: {}", self.config.timeout_ms, url);
                Err(FetchError::Timeout(self.config.timeout_ms))
            }
        }
    }

    async fn fetch_inner(&self, url: reqwest::Url) -> Result<FetchedImage, FetchError> {
        let mut response = self
            .http
            .get(url.clone())
            .header(ACCEPT, "image/avif,image/webp,image/png,image/jpeg,image/*,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let declared_len = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if let Some(len) = declared_len {
            if len > self.config.max_bytes {
                return Err(FetchError::TooLarge { limit: self.config.max_bytes });
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let origin_clean = !self.config.enforce_cors
            || allows_origin(
                response
                    .headers()
                    .get(ACCESS_CONTROL_ALLOW_ORIGIN)
                    .and_then(|v| v.to_str().ok()),
                self.config.origin.as_deref(),
            );

        let mut bytes = Vec::with_capacity(declared_len.unwrap_or(0));
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_reqwest_error(e))? {
            if bytes.len() + chunk.len() > self.config.max_bytes {
                return Err(FetchError::TooLarge { limit: self.config.max_bytes });
            }
            bytes.extend_from_slice(&chunk);
        }

        log::debug!(
            "Fetched {} bytes ({}) from {}, origin_clean={}",
            bytes.len(),
            content_type.as_deref().unwrap_or("unknown type"),
            url,
            origin_clean
        );

        Ok(FetchedImage {
            bytes,
            content_type,
            origin_clean,
        })
    }

    fn map_reqwest_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.config.timeout_ms)
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Разрешает ли заголовок Access-Control-Allow-Origin использовать пиксели
fn allows_origin(header: Option<&str>, origin: Option<&str>) -> bool {
    match header.map(str::trim) {
        Some("*") => true,
        Some(value) => origin.is_some_and(|own| value.eq_ignore_ascii_case(own.trim_end_matches('/'))),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FetchConfig::default();
        assert_eq!(config.timeout_ms, 10_000);
        assert!(!config.enforce_cors);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: FetchConfig = serde_json::from_str(r#"{"timeout_ms": 250}"#).unwrap();
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.connect_timeout_ms, FetchConfig::default().connect_timeout_ms);
    }

    #[test]
    fn test_allow_origin_matching() {
        assert!(allows_origin(Some("*"), None));
        assert!(allows_origin(Some(" * "), Some("https://app.example")));
        assert!(allows_origin(Some("https://app.example"), Some("https://app.example/")));
        assert!(!allows_origin(Some("https://other.example"), Some("https://app.example")));
        assert!(!allows_origin(Some("https://other.example"), None));
        assert!(!allows_origin(Some("null"), None));
        assert!(!allows_origin(None, Some("https://app.example")));
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let fetcher = ImageFetcher::new(FetchConfig::default()).unwrap();
        let err = fetcher.fetch("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));

        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
