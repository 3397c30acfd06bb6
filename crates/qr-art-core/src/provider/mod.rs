//! Провайдеры AI-изображений для фона
//!
//! Провайдер получает готовый промпт и возвращает либо URL изображения,
//! либо его байты. Композитор о провайдерах ничего не знает: новый
//! провайдер добавляется реализацией трейта [`ImageProvider`].

mod pollinations;
#[cfg(feature = "fetch")]
mod openai;

pub use pollinations::{clean_prompt, PollinationsProvider};
#[cfg(feature = "fetch")]
pub use openai::{OpenAiConfig, OpenAiProvider};

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Ошибки провайдера изображений
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("No image provider is configured")]
    NotConfigured,

    #[error("API key is not configured")]
    MissingCredentials,

    #[error("Provider rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("Provider rate limit exceeded (HTTP {status})")]
    RateLimited { status: u16 },

    #[error("Provider rejected the request (HTTP {status}): {message}")]
    BadRequest { status: u16, message: String },

    #[error("Provider error (HTTP {status}): {message}")]
    Status { status: u16, message: String },

    #[error("Provider request failed: {0}")]
    Transport(String),

    #[error("Unexpected provider response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Классификация ответа по HTTP-статусу
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => ProviderError::Unauthorized { status },
            429 => ProviderError::RateLimited { status },
            400 | 422 => ProviderError::BadRequest { status, message },
            _ => ProviderError::Status { status, message },
        }
    }

    /// HTTP-статус, если он был
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Unauthorized { status }
            | ProviderError::RateLimited { status }
            | ProviderError::BadRequest { status, .. }
            | ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Результат генерации
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedImage {
    /// Изображение нужно скачать
    Url(String),
    /// Готовые байты PNG/JPEG
    Bytes(Vec<u8>),
}

pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Result<GeneratedImage, ProviderError>> + Send + 'a>>;

/// Источник AI-изображений
pub trait ImageProvider: Send + Sync {
    /// Имя для логов
    fn name(&self) -> &'static str;

    /// Генерация изображения по готовому промпту
    fn generate<'a>(&'a self, prompt: &'a str) -> ProviderFuture<'a>;
}
