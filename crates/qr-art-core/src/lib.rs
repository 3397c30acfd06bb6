//! QR Art Core - генерация QR-кодов поверх декоративного или AI-фона
//!
//! Библиотека для создания сканируемых QR-кодов с поддержкой:
//! - Кодирования текста в матрицу QR (уровни L/M/Q/H)
//! - Получения фона: градиент, внешнее изображение, AI-провайдер
//! - Композиции: полупрозрачная панель, QR по центру, рамка
//! - Экспорта в PNG / JPEG и проверки сканируемости через rqrr / rxing

pub mod color;
pub mod style;
pub mod request;
pub mod encoding;
pub mod background;
pub mod compose;
pub mod export;
pub mod verify;
pub mod provider;
pub mod events;
#[cfg(feature = "fetch")]
pub mod pipeline;
#[cfg(feature = "fetch")]
pub mod session;

pub use color::Color;
pub use style::{ArtStyle, Palette};
pub use request::{EncodingRequest, ErrorCorrectionLevel, ValidationError};
pub use encoding::{encode, EncodingError, QrMatrix};
pub use background::{
    Background, BackgroundError, BackgroundResolver, BackgroundSource, FetchError, Gradient,
    GradientStop, CANONICAL_SIZE,
};
pub use compose::{generate_plain, render_plain, CompositionResult, Compositor, DecorationSpec, ModuleColors};
pub use export::{export, to_data_url, ExportError, ExportFormat};
pub use verify::{ScanError, ScanVerifier, ScannedCode};
pub use provider::{GeneratedImage, ImageProvider, PollinationsProvider, ProviderError};
pub use events::{EventSink, LogSink, PipelineEvent};
#[cfg(feature = "fetch")]
pub use background::FetchConfig;
#[cfg(feature = "fetch")]
pub use provider::OpenAiProvider;
#[cfg(feature = "fetch")]
pub use pipeline::{ArtQrPipeline, BackgroundRequest, Generation, GenerationRequest, PipelineConfig};
#[cfg(feature = "fetch")]
pub use session::GenerationSession;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Основные ошибки модуля
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QrArtError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Background error: {0}")]
    Background(#[from] BackgroundError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Scan check failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Another generation is already in progress")]
    Busy,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Вид ошибки для UI и журнала событий
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Encoding,
    Fetch,
    Decode,
    Provider,
    ExportBlocked,
    Export,
    Scan,
    Busy,
    Config,
}

impl From<&BackgroundError> for ErrorKind {
    fn from(err: &BackgroundError) -> Self {
        match err {
            BackgroundError::Fetch(_) => ErrorKind::Fetch,
            BackgroundError::Decode(_) => ErrorKind::Decode,
            BackgroundError::Provider(_) => ErrorKind::Provider,
        }
    }
}

impl QrArtError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QrArtError::Validation(_) => ErrorKind::Validation,
            QrArtError::Encoding(_) => ErrorKind::Encoding,
            QrArtError::Background(e) => e.into(),
            QrArtError::Export(ExportError::Blocked) => ErrorKind::ExportBlocked,
            QrArtError::Export(_) => ErrorKind::Export,
            QrArtError::Scan(_) => ErrorKind::Scan,
            QrArtError::Busy => ErrorKind::Busy,
            QrArtError::Config(_) => ErrorKind::Config,
        }
    }
}
