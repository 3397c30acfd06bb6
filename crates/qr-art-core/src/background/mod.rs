//! Модуль получения фона
//!
//! Источники фона:
//! - Градиент (вычисляется локально, ошибок не бывает)
//! - Внешнее изображение по URL (сетевая загрузка с ограничением по времени)
//! - Без фона (прозрачный холст)
//!
//! Любой результат нормализуется к каноническому размеру холста.

mod gradient;
#[cfg(feature = "fetch")]
mod fetch;

pub use gradient::{Gradient, GradientStop};
#[cfg(feature = "fetch")]
pub use fetch::{FetchConfig, FetchedImage, ImageFetcher};

use crate::provider::{GeneratedImage, ProviderError};
use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Канонический размер холста по умолчанию
pub const CANONICAL_SIZE: u32 = 512;

/// Ошибки сетевой загрузки
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Server returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),

    #[error("Image is larger than {limit} bytes")]
    TooLarge { limit: usize },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Network fetching is not available in this build")]
    Disabled,
}

/// Ошибки получения фона
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackgroundError {
    #[error("Background fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Background image could not be decoded: {0}")]
    Decode(String),

    #[error("Image provider failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Описание источника фона
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackgroundSource {
    Gradient(Gradient),
    ExternalImage { url: String },
    #[default]
    None,
}

/// Готовый растровый фон канонического размера
#[derive(Debug, Clone, PartialEq)]
pub struct Background {
    image: RgbaImage,
    /// Разрешает ли источник читать пиксели обратно (аналог CORS в браузере)
    origin_clean: bool,
}

impl Background {
    /// Фон из готового изображения, растягивается до `size`x`size`
    pub fn from_image(image: RgbaImage, size: u32) -> Self {
        Self {
            image: normalize(image, size),
            origin_clean: true,
        }
    }

    pub fn from_gradient(gradient: &Gradient, size: u32) -> Self {
        Self {
            image: gradient.render(size, size),
            origin_clean: true,
        }
    }

    /// Полностью прозрачный холст
    pub fn blank(size: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(size, size, Rgba([0, 0, 0, 0])),
            origin_clean: true,
        }
    }

    /// Декодирование байтов изображения (PNG, JPEG)
    pub fn decode(bytes: &[u8], size: u32) -> Result<Self, BackgroundError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| BackgroundError::Decode(e.to_string()))?;
        log::debug!("Decoded background {}x{}", img.width(), img.height());
        Ok(Self::from_image(img.to_rgba8(), size))
    }

    /// Пометить фон как запрещённый к экспорту
    pub fn with_origin_clean(mut self, origin_clean: bool) -> Self {
        self.origin_clean = origin_clean;
        self
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn origin_clean(&self) -> bool {
        self.origin_clean
    }

    pub fn size(&self) -> u32 {
        self.image.width()
    }
}

/// Растяжение до квадрата без сохранения пропорций
fn normalize(image: RgbaImage, size: u32) -> RgbaImage {
    if image.dimensions() == (size, size) {
        return image;
    }
    image::imageops::resize(&image, size, size, FilterType::Triangle)
}

/// Резолвер фона
pub struct BackgroundResolver {
    size: u32,
    #[cfg(feature = "fetch")]
    fetcher: ImageFetcher,
}

impl BackgroundResolver {
    /// Резолвер без сетевой загрузки
    #[cfg(not(feature = "fetch"))]
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    /// Резолвер с HTTP-клиентом
    #[cfg(feature = "fetch")]
    pub fn new(size: u32, config: FetchConfig) -> Result<Self, FetchError> {
        Ok(Self {
            size,
            fetcher: ImageFetcher::new(config)?,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Разрешение источников, не требующих сети
    pub fn resolve_local(&self, source: &BackgroundSource) -> Result<Background, BackgroundError> {
        match source {
            BackgroundSource::Gradient(gradient) => Ok(Background::from_gradient(gradient, self.size)),
            BackgroundSource::None => Ok(Background::blank(self.size)),
            BackgroundSource::ExternalImage { .. } => Err(FetchError::Disabled.into()),
        }
    }

    /// Разрешение любого источника
    #[cfg(feature = "fetch")]
    pub async fn resolve(&self, source: &BackgroundSource) -> Result<Background, BackgroundError> {
        match source {
            BackgroundSource::ExternalImage { url } => self.fetch(url).await,
            local => self.resolve_local(local),
        }
    }

    /// Превращение ответа провайдера в фон
    #[cfg(feature = "fetch")]
    pub async fn resolve_generated(&self, image: GeneratedImage) -> Result<Background, BackgroundError> {
        match image {
            GeneratedImage::Url(url) => self.fetch(&url).await,
            GeneratedImage::Bytes(bytes) => Background::decode(&bytes, self.size),
        }
    }

    /// Превращение ответа провайдера в фон (только готовые байты)
    #[cfg(not(feature = "fetch"))]
    pub fn resolve_generated(&self, image: GeneratedImage) -> Result<Background, BackgroundError> {
        match image {
            GeneratedImage::Url(_) => Err(FetchError::Disabled.into()),
            GeneratedImage::Bytes(bytes) => Background::decode(&bytes, self.size),
        }
    }

    #[cfg(feature = "fetch")]
    async fn fetch(&self, url: &str) -> Result<Background, BackgroundError> {
        log::info!("Fetching background from {}", url);
        let fetched = self.fetcher.fetch(url).await?;
        let background = Background::decode(&fetched.bytes, self.size)?;
        Ok(background.with_origin_clean(fetched.origin_clean))
    }
}
