//! Запрос на кодирование и его валидация

use crate::color::Color;
use crate::style::{ArtStyle, Palette};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Максимальная длина данных в байтах (версия 40, уровень L).
/// Всё, что длиннее, отклоняется ещё до попытки кодирования.
pub const MAX_PAYLOAD_BYTES: usize = 2953;

/// Ошибки валидации запроса
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("QR payload is empty")]
    EmptyPayload,

    #[error("QR payload is too long: {len} bytes (max {max})")]
    PayloadTooLong { len: usize, max: usize },

    #[error("Background prompt is empty")]
    EmptyPrompt,

    #[error("Dark modules ({dark}) must be darker than light modules ({light})")]
    InvertedContrast { dark: Color, light: Color },
}

/// Уровень коррекции ошибок
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ErrorCorrectionLevel {
    L, // ~7%
    #[default]
    M, // ~15%
    Q, // ~25%
    H, // ~30%
}

impl ErrorCorrectionLevel {
    pub(crate) fn to_ec_level(self) -> qrcode::EcLevel {
        match self {
            ErrorCorrectionLevel::L => qrcode::EcLevel::L,
            ErrorCorrectionLevel::M => qrcode::EcLevel::M,
            ErrorCorrectionLevel::Q => qrcode::EcLevel::Q,
            ErrorCorrectionLevel::H => qrcode::EcLevel::H,
        }
    }

    /// Разбор "L" / "M" / "Q" / "H"
    pub fn parse(level: &str) -> Option<Self> {
        match level.trim().to_ascii_uppercase().as_str() {
            "L" => Some(ErrorCorrectionLevel::L),
            "M" => Some(ErrorCorrectionLevel::M),
            "Q" => Some(ErrorCorrectionLevel::Q),
            "H" => Some(ErrorCorrectionLevel::H),
            _ => None,
        }
    }
}

/// Запрос на кодирование QR
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EncodingRequest {
    /// Текст или URL
    pub payload: String,
    /// Уровень коррекции ошибок
    #[serde(default)]
    pub level: ErrorCorrectionLevel,
    /// Цвет тёмных модулей
    pub dark: Color,
    /// Цвет светлых модулей (может быть полностью прозрачным)
    pub light: Color,
}

impl EncodingRequest {
    pub fn new(payload: impl Into<String>, level: ErrorCorrectionLevel, dark: Color, light: Color) -> Self {
        Self {
            payload: payload.into(),
            level,
            dark,
            light,
        }
    }

    /// Запрос для наложения на фон: уровень H, тёмные модули #1a1a1a,
    /// прозрачные светлые модули
    pub fn art(payload: impl Into<String>) -> Self {
        Self::new(payload, ErrorCorrectionLevel::H, Color::INK, Color::TRANSPARENT)
    }

    /// Обычный QR-код с цветами палитры
    pub fn plain(payload: impl Into<String>, palette: Palette) -> Self {
        Self::new(payload, ErrorCorrectionLevel::M, palette.dark(), palette.light())
    }

    /// QR-код в цветах художественного стиля, уровень H
    /// Светлые модули на тёмном фоне (neon) меняются местами, иначе код
    /// не читается сканерами.
    pub fn styled(payload: impl Into<String>, style: ArtStyle) -> Self {
        let (dark, light) = style.module_colors();
        let (dark, light) = if dark.luma() < light.luma() { (dark, light) } else { (light, dark) };
        Self::new(payload, ErrorCorrectionLevel::H, dark, light)
    }

    pub fn with_level(mut self, level: ErrorCorrectionLevel) -> Self {
        self.level = level;
        self
    }

    /// Проверка запроса до начала любой работы
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.payload.trim().is_empty() {
            return Err(ValidationError::EmptyPayload);
        }
        if self.payload.len() > MAX_PAYLOAD_BYTES {
            return Err(ValidationError::PayloadTooLong {
                len: self.payload.len(),
                max: MAX_PAYLOAD_BYTES,
            });
        }
        // Прозрачные светлые модули ложатся на белую панель
        let a = self.light.alpha() as f32 / 255.0;
        let light_luma = self.light.luma() * a + 255.0 * (1.0 - a);
        if self.dark.luma() >= light_luma {
            return Err(ValidationError::InvertedContrast {
                dark: self.dark,
                light: self.light,
            });
        }
        Ok(())
    }
}
