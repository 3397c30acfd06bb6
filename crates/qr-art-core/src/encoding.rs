//! Модуль кодирования QR-кодов
//!
//! Превращает текст в матрицу модулей через крейт `qrcode`.
//! Одинаковые данные и уровень коррекции всегда дают одинаковую матрицу.

use crate::request::ErrorCorrectionLevel;
use qrcode::bits::Bits;
use qrcode::types::{EcLevel, QrError, QrResult};
use qrcode::{QrCode, Version};
use std::ops::Index;
use thiserror::Error;

/// Ошибки кодирования
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("Cannot encode an empty payload")]
    EmptyPayload,

    #[error("Payload of {len} bytes does not fit a QR code at level {level:?}")]
    DataTooLong {
        len: usize,
        level: ErrorCorrectionLevel,
    },

    #[error("QR version {version} needs {needed}px, canvas is {canvas}px")]
    TooDense { version: u8, needed: u32, canvas: u32 },

    #[error("QR encoding failed: {0}")]
    Failed(String),
}

/// Неизменяемая квадратная матрица модулей (`true` = тёмный модуль)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    modules: Vec<bool>,
    version: u8,
    level: ErrorCorrectionLevel,
}

impl QrMatrix {
    /// Число модулей по стороне (без quiet zone)
    pub fn width(&self) -> usize {
        self.width
    }

    /// Версия QR (1-40)
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn level(&self) -> ErrorCorrectionLevel {
        self.level
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        self.modules[y * self.width + x]
    }

    /// Строки матрицы сверху вниз
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.modules.chunks(self.width)
    }

    pub fn dark_count(&self) -> usize {
        self.modules.iter().filter(|&&m| m).count()
    }
}

impl Index<(usize, usize)> for QrMatrix {
    type Output = bool;

    fn index(&self, (x, y): (usize, usize)) -> &bool {
        &self.modules[y * self.width + x]
    }
}

/// Кодирование текста в матрицу QR
pub fn encode(payload: &str, level: ErrorCorrectionLevel) -> Result<QrMatrix, EncodingError> {
    if payload.is_empty() {
        return Err(EncodingError::EmptyPayload);
    }

    let ec_level = level.to_ec_level();
    let code = if payload.is_ascii() {
        QrCode::with_error_correction_level(payload.as_bytes(), ec_level)
    } else {
        // Оптимизатор qrcode принимает пары байтов UTF-8 за Shift-JIS (режим
        // Kanji), и сканер прочитает другой текст. Только байтовый режим.
        byte_mode_bits(payload.as_bytes(), ec_level).and_then(|bits| QrCode::with_bits(bits, ec_level))
    }
    .map_err(|e| match e {
            QrError::DataTooLong => EncodingError::DataTooLong {
                len: payload.len(),
                level,
            },
            other => EncodingError::Failed(other.to_string()),
        })?;

    let version = match code.version() {
        Version::Normal(v) | Version::Micro(v) => v as u8,
    };

    let modules = code
        .to_colors()
        .into_iter()
        .map(|c| c == qrcode::Color::Dark)
        .collect();

    log::debug!(
        "Encoded {} bytes: version {}, level {:?}, {} modules per side",
        payload.len(),
        version,
        level,
        code.width()
    );

    Ok(QrMatrix {
        width: code.width(),
        modules,
        version,
        level,
    })
}

/// Наименьшая версия, в которую данные помещаются в байтовом режиме
fn byte_mode_bits(data: &[u8], ec_level: EcLevel) -> QrResult<Bits> {
    for v in 1..=40 {
        let mut bits = Bits::new(Version::Normal(v));
        if bits.push_byte_data(data).is_ok() && bits.push_terminator(ec_level).is_ok() {
            return Ok(bits);
        }
    }
    Err(QrError::DataTooLong)
}
