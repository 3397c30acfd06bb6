//! Модуль проверки сканируемости
//!
//! Декодирует готовое изображение обратно в текст так, как это сделал бы
//! сканер: rqrr, затем rxing, затем жёсткая бинаризация по порогу 128.

use crate::compose::CompositionResult;
use crate::request::ErrorCorrectionLevel;
use image::{GrayImage, Luma};
use rxing::qrcode::QRCodeReader;
use rxing::{BarcodeFormat, DecodingHintDictionary, Reader};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ошибки проверки
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    #[error("No QR code found in image")]
    NotFound,

    #[error("Failed to decode QR: {0}")]
    DecodeFailed(String),

    #[error("Decoded text does not match: expected {expected:?}, found {found:?}")]
    Mismatch { expected: String, found: String },
}

/// Результат сканирования
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScannedCode {
    /// Декодированный текст
    pub content: String,
    /// Уровень коррекции ошибок (если декодер его сообщает)
    pub error_correction: Option<ErrorCorrectionLevel>,
    /// Версия QR-кода (1-40)
    pub version: Option<u8>,
    /// Какой декодер сработал
    pub decoder: String,
}

/// Проверка сканируемости
pub struct ScanVerifier {
    /// Порог для жёсткой бинаризации
    threshold: u8,
}

impl Default for ScanVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanVerifier {
    pub fn new() -> Self {
        Self { threshold: 128 }
    }

    /// Проверка, что результат читается и содержит `expected`.
    /// Сначала сканируется область QR, затем всё изображение.
    pub fn verify(&self, result: &CompositionResult, expected: &str) -> Result<ScannedCode, ScanError> {
        let gray = image::DynamicImage::ImageRgba8(result.image().clone()).to_luma8();

        let [x, y, w, h] = result.qr_bbox();
        let cropped = image::imageops::crop_imm(&gray, x, y, w, h).to_image();
        let padded = pad(&cropped, w / 8 + 8);
        let scanned = match self.decode(&padded) {
            Ok(code) => code,
            Err(e) => {
                // Мелкие модули: увеличенная копия без сглаживания
                log::debug!("Cropped scan failed ({}), trying 2x upscale", e);
                let upscaled = image::imageops::resize(
                    &padded,
                    padded.width() * 2,
                    padded.height() * 2,
                    image::imageops::FilterType::Nearest,
                );
                match self.decode(&upscaled) {
                    Ok(code) => code,
                    Err(_) => self.decode(&gray)?,
                }
            }
        };

        if scanned.content != expected {
            return Err(ScanError::Mismatch {
                expected: expected.to_string(),
                found: scanned.content,
            });
        }
        Ok(scanned)
    }

    /// Декодирование QR-кода
    pub fn decode(&self, img: &GrayImage) -> Result<ScannedCode, ScanError> {
        if let Ok(result) = self.decode_with_rqrr(img) {
            return Ok(result);
        }
        if let Ok(result) = self.decode_with_rxing(img) {
            return Ok(result);
        }

        // Жёсткая бинаризация, как у простого сканера
        log::debug!("FALLBACK: Trying hard threshold ({})", self.threshold);
        let thresholded = self.apply_threshold(img);
        if let Ok(result) = self.decode_with_rqrr(&thresholded) {
            return Ok(result);
        }
        self.decode_with_rxing(&thresholded)
    }

    fn apply_threshold(&self, img: &GrayImage) -> GrayImage {
        let mut result = img.clone();
        for p in result.pixels_mut() {
            p.0[0] = if p.0[0] < self.threshold { 0 } else { 255 };
        }
        result
    }

    /// rqrr срабатывает assert на вырожденных сетках, поэтому паника
    /// превращается в обычную ошибку декодирования
    fn decode_with_rqrr(&self, img: &GrayImage) -> Result<ScannedCode, ScanError> {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| self.decode_with_rqrr_inner(img))).unwrap_or_else(
            |_| {
                log::warn!("RQRR: decoder panicked, skipping");
                Err(ScanError::DecodeFailed("rqrr panicked".to_string()))
            },
        )
    }

    fn decode_with_rqrr_inner(&self, img: &GrayImage) -> Result<ScannedCode, ScanError> {
        let mut prepared = rqrr::PreparedImage::prepare(img.clone());
        let grids = prepared.detect_grids();
        log::debug!("RQRR: Detected {} grids", grids.len());

        let grid = grids.first().ok_or(ScanError::NotFound)?;
        match grid.decode() {
            Ok((meta, content)) => {
                let error_correction = match meta.ecc_level {
                    0 => Some(ErrorCorrectionLevel::L),
                    1 => Some(ErrorCorrectionLevel::M),
                    2 => Some(ErrorCorrectionLevel::Q),
                    3 => Some(ErrorCorrectionLevel::H),
                    _ => None,
                };

                Ok(ScannedCode {
                    content,
                    error_correction,
                    version: Some(meta.version.0 as u8),
                    decoder: "rqrr".to_string(),
                })
            }
            Err(e) => {
                log::debug!("RQRR: Decode failed: {:?}", e);
                Err(ScanError::DecodeFailed(format!("{:?}", e)))
            }
        }
    }

    fn decode_with_rxing(&self, img: &GrayImage) -> Result<ScannedCode, ScanError> {
        let (width, height) = img.dimensions();

        // rxing ждёт packed ARGB: 0xAARRGGBB
        let pixels: Vec<u32> = img
            .as_raw()
            .iter()
            .map(|&gray| {
                let g = gray as u32;
                0xFF000000 | (g << 16) | (g << 8) | g
            })
            .collect();

        let mut hints = DecodingHintDictionary::new();
        hints.insert(
            rxing::DecodeHintType::POSSIBLE_FORMATS,
            rxing::DecodeHintValue::PossibleFormats(std::collections::HashSet::from([
                BarcodeFormat::QR_CODE,
            ])),
        );
        hints.insert(
            rxing::DecodeHintType::TRY_HARDER,
            rxing::DecodeHintValue::TryHarder(true),
        );

        let mut reader = QRCodeReader::new();

        let source = rxing::RGBLuminanceSource::new_with_width_height_pixels(
            width as usize,
            height as usize,
            &pixels,
        );
        let mut bitmap = rxing::BinaryBitmap::new(rxing::common::HybridBinarizer::new(source));
        if let Ok(result) = reader.decode_with_hints(&mut bitmap, &hints) {
            return Ok(ScannedCode {
                content: result.getText().to_string(),
                error_correction: None,
                version: None,
                decoder: "rxing-hybrid".to_string(),
            });
        }

        let source = rxing::RGBLuminanceSource::new_with_width_height_pixels(
            width as usize,
            height as usize,
            &pixels,
        );
        let mut bitmap = rxing::BinaryBitmap::new(rxing::common::GlobalHistogramBinarizer::new(source));
        match reader.decode_with_hints(&mut bitmap, &hints) {
            Ok(result) => Ok(ScannedCode {
                content: result.getText().to_string(),
                error_correction: None,
                version: None,
                decoder: "rxing-global".to_string(),
            }),
            Err(e) => {
                log::debug!("RXING: Not found: {}", e);
                Err(ScanError::NotFound)
            }
        }
    }
}

/// Белые поля вокруг вырезанной области
fn pad(img: &GrayImage, border: u32) -> GrayImage {
    let mut out = GrayImage::from_pixel(img.width() + border * 2, img.height() + border * 2, Luma([255]));
    image::imageops::replace(&mut out, img, border as i64, border as i64);
    out
}
