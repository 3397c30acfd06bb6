//! Экспорт результата в PNG / JPEG

use crate::compose::CompositionResult;
use base64::Engine;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

/// Ошибки экспорта
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExportError {
    #[error("Export blocked: background origin does not allow reading pixels back")]
    Blocked,

    #[error("Image encoding failed: {0}")]
    Encode(String),
}

/// Формат файла
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
}

impl ExportFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
        }
    }
}

/// Режим генерации, влияет на имя файла
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Plain,
    Art,
}

/// Имя файла для сохранения
pub fn suggested_filename(kind: ExportKind, format: ExportFormat) -> String {
    let stem = match kind {
        ExportKind::Plain => "qrcode",
        ExportKind::Art => "ai-qr-code",
    };
    format!("{}.{}", stem, format.extension())
}

/// Кодирование результата в байты файла
pub fn export(result: &CompositionResult, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    if !result.origin_clean() {
        log::warn!("Refusing to export a result composed over a non-exportable background");
        return Err(ExportError::Blocked);
    }

    let mut buf = Cursor::new(Vec::new());
    match format {
        ExportFormat::Png => result
            .image()
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| ExportError::Encode(e.to_string()))?,
        ExportFormat::Jpeg => {
            // JPEG без альфа-канала
            let rgb = DynamicImage::ImageRgba8(result.image().clone()).to_rgb8();
            rgb.write_to(&mut buf, ImageFormat::Jpeg)
                .map_err(|e| ExportError::Encode(e.to_string()))?
        }
    }

    let bytes = buf.into_inner();
    log::debug!("Exported {}x{} as {:?}: {} bytes", result.width(), result.height(), format, bytes.len());
    Ok(bytes)
}

/// `data:` URL для показа в браузере
pub fn to_data_url(result: &CompositionResult, format: ExportFormat) -> Result<String, ExportError> {
    let bytes = export(result, format)?;
    Ok(format!(
        "data:{};base64,{}",
        format.mime_type(),
        base64::engine::general_purpose::STANDARD.encode(bytes)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::background::Background;
    use crate::compose::Compositor;
    use crate::request::EncodingRequest;

    fn composed() -> CompositionResult {
        Compositor::default()
            .art(&EncodingRequest::art("export me"), None)
            .unwrap()
    }

    #[test]
    fn test_png_export_roundtrips_pixels() {
        let result = composed();
        let bytes = export(&result, ExportFormat::Png).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(&decoded, result.image());
    }

    #[test]
    fn test_export_is_deterministic() {
        let result = composed();
        assert_eq!(
            export(&result, ExportFormat::Png).unwrap(),
            export(&result, ExportFormat::Png).unwrap()
        );
    }

    #[test]
    fn test_jpeg_export() {
        let bytes = export(&composed(), ExportFormat::Jpeg).unwrap();
        assert_eq!(&bytes[..2], &[0xff, 0xd8]);
    }

    #[test]
    fn test_blocked_export() {
        let bg = Background::blank(512).with_origin_clean(false);
        let result = Compositor::default()
            .art(&EncodingRequest::art("tainted"), Some(&bg))
            .unwrap();
        assert_eq!(export(&result, ExportFormat::Png), Err(ExportError::Blocked));
        assert_eq!(to_data_url(&result, ExportFormat::Png), Err(ExportError::Blocked));
    }

    #[test]
    fn test_data_url_and_filename() {
        let url = to_data_url(&composed(), ExportFormat::Png).unwrap();
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
        assert_eq!(suggested_filename(ExportKind::Art, ExportFormat::Png), "ai-qr-code.png");
        assert_eq!(suggested_filename(ExportKind::Plain, ExportFormat::Jpeg), "qrcode.jpg");
    }
}
