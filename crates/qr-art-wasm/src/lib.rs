//! WASM bindings для генератора художественных QR-кодов
//!
//! Сеть на стороне WASM не используется: фон передаётся из JavaScript
//! готовыми байтами, ссылку Pollinations браузер загружает сам.

use qr_art_core::{
    export, generate_plain, to_data_url, ArtStyle, Background, Compositor, DecorationSpec, EncodingRequest,
    ExportFormat, Gradient, Palette, PollinationsProvider, QrArtError, ScanVerifier,
};
use wasm_bindgen::prelude::*;

/// Инициализация panic hook и логирования
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
    log::info!("QR Art WASM module initialized");
}

fn js_error(err: impl std::fmt::Display) -> JsError {
    JsError::new(&err.to_string())
}

fn parse_style(style: &str) -> Result<ArtStyle, JsError> {
    ArtStyle::from_id(style).ok_or_else(|| JsError::new(&format!("Unknown style: {}", style)))
}

/// JavaScript-доступный генератор
#[wasm_bindgen]
pub struct WasmQrArt {
    compositor: Compositor,
    verifier: ScanVerifier,
    pollinations: PollinationsProvider,
}

#[wasm_bindgen]
impl WasmQrArt {
    /// Генератор с оформлением по умолчанию
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::with_spec(DecorationSpec::default())
    }

    /// Генератор с оформлением из JSON (недостающие поля берутся по умолчанию)
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(config_json: &str) -> Result<WasmQrArt, JsError> {
        let spec: DecorationSpec = serde_json::from_str(config_json)
            .map_err(|e| js_error(QrArtError::Config(e.to_string())))?;
        spec.validate().map_err(js_error)?;
        Ok(Self::with_spec(spec))
    }

    fn with_spec(spec: DecorationSpec) -> Self {
        Self {
            compositor: Compositor::new(spec),
            verifier: ScanVerifier::new(),
            pollinations: PollinationsProvider::new(),
        }
    }

    /// Обычный QR-код в цветах палитры
    ///
    /// @param text - Кодируемый текст
    /// @param palette - classic | ocean | sunset | forest | purple | gold
    /// @param width - Сторона изображения
    /// @returns Uint8Array с PNG
    #[wasm_bindgen(js_name = renderPlain)]
    pub fn render_plain(&self, text: &str, palette: &str, width: u32) -> Result<Vec<u8>, JsError> {
        let palette = Palette::from_name(palette).unwrap_or_default();
        let result = generate_plain(&EncodingRequest::plain(text, palette), width).map_err(js_error)?;
        export(&result, ExportFormat::Png).map_err(js_error)
    }

    /// QR-код поверх фона
    ///
    /// @param text - Кодируемый текст
    /// @param background - Uint8Array с PNG/JPEG фона или undefined
    /// @returns Uint8Array с PNG
    #[wasm_bindgen(js_name = composeArt)]
    pub fn compose_art(&self, text: &str, background: Option<Vec<u8>>) -> Result<Vec<u8>, JsError> {
        let result = self.compose(text, background.as_deref())?;
        export(&result, ExportFormat::Png).map_err(js_error)
    }

    /// То же, что composeArt, но в виде data URL для <img src>
    #[wasm_bindgen(js_name = composeArtDataUrl)]
    pub fn compose_art_data_url(&self, text: &str, background: Option<Vec<u8>>) -> Result<String, JsError> {
        let result = self.compose(text, background.as_deref())?;
        to_data_url(&result, ExportFormat::Png).map_err(js_error)
    }

    fn compose(&self, text: &str, background: Option<&[u8]>) -> Result<qr_art_core::CompositionResult, JsError> {
        let size = self.compositor.spec().canvas_size;
        let background = match background {
            Some(bytes) => match Background::decode(bytes, size) {
                Ok(bg) => bg,
                Err(e) => {
                    log::warn!("Background unavailable ({}), using default gradient", e);
                    Background::from_gradient(&Gradient::default(), size)
                }
            },
            None => Background::from_gradient(&Gradient::default(), size),
        };
        self.compositor
            .art(&EncodingRequest::art(text), Some(&background))
            .map_err(js_error)
    }

    /// Ссылка на AI-фон Pollinations
    #[wasm_bindgen(js_name = pollinationsUrl)]
    pub fn pollinations_url(&self, prompt: &str, style: &str) -> Result<String, JsError> {
        let style = parse_style(style)?;
        self.pollinations.image_url(&style.prompt(prompt)).map_err(js_error)
    }

    /// Проверка сканируемости изображения
    ///
    /// @param image_data - Uint8Array с PNG/JPEG
    /// @returns Object { content, error_correction, version, decoder }
    #[wasm_bindgen]
    pub fn verify(&self, image_data: &[u8]) -> Result<JsValue, JsError> {
        let img = image::load_from_memory(image_data).map_err(js_error)?;
        let scanned = self.verifier.decode(&img.to_luma8()).map_err(js_error)?;
        serde_wasm_bindgen::to_value(&scanned).map_err(js_error)
    }
}

impl Default for WasmQrArt {
    fn default() -> Self {
        Self::new()
    }
}

/// Полный промпт для генератора изображений
#[wasm_bindgen(js_name = artPrompt)]
pub fn art_prompt(prompt: &str, style: &str) -> Result<String, JsError> {
    Ok(parse_style(style)?.prompt(prompt))
}

/// Информация о версии
#[wasm_bindgen(js_name = version)]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
