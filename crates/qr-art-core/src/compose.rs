//! Модуль композиции
//!
//! Собирает итоговое изображение на собственном холсте:
//! 1. Заливка запасным цветом и фон, растянутый на весь холст
//! 2. Полупрозрачная светлая панель (quiet zone) по центру
//! 3. QR-матрица с целым размером модуля (не меньше 2 px), по центру панели
//! 4. Декоративная рамка вокруг панели
//!
//! Для плотных версий панель расширяется так, чтобы модуль оставался
//! не меньше [`MIN_MODULE_PX`].
//!
//! Читаемость гарантируется уровнем коррекции H, непрозрачностью панели
//! и равномерным масштабом QR (модули всегда квадратные).

use crate::background::{Background, CANONICAL_SIZE};
use crate::color::Color;
use crate::encoding::{encode, EncodingError, QrMatrix};
use crate::request::{EncodingRequest, ErrorCorrectionLevel};
use crate::QrArtError;
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

/// Ширина обычного QR-кода по умолчанию
pub const DEFAULT_PLAIN_WIDTH: u32 = 300;
/// Quiet zone обычного QR-кода в модулях
pub const PLAIN_QUIET_ZONE: u32 = 2;
/// Минимальный размер модуля на холсте. При 1 px декодеры теряют сетку.
pub const MIN_MODULE_PX: u32 = 2;
/// Рабочий диапазон непрозрачности панели
pub const PANEL_OPACITY_RANGE: std::ops::RangeInclusive<f32> = 0.85..=0.95;

/// Параметры оформления
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DecorationSpec {
    /// Сторона холста
    pub canvas_size: u32,
    /// Сторона светлой панели под QR
    pub panel_size: u32,
    pub panel_color: Color,
    /// Непрозрачность панели (рабочий диапазон 0.85 - 0.95)
    pub panel_opacity: f32,
    /// Отступ QR от края панели
    pub qr_margin: u32,
    /// Quiet zone внутри растра QR, в модулях
    pub quiet_zone_modules: u32,
    pub border_width: u32,
    pub border_color: Color,
    /// Заливка холста, когда фона нет
    pub fallback_fill: Color,
}

impl Default for DecorationSpec {
    fn default() -> Self {
        Self {
            canvas_size: CANONICAL_SIZE,
            panel_size: 300,
            panel_color: Color::WHITE,
            panel_opacity: 0.85,
            qr_margin: 10,
            quiet_zone_modules: 1,
            border_width: 3,
            border_color: Color::INK,
            fallback_fill: Color::rgb(0x93, 0x33, 0xea),
        }
    }
}

impl DecorationSpec {
    /// Те же пропорции для холста другого размера (панель ≈ 0.586 стороны)
    pub fn scaled_to(canvas_size: u32) -> Self {
        let base = Self::default();
        let k = canvas_size as f32 / base.canvas_size as f32;
        Self {
            canvas_size,
            panel_size: (base.panel_size as f32 * k).round() as u32,
            qr_margin: ((base.qr_margin as f32 * k).round() as u32).max(1),
            border_width: ((base.border_width as f32 * k).round() as u32).max(1),
            ..base
        }
    }

    /// Bounding box панели [x, y, width, height]
    pub fn panel_rect(&self) -> [u32; 4] {
        let size = self.panel_size.min(self.canvas_size);
        let offset = (self.canvas_size - size) / 2;
        [offset, offset, size, size]
    }

    /// Место, отведённое под растр QR внутри панели
    pub fn qr_area(&self) -> u32 {
        let [_, _, size, _] = self.panel_rect();
        size.saturating_sub(self.qr_margin * 2).max(1)
    }

    /// Размер модуля и панель для матрицы со стороной `modules`.
    /// Панель растёт, если модуль иначе вышел бы меньше [`MIN_MODULE_PX`].
    pub fn layout(&self, modules: u32) -> Layout {
        let total = modules + self.quiet_zone_modules * 2;
        let module_px = module_size(modules, self.quiet_zone_modules, self.qr_area()).max(MIN_MODULE_PX);
        let raster = total * module_px;

        let [_, _, base, _] = self.panel_rect();
        let panel = base.max(raster + self.qr_margin * 2).min(self.canvas_size);
        let offset = (self.canvas_size - panel) / 2;
        Layout {
            panel: [offset, offset, panel, panel],
            module_px,
            raster,
        }
    }

    /// Проверка значений, пришедших из конфигурации
    pub fn validate(&self) -> Result<(), QrArtError> {
        if !PANEL_OPACITY_RANGE.contains(&self.panel_opacity) {
            return Err(QrArtError::Config(format!(
                "panel_opacity {} is outside {:?}",
                self.panel_opacity, PANEL_OPACITY_RANGE
            )));
        }
        if self.canvas_size == 0 || self.panel_size == 0 || self.panel_size > self.canvas_size {
            return Err(QrArtError::Config(format!(
                "panel_size {} must be within canvas_size {}",
                self.panel_size, self.canvas_size
            )));
        }
        Ok(())
    }
}

/// Раскладка холста для конкретной матрицы
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Панель [x, y, width, height]
    pub panel: [u32; 4],
    pub module_px: u32,
    /// Сторона растра QR вместе с quiet zone
    pub raster: u32,
}

/// Цвета модулей
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleColors {
    pub dark: Color,
    pub light: Color,
}

impl From<&EncodingRequest> for ModuleColors {
    fn from(request: &EncodingRequest) -> Self {
        Self {
            dark: request.dark,
            light: request.light,
        }
    }
}

/// Формат пикселей результата
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
}

/// Итоговое изображение
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionResult {
    image: RgbaImage,
    /// Bounding box области QR [x, y, width, height]
    qr_bbox: [u32; 4],
    origin_clean: bool,
}

impl CompositionResult {
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn format(&self) -> PixelFormat {
        PixelFormat::Rgba8
    }

    pub fn qr_bbox(&self) -> [u32; 4] {
        self.qr_bbox
    }

    /// Можно ли читать пиксели для экспорта
    pub fn origin_clean(&self) -> bool {
        self.origin_clean
    }
}

/// Композитор
#[derive(Debug, Clone, Default)]
pub struct Compositor {
    spec: DecorationSpec,
}

impl Compositor {
    pub fn new(spec: DecorationSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &DecorationSpec {
        &self.spec
    }

    /// Помещается ли матрица на холст с модулем не меньше [`MIN_MODULE_PX`]
    pub fn check_fit(&self, matrix: &QrMatrix) -> Result<(), EncodingError> {
        let layout = self.spec.layout(matrix.width() as u32);
        if layout.raster > self.spec.canvas_size {
            return Err(EncodingError::TooDense {
                version: matrix.version(),
                needed: layout.raster,
                canvas: self.spec.canvas_size,
            });
        }
        Ok(())
    }

    /// Наложение QR на фон. Без фона холст заливается `fallback_fill`.
    pub fn compose(
        &self,
        background: Option<&Background>,
        matrix: &QrMatrix,
        colors: ModuleColors,
    ) -> CompositionResult {
        let spec = &self.spec;
        let size = spec.canvas_size;

        // 0-1. Непрозрачная основа и фон поверх неё
        let mut canvas = RgbaImage::from_pixel(size, size, spec.fallback_fill.with_opacity(1.0).to_rgba());
        let origin_clean = match background {
            Some(bg) => {
                if bg.image().dimensions() == (size, size) {
                    image::imageops::overlay(&mut canvas, bg.image(), 0, 0);
                } else {
                    let stretched = image::imageops::resize(
                        bg.image(),
                        size,
                        size,
                        image::imageops::FilterType::Triangle,
                    );
                    image::imageops::overlay(&mut canvas, &stretched, 0, 0);
                }
                bg.origin_clean()
            }
            None => {
                log::debug!("No background, using flat fill {}", spec.fallback_fill);
                true
            }
        };

        // 2. Панель
        let layout = spec.layout(matrix.width() as u32);
        let [px, py, panel, _] = layout.panel;
        if panel != spec.panel_rect()[2] {
            log::debug!("Panel widened to {}px for QR v{}", panel, matrix.version());
        }
        blend_rect(&mut canvas, px, py, panel, panel, spec.panel_color, spec.panel_opacity);

        // 3. Растр QR
        let module_px = layout.module_px;
        let qr = render_matrix(matrix, colors, module_px, spec.quiet_zone_modules);
        if qr.width() > size {
            log::warn!("QR raster {}px does not fit the {}px canvas", qr.width(), size);
        }

        // 4. По центру панели
        let qr_x = px as i64 + (panel as i64 - qr.width() as i64) / 2;
        let qr_y = py as i64 + (panel as i64 - qr.height() as i64) / 2;
        image::imageops::overlay(&mut canvas, &qr, qr_x, qr_y);

        // 5. Рамка
        stroke_rect(&mut canvas, px, py, panel, spec.border_width, spec.border_color);

        log::debug!(
            "Composed {}x{} canvas: QR v{} {:?}, module {}px at ({}, {})",
            size,
            size,
            matrix.version(),
            matrix.level(),
            module_px,
            qr_x,
            qr_y
        );

        // 6. Готовый результат
        CompositionResult {
            image: canvas,
            qr_bbox: [qr_x.max(0) as u32, qr_y.max(0) as u32, qr.width(), qr.height()],
            origin_clean,
        }
    }

    /// Валидация, кодирование (всегда уровень H) и композиция
    pub fn art(
        &self,
        request: &EncodingRequest,
        background: Option<&Background>,
    ) -> Result<CompositionResult, QrArtError> {
        request.validate()?;
        if request.level != ErrorCorrectionLevel::H {
            log::info!("Promoting error correction {:?} -> H for composited output", request.level);
        }
        let matrix = encode(&request.payload, ErrorCorrectionLevel::H)?;
        self.check_fit(&matrix)?;
        Ok(self.compose(background, &matrix, request.into()))
    }
}

/// Обычный QR-код без фона: холст `width`x`width`, залитый светлым цветом
pub fn render_plain(matrix: &QrMatrix, colors: ModuleColors, width: u32) -> CompositionResult {
    let width = width.max(1);
    let module_px = module_size(matrix.width() as u32, PLAIN_QUIET_ZONE, width);
    let qr = render_matrix(matrix, colors, module_px, PLAIN_QUIET_ZONE);

    let mut canvas = RgbaImage::from_pixel(width, width, colors.light.to_rgba());
    let offset = (width as i64 - qr.width() as i64) / 2;
    image::imageops::replace(&mut canvas, &qr, offset, offset);

    CompositionResult {
        image: canvas,
        qr_bbox: [offset.max(0) as u32, offset.max(0) as u32, qr.width(), qr.height()],
        origin_clean: true,
    }
}

/// Обычный QR-код по запросу: валидация, кодирование на уровне запроса
pub fn generate_plain(request: &EncodingRequest, width: u32) -> Result<CompositionResult, QrArtError> {
    request.validate()?;
    let matrix = encode(&request.payload, request.level)?;
    Ok(render_plain(&matrix, request.into(), width))
}

/// Целый размер модуля, при котором QR с quiet zone помещается в `area`
fn module_size(modules: u32, quiet_zone: u32, area: u32) -> u32 {
    let total = modules + quiet_zone * 2;
    (area / total.max(1)).max(1)
}

/// Растеризация матрицы: тёмные модули `dark`, светлые и quiet zone `light`
fn render_matrix(matrix: &QrMatrix, colors: ModuleColors, module_px: u32, quiet_zone: u32) -> RgbaImage {
    let total = (matrix.width() as u32 + quiet_zone * 2) * module_px;
    let dark = colors.dark.to_rgba();
    let mut img = RgbaImage::from_pixel(total, total, colors.light.to_rgba());

    for (y, row) in matrix.rows().enumerate() {
        for (x, &is_dark) in row.iter().enumerate() {
            if !is_dark {
                continue;
            }
            let px = (quiet_zone + x as u32) * module_px;
            let py = (quiet_zone + y as u32) * module_px;
            for dy in 0..module_px {
                for dx in 0..module_px {
                    img.put_pixel(px + dx, py + dy, dark);
                }
            }
        }
    }

    img
}

/// Смешивание прямоугольника с цветом заданной непрозрачности
fn blend_rect(canvas: &mut RgbaImage, x0: u32, y0: u32, w: u32, h: u32, color: Color, opacity: f32) {
    let alpha = opacity.clamp(0.0, 1.0) * (color.alpha() as f32 / 255.0);
    let inv = 1.0 - alpha;
    let x1 = (x0 + w).min(canvas.width());
    let y1 = (y0 + h).min(canvas.height());

    for y in y0..y1 {
        for x in x0..x1 {
            let p = canvas.get_pixel_mut(x, y);
            let base_alpha = p.0[3] as f32 / 255.0;
            for c in 0..3 {
                p.0[c] = (color.0[c] as f32 * alpha + p.0[c] as f32 * inv).round() as u8;
            }
            p.0[3] = ((alpha + base_alpha * inv) * 255.0).round() as u8;
        }
    }
}

/// Рамка толщиной `width`, центрированная по краю квадрата
fn stroke_rect(canvas: &mut RgbaImage, x: u32, y: u32, size: u32, width: u32, color: Color) {
    if width == 0 {
        return;
    }
    let color: Rgba<u8> = color.to_rgba();
    let outer_x = x as i32 - (width / 2) as i32;
    let outer_y = y as i32 - (width / 2) as i32;
    let outer = size + width;

    let bands = [
        Rect::at(outer_x, outer_y).of_size(outer, width),
        Rect::at(outer_x, outer_y + (outer - width) as i32).of_size(outer, width),
        Rect::at(outer_x, outer_y).of_size(width, outer),
        Rect::at(outer_x + (outer - width) as i32, outer_y).of_size(width, outer),
    ];
    for band in bands {
        draw_filled_rect_mut(canvas, band, color);
    }
}
