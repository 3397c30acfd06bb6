//! Линейный градиент, вычисляемый аналитически

use crate::color::Color;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Опорная точка градиента
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GradientStop {
    /// Позиция вдоль оси градиента (0.0 - 1.0)
    pub offset: f32,
    pub color: Color,
}

/// Линейный градиент
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Gradient {
    pub stops: Vec<GradientStop>,
    /// Направление в градусах: 0 = слева направо, 90 = сверху вниз
    #[serde(default)]
    pub angle_deg: f32,
}

impl Default for Gradient {
    /// Фиолетово-розовый градиент по диагонали
    fn default() -> Self {
        Self::linear(Color::rgb(0x93, 0x33, 0xea), Color::rgb(0xdb, 0x27, 0x77), 45.0)
    }
}

impl Gradient {
    /// Двухцветный градиент
    pub fn linear(from: Color, to: Color, angle_deg: f32) -> Self {
        Self {
            stops: vec![
                GradientStop { offset: 0.0, color: from },
                GradientStop { offset: 1.0, color: to },
            ],
            angle_deg,
        }
    }

    /// Сплошная заливка одним цветом
    pub fn solid(color: Color) -> Self {
        Self {
            stops: vec![GradientStop { offset: 0.0, color }],
            angle_deg: 0.0,
        }
    }

    /// Цвет в позиции `t` вдоль оси
    pub fn color_at(&self, t: f32) -> Rgba<u8> {
        sample(&self.sorted_stops(), t)
    }

    fn sorted_stops(&self) -> Vec<GradientStop> {
        let mut stops = self.stops.clone();
        stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        stops
    }

    /// Растеризация градиента в изображение `width`x`height`
    pub fn render(&self, width: u32, height: u32) -> RgbaImage {
        let (sin, cos) = self.angle_deg.to_radians().sin_cos();

        // Проекции углов изображения на ось градиента задают диапазон
        let corners = [
            (0.0f32, 0.0f32),
            (width as f32, 0.0),
            (0.0, height as f32),
            (width as f32, height as f32),
        ];
        let projections = corners.map(|(x, y)| x * cos + y * sin);
        let min = projections.iter().copied().fold(f32::INFINITY, f32::min);
        let max = projections.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let range = (max - min).max(f32::EPSILON);
        let stops = self.sorted_stops();

        RgbaImage::from_fn(width, height, |x, y| {
            let px = x as f32 + 0.5;
            let py = y as f32 + 0.5;
            let t = (px * cos + py * sin - min) / range;
            sample(&stops, t)
        })
    }
}

/// Выборка из отсортированных опорных точек
fn sample(stops: &[GradientStop], t: f32) -> Rgba<u8> {
    let (first, last) = match (stops.first(), stops.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Rgba([0, 0, 0, 0]),
    };

    let t = t.clamp(0.0, 1.0);
    if t <= first.offset {
        return first.color.to_rgba();
    }
    if t >= last.offset {
        return last.color.to_rgba();
    }

    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t >= a.offset && t <= b.offset {
            let span = b.offset - a.offset;
            let k = if span > f32::EPSILON { (t - a.offset) / span } else { 0.0 };
            return lerp(a.color, b.color, k);
        }
    }

    last.color.to_rgba()
}

fn lerp(a: Color, b: Color, k: f32) -> Rgba<u8> {
    let mut out = [0u8; 4];
    for (i, channel) in out.iter_mut().enumerate() {
        let v = a.0[i] as f32 + (b.0[i] as f32 - a.0[i] as f32) * k;
        *channel = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}
