//! Стили оформления
//!
//! - Палитры для обычного QR-кода (тёмный/светлый цвет модулей)
//! - Художественные стили для генерации AI-фона

use crate::color::Color;
use serde::{Deserialize, Serialize};

/// Палитра обычного QR-кода
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Palette {
    #[default]
    Classic,
    Ocean,
    Sunset,
    Forest,
    Purple,
    Gold,
}

impl Palette {
    pub const ALL: [Palette; 6] = [
        Palette::Classic,
        Palette::Ocean,
        Palette::Sunset,
        Palette::Forest,
        Palette::Purple,
        Palette::Gold,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Palette::Classic => "Classic",
            Palette::Ocean => "Ocean",
            Palette::Sunset => "Sunset",
            Palette::Forest => "Forest",
            Palette::Purple => "Purple",
            Palette::Gold => "Gold",
        }
    }

    /// Поиск палитры по имени (без учёта регистра)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Цвет тёмных модулей
    pub fn dark(&self) -> Color {
        match self {
            Palette::Classic => Color::rgb(0x00, 0x00, 0x00),
            Palette::Ocean => Color::rgb(0x00, 0x77, 0xbe),
            Palette::Sunset => Color::rgb(0xff, 0x6b, 0x6b),
            Palette::Forest => Color::rgb(0x2d, 0x50, 0x16),
            Palette::Purple => Color::rgb(0x6b, 0x46, 0xc1),
            Palette::Gold => Color::rgb(0xd9, 0x77, 0x06),
        }
    }

    /// Цвет светлых модулей
    pub fn light(&self) -> Color {
        match self {
            Palette::Classic => Color::rgb(0xff, 0xff, 0xff),
            Palette::Ocean => Color::rgb(0xe6, 0xf3, 0xff),
            Palette::Sunset => Color::rgb(0xff, 0xe5, 0xe5),
            Palette::Forest => Color::rgb(0xe8, 0xf5, 0xe8),
            Palette::Purple => Color::rgb(0xf3, 0xe8, 0xff),
            Palette::Gold => Color::rgb(0xfe, 0xf3, 0xc7),
        }
    }
}

/// Художественный стиль AI-фона
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArtStyle {
    #[default]
    Anime,
    Watercolor,
    Digital,
    Fantasy,
    Minimalist,
    Neon,
}

impl ArtStyle {
    pub const ALL: [ArtStyle; 6] = [
        ArtStyle::Anime,
        ArtStyle::Watercolor,
        ArtStyle::Digital,
        ArtStyle::Fantasy,
        ArtStyle::Minimalist,
        ArtStyle::Neon,
    ];

    /// Идентификатор стиля, подставляется в промпт
    pub fn id(&self) -> &'static str {
        match self {
            ArtStyle::Anime => "anime",
            ArtStyle::Watercolor => "watercolor",
            ArtStyle::Digital => "digital",
            ArtStyle::Fantasy => "fantasy",
            ArtStyle::Minimalist => "minimalist",
            ArtStyle::Neon => "neon",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.id().eq_ignore_ascii_case(id.trim()))
    }

    /// Цвета модулей, подобранные под стиль: (тёмный, светлый)
    pub fn module_colors(&self) -> (Color, Color) {
        match self {
            ArtStyle::Anime => (Color::rgb(0xff, 0x6b, 0x9d), Color::rgb(0xff, 0xe5, 0xf1)),
            ArtStyle::Watercolor => (Color::rgb(0x4a, 0x90, 0xe2), Color::rgb(0xe8, 0xf4, 0xfd)),
            ArtStyle::Digital => (Color::rgb(0x00, 0xd4, 0xaa), Color::rgb(0xe6, 0xff, 0xf7)),
            ArtStyle::Fantasy => (Color::rgb(0x9b, 0x59, 0xb6), Color::rgb(0xf4, 0xe6, 0xff)),
            ArtStyle::Minimalist => (Color::rgb(0x2c, 0x3e, 0x50), Color::rgb(0xff, 0xff, 0xff)),
            ArtStyle::Neon => (Color::rgb(0x00, 0xff, 0x88), Color::rgb(0x00, 0x00, 0x00)),
        }
    }

    /// Полный промпт для генератора изображений
    pub fn prompt(&self, description: &str) -> String {
        format!(
            "{}, {} style, beautiful, high quality, suitable for QR code background",
            description.trim(),
            self.id()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_lookup() {
        assert_eq!(Palette::from_name("ocean"), Some(Palette::Ocean));
        assert_eq!(Palette::from_name(" GOLD "), Some(Palette::Gold));
        assert_eq!(Palette::from_name("rainbow"), None);
    }

    #[test]
    fn test_palettes_keep_contrast() {
        // Тёмные модули должны быть темнее светлых в каждой палитре
        for palette in Palette::ALL {
            assert!(palette.dark().luma() < palette.light().luma(), "{}", palette.name());
        }
    }

    #[test]
    fn test_art_prompt() {
        assert_eq!(
            ArtStyle::Watercolor.prompt(" cherry blossom garden "),
            "cherry blossom garden, watercolor style, beautiful, high quality, suitable for QR code background"
        );
        assert_eq!(ArtStyle::from_id("NEON"), Some(ArtStyle::Neon));
    }
}
