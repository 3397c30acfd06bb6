//! Цвета RGBA и разбор hex-нотации (`#RRGGBB`, `#RRGGBBAA`)

use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Ошибка разбора цвета
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid hex color: {0}")]
pub struct ColorParseError(pub String);

/// Цвет RGBA, сериализуется как hex-строка
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const BLACK: Color = Color([0, 0, 0, 255]);
    pub const WHITE: Color = Color([255, 255, 255, 255]);
    pub const TRANSPARENT: Color = Color([255, 255, 255, 0]);
    /// Тёмный цвет модулей для AI-режима (#1a1a1a)
    pub const INK: Color = Color([0x1a, 0x1a, 0x1a, 255]);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color([r, g, b, 255])
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color([r, g, b, a])
    }

    /// Разбор `#RRGGBB` или `#RRGGBBAA` (решётка необязательна)
    pub fn from_hex(hex: &str) -> Result<Self, ColorParseError> {
        let digits = hex.trim().trim_start_matches('#');
        if (digits.len() != 6 && digits.len() != 8) || !digits.is_ascii() {
            return Err(ColorParseError(hex.to_string()));
        }

        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| ColorParseError(hex.to_string()))
        };

        let alpha = if digits.len() == 8 { channel(6)? } else { 255 };
        Ok(Color([channel(0)?, channel(2)?, channel(4)?, alpha]))
    }

    pub fn alpha(&self) -> u8 {
        self.0[3]
    }

    /// Тот же цвет с заданной прозрачностью (0.0 - 1.0)
    pub fn with_opacity(self, opacity: f32) -> Self {
        let a = (opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
        Color([self.0[0], self.0[1], self.0[2], a])
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba(self.0)
    }

    /// Яркость по ITU-R BT.601 (без учёта альфы)
    pub fn luma(&self) -> f32 {
        0.299 * self.0[0] as f32 + 0.587 * self.0[1] as f32 + 0.114 * self.0[2] as f32
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        if a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
        }
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::from_hex(s)
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl From<Color> for Rgba<u8> {
    fn from(color: Color) -> Self {
        color.to_rgba()
    }
}
