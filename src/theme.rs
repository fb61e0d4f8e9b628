//! Semantic color tokens for the canvas, resolved once per frame.
//!
//! Colors arriving from the domain (track/event/connection hex strings) are
//! validated here before use; malformed input degrades to a theme default
//! instead of corrupting the render.
use eframe::egui::Color32;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
}

impl Default for ThemePreference {
    fn default() -> Self {
        ThemePreference::Dark
    }
}

/// Resolved token set handed to the scene builder each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasTheme {
    pub bg: Color32,
    pub track_alt: Color32,
    pub grid: Color32,
    pub text: Color32,
    pub text_secondary: Color32,
    pub text_muted: Color32,
    pub accent: Color32,
}

impl CanvasTheme {
    pub fn light() -> Self {
        Self {
            bg: Color32::from_rgb(0xff, 0xff, 0xff),
            track_alt: Color32::from_rgb(0xf8, 0xfa, 0xfc),
            grid: Color32::from_rgb(0xe2, 0xe8, 0xf0),
            text: Color32::from_rgb(0x0f, 0x17, 0x2a),
            text_secondary: Color32::from_rgb(0x47, 0x55, 0x69),
            text_muted: Color32::from_rgb(0x94, 0xa3, 0xb8),
            accent: Color32::from_rgb(0x3b, 0x82, 0xf6),
        }
    }

    pub fn dark() -> Self {
        Self {
            bg: Color32::from_rgb(0x0f, 0x17, 0x2a),
            track_alt: Color32::from_rgb(0x1e, 0x29, 0x3b),
            grid: Color32::from_rgb(0x33, 0x41, 0x55),
            text: Color32::from_rgb(0xf1, 0xf5, 0xf9),
            text_secondary: Color32::from_rgb(0x94, 0xa3, 0xb8),
            text_muted: Color32::from_rgb(0x64, 0x74, 0x8b),
            accent: Color32::from_rgb(0x60, 0xa5, 0xfa),
        }
    }

    pub fn resolve(preference: ThemePreference) -> Self {
        match preference {
            ThemePreference::Light => Self::light(),
            ThemePreference::Dark => Self::dark(),
        }
    }
}

/// Parse a `#rrggbb` color. Leading `#` optional, case insensitive.
pub fn parse_hex_color(input: &str) -> Option<Color32> {
    let raw = input.trim().trim_start_matches('#');
    if raw.len() != 6 {
        return None;
    }
    let bytes = hex::decode(raw).ok()?;
    Some(Color32::from_rgb(bytes[0], bytes[1], bytes[2]))
}

/// Resolve an optional domain color string, falling back when absent or
/// malformed.
pub fn color_or(input: Option<&str>, fallback: Color32) -> Color32 {
    input.and_then(parse_hex_color).unwrap_or(fallback)
}

/// Typed alpha composition. Replaces the string-suffix trick (`color + "22"`)
/// that breaks on malformed input.
pub fn with_alpha(color: Color32, alpha: u8) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha)
}

/// Black or white, whichever contrasts better against `background`.
pub fn contrast_text(background: Color32) -> Color32 {
    let luminance = (0.299 * background.r() as f32
        + 0.587 * background.g() as f32
        + 0.114 * background.b() as f32)
        / 255.0;
    if luminance > 0.5 {
        Color32::BLACK
    } else {
        Color32::WHITE
    }
}
