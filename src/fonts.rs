//! Font registration and text measurement using `ttf-parser`.
//!
//! Caller-supplied fonts are parsed for real glyph advances; when a schema
//! names no font (and no fallback is registered) measurement uses
//! Helvetica-like heuristic metrics. Drawing always uses the built-in
//! Helvetica face; custom font programs are never embedded or subset.

use std::collections::HashMap;

use crate::error::Error;
use crate::schema::GenerateOptions;

/// A loaded font face with the metrics measurement needs.
struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    bytes: Vec<u8>,
    units_per_em: f32,
    ascender: f32,
}

/// Fonts available to one generation call, keyed by name.
pub struct FontManager {
    fonts: HashMap<String, FontData>,
    /// Used for schemas that name no font.
    fallback: Option<String>,
}

impl FontManager {
    pub fn new() -> Self {
        Self {
            fonts: HashMap::new(),
            fallback: None,
        }
    }

    /// Build the manager from the fonts carried in [`GenerateOptions`].
    pub fn from_options(options: &GenerateOptions) -> Result<Self, Error> {
        let mut manager = Self::new();
        for (name, entry) in &options.font {
            manager.load_font(name, entry.data.clone())?;
            if entry.fallback {
                manager.fallback = Some(name.clone());
            }
        }
        Ok(manager)
    }

    /// Load a TTF/OTF font from bytes.
    pub fn load_font(&mut self, name: &str, bytes: Vec<u8>) -> Result<(), Error> {
        let face = ttf_parser::Face::parse(&bytes, 0)
            .map_err(|e| Error::Font(format!("failed to parse font `{name}`: {e}")))?;

        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            bytes,
        };
        self.fonts.insert(name.to_string(), data);
        Ok(())
    }

    fn lookup(&self, name: Option<&str>) -> Option<&FontData> {
        name.and_then(|n| self.fonts.get(n))
            .or_else(|| self.fallback.as_deref().and_then(|n| self.fonts.get(n)))
    }

    /// Name of the loaded face measurement will actually use: the named font
    /// if registered, otherwise the fallback, otherwise `None` (heuristics).
    pub fn resolved_name<'a>(&'a self, name: Option<&'a str>) -> Option<&'a str> {
        name.filter(|n| self.fonts.contains_key(*n))
            .or_else(|| self.fallback.as_deref().filter(|n| self.fonts.contains_key(*n)))
    }

    /// Measure the width of one line at `font_size` points.
    ///
    /// With a loaded face we sum glyph advances; otherwise an average char
    /// width of 0.5 × font size approximates proportional metrics.
    /// `character_spacing` is added between consecutive glyphs.
    pub fn measure_text_width(
        &self,
        text: &str,
        font_size: f32,
        font_name: Option<&str>,
        character_spacing: f32,
    ) -> f32 {
        let spacing = character_spacing * text.chars().count().saturating_sub(1) as f32;

        let Some(data) = self.lookup(font_name) else {
            return text.chars().count() as f32 * font_size * 0.5 + spacing;
        };

        match ttf_parser::Face::parse(&data.bytes, 0) {
            Ok(face) => {
                let scale = font_size / data.units_per_em;
                let mut width = 0.0f32;
                for ch in text.chars() {
                    match face.glyph_index(ch) {
                        Some(gid) => {
                            width += face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale;
                        }
                        None => width += font_size * 0.5,
                    }
                }
                width + spacing
            }
            Err(_) => text.chars().count() as f32 * font_size * 0.5 + spacing,
        }
    }

    /// Ascender height in points for baseline placement.
    pub fn ascender_pt(&self, font_size: f32, font_name: Option<&str>) -> f32 {
        match self.lookup(font_name) {
            Some(data) => data.ascender / data.units_per_em * font_size,
            // Helvetica-like ratio.
            None => font_size * 0.75,
        }
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_text_width() {
        let manager = FontManager::new();
        let w = manager.measure_text_width("Hello", 16.0, None, 0.0);
        // 5 chars × 16 × 0.5 = 40
        assert!((w - 40.0).abs() < 0.1);
    }

    #[test]
    fn character_spacing_adds_between_glyphs() {
        let manager = FontManager::new();
        let plain = manager.measure_text_width("abcd", 10.0, None, 0.0);
        let spaced = manager.measure_text_width("abcd", 10.0, None, 2.0);
        assert!((spaced - plain - 6.0).abs() < 1e-4);
    }

    #[test]
    fn unknown_font_name_falls_back_to_heuristics() {
        let manager = FontManager::new();
        let named = manager.measure_text_width("Hi", 12.0, Some("NoSuchFont"), 0.0);
        let unnamed = manager.measure_text_width("Hi", 12.0, None, 0.0);
        assert_eq!(named, unnamed);
    }

    #[test]
    fn heuristic_ascender() {
        let manager = FontManager::new();
        assert!((manager.ascender_pt(16.0, None) - 12.0).abs() < 1e-4);
    }

    #[test]
    fn width_scales_linearly_with_font_size() {
        let manager = FontManager::new();
        let unit = manager.measure_text_width("Hello", 1.0, None, 0.0);
        let large = manager.measure_text_width("Hello", 26.0, None, 0.0);
        assert!((large - unit * 26.0).abs() < 1e-4);
    }

    #[test]
    fn resolved_name_is_none_without_loaded_fonts() {
        let manager = FontManager::new();
        assert_eq!(manager.resolved_name(Some("NoSuchFont")), None);
        assert_eq!(manager.resolved_name(None), None);
    }

    #[test]
    fn garbage_font_bytes_are_rejected() {
        let mut manager = FontManager::new();
        let result = manager.load_font("broken", vec![0x00, 0x01, 0x02]);
        assert!(matches!(result, Err(Error::Font(_))));
    }
}
