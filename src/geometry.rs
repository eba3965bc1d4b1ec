//! Geometry and color utilities — unit conversion, coordinate transforms,
//! alignment offsets, hex color parsing, and cache-key derivation.
//!
//! Template space is millimetres with the origin at the page's top-left
//! corner; PDF space is points with the origin at the bottom-left. Everything
//! a renderer positions goes through these helpers.

use crate::error::Error;
use crate::schema::{Alignment, Schema, SchemaType};

/// An RGB triple normalized to the 0.0–1.0 range.
pub type Rgb = [f32; 3];

/// 72 points per inch, 25.4 millimetres per inch.
const PT_PER_MM: f32 = 72.0 / 25.4;

pub fn mm2pt(mm: f32) -> f32 {
    mm * PT_PER_MM
}

pub fn pt2mm(pt: f32) -> f32 {
    pt / PT_PER_MM
}

/// Left edge of content in PDF points.
///
/// `box_width` and `content_width` are in points; renderers that do not
/// measure content pass the box width as content width (offset 0).
pub fn calc_x(x_mm: f32, alignment: Alignment, box_width: f32, content_width: f32) -> f32 {
    let addition = match alignment {
        Alignment::Left => 0.0,
        Alignment::Center => (box_width - content_width) / 2.0,
        Alignment::Right => box_width - content_width,
    };
    mm2pt(x_mm) + addition
}

/// Bottom edge of an item in PDF points. Template y runs down from the top
/// edge; PDF y runs up from the bottom edge.
pub fn calc_y(y_mm: f32, page_height: f32, item_height: f32) -> f32 {
    page_height - mm2pt(y_mm) - item_height
}

/// A schema's box converted to points, with the rotation passed through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxPt {
    pub width: f32,
    pub height: f32,
    /// Degrees, unmodified from the schema.
    pub rotate: f32,
}

pub fn schema_dims_to_pt(schema: &Schema) -> BoxPt {
    BoxPt {
        width: mm2pt(schema.width),
        height: mm2pt(schema.height),
        rotate: schema.rotate,
    }
}

/// Parse a hex color string: leading `#` optional, 3 digits expanded
/// digit-by-digit to 6, then split into R/G/B bytes normalized to 0.0–1.0.
///
/// Any other length (or a non-hex digit) is rejected rather than sliced
/// blindly; callers validate colors before any page is drawn.
pub fn hex_to_rgb(hex: &str) -> Result<Rgb, Error> {
    let stripped = hex.strip_prefix('#').unwrap_or(hex);
    if !stripped.is_ascii() {
        return Err(Error::InvalidColor(hex.to_string()));
    }

    let expanded: String = if stripped.len() == 3 {
        stripped.chars().flat_map(|c| [c, c]).collect()
    } else {
        stripped.to_string()
    };

    if expanded.len() != 6 {
        return Err(Error::InvalidColor(hex.to_string()));
    }

    let mut rgb = [0.0f32; 3];
    for (i, channel) in rgb.iter_mut().enumerate() {
        let byte = u8::from_str_radix(&expanded[i * 2..i * 2 + 2], 16)
            .map_err(|_| Error::InvalidColor(hex.to_string()))?;
        *channel = byte as f32 / 255.0;
    }
    Ok(rgb)
}

/// Cache key for renderer artifacts: type tag concatenated with the raw
/// input. Deliberately unscoped by schema instance, page, or record, so
/// identical (type, input) pairs share cached work across the whole batch.
pub fn cache_key(kind: &SchemaType, input: &str) -> String {
    format!("{}{}", kind.as_str(), input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mm_to_pt_factor() {
        assert!((mm2pt(25.4) - 72.0).abs() < 1e-4);
        assert!((pt2mm(72.0) - 25.4).abs() < 1e-4);
        assert!((mm2pt(10.0) - 28.3465).abs() < 1e-3);
    }

    #[test]
    fn y_flips_origin() {
        // Page 800pt tall, item 50pt tall, template y = 10mm from the top.
        let y = calc_y(10.0, 800.0, 50.0);
        assert!((y - (800.0 - mm2pt(10.0) - 50.0)).abs() < 1e-6);
    }

    #[test]
    fn alignment_offsets() {
        assert_eq!(calc_x(0.0, Alignment::Left, 100.0, 40.0), 0.0);
        assert_eq!(calc_x(0.0, Alignment::Center, 100.0, 40.0), 30.0);
        assert_eq!(calc_x(0.0, Alignment::Right, 100.0, 40.0), 60.0);
    }

    #[test]
    fn short_hex_expands() {
        assert_eq!(hex_to_rgb("#fff").unwrap(), hex_to_rgb("#ffffff").unwrap());
        assert_eq!(hex_to_rgb("abc").unwrap(), hex_to_rgb("aabbcc").unwrap());
    }

    #[test]
    fn six_digit_hex_channels() {
        let [r, g, b] = hex_to_rgb("#112233").unwrap();
        assert!((r - 17.0 / 255.0).abs() < 1e-6);
        assert!((g - 34.0 / 255.0).abs() < 1e-6);
        assert!((b - 51.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn malformed_hex_is_rejected() {
        for bad in ["#12345", "#1234567", "", "#gggggg", "zz1"] {
            assert!(
                matches!(hex_to_rgb(bad), Err(Error::InvalidColor(_))),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn cache_keys_collide_only_on_same_type_and_input() {
        let text = SchemaType::Text;
        let image = SchemaType::Image;
        assert_eq!(cache_key(&text, "hello"), cache_key(&text, "hello"));
        assert_ne!(cache_key(&text, "hello"), cache_key(&image, "hello"));
        assert_ne!(cache_key(&text, "hello"), cache_key(&text, "world"));
    }

    #[test]
    fn schema_box_converts_and_keeps_rotation() {
        let mut schema = Schema::text(0.0, 0.0, 25.4, 50.8);
        schema.rotate = 45.0;
        let dims = schema_dims_to_pt(&schema);
        assert!((dims.width - 72.0).abs() < 1e-4);
        assert!((dims.height - 144.0).abs() < 1e-4);
        assert_eq!(dims.rotate, 45.0);
    }
}
