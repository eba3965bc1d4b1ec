//! Data model — templates, field schemas, input records, and the pre-flight
//! props check.
//!
//! JSON field names match the original template format (`basePdf`,
//! `backgroundColor`, `fontSize`, …) so existing templates load directly.
//! Field maps are order-preserving: key insertion order determines draw
//! (z-)order on a page.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;
use crate::geometry;

/// Field definitions for one template page, keyed by field name.
pub type PageSchema = IndexMap<String, Schema>;

/// One row of data to overlay onto one copy of the template.
pub type InputRecord = IndexMap<String, String>;

/// The field-type tag a schema carries.
///
/// Known built-in types are dedicated variants; anything else (including the
/// barcode family, which needs a caller-registered renderer) is `Custom`. A
/// tag with no registered renderer surfaces as
/// [`Error::UnsupportedSchemaType`](crate::error::Error::UnsupportedSchemaType)
/// during generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaType {
    Text,
    Image,
    Custom(String),
}

impl SchemaType {
    pub fn as_str(&self) -> &str {
        match self {
            SchemaType::Text => "text",
            SchemaType::Image => "image",
            SchemaType::Custom(tag) => tag,
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for SchemaType {
    fn from(tag: &str) -> Self {
        match tag {
            "text" => SchemaType::Text,
            "image" => SchemaType::Image,
            other => SchemaType::Custom(other.to_string()),
        }
    }
}

impl Serialize for SchemaType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SchemaType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(SchemaType::from(tag.as_str()))
    }
}

/// Horizontal alignment of measured content inside a schema box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Field position in millimetres, measured from the page's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Declarative description of one field: type, placement, and styling.
///
/// Text-specific fields (`alignment`, `font_size`, …) carry defaults and are
/// simply unused by non-text renderers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(rename = "type")]
    pub kind: SchemaType,
    pub position: Position,
    /// Box width in millimetres.
    pub width: f32,
    /// Box height in millimetres.
    pub height: f32,
    /// Rotation in degrees (default 0), passed through to the drawing
    /// primitive unmodified.
    #[serde(default)]
    pub rotate: f32,
    /// Optional hex fill drawn behind the field content. Absent means no
    /// background draw call at all, not a default color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,

    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default = "Schema::default_font_size")]
    pub font_size: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(default)]
    pub character_spacing: f32,
    /// Line height as a multiple of the font size (default 1.0).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height: Option<f32>,
}

impl Schema {
    fn default_font_size() -> f32 {
        13.0
    }

    /// A schema of the given type at `(x, y)` mm with a `width`×`height` mm box.
    pub fn new(kind: SchemaType, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            kind,
            position: Position { x, y },
            width,
            height,
            rotate: 0.0,
            background_color: None,
            alignment: Alignment::default(),
            font_size: Self::default_font_size(),
            font_name: None,
            font_color: None,
            character_spacing: 0.0,
            line_height: None,
        }
    }

    pub fn text(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(SchemaType::Text, x, y, width, height)
    }

    pub fn image(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(SchemaType::Image, x, y, width, height)
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_background_color(mut self, hex: &str) -> Self {
        self.background_color = Some(hex.to_string());
        self
    }
}

/// Base document plus positional field definitions, one [`PageSchema`] per
/// base page. `schemas[i]` corresponds to page `i` of `base_pdf`; excess
/// schema pages are never reached, and base pages past the last schema page
/// are never emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Raw bytes of the base PDF. Serialised as base64 in JSON; a
    /// `data:application/pdf;base64,` prefix is accepted on input.
    #[serde(rename = "basePdf", with = "base64_bytes")]
    pub base_pdf: Vec<u8>,
    pub schemas: Vec<PageSchema>,
}

impl Template {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::InvalidProps(e.to_string()))
    }
}

/// A caller-supplied font: raw TTF/OTF bytes plus whether it is the fallback
/// for schemas that name no font.
#[derive(Debug, Clone)]
pub struct FontEntry {
    pub data: Vec<u8>,
    pub fallback: bool,
}

/// Options passed through to renderers. The core interprets no keys itself.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Fonts available for text measurement, keyed by name.
    pub font: HashMap<String, FontEntry>,
}

/// Everything one generation call needs: the template, the batch of records,
/// and renderer options.
#[derive(Debug, Clone)]
pub struct GenerateProps {
    pub template: Template,
    pub inputs: Vec<InputRecord>,
    pub options: GenerateOptions,
}

/// Pre-flight shape check. Runs before any document is created; a violation
/// fails fast with zero document mutation.
pub fn validate_props(props: &GenerateProps) -> Result<(), Error> {
    if props.template.base_pdf.is_empty() {
        return Err(Error::InvalidProps(
            "template.basePdf must not be empty".to_string(),
        ));
    }

    for (page_index, page_schema) in props.template.schemas.iter().enumerate() {
        for (key, schema) in page_schema {
            if !(schema.width.is_finite() && schema.width > 0.0)
                || !(schema.height.is_finite() && schema.height > 0.0)
            {
                return Err(Error::InvalidProps(format!(
                    "schemas[{page_index}].{key}: width and height must be positive"
                )));
            }
            if !schema.rotate.is_finite() {
                return Err(Error::InvalidProps(format!(
                    "schemas[{page_index}].{key}: rotate must be finite"
                )));
            }
            // Malformed colors fail here, before any page is drawn.
            if let Some(hex) = &schema.background_color {
                geometry::hex_to_rgb(hex)?;
            }
            if let Some(hex) = &schema.font_color {
                geometry::hex_to_rgb(hex)?;
            }
        }
    }

    Ok(())
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        // Strip an optional `data:application/pdf;base64,` style prefix.
        let payload = encoded.rsplit(',').next().unwrap_or(&encoded);
        STANDARD.decode(payload).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_type_round_trip() {
        assert_eq!(SchemaType::from("text"), SchemaType::Text);
        assert_eq!(SchemaType::from("image"), SchemaType::Image);
        assert_eq!(
            SchemaType::from("qrcode"),
            SchemaType::Custom("qrcode".to_string())
        );
        assert_eq!(SchemaType::Custom("qrcode".to_string()).as_str(), "qrcode");
    }

    #[test]
    fn template_json_defaults() {
        let json = r##"{
            "basePdf": "aGVsbG8=",
            "schemas": [
                {
                    "name": { "type": "text", "position": { "x": 10, "y": 20 }, "width": 80, "height": 10 },
                    "photo": { "type": "image", "position": { "x": 10, "y": 40 }, "width": 30, "height": 30 }
                }
            ]
        }"##;
        let template = Template::from_json(json).unwrap();
        assert_eq!(template.base_pdf, b"hello");
        assert_eq!(template.schemas.len(), 1);

        let name = &template.schemas[0]["name"];
        assert_eq!(name.kind, SchemaType::Text);
        assert_eq!(name.rotate, 0.0);
        assert_eq!(name.font_size, 13.0);
        assert_eq!(name.alignment, Alignment::Left);
        assert!(name.background_color.is_none());
    }

    #[test]
    fn page_schema_preserves_key_order() {
        let json = r##"{
            "basePdf": "aGVsbG8=",
            "schemas": [{
                "z": { "type": "text", "position": { "x": 0, "y": 0 }, "width": 10, "height": 10 },
                "a": { "type": "text", "position": { "x": 0, "y": 0 }, "width": 10, "height": 10 },
                "m": { "type": "text", "position": { "x": 0, "y": 0 }, "width": 10, "height": 10 }
            }]
        }"##;
        let template = Template::from_json(json).unwrap();
        let keys: Vec<&str> = template.schemas[0].keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn base_pdf_accepts_data_uri_prefix() {
        let json = r#"{ "basePdf": "data:application/pdf;base64,aGVsbG8=", "schemas": [] }"#;
        let template = Template::from_json(json).unwrap();
        assert_eq!(template.base_pdf, b"hello");
    }

    #[test]
    fn validate_rejects_empty_base_pdf() {
        let props = GenerateProps {
            template: Template {
                base_pdf: Vec::new(),
                schemas: Vec::new(),
            },
            inputs: Vec::new(),
            options: GenerateOptions::default(),
        };
        assert!(matches!(
            validate_props(&props),
            Err(Error::InvalidProps(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_dimensions_and_colors() {
        let mut page = PageSchema::new();
        page.insert("bad".to_string(), Schema::text(0.0, 0.0, 0.0, 10.0));
        let mut props = GenerateProps {
            template: Template {
                base_pdf: b"%PDF-".to_vec(),
                schemas: vec![page],
            },
            inputs: Vec::new(),
            options: GenerateOptions::default(),
        };
        assert!(matches!(
            validate_props(&props),
            Err(Error::InvalidProps(_))
        ));

        let mut page = PageSchema::new();
        page.insert(
            "tinted".to_string(),
            Schema::text(0.0, 0.0, 10.0, 10.0).with_background_color("#12345"),
        );
        props.template.schemas = vec![page];
        assert!(matches!(
            validate_props(&props),
            Err(Error::InvalidColor(_))
        ));
    }
}
