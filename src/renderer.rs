//! Field renderers — the registry the generation loop dispatches through,
//! the per-call shared cache, and the built-in `text` and `image` renderers.
//!
//! The registry is an explicit per-call value: built-ins plus whatever the
//! caller registers on top. There is no process-wide renderer state.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64_STD;
use base64::Engine as _;
use lopdf::ObjectId;

use crate::doc::{PageRef, WorkingDocument};
use crate::error::Error;
use crate::geometry::{self, cache_key};
use crate::schema::{Alignment, GenerateOptions, Schema, SchemaType};

/// Renderer-computed work worth sharing across the batch.
pub enum CachedArtifact {
    /// An image already embedded in the working document.
    Image {
        xobject: ObjectId,
        px_width: u32,
        px_height: u32,
    },
    /// Per-line text widths for one raw input, measured at a 1 pt font size
    /// with no character spacing. Size and spacing vary per schema and are
    /// applied at each use.
    LineWidths(Vec<f32>),
}

/// Memoization store for one generation call. Keys come from
/// [`geometry::cache_key`]; the store is created by the orchestrator, lent to
/// every renderer invocation, and dropped when the call ends.
#[derive(Default)]
pub struct RenderCache {
    entries: HashMap<String, CachedArtifact>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&CachedArtifact> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, artifact: CachedArtifact) {
        self.entries.insert(key, artifact);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything a renderer gets for one field occurrence.
pub struct RenderContext<'a> {
    pub input: &'a str,
    pub schema: &'a Schema,
    pub doc: &'a mut WorkingDocument,
    pub page: PageRef,
    pub options: &'a GenerateOptions,
    pub cache: &'a mut RenderCache,
}

/// The pluggable drawing capability for one field type. Draws onto the
/// context's page in place; any failure aborts the whole generation call.
pub trait FieldRenderer {
    fn render(&self, ctx: RenderContext<'_>) -> Result<(), Error>;
}

/// Mapping from schema type to renderer, assembled once per generation call.
pub struct RendererRegistry {
    renderers: HashMap<SchemaType, Box<dyn FieldRenderer>>,
}

impl RendererRegistry {
    /// The built-in set: `text` and `image`.
    pub fn built_in() -> Self {
        let mut renderers: HashMap<SchemaType, Box<dyn FieldRenderer>> = HashMap::new();
        renderers.insert(SchemaType::Text, Box::new(TextRenderer));
        renderers.insert(SchemaType::Image, Box::new(ImageRenderer));
        Self { renderers }
    }

    /// Overlay a caller-supplied renderer, replacing any existing entry for
    /// the same type.
    pub fn register(&mut self, kind: SchemaType, renderer: Box<dyn FieldRenderer>) {
        self.renderers.insert(kind, renderer);
    }

    pub fn get(&self, kind: &SchemaType) -> Option<&dyn FieldRenderer> {
        self.renderers.get(kind).map(Box::as_ref)
    }
}

/// Fill the schema box when a background color is set. The rectangle always
/// fills the box exactly (left alignment, content width = box width) and is
/// drawn before any field content.
fn draw_background(ctx: &mut RenderContext<'_>) -> Result<(), Error> {
    let Some(hex) = &ctx.schema.background_color else {
        return Ok(());
    };
    let color = geometry::hex_to_rgb(hex)?;
    let dims = geometry::schema_dims_to_pt(ctx.schema);
    let page_height = ctx.doc.page_height(ctx.page);
    let x = geometry::calc_x(ctx.schema.position.x, Alignment::Left, dims.width, dims.width);
    let y = geometry::calc_y(ctx.schema.position.y, page_height, dims.height);
    ctx.doc
        .draw_rectangle(ctx.page, x, y, dims.width, dims.height, dims.rotate, color);
    Ok(())
}

/// Built-in `text` renderer.
///
/// Splits the input on `\n`, measures each line through the document's font
/// manager, aligns it inside the schema box, and draws it with the built-in
/// Helvetica resource.
pub struct TextRenderer;

impl FieldRenderer for TextRenderer {
    fn render(&self, mut ctx: RenderContext<'_>) -> Result<(), Error> {
        draw_background(&mut ctx)?;

        let schema = ctx.schema;
        let dims = geometry::schema_dims_to_pt(schema);
        let page_height = ctx.doc.page_height(ctx.page);
        let font_name = schema.font_name.as_deref();
        let font_size = schema.font_size;
        let color = match &schema.font_color {
            Some(hex) => geometry::hex_to_rgb(hex)?,
            None => [0.0, 0.0, 0.0],
        };
        let line_height = schema.line_height.unwrap_or(1.0) * font_size;
        let ascender = ctx.doc.fonts().ascender_pt(font_size, font_name);

        let lines: Vec<&str> = ctx.input.split('\n').collect();
        // Cached widths are unit widths (1 pt, no spacing) and so depend only
        // on the resolved face; the face name scopes the entry.
        let key = match ctx.doc.fonts().resolved_name(font_name) {
            Some(face) => format!("{}\u{1}{}", cache_key(&schema.kind, ctx.input), face),
            None => cache_key(&schema.kind, ctx.input),
        };
        let unit_widths: Vec<f32> = match ctx.cache.get(&key) {
            Some(CachedArtifact::LineWidths(widths)) => widths.clone(),
            _ => {
                let widths: Vec<f32> = lines
                    .iter()
                    .map(|line| ctx.doc.fonts().measure_text_width(line, 1.0, font_name, 0.0))
                    .collect();
                ctx.cache
                    .insert(key, CachedArtifact::LineWidths(widths.clone()));
                widths
            }
        };

        // Top edge of the box in PDF coordinates; baselines step down from it.
        let box_top = geometry::calc_y(schema.position.y, page_height, 0.0);
        for (index, (line, unit_width)) in lines.iter().zip(&unit_widths).enumerate() {
            if line.is_empty() {
                continue;
            }
            let width = unit_width * font_size
                + schema.character_spacing * line.chars().count().saturating_sub(1) as f32;
            let x = geometry::calc_x(schema.position.x, schema.alignment, dims.width, width);
            let baseline = box_top - ascender - line_height * index as f32;
            ctx.doc.draw_text(
                ctx.page,
                line,
                x,
                baseline,
                font_size,
                color,
                schema.character_spacing,
                dims.rotate,
            );
        }
        Ok(())
    }
}

/// Built-in `image` renderer.
///
/// The input value is a base64 data URI. Pixels are decoded with the `image`
/// crate, embedded once per distinct input (shared through the cache), and
/// drawn at the schema box.
pub struct ImageRenderer;

impl FieldRenderer for ImageRenderer {
    fn render(&self, mut ctx: RenderContext<'_>) -> Result<(), Error> {
        draw_background(&mut ctx)?;

        let key = cache_key(&ctx.schema.kind, ctx.input);
        let xobject = match ctx.cache.get(&key) {
            Some(CachedArtifact::Image { xobject, .. }) => *xobject,
            _ => {
                let bytes = parse_data_uri(ctx.input)?;
                let decoded = image::load_from_memory(&bytes)
                    .map_err(|e| Error::Image(format!("decode error: {e}")))?;
                let rgb = decoded.to_rgb8();
                let (px_width, px_height) = rgb.dimensions();
                let xobject = ctx.doc.add_image_xobject(px_width, px_height, rgb.into_raw());
                ctx.cache.insert(
                    key,
                    CachedArtifact::Image {
                        xobject,
                        px_width,
                        px_height,
                    },
                );
                xobject
            }
        };

        let schema = ctx.schema;
        let dims = geometry::schema_dims_to_pt(schema);
        let page_height = ctx.doc.page_height(ctx.page);
        let x = geometry::calc_x(schema.position.x, Alignment::Left, dims.width, dims.width);
        let y = geometry::calc_y(schema.position.y, page_height, dims.height);
        ctx.doc
            .draw_image(ctx.page, xobject, x, y, dims.width, dims.height, dims.rotate);
        Ok(())
    }
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
fn parse_data_uri(src: &str) -> Result<Vec<u8>, Error> {
    if !src.starts_with("data:") {
        // Truncate on char boundaries; byte slicing can split a code point.
        let preview: String = src.chars().take(80).collect();
        return Err(Error::Image(format!(
            "image input must be a base64 data URI \
             (e.g. `data:image/png;base64,...`). Got: {preview:?}"
        )));
    }
    let rest = &src["data:".len()..];
    let comma_pos = rest.find(',').ok_or_else(|| {
        Error::Image("invalid data URI: missing `,` separator between header and data".to_string())
    })?;
    let header = &rest[..comma_pos];
    if !header.contains(";base64") {
        return Err(Error::Image(
            "only base64-encoded data URIs are supported. \
             The header must contain `;base64` (e.g. `data:image/png;base64,...`)."
                .to_string(),
        ));
    }
    let b64_data = rest[comma_pos + 1..].trim();
    BASE64_STD
        .decode(b64_data)
        .map_err(|e| Error::Image(format!("base64 decode error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_registry_covers_text_and_image() {
        let registry = RendererRegistry::built_in();
        assert!(registry.get(&SchemaType::Text).is_some());
        assert!(registry.get(&SchemaType::Image).is_some());
        assert!(registry
            .get(&SchemaType::Custom("qrcode".to_string()))
            .is_none());
    }

    #[test]
    fn extensions_overlay_built_ins() {
        struct Noop;
        impl FieldRenderer for Noop {
            fn render(&self, _ctx: RenderContext<'_>) -> Result<(), Error> {
                Ok(())
            }
        }

        let mut registry = RendererRegistry::built_in();
        registry.register(SchemaType::Custom("qrcode".to_string()), Box::new(Noop));
        assert!(registry
            .get(&SchemaType::Custom("qrcode".to_string()))
            .is_some());
    }

    #[test]
    fn cache_stores_and_returns_artifacts() {
        let mut cache = RenderCache::new();
        assert!(cache.is_empty());
        cache.insert(
            "textabc".to_string(),
            CachedArtifact::LineWidths(vec![12.5]),
        );
        assert_eq!(cache.len(), 1);
        match cache.get("textabc") {
            Some(CachedArtifact::LineWidths(widths)) => assert_eq!(widths, &vec![12.5]),
            _ => panic!("expected cached line widths"),
        }
        assert!(cache.get("imageabc").is_none());
    }

    #[test]
    fn data_uri_parsing() {
        let bytes = parse_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");

        assert!(matches!(
            parse_data_uri("http://example.com/a.png"),
            Err(Error::Image(_))
        ));
        assert!(matches!(
            parse_data_uri("data:image/png;base64"),
            Err(Error::Image(_))
        ));
        assert!(matches!(
            parse_data_uri("data:image/png,rawdata"),
            Err(Error::Image(_))
        ));
    }

    #[test]
    fn long_multibyte_non_uri_input_is_rejected() {
        // A multi-byte char straddling the preview cutoff must not panic.
        let mut src = "x".repeat(79);
        src.push('é');
        assert!(matches!(parse_data_uri(&src), Err(Error::Image(_))));
    }
}
