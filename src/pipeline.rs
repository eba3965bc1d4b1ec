//! Pipeline – ties together validation, template preprocessing, the
//! record × page × field generation loop, and postprocessing into a single
//! function call.

use crate::doc::{EmbedBox, EmbeddedPage, WorkingDocument};
use crate::error::Error;
use crate::fonts::FontManager;
use crate::renderer::{RenderCache, RenderContext, RendererRegistry};
use crate::schema::{validate_props, GenerateOptions, GenerateProps, Template};

/// Producer/Creator identifier stamped into every output document.
pub const TOOL_NAME: &str = "pdf-stencil";

/// Pure setup step: fresh working document (carrying the call's fonts) with
/// every base page embedded and its placement box computed. A malformed base
/// document fails here with no partial result.
fn preprocess(
    template: &Template,
    options: &GenerateOptions,
) -> Result<(WorkingDocument, Vec<EmbeddedPage>, Vec<EmbedBox>), Error> {
    let fonts = FontManager::from_options(options)?;
    let mut doc = WorkingDocument::new(fonts);
    let (embedded_pages, embed_boxes) = doc.embed_base_pages(&template.base_pdf)?;
    Ok((doc, embedded_pages, embed_boxes))
}

/// Stamp tool metadata onto the finished document. No layout effect.
fn postprocess(doc: &mut WorkingDocument) {
    doc.set_metadata(TOOL_NAME, TOOL_NAME);
}

/// Full pipeline with the built-in renderer set: template + input records →
/// PDF bytes.
///
/// One group of output pages is emitted per input record, in strict
/// (record, page) order. Either a complete document is produced or an error
/// is returned with no output.
pub fn generate(props: &GenerateProps) -> Result<Vec<u8>, Error> {
    generate_with_registry(props, RendererRegistry::built_in())
}

/// Like [`generate`], but with a caller-assembled registry (built-ins plus
/// extension renderers).
pub fn generate_with_registry(
    props: &GenerateProps,
    registry: RendererRegistry,
) -> Result<Vec<u8>, Error> {
    // 1. Pre-flight shape check: fails before any document mutation.
    validate_props(props)?;
    let GenerateProps {
        template,
        inputs,
        options,
    } = props;

    // 2. Preprocess the template once; pages and boxes are reused for every
    //    record.
    let (mut doc, embedded_pages, embed_boxes) = preprocess(template, options)?;

    if template.schemas.len() > embedded_pages.len() {
        log::warn!(
            "template has {} schema page(s) but the base PDF only {} page(s); extra schema pages are ignored",
            template.schemas.len(),
            embedded_pages.len()
        );
    }
    // Pages past the last schema page carry no fields and are not emitted;
    // excess schema pages are never reached.
    let page_count = embedded_pages.len().min(template.schemas.len());

    // 3. Compose: one output page per (record, page) pair, background first,
    //    then each present field in the record's own key order. The cache is
    //    shared across the entire call.
    let mut cache = RenderCache::new();

    for (record_index, record) in inputs.iter().enumerate() {
        for page_index in 0..page_count {
            let embedded_page = &embedded_pages[page_index];
            let page = doc.add_page(embedded_page.width, embedded_page.height);
            doc.draw_embedded_page(page, embedded_page, &embed_boxes[page_index]);

            for (key, value) in record {
                // A key with no schema on this page, or an empty value, is
                // skipped silently; sparse records never block a page.
                let Some(schema) = template.schemas[page_index].get(key) else {
                    continue;
                };
                if value.is_empty() {
                    continue;
                }

                let renderer = registry
                    .get(&schema.kind)
                    .ok_or_else(|| Error::UnsupportedSchemaType(schema.kind.clone()))?;
                renderer.render(RenderContext {
                    input: value.as_str(),
                    schema,
                    doc: &mut doc,
                    page,
                    options,
                    cache: &mut cache,
                })?;
            }
        }
        log::debug!(
            "composed record {}/{} ({} page(s))",
            record_index + 1,
            inputs.len(),
            page_count
        );
    }

    // 4. Postprocess and serialize.
    postprocess(&mut doc);
    doc.save()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{InputRecord, PageSchema, Schema};
    use crate::templates;

    fn props_with(schemas: Vec<PageSchema>, inputs: Vec<InputRecord>) -> GenerateProps {
        GenerateProps {
            template: Template {
                base_pdf: templates::blank_base_pdf(schemas.len().max(1)),
                schemas,
            },
            inputs,
            options: GenerateOptions::default(),
        }
    }

    #[test]
    fn pipeline_basic() {
        let mut page = PageSchema::new();
        page.insert("title".to_string(), Schema::text(10.0, 10.0, 100.0, 10.0));
        let mut record = InputRecord::new();
        record.insert("title".to_string(), "Hello".to_string());

        let bytes = generate(&props_with(vec![page], vec![record])).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn empty_inputs_produce_zero_pages() {
        let mut page = PageSchema::new();
        page.insert("title".to_string(), Schema::text(10.0, 10.0, 100.0, 10.0));

        let bytes = generate(&props_with(vec![page], vec![])).unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 0);
    }

    #[test]
    fn unknown_schema_type_aborts() {
        let mut page = PageSchema::new();
        page.insert(
            "code".to_string(),
            Schema::new(
                crate::schema::SchemaType::Custom("qrcode".to_string()),
                10.0,
                10.0,
                30.0,
                30.0,
            ),
        );
        let mut record = InputRecord::new();
        record.insert("code".to_string(), "https://example.com".to_string());

        let result = generate(&props_with(vec![page], vec![record]));
        assert!(matches!(result, Err(Error::UnsupportedSchemaType(_))));
    }
}
