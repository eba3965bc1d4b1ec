//! Sample templates and base documents for testing and demonstration.
//!
//! Each sample exercises different schema types and layout features.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::schema::{Alignment, InputRecord, PageSchema, Schema, Template};

/// A4 portrait in points.
const A4_WIDTH_PT: f32 = 595.28;
const A4_HEIGHT_PT: f32 = 841.89;

/// Build a minimal blank base PDF with the given number of A4 pages.
pub fn blank_base_pdf(page_count: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::with_capacity(page_count);
    for _ in 0..page_count {
        let content = Content {
            operations: vec![Operation::new("q", vec![]), Operation::new("Q", vec![])],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode blank content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.0f32.into(),
                0.0f32.into(),
                A4_WIDTH_PT.into(),
                A4_HEIGHT_PT.into(),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {},
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize blank base PDF");
    bytes
}

/// A 1×1 black PNG as a base64 data URI, for image fields.
pub fn sample_png_data_uri() -> &'static str {
    "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg=="
}

/// Invoice-style template: header, addressee, amount, and a logo image.
pub fn invoice_template() -> Template {
    let mut page = PageSchema::new();
    page.insert(
        "title".to_string(),
        Schema::text(20.0, 20.0, 170.0, 12.0).with_alignment(Alignment::Center),
    );
    page.insert(
        "billedTo".to_string(),
        Schema::text(20.0, 45.0, 80.0, 30.0),
    );
    page.insert(
        "total".to_string(),
        Schema::text(120.0, 45.0, 70.0, 10.0)
            .with_alignment(Alignment::Right)
            .with_background_color("#eeeeee"),
    );
    page.insert("logo".to_string(), Schema::image(20.0, 250.0, 30.0, 30.0));

    Template {
        base_pdf: blank_base_pdf(1),
        schemas: vec![page],
    }
}

/// A batch of records matching [`invoice_template`].
pub fn invoice_inputs() -> Vec<InputRecord> {
    ["Acme Corp", "Client Inc", "Globex LLC"]
        .iter()
        .enumerate()
        .map(|(index, client)| {
            let mut record = InputRecord::new();
            record.insert(
                "title".to_string(),
                format!("Invoice #2024-{:03}", index + 1),
            );
            record.insert(
                "billedTo".to_string(),
                format!("{client}\n123 Business St\nNew York, NY"),
            );
            record.insert("total".to_string(), format!("${}.00", (index + 1) * 1500));
            record.insert("logo".to_string(), sample_png_data_uri().to_string());
            record
        })
        .collect()
}

/// Two-page certificate template: name/date on page one, notes on page two.
pub fn certificate_template() -> Template {
    let mut first = PageSchema::new();
    first.insert(
        "recipient".to_string(),
        Schema::text(30.0, 100.0, 150.0, 15.0).with_alignment(Alignment::Center),
    );
    first.insert(
        "date".to_string(),
        Schema::text(30.0, 130.0, 150.0, 8.0).with_alignment(Alignment::Center),
    );

    let mut second = PageSchema::new();
    second.insert("notes".to_string(), Schema::text(20.0, 30.0, 170.0, 60.0));

    Template {
        base_pdf: blank_base_pdf(2),
        schemas: vec![first, second],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_base_pdf_has_requested_pages() {
        for count in [1, 2, 5] {
            let bytes = blank_base_pdf(count);
            let doc = Document::load_mem(&bytes).unwrap();
            assert_eq!(doc.get_pages().len(), count);
        }
    }

    #[test]
    fn sample_templates_pass_validation() {
        use crate::schema::{validate_props, GenerateOptions, GenerateProps};

        for (template, inputs) in [
            (invoice_template(), invoice_inputs()),
            (certificate_template(), Vec::new()),
        ] {
            let props = GenerateProps {
                template,
                inputs,
                options: GenerateOptions::default(),
            };
            validate_props(&props).unwrap();
        }
    }

    #[test]
    fn invoice_inputs_match_schema_keys() {
        let template = invoice_template();
        for record in invoice_inputs() {
            for key in record.keys() {
                assert!(
                    template.schemas[0].contains_key(key),
                    "record key {key:?} missing from schema"
                );
            }
        }
    }
}
