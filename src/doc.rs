//! Working output document over `lopdf` — page embedding, output page
//! builders, draw primitives, metadata, and byte serialization.
//!
//! Template pages are wrapped as Form XObjects so one embedded page can be
//! stamped as the background of many output pages. Output pages accumulate
//! content-stream operations while the generation loop runs; the page tree,
//! resources, and trailer are assembled once in [`WorkingDocument::save`].

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::HashMap;

use crate::error::Error;
use crate::fonts::FontManager;
use crate::geometry::Rgb;

/// Reusable handle to an embedded template page plus its intrinsic size in
/// points. Owned by the working document for its entire lifetime.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedPage {
    pub xobject: ObjectId,
    pub width: f32,
    pub height: f32,
}

/// Placement rectangle used to draw an embedded page as a full-bleed
/// background. Computed once per template page, reused for every record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmbedBox {
    pub x: f32,
    pub y: f32,
    pub x_scale: f32,
    pub y_scale: f32,
}

/// Handle to one output page. Pages are only addressable through the
/// document that owns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRef(usize);

/// Accumulates one output page's operations until serialization.
struct PageBuilder {
    width: f32,
    height: f32,
    operations: Vec<Operation>,
    /// XObjects referenced by this page's content, by resource name.
    xobjects: Vec<(String, ObjectId)>,
}

/// The single mutable output document of one generation call.
pub struct WorkingDocument {
    inner: Document,
    pages: Vec<PageBuilder>,
    fonts: FontManager,
    producer: Option<String>,
    creator: Option<String>,
}

impl WorkingDocument {
    /// Fresh empty document carrying the call's font manager (all later text
    /// measurement goes through it).
    pub fn new(fonts: FontManager) -> Self {
        Self {
            inner: Document::with_version("1.7"),
            pages: Vec::new(),
            fonts,
            producer: None,
            creator: None,
        }
    }

    pub fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Intrinsic height of an output page in points; renderers need it for
    /// the top-origin → bottom-origin flip.
    pub fn page_height(&self, page: PageRef) -> f32 {
        self.pages[page.0].height
    }

    /// Extract every page of `base_pdf` into this document as a Form XObject
    /// and compute its placement box.
    ///
    /// Malformed bytes are fatal; no partial result is left behind that the
    /// caller could serialize (generation aborts on error).
    pub fn embed_base_pages(
        &mut self,
        base_pdf: &[u8],
    ) -> Result<(Vec<EmbeddedPage>, Vec<EmbedBox>), Error> {
        let base = Document::load_mem(base_pdf).map_err(Error::BasePdf)?;

        // Copy phase: pull each page's content and resource tree across.
        // One copier for all pages so shared resources are copied once.
        let mut copier = ObjectCopier::new(&base, &mut self.inner);
        let mut staged = Vec::new();
        for (_, page_id) in base.get_pages() {
            let media_box = match inherited_page_attr(&base, page_id, b"MediaBox")
                .and_then(|obj| rect_from(&base, &obj))
            {
                Some(rect) => rect,
                None => {
                    log::warn!("base page {page_id:?} has no usable MediaBox, assuming Letter");
                    [0.0, 0.0, 612.0, 792.0]
                }
            };
            let content = base.get_page_content(page_id).map_err(Error::BasePdf)?;
            let resources = match inherited_page_attr(&base, page_id, b"Resources") {
                Some(Object::Reference(id)) => {
                    Object::Reference(copier.copy_object(id).map_err(Error::BasePdf)?)
                }
                Some(obj) => copier.remap_references(obj).map_err(Error::BasePdf)?,
                None => Object::Dictionary(Dictionary::new()),
            };
            staged.push((media_box, content, resources));
        }

        let mut embedded_pages = Vec::with_capacity(staged.len());
        let mut embed_boxes = Vec::with_capacity(staged.len());
        for ([llx, lly, urx, ury], content, resources) in staged {
            let form = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "FormType" => 1,
                    "BBox" => vec![llx.into(), lly.into(), urx.into(), ury.into()],
                    "Resources" => resources,
                },
                content,
            );
            let xobject = self.inner.add_object(Object::Stream(form));
            embedded_pages.push(EmbeddedPage {
                xobject,
                width: urx - llx,
                height: ury - lly,
            });
            // Shift the form so MediaBox origins other than (0,0) still land
            // full-bleed on the output page.
            embed_boxes.push(EmbedBox {
                x: -llx,
                y: -lly,
                x_scale: 1.0,
                y_scale: 1.0,
            });
        }

        log::debug!("embedded {} template page(s)", embedded_pages.len());
        Ok((embedded_pages, embed_boxes))
    }

    /// Append a new blank output page of the given size in points.
    pub fn add_page(&mut self, width: f32, height: f32) -> PageRef {
        self.pages.push(PageBuilder {
            width,
            height,
            operations: Vec::new(),
            xobjects: Vec::new(),
        });
        PageRef(self.pages.len() - 1)
    }

    fn register_xobject(&mut self, page: PageRef, id: ObjectId) -> String {
        let builder = &mut self.pages[page.0];
        if let Some((name, _)) = builder.xobjects.iter().find(|(_, oid)| *oid == id) {
            return name.clone();
        }
        let name = format!("X{}", builder.xobjects.len());
        builder.xobjects.push((name.clone(), id));
        name
    }

    /// Stamp an embedded template page onto an output page at its embed box.
    pub fn draw_embedded_page(
        &mut self,
        page: PageRef,
        embedded: &EmbeddedPage,
        embed_box: &EmbedBox,
    ) {
        let name = self.register_xobject(page, embedded.xobject);
        let ops = &mut self.pages[page.0].operations;
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                embed_box.x_scale.into(),
                0.0f32.into(),
                0.0f32.into(),
                embed_box.y_scale.into(),
                embed_box.x.into(),
                embed_box.y.into(),
            ],
        ));
        ops.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
        ops.push(Operation::new("Q", vec![]));
    }

    /// Fill a `width`×`height` rectangle whose bottom-left corner sits at
    /// `(x, y)`, rotated by `rotate` degrees about that corner.
    pub fn draw_rectangle(
        &mut self,
        page: PageRef,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        rotate: f32,
        color: Rgb,
    ) {
        let ops = &mut self.pages[page.0].operations;
        ops.push(Operation::new("q", vec![]));
        ops.push(anchor_transform(x, y, rotate));
        ops.push(Operation::new(
            "rg",
            vec![color[0].into(), color[1].into(), color[2].into()],
        ));
        ops.push(Operation::new(
            "re",
            vec![0.0f32.into(), 0.0f32.into(), width.into(), height.into()],
        ));
        ops.push(Operation::new("f", vec![]));
        ops.push(Operation::new("Q", vec![]));
    }

    /// Draw one line of text with its baseline at `(x, y)`, rotated about
    /// that point. Uses the shared built-in Helvetica resource.
    pub fn draw_text(
        &mut self,
        page: PageRef,
        text: &str,
        x: f32,
        y: f32,
        font_size: f32,
        color: Rgb,
        character_spacing: f32,
        rotate: f32,
    ) {
        let ops = &mut self.pages[page.0].operations;
        ops.push(Operation::new("q", vec![]));
        ops.push(anchor_transform(x, y, rotate));
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(b"F1".to_vec()), font_size.into()],
        ));
        ops.push(Operation::new("Tc", vec![character_spacing.into()]));
        ops.push(Operation::new(
            "rg",
            vec![color[0].into(), color[1].into(), color[2].into()],
        ));
        ops.push(Operation::new("Td", vec![0.0f32.into(), 0.0f32.into()]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(to_winlatin(text), StringFormat::Literal)],
        ));
        ops.push(Operation::new("ET", vec![]));
        ops.push(Operation::new("Q", vec![]));
    }

    /// Register raw 8-bit RGB pixels as a reusable Image XObject.
    pub fn add_image_xobject(&mut self, width: u32, height: u32, rgb_data: Vec<u8>) -> ObjectId {
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            rgb_data,
        );
        self.inner.add_object(Object::Stream(stream))
    }

    /// Draw a registered image at `(x, y)` (bottom-left corner) scaled to
    /// `width`×`height` points, rotated about that corner.
    pub fn draw_image(
        &mut self,
        page: PageRef,
        xobject: ObjectId,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        rotate: f32,
    ) {
        let name = self.register_xobject(page, xobject);
        let ops = &mut self.pages[page.0].operations;
        ops.push(Operation::new("q", vec![]));
        ops.push(anchor_transform(x, y, rotate));
        // Image space is the unit square; scale it up to the box.
        ops.push(Operation::new(
            "cm",
            vec![
                width.into(),
                0.0f32.into(),
                0.0f32.into(),
                height.into(),
                0.0f32.into(),
                0.0f32.into(),
            ],
        ));
        ops.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
        ops.push(Operation::new("Q", vec![]));
    }

    /// Set the document information dictionary's Producer and Creator.
    pub fn set_metadata(&mut self, producer: &str, creator: &str) {
        self.producer = Some(producer.to_string());
        self.creator = Some(creator.to_string());
    }

    /// Assemble the page tree, resources, and trailer, then serialize to a
    /// complete PDF byte sequence.
    pub fn save(mut self) -> Result<Vec<u8>, Error> {
        let pages_id = self.inner.new_object_id();
        let font_id = self.inner.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let builders = std::mem::take(&mut self.pages);
        let mut kids: Vec<Object> = Vec::with_capacity(builders.len());
        for builder in builders {
            let content = Content {
                operations: builder.operations,
            };
            let content_id = self
                .inner
                .add_object(Stream::new(dictionary! {}, content.encode()?));

            let mut resources = dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            };
            if !builder.xobjects.is_empty() {
                let mut xobjects = Dictionary::new();
                for (name, id) in builder.xobjects {
                    xobjects.set(name, Object::Reference(id));
                }
                resources.set("XObject", Object::Dictionary(xobjects));
            }
            let resources_id = self.inner.add_object(resources);

            let page_id = self.inner.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    0.0f32.into(),
                    0.0f32.into(),
                    builder.width.into(),
                    builder.height.into(),
                ],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        self.inner.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.inner.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        self.inner.trailer.set("Root", catalog_id);

        if self.producer.is_some() || self.creator.is_some() {
            let mut info = Dictionary::new();
            if let Some(producer) = self.producer.take() {
                info.set(
                    "Producer",
                    Object::String(producer.into_bytes(), StringFormat::Literal),
                );
            }
            if let Some(creator) = self.creator.take() {
                info.set(
                    "Creator",
                    Object::String(creator.into_bytes(), StringFormat::Literal),
                );
            }
            let info_id = self.inner.add_object(info);
            self.inner.trailer.set("Info", info_id);
        }

        let mut bytes = Vec::new();
        self.inner.save_to(&mut bytes)?;
        log::debug!("serialized output document ({} bytes)", bytes.len());
        Ok(bytes)
    }
}

/// Translate to `(x, y)` and rotate counter-clockwise by `rotate` degrees.
fn anchor_transform(x: f32, y: f32, rotate: f32) -> Operation {
    let (sin, cos) = rotate.to_radians().sin_cos();
    Operation::new(
        "cm",
        vec![
            cos.into(),
            sin.into(),
            (-sin).into(),
            cos.into(),
            x.into(),
            y.into(),
        ],
    )
}

/// Walk the page's Parent chain for an attribute that may be inherited
/// (MediaBox, Resources).
fn inherited_page_attr(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    loop {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(obj) = dict.get(key) {
            return Some(obj.clone());
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(id)) => current = *id,
            _ => return None,
        }
    }
}

fn rect_from(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let resolved = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let array = resolved.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut rect = [0.0f32; 4];
    for (slot, item) in rect.iter_mut().zip(array) {
        *slot = number(doc, item)?;
    }
    Some(rect)
}

fn number(doc: &Document, obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        #[allow(clippy::unnecessary_cast)]
        Object::Real(r) => Some(*r as f32),
        Object::Reference(id) => number(doc, doc.get_object(*id).ok()?),
        _ => None,
    }
}

/// Map a UTF-8 string to Windows-1252 bytes so the WinAnsiEncoding built-in
/// font renders each glyph from one byte.
fn to_winlatin(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80, // euro
            '\u{201A}' => 0x82, // single low-9 quote
            '\u{201E}' => 0x84, // double low-9 quote
            '\u{2026}' => 0x85, // ellipsis
            '\u{2018}' => 0x91, // left single quote
            '\u{2019}' => 0x92, // right single quote
            '\u{201C}' => 0x93, // left double quote
            '\u{201D}' => 0x94, // right double quote
            '\u{2022}' => 0x95, // bullet
            '\u{2013}' => 0x96, // en-dash
            '\u{2014}' => 0x97, // em-dash
            '\u{2122}' => 0x99, // trademark
            '\u{00A0}' => 0x20, // non-breaking space -> space
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect()
}

/// Copies objects (and everything they reference) from the base document
/// into the working document, remapping ids and breaking reference cycles
/// with a placeholder-before-recursion scheme.
struct ObjectCopier<'a> {
    source: &'a Document,
    target: &'a mut Document,
    id_map: HashMap<ObjectId, ObjectId>,
}

impl<'a> ObjectCopier<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            id_map: HashMap::new(),
        }
    }

    fn copy_object(&mut self, source_id: ObjectId) -> Result<ObjectId, lopdf::Error> {
        if let Some(target_id) = self.id_map.get(&source_id) {
            return Ok(*target_id);
        }

        // Reserve the target id before recursing; cycles (Page -> Parent ->
        // Kids -> Page) resolve against this placeholder.
        let new_id = self.target.add_object(Object::Null);
        self.id_map.insert(source_id, new_id);

        let source_obj = self.source.get_object(source_id)?.clone();
        let remapped = self.remap_references(source_obj)?;

        match self.target.objects.get_mut(&new_id) {
            Some(slot) => *slot = remapped,
            None => return Err(lopdf::Error::ObjectNotFound(new_id)),
        }
        Ok(new_id)
    }

    fn remap_references(&mut self, obj: Object) -> Result<Object, lopdf::Error> {
        match obj {
            Object::Reference(id) => Ok(Object::Reference(self.copy_object(id)?)),
            Object::Array(items) => Ok(Object::Array(
                items
                    .into_iter()
                    .map(|item| self.remap_references(item))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Object::Dictionary(mut dict) => {
                for (_, value) in dict.iter_mut() {
                    *value = self.remap_references(value.clone())?;
                }
                Ok(Object::Dictionary(dict))
            }
            Object::Stream(mut stream) => {
                for (_, value) in stream.dict.iter_mut() {
                    *value = self.remap_references(value.clone())?;
                }
                Ok(Object::Stream(stream))
            }
            primitive => Ok(primitive),
        }
    }
}
