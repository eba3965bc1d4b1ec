//! # pdf-stencil – template-driven batch PDF generation
//!
//! This crate turns a declarative page template plus a batch of input
//! records into a single PDF: one group of pages per record, each group a
//! copy of the template's pages with field values drawn at specified
//! positions. The pipeline stages are:
//!
//! 1. **Validate** – pre-flight shape check of the props ([`schema`])
//! 2. **Preprocess** – embed every base-PDF page as a reusable background
//!    object with its placement box ([`doc`])
//! 3. **Compose** – per record × page × field, dispatch to the renderer
//!    registry, sharing one cache across the call ([`pipeline`], [`renderer`])
//! 4. **Postprocess** – stamp producer/creator metadata ([`pipeline`])
//! 5. **Serialize** – emit the finished PDF bytes ([`doc`])
//!
//! Coordinates in templates are millimetres from the page's top-left corner;
//! the [`geometry`] module maps them into PDF points (bottom-left origin).

pub mod doc;
pub mod error;
pub mod fonts;
pub mod geometry;
pub mod pipeline;
pub mod renderer;
pub mod schema;
pub mod templates;

// Re-exports for convenience
pub use error::Error;
pub use pipeline::{generate, generate_with_registry, TOOL_NAME};
pub use schema::{
    Alignment, GenerateOptions, GenerateProps, InputRecord, PageSchema, Schema, SchemaType,
    Template,
};
