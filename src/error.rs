//! Crate-wide error type.
//!
//! Every fatal condition unwinds the whole generation call: there are no
//! retries and no partial output. Absent schema entries or input values are
//! not errors (they are skipped by the generation loop).

use thiserror::Error;

use crate::schema::SchemaType;

#[derive(Error, Debug)]
pub enum Error {
    /// `GenerateProps` failed the pre-flight shape check. Reported before any
    /// document is created.
    #[error("invalid generate props: {0}")]
    InvalidProps(String),

    /// The base PDF bytes could not be parsed during preprocessing.
    #[error("failed to read base PDF: {0}")]
    BasePdf(#[source] lopdf::Error),

    /// A schema's type tag has no registered renderer. Aborts the call even
    /// though earlier pages were already drawn in memory.
    #[error("no renderer registered for schema type `{0}`")]
    UnsupportedSchemaType(SchemaType),

    /// A color string is not 3 or 6 hex digits (leading `#` optional).
    #[error("invalid hex color `{0}`")]
    InvalidColor(String),

    /// A caller-supplied font could not be parsed.
    #[error("font error: {0}")]
    Font(String),

    /// An image input could not be decoded or embedded.
    #[error("image error: {0}")]
    Image(String),

    /// Any other failure inside the PDF toolkit.
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Serialization of the finished document failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
