//! Folio PDF - page-based PDF authoring
//!
//! This crate provides functionality for:
//! - Writing PDF documents from scratch (object store, xref, trailer)
//! - Laying out text in cells, wrapped paragraphs and flowing text
//! - Core, embedded 8-bit and subsetted TrueType Unicode fonts
//! - JPEG and PNG images
//! - RC4 document protection with permission flags
//!
//! # Example
//!
//! ```ignore
//! use folio_pdf::{Align, Border, Document, DocumentConfig, NextPosition};
//!
//! let mut doc = Document::new(DocumentConfig::default())?;
//! doc.add_page()?;
//! doc.set_font("Courier", "B", 16.0)?;
//! doc.cell(40.0, 10.0, "Hello, World!", Border::ALL, NextPosition::Right, Align::Left, false)?;
//! doc.save("hello.pdf")?;
//! ```

mod config;
mod document;
mod font;
mod image;
mod layout;
mod output;
mod page;
mod security;
mod text;
mod writer;

pub use config::{DocumentConfig, LayoutMode, Orientation, PageSize, Unit, ZoomMode};
pub use document::{Color, Document, DocumentBuilder, DocumentState, RectStyle, DEFAULT_NB_ALIAS};
pub use font::cache::{CacheKey, FileMetricsCache, MemoryMetricsCache, MetricsCache};
pub use font::definition::{DefinitionKind, FontDefinition, FontDescriptor};
pub use font::truetype::{SubsetProgram, TrueTypeBackend, TrueTypeMetrics, TtfParserBackend};
pub use font::widths::{compress_widths, expand_widths, format_widths, WidthEntry};
pub use font::{FontSource, GlyphMetrics};
pub use image::{ColorSpace, ImageInfo};
pub use layout::{Border, NextPosition};
pub use page::{LinkId, LinkTarget, PageDecorator, RenderPhase};
pub use security::{Permissions, Rc4, SecurityHandler};

use thiserror::Error;

/// Errors that can occur during PDF authoring
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Incorrect unit: {0}")]
    InvalidUnit(String),

    #[error("Unknown page size: {0}")]
    InvalidPageSize(String),

    #[error("Incorrect orientation: {0}")]
    InvalidOrientation(String),

    #[error("Incorrect zoom display mode: {0}")]
    InvalidZoom(String),

    #[error("Incorrect layout display mode: {0}")]
    InvalidLayout(String),

    #[error("Undefined font: {0}")]
    FontNotFound(String),

    #[error("Font already added: {0}")]
    FontAlreadyExists(String),

    #[error("No font has been selected")]
    NoFontSelected,

    #[error("Failed to parse font: {0}")]
    FontParseError(String),

    #[error("Font subset error: {0}")]
    FontSubsetError(String),

    #[error("Invalid font definition: {0}")]
    FontDefinitionError(String),

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("Protection must be set before the first page is added")]
    LateEncryption,

    #[error("No page has been added yet")]
    NoPageOpen,

    #[error("Undefined link: {0}")]
    UndefinedLink(usize),

    #[error("Link {0} has no destination page")]
    UnresolvedLink(usize),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Broad classification of a [`PdfError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid caller request: unit, page size, display mode, font request
    Configuration,
    /// Missing or non-conformant external resource: font or image
    Resource,
    /// Underlying I/O failure
    Io,
}

impl PdfError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PdfError::InvalidUnit(_)
            | PdfError::InvalidPageSize(_)
            | PdfError::InvalidOrientation(_)
            | PdfError::InvalidZoom(_)
            | PdfError::InvalidLayout(_)
            | PdfError::FontNotFound(_)
            | PdfError::FontAlreadyExists(_)
            | PdfError::NoFontSelected
            | PdfError::LateEncryption
            | PdfError::NoPageOpen
            | PdfError::UndefinedLink(_)
            | PdfError::UnresolvedLink(_) => ErrorKind::Configuration,
            PdfError::FontParseError(_)
            | PdfError::FontSubsetError(_)
            | PdfError::FontDefinitionError(_)
            | PdfError::ImageError(_)
            | PdfError::UnsupportedImage(_)
            | PdfError::JsonError(_) => ErrorKind::Resource,
            PdfError::IoError(_) => ErrorKind::Io,
        }
    }
}

/// Result type for PDF operations
pub type Result<T> = std::result::Result<T, PdfError>;

/// Text alignment options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
    /// Stretch inter-word spacing to fill the line (multi-line cells only)
    Justify,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            PdfError::InvalidUnit("furlong".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            PdfError::UnsupportedImage("16-bit depth".into()).kind(),
            ErrorKind::Resource
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(PdfError::from(io).kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PdfError::FontNotFound("comicb".into()).to_string(),
            "Undefined font: comicb"
        );
        assert_eq!(
            PdfError::InvalidUnit("furlong".into()).to_string(),
            "Incorrect unit: furlong"
        );
    }
}
