//! Pages, links and header/footer decoration

use crate::{Document, Result};

/// Which part of the page is currently being drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderPhase {
    #[default]
    Body,
    Header,
    Footer,
}

/// Draws repeated content at the top and bottom of every page
///
/// The decorator is called by [`Document::add_page`] and [`Document::close`].
/// While it runs the document reports [`RenderPhase::Header`] or
/// [`RenderPhase::Footer`] and automatic page breaks are suppressed.
///
/// # Example
/// ```ignore
/// struct Footer;
///
/// impl PageDecorator for Footer {
///     fn footer(&mut self, doc: &mut Document) -> Result<()> {
///         doc.set_y(-15.0);
///         doc.set_font("Courier", "I", 8.0)?;
///         let text = format!("Page {}/{{nb}}", doc.page_no());
///         doc.cell(0.0, 10.0, &text, Border::empty(), NextPosition::Right, Align::Center, false)
///     }
/// }
/// ```
pub trait PageDecorator {
    fn header(&mut self, _doc: &mut Document) -> Result<()> {
        Ok(())
    }

    fn footer(&mut self, _doc: &mut Document) -> Result<()> {
        Ok(())
    }
}

/// Handle returned by [`Document::add_link`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(pub(crate) usize);

/// Where a clickable area leads
#[derive(Debug, Clone, PartialEq)]
pub enum LinkTarget {
    /// A position inside this document
    Internal(LinkId),
    /// An external URI
    Uri(String),
}

/// Destination of an internal link (1-based page, y in user units)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct LinkDestination {
    pub page: usize,
    pub y: f64,
}

/// A link annotation rectangle, already in points
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PageLink {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub target: LinkTarget,
}

/// One page of the document
#[derive(Debug, Clone, Default)]
pub(crate) struct Page {
    /// Content stream operators
    pub content: Vec<u8>,
    /// Size in points when it differs from the document default
    pub size_override: Option<(f64, f64)>,
    pub links: Vec<PageLink>,
}

impl Page {
    pub fn new(size_override: Option<(f64, f64)>) -> Self {
        Self {
            content: Vec::new(),
            size_override,
            links: Vec::new(),
        }
    }

    /// Append an operator line
    pub fn push(&mut self, line: &[u8]) {
        self.content.extend_from_slice(line);
        self.content.push(b'\n');
    }
}
