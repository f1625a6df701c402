//! PDF document authoring state

use crate::config::{DocumentConfig, LayoutMode, Orientation, PageSize, ZoomMode};
use crate::font::cache::{FileMetricsCache, MetricsCache};
use crate::font::truetype::{TrueTypeBackend, TtfParserBackend};
use crate::font::{Font, FontRegistry, FontRequest, FontSource, GlyphMetrics};
use crate::image::{image_operator, ImageInfo, RegisteredImage};
use crate::page::{LinkDestination, LinkId, LinkTarget, Page, PageDecorator, PageLink, RenderPhase};
use crate::security::{Permissions, SecurityHandler};
use crate::text::{escape, show_text_operator, to_cp1252, to_utf16be};
use crate::{PdfError, Result};
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use std::path::Path;

/// Token replaced by the page count when [`Document::alias_nb_pages`] is on
pub const DEFAULT_NB_ALIAS: &str = "{nb}";

/// RGB colour (components 0 - 255)
///
/// Colours with three equal components are written as gray levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Create a colour from RGB values (0-255)
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Gray level (0 = black, 255 = white)
    pub fn gray(level: u8) -> Self {
        Self::rgb(level, level, level)
    }

    /// Black color
    pub fn black() -> Self {
        Self::gray(0)
    }

    /// White color
    pub fn white() -> Self {
        Self::gray(255)
    }

    /// Red color
    pub fn red() -> Self {
        Self::rgb(255, 0, 0)
    }

    /// Green color
    pub fn green() -> Self {
        Self::rgb(0, 255, 0)
    }

    /// Blue color
    pub fn blue() -> Self {
        Self::rgb(0, 0, 255)
    }

    fn operator(self, gray_op: &str, rgb_op: &str) -> String {
        let c = |v: u8| v as f64 / 255.0;
        if self.r == self.g && self.g == self.b {
            format!("{:.3} {gray_op}", c(self.r))
        } else {
            format!("{:.3} {:.3} {:.3} {rgb_op}", c(self.r), c(self.g), c(self.b))
        }
    }

    /// Stroking colour operator
    pub fn stroke_operator(self) -> String {
        self.operator("G", "RG")
    }

    /// Non-stroking colour operator
    pub fn fill_operator(self) -> String {
        self.operator("g", "rg")
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::black()
    }
}

/// How [`Document::rect`] paints
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RectStyle {
    #[default]
    Draw,
    Fill,
    FillDraw,
}

impl RectStyle {
    fn operator(self) -> &'static str {
        match self {
            RectStyle::Draw => "S",
            RectStyle::Fill => "f",
            RectStyle::FillDraw => "B",
        }
    }
}

/// Lifecycle of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    /// Created, no page yet
    Unopened,
    /// Opened by the first page request
    Open,
    /// A page accepts content
    PageActive,
    /// The last page was ended
    PageClosed,
    /// Serialized; further calls to close are no-ops
    Finalized,
}

/// Assembles a [`Document`] from a configuration and optional collaborators
///
/// # Example
/// ```ignore
/// let doc = DocumentBuilder::new(DocumentConfig::default())
///     .decorator(Box::new(MyFooter))
///     .metrics_cache(Box::new(MemoryMetricsCache::new()))
///     .build()?;
/// ```
pub struct DocumentBuilder {
    config: DocumentConfig,
    decorator: Option<Box<dyn PageDecorator>>,
    backend: Option<Box<dyn TrueTypeBackend>>,
    cache: Option<Box<dyn MetricsCache>>,
}

impl DocumentBuilder {
    pub fn new(config: DocumentConfig) -> Self {
        Self {
            config,
            decorator: None,
            backend: None,
            cache: None,
        }
    }

    /// Header/footer drawn on every page
    pub fn decorator(mut self, decorator: Box<dyn PageDecorator>) -> Self {
        self.decorator = Some(decorator);
        self
    }

    /// Replace the TrueType parser/subsetter
    pub fn truetype_backend(mut self, backend: Box<dyn TrueTypeBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Replace the metrics cache (defaults to a file cache when configured)
    pub fn metrics_cache(mut self, cache: Box<dyn MetricsCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<Document> {
        let cache = self.cache.or_else(|| {
            self.config
                .metrics_cache_dir
                .clone()
                .map(|dir| Box::new(FileMetricsCache::new(dir)) as Box<dyn MetricsCache>)
        });
        let backend = self
            .backend
            .unwrap_or_else(|| Box::new(TtfParserBackend));
        let fonts = FontRegistry::new(self.config.font_dir.clone(), backend, cache);
        Ok(Document::with_parts(self.config, fonts, self.decorator))
    }
}

/// A PDF document under construction
///
/// Coordinates are in the configured unit with the origin at the top-left
/// corner of the page.
pub struct Document {
    pub(crate) state: DocumentState,
    pub(crate) phase: RenderPhase,
    pub(crate) pages: Vec<Page>,
    /// Scale factor (points per user unit)
    pub(crate) k: f64,
    def_orientation: Orientation,
    cur_orientation: Orientation,
    /// Portrait dimensions of the default and current format, user units
    pub(crate) def_size: (f64, f64),
    cur_size: (f64, f64),
    pub(crate) w_pt: f64,
    pub(crate) h_pt: f64,
    pub(crate) w: f64,
    pub(crate) h: f64,
    pub(crate) l_margin: f64,
    pub(crate) t_margin: f64,
    pub(crate) r_margin: f64,
    pub(crate) b_margin: f64,
    pub(crate) c_margin: f64,
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) lasth: f64,
    line_width: f64,
    pub(crate) fonts: FontRegistry,
    pub(crate) current_font: Option<String>,
    font_family: String,
    font_style: String,
    pub(crate) underline: bool,
    pub(crate) font_size_pt: f64,
    pub(crate) font_size: f64,
    draw_color: Color,
    fill_color: Color,
    pub(crate) text_color: Color,
    pub(crate) color_flag: bool,
    /// Word spacing in user units
    pub(crate) ws: f64,
    pub(crate) images: IndexMap<String, RegisteredImage>,
    pub(crate) links: Vec<Option<LinkDestination>>,
    pub(crate) auto_page_break: bool,
    pub(crate) page_break_trigger: f64,
    pub(crate) zoom: ZoomMode,
    pub(crate) layout: LayoutMode,
    pub(crate) title: Option<String>,
    pub(crate) subject: Option<String>,
    pub(crate) author: Option<String>,
    pub(crate) keywords: Option<String>,
    pub(crate) creator: Option<String>,
    pub(crate) creation_date: Option<NaiveDateTime>,
    pub(crate) alias_nb_pages: Option<String>,
    pub(crate) compress: bool,
    pub(crate) pdf_version: String,
    pub(crate) security: Option<SecurityHandler>,
    decorator: Option<Box<dyn PageDecorator>>,
    pub(crate) buffer: Vec<u8>,
}

impl Document {
    /// Create a document with the default collaborators
    pub fn new(config: DocumentConfig) -> Result<Self> {
        DocumentBuilder::new(config).build()
    }

    pub fn builder(config: DocumentConfig) -> DocumentBuilder {
        DocumentBuilder::new(config)
    }

    fn with_parts(
        config: DocumentConfig,
        fonts: FontRegistry,
        decorator: Option<Box<dyn PageDecorator>>,
    ) -> Self {
        let k = config.unit.scale_factor();
        let size = config.page_size.dimensions(k);
        let (w, h) = match config.orientation {
            Orientation::Portrait => size,
            Orientation::Landscape => (size.1, size.0),
        };
        // 1 cm margins
        let margin = 28.35 / k;

        Self {
            state: DocumentState::Unopened,
            phase: RenderPhase::Body,
            pages: Vec::new(),
            k,
            def_orientation: config.orientation,
            cur_orientation: config.orientation,
            def_size: size,
            cur_size: size,
            w_pt: w * k,
            h_pt: h * k,
            w,
            h,
            l_margin: margin,
            t_margin: margin,
            r_margin: margin,
            b_margin: 2.0 * margin,
            c_margin: margin / 10.0,
            x: margin,
            y: margin,
            lasth: 0.0,
            line_width: 0.567 / k,
            fonts,
            current_font: None,
            font_family: String::new(),
            font_style: String::new(),
            underline: false,
            font_size_pt: 12.0,
            font_size: 12.0 / k,
            draw_color: Color::black(),
            fill_color: Color::black(),
            text_color: Color::black(),
            color_flag: false,
            ws: 0.0,
            images: IndexMap::new(),
            links: Vec::new(),
            auto_page_break: true,
            page_break_trigger: h - 2.0 * margin,
            zoom: ZoomMode::Default,
            layout: LayoutMode::Default,
            title: None,
            subject: None,
            author: None,
            keywords: None,
            creator: None,
            creation_date: None,
            alias_nb_pages: None,
            compress: config.compress,
            pdf_version: config.pdf_version,
            security: None,
            decorator,
            buffer: Vec::new(),
        }
    }

    // ---- State ----

    pub fn state(&self) -> DocumentState {
        self.state
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    /// Current page number (0 before the first page)
    pub fn page_no(&self) -> usize {
        self.pages.len()
    }

    /// Scale factor: points per user unit
    pub fn scale_factor(&self) -> f64 {
        self.k
    }

    /// Current page width in user units
    pub fn page_width(&self) -> f64 {
        self.w
    }

    /// Current page height in user units
    pub fn page_height(&self) -> f64 {
        self.h
    }

    /// Left, top, right and bottom margins
    pub fn margins(&self) -> (f64, f64, f64, f64) {
        (self.l_margin, self.t_margin, self.r_margin, self.b_margin)
    }

    /// Padding between a cell border and its text
    pub fn cell_margin(&self) -> f64 {
        self.c_margin
    }

    pub fn set_cell_margin(&mut self, margin: f64) {
        self.c_margin = margin;
    }

    /// Default page width and height in points
    pub(crate) fn default_page_points(&self) -> (f64, f64) {
        let (w, h) = self.def_size;
        match self.def_orientation {
            Orientation::Portrait => (w * self.k, h * self.k),
            Orientation::Landscape => (h * self.k, w * self.k),
        }
    }

    /// Append an operator line to the open page
    ///
    /// Only page content flows through here; document-level objects are
    /// produced by the object writer at close. Public drawing calls check
    /// for an open page first and state setters only emit while one is
    /// open, so reaching the fallback arm is a bug.
    pub(crate) fn out(&mut self, line: impl AsRef<[u8]>) {
        match (self.state, self.pages.last_mut()) {
            (DocumentState::PageActive, Some(page)) => page.push(line.as_ref()),
            _ => {
                debug_assert!(false, "page content written while no page is open");
                log::warn!("content outside a page ignored");
            }
        }
    }

    pub(crate) fn require_page(&self) -> Result<()> {
        if self.state == DocumentState::PageActive {
            Ok(())
        } else {
            Err(PdfError::NoPageOpen)
        }
    }

    // ---- Margins and breaks ----

    /// Set left, top and right margins; the right margin defaults to the left one
    pub fn set_margins(&mut self, left: f64, top: f64, right: Option<f64>) {
        self.l_margin = left;
        self.t_margin = top;
        self.r_margin = right.unwrap_or(left);
    }

    pub fn set_left_margin(&mut self, margin: f64) {
        self.l_margin = margin;
        if self.page_no() > 0 && self.x < margin {
            self.x = margin;
        }
    }

    pub fn set_top_margin(&mut self, margin: f64) {
        self.t_margin = margin;
    }

    pub fn set_right_margin(&mut self, margin: f64) {
        self.r_margin = margin;
    }

    /// Enable or disable automatic page breaks and set the bottom margin
    pub fn set_auto_page_break(&mut self, auto: bool, margin: f64) {
        self.auto_page_break = auto;
        self.b_margin = margin;
        self.page_break_trigger = self.h - margin;
    }

    /// Y position beyond which a cell triggers a page break
    pub fn page_break_trigger(&self) -> f64 {
        self.page_break_trigger
    }

    // ---- Display and metadata ----

    pub fn set_display_mode(&mut self, zoom: ZoomMode, layout: LayoutMode) {
        self.zoom = zoom;
        self.layout = layout;
    }

    /// Compress page content streams
    pub fn set_compression(&mut self, compress: bool) {
        self.compress = compress;
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = Some(title.to_string());
    }

    pub fn set_subject(&mut self, subject: &str) {
        self.subject = Some(subject.to_string());
    }

    pub fn set_author(&mut self, author: &str) {
        self.author = Some(author.to_string());
    }

    pub fn set_keywords(&mut self, keywords: &str) {
        self.keywords = Some(keywords.to_string());
    }

    pub fn set_creator(&mut self, creator: &str) {
        self.creator = Some(creator.to_string());
    }

    /// Fix the creation date instead of using the local time at close
    pub fn set_creation_date(&mut self, date: NaiveDateTime) {
        self.creation_date = Some(date);
    }

    /// Replace [`DEFAULT_NB_ALIAS`] by the total number of pages when the document is closed
    pub fn alias_nb_pages(&mut self) {
        self.alias_nb_pages_with(DEFAULT_NB_ALIAS);
    }

    /// Like [`Document::alias_nb_pages`] with a custom token
    pub fn alias_nb_pages_with(&mut self, alias: &str) {
        self.alias_nb_pages = Some(alias.to_string());
    }

    /// Protect the document with RC4 encryption
    ///
    /// Must be called before the first page. A missing owner password is
    /// replaced by a random one.
    ///
    /// # Arguments
    /// * `permissions` - Operations granted to the user
    /// * `user_password` - Password required to open the document (may be empty)
    /// * `owner_password` - Password granting full access
    pub fn set_protection(
        &mut self,
        permissions: Permissions,
        user_password: &str,
        owner_password: Option<&str>,
    ) -> Result<()> {
        if self.state != DocumentState::Unopened {
            return Err(PdfError::LateEncryption);
        }
        let owner = match owner_password {
            Some(owner) => owner.to_string(),
            None => uuid::Uuid::new_v4().simple().to_string(),
        };
        self.security = Some(SecurityHandler::new(permissions, user_password, &owner));
        log::debug!("protection enabled, P = {}", permissions.p_value());
        Ok(())
    }

    // ---- Pages ----

    /// Start a new page with the current orientation and format
    pub fn add_page(&mut self) -> Result<()> {
        self.add_page_with(None, None)
    }

    /// Start a new page, optionally changing orientation and format
    ///
    /// The footer of the previous page and the header of the new one are
    /// drawn by the decorator. Line width, colours and font carry over.
    pub fn add_page_with(
        &mut self,
        orientation: Option<Orientation>,
        size: Option<PageSize>,
    ) -> Result<()> {
        match self.state {
            DocumentState::Finalized => return Err(PdfError::NoPageOpen),
            DocumentState::Unopened => self.state = DocumentState::Open,
            _ => {}
        }

        let family = self.font_family.clone();
        let style = format!(
            "{}{}",
            self.font_style,
            if self.underline { "U" } else { "" }
        );
        let font_size = self.font_size_pt;
        let line_width = self.line_width;
        let draw_color = self.draw_color;
        let fill_color = self.fill_color;
        let text_color = self.text_color;
        let color_flag = self.color_flag;

        if self.state == DocumentState::PageActive {
            self.run_decorator(RenderPhase::Footer)?;
            self.end_page();
        }

        let orientation = orientation.unwrap_or(self.cur_orientation);
        let size = size.map(|s| s.dimensions(self.k)).unwrap_or(self.cur_size);
        self.begin_page(orientation, size);

        // Restore the graphics state on the new page
        self.out("2 J");
        self.line_width = line_width;
        self.out(format!("{:.2} w", line_width * self.k));
        if !family.is_empty() {
            self.set_font(&family, &style, font_size)?;
        }
        self.draw_color = draw_color;
        if draw_color != Color::black() {
            self.out(draw_color.stroke_operator());
        }
        self.fill_color = fill_color;
        if fill_color != Color::black() {
            self.out(fill_color.fill_operator());
        }
        self.text_color = text_color;
        self.color_flag = color_flag;

        self.run_decorator(RenderPhase::Header)?;

        // Undo what the header changed
        if self.line_width != line_width {
            self.line_width = line_width;
            self.out(format!("{:.2} w", line_width * self.k));
        }
        if !family.is_empty() {
            self.set_font(&family, &style, font_size)?;
        }
        if self.draw_color != draw_color {
            self.draw_color = draw_color;
            self.out(draw_color.stroke_operator());
        }
        if self.fill_color != fill_color {
            self.fill_color = fill_color;
            self.out(fill_color.fill_operator());
        }
        self.text_color = text_color;
        self.color_flag = color_flag;
        Ok(())
    }

    /// Call the decorator for `phase`; it is detached while running
    pub(crate) fn run_decorator(&mut self, phase: RenderPhase) -> Result<()> {
        let Some(mut decorator) = self.decorator.take() else {
            return Ok(());
        };
        self.phase = phase;
        let result = match phase {
            RenderPhase::Header => decorator.header(self),
            RenderPhase::Footer => decorator.footer(self),
            RenderPhase::Body => Ok(()),
        };
        self.phase = RenderPhase::Body;
        self.decorator = Some(decorator);
        result
    }

    fn begin_page(&mut self, orientation: Orientation, size: (f64, f64)) {
        if orientation != self.cur_orientation || size != self.cur_size {
            let (w, h) = match orientation {
                Orientation::Portrait => size,
                Orientation::Landscape => (size.1, size.0),
            };
            self.w = w;
            self.h = h;
            self.w_pt = w * self.k;
            self.h_pt = h * self.k;
            self.page_break_trigger = h - self.b_margin;
            self.cur_orientation = orientation;
            self.cur_size = size;
        }
        let size_override = if orientation != self.def_orientation || size != self.def_size {
            Some((self.w_pt, self.h_pt))
        } else {
            None
        };

        self.pages.push(Page::new(size_override));
        self.state = DocumentState::PageActive;
        self.x = self.l_margin;
        self.y = self.t_margin;
        self.font_family.clear();
        log::trace!("page {} started", self.pages.len());
    }

    pub(crate) fn end_page(&mut self) {
        self.state = DocumentState::PageClosed;
    }

    // ---- Graphics state ----

    pub fn set_draw_color(&mut self, color: Color) {
        self.draw_color = color;
        if self.state == DocumentState::PageActive {
            self.out(color.stroke_operator());
        }
    }

    pub fn set_fill_color(&mut self, color: Color) {
        self.fill_color = color;
        self.color_flag = self.fill_color != self.text_color;
        if self.state == DocumentState::PageActive {
            self.out(color.fill_operator());
        }
    }

    pub fn set_text_color(&mut self, color: Color) {
        self.text_color = color;
        self.color_flag = self.fill_color != self.text_color;
    }

    pub fn set_line_width(&mut self, width: f64) {
        self.line_width = width;
        if self.state == DocumentState::PageActive {
            self.out(format!("{:.2} w", width * self.k));
        }
    }

    /// Draw a line between two points
    pub fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64) -> Result<()> {
        self.require_page()?;
        let (k, h) = (self.k, self.h);
        self.out(format!(
            "{:.2} {:.2} m {:.2} {:.2} l S",
            x1 * k,
            (h - y1) * k,
            x2 * k,
            (h - y2) * k
        ));
        Ok(())
    }

    /// Draw a rectangle with its top-left corner at (x, y)
    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, style: RectStyle) -> Result<()> {
        self.require_page()?;
        let k = self.k;
        self.out(format!(
            "{:.2} {:.2} {:.2} {:.2} re {}",
            x * k,
            (self.h - y) * k,
            w * k,
            -h * k,
            style.operator()
        ));
        Ok(())
    }

    // ---- Fonts ----

    /// Register a font under a family and style
    ///
    /// # Arguments
    /// * `family` - Family name used with [`Document::set_font`]
    /// * `style` - `""`, `"B"`, `"I"` or `"BI"`
    /// * `source` - Definition file or TrueType program
    pub fn add_font(&mut self, family: &str, style: &str, source: FontSource) -> Result<()> {
        let key = FontRequest::new(family, style).key();
        if self.fonts.contains(&key) {
            return Err(PdfError::FontAlreadyExists(key));
        }
        match source {
            FontSource::Definition(path) => self.fonts.add_definition(&key, &path),
            FontSource::TrueType(path) => self.fonts.add_truetype(&key, &path),
        }
    }

    /// Select the font used by subsequent text
    ///
    /// An empty family keeps the current one; a size of 0 keeps the current
    /// size. Core families are loaded on first use. `U` in the style turns
    /// underlining on.
    pub fn set_font(&mut self, family: &str, style: &str, size: f64) -> Result<()> {
        let family = if family.is_empty() {
            self.font_family.clone()
        } else {
            family.to_string()
        };
        let request = FontRequest::new(&family, style);
        self.underline = request.underline;
        let size = if size == 0.0 { self.font_size_pt } else { size };

        if self.font_family == request.family
            && self.font_style == request.style
            && self.font_size_pt == size
        {
            return Ok(());
        }

        let key = request.key();
        if !self.fonts.contains(&key) {
            if request.is_core() {
                self.fonts.add_core(&key)?;
            } else {
                return Err(PdfError::FontNotFound(key));
            }
        }

        self.font_family = request.family;
        self.font_style = request.style;
        self.font_size_pt = size;
        self.font_size = size / self.k;
        if self.state == DocumentState::PageActive {
            let index = self.fonts.get(&key).map(Font::index).unwrap_or(0);
            self.out(format!("BT /F{index} {size:.2} Tf ET"));
        }
        self.current_font = Some(key);
        Ok(())
    }

    /// Change the size of the current font (in points)
    pub fn set_font_size(&mut self, size: f64) {
        if self.font_size_pt == size {
            return;
        }
        self.font_size_pt = size;
        self.font_size = size / self.k;
        if self.state == DocumentState::PageActive {
            if let Some(index) = self.current_font_ref().ok().map(Font::index) {
                self.out(format!("BT /F{index} {size:.2} Tf ET"));
            }
        }
    }

    pub(crate) fn current_font_ref(&self) -> Result<&Font> {
        self.current_font
            .as_deref()
            .and_then(|key| self.fonts.get(key))
            .ok_or(PdfError::NoFontSelected)
    }

    /// Width of `text` in the current font, in user units
    pub fn get_string_width(&self, text: &str) -> Result<f64> {
        Ok(self.current_font_ref()?.string_width(text, self.font_size))
    }

    /// Encode `text` for the current font as an escaped string body,
    /// recording its characters as used
    pub(crate) fn encode_text(&mut self, text: &str) -> Result<Vec<u8>> {
        let key = self.current_font.clone().ok_or(PdfError::NoFontSelected)?;
        let font = self.fonts.get_mut(&key).ok_or(PdfError::NoFontSelected)?;
        if font.is_unicode() {
            font.mark_used(text);
            Ok(escape(&to_utf16be(text, false)))
        } else {
            Ok(escape(&to_cp1252(text)))
        }
    }

    /// Underline operator for text starting at (x, y baseline)
    pub(crate) fn underline_operator(&self, x: f64, y: f64, text: &str) -> Result<String> {
        let font = self.current_font_ref()?;
        let (up, ut) = font.underline();
        let spaces = text.matches(' ').count() as f64;
        let w = font.string_width(text, self.font_size) + self.ws * spaces;
        Ok(format!(
            "{:.2} {:.2} {:.2} {:.2} re f",
            x * self.k,
            (self.h - (y - up as f64 / 1000.0 * self.font_size)) * self.k,
            w * self.k,
            -(ut as f64) / 1000.0 * self.font_size_pt
        ))
    }

    /// Print a string with its baseline starting at (x, y)
    pub fn text(&mut self, x: f64, y: f64, txt: &str) -> Result<()> {
        self.require_page()?;
        let body = self.encode_text(txt)?;
        let mut ops = show_text_operator(x * self.k, (self.h - y) * self.k, &body);
        if self.underline && !txt.is_empty() {
            ops.push(b' ');
            ops.extend_from_slice(self.underline_operator(x, y, txt)?.as_bytes());
        }
        if self.color_flag {
            let mut wrapped = format!("q {} ", self.text_color.fill_operator()).into_bytes();
            wrapped.extend_from_slice(&ops);
            wrapped.extend_from_slice(b" Q");
            ops = wrapped;
        }
        self.out(ops);
        Ok(())
    }

    // ---- Links ----

    /// Create an internal link; its destination is set with [`Document::set_link`]
    pub fn add_link(&mut self) -> LinkId {
        self.links.push(None);
        LinkId(self.links.len() - 1)
    }

    /// Set the destination of an internal link
    ///
    /// `y` defaults to the current position and `page` to the current page.
    pub fn set_link(&mut self, link: LinkId, y: Option<f64>, page: Option<usize>) -> Result<()> {
        let y = y.unwrap_or(self.y);
        let page = page.unwrap_or(self.page_no());
        let destination = self
            .links
            .get_mut(link.0)
            .ok_or(PdfError::UndefinedLink(link.0))?;
        *destination = Some(LinkDestination { page, y });
        Ok(())
    }

    /// Destination of an internal link, which must point at an existing page
    pub(crate) fn link_destination(&self, link: LinkId) -> Result<LinkDestination> {
        match self.links.get(link.0) {
            Some(Some(dest)) if (1..=self.page_no()).contains(&dest.page) => Ok(*dest),
            Some(_) => Err(PdfError::UnresolvedLink(link.0)),
            None => Err(PdfError::UndefinedLink(link.0)),
        }
    }

    /// Put a clickable area on the current page
    pub fn link(&mut self, x: f64, y: f64, w: f64, h: f64, target: LinkTarget) -> Result<()> {
        self.require_page()?;
        if let LinkTarget::Internal(id) = &target {
            if id.0 >= self.links.len() {
                return Err(PdfError::UndefinedLink(id.0));
            }
        }
        let k = self.k;
        let h_pt = self.h_pt;
        if let Some(page) = self.pages.last_mut() {
            page.links.push(PageLink {
                x: x * k,
                y: h_pt - y * k,
                w: w * k,
                h: h * k,
                target,
            });
        }
        Ok(())
    }

    // ---- Images ----

    /// Register a decoded image under `name` for use with [`Document::image`]
    pub fn register_image(&mut self, name: &str, info: ImageInfo) {
        if !self.images.contains_key(name) {
            let index = self.images.len() + 1;
            log::debug!(
                "registered image {name} as /I{index} ({}x{})",
                info.width,
                info.height
            );
            self.images.insert(
                name.to_string(),
                RegisteredImage {
                    index,
                    obj: 0,
                    info,
                },
            );
        }
    }

    /// Place an image
    ///
    /// A file is read the first time it is used; later calls reuse it.
    /// With both `w` and `h` zero the image is sized at 72 dpi; with one of
    /// them zero the other follows the aspect ratio. Without `y` the image
    /// flows: it is placed at the cursor, may trigger a page break, and the
    /// cursor moves below it.
    pub fn image(
        &mut self,
        path: &str,
        x: Option<f64>,
        y: Option<f64>,
        w: f64,
        h: f64,
        link: Option<LinkTarget>,
    ) -> Result<()> {
        self.require_page()?;
        if !self.images.contains_key(path) {
            let info = ImageInfo::load(Path::new(path))?;
            self.register_image(path, info);
        }
        let (index, px_w, px_h) = match self.images.get(path) {
            Some(image) => (
                image.index,
                image.info.width as f64,
                image.info.height as f64,
            ),
            None => return Err(PdfError::ImageError(format!("Unknown image {path}"))),
        };

        let (mut w, mut h) = (w, h);
        if w == 0.0 && h == 0.0 {
            w = px_w / self.k;
            h = px_h / self.k;
        }
        if w == 0.0 {
            w = h * px_w / px_h;
        }
        if h == 0.0 {
            h = w * px_h / px_w;
        }

        let y = match y {
            Some(y) => y,
            None => {
                if self.y + h > self.page_break_trigger && self.accepts_page_break() {
                    log::debug!("automatic page break before image {path}");
                    let x = self.x;
                    self.add_page()?;
                    self.x = x;
                }
                let y = self.y;
                self.y += h;
                y
            }
        };
        let x = x.unwrap_or(self.x);

        let k = self.k;
        self.out(image_operator(
            index,
            x * k,
            (self.h - (y + h)) * k,
            w * k,
            h * k,
        ));
        if let Some(link) = link {
            self.link(x, y, w, h, link)?;
        }
        Ok(())
    }

    // ---- Cursor ----

    pub fn get_x(&self) -> f64 {
        self.x
    }

    /// Set the abscissa; negative values count from the right edge
    pub fn set_x(&mut self, x: f64) {
        self.x = if x >= 0.0 { x } else { self.w + x };
    }

    pub fn get_y(&self) -> f64 {
        self.y
    }

    /// Set the ordinate and move back to the left margin; negative values count from the bottom
    pub fn set_y(&mut self, y: f64) {
        self.x = self.l_margin;
        self.y = if y >= 0.0 { y } else { self.h + y };
    }

    pub fn set_xy(&mut self, x: f64, y: f64) {
        self.set_y(y);
        self.set_x(x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Unit;
    use crate::layout::Border;
    use crate::Align;
    use pretty_assertions::assert_eq;

    fn pt_config() -> DocumentConfig {
        DocumentConfig {
            unit: Unit::Pt,
            compress: false,
            ..DocumentConfig::default()
        }
    }

    fn page_text(doc: &Document) -> String {
        String::from_utf8_lossy(&doc.pages.last().unwrap().content).into_owned()
    }

    #[test]
    fn test_color_operators() {
        assert_eq!(Color::black().stroke_operator(), "0.000 G");
        assert_eq!(Color::gray(255).fill_operator(), "1.000 g");
        assert_eq!(Color::red().fill_operator(), "1.000 0.000 0.000 rg");
        assert_eq!(Color::rgb(0, 0, 255).stroke_operator(), "0.000 0.000 1.000 RG");
    }

    #[test]
    fn test_document_creation() {
        let doc = Document::new(DocumentConfig::default()).unwrap();
        assert_eq!(doc.state(), DocumentState::Unopened);
        assert_eq!(doc.page_no(), 0);
        assert!((doc.page_width() - 210.0).abs() < 0.01);
        let (l, t, r, b) = doc.margins();
        assert!((l - 10.0).abs() < 0.01);
        assert_eq!(l, t);
        assert_eq!(l, r);
        assert!((b - 20.0).abs() < 0.01);
        assert!((doc.cell_margin() - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_landscape_swaps_dimensions() {
        let doc = Document::new(DocumentConfig {
            unit: Unit::Pt,
            orientation: Orientation::Landscape,
            ..DocumentConfig::default()
        })
        .unwrap();
        assert_eq!(doc.page_width(), 841.89);
        assert_eq!(doc.page_height(), 595.28);
    }

    #[test]
    fn test_add_page_replays_state() {
        let mut doc = Document::new(pt_config()).unwrap();
        doc.add_page().unwrap();
        assert_eq!(doc.state(), DocumentState::PageActive);
        assert_eq!(page_text(&doc), "2 J\n0.57 w\n");

        doc.set_font("Courier", "", 10.0).unwrap();
        doc.set_draw_color(Color::red());
        doc.add_page().unwrap();
        assert_eq!(
            page_text(&doc),
            "2 J\n0.57 w\nBT /F1 10.00 Tf ET\n1.000 0.000 0.000 RG\n"
        );
        assert_eq!((doc.get_x(), doc.get_y()), (28.35, 28.35));
    }

    #[test]
    fn test_set_font_errors_and_aliases() {
        let mut doc = Document::new(pt_config()).unwrap();
        assert!(matches!(
            doc.set_font("NoSuchFamily", "", 12.0),
            Err(PdfError::FontNotFound(k)) if k == "nosuchfamily"
        ));
        doc.set_font("courier", "IBU", 12.0).unwrap();
        assert!(doc.underline);
        assert_eq!(doc.current_font.as_deref(), Some("courierBI"));
    }

    #[test]
    fn test_string_width() {
        let mut doc = Document::new(pt_config()).unwrap();
        assert!(matches!(
            doc.get_string_width("abc"),
            Err(PdfError::NoFontSelected)
        ));
        doc.set_font("Courier", "", 10.0).unwrap();
        assert_eq!(doc.get_string_width("abc").unwrap(), 18.0);
    }

    #[test]
    fn test_drawing_requires_page() {
        let mut doc = Document::new(pt_config()).unwrap();
        assert!(matches!(
            doc.line(0.0, 0.0, 10.0, 10.0),
            Err(PdfError::NoPageOpen)
        ));
    }

    #[test]
    fn test_state_setters_only_write_to_open_page() {
        let mut doc = Document::new(pt_config()).unwrap();
        doc.set_fill_color(Color::red());
        doc.set_line_width(2.0);
        doc.add_page().unwrap();
        let fill = Color::red().fill_operator();
        assert_eq!(page_text(&doc).matches(fill.as_str()).count(), 1);
        assert!(page_text(&doc).contains("2.00 w\n"));

        let pdf = doc.output().unwrap();
        doc.set_draw_color(Color::blue());
        doc.set_font_size(20.0);
        assert!(!page_text(&doc).contains(&Color::blue().stroke_operator()));
        assert_eq!(doc.output().unwrap(), pdf);
    }

    #[test]
    fn test_multi_cell_requires_page() {
        let mut doc = Document::new(pt_config()).unwrap();
        doc.set_font("Courier", "", 10.0).unwrap();
        assert!(matches!(
            doc.multi_cell(0.0, 5.0, "text", Border::empty(), Align::Justify, false),
            Err(PdfError::NoPageOpen)
        ));
    }

    #[test]
    fn test_page_count_alias() {
        let mut doc = Document::new(pt_config()).unwrap();
        doc.alias_nb_pages();
        assert_eq!(doc.alias_nb_pages.as_deref(), Some(DEFAULT_NB_ALIAS));

        doc.alias_nb_pages_with("[pages]");
        doc.add_page().unwrap();
        doc.set_font("Courier", "", 10.0).unwrap();
        doc.text(10.0, 10.0, "of [pages]").unwrap();
        doc.add_page().unwrap();
        let text = String::from_utf8_lossy(&doc.output().unwrap()).into_owned();
        assert!(text.contains("(of 2) Tj"));
        assert!(!text.contains("[pages]"));
    }

    #[test]
    fn test_line_and_rect_operators() {
        let mut doc = Document::new(pt_config()).unwrap();
        doc.add_page().unwrap();
        doc.line(10.0, 20.0, 30.0, 40.0).unwrap();
        doc.rect(10.0, 20.0, 100.0, 50.0, RectStyle::FillDraw).unwrap();
        let text = page_text(&doc);
        assert!(text.contains("10.00 821.89 m 30.00 801.89 l S\n"));
        assert!(text.contains("10.00 821.89 100.00 -50.00 re B\n"));
    }

    #[test]
    fn test_protection_must_come_first() {
        let mut doc = Document::new(pt_config()).unwrap();
        doc.set_protection(Permissions::PRINT, "", Some("owner"))
            .unwrap();
        doc.add_page().unwrap();
        assert!(matches!(
            doc.set_protection(Permissions::PRINT, "", None),
            Err(PdfError::LateEncryption)
        ));
    }

    #[test]
    fn test_cursor_negative_positions() {
        let mut doc = Document::new(pt_config()).unwrap();
        doc.set_x(-100.0);
        assert!((doc.get_x() - 495.28).abs() < 1e-9);
        doc.set_y(-50.0);
        assert!((doc.get_y() - 791.89).abs() < 1e-9);
        assert_eq!(doc.get_x(), 28.35);
    }

    #[test]
    fn test_links() {
        let mut doc = Document::new(pt_config()).unwrap();
        doc.add_page().unwrap();
        let link = doc.add_link();
        doc.set_link(link, Some(100.0), None).unwrap();
        assert_eq!(doc.links[0], Some(LinkDestination { page: 1, y: 100.0 }));
        doc.link(10.0, 10.0, 50.0, 20.0, LinkTarget::Internal(link))
            .unwrap();
        assert!(matches!(
            doc.link(0.0, 0.0, 1.0, 1.0, LinkTarget::Internal(LinkId(9))),
            Err(PdfError::UndefinedLink(9))
        ));
        assert_eq!(doc.pages[0].links.len(), 1);
        assert!((doc.pages[0].links[0].y - 831.89).abs() < 1e-9);
    }

    #[test]
    fn test_text_with_color() {
        let mut doc = Document::new(pt_config()).unwrap();
        doc.add_page().unwrap();
        doc.set_font("Courier", "", 12.0).unwrap();
        doc.set_text_color(Color::blue());
        doc.text(10.0, 100.0, "Hi (x)").unwrap();
        assert!(page_text(&doc)
            .contains("q 0.000 0.000 1.000 rg BT 10.00 741.89 Td (Hi \\(x\\)) Tj ET Q\n"));
    }
}
