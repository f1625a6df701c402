//! Text layout: single cells, wrapped paragraphs and flowing text

use crate::document::Document;
use crate::font::GlyphMetrics;
use crate::page::{LinkTarget, RenderPhase};
use crate::text::{cell_text_offset, escape, to_utf16be};
use crate::{Align, Result};
use bitflags::bitflags;

bitflags! {
    /// Sides of a cell to outline
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Border: u8 {
        const LEFT = 1;
        const TOP = 2;
        const RIGHT = 4;
        const BOTTOM = 8;
        /// Full frame, drawn as a single rectangle
        const ALL = Self::LEFT.bits() | Self::TOP.bits() | Self::RIGHT.bits() | Self::BOTTOM.bits();
    }
}

/// Where the cursor goes after a cell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NextPosition {
    /// To the right of the cell
    #[default]
    Right,
    /// To the beginning of the next line
    NextLine,
    /// Below the cell, at the same abscissa
    Below,
}

/// Why a wrapped line ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum LineBreak {
    /// A newline in the text
    Explicit,
    /// At a space; `natural_width` is the line width before it
    Space { natural_width: f64, spaces: usize },
    /// Inside a token wider than the line
    Forced,
    /// Remainder of the text
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WrappedLine {
    pub text: String,
    pub brk: LineBreak,
}

/// Extra spacing per interior space so a line fills `max_width`
pub(crate) fn justify_spacing(max_width: f64, natural_width: f64, spaces: usize) -> f64 {
    (max_width - natural_width) / spaces.saturating_sub(1).max(1) as f64
}

/// Greedily break `text` into lines no wider than `max_width`
///
/// Widths are measured with `metrics` at `font_size` (user units).
pub(crate) fn wrap_text(
    metrics: &dyn GlyphMetrics,
    font_size: f64,
    max_width: f64,
    text: &str,
) -> Vec<WrappedLine> {
    let s: Vec<char> = text.chars().filter(|c| *c != '\r').collect();
    let mut nb = s.len();
    if nb > 0 && s[nb - 1] == '\n' {
        nb -= 1;
    }
    let slice = |from: usize, to: usize| s[from..to].iter().collect::<String>();

    let mut lines = Vec::new();
    let mut sep: Option<usize> = None;
    let (mut i, mut j) = (0, 0);
    let mut l = 0.0;
    let mut ls = 0.0;
    let mut ns = 0;

    while i < nb {
        let c = s[i];
        if c == '\n' {
            lines.push(WrappedLine {
                text: slice(j, i),
                brk: LineBreak::Explicit,
            });
            i += 1;
            sep = None;
            j = i;
            l = 0.0;
            ns = 0;
            continue;
        }
        if c == ' ' {
            sep = Some(i);
            ls = l;
            ns += 1;
        }
        l += metrics.glyph_width(c) as f64 * font_size / 1000.0;
        if l > max_width {
            match sep {
                None => {
                    if i == j {
                        i += 1;
                    }
                    lines.push(WrappedLine {
                        text: slice(j, i),
                        brk: LineBreak::Forced,
                    });
                }
                Some(sep) => {
                    lines.push(WrappedLine {
                        text: slice(j, sep),
                        brk: LineBreak::Space {
                            natural_width: ls,
                            spaces: ns,
                        },
                    });
                    i = sep + 1;
                }
            }
            sep = None;
            j = i;
            l = 0.0;
            ns = 0;
        } else {
            i += 1;
        }
    }
    lines.push(WrappedLine {
        text: slice(j, nb),
        brk: LineBreak::End,
    });
    lines
}

impl Document {
    /// Whether a body element overflowing the page should start a new one
    pub(crate) fn accepts_page_break(&self) -> bool {
        self.auto_page_break && self.phase == RenderPhase::Body
    }

    /// Print a cell: an optional frame or background with one line of text
    ///
    /// # Arguments
    /// * `w` - Width; 0 extends the cell to the right margin
    /// * `h` - Height
    /// * `txt` - Text, drawn vertically centred
    /// * `border` - Sides to outline
    /// * `ln` - Cursor position afterwards
    /// * `align` - Horizontal alignment of the text
    /// * `fill` - Paint the background with the fill colour
    #[allow(clippy::too_many_arguments)]
    pub fn cell(
        &mut self,
        w: f64,
        h: f64,
        txt: &str,
        border: Border,
        ln: NextPosition,
        align: Align,
        fill: bool,
    ) -> Result<()> {
        self.cell_with_link(w, h, txt, border, ln, align, fill, None)
    }

    /// [`Document::cell`] whose text is a link
    #[allow(clippy::too_many_arguments)]
    pub fn cell_with_link(
        &mut self,
        w: f64,
        h: f64,
        txt: &str,
        border: Border,
        ln: NextPosition,
        align: Align,
        fill: bool,
        link: Option<LinkTarget>,
    ) -> Result<()> {
        self.require_page()?;
        let k = self.k;

        if self.y + h > self.page_break_trigger && self.accepts_page_break() {
            log::debug!(
                "automatic page break after page {} at y = {:.2}",
                self.page_no(),
                self.y
            );
            let x = self.x;
            let ws = self.ws;
            if ws > 0.0 {
                self.ws = 0.0;
                self.out("0 Tw");
            }
            self.add_page()?;
            self.x = x;
            if ws > 0.0 {
                self.ws = ws;
                self.out(format!("{:.3} Tw", ws * k));
            }
        }

        let w = if w == 0.0 {
            self.w - self.r_margin - self.x
        } else {
            w
        };
        let (x, y, page_h) = (self.x, self.y, self.h);
        let mut s: Vec<u8> = Vec::new();

        if fill || border == Border::ALL {
            let op = match (fill, border == Border::ALL) {
                (true, true) => "B",
                (true, false) => "f",
                _ => "S",
            };
            s.extend_from_slice(
                format!(
                    "{:.2} {:.2} {:.2} {:.2} re {op} ",
                    x * k,
                    (page_h - y) * k,
                    w * k,
                    -h * k
                )
                .as_bytes(),
            );
        }
        if !border.is_empty() && border != Border::ALL {
            let mut edge = |x1: f64, y1: f64, x2: f64, y2: f64| {
                s.extend_from_slice(
                    format!(
                        "{:.2} {:.2} m {:.2} {:.2} l S ",
                        x1 * k,
                        (page_h - y1) * k,
                        x2 * k,
                        (page_h - y2) * k
                    )
                    .as_bytes(),
                );
            };
            if border.contains(Border::LEFT) {
                edge(x, y, x, y + h);
            }
            if border.contains(Border::TOP) {
                edge(x, y, x + w, y);
            }
            if border.contains(Border::RIGHT) {
                edge(x + w, y, x + w, y + h);
            }
            if border.contains(Border::BOTTOM) {
                edge(x, y + h, x + w, y + h);
            }
        }

        if !txt.is_empty() {
            let text_width = self.get_string_width(txt)?;
            let dx = cell_text_offset(align, w, text_width, self.c_margin);
            let baseline = y + 0.5 * h + 0.3 * self.font_size;
            if self.color_flag {
                s.extend_from_slice(format!("q {} ", self.text_color.fill_operator()).as_bytes());
            }

            let unicode = self.current_font_ref()?.is_unicode();
            if unicode && self.ws != 0.0 {
                // Word spacing via TJ adjustments: Tw only applies to byte 32
                self.encode_text(txt)?;
                let space = escape(&to_utf16be(" ", false));
                let adjustment = (-(self.ws * k) * 1000.0 / self.font_size_pt).trunc() as i64;
                s.extend_from_slice(
                    format!(
                        "BT 0 Tw {:.2} {:.2} Td [",
                        (x + dx) * k,
                        (page_h - baseline) * k
                    )
                    .as_bytes(),
                );
                let words: Vec<&str> = txt.split(' ').collect();
                for (n, word) in words.iter().enumerate() {
                    s.push(b'(');
                    s.extend_from_slice(&escape(&to_utf16be(word, false)));
                    s.extend_from_slice(b") ");
                    if n + 1 < words.len() {
                        s.extend_from_slice(format!("{adjustment}(").as_bytes());
                        s.extend_from_slice(&space);
                        s.extend_from_slice(b") ");
                    }
                }
                s.extend_from_slice(b"] TJ ET");
            } else {
                let body = self.encode_text(txt)?;
                s.extend_from_slice(
                    format!("BT {:.2} {:.2} Td (", (x + dx) * k, (page_h - baseline) * k)
                        .as_bytes(),
                );
                s.extend_from_slice(&body);
                s.extend_from_slice(b") Tj ET");
            }

            if self.underline {
                s.push(b' ');
                s.extend_from_slice(self.underline_operator(x + dx, baseline, txt)?.as_bytes());
            }
            if self.color_flag {
                s.extend_from_slice(b" Q");
            }
            if let Some(link) = link {
                let fs = self.font_size;
                self.link(x + dx, y + 0.5 * h - 0.5 * fs, text_width, fs, link)?;
            }
        }

        if !s.is_empty() {
            if s.last() == Some(&b' ') {
                s.pop();
            }
            self.out(s);
        }
        self.lasth = h;
        match ln {
            NextPosition::Right => self.x += w,
            NextPosition::NextLine => {
                self.y += h;
                self.x = self.l_margin;
            }
            NextPosition::Below => self.y += h,
        }
        Ok(())
    }

    /// Print text with automatic and explicit line breaks
    ///
    /// Each line is a cell of width `w` (0 extends to the right margin).
    /// Borders on the top edge apply to the first line only, the bottom edge
    /// to the last line. Afterwards the cursor is at the left margin below
    /// the paragraph.
    pub fn multi_cell(
        &mut self,
        w: f64,
        h: f64,
        txt: &str,
        border: Border,
        align: Align,
        fill: bool,
    ) -> Result<()> {
        self.require_page()?;
        let w = if w == 0.0 {
            self.w - self.r_margin - self.x
        } else {
            w
        };
        let max_width = w - 2.0 * self.c_margin;
        let lines = {
            let font = self.current_font_ref()?;
            wrap_text(font, self.font_size, max_width, txt)
        };

        let sides = Border::LEFT | Border::RIGHT;
        let b2 = border & sides;
        let mut b = if border == Border::ALL || border.contains(Border::TOP) {
            b2 | Border::TOP
        } else {
            b2
        };

        let k = self.k;
        let count = lines.len();
        for (n, line) in lines.into_iter().enumerate() {
            match line.brk {
                LineBreak::Space {
                    natural_width,
                    spaces,
                } if align == Align::Justify => {
                    self.ws = justify_spacing(max_width, natural_width, spaces);
                    self.out(format!("{:.3} Tw", self.ws * k));
                }
                LineBreak::Space { .. } => {}
                LineBreak::Explicit | LineBreak::Forced | LineBreak::End => {
                    if self.ws > 0.0 {
                        self.ws = 0.0;
                        self.out("0 Tw");
                    }
                }
            }
            if n + 1 == count && border.contains(Border::BOTTOM) {
                b |= Border::BOTTOM;
            }
            self.cell(w, h, &line.text, b, NextPosition::Below, align, fill)?;
            b = b2;
        }
        self.x = self.l_margin;
        Ok(())
    }

    /// The lines [`Document::multi_cell`] would print, without printing them
    pub fn split_lines(&self, w: f64, txt: &str) -> Result<Vec<String>> {
        let w = if w == 0.0 {
            self.w - self.r_margin - self.x
        } else {
            w
        };
        let font = self.current_font_ref()?;
        Ok(
            wrap_text(font, self.font_size, w - 2.0 * self.c_margin, txt)
                .into_iter()
                .map(|line| line.text)
                .collect(),
        )
    }

    /// Print flowing text from the current position
    ///
    /// Lines wrap at the right margin and continue at the left margin; the
    /// cursor stays at the end of the text.
    pub fn write(&mut self, h: f64, txt: &str) -> Result<()> {
        self.write_with_link(h, txt, None)
    }

    /// [`Document::write`] whose text is a link
    pub fn write_with_link(&mut self, h: f64, txt: &str, link: Option<LinkTarget>) -> Result<()> {
        let font_size = self.font_size;
        let width_of = |doc: &Document, c: char| -> Result<f64> {
            Ok(doc.current_font_ref()?.glyph_width(c) as f64 * font_size / 1000.0)
        };

        if txt == " " {
            self.x += width_of(self, ' ')?;
            return Ok(());
        }

        let s: Vec<char> = txt.chars().filter(|c| *c != '\r').collect();
        let slice = |from: usize, to: usize| s[from..to].iter().collect::<String>();
        let nb = s.len();
        let mut w = self.w - self.r_margin - self.x;
        let mut wmax = w - 2.0 * self.c_margin;
        let mut sep: Option<usize> = None;
        let (mut i, mut j) = (0, 0);
        let mut l = 0.0;
        let mut nl = 1;

        while i < nb {
            let c = s[i];
            if c == '\n' {
                self.cell_with_link(
                    w,
                    h,
                    &slice(j, i),
                    Border::empty(),
                    NextPosition::Below,
                    Align::Left,
                    false,
                    link.clone(),
                )?;
                i += 1;
                sep = None;
                j = i;
                l = 0.0;
                if nl == 1 {
                    self.x = self.l_margin;
                    w = self.w - self.r_margin - self.x;
                    wmax = w - 2.0 * self.c_margin;
                }
                nl += 1;
                continue;
            }
            if c == ' ' {
                sep = Some(i);
            }
            l += width_of(self, c)?;
            if l > wmax {
                match sep {
                    None if self.x > self.l_margin => {
                        // Start the word over at the beginning of the next line
                        self.x = self.l_margin;
                        self.y += h;
                        w = self.w - self.r_margin - self.x;
                        wmax = w - 2.0 * self.c_margin;
                        i += 1;
                        nl += 1;
                        continue;
                    }
                    None => {
                        if i == j {
                            i += 1;
                        }
                        self.cell_with_link(
                            w,
                            h,
                            &slice(j, i),
                            Border::empty(),
                            NextPosition::Below,
                            Align::Left,
                            false,
                            link.clone(),
                        )?;
                    }
                    Some(sep_at) => {
                        self.cell_with_link(
                            w,
                            h,
                            &slice(j, sep_at),
                            Border::empty(),
                            NextPosition::Below,
                            Align::Left,
                            false,
                            link.clone(),
                        )?;
                        i = sep_at + 1;
                    }
                }
                sep = None;
                j = i;
                l = 0.0;
                if nl == 1 {
                    self.x = self.l_margin;
                    w = self.w - self.r_margin - self.x;
                    wmax = w - 2.0 * self.c_margin;
                }
                nl += 1;
            } else {
                i += 1;
            }
        }

        if i != j {
            self.cell_with_link(
                l,
                h,
                &slice(j, nb),
                Border::empty(),
                NextPosition::Right,
                Align::Left,
                false,
                link,
            )?;
        }
        Ok(())
    }

    /// Line break: back to the left margin, down by `h` or the last cell height
    pub fn ln(&mut self, h: Option<f64>) {
        self.x = self.l_margin;
        self.y += h.unwrap_or(self.lasth);
    }
}
