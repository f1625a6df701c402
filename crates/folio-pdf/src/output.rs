//! Document finalization and serialization

use crate::config::{LayoutMode, ZoomMode};
use crate::document::{Document, DocumentState};
use crate::page::{LinkTarget, RenderPhase};
use crate::text::{compress, escape, replace_bytes, text_string_bytes, to_utf16be};
use crate::writer::{ObjectWriter, PAGES_ROOT, RESOURCES};
use crate::Result;
use std::path::Path;

impl Document {
    /// Finish the document: draw the last footer and serialize everything
    ///
    /// A document without pages gets one empty page. Calling `close` again
    /// has no effect. When serialization fails the document is left intact,
    /// so `close` can be retried once the cause is fixed.
    pub fn close(&mut self) -> Result<()> {
        if self.state == DocumentState::Finalized {
            return Ok(());
        }
        if self.page_no() == 0 {
            self.add_page()?;
        }
        if self.state == DocumentState::PageActive {
            self.run_decorator(RenderPhase::Footer)?;
            self.end_page();
        }
        self.end_doc()
    }

    /// Close the document and return its bytes
    pub fn output(&mut self) -> Result<Vec<u8>> {
        self.close()?;
        Ok(self.buffer.clone())
    }

    /// Close the document and write it to `path`
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.close()?;
        std::fs::write(path.as_ref(), &self.buffer)?;
        log::info!(
            "saved {} ({} bytes)",
            path.as_ref().display(),
            self.buffer.len()
        );
        Ok(())
    }

    fn end_doc(&mut self) -> Result<()> {
        let mut writer = ObjectWriter::new(self.security.clone());
        writer.out(format!("%PDF-{}", self.pdf_version));
        self.put_pages(&mut writer)?;
        self.put_resources(&mut writer)?;
        let encrypt = self.put_encryption(&mut writer);
        let info = self.put_info(&mut writer);
        let root = self.put_catalog(&mut writer);
        writer.put_xref_and_trailer(root, info, encrypt);

        log::info!(
            "document finalized: {} pages, {} objects, {} bytes",
            self.page_no(),
            root,
            writer.len()
        );
        self.buffer = writer.into_bytes();
        self.state = DocumentState::Finalized;
        for image in self.images.values_mut() {
            image.release();
        }
        Ok(())
    }

    fn put_pages(&mut self, writer: &mut ObjectWriter) -> Result<()> {
        let nb = self.page_no();
        if let Some(alias) = self.alias_nb_pages.clone() {
            self.fonts.mark_used_everywhere("0123456789");
            let count = nb.to_string();
            let wide_alias = to_utf16be(&alias, false);
            let wide_count = to_utf16be(&count, false);
            for page in &mut self.pages {
                let content = replace_bytes(&page.content, &wide_alias, &wide_count);
                page.content = replace_bytes(&content, alias.as_bytes(), count.as_bytes());
            }
        }

        let (def_w, def_h) = self.default_page_points();
        let filter = if self.compress { "/Filter /FlateDecode " } else { "" };

        for n in 0..nb {
            let page = &self.pages[n];
            let obj = writer.new_obj();
            writer.out("<</Type /Page");
            writer.out(format!("/Parent {PAGES_ROOT} 0 R"));
            if let Some((w, h)) = page.size_override {
                writer.out(format!("/MediaBox [0 0 {w:.2} {h:.2}]"));
            }
            writer.out(format!("/Resources {RESOURCES} 0 R"));
            if !page.links.is_empty() {
                let mut annots = b"/Annots [".to_vec();
                for link in &page.links {
                    annots.extend_from_slice(
                        format!(
                            "<</Type /Annot /Subtype /Link /Rect [{:.2} {:.2} {:.2} {:.2}] /Border [0 0 0] ",
                            link.x,
                            link.y,
                            link.x + link.w,
                            link.y - link.h
                        )
                        .as_bytes(),
                    );
                    match &link.target {
                        LinkTarget::Uri(uri) => {
                            annots.extend_from_slice(b"/A <</S /URI /URI ");
                            annots.extend_from_slice(&writer.text_string(uri.as_bytes()));
                            annots.extend_from_slice(b">>>>");
                        }
                        LinkTarget::Internal(id) => {
                            let dest = self.link_destination(*id)?;
                            let target_h = self
                                .pages
                                .get(dest.page.saturating_sub(1))
                                .and_then(|p| p.size_override)
                                .map(|(_, h)| h)
                                .unwrap_or(def_h);
                            annots.extend_from_slice(
                                format!(
                                    "/Dest [{} 0 R /XYZ 0 {:.2} null]>>",
                                    1 + 2 * dest.page,
                                    target_h - dest.y * self.k
                                )
                                .as_bytes(),
                            );
                        }
                    }
                }
                annots.push(b']');
                writer.out(annots);
            }
            if self.pdf_version.as_str() > "1.3" {
                writer.out("/Group <</Type /Group /S /Transparency /CS /DeviceRGB>>");
            }
            writer.out(format!("/Contents {} 0 R>>", obj + 1));
            writer.end_obj();

            let content = if self.compress {
                compress(&page.content)?
            } else {
                page.content.clone()
            };
            writer.put_stream_object(filter, &content);
        }

        writer.begin_reserved(PAGES_ROOT);
        writer.out("<</Type /Pages");
        let kids: String = (0..nb).map(|i| format!("{} 0 R ", 3 + 2 * i)).collect();
        writer.out(format!("/Kids [{kids}]"));
        writer.out(format!("/Count {nb}"));
        writer.out(format!("/MediaBox [0 0 {def_w:.2} {def_h:.2}]"));
        writer.out(">>");
        writer.end_obj();
        Ok(())
    }

    fn put_resources(&mut self, writer: &mut ObjectWriter) -> Result<()> {
        self.fonts.put(writer)?;
        for image in self.images.values_mut() {
            image.put(writer, self.compress)?;
        }

        writer.begin_reserved(RESOURCES);
        writer.out("<<");
        writer.out("/ProcSet [/PDF /Text /ImageB /ImageC /ImageI]");
        writer.out("/Font <<");
        for font in self.fonts.fonts() {
            writer.out(format!("/F{} {} 0 R", font.index(), font.obj()));
        }
        writer.out(">>");
        writer.out("/XObject <<");
        for image in self.images.values() {
            writer.out(format!("/I{} {} 0 R", image.index, image.obj));
        }
        writer.out(">>");
        writer.out(">>");
        writer.end_obj();
        Ok(())
    }

    fn put_encryption(&self, writer: &mut ObjectWriter) -> Option<u32> {
        let (o, u, p) = {
            let security = writer.security()?;
            (
                escape(security.o_value()),
                escape(security.u_value()),
                security.p_value(),
            )
        };
        let obj = writer.new_obj();
        writer.out("<<");
        writer.out("/Filter /Standard");
        writer.out("/V 1");
        writer.out("/R 2");
        let mut line = b"/O (".to_vec();
        line.extend_from_slice(&o);
        line.push(b')');
        writer.out(line);
        let mut line = b"/U (".to_vec();
        line.extend_from_slice(&u);
        line.push(b')');
        writer.out(line);
        writer.out(format!("/P {p}"));
        writer.out(">>");
        writer.end_obj();
        Some(obj)
    }

    fn put_info(&self, writer: &mut ObjectWriter) -> u32 {
        let obj = writer.new_obj();
        writer.out("<<");
        let producer = format!("folio-pdf {}", env!("CARGO_PKG_VERSION"));
        let date = self
            .creation_date
            .unwrap_or_else(|| chrono::Local::now().naive_local())
            .format("D:%Y%m%d%H%M%S")
            .to_string();
        let entries = [
            ("Producer", Some(producer.as_str())),
            ("Title", self.title.as_deref()),
            ("Subject", self.subject.as_deref()),
            ("Author", self.author.as_deref()),
            ("Keywords", self.keywords.as_deref()),
            ("Creator", self.creator.as_deref()),
            ("CreationDate", Some(date.as_str())),
        ];
        for (key, value) in entries {
            if let Some(value) = value {
                let mut line = format!("/{key} ").into_bytes();
                line.extend_from_slice(&writer.text_string(&text_string_bytes(value)));
                writer.out(line);
            }
        }
        writer.out(">>");
        writer.end_obj();
        obj
    }

    fn put_catalog(&self, writer: &mut ObjectWriter) -> u32 {
        let obj = writer.new_obj();
        writer.out("<<");
        writer.out("/Type /Catalog");
        writer.out(format!("/Pages {PAGES_ROOT} 0 R"));
        match self.zoom {
            ZoomMode::FullPage => writer.out("/OpenAction [3 0 R /Fit]"),
            ZoomMode::FullWidth => writer.out("/OpenAction [3 0 R /FitH null]"),
            ZoomMode::Real => writer.out("/OpenAction [3 0 R /XYZ null null 1]"),
            ZoomMode::Percent(zoom) => {
                writer.out(format!("/OpenAction [3 0 R /XYZ null null {}]", zoom / 100.0))
            }
            ZoomMode::Default => {}
        }
        match self.layout {
            LayoutMode::Single => writer.out("/PageLayout /SinglePage"),
            LayoutMode::Continuous => writer.out("/PageLayout /OneColumn"),
            LayoutMode::Two => writer.out("/PageLayout /TwoColumnLeft"),
            LayoutMode::Default => {}
        }
        writer.out(">>");
        writer.end_obj();
        obj
    }
}
