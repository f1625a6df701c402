//! Font registry: selection keys, metrics and embedding

pub mod cache;
pub mod definition;
pub mod truetype;
mod unicode;
pub mod widths;

use crate::text::cp1252_byte;
use crate::writer::ObjectWriter;
use crate::{PdfError, Result};
use cache::{CacheKey, MetricsCache};
use definition::{DefinitionKind, FontDefinition};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use truetype::TrueTypeBackend;
pub(crate) use unicode::UnicodeFont;

/// Families every viewer provides without embedding
const CORE_FAMILIES: [&str; 5] = ["courier", "helvetica", "times", "symbol", "zapfdingbats"];

/// Where a font added with [`Document::add_font`](crate::Document::add_font) comes from
#[derive(Debug, Clone, PartialEq)]
pub enum FontSource {
    /// JSON metric definition of a core, Type1 or 8-bit TrueType font
    Definition(PathBuf),
    /// TrueType program embedded as a Unicode subset
    TrueType(PathBuf),
}

/// Advance widths of a font, in 1/1000 em
pub trait GlyphMetrics {
    fn glyph_width(&self, c: char) -> u16;

    /// Width of `text` in the unit of `size`
    fn string_width(&self, text: &str, size: f64) -> f64 {
        let total: u32 = text.chars().map(|c| self.glyph_width(c) as u32).sum();
        total as f64 * size / 1000.0
    }
}

/// Normalised font request
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FontRequest {
    pub family: String,
    pub style: String,
    pub underline: bool,
}

impl FontRequest {
    /// Lowercase the family, strip `U` into the underline flag and order `BI`
    pub fn new(family: &str, style: &str) -> Self {
        let mut family = family.to_lowercase();
        if family == "arial" {
            family = "helvetica".to_string();
        }
        let upper = style.to_uppercase();
        let underline = upper.contains('U');
        let mut style: String = upper.chars().filter(|c| *c == 'B' || *c == 'I').collect();
        if style == "IB" {
            style = "BI".to_string();
        }
        if family == "symbol" || family == "zapfdingbats" {
            style.clear();
        }
        Self {
            family,
            style,
            underline,
        }
    }

    pub fn key(&self) -> String {
        format!("{}{}", self.family, self.style)
    }

    pub fn is_core(&self) -> bool {
        CORE_FAMILIES.contains(&self.family.as_str())
    }
}

/// A font with an 8-bit encoding, either core or embedded
#[derive(Debug, Clone)]
pub(crate) struct SingleByteFont {
    pub index: usize,
    pub obj: u32,
    pub definition: FontDefinition,
    /// Position in the registry's interned differences
    pub diff: Option<usize>,
}

impl GlyphMetrics for SingleByteFont {
    fn glyph_width(&self, c: char) -> u16 {
        self.definition
            .cw
            .get(cp1252_byte(c) as usize)
            .copied()
            .unwrap_or(self.definition.desc.missing_width)
    }
}

impl SingleByteFont {
    fn put_core(&mut self, writer: &mut ObjectWriter) {
        let name = &self.definition.name;
        self.obj = writer.new_obj();
        writer.out("<</Type /Font");
        writer.out(format!("/BaseFont /{name}"));
        writer.out("/Subtype /Type1");
        if name != "Symbol" && name != "ZapfDingbats" {
            writer.out("/Encoding /WinAnsiEncoding");
        }
        writer.out(">>");
        writer.end_obj();
    }

    fn put_embedded(
        &mut self,
        writer: &mut ObjectWriter,
        diff_objects: &[u32],
        files: &IndexMap<String, FontFile>,
    ) {
        let def = &self.definition;
        let subtype = match def.kind {
            DefinitionKind::Type1 => "Type1",
            _ => "TrueType",
        };
        self.obj = writer.new_obj();
        let n = self.obj;
        writer.out("<</Type /Font");
        writer.out(format!("/BaseFont /{}", def.name));
        writer.out(format!("/Subtype /{subtype}"));
        writer.out("/FirstChar 32 /LastChar 255");
        writer.out(format!("/Widths {} 0 R", n + 1));
        writer.out(format!("/FontDescriptor {} 0 R", n + 2));
        if def.enc.is_some() {
            match self.diff.and_then(|d| diff_objects.get(d)) {
                Some(obj) => writer.out(format!("/Encoding {obj} 0 R")),
                None => writer.out("/Encoding /WinAnsiEncoding"),
            }
        }
        writer.out(">>");
        writer.end_obj();

        writer.new_obj();
        let widths: Vec<String> = def.cw[32..256].iter().map(|w| w.to_string()).collect();
        writer.out(format!("[{}]", widths.join(" ")));
        writer.end_obj();

        writer.new_obj();
        let mut descriptor = format!(
            "<</Type /FontDescriptor /FontName /{} {}",
            def.name,
            def.desc.to_pdf_entries(def.desc.flags)
        );
        if let Some(file) = def.file.as_ref().and_then(|f| files.get(f)) {
            let suffix = if def.kind == DefinitionKind::Type1 { "" } else { "2" };
            descriptor.push_str(&format!(" /FontFile{suffix} {} 0 R", file.obj));
        }
        descriptor.push_str(">>");
        writer.out(descriptor);
        writer.end_obj();
    }
}

/// Polymorphic font resource
#[derive(Debug, Clone)]
pub(crate) enum Font {
    Core(SingleByteFont),
    Simple(SingleByteFont),
    Unicode(UnicodeFont),
}

impl GlyphMetrics for Font {
    fn glyph_width(&self, c: char) -> u16 {
        match self {
            Font::Core(f) | Font::Simple(f) => f.glyph_width(c),
            Font::Unicode(f) => f.glyph_width(c),
        }
    }
}

impl Font {
    /// Resource index, used in `/F<index>`
    pub fn index(&self) -> usize {
        match self {
            Font::Core(f) | Font::Simple(f) => f.index,
            Font::Unicode(f) => f.index,
        }
    }

    pub fn obj(&self) -> u32 {
        match self {
            Font::Core(f) | Font::Simple(f) => f.obj,
            Font::Unicode(f) => f.obj,
        }
    }

    pub fn is_unicode(&self) -> bool {
        matches!(self, Font::Unicode(_))
    }

    /// Underline position and thickness in 1/1000 em
    pub fn underline(&self) -> (i32, i32) {
        match self {
            Font::Core(f) | Font::Simple(f) => (f.definition.up, f.definition.ut),
            Font::Unicode(f) => (
                f.metrics.underline_position,
                f.metrics.underline_thickness,
            ),
        }
    }

    /// Record drawn characters; only subsetted fonts keep track
    pub fn mark_used(&mut self, text: &str) {
        if let Font::Unicode(f) = self {
            f.mark_used(text);
        }
    }
}

/// An embedded font program shared by the fonts that reference it
#[derive(Debug, Clone)]
pub(crate) struct FontFile {
    pub path: PathBuf,
    pub kind: DefinitionKind,
    pub length1: u32,
    pub length2: Option<u32>,
    pub obj: u32,
}

impl FontFile {
    /// Strip PFB segment headers (`0x80` markers) from a Type1 program
    fn strip_headers(&self, mut program: Vec<u8>) -> Vec<u8> {
        if self.length2.is_none() || program.first() != Some(&0x80) || program.len() < 6 {
            return program;
        }
        program.drain(..6);
        let length1 = self.length1 as usize;
        if program.get(length1) == Some(&0x80) && program.len() >= length1 + 6 {
            program.drain(length1..length1 + 6);
        }
        program
    }

    fn put(&mut self, writer: &mut ObjectWriter) -> Result<()> {
        let raw = std::fs::read(&self.path).map_err(|e| {
            PdfError::FontDefinitionError(format!("{}: {e}", self.path.display()))
        })?;
        let compressed = self.path.extension().is_some_and(|ext| ext == "z");
        let program = if compressed {
            raw
        } else {
            self.strip_headers(raw)
        };

        let mut entries = String::new();
        if compressed {
            entries.push_str("/Filter /FlateDecode ");
        }
        entries.push_str(&format!("/Length1 {} ", self.length1));
        if let Some(length2) = self.length2 {
            entries.push_str(&format!("/Length2 {length2} /Length3 0 "));
        }
        self.obj = writer.put_stream_object(&entries, &program);
        log::debug!(
            "embedded {:?} program {} ({} bytes)",
            self.kind,
            self.path.display(),
            program.len()
        );
        Ok(())
    }
}

/// All fonts of a document, in registration order
pub(crate) struct FontRegistry {
    fonts: IndexMap<String, Font>,
    diffs: Vec<String>,
    files: IndexMap<String, FontFile>,
    font_dir: Option<PathBuf>,
    backend: Box<dyn TrueTypeBackend>,
    cache: Option<Box<dyn MetricsCache>>,
}

impl FontRegistry {
    pub fn new(
        font_dir: Option<PathBuf>,
        backend: Box<dyn TrueTypeBackend>,
        cache: Option<Box<dyn MetricsCache>>,
    ) -> Self {
        Self {
            fonts: IndexMap::new(),
            diffs: Vec::new(),
            files: IndexMap::new(),
            font_dir,
            backend,
            cache,
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.font_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fonts.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Font> {
        self.fonts.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Font> {
        self.fonts.get_mut(key)
    }

    pub fn fonts(&self) -> impl Iterator<Item = &Font> {
        self.fonts.values()
    }

    /// Mark `text` as used in every Unicode font
    pub fn mark_used_everywhere(&mut self, text: &str) {
        for font in self.fonts.values_mut() {
            font.mark_used(text);
        }
    }

    /// Load a core font: built-in Courier or `<key>.json` in the font directory
    pub fn add_core(&mut self, key: &str) -> Result<()> {
        let definition = match FontDefinition::courier(key) {
            Some(definition) => definition,
            None => {
                let path = self.resolve(Path::new(&format!("{key}.json")));
                if !path.exists() {
                    return Err(PdfError::FontNotFound(key.to_string()));
                }
                FontDefinition::load(&path)?
            }
        };
        let index = self.fonts.len() + 1;
        log::debug!("loaded core font {key} as /F{index}");
        self.fonts.insert(
            key.to_string(),
            Font::Core(SingleByteFont {
                index,
                obj: 0,
                definition,
                diff: None,
            }),
        );
        Ok(())
    }

    /// Load a font described by a JSON definition
    pub fn add_definition(&mut self, key: &str, path: &Path) -> Result<()> {
        let path = self.resolve(path);
        let definition = FontDefinition::load(&path)?;
        let index = self.fonts.len() + 1;

        let diff = definition.diff.as_ref().map(|diff| {
            match self.diffs.iter().position(|d| d == diff) {
                Some(i) => i,
                None => {
                    self.diffs.push(diff.clone());
                    self.diffs.len() - 1
                }
            }
        });

        if let Some(file) = &definition.file {
            if !self.files.contains_key(file) {
                let dir = path.parent().unwrap_or_else(|| Path::new(""));
                let (length1, length2) = match definition.kind {
                    DefinitionKind::Type1 => (definition.size1.unwrap_or(0), definition.size2),
                    _ => (definition.original_size.unwrap_or(0), None),
                };
                self.files.insert(
                    file.clone(),
                    FontFile {
                        path: dir.join(file),
                        kind: definition.kind,
                        length1,
                        length2,
                        obj: 0,
                    },
                );
            }
        }

        let font = SingleByteFont {
            index,
            obj: 0,
            definition,
            diff,
        };
        let font = match font.definition.kind {
            DefinitionKind::Core => Font::Core(font),
            _ => Font::Simple(font),
        };
        log::debug!("loaded font definition {} as /F{index}", path.display());
        self.fonts.insert(key.to_string(), font);
        Ok(())
    }

    /// Load a TrueType program for Unicode subsetting, consulting the metrics cache
    pub fn add_truetype(&mut self, key: &str, path: &Path) -> Result<()> {
        let path = self.resolve(path);
        let cache_key = CacheKey::for_file(&path)
            .map_err(|e| PdfError::FontParseError(format!("{}: {e}", path.display())))?;

        let cached = self.cache.as_ref().and_then(|c| c.lookup(&cache_key));
        let metrics = match cached {
            Some(metrics) => {
                log::debug!("metrics cache hit for {}", path.display());
                metrics
            }
            None => {
                log::debug!("metrics cache miss for {}", path.display());
                let data = std::fs::read(&path)?;
                let metrics = self.backend.parse_metrics(&data)?;
                if let Some(cache) = self.cache.as_mut() {
                    if let Err(e) = cache.populate(&cache_key, &metrics) {
                        log::warn!("could not cache metrics for {}: {e}", path.display());
                    }
                }
                metrics
            }
        };

        let index = self.fonts.len() + 1;
        self.fonts.insert(
            key.to_string(),
            Font::Unicode(UnicodeFont::new(index, path, metrics)),
        );
        Ok(())
    }

    /// Write encodings, programs and font dictionaries
    pub fn put(&mut self, writer: &mut ObjectWriter) -> Result<()> {
        let mut diff_objects = Vec::with_capacity(self.diffs.len());
        for diff in &self.diffs {
            writer.new_obj();
            writer.out(format!(
                "<</Type /Encoding /BaseEncoding /WinAnsiEncoding /Differences [{diff}]>>"
            ));
            writer.end_obj();
            diff_objects.push(writer.last_object());
        }

        for file in self.files.values_mut() {
            file.put(writer)?;
        }

        for font in self.fonts.values_mut() {
            match font {
                Font::Core(f) => f.put_core(writer),
                Font::Simple(f) => f.put_embedded(writer, &diff_objects, &self.files),
                Font::Unicode(f) => f.put(writer, self.backend.as_ref())?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::truetype::TtfParserBackend;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_font_request_normalisation() {
        let req = FontRequest::new("Arial", "ibu");
        assert_eq!(req.family, "helvetica");
        assert_eq!(req.style, "BI");
        assert!(req.underline);
        assert_eq!(req.key(), "helveticaBI");
        assert!(req.is_core());

        let symbol = FontRequest::new("Symbol", "B");
        assert_eq!(symbol.key(), "symbol");

        let custom = FontRequest::new("DejaVu", "");
        assert_eq!(custom.key(), "dejavu");
        assert!(!custom.is_core());
    }

    #[test]
    fn test_single_byte_widths() {
        let font = SingleByteFont {
            index: 1,
            obj: 0,
            definition: FontDefinition::courier("courier").unwrap(),
            diff: None,
        };
        assert_eq!(font.string_width("abc", 10.0), 18.0);
        assert_eq!(font.glyph_width('\u{20AC}'), 600);
    }

    #[test]
    fn test_unknown_core_font() {
        let mut registry = FontRegistry::new(None, Box::new(TtfParserBackend), None);
        assert!(matches!(
            registry.add_core("helvetica"),
            Err(PdfError::FontNotFound(k)) if k == "helvetica"
        ));
        registry.add_core("courierB").unwrap();
        assert_eq!(registry.get("courierB").unwrap().index(), 1);
    }

    #[test]
    fn test_strip_pfb_headers() {
        let file = FontFile {
            path: PathBuf::from("font.pfb"),
            kind: DefinitionKind::Type1,
            length1: 3,
            length2: Some(2),
            obj: 0,
        };
        let program = vec![
            0x80, 1, 3, 0, 0, 0, b'a', b'b', b'c', 0x80, 2, 2, 0, 0, 0, b'x', b'y',
        ];
        assert_eq!(file.strip_headers(program), b"abcxy".to_vec());
        assert_eq!(file.strip_headers(b"plain".to_vec()), b"plain".to_vec());
    }

    #[test]
    fn test_core_font_dictionary() {
        let mut registry = FontRegistry::new(None, Box::new(TtfParserBackend), None);
        registry.add_core("courier").unwrap();
        let mut writer = ObjectWriter::new(None);
        registry.put(&mut writer).unwrap();
        assert_eq!(registry.get("courier").unwrap().obj(), 3);
        let text = String::from_utf8(writer.into_bytes()).unwrap();
        assert_eq!(
            text,
            "3 0 obj\n<</Type /Font\n/BaseFont /Courier\n/Subtype /Type1\n/Encoding /WinAnsiEncoding\n>>\nendobj\n"
        );
    }
}
