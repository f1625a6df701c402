//! Subsetted TrueType fonts addressed by Unicode code point (Type0 / Identity-H)

use super::truetype::{TrueTypeBackend, TrueTypeMetrics};
use super::widths::{compress_widths, format_widths};
use super::GlyphMetrics;
use crate::text::compress;
use crate::writer::ObjectWriter;
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Identity ToUnicode CMap: every CID is its own code point
const IDENTITY_TO_UNICODE: &str = "/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo
<</Registry (Adobe)
/Ordering (UCS)
/Supplement 0
>> def
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
1 beginbfrange
<0000> <FFFF> <0000>
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end";

/// A TrueType font whose used code points are embedded as a subset
#[derive(Debug, Clone)]
pub(crate) struct UnicodeFont {
    pub index: usize,
    pub obj: u32,
    pub path: PathBuf,
    pub metrics: TrueTypeMetrics,
    /// Code points drawn so far; only grows
    pub used: BTreeSet<u32>,
}

impl GlyphMetrics for UnicodeFont {
    fn glyph_width(&self, c: char) -> u16 {
        self.metrics
            .widths
            .get(&(c as u32))
            .copied()
            .unwrap_or(self.metrics.default_width)
    }
}

/// Six-letter subset prefix, unique per font resource
pub(crate) fn subset_tag(index: usize) -> String {
    let mut value = index;
    let mut tag = [b'A'; 6];
    for slot in tag.iter_mut().rev() {
        *slot = b'A' + (value % 26) as u8;
        value /= 26;
    }
    String::from_utf8_lossy(&tag).into_owned()
}

/// 65536-entry big-endian CID to glyph table
pub(crate) fn cid_to_gid_map(code_to_glyph: &BTreeMap<u32, u16>) -> Vec<u8> {
    let mut map = vec![0u8; 256 * 256 * 2];
    for (&code, &glyph) in code_to_glyph {
        if code == 0 || code > 0xFFFF {
            continue;
        }
        let at = code as usize * 2;
        map[at..at + 2].copy_from_slice(&glyph.to_be_bytes());
    }
    map
}

impl UnicodeFont {
    pub fn new(index: usize, path: PathBuf, metrics: TrueTypeMetrics) -> Self {
        Self {
            index,
            obj: 0,
            path,
            metrics,
            used: BTreeSet::new(),
        }
    }

    /// Record the code points of `text` as used
    pub fn mark_used(&mut self, text: &str) {
        self.used
            .extend(text.chars().map(|c| c as u32).filter(|cp| *cp != 0 && *cp <= 0xFFFF));
    }

    /// Base font name with its subset prefix
    pub fn base_font(&self) -> String {
        format!("{}+{}", subset_tag(self.index), self.metrics.full_name)
    }

    /// `/W` array body for the used code points
    pub fn width_array(&self) -> String {
        let widths: Vec<(u32, u16)> = self
            .used
            .iter()
            .filter_map(|cp| self.metrics.widths.get(cp).map(|w| (*cp, *w)))
            .collect();
        format_widths(&compress_widths(&widths))
    }

    /// Write the Type0 font and its six companion objects
    pub fn put(&mut self, writer: &mut ObjectWriter, backend: &dyn TrueTypeBackend) -> Result<()> {
        let program = std::fs::read(&self.path)?;
        let subset = backend.subset(&program, &self.used)?;
        let subset_len = subset.data.len();
        let font_stream = compress(&subset.data)?;
        let base_font = self.base_font();

        // Type0
        self.obj = writer.new_obj();
        let n = self.obj;
        writer.out(format!(
            "<</Type /Font /Subtype /Type0 /BaseFont /{base_font} /Encoding /Identity-H /DescendantFonts [{} 0 R] /ToUnicode {} 0 R>>",
            n + 1,
            n + 2
        ));
        writer.end_obj();

        // CIDFontType2
        writer.new_obj();
        writer.out(format!(
            "<</Type /Font /Subtype /CIDFontType2 /BaseFont /{base_font} /CIDSystemInfo {} 0 R /FontDescriptor {} 0 R",
            n + 3,
            n + 4
        ));
        writer.out(format!("/DW {}", self.metrics.default_width));
        writer.out(format!("/W [{}]", self.width_array()));
        writer.out(format!("/CIDToGIDMap {} 0 R>>", n + 5));
        writer.end_obj();

        // ToUnicode
        writer.put_stream_object("", IDENTITY_TO_UNICODE.as_bytes());

        // CIDSystemInfo
        writer.new_obj();
        let registry = writer.text_string(b"Adobe");
        let ordering = writer.text_string(b"UCS");
        let mut line = b"<</Registry ".to_vec();
        line.extend_from_slice(&registry);
        line.extend_from_slice(b" /Ordering ");
        line.extend_from_slice(&ordering);
        line.extend_from_slice(b" /Supplement 0>>");
        writer.out(line);
        writer.end_obj();

        // FontDescriptor
        let m = &self.metrics;
        let flags = (m.flags | 4) & !32;
        let [x0, y0, x1, y1] = m.bbox;
        writer.new_obj();
        writer.out(format!(
            "<</Type /FontDescriptor /FontName /{base_font} /Ascent {} /Descent {} /CapHeight {} /Flags {flags} /FontBBox [{x0} {y0} {x1} {y1}] /ItalicAngle {} /StemV {} /MissingWidth {} /FontFile2 {} 0 R>>",
            m.ascent,
            m.descent,
            m.cap_height,
            m.italic_angle,
            m.stem_v,
            m.default_width,
            n + 6
        ));
        writer.end_obj();

        // CIDToGIDMap
        let map = compress(&cid_to_gid_map(&subset.code_to_glyph))?;
        writer.put_stream_object("/Filter /FlateDecode ", &map);

        // FontFile2
        writer.put_stream_object(
            &format!("/Filter /FlateDecode /Length1 {subset_len} "),
            &font_stream,
        );

        log::debug!(
            "embedded {base_font}: {} code points, {} -> {} bytes",
            self.used.len(),
            program.len(),
            subset_len
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::truetype::SubsetProgram;
    use pretty_assertions::assert_eq;

    struct IdentityBackend;

    impl TrueTypeBackend for IdentityBackend {
        fn parse_metrics(&self, _data: &[u8]) -> Result<TrueTypeMetrics> {
            Ok(metrics())
        }

        fn subset(&self, data: &[u8], used: &BTreeSet<u32>) -> Result<SubsetProgram> {
            Ok(SubsetProgram {
                data: data.to_vec(),
                code_to_glyph: used
                    .iter()
                    .enumerate()
                    .map(|(i, cp)| (*cp, i as u16 + 1))
                    .collect(),
            })
        }
    }

    fn metrics() -> TrueTypeMetrics {
        let mut widths = BTreeMap::new();
        widths.insert(65, 600);
        widths.insert(66, 600);
        widths.insert(97, 500);
        TrueTypeMetrics {
            full_name: "Stub".into(),
            ascent: 800,
            descent: -200,
            cap_height: 700,
            flags: 32 | 64,
            bbox: [0, -200, 1000, 800],
            italic_angle: -12,
            stem_v: 80,
            default_width: 450,
            underline_position: -100,
            underline_thickness: 50,
            widths,
        }
    }

    #[test]
    fn test_subset_tag() {
        assert_eq!(subset_tag(0), "AAAAAA");
        assert_eq!(subset_tag(1), "AAAAAB");
        assert_eq!(subset_tag(27), "AAAABB");
    }

    #[test]
    fn test_mark_used_excludes_zero() {
        let mut font = UnicodeFont::new(1, PathBuf::from("stub.ttf"), metrics());
        font.mark_used("AB\0a\u{1F600}");
        assert_eq!(font.used.iter().copied().collect::<Vec<_>>(), vec![65, 66, 97]);
    }

    #[test]
    fn test_missing_width_fallback() {
        let font = UnicodeFont::new(1, PathBuf::from("stub.ttf"), metrics());
        assert_eq!(font.glyph_width('A'), 600);
        assert_eq!(font.glyph_width('\u{0E01}'), 450);
        assert_eq!(font.string_width("Aa", 10.0), 11.0);
    }

    #[test]
    fn test_width_array_uses_used_code_points() {
        let mut font = UnicodeFont::new(1, PathBuf::from("stub.ttf"), metrics());
        font.mark_used("BAa");
        assert_eq!(font.width_array(), "65 66 600 97 [500]");
    }

    #[test]
    fn test_cid_to_gid_map() {
        let mut map = BTreeMap::new();
        map.insert(65, 1);
        map.insert(0x0E01, 0x0102);
        let table = cid_to_gid_map(&map);
        assert_eq!(table.len(), 131072);
        assert_eq!(&table[130..132], &[0, 1]);
        assert_eq!(&table[0x0E01 * 2..0x0E01 * 2 + 2], &[0x01, 0x02]);
        assert_eq!(&table[0..2], &[0, 0]);
    }

    #[test]
    fn test_put_writes_seven_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stub.ttf");
        std::fs::write(&path, b"fake program").unwrap();

        let mut font = UnicodeFont::new(1, path, metrics());
        font.mark_used("AB");
        let mut writer = ObjectWriter::new(None);
        font.put(&mut writer, &IdentityBackend).unwrap();

        assert_eq!(font.obj, 3);
        assert_eq!(writer.last_object(), 9);
        let text = String::from_utf8_lossy(&writer.into_bytes()).into_owned();
        assert!(text.contains("/BaseFont /AAAAAB+Stub /Encoding /Identity-H /DescendantFonts [4 0 R] /ToUnicode 5 0 R"));
        assert!(text.contains("/CIDSystemInfo 6 0 R /FontDescriptor 7 0 R"));
        assert!(text.contains("/W [65 66 600]"));
        assert!(text.contains("/CIDToGIDMap 8 0 R>>"));
        assert!(text.contains("<</Registry (Adobe) /Ordering (UCS) /Supplement 0>>"));
        // Symbolic bit set, nonsymbolic bit cleared, italic kept
        assert!(text.contains("/Flags 68 "));
        assert!(text.contains("/FontFile2 9 0 R>>"));
        assert!(text.contains("/Length1 12 "));
    }
}
