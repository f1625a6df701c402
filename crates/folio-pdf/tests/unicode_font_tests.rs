//! Tests for subsetted TrueType fonts
//!
//! A stub backend stands in for real font programs so the expected widths
//! and object layout are known exactly.

use folio_pdf::{
    Align, Border, Document, DocumentConfig, FileMetricsCache, FontSource, NextPosition,
    PdfError, Result, SubsetProgram, TrueTypeBackend, TrueTypeMetrics, Unit,
};
use pretty_assertions::assert_eq;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Backend with fixed metrics that counts how often fonts are parsed
#[derive(Clone, Default)]
struct StubBackend {
    parses: Arc<AtomicUsize>,
}

impl TrueTypeBackend for StubBackend {
    fn parse_metrics(&self, _data: &[u8]) -> Result<TrueTypeMetrics> {
        self.parses.fetch_add(1, Ordering::SeqCst);
        let mut widths: BTreeMap<u32, u16> = (32..127).map(|cp| (cp, 500)).collect();
        widths.insert('W' as u32, 900);
        widths.insert('é' as u32, 610);
        Ok(TrueTypeMetrics {
            full_name: "StubSans".to_string(),
            ascent: 900,
            descent: -250,
            cap_height: 700,
            flags: 32,
            bbox: [-100, -250, 1000, 900],
            italic_angle: 0,
            stem_v: 87,
            default_width: 600,
            underline_position: -120,
            underline_thickness: 60,
            widths,
        })
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

/// Write a placeholder font program and return its path
fn create_font_file(dir: &Path) -> PathBuf {
    let path = dir.join("stub.ttf");
    std::fs::write(&path, b"not really a font program").expect("Failed to write font file");
    path
}

fn create_document(backend: StubBackend, cache_dir: Option<&Path>) -> Document {
    let config = DocumentConfig {
        unit: Unit::Pt,
        compress: false,
        ..DocumentConfig::default()
    };
    let mut builder = Document::builder(config).truetype_backend(Box::new(backend));
    if let Some(dir) = cache_dir {
        builder = builder.metrics_cache(Box::new(FileMetricsCache::new(dir)));
    }
    let mut doc = builder.build().expect("Failed to build document");
    let date = chrono::NaiveDate::from_ymd_opt(2024, 5, 6)
        .and_then(|d| d.and_hms_opt(7, 8, 9))
        .expect("valid date");
    doc.set_creation_date(date);
    doc
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[test]
fn test_unicode_text_is_utf16() {
    let dir = tempfile::tempdir().unwrap();
    let font = create_font_file(dir.path());
    let mut doc = create_document(StubBackend::default(), None);
    doc.add_font("Stub", "", FontSource::TrueType(font))
        .expect("Failed to add font");
    doc.add_page().unwrap();
    doc.set_font("Stub", "", 10.0).unwrap();
    assert_eq!(doc.get_string_width("Hé").unwrap(), 11.1);
    doc.cell(0.0, 10.0, "Hé", Border::empty(), NextPosition::NextLine, Align::Left, false)
        .unwrap();
    let pdf = doc.output().unwrap();
    let text = String::from_utf8_lossy(&pdf);

    assert!(contains(&pdf, b"(\x00H\x00\xE9) Tj ET"));
    assert!(text.contains(
        "5 0 obj\n<</Type /Font /Subtype /Type0 /BaseFont /AAAAAB+StubSans /Encoding /Identity-H /DescendantFonts [6 0 R] /ToUnicode 7 0 R>>"
    ));
    assert!(text.contains("/DW 600\n/W [72 [500] 233 [610]]\n/CIDToGIDMap 10 0 R>>"));
    assert!(text.contains("/FontFile2 11 0 R>>"));
    assert!(text.contains("/F1 5 0 R\n"));
    assert!(text.contains("/Size 14\n/Root 13 0 R\n/Info 12 0 R\n"));
}

#[test]
fn test_missing_glyph_uses_default_width() {
    let dir = tempfile::tempdir().unwrap();
    let font = create_font_file(dir.path());
    let mut doc = create_document(StubBackend::default(), None);
    doc.add_font("Stub", "", FontSource::TrueType(font)).unwrap();
    doc.set_font("Stub", "", 10.0).unwrap();
    assert_eq!(doc.get_string_width("中").unwrap(), 6.0);
}

#[test]
fn test_justified_unicode_line_uses_tj() {
    let dir = tempfile::tempdir().unwrap();
    let font = create_font_file(dir.path());
    let mut doc = create_document(StubBackend::default(), None);
    doc.add_font("Stub", "", FontSource::TrueType(font)).unwrap();
    doc.add_page().unwrap();
    doc.set_font("Stub", "", 10.0).unwrap();
    doc.set_cell_margin(0.0);
    doc.set_xy(0.0, 0.0);
    // "aa bb cc" is 40 wide in 45, two interior spaces: 2.5 each
    doc.multi_cell(45.0, 10.0, "aa bb cc dd", Border::empty(), Align::Justify, false)
        .unwrap();
    let pdf = doc.output().unwrap();

    assert!(contains(&pdf, b"2.500 Tw\n"));
    assert!(contains(
        &pdf,
        b"BT 0 Tw 0.00 833.89 Td [(\x00a\x00a) -250(\x00 ) (\x00b\x00b) -250(\x00 ) (\x00c\x00c) ] TJ ET"
    ));
    assert!(contains(&pdf, b"(\x00d\x00d) Tj ET"));
}

#[test]
fn test_page_alias_in_unicode_font() {
    let dir = tempfile::tempdir().unwrap();
    let font = create_font_file(dir.path());
    let mut doc = create_document(StubBackend::default(), None);
    doc.add_font("Stub", "", FontSource::TrueType(font)).unwrap();
    doc.alias_nb_pages();
    doc.add_page().unwrap();
    doc.set_font("Stub", "", 10.0).unwrap();
    doc.cell(0.0, 10.0, "{nb}", Border::empty(), NextPosition::NextLine, Align::Left, false)
        .unwrap();
    let pdf = doc.output().unwrap();
    let text = String::from_utf8_lossy(&pdf);

    assert!(contains(&pdf, b"(\x001) Tj"));
    // Every digit is embedded so the substituted count can be shown
    assert!(text.contains("/W [48 57 500 98 [500] 110 [500] 123 [500] 125 [500]]"));
}

#[test]
fn test_metrics_cache_is_transparent() {
    let dir = tempfile::tempdir().unwrap();
    let cache_dir = tempfile::tempdir().unwrap();
    let font = create_font_file(dir.path());
    let backend = StubBackend::default();

    let render = |backend: StubBackend| -> (f64, Vec<u8>) {
        let mut doc = create_document(backend, Some(cache_dir.path()));
        doc.add_font("Stub", "", FontSource::TrueType(font.clone()))
            .expect("Failed to add font");
        doc.add_page().unwrap();
        doc.set_font("Stub", "", 12.0).unwrap();
        doc.write(14.0, "Wide Words wrap well").unwrap();
        let width = doc.get_string_width("Wide Words").unwrap();
        (width, doc.output().unwrap())
    };

    let (fresh_width, fresh_pdf) = render(backend.clone());
    assert_eq!(backend.parses.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read_dir(cache_dir.path()).unwrap().count(), 1);

    let (cached_width, cached_pdf) = render(backend.clone());
    assert_eq!(backend.parses.load(Ordering::SeqCst), 1);
    assert_eq!(fresh_width, cached_width);
    assert_eq!(fresh_pdf, cached_pdf);
}

#[test]
fn test_invalid_font_program() {
    let dir = tempfile::tempdir().unwrap();
    let font = create_font_file(dir.path());
    let mut doc = Document::new(DocumentConfig::default()).unwrap();
    let err = doc
        .add_font("Broken", "", FontSource::TrueType(font))
        .unwrap_err();
    assert!(matches!(err, PdfError::FontParseError(_)));
}

#[test]
fn test_missing_font_file() {
    let mut doc = create_document(StubBackend::default(), None);
    let err = doc
        .add_font("Ghost", "", FontSource::TrueType(PathBuf::from("/nonexistent/ghost.ttf")))
        .unwrap_err();
    assert!(matches!(err, PdfError::FontParseError(_)));
}

/// Small TrueType program with box glyphs and known advances
fn sample_font_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fonts/folio-test.ttf")
}

/// Decoded body of stream object `id`
fn stream_content(doc: &lopdf::Document, id: u32) -> Vec<u8> {
    doc.get_object((id, 0))
        .and_then(|object| object.as_stream())
        .and_then(|stream| stream.decompressed_content())
        .expect("Failed to decode stream")
}

#[test]
fn test_truetype_subset_keeps_glyph_advances() {
    let config = DocumentConfig {
        unit: Unit::Pt,
        compress: false,
        ..DocumentConfig::default()
    };
    let mut doc = Document::new(config).unwrap();
    doc.add_font("Sample", "", FontSource::TrueType(sample_font_path()))
        .expect("Failed to add font");
    doc.add_page().unwrap();
    doc.set_font("Sample", "", 10.0).unwrap();
    assert_eq!(doc.get_string_width("Hé Wπ").unwrap(), 30.4);
    doc.cell(0.0, 10.0, "Hé Wπ", Border::empty(), NextPosition::NextLine, Align::Left, false)
        .unwrap();
    let pdf = doc.output().unwrap();
    let text = String::from_utf8_lossy(&pdf);

    assert!(text.contains("/BaseFont /AAAAAB+FolioTest-Regular"));
    assert!(text.contains("/DW 500\n/W [32 [250] 72 [720] 87 [930] 233 [530] 960 [610]]\n"));
    assert!(text.contains("/Ascent 800 /Descent -200 /CapHeight 700 /Flags 4 /FontBBox [10 -10 920 740]"));

    let parsed = lopdf::Document::load_mem(&pdf).expect("Failed to parse output");
    let map = stream_content(&parsed, 10);
    assert_eq!(map.len(), 2 * 65536);
    let program = stream_content(&parsed, 11);
    assert!(text.contains(&format!("/Length1 {} ", program.len())));

    let original_data = std::fs::read(sample_font_path()).unwrap();
    let original = ttf_parser::Face::parse(&original_data, 0).unwrap();
    let subset = ttf_parser::Face::parse(&program, 0).expect("Subset is a valid font");
    // Missing glyph plus the five used code points
    assert_eq!(subset.number_of_glyphs(), 6);

    for c in "Hé Wπ".chars() {
        let cid = c as usize;
        let gid = u16::from_be_bytes([map[2 * cid], map[2 * cid + 1]]);
        assert_ne!(gid, 0, "{c} has no glyph in the subset");
        let glyph = original.glyph_index(c).expect("glyph in the original font");
        assert_eq!(
            subset.glyph_hor_advance(ttf_parser::GlyphId(gid)),
            original.glyph_hor_advance(glyph),
            "advance of {c}"
        );
    }
    // Unused characters stay on the missing glyph
    assert_eq!(&map[2 * 65..2 * 65 + 2], &[0, 0]);
}
