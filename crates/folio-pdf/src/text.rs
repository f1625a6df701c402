//! Text encoding and operator helpers

use crate::{Align, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

/// Windows-1252 code points 0x80..=0x9F that differ from Latin-1
const CP1252_HIGH: [(char, u8); 27] = [
    ('\u{20AC}', 0x80),
    ('\u{201A}', 0x82),
    ('\u{0192}', 0x83),
    ('\u{201E}', 0x84),
    ('\u{2026}', 0x85),
    ('\u{2020}', 0x86),
    ('\u{2021}', 0x87),
    ('\u{02C6}', 0x88),
    ('\u{2030}', 0x89),
    ('\u{0160}', 0x8A),
    ('\u{2039}', 0x8B),
    ('\u{0152}', 0x8C),
    ('\u{017D}', 0x8E),
    ('\u{2018}', 0x91),
    ('\u{2019}', 0x92),
    ('\u{201C}', 0x93),
    ('\u{201D}', 0x94),
    ('\u{2022}', 0x95),
    ('\u{2013}', 0x96),
    ('\u{2014}', 0x97),
    ('\u{02DC}', 0x98),
    ('\u{2122}', 0x99),
    ('\u{0161}', 0x9A),
    ('\u{203A}', 0x9B),
    ('\u{0153}', 0x9C),
    ('\u{017E}', 0x9E),
    ('\u{0178}', 0x9F),
];

/// Map one character to its Windows-1252 byte, `?` when unmappable
pub(crate) fn cp1252_byte(c: char) -> u8 {
    let cp = c as u32;
    if cp < 0x80 || (0xA0..=0xFF).contains(&cp) {
        return cp as u8;
    }
    CP1252_HIGH
        .iter()
        .find(|(ch, _)| *ch == c)
        .map(|(_, b)| *b)
        .unwrap_or(b'?')
}

/// Encode text for an 8-bit font
pub(crate) fn to_cp1252(text: &str) -> Vec<u8> {
    text.chars().map(cp1252_byte).collect()
}

/// Encode text as UTF-16BE code units, one per BMP code point
///
/// Characters outside the Basic Multilingual Plane cannot be addressed by a
/// 2-byte CID and are written as CID 0.
pub(crate) fn to_utf16be(text: &str, bom: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2 + 2);
    if bom {
        out.extend_from_slice(&[0xFE, 0xFF]);
    }
    for c in text.chars() {
        let cp = c as u32;
        let unit = if cp > 0xFFFF { 0 } else { cp as u16 };
        out.extend_from_slice(&unit.to_be_bytes());
    }
    out
}

/// Bytes for a metadata or link string: ASCII as is, anything else UTF-16BE with BOM
pub(crate) fn text_string_bytes(text: &str) -> Vec<u8> {
    if text.is_ascii() {
        text.as_bytes().to_vec()
    } else {
        to_utf16be(text, true)
    }
}

/// Escape special characters of a literal string
pub(crate) fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 8);
    for &b in data {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'(' => out.extend_from_slice(b"\\("),
            b')' => out.extend_from_slice(b"\\)"),
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(b),
        }
    }
    out
}

/// Replace every occurrence of `needle` in `haystack`
pub(crate) fn replace_bytes(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

/// Zlib-compress a stream body
pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Horizontal offset of text inside a cell
///
/// # Arguments
/// * `align` - Requested alignment
/// * `cell_width` - Width of the cell
/// * `text_width` - Width of the text
/// * `inner_margin` - Padding between the cell border and the text
pub(crate) fn cell_text_offset(
    align: Align,
    cell_width: f64,
    text_width: f64,
    inner_margin: f64,
) -> f64 {
    match align {
        Align::Right => cell_width - inner_margin - text_width,
        Align::Center => (cell_width - text_width) / 2.0,
        Align::Left | Align::Justify => inner_margin,
    }
}

/// Operators showing one literal string at a position (in points)
pub(crate) fn show_text_operator(x: f64, y: f64, escaped: &[u8]) -> Vec<u8> {
    let mut ops = format!("BT {x:.2} {y:.2} Td (").into_bytes();
    ops.extend_from_slice(escaped);
    ops.extend_from_slice(b") Tj ET");
    ops
}
