//! TrueType parsing and subsetting backend

use crate::{PdfError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use ttf_parser::{name_id, Face, GlyphId};

/// Metrics of a TrueType font, scaled to 1/1000 em
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrueTypeMetrics {
    /// PostScript name without spaces
    pub full_name: String,
    pub ascent: i32,
    pub descent: i32,
    pub cap_height: i32,
    pub flags: u32,
    pub bbox: [i32; 4],
    pub italic_angle: i32,
    pub stem_v: i32,
    /// Advance of the missing glyph, used for absent code points
    pub default_width: u16,
    pub underline_position: i32,
    pub underline_thickness: i32,
    /// Advance width per Unicode code point
    pub widths: BTreeMap<u32, u16>,
}

/// Result of subsetting a font program
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetProgram {
    /// The trimmed font program
    pub data: Vec<u8>,
    /// Glyph index inside the trimmed program for each used code point
    pub code_to_glyph: BTreeMap<u32, u16>,
}

/// Parses TrueType programs and extracts subsets
///
/// Implementations must be deterministic: the same bytes and code points
/// always give the same result.
pub trait TrueTypeBackend {
    /// Read metrics and per-code-point widths
    fn parse_metrics(&self, data: &[u8]) -> Result<TrueTypeMetrics>;

    /// Build a program holding only the glyphs of `used` (plus the missing glyph)
    fn subset(&self, data: &[u8], used: &BTreeSet<u32>) -> Result<SubsetProgram>;
}

/// Default backend built on `ttf-parser` and `subsetter`
#[derive(Debug, Clone, Copy, Default)]
pub struct TtfParserBackend;

fn parse_face(data: &[u8]) -> Result<Face<'_>> {
    Face::parse(data, 0).map_err(|e| PdfError::FontParseError(format!("{e:?}")))
}

fn face_name(face: &Face<'_>) -> Option<String> {
    [name_id::POST_SCRIPT_NAME, name_id::FULL_NAME, name_id::FAMILY]
        .iter()
        .find_map(|id| {
            face.names()
                .into_iter()
                .filter(|name| name.name_id == *id)
                .find_map(|name| name.to_string())
        })
}

impl TrueTypeBackend for TtfParserBackend {
    fn parse_metrics(&self, data: &[u8]) -> Result<TrueTypeMetrics> {
        let face = parse_face(data)?;
        let units_per_em = face.units_per_em() as f64;
        let scale = |value: f64| (value * 1000.0 / units_per_em).round() as i32;

        let full_name: String = face_name(&face)
            .unwrap_or_else(|| "TrueTypeFont".to_string())
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        let bounds = face.global_bounding_box();
        let ascent = scale(face.ascender() as f64);
        let descent = scale(face.descender() as f64);
        let cap_height = face
            .capital_height()
            .map(|h| scale(h as f64))
            .unwrap_or(ascent);
        let (underline_position, underline_thickness) = face
            .underline_metrics()
            .map(|m| (scale(m.position as f64), scale(m.thickness as f64)))
            .unwrap_or((-100, 50));

        let mut flags = 32;
        if face.is_monospaced() {
            flags |= 1;
        }
        if face.is_italic() {
            flags |= 64;
        }
        let weight = face.weight().to_number() as f64;
        let stem_v = 50 + (weight / 65.0).powi(2).round() as i32;

        let advance = |glyph: GlyphId| {
            face.glyph_hor_advance(glyph)
                .map(|a| scale(a as f64).max(0) as u16)
        };
        let default_width = advance(GlyphId(0)).unwrap_or(500);

        let mut widths = BTreeMap::new();
        for code in 1..=0xFFFF_u32 {
            let Some(c) = char::from_u32(code) else {
                continue;
            };
            if let Some(width) = face.glyph_index(c).and_then(advance) {
                widths.insert(code, width);
            }
        }

        log::debug!(
            "parsed TrueType metrics for {full_name}: {} code points",
            widths.len()
        );

        Ok(TrueTypeMetrics {
            full_name,
            ascent,
            descent,
            cap_height,
            flags,
            bbox: [
                scale(bounds.x_min as f64),
                scale(bounds.y_min as f64),
                scale(bounds.x_max as f64),
                scale(bounds.y_max as f64),
            ],
            italic_angle: face.italic_angle().unwrap_or(0.0).round() as i32,
            stem_v,
            default_width,
            underline_position,
            underline_thickness,
            widths,
        })
    }

    fn subset(&self, data: &[u8], used: &BTreeSet<u32>) -> Result<SubsetProgram> {
        let face = parse_face(data)?;
        let mut remapper = subsetter::GlyphRemapper::new();
        remapper.remap(0);

        let mut code_to_glyph = BTreeMap::new();
        for &code in used.iter().filter(|code| **code != 0) {
            let Some(c) = char::from_u32(code) else {
                continue;
            };
            if let Some(glyph) = face.glyph_index(c) {
                code_to_glyph.insert(code, remapper.remap(glyph.0));
            }
        }

        let data = subsetter::subset(data, 0, &remapper)
            .map_err(|e| PdfError::FontSubsetError(format!("{e:?}")))?;
        Ok(SubsetProgram {
            data,
            code_to_glyph,
        })
    }
}
