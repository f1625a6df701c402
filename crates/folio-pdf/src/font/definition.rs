//! Side-car metric definitions for core and 8-bit embedded fonts

use crate::{PdfError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Font program type described by a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefinitionKind {
    /// One of the standard fonts every viewer provides
    Core,
    /// Embedded Type1 program
    Type1,
    /// Embedded TrueType program with an 8-bit encoding
    TrueType,
}

/// Font descriptor entries, in 1/1000 em
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontDescriptor {
    pub ascent: i32,
    pub descent: i32,
    pub cap_height: i32,
    pub flags: u32,
    pub font_bbox: [i32; 4],
    pub italic_angle: i32,
    pub stem_v: i32,
    pub missing_width: u16,
}

impl Default for FontDescriptor {
    fn default() -> Self {
        Self {
            ascent: 800,
            descent: -200,
            cap_height: 700,
            flags: 32,
            font_bbox: [0, -200, 1000, 900],
            italic_angle: 0,
            stem_v: 70,
            missing_width: 500,
        }
    }
}

impl FontDescriptor {
    /// Descriptor entries as written inside a `/FontDescriptor` dictionary
    pub(crate) fn to_pdf_entries(&self, flags: u32) -> String {
        let [x0, y0, x1, y1] = self.font_bbox;
        format!(
            "/Ascent {} /Descent {} /CapHeight {} /Flags {flags} /FontBBox [{x0} {y0} {x1} {y1}] /ItalicAngle {} /StemV {} /MissingWidth {}",
            self.ascent, self.descent, self.cap_height, self.italic_angle, self.stem_v, self.missing_width
        )
    }
}

fn default_underline_position() -> i32 {
    -100
}

fn default_underline_thickness() -> i32 {
    50
}

/// Metrics and embedding data for a core or 8-bit font
///
/// # Example
/// ```ignore
/// {
///   "type": "TrueType",
///   "name": "DejaVuSans",
///   "desc": {"ascent": 928, "descent": -236, "flags": 32, ...},
///   "up": -63, "ut": 44,
///   "cw": [600, 600, ...],
///   "enc": "cp1252",
///   "file": "DejaVuSans.z",
///   "original_size": 622280
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontDefinition {
    #[serde(rename = "type")]
    pub kind: DefinitionKind,
    /// Base font name
    pub name: String,
    #[serde(default)]
    pub desc: FontDescriptor,
    /// Underline position
    #[serde(default = "default_underline_position")]
    pub up: i32,
    /// Underline thickness
    #[serde(default = "default_underline_thickness")]
    pub ut: i32,
    /// Glyph widths for byte values 0..=255
    pub cw: Vec<u16>,
    /// Encoding name; its presence adds an `/Encoding` entry
    #[serde(default)]
    pub enc: Option<String>,
    /// `/Differences` array body relative to WinAnsiEncoding
    #[serde(default)]
    pub diff: Option<String>,
    /// Font program, relative to the definition's directory
    #[serde(default)]
    pub file: Option<String>,
    /// Type1 clear-text segment length
    #[serde(default)]
    pub size1: Option<u32>,
    /// Type1 binary segment length
    #[serde(default)]
    pub size2: Option<u32>,
    /// TrueType program length before compression
    #[serde(default)]
    pub original_size: Option<u32>,
}

impl FontDefinition {
    /// Parse and validate a JSON definition
    pub fn from_json(json: &str) -> Result<Self> {
        let definition: FontDefinition = serde_json::from_str(json)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Read a definition file
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            PdfError::FontDefinitionError(format!("{}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<()> {
        if self.cw.len() != 256 {
            return Err(PdfError::FontDefinitionError(format!(
                "{}: expected 256 widths, found {}",
                self.name,
                self.cw.len()
            )));
        }
        if self.kind != DefinitionKind::Core && self.file.is_some() {
            let length1 = match self.kind {
                DefinitionKind::Type1 => self.size1,
                _ => self.original_size,
            };
            if length1.is_none() {
                return Err(PdfError::FontDefinitionError(format!(
                    "{}: embedded program without its length",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Built-in Courier metrics for a font key such as `courier` or `courierBI`
    pub fn courier(key: &str) -> Option<Self> {
        let name = match key {
            "courier" => "Courier",
            "courierB" => "Courier-Bold",
            "courierI" => "Courier-Oblique",
            "courierBI" => "Courier-BoldOblique",
            _ => return None,
        };
        Some(Self {
            kind: DefinitionKind::Core,
            name: name.to_string(),
            desc: FontDescriptor::default(),
            up: -100,
            ut: 50,
            cw: vec![600; 256],
            enc: None,
            diff: None,
            file: None,
            size1: None,
            size2: None,
            original_size: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn widths_json() -> String {
        let widths: Vec<String> = (0..256).map(|i| (500 + i % 7).to_string()).collect();
        format!("[{}]", widths.join(","))
    }

    #[test]
    fn test_parse_truetype_definition() {
        let json = format!(
            r#"{{"type": "TrueType", "name": "Sample", "cw": {}, "enc": "cp1252",
                "diff": "128 /Euro", "file": "sample.z", "original_size": 1234,
                "desc": {{"ascent": 900, "flags": 32}}}}"#,
            widths_json()
        );
        let def = FontDefinition::from_json(&json).unwrap();
        assert_eq!(def.kind, DefinitionKind::TrueType);
        assert_eq!(def.cw[1], 501);
        assert_eq!(def.desc.ascent, 900);
        assert_eq!(def.desc.missing_width, 500);
        assert_eq!(def.up, -100);
        assert_eq!(def.diff.as_deref(), Some("128 /Euro"));
    }

    #[test]
    fn test_reject_short_width_table() {
        let json = r#"{"type": "Core", "name": "Broken", "cw": [600, 600]}"#;
        let err = FontDefinition::from_json(json).unwrap_err();
        assert!(matches!(err, PdfError::FontDefinitionError(_)));
    }

    #[test]
    fn test_reject_program_without_length() {
        let json = format!(
            r#"{{"type": "Type1", "name": "NoLen", "cw": {}, "file": "x.pfb"}}"#,
            widths_json()
        );
        assert!(FontDefinition::from_json(&json).is_err());
    }

    #[test]
    fn test_courier_builtin() {
        let def = FontDefinition::courier("courierBI").unwrap();
        assert_eq!(def.name, "Courier-BoldOblique");
        assert!(def.cw.iter().all(|w| *w == 600));
        assert!(FontDefinition::courier("helvetica").is_none());
    }

    #[test]
    fn test_descriptor_entries() {
        let entries = FontDescriptor::default().to_pdf_entries(36);
        assert_eq!(
            entries,
            "/Ascent 800 /Descent -200 /CapHeight 700 /Flags 36 /FontBBox [0 -200 1000 900] /ItalicAngle 0 /StemV 70 /MissingWidth 500"
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = FontDefinition::load(Path::new("/nonexistent/font.json")).unwrap_err();
        assert!(matches!(err, PdfError::FontDefinitionError(_)));
    }
}
