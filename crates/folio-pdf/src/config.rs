//! Document configuration: units, page geometry and display preferences

use crate::{PdfError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Measurement unit used by every coordinate passed to the document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Pt,
    #[default]
    Mm,
    Cm,
    In,
}

impl Unit {
    /// Number of points per unit
    pub fn scale_factor(self) -> f64 {
        match self {
            Unit::Pt => 1.0,
            Unit::Mm => 72.0 / 25.4,
            Unit::Cm => 72.0 / 2.54,
            Unit::In => 72.0,
        }
    }
}

impl FromStr for Unit {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pt" => Ok(Unit::Pt),
            "mm" => Ok(Unit::Mm),
            "cm" => Ok(Unit::Cm),
            "in" => Ok(Unit::In),
            _ => Err(PdfError::InvalidUnit(s.to_string())),
        }
    }
}

/// Page orientation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl FromStr for Orientation {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "p" | "portrait" => Ok(Orientation::Portrait),
            "l" | "landscape" => Ok(Orientation::Landscape),
            _ => Err(PdfError::InvalidOrientation(s.to_string())),
        }
    }
}

/// Page format
///
/// Standard formats are defined in points; `Custom` dimensions are in user
/// units and are normalised so that the first value is the smaller one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
    Custom(f64, f64),
}

impl PageSize {
    /// Portrait dimensions in user units for the given scale factor
    pub fn dimensions(self, k: f64) -> (f64, f64) {
        let (w, h) = match self {
            PageSize::A3 => (841.89 / k, 1190.55 / k),
            PageSize::A4 => (595.28 / k, 841.89 / k),
            PageSize::A5 => (420.94 / k, 595.28 / k),
            PageSize::Letter => (612.0 / k, 792.0 / k),
            PageSize::Legal => (612.0 / k, 1008.0 / k),
            PageSize::Custom(w, h) => (w, h),
        };
        if w > h {
            (h, w)
        } else {
            (w, h)
        }
    }
}

impl FromStr for PageSize {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "a3" => Ok(PageSize::A3),
            "a4" => Ok(PageSize::A4),
            "a5" => Ok(PageSize::A5),
            "letter" => Ok(PageSize::Letter),
            "legal" => Ok(PageSize::Legal),
            _ => Err(PdfError::InvalidPageSize(s.to_string())),
        }
    }
}

/// Initial zoom used by the viewer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomMode {
    FullPage,
    FullWidth,
    Real,
    #[default]
    Default,
    /// Zoom factor in percent
    Percent(f64),
}

impl FromStr for ZoomMode {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fullpage" => Ok(ZoomMode::FullPage),
            "fullwidth" => Ok(ZoomMode::FullWidth),
            "real" => Ok(ZoomMode::Real),
            "default" => Ok(ZoomMode::Default),
            other => other
                .parse::<f64>()
                .ok()
                .filter(|z| *z > 0.0)
                .map(ZoomMode::Percent)
                .ok_or_else(|| PdfError::InvalidZoom(s.to_string())),
        }
    }
}

/// Page arrangement used by the viewer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    Single,
    Continuous,
    Two,
    #[default]
    Default,
}

impl FromStr for LayoutMode {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(LayoutMode::Single),
            "continuous" => Ok(LayoutMode::Continuous),
            "two" => Ok(LayoutMode::Two),
            "default" => Ok(LayoutMode::Default),
            _ => Err(PdfError::InvalidLayout(s.to_string())),
        }
    }
}

/// Settings fixed at document creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub unit: Unit,
    pub orientation: Orientation,
    pub page_size: PageSize,
    /// Compress page content streams with FlateDecode
    pub compress: bool,
    /// Version written in the file header
    pub pdf_version: String,
    /// Directory searched for font definitions and font programs
    pub font_dir: Option<PathBuf>,
    /// Directory holding cached TrueType metrics
    pub metrics_cache_dir: Option<PathBuf>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            unit: Unit::default(),
            orientation: Orientation::default(),
            page_size: PageSize::default(),
            compress: true,
            pdf_version: "1.3".to_string(),
            font_dir: None,
            metrics_cache_dir: None,
        }
    }
}

impl DocumentConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    ///
    /// # Example
    /// ```ignore
    /// let config = DocumentConfig::from_json(r#"{"unit": "pt", "page_size": "letter"}"#)?;
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scale_factors() {
        assert_eq!(Unit::Pt.scale_factor(), 1.0);
        assert_eq!(Unit::In.scale_factor(), 72.0);
        assert!((Unit::Mm.scale_factor() - 2.834645669).abs() < 1e-6);
        assert!((Unit::Cm.scale_factor() - 28.34645669).abs() < 1e-6);
    }

    #[test]
    fn test_parse_unit() {
        assert_eq!("MM".parse::<Unit>().unwrap(), Unit::Mm);
        let err = "furlong".parse::<Unit>().unwrap_err();
        assert!(matches!(err, PdfError::InvalidUnit(u) if u == "furlong"));
    }

    #[test]
    fn test_standard_sizes_in_points() {
        assert_eq!(PageSize::A4.dimensions(1.0), (595.28, 841.89));
        assert_eq!(PageSize::Letter.dimensions(1.0), (612.0, 792.0));
        let (w, h) = PageSize::A4.dimensions(Unit::Mm.scale_factor());
        assert!((w - 210.0).abs() < 0.01);
        assert!((h - 297.0).abs() < 0.01);
    }

    #[test]
    fn test_custom_size_normalised() {
        assert_eq!(PageSize::Custom(300.0, 100.0).dimensions(2.0), (100.0, 300.0));
    }

    #[test]
    fn test_parse_display_modes() {
        assert_eq!("fullpage".parse::<ZoomMode>().unwrap(), ZoomMode::FullPage);
        assert_eq!("150".parse::<ZoomMode>().unwrap(), ZoomMode::Percent(150.0));
        assert!("sideways".parse::<ZoomMode>().is_err());
        assert_eq!("two".parse::<LayoutMode>().unwrap(), LayoutMode::Two);
        assert!(matches!(
            "spread".parse::<LayoutMode>(),
            Err(PdfError::InvalidLayout(_))
        ));
        assert!(matches!(
            "diagonal".parse::<Orientation>(),
            Err(PdfError::InvalidOrientation(_))
        ));
        assert!(matches!(
            "b4".parse::<PageSize>(),
            Err(PdfError::InvalidPageSize(_))
        ));
    }

    #[test]
    fn test_config_from_json() {
        let config = DocumentConfig::from_json(
            r#"{"unit": "pt", "page_size": "letter", "orientation": "landscape", "compress": false}"#,
        )
        .unwrap();
        assert_eq!(config.unit, Unit::Pt);
        assert_eq!(config.page_size, PageSize::Letter);
        assert_eq!(config.orientation, Orientation::Landscape);
        assert!(!config.compress);
        assert_eq!(config.pdf_version, "1.3");
    }

    #[test]
    fn test_config_rejects_bad_unit() {
        assert!(DocumentConfig::from_json(r#"{"unit": "furlong"}"#).is_err());
    }
}
