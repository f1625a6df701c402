//! Image metadata for embedding JPEG and PNG files
//!
//! Pixel data is never decoded: JPEG files are embedded with DCTDecode and
//! PNG image data is passed through with its predictor parameters.

use crate::text::compress;
use crate::writer::ObjectWriter;
use crate::{PdfError, Result};
use std::path::Path;

/// Detected image format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ImageFormat {
    Jpeg,
    Png,
}

/// Detect image format from magic bytes
pub(crate) fn detect_format(data: &[u8]) -> Result<ImageFormat> {
    if data.len() < 8 {
        return Err(PdfError::ImageError("Image data too short".to_string()));
    }

    // JPEG starts with FF D8 FF
    if data[0] == 0xFF && data[1] == 0xD8 && data[2] == 0xFF {
        return Ok(ImageFormat::Jpeg);
    }

    if data[0..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
        return Ok(ImageFormat::Png);
    }

    Err(PdfError::UnsupportedImage("unknown image format".to_string()))
}

/// Colour space of the embedded samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette of RGB triplets
    Indexed,
}

impl ColorSpace {
    pub fn pdf_name(self) -> &'static str {
        match self {
            ColorSpace::Gray => "DeviceGray",
            ColorSpace::Rgb => "DeviceRGB",
            ColorSpace::Cmyk => "DeviceCMYK",
            ColorSpace::Indexed => "Indexed",
        }
    }
}

/// Everything needed to write an image XObject
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    pub color_space: ColorSpace,
    pub bits_per_component: u8,
    /// Filter name (`DCTDecode`, `FlateDecode`)
    pub filter: Option<String>,
    /// Complete `/DecodeParms` entry
    pub decode_parms: Option<String>,
    /// RGB palette for indexed images
    pub palette: Vec<u8>,
    /// Colour-key mask values, one per component
    pub transparency: Option<Vec<u8>>,
    /// Encoded sample data
    pub data: Vec<u8>,
}

/// JPEG frame header fields
#[derive(Debug, Clone, Copy)]
struct JpegInfo {
    width: u32,
    height: u32,
    precision: u8,
    num_components: u8,
}

/// Read the first SOF segment of a JPEG stream
fn get_jpeg_info(data: &[u8]) -> Result<JpegInfo> {
    // SOF segment: marker (2), length (2), precision (1), height (2), width (2), components (1)
    let mut i = 2;
    while i + 10 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }

        let marker = data[i + 1];

        if (0xC0..=0xCF).contains(&marker) && marker != 0xC4 && marker != 0xC8 && marker != 0xCC {
            return Ok(JpegInfo {
                precision: data[i + 4],
                height: u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32,
                width: u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32,
                num_components: data[i + 9],
            });
        }

        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        if length < 2 {
            break;
        }
        i += 2 + length;
    }

    Err(PdfError::ImageError("Could not parse JPEG info".to_string()))
}

/// Big-endian u32 at `at`
fn read_u32(data: &[u8], at: usize) -> Result<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| PdfError::ImageError("Unexpected end of PNG data".to_string()))
}

impl ImageInfo {
    /// Describe a JPEG file; the file itself becomes the stream body
    pub fn from_jpeg(data: &[u8]) -> Result<Self> {
        let info = get_jpeg_info(data)?;
        let color_space = match info.num_components {
            3 => ColorSpace::Rgb,
            4 => ColorSpace::Cmyk,
            _ => ColorSpace::Gray,
        };

        Ok(Self {
            width: info.width,
            height: info.height,
            color_space,
            bits_per_component: info.precision,
            filter: Some("DCTDecode".to_string()),
            decode_parms: None,
            palette: Vec::new(),
            transparency: None,
            data: data.to_vec(),
        })
    }

    /// Describe a PNG file, collecting its palette, mask and IDAT chunks
    pub fn from_png(data: &[u8]) -> Result<Self> {
        if detect_format(data)? != ImageFormat::Png {
            return Err(PdfError::ImageError("Not a PNG file".to_string()));
        }
        if data.get(12..16) != Some(b"IHDR".as_slice()) {
            return Err(PdfError::ImageError("Invalid PNG: IHDR not found".to_string()));
        }

        let width = read_u32(data, 16)?;
        let height = read_u32(data, 20)?;
        let header = data
            .get(24..29)
            .ok_or_else(|| PdfError::ImageError("PNG header too short".to_string()))?;
        let (bpc, color_type, compression, filter, interlace) =
            (header[0], header[1], header[2], header[3], header[4]);

        if bpc > 8 {
            return Err(PdfError::UnsupportedImage("16-bit depth".to_string()));
        }
        let color_space = match color_type {
            0 => ColorSpace::Gray,
            2 => ColorSpace::Rgb,
            3 => ColorSpace::Indexed,
            _ => return Err(PdfError::UnsupportedImage("alpha channel".to_string())),
        };
        if compression != 0 {
            return Err(PdfError::UnsupportedImage("unknown compression method".to_string()));
        }
        if filter != 0 {
            return Err(PdfError::UnsupportedImage("unknown filter method".to_string()));
        }
        if interlace != 0 {
            return Err(PdfError::UnsupportedImage("interlacing".to_string()));
        }

        let colors = if color_space == ColorSpace::Rgb { 3 } else { 1 };
        let decode_parms = format!(
            "/DecodeParms <</Predictor 15 /Colors {colors} /BitsPerComponent {bpc} /Columns {width}>>"
        );

        let mut palette = Vec::new();
        let mut transparency = None;
        let mut samples = Vec::new();
        // Signature (8) + IHDR chunk (25)
        let mut pos = 33;
        while pos + 8 <= data.len() {
            let length = read_u32(data, pos)? as usize;
            let kind = &data[pos + 4..pos + 8];
            let body = data
                .get(pos + 8..pos + 8 + length)
                .ok_or_else(|| PdfError::ImageError("Truncated PNG chunk".to_string()))?;
            match kind {
                b"PLTE" => palette = body.to_vec(),
                b"tRNS" => {
                    transparency = match color_type {
                        0 => body.get(1).map(|v| vec![*v]),
                        2 if body.len() >= 6 => Some(vec![body[1], body[3], body[5]]),
                        3 => body.iter().position(|a| *a == 0).map(|i| vec![i as u8]),
                        _ => None,
                    }
                }
                b"IDAT" => samples.extend_from_slice(body),
                b"IEND" => break,
                _ => {}
            }
            // Chunk header (8) + body + CRC (4)
            pos += 12 + length;
        }

        if color_space == ColorSpace::Indexed && palette.is_empty() {
            return Err(PdfError::ImageError("Missing palette".to_string()));
        }

        Ok(Self {
            width,
            height,
            color_space,
            bits_per_component: bpc,
            filter: Some("FlateDecode".to_string()),
            decode_parms: Some(decode_parms),
            palette,
            transparency,
            data: samples,
        })
    }

    /// Describe a JPEG or PNG image held in memory
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        match detect_format(data)? {
            ImageFormat::Jpeg => Self::from_jpeg(data),
            ImageFormat::Png => Self::from_png(data),
        }
    }

    /// Read and describe an image file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| {
            PdfError::ImageError(format!("Can't open image file {}: {e}", path.display()))
        })?;
        Self::from_bytes(&data)
    }
}

/// An image registered with the document
#[derive(Debug, Clone)]
pub(crate) struct RegisteredImage {
    pub index: usize,
    pub obj: u32,
    pub info: ImageInfo,
}

impl RegisteredImage {
    /// Write the image XObject and its palette
    pub fn put(&mut self, writer: &mut ObjectWriter, compress_palette: bool) -> Result<()> {
        let info = &self.info;
        self.obj = writer.new_obj();
        writer.out("<</Type /XObject");
        writer.out("/Subtype /Image");
        writer.out(format!("/Width {}", info.width));
        writer.out(format!("/Height {}", info.height));
        if info.color_space == ColorSpace::Indexed {
            writer.out(format!(
                "/ColorSpace [/Indexed /DeviceRGB {} {} 0 R]",
                (info.palette.len() / 3).saturating_sub(1),
                self.obj + 1
            ));
        } else {
            writer.out(format!("/ColorSpace /{}", info.color_space.pdf_name()));
            if info.color_space == ColorSpace::Cmyk {
                writer.out("/Decode [1 0 1 0 1 0 1 0]");
            }
        }
        writer.out(format!("/BitsPerComponent {}", info.bits_per_component));
        if let Some(filter) = &info.filter {
            writer.out(format!("/Filter /{filter}"));
        }
        if let Some(parms) = &info.decode_parms {
            writer.out(parms);
        }
        if let Some(mask) = &info.transparency {
            let values: Vec<String> = mask.iter().map(|v| format!("{v} {v}")).collect();
            writer.out(format!("/Mask [{}]", values.join(" ")));
        }
        writer.out(format!("/Length {}>>", info.data.len()));
        writer.put_stream(&info.data);
        writer.end_obj();

        if info.color_space == ColorSpace::Indexed {
            if compress_palette {
                let palette = compress(&info.palette)?;
                writer.put_stream_object("/Filter /FlateDecode ", &palette);
            } else {
                writer.put_stream_object("", &info.palette);
            }
        }
        Ok(())
    }

    /// Drop the sample data once the document has been written
    pub fn release(&mut self) {
        self.info.data = Vec::new();
        self.info.palette = Vec::new();
    }
}

/// Operators drawing image `/I<index>` in a box given in points
pub(crate) fn image_operator(index: usize, x: f64, y: f64, width: f64, height: f64) -> String {
    format!("q {width:.2} 0 0 {height:.2} {x:.2} {y:.2} cm /I{index} Do Q")
}
