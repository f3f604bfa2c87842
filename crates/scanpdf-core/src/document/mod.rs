//! Single-page PDF assembly.
//!
//! The page is sized to the scanned area: a raster of `w x h` pixels at `r`
//! dpi becomes a page of `w / r` by `h / r` inches with the image filling it.
//! An optional one-line annotation is drawn near the bottom-left corner.

pub mod raster;

pub use raster::{normalize, Raster, Samples};

use crate::device::session::DEFAULT_RESOLUTION;
use crate::device::ColorSpace;
use crate::error::{Error, Result};
use chrono::{DateTime, TimeZone};
use printpdf::{
    BuiltinFont, ImageCompression, ImageOptimizationOptions, Mm, Op, PdfDocument, PdfPage,
    PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImage, RawImageData, RawImageFormat, TextItem,
    XObjectTransform,
};
use std::fmt::Display;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Annotation font size in points
pub const ANNOTATION_FONT_SIZE: f32 = 10.0;

/// Horizontal annotation position as a fraction of the page width
const ANNOTATION_X: f32 = 0.06;

const MM_PER_INCH: f32 = 25.4;

/// Builds the annotation line: `Scanned: <local time>[ - <user>]`
pub fn annotation_text<Tz>(time: &DateTime<Tz>, user: Option<&str>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut text = format!("Scanned: {}", time.format("%c"));
    if let Some(user) = user {
        text.push_str(" - ");
        text.push_str(user);
    }
    text
}

/// Lays out one scanned raster as a PDF page
#[derive(Debug, Clone)]
pub struct PdfAssembler {
    title: String,
    resolution: f32,
    annotation: Option<String>,
}

impl Default for PdfAssembler {
    fn default() -> Self {
        Self {
            title: "Scanned page".to_string(),
            resolution: DEFAULT_RESOLUTION,
            annotation: None,
        }
    }
}

impl PdfAssembler {
    /// Creates an assembler for rasters scanned at `resolution` dpi
    pub fn new(resolution: f32) -> Self {
        Self::default().with_resolution(resolution)
    }

    /// Sets the scan resolution; unusable values fall back to 72 dpi
    pub fn with_resolution(mut self, resolution: f32) -> Self {
        self.resolution = if resolution.is_finite() && resolution > 0.0 {
            resolution
        } else {
            warn!(
                "Ignoring resolution {}, using {} dpi",
                resolution, DEFAULT_RESOLUTION
            );
            DEFAULT_RESOLUTION
        };
        self
    }

    /// Sets the document title metadata
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the text drawn on the page, if any
    pub fn with_annotation(mut self, annotation: Option<String>) -> Self {
        self.annotation = annotation;
        self
    }

    /// Page dimensions for a raster
    pub fn page_size(&self, raster: &Raster) -> (Mm, Mm) {
        let to_mm = |pixels: usize| Mm(pixels as f32 / self.resolution * MM_PER_INCH);
        (to_mm(raster.width), to_mm(raster.height))
    }

    /// Serializes the raster as a one-page PDF
    pub fn render(&self, raster: Raster) -> Vec<u8> {
        let (page_w, page_h) = self.page_size(&raster);
        debug!(
            width = raster.width,
            height = raster.height,
            page_w_mm = page_w.0,
            page_h_mm = page_h.0,
            "Laying out page"
        );

        let data_format = match (raster.color_space, raster.samples.depth()) {
            (ColorSpace::Gray, 8) => RawImageFormat::R8,
            (ColorSpace::Rgb, 8) => RawImageFormat::RGB8,
            (ColorSpace::Gray, _) => RawImageFormat::R16,
            (ColorSpace::Rgb, _) => RawImageFormat::RGB16,
        };
        let pixels = match raster.samples {
            Samples::Eight(samples) => RawImageData::U8(samples),
            Samples::Sixteen(samples) => RawImageData::U16(samples),
        };
        let image = RawImage {
            pixels,
            width: raster.width,
            height: raster.height,
            data_format,
            tag: Vec::new(),
        };

        let mut doc = PdfDocument::new(&self.title);
        let image_id = doc.add_image(&image);

        let mut ops = vec![Op::UseXobject {
            id: image_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(0.0)),
                scale_x: None,
                scale_y: None,
                dpi: Some(self.resolution),
                rotate: None,
            },
        }];

        if let Some(text) = &self.annotation {
            ops.extend([
                Op::StartTextSection,
                Op::SetTextCursor {
                    pos: Point {
                        x: Pt(page_w.into_pt().0 * ANNOTATION_X),
                        y: Pt(ANNOTATION_FONT_SIZE * 0.5),
                    },
                },
                Op::SetFontSizeBuiltinFont {
                    size: Pt(ANNOTATION_FONT_SIZE),
                    font: BuiltinFont::Helvetica,
                },
                Op::WriteTextBuiltinFont {
                    items: vec![TextItem::Text(text.clone())],
                    font: BuiltinFont::Helvetica,
                },
                Op::EndTextSection,
            ]);
        }

        doc.with_pages(vec![PdfPage::new(page_w, page_h, ops)]);

        // Lossless and unscaled: the default image pass would downsample
        // large scans and re-encode color as JPEG
        let options = PdfSaveOptions {
            image_optimization: Some(ImageOptimizationOptions {
                quality: None,
                max_image_size: None,
                dither_greyscale: Some(false),
                convert_to_greyscale: Some(false),
                auto_optimize: Some(false),
                format: Some(ImageCompression::Flate),
            }),
            ..PdfSaveOptions::default()
        };

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let bytes = doc.save(&options, &mut warnings);
        for warning in &warnings {
            debug!("printpdf: {:?}", warning);
        }
        bytes
    }

    /// Renders the raster and writes the PDF to `path`
    pub fn write_to_file(&self, raster: Raster, path: &Path) -> Result<()> {
        let bytes = self.render(raster);
        fs::write(path, &bytes).map_err(|e| Error::file_write(path, e))?;
        info!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Local};
    use tempfile::TempDir;

    fn gray(width: usize, height: usize) -> Raster {
        Raster {
            width,
            height,
            color_space: ColorSpace::Gray,
            samples: Samples::Eight((0..width * height).map(|i| (i % 256) as u8).collect()),
        }
    }

    /// Reads back the dimensions and depth of the embedded image
    fn embedded_image(bytes: &[u8]) -> (i64, i64, i64) {
        let doc = lopdf::Document::load_mem(bytes).unwrap();
        doc.objects
            .values()
            .find_map(|object| match object {
                lopdf::Object::Stream(stream)
                    if stream.dict.get(b"Subtype").and_then(|s| s.as_name()).ok()
                        == Some(b"Image".as_slice()) =>
                {
                    let get = |key: &[u8]| stream.dict.get(key).unwrap().as_i64().unwrap();
                    Some((get(b"Width"), get(b"Height"), get(b"BitsPerComponent")))
                }
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_annotation_text() {
        let time = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 0)
            .unwrap();
        let expected = format!("Scanned: {}", time.format("%c"));

        assert_eq!(annotation_text(&time, None), expected);
        assert_eq!(
            annotation_text(&time, Some("alice")),
            format!("{} - alice", expected)
        );
        assert!(annotation_text(&Local::now(), None).starts_with("Scanned: "));
    }

    #[test]
    fn test_page_size_follows_resolution() {
        let raster = gray(300, 600);
        let (w, h) = PdfAssembler::new(300.0).page_size(&raster);
        assert!((w.0 - 25.4).abs() < 1e-3);
        assert!((h.0 - 50.8).abs() < 1e-3);

        let (w, _) = PdfAssembler::new(0.0).page_size(&raster);
        assert!((w.0 - 300.0 / 72.0 * 25.4).abs() < 1e-3);
    }

    #[test]
    fn test_render_single_page() {
        let bytes = PdfAssembler::new(75.0).render(gray(40, 30));
        assert!(bytes.starts_with(b"%PDF"));

        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert_eq!(embedded_image(&bytes), (40, 30, 8));
    }

    #[test]
    fn test_sixteen_bit_raster_embedded_at_full_depth() {
        let raster = Raster {
            width: 4,
            height: 2,
            color_space: ColorSpace::Gray,
            samples: Samples::Sixteen(vec![
                0, 0x1000, 0x8000, 0xFFFF, //
                0x0101, 0x2020, 0x4040, 0x8080,
            ]),
        };
        let bytes = PdfAssembler::new(100.0).render(raster);
        assert_eq!(embedded_image(&bytes), (4, 2, 16));

        let raster = Raster {
            width: 2,
            height: 2,
            color_space: ColorSpace::Rgb,
            samples: Samples::Sixteen(vec![0x7FFF; 2 * 2 * 3]),
        };
        let bytes = PdfAssembler::new(100.0).render(raster);
        assert_eq!(embedded_image(&bytes), (2, 2, 16));
    }

    #[test]
    fn test_large_scan_not_downsampled() {
        // 2400 x 1200 gray bytes is past printpdf's default 2 MB image budget
        let bytes = PdfAssembler::new(300.0).render(gray(2400, 1200));
        assert_eq!(embedded_image(&bytes), (2400, 1200, 8));
    }

    #[test]
    fn test_render_rgb_with_annotation() {
        let raster = Raster {
            width: 8,
            height: 4,
            color_space: ColorSpace::Rgb,
            samples: Samples::Eight(vec![0x80; 8 * 4 * 3]),
        };
        let bytes = PdfAssembler::new(150.0)
            .with_annotation(Some("Scanned: today - tester".into()))
            .render(raster);

        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_write_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("page.pdf");
        PdfAssembler::default()
            .write_to_file(gray(16, 16), &path)
            .unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(
            lopdf::Document::load_mem(&bytes).unwrap().get_pages().len(),
            1
        );
    }

    #[test]
    fn test_unwritable_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("page.pdf");
        let err = PdfAssembler::default()
            .write_to_file(gray(4, 4), &path)
            .unwrap_err();
        assert!(matches!(err, Error::FileWrite { .. }));
        assert!(!path.exists());
    }
}
