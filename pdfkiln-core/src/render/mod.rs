//! Page rasterization
//!
//! Rendering is delegated to a [`PageRenderer`]. The crate ships a PDFium
//! backed implementation behind the `pdfium` feature and a [`MockRenderer`]
//! that produces blank pages of the right pixel size, for tests and for
//! hosts without a native renderer.

#[cfg(feature = "pdfium")]
mod pdfium;

#[cfg(feature = "pdfium")]
pub use self::pdfium::PdfiumRenderer;

use crate::error::{PdfError, Result};
use crate::geometry::Rect;
use crate::objects;
use base64::Engine as _;
use image::{ImageBuffer, Rgb, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Resolution; the session default when `None`
    pub dpi: Option<u32>,
    pub format: ImageFormat,
    /// JPEG quality, 1-100
    pub quality: u8,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            dpi: None,
            format: ImageFormat::Png,
            quality: 85,
        }
    }
}

impl RenderOptions {
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = Some(dpi);
        self
    }

    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }
}

/// One encoded page image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedPage {
    /// Zero-based page index
    pub page_index: usize,
    pub width: u32,
    pub height: u32,
    pub dpi: u32,
    pub format: ImageFormat,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl RenderedPage {
    /// `data:` URL suitable for embedding in HTML
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(&self.data)
        )
    }
}

pub(crate) mod base64_bytes {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(text)
            .map_err(serde::de::Error::custom)
    }
}

/// Trait for page rasterization backends
pub trait PageRenderer: Send {
    /// Render page `page_index` (zero-based) of the serialized document at
    /// `dpi`
    fn render(
        &self,
        pdf: &[u8],
        page_index: usize,
        dpi: u32,
        options: &RenderOptions,
    ) -> Result<RenderedPage>;

    fn name(&self) -> &str;
}

/// Pixel size of a page box at `dpi`, at least one pixel each way
pub fn pixel_size(page: &Rect, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / 72.0;
    let width = (page.width() * scale).round().max(1.0) as u32;
    let height = (page.height() * scale).round().max(1.0) as u32;
    (width, height)
}

/// Encode an RGBA buffer in the requested format. JPEG drops alpha.
pub fn encode_rgba(image: &RgbaImage, options: &RenderOptions) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    match options.format {
        ImageFormat::Png => {
            image.write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)?;
        }
        ImageFormat::Jpeg => {
            let rgb: RgbImage = ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
                let p = image.get_pixel(x, y);
                Rgb([p[0], p[1], p[2]])
            });
            encode_jpeg(&rgb, options.quality, &mut data)?;
        }
    }
    Ok(data)
}

fn encode_jpeg(image: &RgbImage, quality: u8, out: &mut Vec<u8>) -> Result<()> {
    let quality = quality.clamp(1, 100);
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(out, quality);
    encoder.encode_image(image)?;
    Ok(())
}

/// Renders every page as a plain white image of the correct size. Counts
/// calls so tests can assert that rendering was or was not attempted; clones
/// share the counter.
#[derive(Debug, Clone, Default)]
pub struct MockRenderer {
    calls: Arc<AtomicUsize>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PageRenderer for MockRenderer {
    fn render(
        &self,
        pdf: &[u8],
        page_index: usize,
        dpi: u32,
        options: &RenderOptions,
    ) -> Result<RenderedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let doc = lopdf::Document::load_mem(pdf)?;
        let pages = doc.get_pages();
        let page_id = *pages
            .values()
            .nth(page_index)
            .ok_or(PdfError::PageIndexOutOfBounds {
                index: page_index,
                count: pages.len(),
            })?;
        let media = objects::inherited_attribute(&doc, page_id, b"MediaBox")?
            .and_then(|value| value.as_array().ok().and_then(|a| Rect::from_objects(a)))
            .unwrap_or_else(Rect::letter);
        let rotated = objects::inherited_attribute(&doc, page_id, b"Rotate")?
            .and_then(|value| value.as_i64().ok())
            .map(|r| r.rem_euclid(360) % 180 != 0)
            .unwrap_or(false);

        let (mut width, mut height) = pixel_size(&media, dpi);
        if rotated {
            std::mem::swap(&mut width, &mut height);
        }
        let image = RgbaImage::from_pixel(width, height, image::Rgba([255, 255, 255, 255]));
        let data = encode_rgba(&image, options)?;

        Ok(RenderedPage {
            page_index,
            width,
            height,
            dpi,
            format: options.format,
            data,
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Renderer that always fails; stands in when no backend is configured
#[derive(Debug, Default)]
pub struct UnavailableRenderer;

impl PageRenderer for UnavailableRenderer {
    fn render(&self, _: &[u8], _: usize, _: u32, _: &RenderOptions) -> Result<RenderedPage> {
        Err(PdfError::RendererUnavailable)
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_size() {
        assert_eq!(pixel_size(&Rect::letter(), 72), (612, 792));
        assert_eq!(pixel_size(&Rect::letter(), 144), (1224, 1584));
        assert_eq!(pixel_size(&Rect::from_size(0.1, 0.1), 72), (1, 1));
    }

    #[test]
    fn test_encode_formats() {
        let image = RgbaImage::from_pixel(4, 3, image::Rgba([10, 20, 30, 255]));
        let png = encode_rgba(&image, &RenderOptions::default()).unwrap();
        assert_eq!(&png[..4], b"\x89PNG");

        let jpeg = encode_rgba(
            &image,
            &RenderOptions::default().with_format(ImageFormat::Jpeg),
        )
        .unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_rendered_page_serializes_as_base64() {
        let page = RenderedPage {
            page_index: 0,
            width: 1,
            height: 1,
            dpi: 72,
            format: ImageFormat::Png,
            data: vec![1, 2, 3],
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["data"], "AQID");
        assert_eq!(json["format"], "png");
        let back: RenderedPage = serde_json::from_value(json).unwrap();
        assert_eq!(back, page);
        assert_eq!(page.to_data_url(), "data:image/png;base64,AQID");
    }

    #[test]
    fn test_unavailable_renderer() {
        let result = UnavailableRenderer.render(b"", 0, 72, &RenderOptions::default());
        assert!(matches!(result, Err(PdfError::RendererUnavailable)));
    }
}
