use super::{encode_rgba, PageRenderer, RenderOptions, RenderedPage};
use crate::error::{PdfError, Result};
use image::RgbaImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::info;

/// Rasterizes pages with a dynamically loaded PDFium library
pub struct PdfiumRenderer {
    pdfium: Pdfium,
}

impl PdfiumRenderer {
    /// Bind to the library in `dir`, or the system library when `None`
    pub fn load(dir: Option<&Path>) -> Result<Self> {
        let bindings = match dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PdfError::Render(format!("failed to bind to PDFium: {e}")))?;
        info!(source = ?dir, "PDFium bound");
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render(
        &self,
        pdf: &[u8],
        page_index: usize,
        dpi: u32,
        options: &RenderOptions,
    ) -> Result<RenderedPage> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| PdfError::Render(e.to_string()))?;
        let count = document.pages().len() as usize;
        if page_index >= count {
            return Err(PdfError::PageIndexOutOfBounds {
                index: page_index,
                count,
            });
        }
        let page = document
            .pages()
            .get(page_index as u16)
            .map_err(|e| PdfError::Render(e.to_string()))?;

        let scale = dpi as f32 / 72.0;
        let config = PdfRenderConfig::new()
            .set_target_width((page.width().value * scale).round() as i32)
            .set_maximum_height((page.height().value * scale).round() as i32);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| PdfError::Render(e.to_string()))?;

        let width = bitmap.width() as u32;
        let height = bitmap.height() as u32;
        let image = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
            .ok_or_else(|| PdfError::Render("bitmap size mismatch".to_string()))?;

        Ok(RenderedPage {
            page_index,
            width,
            height,
            dpi,
            format: options.format,
            data: encode_rgba(&image, options)?,
        })
    }

    fn name(&self) -> &str {
        "pdfium"
    }
}
