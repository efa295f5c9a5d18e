//! Whole-document rasterization

use super::{open_input, PageRange};
use crate::error::Result;
use crate::render::{ImageFormat, RenderOptions, RenderedPage};
use crate::session::Session;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterizeOptions {
    /// Resolution; the session default when `None`
    pub dpi: Option<u32>,
    pub format: ImageFormat,
    pub quality: u8,
    pub pages: PageRange,
    /// Convert colour to DeviceRGB before rendering when a converter is
    /// available. Conversion failures fall back to the original document.
    pub normalize_colors: bool,
    pub password: Option<String>,
}

impl Default for RasterizeOptions {
    fn default() -> Self {
        let render = RenderOptions::default();
        Self {
            dpi: render.dpi,
            format: render.format,
            quality: render.quality,
            pages: PageRange::All,
            normalize_colors: false,
            password: None,
        }
    }
}

pub fn rasterize_document(
    session: &Session,
    input: &[u8],
    options: &RasterizeOptions,
) -> Result<Vec<RenderedPage>> {
    let dpi = session.config().effective_dpi(options.dpi)?;
    let doc = open_input(session, input, options.password.as_deref())?;
    let indices = options.pages.indices(doc.page_count()?)?;
    let plain = doc.to_bytes()?;

    let engine = session.engine()?;
    let pdf = if options.normalize_colors && engine.has_color_converter() {
        match engine.convert_to_rgb(&plain) {
            Ok(converted) => converted,
            Err(err) => {
                warn!(error = %err, "colour normalisation failed, rendering original");
                plain
            }
        }
    } else {
        plain
    };

    let render = RenderOptions {
        dpi: Some(dpi),
        format: options.format,
        quality: options.quality,
    };
    let pages = indices
        .into_iter()
        .map(|index| engine.render(&pdf, index, dpi, &render))
        .collect::<Result<Vec<_>>>()?;
    debug!(pages = pages.len(), dpi, "rasterized document");
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{FailingConverter, PassthroughConverter};
    use crate::config::SessionConfig;
    use crate::error::PdfError;
    use crate::render::MockRenderer;
    use pretty_assertions::assert_eq;

    fn three_pages(session: &Session) -> Vec<u8> {
        let mut doc = session.create().unwrap();
        for width in [72.0, 144.0, 216.0] {
            doc.new_page(None, width, 72.0).unwrap();
        }
        doc.to_bytes().unwrap()
    }

    #[test]
    fn test_rasterize_selected_pages() {
        let renderer = MockRenderer::new();
        let session = Session::builder(SessionConfig::default())
            .renderer(Box::new(renderer.clone()))
            .build();
        let options = RasterizeOptions {
            dpi: Some(144),
            pages: PageRange::List(vec![2, 0]),
            ..Default::default()
        };
        let pages = rasterize_document(&session, &three_pages(&session), &options).unwrap();
        let sizes: Vec<(usize, u32, u32)> = pages.iter().map(|p| (p.page_index, p.width, p.height)).collect();
        assert_eq!(sizes, vec![(2, 432, 144), (0, 144, 144)]);
        assert_eq!(renderer.call_count(), 2);
    }

    #[test]
    fn test_failed_normalisation_falls_back() {
        let renderer = MockRenderer::new();
        let session = Session::builder(SessionConfig::default())
            .renderer(Box::new(renderer.clone()))
            .color_converter(Box::new(FailingConverter))
            .build();
        let options = RasterizeOptions {
            dpi: Some(72),
            normalize_colors: true,
            ..Default::default()
        };
        let pages = rasterize_document(&session, &three_pages(&session), &options).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(session.engine().unwrap().workspace().entry_count(), 0);
    }

    #[test]
    fn test_normalised_input_is_rendered() {
        let session = Session::builder(SessionConfig::default())
            .renderer(Box::new(MockRenderer::new()))
            .color_converter(Box::new(PassthroughConverter))
            .build();
        let options = RasterizeOptions {
            dpi: Some(72),
            normalize_colors: true,
            pages: PageRange::Single(1),
            ..Default::default()
        };
        let pages = rasterize_document(&session, &three_pages(&session), &options).unwrap();
        assert_eq!((pages[0].width, pages[0].height), (144, 72));
    }

    #[test]
    fn test_options_are_checked_before_rendering() {
        let renderer = MockRenderer::new();
        let session = Session::builder(SessionConfig::default())
            .renderer(Box::new(renderer.clone()))
            .build();
        let input = three_pages(&session);
        let too_fine = RasterizeOptions {
            dpi: Some(5000),
            ..Default::default()
        };
        assert!(matches!(
            rasterize_document(&session, &input, &too_fine),
            Err(PdfError::InvalidOptions(_))
        ));
        let out_of_range = RasterizeOptions {
            pages: PageRange::Single(3),
            ..Default::default()
        };
        assert!(matches!(
            rasterize_document(&session, &input, &out_of_range),
            Err(PdfError::PageIndexOutOfBounds { index: 3, count: 3 })
        ));
        assert_eq!(renderer.call_count(), 0);
        assert!(!session.is_initialized());
    }
}
