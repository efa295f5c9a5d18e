//! Conversion of images and plain text into PDF

use crate::document::{Metadata, SaveOptions};
use crate::error::{PdfError, Result};
use crate::geometry::{Point, Rect};
use crate::page::TextStyle;
use crate::session::Session;
use image::GenericImageView;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// The page takes the size of its content
    #[default]
    Fit,
    A4,
    Letter,
    /// Width and height in points
    Custom(f32, f32),
}

impl PageSize {
    fn rect(self) -> Option<Rect> {
        match self {
            PageSize::Fit => None,
            PageSize::A4 => Some(Rect::a4()),
            PageSize::Letter => Some(Rect::letter()),
            PageSize::Custom(w, h) => Some(Rect::from_size(w, h)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesToPdfOptions {
    pub page_size: PageSize,
    /// Blank border in points
    pub margin: f32,
    /// Pixel density assumed for [`PageSize::Fit`]
    pub image_dpi: f32,
    pub title: Option<String>,
}

impl Default for ImagesToPdfOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::Fit,
            margin: 0.0,
            image_dpi: 72.0,
            title: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextToPdfOptions {
    /// [`PageSize::Fit`] is treated as A4
    pub page_size: PageSize,
    pub margin: f32,
    pub style: TextStyle,
    pub title: Option<String>,
}

impl Default for TextToPdfOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            margin: 72.0,
            style: TextStyle::default(),
            title: None,
        }
    }
}

/// One page per image, in input order
pub fn images_to_pdf(
    session: &Session,
    images: &[Vec<u8>],
    options: &ImagesToPdfOptions,
) -> Result<Vec<u8>> {
    if images.is_empty() {
        return Err(PdfError::NoInput);
    }
    if options.margin < 0.0 || options.image_dpi <= 0.0 {
        return Err(PdfError::InvalidOptions(
            "margin must not be negative and image dpi must be positive".to_string(),
        ));
    }

    let mut doc = session.create()?;
    for (index, bytes) in images.iter().enumerate() {
        let (px_w, px_h) = image::load_from_memory(bytes)?.dimensions();
        let natural_w = px_w as f32 * 72.0 / options.image_dpi;
        let natural_h = px_h as f32 * 72.0 / options.image_dpi;

        let (page, placed) = match options.page_size.rect() {
            None => {
                let page = Rect::from_size(natural_w + 2.0 * options.margin, natural_h + 2.0 * options.margin);
                let placed = Rect::new(
                    options.margin,
                    options.margin,
                    options.margin + natural_w,
                    options.margin + natural_h,
                );
                (page, placed)
            }
            Some(page) => (page, fit_centered(&page, options.margin, natural_w, natural_h)?),
        };
        doc.new_page(None, page.width(), page.height())?;
        doc.page(index)?.insert_image(placed, bytes)?;
    }
    if let Some(title) = &options.title {
        doc.set_metadata(&Metadata {
            title: Some(title.clone()),
            ..Default::default()
        })?;
    }
    let bytes = doc.save(&SaveOptions::default())?;
    info!(images = images.len(), bytes = bytes.len(), "converted images to PDF");
    Ok(bytes)
}

/// Largest rectangle with the image's aspect ratio inside the page margins
fn fit_centered(page: &Rect, margin: f32, width: f32, height: f32) -> Result<Rect> {
    let avail_w = page.width() - 2.0 * margin;
    let avail_h = page.height() - 2.0 * margin;
    if avail_w <= 0.0 || avail_h <= 0.0 {
        return Err(PdfError::InvalidOptions(format!(
            "margin {margin} leaves no room on the page"
        )));
    }
    let scale = (avail_w / width).min(avail_h / height);
    let (w, h) = (width * scale, height * scale);
    let x = page.x0 + (page.width() - w) / 2.0;
    let y = page.y0 + (page.height() - h) / 2.0;
    Ok(Rect::new(x, y, x + w, y + h))
}

/// Typeset plain text in a standard font, wrapping at word boundaries and
/// starting new pages as needed
pub fn text_to_pdf(session: &Session, text: &str, options: &TextToPdfOptions) -> Result<Vec<u8>> {
    let page = options.page_size.rect().unwrap_or_else(Rect::a4);
    let style = &options.style;
    if style.size <= 0.0 || style.line_height <= 0.0 {
        return Err(PdfError::InvalidOptions(
            "font size and line height must be positive".to_string(),
        ));
    }
    let avail_w = page.width() - 2.0 * options.margin;
    let avail_h = page.height() - 2.0 * options.margin;
    let leading = style.size * style.line_height;
    if avail_w < style.size || avail_h < leading {
        return Err(PdfError::InvalidOptions(format!(
            "margin {} leaves no room for text",
            options.margin
        )));
    }

    let columns = ((avail_w / (style.font.average_width() * style.size)) as usize).max(1);
    let rows = ((avail_h / leading) as usize).max(1);
    let lines: Vec<String> = text.lines().flat_map(|line| wrap(line, columns)).collect();

    let mut doc = session.create()?;
    let chunks: Vec<&[String]> = if lines.is_empty() {
        vec![&lines[..]]
    } else {
        lines.chunks(rows).collect()
    };
    for (index, chunk) in chunks.iter().enumerate() {
        doc.new_page(None, page.width(), page.height())?;
        if chunk.iter().all(|l| l.is_empty()) {
            continue;
        }
        let origin = Point::new(options.margin, page.height() - options.margin - style.size);
        doc.page(index)?.insert_text(origin, &chunk.join("\n"), style)?;
    }
    if let Some(title) = &options.title {
        doc.set_metadata(&Metadata {
            title: Some(title.clone()),
            ..Default::default()
        })?;
    }
    let bytes = doc.save(&SaveOptions {
        deflate: true,
        ..Default::default()
    })?;
    info!(lines = lines.len(), pages = chunks.len(), "converted text to PDF");
    Ok(bytes)
}

/// Greedy word wrap to `columns` characters. Words longer than a line are
/// broken.
fn wrap(line: &str, columns: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > columns {
            if current_len > 0 {
                out.push(std::mem::take(&mut current));
                current_len = 0;
            }
            out.push(word.drain(..columns).collect());
        }
        if word.is_empty() {
            continue;
        }
        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > columns {
            out.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }
    if current_len > 0 || out.is_empty() {
        out.push(current);
    }
    out
}
