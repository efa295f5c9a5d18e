//! Stand-alone operations
//!
//! Each operation takes the owning [`Session`](crate::Session), a byte
//! input and an options struct whose fields default independently. They are
//! exposed as methods on the session; the free functions here are the
//! implementations.

mod compress;
mod convert;
mod extract;
mod merge;
mod rasterize;
mod split;

pub use compress::{compress_document, savings_percent, CompressOptions, CompressionReport};
pub use convert::{images_to_pdf, text_to_pdf, ImagesToPdfOptions, PageSize, TextToPdfOptions};
pub use extract::{
    extract_text, to_llm_chunks, to_markdown, ChunkOptions, LlmChunk, MarkdownOptions, PageText,
};
pub use merge::{merge_documents, MergeInput, MergeOptions, MetadataMode};
pub use rasterize::{rasterize_document, RasterizeOptions};
pub use split::{split_document, SplitMode, SplitOptions};

use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::session::Session;
use serde::{Deserialize, Serialize};

/// Page selection. Indices are zero-based; [`PageRange::parse`] reads the
/// one-based notation users type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageRange {
    #[default]
    All,
    Single(usize),
    /// Inclusive on both ends
    Range(usize, usize),
    List(Vec<usize>),
}

impl PageRange {
    /// Parse `all`, `3`, `2-5` or `1,3,5`. Page numbers start at 1.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(PageRange::All);
        }

        if s.contains(',') {
            let pages = s
                .split(',')
                .map(page_number)
                .collect::<Result<Vec<_>>>()?;
            return Ok(PageRange::List(pages));
        }

        if let Some((start, end)) = s.split_once('-') {
            let start = page_number(start)?;
            let end = page_number(end)?;
            if start > end {
                return Err(PdfError::InvalidPageRange(format!(
                    "start {} is greater than end {}",
                    start + 1,
                    end + 1
                )));
            }
            return Ok(PageRange::Range(start, end));
        }

        Ok(PageRange::Single(page_number(s)?))
    }

    /// Zero-based indices for a document of `total` pages, in selection
    /// order
    pub fn indices(&self, total: usize) -> Result<Vec<usize>> {
        let check = |index: usize| {
            if index >= total {
                Err(PdfError::PageIndexOutOfBounds {
                    index,
                    count: total,
                })
            } else {
                Ok(index)
            }
        };
        match self {
            PageRange::All => Ok((0..total).collect()),
            PageRange::Single(index) => Ok(vec![check(*index)?]),
            PageRange::Range(start, end) => {
                check(*start)?;
                check(*end)?;
                Ok((*start..=*end).collect())
            }
            PageRange::List(pages) => pages.iter().map(|&p| check(p)).collect(),
        }
    }
}

/// Open an input document, unlocking it with `password` when it needs one
pub(crate) fn open_input(session: &Session, data: &[u8], password: Option<&str>) -> Result<Document> {
    let mut doc = session.open(data.to_vec())?;
    if doc.needs_pass()? {
        if let Some(password) = password {
            doc.authenticate(password)?;
        }
        if doc.needs_pass()? {
            return Err(PdfError::NeedsPassword);
        }
    }
    Ok(doc)
}

fn page_number(text: &str) -> Result<usize> {
    let text = text.trim();
    match text.parse::<usize>() {
        Ok(0) => Err(PdfError::InvalidPageRange(
            "page numbers start at 1".to_string(),
        )),
        Ok(n) => Ok(n - 1),
        Err(_) => Err(PdfError::InvalidPageRange(format!("invalid page: {text}"))),
    }
}
