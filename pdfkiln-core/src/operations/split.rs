//! Splitting one document into several

use super::{open_input, PageRange};
use crate::document::{Metadata, SaveOptions};
use crate::error::{PdfError, Result};
use crate::session::Session;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitMode {
    /// One output per page
    EachPage,
    /// Consecutive runs of N pages; the last may be shorter
    Chunks(usize),
    /// One output per range
    Ranges(Vec<PageRange>),
    /// Start a new output before each listed zero-based page
    SplitAt(Vec<usize>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitOptions {
    pub mode: SplitMode,
    /// Copy the information dictionary into every part
    pub preserve_metadata: bool,
    pub optimize: bool,
    pub password: Option<String>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            mode: SplitMode::EachPage,
            preserve_metadata: true,
            optimize: false,
            password: None,
        }
    }
}

impl SplitOptions {
    pub fn new(mode: SplitMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }
}

/// Page index groups, one per output
fn groups(mode: &SplitMode, total: usize) -> Result<Vec<Vec<usize>>> {
    match mode {
        SplitMode::EachPage => Ok((0..total).map(|i| vec![i]).collect()),
        SplitMode::Chunks(0) => Err(PdfError::InvalidOptions(
            "chunk size must be positive".to_string(),
        )),
        SplitMode::Chunks(size) => Ok((0..total)
            .collect::<Vec<_>>()
            .chunks(*size)
            .map(<[usize]>::to_vec)
            .collect()),
        SplitMode::Ranges(ranges) => ranges.iter().map(|r| r.indices(total)).collect(),
        SplitMode::SplitAt(points) => {
            let mut points: Vec<usize> = points.clone();
            points.sort_unstable();
            points.dedup();
            if let Some(&index) = points.iter().find(|&&p| p >= total) {
                return Err(PdfError::PageIndexOutOfBounds { index, count: total });
            }
            let mut groups = Vec::new();
            let mut start = 0;
            for point in points.into_iter().chain(std::iter::once(total)) {
                if point > start {
                    groups.push((start..point).collect());
                }
                start = point;
            }
            Ok(groups)
        }
    }
}

pub fn split_document(session: &Session, input: &[u8], options: &SplitOptions) -> Result<Vec<Vec<u8>>> {
    let source = open_input(session, input, options.password.as_deref())?;
    let total = source.page_count()?;
    if total == 0 {
        return Err(PdfError::InvalidPageRange("document has no pages".to_string()));
    }
    let groups = groups(&options.mode, total)?;
    let metadata = if options.preserve_metadata {
        source.metadata()?
    } else {
        Metadata::default()
    };
    // Decrypted once; every part starts from this copy
    let plain = source.to_bytes()?;
    let save = if options.optimize {
        SaveOptions::compact()
    } else {
        SaveOptions {
            garbage: 1,
            ..Default::default()
        }
    };

    let mut parts = Vec::with_capacity(groups.len());
    for (n, pages) in groups.iter().enumerate() {
        let mut part = session.open(plain.clone())?;
        part.select(pages)?;
        part.set_metadata(&Metadata {
            producer: None,
            ..metadata.clone()
        })?;
        parts.push(part.save(&save)?);
        debug!(part = n, pages = pages.len(), "split part written");
    }
    info!(pages = total, parts = parts.len(), "split complete");
    Ok(parts)
}
