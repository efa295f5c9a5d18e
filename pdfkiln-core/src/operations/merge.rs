//! Merging several documents into one

use super::{open_input, PageRange};
use crate::document::{Document, InsertOptions, Metadata, SaveOptions, TocEntry};
use crate::error::{PdfError, Result};
use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// One document to merge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeInput {
    #[serde(with = "crate::render::base64_bytes")]
    pub data: Vec<u8>,
    pub pages: PageRange,
    /// Tried when the document is encrypted
    pub password: Option<String>,
}

impl MergeInput {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn with_pages(mut self, pages: PageRange) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// Where the merged document's information dictionary comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataMode {
    #[default]
    FromFirst,
    /// Zero-based input index
    FromDocument(usize),
    Custom {
        title: Option<String>,
        author: Option<String>,
        subject: Option<String>,
        keywords: Option<String>,
    },
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Carry over outlines, pointing at the merged page positions
    pub preserve_bookmarks: bool,
    pub metadata_mode: MetadataMode,
    /// Save with full garbage collection and compression
    pub optimize: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            preserve_bookmarks: true,
            metadata_mode: MetadataMode::FromFirst,
            optimize: false,
        }
    }
}

/// Concatenate the selected pages of every input, in input order
pub fn merge_documents(
    session: &Session,
    inputs: &[MergeInput],
    options: &MergeOptions,
) -> Result<Vec<u8>> {
    if inputs.is_empty() {
        return Err(PdfError::NoInput);
    }
    if let MetadataMode::FromDocument(index) = options.metadata_mode {
        if index >= inputs.len() {
            return Err(PdfError::InvalidOptions(format!(
                "metadata source {index} out of range ({} inputs)",
                inputs.len()
            )));
        }
    }

    let mut merged = session.create()?;
    let mut toc = Vec::new();
    let mut metadata = None;
    for (position, input) in inputs.iter().enumerate() {
        let source = open_input(session, &input.data, input.password.as_deref())?;
        let selected = input.pages.indices(source.page_count()?)?;
        let offset = merged.page_count()?;

        if options.preserve_bookmarks {
            toc.extend(shifted_toc(&source, &selected, offset)?);
        }
        let wanted = match options.metadata_mode {
            MetadataMode::FromFirst => position == 0,
            MetadataMode::FromDocument(index) => position == index,
            _ => false,
        };
        if wanted {
            metadata = Some(source.metadata()?);
        }

        merged.insert_pdf(
            &source,
            &InsertOptions {
                pages: PageRange::List(selected.clone()),
                start_at: None,
            },
        )?;
        debug!(input = position, pages = selected.len(), "merged input");
    }

    if let MetadataMode::Custom {
        title,
        author,
        subject,
        keywords,
    } = &options.metadata_mode
    {
        metadata = Some(Metadata {
            title: title.clone(),
            author: author.clone(),
            subject: subject.clone(),
            keywords: keywords.clone(),
            ..Default::default()
        });
    }
    if let Some(mut metadata) = metadata {
        // The merged file gets its own producer
        metadata.producer = None;
        merged.set_metadata(&metadata)?;
    }
    if !toc.is_empty() {
        merged.set_toc(&toc)?;
    }

    let save = if options.optimize {
        SaveOptions::compact()
    } else {
        SaveOptions {
            garbage: 1,
            ..Default::default()
        }
    };
    let bytes = merged.save(&save)?;
    info!(
        inputs = inputs.len(),
        pages = merged.page_count()?,
        bytes = bytes.len(),
        "merge complete"
    );
    Ok(bytes)
}

/// Outline of `source` restricted to the selected pages and renumbered to
/// their merged positions. Entries whose page was not selected keep their
/// title but lose the target.
fn shifted_toc(source: &Document, selected: &[usize], offset: usize) -> Result<Vec<TocEntry>> {
    let positions: HashMap<usize, usize> = selected
        .iter()
        .enumerate()
        .map(|(i, &page)| (page, offset + i))
        .rev()
        .collect();
    Ok(source
        .toc()?
        .into_iter()
        .map(|entry| TocEntry {
            page: entry.page.and_then(|p| positions.get(&p).copied()),
            ..entry
        })
        .collect())
}
