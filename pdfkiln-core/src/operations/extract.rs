//! Text, Markdown and LLM chunk extraction

use super::{open_input, PageRange};
use crate::error::{PdfError, Result};
use crate::session::Session;
use crate::text::{self, TextLine};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub page_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownOptions {
    pub pages: PageRange,
    /// Number of distinct font sizes above body text that become headings
    pub heading_levels: u8,
    /// Put a horizontal rule between pages
    pub page_separators: bool,
    pub password: Option<String>,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            pages: PageRange::All,
            heading_levels: 3,
            page_separators: false,
            password: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkOptions {
    pub pages: PageRange,
    /// Upper bound on chunk length in characters
    pub max_chars: usize,
    /// Characters repeated from the end of the previous chunk
    pub overlap: usize,
    pub password: Option<String>,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            pages: PageRange::All,
            max_chars: 1500,
            overlap: 150,
            password: None,
        }
    }
}

/// A piece of document text sized for a language model context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmChunk {
    pub index: usize,
    pub text: String,
    /// Zero-based pages the chunk draws from
    pub pages: Vec<usize>,
    /// Closest heading above the chunk start
    pub heading: Option<String>,
    pub char_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum BlockKind {
    Heading(u8),
    Paragraph,
}

#[derive(Debug, Clone, PartialEq)]
struct Block {
    page: usize,
    kind: BlockKind,
    text: String,
}

pub fn extract_text(session: &Session, input: &[u8], pages: &PageRange) -> Result<Vec<PageText>> {
    let doc = open_input(session, input, None)?;
    let lo = doc.lo()?;
    let ids = doc.page_ids()?;
    pages
        .indices(ids.len())?
        .into_iter()
        .map(|page_index| {
            Ok(PageText {
                page_index,
                text: text::page_text(lo, ids[page_index])?,
            })
        })
        .collect()
}

pub fn to_markdown(session: &Session, input: &[u8], options: &MarkdownOptions) -> Result<String> {
    let pages = page_lines(session, input, &options.pages, options.password.as_deref())?;
    let blocks = blocks(&pages, options.heading_levels);

    let mut out = String::new();
    let mut last_page = None;
    for block in &blocks {
        if !out.is_empty() {
            let rule = options.page_separators && last_page.is_some_and(|p| p != block.page);
            out.push_str(if rule { "\n\n---\n\n" } else { "\n\n" });
        }
        last_page = Some(block.page);
        match block.kind {
            BlockKind::Heading(level) => {
                out.push_str(&"#".repeat(level as usize));
                out.push(' ');
                out.push_str(&block.text);
            }
            BlockKind::Paragraph => out.push_str(&block.text),
        }
    }
    if !out.is_empty() {
        out.push('\n');
    }
    debug!(blocks = blocks.len(), chars = out.len(), "converted to markdown");
    Ok(out)
}

pub fn to_llm_chunks(session: &Session, input: &[u8], options: &ChunkOptions) -> Result<Vec<LlmChunk>> {
    // Room for the carried overlap, a paragraph break and some new text
    if options.max_chars <= options.overlap + 2 {
        return Err(PdfError::InvalidOptions(format!(
            "chunk size {} must exceed overlap {} by more than 2",
            options.max_chars, options.overlap
        )));
    }
    let pages = page_lines(session, input, &options.pages, options.password.as_deref())?;
    let blocks = blocks(&pages, 3);

    let mut chunker = Chunker {
        options,
        chunks: Vec::new(),
        text: String::new(),
        pages: Vec::new(),
        heading: None,
        chunk_heading: None,
    };
    for block in &blocks {
        if let BlockKind::Heading(_) = block.kind {
            chunker.heading = Some(block.text.clone());
        }
        for piece in split_long(&block.text, options.max_chars - options.overlap - 2) {
            chunker.push(block.page, &piece);
        }
    }
    chunker.flush();
    debug!(chunks = chunker.chunks.len(), "built llm chunks");
    Ok(chunker.chunks)
}

struct Chunker<'a> {
    options: &'a ChunkOptions,
    chunks: Vec<LlmChunk>,
    text: String,
    pages: Vec<usize>,
    heading: Option<String>,
    chunk_heading: Option<String>,
}

impl Chunker<'_> {
    fn push(&mut self, page: usize, piece: &str) {
        let len = self.text.chars().count();
        let extra = piece.chars().count() + if len == 0 { 0 } else { 2 };
        if len > 0 && len + extra > self.options.max_chars {
            let carried = tail(&self.text, self.options.overlap);
            let carried_page = self.pages.last().copied();
            self.flush();
            if !carried.is_empty() {
                self.pages.extend(carried_page);
                self.chunk_heading = self.heading.clone();
            }
            self.text = carried;
        }
        if self.text.is_empty() {
            self.chunk_heading = self.heading.clone();
        } else {
            self.text.push_str("\n\n");
        }
        self.text.push_str(piece);
        if self.pages.last() != Some(&page) {
            self.pages.push(page);
        }
    }

    fn flush(&mut self) {
        if self.text.trim().is_empty() {
            self.text.clear();
            self.pages.clear();
            return;
        }
        let text = std::mem::take(&mut self.text);
        self.chunks.push(LlmChunk {
            index: self.chunks.len(),
            char_count: text.chars().count(),
            text,
            pages: std::mem::take(&mut self.pages),
            heading: self.chunk_heading.take(),
        });
    }
}

/// The last `count` chars of `text`, starting at a word boundary
fn tail(text: &str, count: usize) -> String {
    if count == 0 {
        return String::new();
    }
    let chars: Vec<char> = text.chars().collect();
    let start = chars.len().saturating_sub(count);
    let tail: String = chars[start..].iter().collect();
    if start == 0 {
        return tail;
    }
    match tail.find(char::is_whitespace) {
        Some(pos) => tail[pos..].trim_start().to_string(),
        None => tail,
    }
}

/// Split `text` into pieces of at most `limit` chars at whitespace
fn split_long(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let current_len = current.chars().count();
        if current_len > 0 && current_len + 1 + word_len > limit {
            pieces.push(std::mem::take(&mut current));
        }
        if word_len > limit {
            let chars: Vec<char> = word.chars().collect();
            for part in chars.chunks(limit) {
                pieces.push(part.iter().collect());
            }
            continue;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn page_lines(
    session: &Session,
    input: &[u8],
    range: &PageRange,
    password: Option<&str>,
) -> Result<Vec<(usize, Vec<TextLine>)>> {
    let doc = open_input(session, input, password)?;
    let lo = doc.lo()?;
    let ids = doc.page_ids()?;
    range
        .indices(ids.len())?
        .into_iter()
        .map(|index| Ok((index, text::page_lines(lo, ids[index])?)))
        .collect()
}

/// Font size key with half-point resolution
fn size_key(size: f32) -> i32 {
    (size * 2.0).round() as i32
}

/// Headings are lines set clearly larger than the body size, which is the
/// size carrying the most characters
fn blocks(pages: &[(usize, Vec<TextLine>)], heading_levels: u8) -> Vec<Block> {
    let mut weight: HashMap<i32, usize> = HashMap::new();
    for line in pages.iter().flat_map(|(_, lines)| lines) {
        *weight.entry(size_key(line.size)).or_default() += line.text.chars().count();
    }
    let Some(body) = weight
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
        .map(|(&key, _)| key)
    else {
        return Vec::new();
    };
    let threshold = (body as f32 * 1.15).ceil() as i32;
    let mut heading_sizes: Vec<i32> = weight.keys().copied().filter(|&k| k >= threshold).collect();
    heading_sizes.sort_unstable_by(|a, b| b.cmp(a));
    heading_sizes.truncate(heading_levels as usize);

    let mut blocks = Vec::new();
    for (page, lines) in pages {
        let mut paragraph: Option<(String, f32)> = None;
        for line in lines {
            let text = line.text.trim();
            if text.is_empty() {
                continue;
            }
            let level = heading_sizes.iter().position(|&k| k == size_key(line.size));
            if let Some(level) = level {
                if let Some((text, _)) = paragraph.take() {
                    blocks.push(Block { page: *page, kind: BlockKind::Paragraph, text });
                }
                blocks.push(Block {
                    page: *page,
                    kind: BlockKind::Heading(level as u8 + 1),
                    text: text.to_string(),
                });
                continue;
            }

            let text = match text.strip_prefix('•') {
                Some(rest) => format!("- {}", rest.trim_start()),
                None => text.to_string(),
            };
            paragraph = match paragraph.take() {
                Some((mut current, bottom)) => {
                    let gap = bottom - line.bbox.y1;
                    if gap > line.size * 0.5 || text.starts_with("- ") {
                        blocks.push(Block { page: *page, kind: BlockKind::Paragraph, text: current });
                        Some((text, line.bbox.y0))
                    } else {
                        current.push(' ');
                        current.push_str(&text);
                        Some((current, line.bbox.y0))
                    }
                }
                None => Some((text, line.bbox.y0)),
            };
        }
        if let Some((text, _)) = paragraph {
            blocks.push(Block { page: *page, kind: BlockKind::Paragraph, text });
        }
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::page::{StandardFont, TextStyle};
    use pretty_assertions::assert_eq;

    /// Page 1: title, two body paragraphs; page 2: section heading and body
    fn report(session: &Session) -> Vec<u8> {
        let mut doc = session.create().unwrap();
        doc.new_page(None, 400.0, 400.0).unwrap();
        doc.new_page(None, 400.0, 400.0).unwrap();
        let body = TextStyle::default().with_size(10.0);
        let title = TextStyle::default().with_size(20.0).with_font(StandardFont::HelveticaBold);
        {
            let mut page = doc.page(0).unwrap();
            page.insert_text(Point::new(20.0, 360.0), "Annual Report", &title).unwrap();
            page.insert_text(Point::new(20.0, 320.0), "Revenue grew\nacross regions.", &body)
                .unwrap();
            page.insert_text(Point::new(20.0, 260.0), "Costs fell.", &body).unwrap();
        }
        {
            let mut page = doc.page(1).unwrap();
            page.insert_text(Point::new(20.0, 360.0), "Outlook", &TextStyle::default().with_size(14.0))
                .unwrap();
            page.insert_text(Point::new(20.0, 330.0), "Stable demand is expected next year.", &body)
                .unwrap();
        }
        doc.to_bytes().unwrap()
    }

    #[test]
    fn test_extract_text_per_page() {
        let session = Session::default();
        let input = report(&session);
        let pages = extract_text(&session, &input, &PageRange::Single(1)).unwrap();
        assert_eq!(
            pages,
            vec![PageText {
                page_index: 1,
                text: "Outlook\nStable demand is expected next year.".to_string(),
            }]
        );
        assert!(extract_text(&session, &input, &PageRange::Single(2)).is_err());
    }

    #[test]
    fn test_markdown_headings_and_paragraphs() {
        let session = Session::default();
        let markdown = to_markdown(
            &session,
            &report(&session),
            &MarkdownOptions {
                page_separators: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            markdown,
            "# Annual Report\n\nRevenue grew across regions.\n\nCosts fell.\n\n---\n\n## Outlook\n\nStable demand is expected next year.\n"
        );
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let session = Session::default();
        let options = ChunkOptions {
            max_chars: 40,
            overlap: 10,
            ..Default::default()
        };
        let chunks = to_llm_chunks(&session, &report(&session), &options).unwrap();
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert!(chunk.char_count <= 40, "{chunk:?}");
            assert_eq!(chunk.char_count, chunk.text.chars().count());
        }
        assert_eq!(chunks[0].text, "Annual Report");
        assert_eq!(chunks[0].heading.as_deref(), Some("Annual Report"));
        assert_eq!(chunks[0].pages, vec![0]);
        let last = chunks.last().unwrap();
        assert!(last.text.ends_with("next year."));
        assert_eq!(last.heading.as_deref(), Some("Outlook"));
        assert_eq!(last.pages, vec![1]);
    }

    #[test]
    fn test_chunk_option_validation() {
        let session = Session::default();
        let options = ChunkOptions {
            max_chars: 10,
            overlap: 10,
            ..Default::default()
        };
        assert!(matches!(
            to_llm_chunks(&session, &report(&session), &options),
            Err(PdfError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_split_long_and_tail() {
        assert_eq!(split_long("aa bb cc", 5), vec!["aa bb", "cc"]);
        assert_eq!(split_long("abcdefg", 3), vec!["abc", "def", "g"]);
        assert_eq!(tail("one two three", 7), "three");
        assert_eq!(tail("short", 10), "short");
        assert_eq!(tail("short", 0), "");
    }
}
