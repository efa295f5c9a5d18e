//! # pdfkiln
//!
//! PDF manipulation built on the `lopdf` object model: page editing, text
//! extraction, annotations, encryption, merge/split/compress, rasterization
//! through a pluggable renderer, and an optional-content (layer) editor
//! that keeps the `/Order` hierarchy consistent.
//!
//! ## Quick Start
//!
//! ```rust
//! use pdfkiln::{AddLayerOptions, Placement, Point, Session, TextStyle};
//!
//! # fn main() -> pdfkiln::Result<()> {
//! let session = Session::default();
//! let mut doc = session.create()?;
//! doc.new_page(None, 595.0, 842.0)?;
//! doc.page(0)?
//!     .insert_text(Point::new(72.0, 760.0), "Hello, layers", &TextStyle::default())?;
//!
//! let base = doc.add_layer("Base", &AddLayerOptions::default())?;
//! let notes = doc.add_layer("Notes", &AddLayerOptions::under(base.xref))?;
//! assert_eq!(notes.placement, Placement::Nested { parent: base.xref });
//!
//! let bytes = doc.save(&Default::default())?;
//! let reopened = session.open(bytes)?;
//! assert_eq!(reopened.layers()?[1].depth, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Sessions
//!
//! A [`Session`] owns configuration, the scratch directory and the
//! external tools (page renderer, colour converter). Tools are created on
//! first use and shared by every clone of the session.

pub mod color;
pub mod config;
pub mod document;
pub mod encryption;
pub mod error;
pub mod geometry;
pub mod objects;
pub mod ocg;
pub mod operations;
pub mod page;
pub mod render;
pub mod session;
pub mod text;

pub use color::{ColorConverter, GhostscriptConverter};
pub use config::SessionConfig;
pub use document::{Document, InsertOptions, Metadata, SaveOptions, TocEntry};
pub use encryption::{AuthResult, EncryptionMethod, EncryptionOptions, PermissionOptions, Permissions};
pub use error::{PdfError, Result};
pub use geometry::{Matrix, Point, Rect};
pub use ocg::{AddLayerOptions, AddedLayer, Layer, Placement};
pub use operations::{
    ChunkOptions, CompressOptions, CompressionReport, ImagesToPdfOptions, LlmChunk,
    MarkdownOptions, MergeInput, MergeOptions, MetadataMode, PageRange, PageSize, PageText,
    RasterizeOptions, SplitMode, SplitOptions, TextToPdfOptions,
};
pub use page::{
    Annotation, AnnotationKind, Color, Drawing, ExtractedImage, ImageInfo, Page, PathItem,
    StandardFont, TextStyle,
};
pub use render::{ImageFormat, MockRenderer, PageRenderer, RenderOptions, RenderedPage};
pub use session::Session;
pub use text::{SearchHit, TextLine};

/// Current version of pdfkiln
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
