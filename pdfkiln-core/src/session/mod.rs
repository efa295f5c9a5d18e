//! Entry point: a session owns configuration, the scratch workspace and the
//! external tools, and hands out documents

mod workspace;

pub use workspace::{ScratchFile, Workspace};

use crate::color::{ColorConverter, GhostscriptConverter};
use crate::config::SessionConfig;
use crate::document::Document;
use crate::error::{PdfError, Result};
use crate::operations::{
    self, ChunkOptions, CompressOptions, CompressionReport, ImagesToPdfOptions, LlmChunk,
    MarkdownOptions, MergeInput, MergeOptions, PageRange, PageText, RasterizeOptions,
    SplitOptions, TextToPdfOptions,
};
use crate::render::{PageRenderer, RenderOptions, RenderedPage, UnavailableRenderer};
use once_cell::sync::OnceCell;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Lazily initialised backend shared by all documents of a session.
/// External tools are not reentrant, so each sits behind a mutex.
pub struct Engine {
    workspace: Workspace,
    renderer: Mutex<Box<dyn PageRenderer>>,
    converter: Option<Mutex<Box<dyn ColorConverter>>>,
}

impl Engine {
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn render(
        &self,
        pdf: &[u8],
        page_index: usize,
        dpi: u32,
        options: &RenderOptions,
    ) -> Result<RenderedPage> {
        let renderer = self
            .renderer
            .lock()
            .map_err(|_| PdfError::Render("renderer lock poisoned".to_string()))?;
        renderer.render(pdf, page_index, dpi, options)
    }

    pub fn renderer_name(&self) -> String {
        self.renderer
            .lock()
            .map(|r| r.name().to_string())
            .unwrap_or_else(|_| "poisoned".to_string())
    }

    pub fn has_color_converter(&self) -> bool {
        self.converter.is_some()
    }

    /// Rewrite `pdf` with all colour in DeviceRGB. Input and output pass
    /// through the scratch directory and are removed on every path.
    pub fn convert_to_rgb(&self, pdf: &[u8]) -> Result<Vec<u8>> {
        let converter = self
            .converter
            .as_ref()
            .ok_or_else(|| PdfError::ColorConversion("no colour converter configured".to_string()))?;

        let input = self.workspace.stage("rgb-in", "pdf", pdf)?;
        let output = self.workspace.reserve("rgb-out", "pdf");
        {
            let converter = converter.lock().map_err(|_| {
                PdfError::ColorConversion("converter lock poisoned".to_string())
            })?;
            converter.to_rgb(input.path(), output.path())?;
        }
        if !self.workspace.exists(&output) {
            return Err(PdfError::ColorConversion(
                "converter produced no output".to_string(),
            ));
        }
        self.workspace.read(&output)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("workspace", &self.workspace.path())
            .field("renderer", &self.renderer_name())
            .field("color_converter", &self.has_color_converter())
            .finish()
    }
}

struct SessionInner {
    config: SessionConfig,
    engine: OnceCell<Engine>,
    renderer: Mutex<Option<Box<dyn PageRenderer>>>,
    converter: Mutex<Option<Box<dyn ColorConverter>>>,
    next_document: AtomicU64,
}

/// Cheap to clone; clones share the engine and the counters
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.inner.config)
            .field("engine", &self.inner.engine.get())
            .finish()
    }
}

/// Builder for sessions with injected tools
pub struct SessionBuilder {
    config: SessionConfig,
    renderer: Option<Box<dyn PageRenderer>>,
    converter: Option<Box<dyn ColorConverter>>,
}

impl SessionBuilder {
    pub fn renderer(mut self, renderer: Box<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn color_converter(mut self, converter: Box<dyn ColorConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn build(self) -> Session {
        Session {
            inner: Arc::new(SessionInner {
                config: self.config,
                engine: OnceCell::new(),
                renderer: Mutex::new(self.renderer),
                converter: Mutex::new(self.converter),
                next_document: AtomicU64::new(1),
            }),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: SessionConfig) -> SessionBuilder {
        SessionBuilder {
            config,
            renderer: None,
            converter: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.engine.get().is_some()
    }

    /// The engine, created on first use. Every caller sees the same
    /// instance; a failed initialisation is retried on the next call.
    pub fn engine(&self) -> Result<&Engine> {
        self.inner.engine.get_or_try_init(|| self.init_engine())
    }

    fn init_engine(&self) -> Result<Engine> {
        let config = &self.inner.config;
        config.validate()?;
        let workspace = Workspace::new(config.scratch_root.as_deref())?;

        let renderer = self
            .inner
            .renderer
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .unwrap_or_else(|| default_renderer(config));
        let converter = self
            .inner
            .converter
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .or_else(|| {
                config
                    .ghostscript
                    .as_ref()
                    .map(|gs| Box::new(GhostscriptConverter::new(gs)) as Box<dyn ColorConverter>)
            });

        info!(
            scratch = %workspace.path().display(),
            renderer = renderer.name(),
            color_converter = converter.as_ref().map(|c| c.name()).unwrap_or("none"),
            "engine initialised"
        );
        Ok(Engine {
            workspace,
            renderer: Mutex::new(renderer),
            converter: converter.map(Mutex::new),
        })
    }

    pub(crate) fn next_document_id(&self) -> u64 {
        self.inner.next_document.fetch_add(1, Ordering::Relaxed)
    }

    pub fn open(&self, bytes: impl Into<Vec<u8>>) -> Result<Document> {
        Document::from_bytes(self.clone(), bytes.into())
    }

    pub fn open_path(&self, path: impl AsRef<Path>) -> Result<Document> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening document");
        self.open(std::fs::read(path)?)
    }

    /// A new document without pages
    pub fn create(&self) -> Result<Document> {
        Ok(Document::new_empty(self.clone()))
    }

    pub fn merge(&self, inputs: &[MergeInput], options: &MergeOptions) -> Result<Vec<u8>> {
        operations::merge_documents(self, inputs, options)
    }

    pub fn split(&self, input: &[u8], options: &SplitOptions) -> Result<Vec<Vec<u8>>> {
        operations::split_document(self, input, options)
    }

    pub fn compress(&self, input: &[u8], options: &CompressOptions) -> Result<CompressionReport> {
        operations::compress_document(self, input, options)
    }

    pub fn rasterize(&self, input: &[u8], options: &RasterizeOptions) -> Result<Vec<RenderedPage>> {
        operations::rasterize_document(self, input, options)
    }

    /// Colour normalisation as a required step; errors propagate
    pub fn convert_to_rgb(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.engine()?.convert_to_rgb(input)
    }

    pub fn images_to_pdf(&self, images: &[Vec<u8>], options: &ImagesToPdfOptions) -> Result<Vec<u8>> {
        operations::images_to_pdf(self, images, options)
    }

    pub fn text_to_pdf(&self, text: &str, options: &TextToPdfOptions) -> Result<Vec<u8>> {
        operations::text_to_pdf(self, text, options)
    }

    pub fn extract_text(&self, input: &[u8], pages: &PageRange) -> Result<Vec<PageText>> {
        operations::extract_text(self, input, pages)
    }

    pub fn to_markdown(&self, input: &[u8], options: &MarkdownOptions) -> Result<String> {
        operations::to_markdown(self, input, options)
    }

    pub fn to_llm_chunks(&self, input: &[u8], options: &ChunkOptions) -> Result<Vec<LlmChunk>> {
        operations::to_llm_chunks(self, input, options)
    }
}

fn default_renderer(config: &SessionConfig) -> Box<dyn PageRenderer> {
    #[cfg(feature = "pdfium")]
    {
        match crate::render::PdfiumRenderer::load(config.pdfium_library.as_deref()) {
            Ok(renderer) => return Box::new(renderer),
            Err(err) => tracing::warn!(error = %err, "PDFium unavailable, rendering disabled"),
        }
    }
    #[cfg(not(feature = "pdfium"))]
    let _ = config;
    Box::new(UnavailableRenderer)
}
