use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF engine error: {0}")]
    Engine(#[from] lopdf::Error),

    #[error("Document is closed")]
    DocumentClosed,

    #[error("Page index {index} out of bounds (document has {count} pages)")]
    PageIndexOutOfBounds { index: usize, count: usize },

    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),

    #[error("No input documents")]
    NoInput,

    #[error("Document is encrypted and needs a password")]
    NeedsPassword,

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Layer {0} not found")]
    LayerNotFound(u32),

    #[error("Invalid PDF structure: {0}")]
    InvalidStructure(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("No page renderer configured")]
    RendererUnavailable,

    #[error("Color conversion failed: {0}")]
    ColorConversion(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PdfError {
    /// Precondition failures are raised before the engine is touched and are
    /// never worth retrying with the same arguments.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PdfError::DocumentClosed
                | PdfError::PageIndexOutOfBounds { .. }
                | PdfError::InvalidPageRange(_)
                | PdfError::NoInput
                | PdfError::NeedsPassword
                | PdfError::InvalidOptions(_)
        )
    }
}

impl From<image::ImageError> for PdfError {
    fn from(err: image::ImageError) -> Self {
        PdfError::InvalidImage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PdfError>;
