//! Session configuration

use crate::error::{PdfError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_SCRATCH_DIR: &str = "PDFKILN_SCRATCH_DIR";
pub const ENV_GHOSTSCRIPT: &str = "PDFKILN_GHOSTSCRIPT";
pub const ENV_PDFIUM_LIB: &str = "PDFKILN_PDFIUM_LIB";
pub const ENV_DEFAULT_DPI: &str = "PDFKILN_DEFAULT_DPI";

/// Settings shared by every operation of a [`Session`](crate::Session)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Parent directory for the session scratch area; the system temp dir
    /// when unset
    pub scratch_root: Option<PathBuf>,
    /// Ghostscript executable used for colour normalisation
    pub ghostscript: Option<PathBuf>,
    /// PDFium shared library, only consulted with the `pdfium` feature
    pub pdfium_library: Option<PathBuf>,
    pub default_dpi: u32,
    pub max_dpi: u32,
    /// Written into `/Producer` on every save
    pub producer: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scratch_root: None,
            ghostscript: None,
            pdfium_library: None,
            default_dpi: 150,
            max_dpi: 600,
            producer: format!("pdfkiln {}", crate::VERSION),
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `PDFKILN_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(ENV_SCRATCH_DIR) {
            config.scratch_root = Some(PathBuf::from(dir));
        }
        if let Some(gs) = std::env::var_os(ENV_GHOSTSCRIPT) {
            config.ghostscript = Some(PathBuf::from(gs));
        }
        if let Some(lib) = std::env::var_os(ENV_PDFIUM_LIB) {
            config.pdfium_library = Some(PathBuf::from(lib));
        }
        if let Ok(dpi) = std::env::var(ENV_DEFAULT_DPI) {
            config.default_dpi = dpi.trim().parse().map_err(|_| {
                PdfError::InvalidOptions(format!("{ENV_DEFAULT_DPI} is not a number: {dpi}"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_dpi == 0 || self.max_dpi == 0 {
            return Err(PdfError::InvalidOptions("dpi must be positive".to_string()));
        }
        if self.default_dpi > self.max_dpi {
            return Err(PdfError::InvalidOptions(format!(
                "default dpi {} exceeds max dpi {}",
                self.default_dpi, self.max_dpi
            )));
        }
        Ok(())
    }

    pub fn with_scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(dir.into());
        self
    }

    pub fn with_ghostscript(mut self, path: impl Into<PathBuf>) -> Self {
        self.ghostscript = Some(path.into());
        self
    }

    /// Resolve a requested resolution against the configured bounds
    pub fn effective_dpi(&self, requested: Option<u32>) -> Result<u32> {
        let dpi = requested.unwrap_or(self.default_dpi);
        if dpi == 0 || dpi > self.max_dpi {
            return Err(PdfError::InvalidOptions(format!(
                "dpi {dpi} outside 1..={}",
                self.max_dpi
            )));
        }
        Ok(dpi)
    }
}
