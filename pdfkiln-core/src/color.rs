//! Colour-space normalisation (CMYK and ICC based content to DeviceRGB)

use crate::error::{PdfError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Rewrites a PDF so that all colour is DeviceRGB
pub trait ColorConverter: Send {
    /// Read `input`, write the converted document to `output`
    fn to_rgb(&self, input: &Path, output: &Path) -> Result<()>;

    fn name(&self) -> &str;
}

/// Runs the Ghostscript `pdfwrite` device as a subprocess
#[derive(Debug, Clone)]
pub struct GhostscriptConverter {
    executable: PathBuf,
}

impl GhostscriptConverter {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    pub fn arguments(input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-dSAFER".to_string(),
            "-dBATCH".to_string(),
            "-dNOPAUSE".to_string(),
            "-sDEVICE=pdfwrite".to_string(),
            "-sColorConversionStrategy=RGB".to_string(),
            "-sProcessColorModel=DeviceRGB".to_string(),
            "-dOverrideICC=true".to_string(),
            format!("-sOutputFile={}", output.display()),
            input.display().to_string(),
        ]
    }
}

impl ColorConverter for GhostscriptConverter {
    fn to_rgb(&self, input: &Path, output: &Path) -> Result<()> {
        debug!(gs = %self.executable.display(), input = %input.display(), "running ghostscript");
        let result = Command::new(&self.executable)
            .args(Self::arguments(input, output))
            .output()
            .map_err(|e| {
                PdfError::ColorConversion(format!(
                    "failed to start {}: {e}",
                    self.executable.display()
                ))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(PdfError::ColorConversion(format!(
                "ghostscript exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }
        if !output.is_file() {
            return Err(PdfError::ColorConversion(
                "ghostscript produced no output file".to_string(),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ghostscript"
    }
}

/// Copies the input unchanged
#[derive(Debug, Default, Clone)]
pub struct PassthroughConverter;

impl ColorConverter for PassthroughConverter {
    fn to_rgb(&self, input: &Path, output: &Path) -> Result<()> {
        std::fs::copy(input, output)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Always fails; used to exercise fallback paths
#[derive(Debug, Default, Clone)]
pub struct FailingConverter;

impl ColorConverter for FailingConverter {
    fn to_rgb(&self, _input: &Path, _output: &Path) -> Result<()> {
        Err(PdfError::ColorConversion("converter disabled".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ghostscript_arguments() {
        let args = GhostscriptConverter::arguments(Path::new("/in.pdf"), Path::new("/out.pdf"));
        assert_eq!(args.first().map(String::as_str), Some("-dSAFER"));
        assert!(args.contains(&"-sColorConversionStrategy=RGB".to_string()));
        assert!(args.contains(&"-sOutputFile=/out.pdf".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/in.pdf"));
    }

    #[test]
    fn test_missing_executable_is_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, b"%PDF-1.4").unwrap();
        let converter = GhostscriptConverter::new(dir.path().join("no-such-gs"));
        let result = converter.to_rgb(&input, &dir.path().join("out.pdf"));
        assert!(matches!(result, Err(PdfError::ColorConversion(_))));
    }

    #[test]
    fn test_passthrough_copies() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        std::fs::write(&input, b"%PDF-1.4").unwrap();
        PassthroughConverter.to_rgb(&input, &output).unwrap();
        assert_eq!(std::fs::read(output).unwrap(), b"%PDF-1.4");
    }
}
