//! Scratch directory shared by every operation of one session

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::TempDir;
use tracing::debug;

/// A session-private temporary directory. Removed with everything in it
/// when dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    counter: AtomicU64,
}

impl Workspace {
    pub fn new(root: Option<&Path>) -> Result<Self> {
        let builder = {
            let mut builder = tempfile::Builder::new();
            builder.prefix("pdfkiln-");
            builder
        };
        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(Self {
            dir,
            counter: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Next collision-free name, `{stem}-{counter}.{ext}`
    fn unique_path(&self, stem: &str, ext: &str) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        self.dir.path().join(format!("{stem}-{n}.{ext}"))
    }

    /// Write `bytes` to a fresh scratch file
    pub fn stage(&self, stem: &str, ext: &str, bytes: &[u8]) -> Result<ScratchFile> {
        let file = self.reserve(stem, ext);
        fs::write(&file.path, bytes)?;
        debug!(scratch = %file.path.display(), bytes = bytes.len(), "staged");
        Ok(file)
    }

    /// Reserve a fresh scratch name without creating the file; a tool is
    /// expected to write it
    pub fn reserve(&self, stem: &str, ext: &str) -> ScratchFile {
        ScratchFile {
            path: self.unique_path(stem, ext),
        }
    }

    pub fn read(&self, file: &ScratchFile) -> Result<Vec<u8>> {
        Ok(fs::read(&file.path)?)
    }

    pub fn exists(&self, file: &ScratchFile) -> bool {
        file.path.is_file()
    }

    pub fn size(&self, file: &ScratchFile) -> Result<u64> {
        Ok(fs::metadata(&file.path)?.len())
    }

    /// Number of entries currently in the scratch directory
    pub fn entry_count(&self) -> usize {
        fs::read_dir(self.dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// A file inside the workspace, deleted on drop
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                debug!(scratch = %self.path.display(), error = %err, "scratch cleanup failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_and_cleanup() {
        let workspace = Workspace::new(None).unwrap();
        let path = {
            let file = workspace.stage("input", "pdf", b"%PDF-1.7").unwrap();
            assert!(workspace.exists(&file));
            assert_eq!(workspace.size(&file).unwrap(), 8);
            assert_eq!(workspace.read(&file).unwrap(), b"%PDF-1.7");
            file.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(workspace.entry_count(), 0);
    }

    #[test]
    fn test_names_are_unique() {
        let workspace = Workspace::new(None).unwrap();
        let a = workspace.reserve("out", "pdf");
        let b = workspace.reserve("out", "pdf");
        assert_ne!(a.path(), b.path());
        assert!(a
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("out-"));
    }

    #[test]
    fn test_reserved_file_never_written_drops_quietly() {
        let workspace = Workspace::new(None).unwrap();
        let file = workspace.reserve("ghost", "pdf");
        assert!(!workspace.exists(&file));
        drop(file);
    }

    #[test]
    fn test_custom_root() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a/b");
        let workspace = Workspace::new(Some(&nested)).unwrap();
        assert!(workspace.path().starts_with(&nested));
    }
}
