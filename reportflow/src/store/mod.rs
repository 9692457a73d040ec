//! The artifact store: uploaded reports and stage outputs on disk.
//!
//! The store performs no locking. Two writers to the same path race at the
//! filesystem level and the last one to finish wins.

mod filename;

pub use filename::{extension_allowed, sanitize_filename, ALLOWED_EXTENSIONS};

use crate::errors::{ReportflowError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Filesystem area holding uploads and stage artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    upload_dir: PathBuf,
    output_root: PathBuf,
}

impl ArtifactStore {
    /// Creates a store over the given directories. Nothing is created yet.
    #[must_use]
    pub fn new(upload_dir: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_root: output_root.into(),
        }
    }

    /// Directory uploads are written to.
    #[must_use]
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Root that relative stage outputs are resolved against.
    #[must_use]
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Returns true if `path` exists.
    #[must_use]
    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Creates `path` and its parents. Idempotent.
    pub fn ensure_directory(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    /// Creates the parent directory of an artifact path. Idempotent.
    pub fn ensure_parent(&self, artifact: &Path) -> Result<()> {
        match artifact.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => self.ensure_directory(parent),
            _ => Ok(()),
        }
    }

    /// Creates the upload directory and output root.
    pub fn initialize(&self) -> Result<()> {
        self.ensure_directory(&self.upload_dir)?;
        self.ensure_directory(&self.output_root)?;
        debug!(
            upload_dir = %self.upload_dir.display(),
            output_root = %self.output_root.display(),
            "Artifact store ready"
        );
        Ok(())
    }

    /// Stores an uploaded report and returns its path.
    ///
    /// The filename is sanitized so the file always lands directly inside the
    /// upload directory. An older upload with the same name is overwritten.
    ///
    /// # Errors
    ///
    /// - [`ReportflowError::EmptyFilename`] if nothing usable remains of the name
    /// - [`ReportflowError::InvalidExtension`] unless the extension is xlsx, xls or csv
    pub fn store_upload(&self, bytes: &[u8], filename: &str) -> Result<PathBuf> {
        if filename.trim().is_empty() {
            return Err(ReportflowError::EmptyFilename);
        }
        if !extension_allowed(filename) {
            return Err(ReportflowError::invalid_extension(
                filename,
                ALLOWED_EXTENSIONS,
            ));
        }

        let safe_name = sanitize_filename(filename).ok_or(ReportflowError::EmptyFilename)?;
        if !extension_allowed(&safe_name) {
            return Err(ReportflowError::invalid_extension(
                filename,
                ALLOWED_EXTENSIONS,
            ));
        }

        self.ensure_directory(&self.upload_dir)?;
        let path = self.upload_dir.join(&safe_name);
        std::fs::write(&path, bytes)?;

        info!(filename = %safe_name, bytes = bytes.len(), path = %path.display(), "Stored upload");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(root: &Path) -> ArtifactStore {
        ArtifactStore::new(root.join("uploads"), root.join("reports"))
    }

    #[test]
    fn test_store_upload_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let path = store.store_upload(b"a,b\n1,2\n", "report.csv").unwrap();

        assert_eq!(path, dir.path().join("uploads").join("report.csv"));
        assert_eq!(std::fs::read(&path).unwrap(), b"a,b\n1,2\n");
    }

    #[test]
    fn test_store_upload_rejects_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let err = store.store_upload(b"x", "data.txt").unwrap_err();
        assert!(matches!(err, ReportflowError::InvalidExtension { .. }));
        assert!(!dir.path().join("uploads").exists());
    }

    #[test]
    fn test_store_upload_rejects_empty_name() {
        let dir = tempfile::tempdir().unwrap();
        let err = store(dir.path()).store_upload(b"x", "  ").unwrap_err();
        assert!(matches!(err, ReportflowError::EmptyFilename));
    }

    #[test]
    fn test_store_upload_cannot_escape_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let path = store
            .store_upload(b"x", "../../etc/evil report.xlsx")
            .unwrap();

        assert_eq!(path.parent().unwrap(), dir.path().join("uploads"));
        assert_eq!(path.file_name().unwrap(), "evil_report.xlsx");
    }

    #[test]
    fn test_store_upload_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        store.store_upload(b"old", "r.xlsx").unwrap();
        let path = store.store_upload(b"new", "r.xlsx").unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"new");
    }

    #[test]
    fn test_ensure_parent_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let artifact = dir.path().join("reports/a/b/out.xlsx");

        store.ensure_parent(&artifact).unwrap();
        store.ensure_parent(&artifact).unwrap();

        assert!(store.exists(&dir.path().join("reports/a/b")));
        assert!(!store.exists(&artifact));
    }
}
