use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::StorageError;
use crate::traits::BlobStore;

/// Blob store over a local directory, e.g. a downloaded snapshot mirror.
///
/// Object paths are the `/`-separated paths relative to `root`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(StorageError::Backend(format!(
                "snapshot directory '{}' does not exist",
                root.display()
            )));
        }
        Ok(FsBlobStore { root })
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let mut full = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." || segment == "." {
                return Err(StorageError::Backend(format!(
                    "path '{}' escapes the snapshot directory",
                    path
                )));
            }
            full.push(segment);
        }
        Ok(full)
    }

    fn walk(&self, dir: &Path, out: &mut Vec<String>) -> Result<(), StorageError> {
        let entries = std::fs::read_dir(dir).map_err(|e| io_error(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| io_error(dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| io_error(&path, e))?;
            if file_type.is_dir() {
                self.walk(&path, out)?;
            } else if file_type.is_file() {
                if let Ok(relative) = path.strip_prefix(&self.root) {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    out.push(key);
                }
            }
        }
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl BlobStore for FsBlobStore {
    fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        let mut out = Vec::new();
        self.walk(&self.root, &mut out)?;
        let prefix = prefix.unwrap_or("");
        out.retain(|p| p.starts_with(prefix));
        out.sort();
        Ok(out)
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.resolve(path)?.is_file())
    }

    fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        let full = self.resolve(path)?;
        match std::fs::read(&full) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                path: path.to_string(),
            }),
            Err(e) => Err(io_error(&full, e)),
        }
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}
