use std::collections::BTreeMap;

use bytes::Bytes;

use crate::error::StorageError;
use crate::traits::BlobStore;

/// In-memory blob store.
///
/// Listing can be switched off to mimic a credential that may read blobs
/// but not enumerate the container.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: BTreeMap<String, Bytes>,
    listing_disabled: bool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, data: impl Into<Bytes>) {
        self.blobs.insert(path.to_string(), data.into());
    }

    pub fn with_blob(mut self, path: &str, data: impl Into<Bytes>) -> Self {
        self.insert(path, data);
        self
    }

    pub fn without_listing(mut self) -> Self {
        self.listing_disabled = true;
        self
    }
}

impl BlobStore for MemoryBlobStore {
    fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        if self.listing_disabled {
            return Err(StorageError::ListingUnavailable(self.describe()));
        }
        let prefix = prefix.unwrap_or("");
        Ok(self
            .blobs
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.blobs.contains_key(path))
    }

    fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        self.blobs
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_string(),
            })
    }

    fn describe(&self) -> String {
        format!("memory ({} blobs)", self.blobs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_listing_still_serves_reads() {
        let store = MemoryBlobStore::new()
            .with_blob("run.parquet", &b"PAR1"[..])
            .without_listing();
        assert!(matches!(
            store.list(None),
            Err(StorageError::ListingUnavailable(_))
        ));
        assert!(store.exists("run.parquet").unwrap());
        assert_eq!(&store.get("run.parquet").unwrap()[..], b"PAR1");
    }
}
