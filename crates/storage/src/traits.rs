use bytes::Bytes;

use crate::error::StorageError;

/// Read-only access to a flat namespace of snapshot objects.
///
/// Paths are `/`-separated and relative to the store root (for Azure, the
/// container). Implementations are synchronous: every call either completes
/// or fails, there is no background work and no shared mutable state.
///
/// ## Probing
///
/// `exists` is meant to be cheap. Remote stores should avoid transferring
/// object bodies; a `false` answer means "not found", while transport or
/// authorization problems surface as `Err` so callers can report them.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync` so a single store can be shared
/// by callers that run several pipelines.
pub trait BlobStore: Send + Sync {
    /// List every object path, optionally restricted to `prefix`.
    ///
    /// Returns `Err(StorageError::ListingUnavailable)` for stores that cannot
    /// enumerate; callers are expected to fall back to probing.
    fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError>;

    /// Check whether an object exists at `path`.
    fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Download the whole object at `path`.
    ///
    /// Returns `Err(StorageError::NotFound)` if nothing is stored there.
    fn get(&self, path: &str) -> Result<Bytes, StorageError>;

    /// Human-readable location of this store, for logs and error reports.
    fn describe(&self) -> String;
}

impl<T: BlobStore + ?Sized> BlobStore for Box<T> {
    fn list(&self, prefix: Option<&str>) -> Result<Vec<String>, StorageError> {
        (**self).list(prefix)
    }

    fn exists(&self, path: &str) -> Result<bool, StorageError> {
        (**self).exists(path)
    }

    fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        (**self).get(path)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
