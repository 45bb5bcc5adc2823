/// All errors that can be returned by a BlobStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No object exists at the given path.
    #[error("blob not found: {path}")]
    NotFound { path: String },

    /// The remote answered with a status the operation cannot use.
    #[error("{operation} {path}: HTTP {status}")]
    Http {
        operation: &'static str,
        path: String,
        status: u16,
    },

    /// The request never produced a response (DNS, connect, timeout, TLS),
    /// after all retries were spent.
    #[error("{operation} {path}: transport error after {attempts} attempt(s): {message}")]
    Transport {
        operation: &'static str,
        path: String,
        attempts: u32,
        message: String,
    },

    /// The listing endpoint returned a body that is not an enumeration result.
    #[error("malformed listing response: {0}")]
    MalformedListing(String),

    /// This store cannot enumerate its contents.
    #[error("listing not supported by {0}")]
    ListingUnavailable(String),

    /// Local filesystem failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A backend-specific storage error (bad configuration, URL construction, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// The HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            StorageError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
