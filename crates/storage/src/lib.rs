mod azure;
pub mod conformance;
mod error;
mod fs;
mod listing;
mod memory;
mod traits;

pub use azure::{AzureBlobStore, AzureConfig};
pub use error::StorageError;
pub use fs::FsBlobStore;
pub use listing::{parse_list_page, ListPage};
pub use memory::MemoryBlobStore;
pub use traits::BlobStore;
