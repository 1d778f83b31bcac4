pub mod filesystem;
pub mod key;

pub use filesystem::FilesystemBlobStore;
pub use key::{blob_key, key_from_url, public_url};

use crate::error::StorageError;

/// Object storage for the raw résumé files.
///
/// Calls block; the pipeline runs them on the worker pool.
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `key`, overwriting any previous object, and
    /// returns the public URL.
    fn put(&self, bytes: &[u8], key: &str) -> Result<String, StorageError>;

    /// Best-effort removal. Malformed or already-missing URLs are logged,
    /// never returned as errors.
    fn delete(&self, url: &str);
}
