use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::sanitize::redact_url;
use crate::storage::key::{key_from_url, public_url};
use crate::storage::BlobStore;

/// Blob store backed by a local directory and served under `https://{bucket}/`.
pub struct FilesystemBlobStore {
    root: PathBuf,
    bucket: String,
}

impl FilesystemBlobStore {
    pub fn new<P: AsRef<Path>>(root: P, bucket: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            bucket: bucket.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for_key(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}

impl BlobStore for FilesystemBlobStore {
    fn put(&self, bytes: &[u8], key: &str) -> Result<String, StorageError> {
        if key.is_empty() || key.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let path = self.path_for_key(key);
        if let Some(parent) = path.parent() {
            self.ensure_directory(parent)?;
        }

        // write-then-rename so readers never see a partial object
        let staging = path.with_extension(format!("part-{}", uuid::Uuid::new_v4()));
        let write = || -> std::io::Result<()> {
            let mut file = std::fs::File::create(&staging)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            std::fs::rename(&staging, &path)
        };
        if let Err(e) = write() {
            let _ = std::fs::remove_file(&staging);
            return Err(StorageError::WriteFile { path, source: e });
        }

        log::debug!("Stored blob {} ({} bytes)", key, bytes.len());
        Ok(public_url(&self.bucket, key))
    }

    fn delete(&self, url: &str) {
        let Some(key) = key_from_url(&self.bucket, url) else {
            log::warn!("Ignoring delete for malformed blob URL {}", redact_url(url));
            return;
        };

        match std::fs::remove_file(self.path_for_key(&key)) {
            Ok(()) => log::info!("Deleted blob {}", key),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Blob {} already absent", key)
            }
            Err(e) => log::warn!("Failed to delete blob {}: {}", key, e),
        }
    }
}
