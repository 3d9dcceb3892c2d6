//! Directory-backed object storage.
//!
//! Objects live at `<root>/<bucket>/<prefix>/<key>`. Every upload writes a
//! `<key>.sha256` sidecar next to the object; a later upload whose content
//! hashes the same is skipped.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{info, instrument, warn};

use crate::contract::ObjectStore;
use crate::error::StorageError;

const CHECKSUM_SUFFIX: &str = "sha256";
const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// An [`ObjectStore`] over a local directory tree.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    bucket: String,
}

impl FsObjectStore {
    /// Directories are created lazily on first upload.
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Where `<prefix>/<key>` lives on disk.
    pub fn object_path(&self, prefix: &str, key: &str) -> Result<PathBuf, StorageError> {
        validate_segment(&self.bucket)?;
        validate_segment(prefix)?;
        validate_segment(key)?;
        Ok(self.root.join(&self.bucket).join(prefix).join(key))
    }
}

/// Rejects anything that could leave the bucket directory.
fn validate_segment(segment: &str) -> Result<(), StorageError> {
    if segment.is_empty() {
        return Err(StorageError::InvalidKey("empty key segment".to_string()));
    }
    if segment.contains("..") || segment.starts_with('/') || segment.starts_with('\\') {
        return Err(StorageError::InvalidKey(format!(
            "path traversal not allowed: {segment}"
        )));
    }
    if segment.contains(['/', '\\']) {
        return Err(StorageError::InvalidKey(format!(
            "nested keys are not supported: {segment}"
        )));
    }
    for component in Path::new(segment).components() {
        if !matches!(component, Component::Normal(_)) {
            return Err(StorageError::InvalidKey(format!(
                "contains unsafe path component: {segment}"
            )));
        }
    }
    Ok(())
}

fn checksum_path(object: &Path) -> PathBuf {
    let mut name = object.as_os_str().to_owned();
    name.push(".");
    name.push(CHECKSUM_SUFFIX);
    PathBuf::from(name)
}

/// Hex SHA-256 of a file, read in chunks.
pub async fn file_checksum(path: &Path) -> Result<String, StorageError> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn upload(&self, local_path: &Path, prefix: &str, key_name: &str) -> Result<(), StorageError> {
        let target = self.object_path(prefix, key_name)?;
        let checksum = file_checksum(local_path).await?;
        let sidecar = checksum_path(&target);

        if fs::try_exists(&target).await? {
            match fs::read_to_string(&sidecar).await {
                Ok(stored) if stored.trim() == checksum => {
                    warn!(key = %format!("{prefix}/{key_name}"), "Identical object already stored, skipping upload");
                    return Ok(());
                }
                _ => {}
            }
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::copy(local_path, &target).await?;
        fs::write(&sidecar, &checksum).await?;
        info!(
            from = %local_path.display(),
            to = %target.display(),
            checksum = %checksum,
            "Uploaded object"
        );
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn download(&self, key: &str, prefix: &str, dest_dir: &Path) -> Result<PathBuf, StorageError> {
        if !key.contains('.') {
            return Err(StorageError::InvalidKey(format!(
                "{key}: you must specify the file suffix"
            )));
        }
        let source = self.object_path(prefix, key)?;
        if !fs::try_exists(&source).await? {
            return Err(StorageError::NotFound(format!("{prefix}/{key}")));
        }

        fs::create_dir_all(dest_dir).await?;
        let target = dest_dir.join(key);
        fs::copy(&source, &target).await?;
        info!(from = %source.display(), to = %target.display(), "Downloaded object");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_is_rejected() {
        let store = FsObjectStore::new("/tmp/store", "tiles");
        for bad in ["../escape.fgb", "/abs.fgb", "a/../../b.fgb", ""] {
            assert!(
                matches!(store.object_path("fgb", bad), Err(StorageError::InvalidKey(_))),
                "{bad:?} should be rejected"
            );
        }
        assert_eq!(
            store.object_path("fgb", "blocks.fgb").unwrap(),
            PathBuf::from("/tmp/store/tiles/fgb/blocks.fgb")
        );
    }

    #[test]
    fn sidecar_sits_next_to_object() {
        assert_eq!(
            checksum_path(Path::new("/s/b/fgb/blocks.fgb")),
            PathBuf::from("/s/b/fgb/blocks.fgb.sha256")
        );
    }
}
