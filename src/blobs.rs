use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::AppError;

/// Binary object storage for uploaded images. Keys are opaque file names
/// inside a single flat namespace directory.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `body` under a freshly generated collision-resistant key,
    /// keeping the extension of `original_name`. Never overwrites.
    async fn save(&self, body: Bytes, original_name: &str) -> Result<String, AppError>;

    /// Idempotent removal: a missing blob is a success.
    async fn delete(&self, key: &str) -> Result<(), AppError>;

    async fn exists(&self, key: &str) -> bool;
}

/// Local-filesystem adapter. The directory doubles as the document root
/// for the public `/uploads/assets` static route.
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn generate_key(original_name: &str) -> String {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        format!("image-{millis}-{suffix}{ext}")
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn save(&self, body: Bytes, original_name: &str) -> Result<String, AppError> {
        // create_new guards against a (vanishingly unlikely) key collision
        // between concurrent uploads.
        loop {
            let key = Self::generate_key(original_name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.path_for(&key))
                .await
            {
                Ok(mut file) => {
                    file.write_all(&body).await?;
                    file.flush().await?;
                    debug!(%key, bytes = body.len(), "blob saved");
                    return Ok(key);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => {
                debug!(%key, "blob deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> bool {
        tokio::fs::try_exists(self.path_for(key))
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, FsBlobStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsBlobStore::new(dir.path()).expect("store");
        (dir, store)
    }

    #[tokio::test]
    async fn save_then_exists_then_delete() {
        let (_dir, store) = store();
        let key = store
            .save(Bytes::from_static(b"png bytes"), "scan.png")
            .await
            .expect("save");
        assert!(key.ends_with(".png"));
        assert!(store.exists(&key).await);

        store.delete(&key).await.expect("delete");
        assert!(!store.exists(&key).await);
    }

    #[tokio::test]
    async fn delete_of_missing_blob_is_ok() {
        let (_dir, store) = store();
        store.delete("image-0-0.jpg").await.expect("idempotent");
    }

    #[tokio::test]
    async fn keys_are_unique_per_save() {
        let (_dir, store) = store();
        let a = store
            .save(Bytes::from_static(b"a"), "photo.jpg")
            .await
            .expect("save a");
        let b = store
            .save(Bytes::from_static(b"b"), "photo.jpg")
            .await
            .expect("save b");
        assert_ne!(a, b);
        assert!(store.exists(&a).await);
        assert!(store.exists(&b).await);
    }

    #[tokio::test]
    async fn key_without_extension_is_allowed() {
        let (_dir, store) = store();
        let key = store
            .save(Bytes::from_static(b"raw"), "blob")
            .await
            .expect("save");
        assert!(!key.contains('.'));
        assert!(store.exists(&key).await);
    }
}
