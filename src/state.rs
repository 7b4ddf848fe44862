use std::sync::Arc;

use crate::assets::model::Asset;
use crate::auth::model::User;
use crate::blobs::{BlobStore, FsBlobStore};
use crate::config::AppConfig;
use crate::records::{MemRecordStore, RecordStore};

#[derive(Clone)]
pub struct AppState {
    pub assets: Arc<dyn RecordStore<Asset>>,
    pub users: Arc<dyn RecordStore<User>>,
    pub blobs: Arc<dyn BlobStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let blobs = Arc::new(FsBlobStore::new(&config.upload_dir)?) as Arc<dyn BlobStore>;

        Ok(Self {
            assets: Arc::new(MemRecordStore::new()),
            users: Arc::new(MemRecordStore::new()),
            blobs,
            config,
        })
    }

    /// Fresh stores over a throwaway blob directory; the returned guard
    /// keeps the directory alive for the duration of the test.
    #[cfg(test)]
    pub fn for_tests() -> (tempfile::TempDir, Self) {
        use crate::config::JwtConfig;

        let dir = tempfile::tempdir().expect("tempdir");
        let blobs = FsBlobStore::new(dir.path()).expect("blob store");
        let config = Arc::new(AppConfig {
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "clinic-inventory".into(),
                audience: "clinic-inventory-users".into(),
                ttl_days: 7,
            },
            upload_dir: dir.path().to_path_buf(),
        });

        let state = Self {
            assets: Arc::new(MemRecordStore::new()),
            users: Arc::new(MemRecordStore::new()),
            blobs: Arc::new(blobs),
            config,
        };
        (dir, state)
    }
}
