use crate::domain::ports::file_storage::FileStorage;
use crate::infrastructure::http::middleware::error::{ApiError, ApiResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Filesystem-backed object store. Objects are served read-only under
/// `public_base_url` by the `/assets` route.
#[derive(Clone)]
pub struct LocalFileStorage {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalFileStorage {
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Keys are relative paths; anything that could leave `base_path` is rejected.
    fn resolve_path(&self, key: &str) -> ApiResult<PathBuf> {
        let path = Path::new(key);
        let is_plain = !key.is_empty()
            && path
                .components()
                .all(|component| matches!(component, Component::Normal(_)));

        if !is_plain {
            return Err(ApiError::storage(format!("Invalid storage key '{}'", key)));
        }

        Ok(self.base_path.join(path))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn save(&self, key: &str, content: &[u8]) -> ApiResult<()> {
        let file_path = self.resolve_path(key)?;

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ApiError::storage(format!("Failed to create directory: {}", e)))?;
        }

        fs::write(&file_path, content)
            .await
            .map_err(|e| ApiError::storage(format!("Failed to write {}: {}", key, e)))
    }

    async fn read(&self, key: &str) -> ApiResult<Vec<u8>> {
        let file_path = self.resolve_path(key)?;
        fs::read(&file_path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ApiError::not_found(format!("Object {} not found", key)),
            _ => ApiError::storage(format!("Failed to read {}: {}", key, e)),
        })
    }

    async fn delete(&self, key: &str) -> ApiResult<()> {
        let file_path = self.resolve_path(key)?;
        match fs::remove_file(&file_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::storage(format!("Failed to delete {}: {}", key, e))),
        }
    }

    async fn exists(&self, key: &str) -> ApiResult<bool> {
        let file_path = self.resolve_path(key)?;
        fs::try_exists(&file_path)
            .await
            .map_err(|e| ApiError::storage(format!("Failed to stat {}: {}", key, e)))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}
