use crate::infrastructure::http::middleware::error::ApiResult;
use async_trait::async_trait;

/// Key/value object store for template bodies and extracted images.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Save an object, replacing any previous content
    async fn save(&self, key: &str, content: &[u8]) -> ApiResult<()>;

    /// Read an object; a missing key is a not-found error
    async fn read(&self, key: &str) -> ApiResult<Vec<u8>>;

    /// Delete an object (missing keys are ignored)
    async fn delete(&self, key: &str) -> ApiResult<()>;

    async fn exists(&self, key: &str) -> ApiResult<bool>;

    /// Public URL an email client can fetch the object from
    fn public_url(&self, key: &str) -> String;
}
