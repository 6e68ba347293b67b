//! Blob store abstraction for reconciliation logic.

use std::time::Duration;

use async_trait::async_trait;

use crate::client::R2Client;
use crate::error::StorageResult;

/// The storage operations the finalization sequence depends on.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload bytes at `key` with an explicit content type.
    async fn upload_bytes(&self, data: Vec<u8>, key: &str, content_type: &str)
        -> StorageResult<()>;

    /// Issue a time-limited signed URL for `key`.
    async fn create_signed_url(&self, key: &str, ttl: Duration) -> StorageResult<String>;
}

#[async_trait]
impl BlobStore for R2Client {
    async fn upload_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        R2Client::upload_bytes(self, data, key, content_type).await
    }

    async fn create_signed_url(&self, key: &str, ttl: Duration) -> StorageResult<String> {
        self.presign_get(key, ttl).await
    }
}
