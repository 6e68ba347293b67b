//! Provider abstraction for reconciliation logic.
//!
//! Isolating the provider HTTP shape behind this trait keeps the
//! finalization sequence provider-agnostic and lets tests substitute a
//! fake provider.

use async_trait::async_trait;

use crate::client::KieClient;
use crate::error::KieResult;
use crate::types::{ExtendVideoParams, GenerateResponse, RecordInfoResponse};

/// The subset of provider operations the reconciliation flow depends on.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Query task status.
    async fn record_info(&self, task_id: &str) -> KieResult<RecordInfoResponse>;

    /// Best-effort 1080p upgrade URL lookup.
    async fn get_1080p(&self, task_id: &str) -> KieResult<Option<String>>;

    /// Submit a continuation job.
    async fn extend(&self, params: &ExtendVideoParams) -> KieResult<GenerateResponse>;
}

#[async_trait]
impl VideoProvider for KieClient {
    async fn record_info(&self, task_id: &str) -> KieResult<RecordInfoResponse> {
        KieClient::record_info(self, task_id).await
    }

    async fn get_1080p(&self, task_id: &str) -> KieResult<Option<String>> {
        KieClient::get_1080p(self, task_id, None).await
    }

    async fn extend(&self, params: &ExtendVideoParams) -> KieResult<GenerateResponse> {
        KieClient::extend(self, params).await
    }
}
