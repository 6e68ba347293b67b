//! Generation store abstraction for reconciliation logic.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use dcut_models::GenerationRecord;

use crate::error::DbResult;

/// The persistence operations the callback handler and status poller
/// depend on. All coordination between concurrent finalizers goes through
/// these methods; there is no in-process shared state.
///
/// Metadata patches follow Postgres `jsonb ||` semantics: top-level keys
/// merge, a patched key replaces any existing nested object wholesale.
/// Callers pre-merge nested objects (see `dcut_models::merge_metadata`)
/// before patching their key.
#[async_trait]
pub trait GenerationStore: Send + Sync {
    /// Load a record by id.
    async fn get(&self, id: Uuid) -> DbResult<Option<GenerationRecord>>;

    /// Resolve a record by provider task id, tolerating both the dedicated
    /// column and the legacy `metadata.kie.taskId` representation.
    async fn find_by_task_id(&self, task_id: &str) -> DbResult<Option<GenerationRecord>>;

    /// Mark a record failed and merge diagnostics into its metadata.
    async fn mark_failed(&self, id: Uuid, patch: &Value) -> DbResult<()>;

    /// Merge diagnostics into a record's metadata without touching status.
    async fn append_metadata(&self, id: Uuid, patch: &Value) -> DbResult<()>;

    /// Complete a record only while it is still in an active state
    /// (`processing` or `extending`).
    ///
    /// Returns `false` when the guard matched no row, meaning a concurrent
    /// finalizer already completed or failed it.
    async fn complete_if_active(
        &self,
        id: Uuid,
        generated_video_url: Option<&str>,
        storage_path: Option<&str>,
        patch: &Value,
    ) -> DbResult<bool>;

    /// Record a submitted extension: set `extending` and rotate the task id
    /// to the continuation job's id so its callback can correlate.
    async fn mark_extending(&self, id: Uuid, new_task_id: &str, patch: &Value) -> DbResult<()>;
}
