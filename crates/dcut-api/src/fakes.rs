//! In-memory collaborator fakes for reconciliation tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use dcut_db::{DbResult, GenerationStore};
use dcut_kie::{
    ExtendVideoParams, GenerateResponse, KieError, KieResult, RecordInfoResponse, VideoProvider,
};
use dcut_models::{GenerationRecord, GenerationStatus};
use dcut_storage::{BlobStore, StorageResult};

pub(crate) struct FakeProvider {
    pub(crate) hd_url: Option<String>,
    pub(crate) hd_fails: bool,
    pub(crate) extend_task_id: Option<String>,
    pub(crate) extend_fails: bool,
    pub(crate) hd_calls: AtomicUsize,
    pub(crate) extend_calls: AtomicUsize,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            hd_url: None,
            hd_fails: false,
            extend_task_id: Some("task-ext".to_string()),
            extend_fails: false,
            hd_calls: AtomicUsize::new(0),
            extend_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VideoProvider for FakeProvider {
    async fn record_info(&self, _task_id: &str) -> KieResult<RecordInfoResponse> {
        unreachable!("finalization never queries record-info")
    }

    async fn get_1080p(&self, _task_id: &str) -> KieResult<Option<String>> {
        self.hd_calls.fetch_add(1, Ordering::SeqCst);
        if self.hd_fails {
            return Err(KieError::Http {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(self.hd_url.clone())
    }

    async fn extend(&self, _params: &ExtendVideoParams) -> KieResult<GenerateResponse> {
        self.extend_calls.fetch_add(1, Ordering::SeqCst);
        if self.extend_fails {
            return Err(KieError::Http {
                status: 500,
                body: "boom".to_string(),
            });
        }
        let body = match &self.extend_task_id {
            Some(id) => format!(r#"{{"code":200,"msg":"success","data":{{"taskId":"{id}"}}}}"#),
            None => r#"{"code":400,"msg":"rejected"}"#.to_string(),
        };
        Ok(serde_json::from_str(&body).unwrap())
    }
}

#[derive(Default)]
pub(crate) struct FakeBlobs {
    pub(crate) uploads: Mutex<Vec<(String, usize, String)>>,
}

#[async_trait]
impl BlobStore for FakeBlobs {
    async fn upload_bytes(&self, data: Vec<u8>, key: &str, content_type: &str) -> StorageResult<()> {
        self.uploads.lock().unwrap().push((
            key.to_string(),
            data.len(),
            content_type.to_string(),
        ));
        Ok(())
    }

    async fn create_signed_url(&self, key: &str, _ttl: Duration) -> StorageResult<String> {
        Ok(format!("https://signed.example.com/{key}?sig=abc"))
    }
}

#[derive(Default)]
pub(crate) struct FakeStore {
    records: Mutex<HashMap<Uuid, GenerationRecord>>,
}

impl FakeStore {
    pub(crate) fn insert(&self, record: GenerationRecord) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    pub(crate) fn record(&self, id: Uuid) -> GenerationRecord {
        self.records.lock().unwrap().get(&id).unwrap().clone()
    }
}

/// Postgres `jsonb ||` semantics: top-level keys merge, a patched key
/// replaces any existing value wholesale. The real store patches with
/// `metadata || $n::jsonb`, so the fake must match it exactly.
fn jsonb_concat(base: &Value, patch: &Value) -> Value {
    match (base, patch) {
        (Value::Object(a), Value::Object(b)) => {
            let mut merged: Map<String, Value> = a.clone();
            for (key, value) in b {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => patch.clone(),
    }
}

#[async_trait]
impl GenerationStore for FakeStore {
    async fn get(&self, id: Uuid) -> DbResult<Option<GenerationRecord>> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_task_id(&self, task_id: &str) -> DbResult<Option<GenerationRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.task_id() == Some(task_id))
            .cloned())
    }

    async fn mark_failed(&self, id: Uuid, patch: &Value) -> DbResult<()> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).unwrap();
        record.status = GenerationStatus::Failed;
        record.metadata = jsonb_concat(&record.metadata, patch);
        Ok(())
    }

    async fn append_metadata(&self, id: Uuid, patch: &Value) -> DbResult<()> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).unwrap();
        record.metadata = jsonb_concat(&record.metadata, patch);
        Ok(())
    }

    async fn complete_if_active(
        &self,
        id: Uuid,
        generated_video_url: Option<&str>,
        storage_path: Option<&str>,
        patch: &Value,
    ) -> DbResult<bool> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).unwrap();
        if !record.status.is_active() {
            return Ok(false);
        }
        record.status = GenerationStatus::Completed;
        record.generated_video_url = generated_video_url.map(|s| s.to_string());
        record.storage_path = storage_path.map(|s| s.to_string());
        record.metadata = jsonb_concat(&record.metadata, patch);
        Ok(true)
    }

    async fn mark_extending(&self, id: Uuid, new_task_id: &str, patch: &Value) -> DbResult<()> {
        let mut records = self.records.lock().unwrap();
        let record = records.get_mut(&id).unwrap();
        record.status = GenerationStatus::Extending;
        record.kie_task_id = Some(new_task_id.to_string());
        record.metadata = jsonb_concat(&record.metadata, patch);
        Ok(())
    }
}

/// A record mid-generation, as the callback and poll paths find it.
pub(crate) fn processing_record(task_id: &str) -> GenerationRecord {
    GenerationRecord {
        id: Uuid::new_v4(),
        user_id: "user-1".to_string(),
        kie_task_id: Some(task_id.to_string()),
        status: GenerationStatus::Processing,
        requested_duration_seconds: None,
        generated_video_url: None,
        storage_path: None,
        metadata: json!({"requested_duration": 5}),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_patch_merges_top_level_only() {
        let store = FakeStore::default();
        let mut record = processing_record("t1");
        record.metadata = json!({
            "requested_duration": 5,
            "kie": {"taskId": "t1", "model": "veo3_fast"}
        });
        let id = record.id;
        store.insert(record);

        store
            .append_metadata(id, &json!({"kie": {"taskId": "t2"}}))
            .await
            .unwrap();

        let saved = store.record(id);
        // jsonb || replaces the patched key wholesale
        assert_eq!(saved.metadata["kie"], json!({"taskId": "t2"}));
        // untouched top-level keys survive
        assert_eq!(saved.metadata["requested_duration"], 5);
    }
}
