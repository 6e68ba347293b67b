//! Shared finalization sequence.
//!
//! Both delivery paths converge here once a provider task is known to have
//! succeeded: resolve the best archival URL, download and archive the
//! asset, issue a signed URL, persist the completion, and conditionally
//! chain an extension job. The sequence is idempotent per archival cycle
//! and guards the callback-vs-poll race with a conditional status update.

use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

use dcut_db::{DbError, GenerationStore};
use dcut_kie::{ExtendVideoParams, VideoProvider};
use dcut_models::{merge_metadata, GenerationRecord, GenerationStatus};
use dcut_storage::{generated_video_key, BlobStore, StorageError};

use crate::error::ApiError;
use crate::metrics;

/// Continuation prompt for chained extension jobs.
pub const EXTEND_PROMPT: &str =
    "Continue the story seamlessly with consistent style and pacing.";

/// Errors from a finalization attempt.
///
/// Fetch and storage failures are fatal for the attempt: the record is
/// left in its prior state so a later poll can retry archival instead of
/// silently hiding data loss.
#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("Asset fetch failed: {0}")]
    Fetch(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<FinalizeError> for ApiError {
    fn from(e: FinalizeError) -> Self {
        match e {
            FinalizeError::Fetch(msg) => ApiError::Archive(msg),
            FinalizeError::Storage(e) => ApiError::Storage(e),
            FinalizeError::Db(e) => ApiError::Db(e),
        }
    }
}

/// Collaborators and tuning for a finalization run.
pub struct FinalizeDeps<'a> {
    pub provider: &'a dyn VideoProvider,
    pub blobs: &'a dyn BlobStore,
    pub store: &'a dyn GenerationStore,
    pub http: &'a reqwest::Client,
    pub signed_url_ttl: Duration,
    pub extend_threshold_secs: f64,
    /// Where the provider should deliver the extension's callback; `None`
    /// on the poll path (the caller keeps polling).
    pub extend_callback_url: Option<String>,
}

/// A successful completion signal from either delivery path.
pub struct CompletionSignal {
    pub task_id: String,
    pub fallback_flag: bool,
    pub result_urls: Vec<String>,
    /// Diagnostics merged into record metadata on completion.
    pub diagnostics: Value,
}

/// What a finalization run produced.
#[derive(Debug, Clone)]
pub struct FinalizeOutcome {
    pub generated_video_url: Option<String>,
    pub storage_path: Option<String>,
    pub extended: bool,
}

/// Decide the best URL to archive.
///
/// The 1080p upgrade is preferred unless the provider reported a fallback
/// condition; the upgrade call is best-effort and its failures are
/// swallowed here, falling back to the first delivered result URL.
pub async fn resolve_archival_url(
    provider: &dyn VideoProvider,
    signal: &CompletionSignal,
) -> Option<String> {
    if !signal.fallback_flag {
        match provider.get_1080p(&signal.task_id).await {
            Ok(Some(url)) => return Some(url),
            Ok(None) => {}
            Err(e) => warn!("1080p lookup failed for {}: {}", signal.task_id, e),
        }
    }

    signal
        .result_urls
        .first()
        .filter(|u| !u.is_empty())
        .cloned()
}

/// Whether the requested duration exceeds what one generation produces.
pub fn should_extend(requested_secs: Option<f64>, threshold_secs: f64) -> bool {
    requested_secs.map(|d| d > threshold_secs).unwrap_or(false)
}

/// Download an asset and archive it, returning `(storage_path, signed_url)`.
pub async fn archive_asset(
    http: &reqwest::Client,
    blobs: &dyn BlobStore,
    owner_id: &str,
    url: &str,
    signed_url_ttl: Duration,
) -> Result<(String, String), FinalizeError> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| FinalizeError::Fetch(e.to_string()))?;

    if !response.status().is_success() {
        return Err(FinalizeError::Fetch(format!(
            "fetch of {} returned HTTP {}",
            url,
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| FinalizeError::Fetch(e.to_string()))?
        .to_vec();
    metrics::record_archived_bytes(bytes.len() as u64);

    let key = generated_video_key(owner_id, "mp4");
    blobs.upload_bytes(bytes, &key, "video/mp4").await?;
    let signed_url = blobs.create_signed_url(&key, signed_url_ttl).await?;

    info!("Archived {} to {}", url, key);
    Ok((key, signed_url))
}

/// Run the full finalization sequence for a successful completion signal.
pub async fn finalize_success(
    deps: &FinalizeDeps<'_>,
    record: &GenerationRecord,
    signal: &CompletionSignal,
) -> Result<FinalizeOutcome, FinalizeError> {
    // Re-load so duplicate deliveries and stale handler snapshots see the
    // latest status.
    let current = deps
        .store
        .get(record.id)
        .await?
        .unwrap_or_else(|| record.clone());

    if !current.status.is_active() {
        info!(
            "Finalization for {} skipped: status is {}",
            current.id, current.status
        );
        return Ok(FinalizeOutcome {
            extended: current.status == GenerationStatus::Extending,
            generated_video_url: current.generated_video_url,
            storage_path: current.storage_path,
        });
    }

    let mut storage_path = None;
    let mut generated_video_url = None;

    // No resolvable URL is an accepted degenerate outcome: the record
    // still completes, just without an archived asset.
    if let Some(url) = resolve_archival_url(deps.provider, signal).await {
        let (key, signed) = archive_asset(
            deps.http,
            deps.blobs,
            &current.user_id,
            &url,
            deps.signed_url_ttl,
        )
        .await?;
        storage_path = Some(key);
        generated_video_url = Some(signed);
    } else {
        warn!("No archival URL for task {}", signal.task_id);
    }

    let updated = deps
        .store
        .complete_if_active(
            current.id,
            generated_video_url.as_deref(),
            storage_path.as_deref(),
            &signal.diagnostics,
        )
        .await?;

    if !updated {
        // A concurrent finalizer won the conditional update; our blob (if
        // any) is a harmless duplicate and the extend decision is theirs.
        return Ok(FinalizeOutcome {
            generated_video_url,
            storage_path,
            extended: false,
        });
    }
    metrics::record_finalize(true);

    let mut extended = false;
    if should_extend(current.requested_duration(), deps.extend_threshold_secs) {
        extended = submit_extension(deps, &current, &signal.task_id).await;
    }

    Ok(FinalizeOutcome {
        generated_video_url,
        storage_path,
        extended,
    })
}

/// Submit a chained extension job. Best-effort: failures are logged and
/// swallowed, leaving the record `completed` with its original asset.
async fn submit_extension(
    deps: &FinalizeDeps<'_>,
    record: &GenerationRecord,
    task_id: &str,
) -> bool {
    let params = ExtendVideoParams {
        task_id: task_id.to_string(),
        prompt: EXTEND_PROMPT.to_string(),
        seeds: None,
        watermark: None,
        callback_url: deps.extend_callback_url.clone(),
    };

    let response = match deps.provider.extend(&params).await {
        Ok(r) => r,
        Err(e) => {
            warn!("Extension submit failed for {}: {}", task_id, e);
            return false;
        }
    };

    let Some(new_task_id) = response.task_id() else {
        warn!(
            "Extension for {} rejected: code={} msg={}",
            task_id, response.code, response.msg
        );
        return false;
    };

    // Rotate the correlation key so the extension's own callback resolves
    // this record, keeping any other provider metadata intact.
    let kie = merge_metadata(
        record.metadata.get("kie").unwrap_or(&Value::Null),
        &json!({"taskId": new_task_id, "extendedFrom": task_id}),
    );

    match deps
        .store
        .mark_extending(record.id, new_task_id, &json!({ "kie": kie }))
        .await
    {
        Ok(()) => {
            metrics::record_extension_submitted();
            true
        }
        Err(e) => {
            // The provider job is running but the row was not rotated; its
            // callback will 404 and the poll path has to pick it up.
            warn!("Failed to record extension for {}: {}", record.id, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::Ordering;

    use crate::fakes::{processing_record, FakeBlobs, FakeProvider, FakeStore};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn deps<'a>(
        provider: &'a FakeProvider,
        blobs: &'a FakeBlobs,
        store: &'a FakeStore,
        http: &'a reqwest::Client,
    ) -> FinalizeDeps<'a> {
        FinalizeDeps {
            provider,
            blobs,
            store,
            http,
            signed_url_ttl: Duration::from_secs(60 * 60 * 24),
            extend_threshold_secs: 6.0,
            extend_callback_url: Some("https://app.example.com/api/kie/veo/callback".to_string()),
        }
    }

    fn signal(task_id: &str, fallback: bool, urls: Vec<String>) -> CompletionSignal {
        CompletionSignal {
            task_id: task_id.to_string(),
            fallback_flag: fallback,
            result_urls: urls,
            diagnostics: json!({"kie_callback": {"code": 200, "msg": "success"}}),
        }
    }

    async fn asset_server(paths: &[&str]) -> MockServer {
        let server = MockServer::start().await;
        for p in paths {
            Mock::given(method("GET"))
                .and(path(*p))
                .respond_with(
                    ResponseTemplate::new(200).set_body_bytes(b"fake-mp4-bytes".to_vec()),
                )
                .mount(&server)
                .await;
        }
        server
    }

    #[tokio::test]
    async fn test_fallback_skips_1080p_and_archives_first_result() {
        let server = asset_server(&["/a.mp4"]).await;
        let provider = FakeProvider::default();
        let blobs = FakeBlobs::default();
        let store = FakeStore::default();
        let http = reqwest::Client::new();

        let record = processing_record("t1");
        let id = record.id;
        store.insert(record.clone());

        let outcome = finalize_success(
            &deps(&provider, &blobs, &store, &http),
            &record,
            &signal("t1", true, vec![format!("{}/a.mp4", server.uri())]),
        )
        .await
        .unwrap();

        assert_eq!(provider.hd_calls.load(Ordering::SeqCst), 0);
        let uploads = blobs.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        let (key, _, content_type) = &uploads[0];
        assert!(key.starts_with("renders/ugc-ads/user-1/generated/"));
        assert!(key.ends_with(".mp4"));
        assert_eq!(content_type, "video/mp4");

        let signed = outcome.generated_video_url.unwrap();
        assert!(signed.starts_with("https://signed.example.com/"));
        assert_ne!(signed, format!("{}/a.mp4", server.uri()));

        let saved = store.record(id);
        assert_eq!(saved.status, GenerationStatus::Completed);
        assert_eq!(saved.metadata["kie_callback"]["code"], 200);
        // prior metadata survives the merge
        assert_eq!(saved.metadata["requested_duration"], 5);
    }

    #[tokio::test]
    async fn test_1080p_preferred_when_not_fallback() {
        let server = asset_server(&["/hd.mp4", "/sd.mp4"]).await;
        let provider = FakeProvider {
            hd_url: Some(format!("{}/hd.mp4", server.uri())),
            ..FakeProvider::default()
        };
        let blobs = FakeBlobs::default();
        let store = FakeStore::default();
        let http = reqwest::Client::new();

        let record = processing_record("t1");
        store.insert(record.clone());

        finalize_success(
            &deps(&provider, &blobs, &store, &http),
            &record,
            &signal("t1", false, vec![format!("{}/sd.mp4", server.uri())]),
        )
        .await
        .unwrap();

        assert_eq!(provider.hd_calls.load(Ordering::SeqCst), 1);
        // The upgraded rendition was fetched; wiremock verifies /hd.mp4 was
        // requested by virtue of the upload succeeding with its bytes.
        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().any(|r| r.url.path() == "/hd.mp4"));
        assert!(!requests.iter().any(|r| r.url.path() == "/sd.mp4"));
    }

    #[tokio::test]
    async fn test_1080p_failure_falls_back_to_result_url() {
        let server = asset_server(&["/sd.mp4"]).await;
        let provider = FakeProvider {
            hd_fails: true,
            ..FakeProvider::default()
        };
        let blobs = FakeBlobs::default();
        let store = FakeStore::default();
        let http = reqwest::Client::new();

        let record = processing_record("t1");
        let id = record.id;
        store.insert(record.clone());

        let outcome = finalize_success(
            &deps(&provider, &blobs, &store, &http),
            &record,
            &signal("t1", false, vec![format!("{}/sd.mp4", server.uri())]),
        )
        .await
        .unwrap();

        assert!(outcome.generated_video_url.is_some());
        assert_eq!(store.record(id).status, GenerationStatus::Completed);
    }

    #[tokio::test]
    async fn test_no_urls_completes_without_asset() {
        let provider = FakeProvider::default();
        let blobs = FakeBlobs::default();
        let store = FakeStore::default();
        let http = reqwest::Client::new();

        let record = processing_record("t1");
        let id = record.id;
        store.insert(record.clone());

        let outcome = finalize_success(
            &deps(&provider, &blobs, &store, &http),
            &record,
            &signal("t1", true, vec![]),
        )
        .await
        .unwrap();

        assert!(outcome.generated_video_url.is_none());
        assert!(outcome.storage_path.is_none());
        assert!(blobs.uploads.lock().unwrap().is_empty());
        assert_eq!(store.record(id).status, GenerationStatus::Completed);
    }

    #[tokio::test]
    async fn test_archive_fetch_failure_is_fatal_and_preserves_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.mp4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = FakeProvider::default();
        let blobs = FakeBlobs::default();
        let store = FakeStore::default();
        let http = reqwest::Client::new();

        let record = processing_record("t1");
        let id = record.id;
        store.insert(record.clone());

        let err = finalize_success(
            &deps(&provider, &blobs, &store, &http),
            &record,
            &signal("t1", true, vec![format!("{}/gone.mp4", server.uri())]),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, FinalizeError::Fetch(_)));
        assert!(blobs.uploads.lock().unwrap().is_empty());
        // record untouched so a retry can reattempt archival
        assert_eq!(store.record(id).status, GenerationStatus::Processing);
    }

    #[tokio::test]
    async fn test_extend_triggered_above_threshold() {
        let server = asset_server(&["/a.mp4"]).await;
        let provider = FakeProvider::default();
        let blobs = FakeBlobs::default();
        let store = FakeStore::default();
        let http = reqwest::Client::new();

        let mut record = processing_record("t1");
        record.requested_duration_seconds = Some(10.0);
        let id = record.id;
        store.insert(record.clone());

        let outcome = finalize_success(
            &deps(&provider, &blobs, &store, &http),
            &record,
            &signal("t1", true, vec![format!("{}/a.mp4", server.uri())]),
        )
        .await
        .unwrap();

        assert!(outcome.extended);
        assert_eq!(provider.extend_calls.load(Ordering::SeqCst), 1);

        let saved = store.record(id);
        assert_eq!(saved.status, GenerationStatus::Extending);
        // correlation key rotated to the continuation task
        assert_eq!(saved.kie_task_id.as_deref(), Some("task-ext"));
        assert_eq!(saved.metadata["kie"]["taskId"], "task-ext");
        assert_eq!(saved.metadata["kie"]["extendedFrom"], "t1");
    }

    #[tokio::test]
    async fn test_no_extend_below_threshold() {
        let server = asset_server(&["/a.mp4"]).await;
        let provider = FakeProvider::default();
        let blobs = FakeBlobs::default();
        let store = FakeStore::default();
        let http = reqwest::Client::new();

        let mut record = processing_record("t1");
        record.requested_duration_seconds = Some(5.0);
        let id = record.id;
        store.insert(record.clone());

        let outcome = finalize_success(
            &deps(&provider, &blobs, &store, &http),
            &record,
            &signal("t1", true, vec![format!("{}/a.mp4", server.uri())]),
        )
        .await
        .unwrap();

        assert!(!outcome.extended);
        assert_eq!(provider.extend_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.record(id).status, GenerationStatus::Completed);
    }

    #[tokio::test]
    async fn test_extend_failure_is_swallowed() {
        let server = asset_server(&["/a.mp4"]).await;
        let provider = FakeProvider {
            extend_fails: true,
            ..FakeProvider::default()
        };
        let blobs = FakeBlobs::default();
        let store = FakeStore::default();
        let http = reqwest::Client::new();

        let mut record = processing_record("t1");
        record.requested_duration_seconds = Some(10.0);
        let id = record.id;
        store.insert(record.clone());

        let outcome = finalize_success(
            &deps(&provider, &blobs, &store, &http),
            &record,
            &signal("t1", true, vec![format!("{}/a.mp4", server.uri())]),
        )
        .await
        .unwrap();

        assert!(!outcome.extended);
        assert!(outcome.generated_video_url.is_some());
        assert_eq!(store.record(id).status, GenerationStatus::Completed);
    }

    #[tokio::test]
    async fn test_duplicate_finalization_is_idempotent() {
        let server = asset_server(&["/a.mp4"]).await;
        let provider = FakeProvider::default();
        let blobs = FakeBlobs::default();
        let store = FakeStore::default();
        let http = reqwest::Client::new();

        let record = processing_record("t1");
        let id = record.id;
        store.insert(record.clone());

        let d = deps(&provider, &blobs, &store, &http);
        let s = signal("t1", true, vec![format!("{}/a.mp4", server.uri())]);

        let first = finalize_success(&d, &record, &s).await.unwrap();
        let second = finalize_success(&d, &record, &s).await.unwrap();

        // exactly one archived blob; the second run reports the stored asset
        assert_eq!(blobs.uploads.lock().unwrap().len(), 1);
        assert_eq!(first.generated_video_url, second.generated_video_url);
        assert_eq!(first.storage_path, second.storage_path);
        assert_eq!(store.record(id).status, GenerationStatus::Completed);
    }

    #[tokio::test]
    async fn test_lost_conditional_update_skips_extend() {
        let server = asset_server(&["/a.mp4"]).await;
        let provider = FakeProvider::default();
        let blobs = FakeBlobs::default();
        let store = FakeStore::default();
        let http = reqwest::Client::new();

        let mut record = processing_record("t1");
        record.requested_duration_seconds = Some(10.0);
        store.insert(record.clone());

        // A concurrent failure lands between our status pre-check and the
        // conditional update.
        let stale = record.clone();
        store
            .mark_failed(record.id, &json!({"kie_callback": {"code": 500}}))
            .await
            .unwrap();

        let outcome = finalize_success(
            &deps(&provider, &blobs, &store, &http),
            &stale,
            &signal("t1", true, vec![format!("{}/a.mp4", server.uri())]),
        )
        .await
        .unwrap();

        assert!(!outcome.extended);
        assert_eq!(provider.extend_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.record(record.id).status, GenerationStatus::Failed);
    }

    #[tokio::test]
    async fn test_extension_cycle_rearchives_under_new_task() {
        let server = asset_server(&["/ext.mp4"]).await;
        let provider = FakeProvider::default();
        let blobs = FakeBlobs::default();
        let store = FakeStore::default();
        let http = reqwest::Client::new();

        let mut record = processing_record("t1");
        record.status = GenerationStatus::Extending;
        record.kie_task_id = Some("task-ext".to_string());
        record.generated_video_url = Some("https://signed.example.com/old".to_string());
        record.storage_path = Some("renders/ugc-ads/user-1/generated/old.mp4".to_string());
        let id = record.id;
        store.insert(record.clone());

        let outcome = finalize_success(
            &deps(&provider, &blobs, &store, &http),
            &record,
            &signal("task-ext", true, vec![format!("{}/ext.mp4", server.uri())]),
        )
        .await
        .unwrap();

        // extending records are still active: a new archival cycle runs
        assert_eq!(blobs.uploads.lock().unwrap().len(), 1);
        assert_ne!(
            outcome.storage_path.as_deref(),
            Some("renders/ugc-ads/user-1/generated/old.mp4")
        );
        assert_eq!(store.record(id).status, GenerationStatus::Completed);
    }

    #[test]
    fn test_should_extend_gating() {
        assert!(should_extend(Some(10.0), 6.0));
        assert!(!should_extend(Some(5.0), 6.0));
        assert!(!should_extend(Some(6.0), 6.0));
        assert!(!should_extend(None, 6.0));
    }
}
