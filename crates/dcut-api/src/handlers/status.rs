//! Status poll handler.
//!
//! Client-driven fallback for lost callbacks: queries the provider
//! directly and, on success, runs the same finalization sequence the
//! callback handler uses. Transient provider failures map to a
//! `retry` response rather than an error status so clients keep polling.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use dcut_db::GenerationStore;
use dcut_kie::{RecordInfo, TaskState};
use dcut_models::{is_valid_task_id, GenerationRecord};

use crate::error::{ApiError, ApiResult};
use crate::finalize::{archive_asset, finalize_success, resolve_archival_url, CompletionSignal};
use crate::handlers::finalize_deps;
use crate::metrics;
use crate::state::AppState;

// ============================================================================
// Types
// ============================================================================

/// Status poll query params. At least one of the two must be given.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "taskId")]
    pub task_id: Option<String>,
    #[serde(rename = "recordId")]
    pub record_id: Option<String>,
}

/// Status poll response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
}

impl StatusResponse {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            msg: None,
            error_code: None,
            error_message: None,
            generated_video_url: None,
            storage_path: None,
        }
    }

    fn with_msg(status: &str, msg: impl Into<String>) -> Self {
        Self {
            msg: Some(msg.into()),
            ..Self::new(status)
        }
    }
}

// ============================================================================
// Handler
// ============================================================================

/// Poll the provider for a task's status and reconcile the record.
pub async fn kie_veo_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<StatusResponse>> {
    let (task_id, record) = resolve_target(state.generations.as_ref(), &query).await?;

    let response = match state.kie.record_info(&task_id).await {
        Ok(r) => r,
        Err(e) => {
            // Transient by contract: the client polls again later.
            metrics::record_status_poll("retry");
            warn!("Status query for {} failed: {}", task_id, e);
            return Ok(Json(StatusResponse::with_msg("retry", e.to_string())));
        }
    };

    if response.code != 200 {
        metrics::record_status_poll("unknown");
        return Ok(Json(StatusResponse::with_msg("unknown", response.msg)));
    }
    let Some(info) = response.data else {
        metrics::record_status_poll("unknown");
        return Ok(Json(StatusResponse::with_msg(
            "unknown",
            "Provider returned no task data",
        )));
    };

    match info.state() {
        TaskState::Pending => {
            metrics::record_status_poll("generating");
            Ok(Json(StatusResponse::new("generating")))
        }
        TaskState::Unknown => {
            metrics::record_status_poll("unknown");
            Ok(Json(StatusResponse::new("unknown")))
        }
        TaskState::Failed => {
            metrics::record_status_poll("failed");
            if let Some(ref record) = record {
                state
                    .generations
                    .mark_failed(
                        record.id,
                        &json!({
                            "kie_status": {
                                "successFlag": info.success_flag,
                                "errorCode": info.error_code,
                                "errorMessage": info.error_message,
                            }
                        }),
                    )
                    .await?;
            }
            Ok(Json(StatusResponse {
                error_code: info.error_code,
                error_message: info.error_message.clone(),
                ..StatusResponse::new("failed")
            }))
        }
        TaskState::Success => {
            metrics::record_status_poll("success");
            let signal = completion_signal(&task_id, &info);
            match record {
                Some(record) => {
                    let deps = finalize_deps(&state, None);
                    let outcome = finalize_success(&deps, &record, &signal).await?;
                    info!(
                        "Poll finalized record {} (extended={})",
                        record.id, outcome.extended
                    );
                    let status = if outcome.extended { "extending" } else { "completed" };
                    Ok(Json(StatusResponse {
                        generated_video_url: outcome.generated_video_url,
                        storage_path: outcome.storage_path,
                        ..StatusResponse::new(status)
                    }))
                }
                None => archive_orphan(&state, &signal).await,
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Resolve which task to query and which record (if any) to reconcile.
///
/// Runs before any provider I/O: an unresolvable target never costs a
/// provider round-trip.
async fn resolve_target(
    store: &dyn GenerationStore,
    query: &StatusQuery,
) -> ApiResult<(String, Option<GenerationRecord>)> {
    if let Some(ref record_id) = query.record_id {
        let id = Uuid::parse_str(record_id)
            .map_err(|_| ApiError::bad_request("Invalid recordId format"))?;
        let record = store
            .get(id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("No generation record {id}")))?;
        let task_id = record
            .task_id()
            .ok_or_else(|| ApiError::bad_request("Record has no provider task id"))?
            .to_string();
        return Ok((task_id, Some(record)));
    }

    if let Some(ref task_id) = query.task_id {
        if !is_valid_task_id(task_id) {
            return Err(ApiError::bad_request("Invalid taskId format"));
        }
        let record = store.find_by_task_id(task_id).await?;
        return Ok((task_id.clone(), record));
    }

    Err(ApiError::bad_request(
        "Either taskId or recordId query param is required",
    ))
}

fn completion_signal(task_id: &str, info: &RecordInfo) -> CompletionSignal {
    CompletionSignal {
        task_id: task_id.to_string(),
        fallback_flag: info.fallback_flag,
        result_urls: info
            .response
            .as_ref()
            .and_then(|r| r.result_urls.clone())
            .unwrap_or_default(),
        diagnostics: json!({
            "polled": true,
            "kie_status": {
                "successFlag": info.success_flag,
                "fallbackFlag": info.fallback_flag,
                "resolution": info.response.as_ref().and_then(|r| r.resolution.clone()),
                "completeTime": info.complete_time,
            }
        }),
    }
}

/// Archive a finished task that no record claims.
///
/// Keeps the asset retrievable for manual reconciliation without touching
/// the database or submitting extensions.
async fn archive_orphan(
    state: &AppState,
    signal: &CompletionSignal,
) -> ApiResult<Json<StatusResponse>> {
    let deps = finalize_deps(state, None);
    let Some(url) = resolve_archival_url(deps.provider, signal).await else {
        return Ok(Json(StatusResponse::new("completed")));
    };

    let (key, signed) = archive_asset(
        deps.http,
        deps.blobs,
        "unknown",
        &url,
        deps.signed_url_ttl,
    )
    .await?;

    info!("Archived orphan task {} to {}", signal.task_id, key);
    Ok(Json(StatusResponse {
        generated_video_url: Some(signed),
        storage_path: Some(key),
        ..StatusResponse::new("completed")
    }))
}
