//! Provider callback handler.
//!
//! The provider delivers at-least-once POST notifications when a task
//! finishes. The handler acknowledges with a 200 for every resolvable
//! payload; finalization failures are recorded on the record but never
//! surfaced to the provider, which would otherwise re-deliver a payload
//! we cannot process any better the second time.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use dcut_db::GenerationStore;
use dcut_models::{is_valid_task_id, GenerationRecord};

use crate::error::{ApiError, ApiResult};
use crate::finalize::{finalize_success, CompletionSignal, FinalizeDeps};
use crate::handlers::finalize_deps;
use crate::metrics;
use crate::state::AppState;

// ============================================================================
// Types
// ============================================================================

/// Callback payload delivered by the provider.
#[derive(Debug, Deserialize)]
pub struct CallbackPayload {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<CallbackData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackData {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub info: Option<CallbackInfo>,
    #[serde(default)]
    pub fallback_flag: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackInfo {
    #[serde(default)]
    pub result_urls: Option<Vec<String>>,
    #[serde(default)]
    pub origin_urls: Option<Vec<String>>,
    #[serde(default)]
    pub resolution: Option<String>,
}

/// Acknowledgement body the provider expects.
#[derive(Debug, Serialize)]
pub struct CallbackAck {
    pub code: i64,
    pub msg: String,
}

impl CallbackAck {
    fn ok(msg: &str) -> Json<Self> {
        Json(Self {
            code: 200,
            msg: msg.to_string(),
        })
    }
}

// ============================================================================
// Handler
// ============================================================================

/// Handle a provider completion callback.
pub async fn kie_veo_callback(
    State(state): State<AppState>,
    Json(payload): Json<CallbackPayload>,
) -> ApiResult<Json<CallbackAck>> {
    let task_id = payload
        .data
        .as_ref()
        .and_then(|d| d.task_id.as_deref())
        .unwrap_or("")
        .to_string();

    if !is_valid_task_id(&task_id) {
        metrics::record_callback_received("invalid");
        return Err(ApiError::bad_request("Missing or invalid taskId"));
    }

    let record = state
        .generations
        .find_by_task_id(&task_id)
        .await?
        .ok_or_else(|| {
            metrics::record_callback_received("unresolved");
            ApiError::not_found(format!("No generation record for task {task_id}"))
        })?;

    info!(
        "Callback for task {} (record {}): code={}",
        task_id, record.id, payload.code
    );

    if payload.code != 200 {
        metrics::record_callback_received("failed");
        state
            .generations
            .mark_failed(
                record.id,
                &json!({
                    "kie_callback": { "code": payload.code, "msg": payload.msg }
                }),
            )
            .await?;
        return Ok(CallbackAck::ok("ack"));
    }

    metrics::record_callback_received("success");

    let data = payload.data.unwrap_or_default();
    let info = data.info.unwrap_or_default();
    let signal = CompletionSignal {
        task_id: task_id.to_string(),
        fallback_flag: data.fallback_flag,
        result_urls: info.result_urls.unwrap_or_default(),
        diagnostics: json!({
            "kie_callback": {
                "code": payload.code,
                "msg": payload.msg,
                "fallbackFlag": data.fallback_flag,
                "resolution": info.resolution,
                "originUrls": info.origin_urls,
            }
        }),
    };

    // Extensions chained from here should call back too.
    let deps = finalize_deps(&state, Some(state.config.callback_url()));
    finalize_best_effort(&deps, &record, &signal).await;

    Ok(CallbackAck::ok("success"))
}

/// Run finalization for an acknowledged callback.
///
/// Failures are logged and recorded on the record, never surfaced: the
/// provider gets its 200 either way, and the record stays in its prior
/// state so a later poll can retry archival.
async fn finalize_best_effort(
    deps: &FinalizeDeps<'_>,
    record: &GenerationRecord,
    signal: &CompletionSignal,
) {
    if let Err(e) = finalize_success(deps, record, signal).await {
        warn!("Finalization for record {} failed: {}", record.id, e);
        metrics::record_finalize(false);
        if let Err(e) = deps
            .store
            .append_metadata(record.id, &json!({ "finalize_error": e.to_string() }))
            .await
        {
            warn!("Could not record finalize error for {}: {}", record.id, e);
        }
    }
}
