//! Generation submission handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use dcut_db::GenerationStore;
use dcut_kie::{AspectRatio, GenerateVideoParams, GenerationType, KieModel};
use dcut_models::GenerationRecord;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// Types
// ============================================================================

/// Generation request body.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub user_id: String,
    pub prompt: String,
    #[serde(default)]
    pub model: Option<KieModel>,
    #[serde(default)]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default)]
    pub generation_type: Option<GenerationType>,
    #[serde(default)]
    pub image_urls: Option<Vec<String>>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub seeds: Option<u32>,
    #[serde(default)]
    pub watermark: Option<String>,
}

const MAX_PROMPT_LEN: usize = 5000;

// ============================================================================
// Handlers
// ============================================================================

/// Submit a new generation job.
///
/// Creates a draft record first so a provider-side failure still leaves an
/// auditable row, then submits and flips the record to `processing`.
pub async fn create_generation(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<(StatusCode, Json<GenerationRecord>)> {
    validate_request(&request)?;

    let record = state
        .generations
        .create(
            &request.user_id,
            request.duration_seconds,
            &json!({ "prompt": request.prompt }),
        )
        .await?;

    let mut params = GenerateVideoParams::new(&request.prompt);
    params.model = request.model.unwrap_or_default();
    params.aspect_ratio = request.aspect_ratio.unwrap_or_default();
    params.generation_type = request.generation_type;
    params.image_urls = request.image_urls;
    params.seeds = request.seeds;
    params.watermark = request.watermark;
    params.callback_url = Some(state.config.callback_url());

    let response = match state.kie.generate(&params).await {
        Ok(r) => r,
        Err(e) => {
            warn!("Generation submit for {} failed: {}", record.id, e);
            state
                .generations
                .mark_failed(record.id, &json!({ "submit_error": e.to_string() }))
                .await?;
            return Err(ApiError::bad_gateway(e.to_string()));
        }
    };

    let Some(task_id) = response.task_id() else {
        warn!(
            "Generation for {} rejected: code={} msg={}",
            record.id, response.code, response.msg
        );
        state
            .generations
            .mark_failed(
                record.id,
                &json!({
                    "kie_generate": { "code": response.code, "msg": response.msg }
                }),
            )
            .await?;
        return Err(ApiError::bad_gateway(format!(
            "Provider rejected the job: {}",
            response.msg
        )));
    };

    state.generations.mark_submitted(record.id, task_id).await?;
    info!("Generation {} submitted as task {}", record.id, task_id);

    let record = state
        .generations
        .get(record.id)
        .await?
        .ok_or_else(|| ApiError::internal("Submitted record vanished"))?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// Fetch a generation record by id.
pub async fn get_generation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<GenerationRecord>> {
    let record = state
        .generations
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("No generation record {id}")))?;
    Ok(Json(record))
}

// ============================================================================
// Helpers
// ============================================================================

fn validate_request(request: &GenerateRequest) -> ApiResult<()> {
    if request.user_id.trim().is_empty() {
        return Err(ApiError::bad_request("user_id is required"));
    }
    if request.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("prompt is required"));
    }
    if request.prompt.len() > MAX_PROMPT_LEN {
        return Err(ApiError::bad_request(format!(
            "prompt cannot exceed {} characters",
            MAX_PROMPT_LEN
        )));
    }
    if let Some(duration) = request.duration_seconds {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(ApiError::bad_request("duration_seconds must be positive"));
        }
    }
    Ok(())
}
