//! Generation record and status state machine.
//!
//! One record per user-initiated video generation request. Records are
//! created by the submission flow and mutated only by the callback handler
//! and the status poller; they are never deleted by this subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Generation lifecycle status.
///
/// Transitions are monotonic except the `completed -> extending` loop,
/// which starts a second archival cycle under a new provider task id:
///
/// ```text
/// processing --pending--> processing
/// processing --success--> completed
/// processing --failure--> failed
/// completed  --extend submitted--> extending
/// extending  --success--> completed
/// extending  --failure--> failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    /// Created but not yet submitted to the provider
    #[default]
    Draft,
    /// Submitted, awaiting a callback or poll result
    Processing,
    /// Provider succeeded and the asset (if any) was archived
    Completed,
    /// A continuation job was submitted, awaiting its result
    Extending,
    /// Provider-side failure or terminal internal failure
    Failed,
}

impl GenerationStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Draft => "draft",
            GenerationStatus::Processing => "processing",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Extending => "extending",
            GenerationStatus::Failed => "failed",
        }
    }

    /// Parse a status string as stored in the database.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(GenerationStatus::Draft),
            "processing" => Some(GenerationStatus::Processing),
            "completed" => Some(GenerationStatus::Completed),
            "extending" => Some(GenerationStatus::Extending),
            "failed" => Some(GenerationStatus::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    ///
    /// `completed` is terminal only when no extension was triggered;
    /// `extending` always expects a second callback/poll cycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }

    /// Check whether a finalization attempt may still update this record.
    ///
    /// Used as the optimistic-update guard: once a record left the active
    /// states, a concurrent finalizer already won.
    pub fn is_active(&self) -> bool {
        matches!(self, GenerationStatus::Processing | GenerationStatus::Extending)
    }
}

impl std::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A video generation record (`video_generations` row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    /// Unique record identifier
    pub id: Uuid,
    /// Owning user; immutable
    pub user_id: String,
    /// Provider-assigned task id; rotated when an extension is submitted
    pub kie_task_id: Option<String>,
    /// Current lifecycle status
    pub status: GenerationStatus,
    /// Requested clip length; drives the auto-extend decision
    pub requested_duration_seconds: Option<f64>,
    /// Signed URL to the archived asset; set only on success
    pub generated_video_url: Option<String>,
    /// Blob-store key matching `generated_video_url`
    pub storage_path: Option<String>,
    /// Open-ended diagnostics map; updated with append-only merges
    pub metadata: Value,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the record was last updated
    pub updated_at: DateTime<Utc>,
}

impl GenerationRecord {
    /// Resolve the provider task id, tolerating both representations.
    ///
    /// Older rows carry the task id only under `metadata.kie.taskId`; newer
    /// rows use the dedicated column. The column wins when both are set.
    pub fn task_id(&self) -> Option<&str> {
        if let Some(ref id) = self.kie_task_id {
            if !id.is_empty() {
                return Some(id.as_str());
            }
        }
        self.metadata
            .get("kie")
            .and_then(|k| k.get("taskId"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Resolve the requested duration, tolerating the legacy metadata slot.
    pub fn requested_duration(&self) -> Option<f64> {
        self.requested_duration_seconds.or_else(|| {
            self.metadata
                .get("requested_duration")
                .and_then(|v| v.as_f64())
        })
    }

    /// Whether a finalization already produced an archived asset.
    pub fn has_archived_asset(&self) -> bool {
        self.generated_video_url.is_some() && self.storage_path.is_some()
    }
}

/// Validate a provider task id to prevent injection via callback payloads.
///
/// Valid format: alphanumeric characters, hyphens and underscores, 1-128 chars.
pub fn is_valid_task_id(id: &str) -> bool {
    if id.is_empty() || id.len() > 128 {
        return false;
    }
    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
