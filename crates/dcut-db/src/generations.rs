//! Generation record repository.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use dcut_models::{GenerationRecord, GenerationStatus};

use crate::error::DbResult;
use crate::store::GenerationStore;

const COLUMNS: &str = "id, user_id, kie_task_id, status, requested_duration_seconds, \
                       generated_video_url, storage_path, metadata, created_at, updated_at";

/// PostgreSQL implementation of `GenerationStore`.
#[derive(Clone)]
pub struct PgGenerationStore {
    pool: PgPool,
}

impl PgGenerationStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a draft record for a new generation request.
    pub async fn create(
        &self,
        user_id: &str,
        requested_duration_seconds: Option<f64>,
        metadata: &Value,
    ) -> DbResult<GenerationRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO video_generations (user_id, status, requested_duration_seconds, metadata) \
             VALUES ($1, 'draft', $2, $3) \
             RETURNING {COLUMNS}"
        ))
        .bind(user_id)
        .bind(requested_duration_seconds)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await?;

        let record = parse_row(row);
        info!("Created generation record {}", record.id);
        Ok(record)
    }

    /// Record a successful provider submission: set `processing` and store
    /// the task id in both representations.
    pub async fn mark_submitted(&self, id: Uuid, task_id: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE video_generations \
             SET status = 'processing', \
                 kie_task_id = $2, \
                 metadata = metadata || jsonb_build_object('kie', \
                     COALESCE(metadata->'kie', '{}'::jsonb) || jsonb_build_object('taskId', $2::text)), \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl GenerationStore for PgGenerationStore {
    async fn get(&self, id: Uuid) -> DbResult<Option<GenerationRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM video_generations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(parse_row))
    }

    async fn find_by_task_id(&self, task_id: &str) -> DbResult<Option<GenerationRecord>> {
        // Dedicated column first, then the legacy metadata path.
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM video_generations WHERE kie_task_id = $1 LIMIT 1"
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(Some(parse_row(row)));
        }

        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM video_generations \
             WHERE metadata -> 'kie' ->> 'taskId' = $1 LIMIT 1"
        ))
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(parse_row))
    }

    async fn mark_failed(&self, id: Uuid, patch: &Value) -> DbResult<()> {
        sqlx::query(
            "UPDATE video_generations \
             SET status = 'failed', metadata = metadata || $2::jsonb, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch)
        .execute(&self.pool)
        .await?;
        info!("Marked generation {} failed", id);
        Ok(())
    }

    async fn append_metadata(&self, id: Uuid, patch: &Value) -> DbResult<()> {
        sqlx::query(
            "UPDATE video_generations \
             SET metadata = metadata || $2::jsonb, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(patch)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_if_active(
        &self,
        id: Uuid,
        generated_video_url: Option<&str>,
        storage_path: Option<&str>,
        patch: &Value,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE video_generations \
             SET status = 'completed', \
                 generated_video_url = $2, \
                 storage_path = $3, \
                 metadata = metadata || $4::jsonb, \
                 updated_at = NOW() \
             WHERE id = $1 AND status IN ('processing', 'extending')",
        )
        .bind(id)
        .bind(generated_video_url)
        .bind(storage_path)
        .bind(patch)
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if !updated {
            warn!("Completion for {} skipped: record no longer active", id);
        }
        Ok(updated)
    }

    async fn mark_extending(&self, id: Uuid, new_task_id: &str, patch: &Value) -> DbResult<()> {
        sqlx::query(
            "UPDATE video_generations \
             SET status = 'extending', \
                 kie_task_id = $2, \
                 metadata = metadata || $3::jsonb, \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(new_task_id)
        .bind(patch)
        .execute(&self.pool)
        .await?;
        info!("Generation {} extending under task {}", id, new_task_id);
        Ok(())
    }
}

/// Parse a generation row into the domain type.
fn parse_row(row: sqlx::postgres::PgRow) -> GenerationRecord {
    let status: String = row.get("status");
    GenerationRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kie_task_id: row.get("kie_task_id"),
        status: GenerationStatus::parse(&status).unwrap_or(GenerationStatus::Draft),
        requested_duration_seconds: row.get("requested_duration_seconds"),
        generated_video_url: row.get("generated_video_url"),
        storage_path: row.get("storage_path"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
