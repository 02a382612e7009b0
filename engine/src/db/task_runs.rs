/// Task run history
///
/// One row per executed task with its terminal status and the full JSON
/// response, so past runs can be listed and replayed from the CLI.
use super::now_millis;
use anyhow::{Context, Result};
use careerflow_sdk::types::TaskResponse;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Summary row of a past task execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRun {
    pub task_id: String,
    pub session_id: Option<String>,
    pub task_type: String,
    pub status: String,
    pub stages: i64,
    pub duration_ms: i64,
    pub error: Option<String>,
    pub created_at: i64,
}

pub struct TaskRunRepository {
    pool: SqlitePool,
}

impl TaskRunRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record the outcome of a task execution
    pub async fn record(&self, response: &TaskResponse) -> Result<()> {
        let encoded = serde_json::to_string(response).context("Failed to serialize response")?;
        let error = response.error.as_ref().map(|e| e.message.clone());

        sqlx::query(
            "INSERT OR REPLACE INTO task_runs
                (task_id, session_id, task_type, status, stages, duration_ms, error, response, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&response.task_id)
        .bind(&response.session_id)
        .bind(&response.task_type)
        .bind(response.status.as_str())
        .bind(response.trace.len() as i64)
        .bind(response.trace.total_duration_ms() as i64)
        .bind(error)
        .bind(encoded)
        .bind(now_millis())
        .execute(&self.pool)
        .await
        .context("Failed to record task run")?;

        Ok(())
    }

    /// Most recent runs first
    pub async fn recent(&self, limit: i64) -> Result<Vec<TaskRun>> {
        let rows = sqlx::query(
            "SELECT task_id, session_id, task_type, status, stages, duration_ms, error, created_at
             FROM task_runs ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list task runs")?;

        Ok(rows
            .into_iter()
            .map(|row| TaskRun {
                task_id: row.get("task_id"),
                session_id: row.get("session_id"),
                task_type: row.get("task_type"),
                status: row.get("status"),
                stages: row.get("stages"),
                duration_ms: row.get("duration_ms"),
                error: row.get("error"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    /// Full stored response of one run
    pub async fn get_response(&self, task_id: &str) -> Result<Option<TaskResponse>> {
        let encoded: Option<String> =
            sqlx::query_scalar("SELECT response FROM task_runs WHERE task_id = ?")
                .bind(task_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to load task run")?;

        encoded
            .map(|e| serde_json::from_str(&e).context("Corrupt task run record"))
            .transpose()
    }
}
