//! SQLite-backed session store
//!
//! Sessions, their fields and their workspace entries live in three tables
//! linked by `ON DELETE CASCADE`, so deleting or purging the session row
//! removes fields and log in the same statement. Deadlines are epoch
//! milliseconds compared against the wall clock.
//!
//! Writes that may recreate a session start with a write statement so the
//! transaction takes SQLite's write lock up front.

use super::{ContextStore, Result, SessionInfo, SessionStore, StoreError, WorkspaceLog};
use crate::db::now_millis;
use async_trait::async_trait;
use careerflow_sdk::types::{Capability, ContextMap, WorkspaceEntry};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use tracing::debug;

pub struct SqliteSessionStore {
    pool: SqlitePool,
    ttl: Duration,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn ttl_millis(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// Classify why a session is not writable/readable
    async fn missing(&self, session: &str) -> StoreError {
        let expires_at: std::result::Result<Option<i64>, _> =
            sqlx::query_scalar("SELECT expires_at FROM sessions WHERE session_id = ?")
                .bind(session)
                .fetch_optional(&self.pool)
                .await;

        match expires_at {
            Ok(Some(_)) => StoreError::SessionExpired(session.to_string()),
            Ok(None) => StoreError::SessionNotFound(session.to_string()),
            Err(e) => e.into(),
        }
    }

    /// Check the session is live, using the given executor
    async fn check_live<'e, E>(executor: E, session: &str) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let expires_at: Option<i64> =
            sqlx::query_scalar("SELECT expires_at FROM sessions WHERE session_id = ?")
                .bind(session)
                .fetch_optional(executor)
                .await?;

        match expires_at {
            None => Err(StoreError::SessionNotFound(session.to_string())),
            Some(deadline) if deadline <= now_millis() => {
                Err(StoreError::SessionExpired(session.to_string()))
            }
            Some(_) => Ok(()),
        }
    }

    /// Drop an expired row for `session` and make sure a live one exists
    async fn recreate_if_needed(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        session: &str,
        refresh: bool,
    ) -> Result<()> {
        let now = now_millis();
        let deadline = now.saturating_add(self.ttl_millis());

        let purged = sqlx::query("DELETE FROM sessions WHERE session_id = ? AND expires_at <= ?")
            .bind(session)
            .bind(now)
            .execute(&mut **tx)
            .await?;
        if purged.rows_affected() > 0 {
            debug!("Recreating expired session {}", session);
        }

        let upsert = if refresh {
            "INSERT INTO sessions (session_id, created_at, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET expires_at = excluded.expires_at"
        } else {
            "INSERT INTO sessions (session_id, created_at, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(session_id) DO NOTHING"
        };
        sqlx::query(upsert)
            .bind(session)
            .bind(now)
            .bind(deadline)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    async fn upsert_field<'e, E>(
        executor: E,
        session: &str,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query(
            "INSERT INTO session_fields (session_id, field, value) VALUES (?, ?, ?)
             ON CONFLICT(session_id, field) DO UPDATE SET value = excluded.value",
        )
        .bind(session)
        .bind(field)
        .bind(serde_json::to_string(value)?)
        .execute(executor)
        .await?;
        Ok(())
    }

    async fn insert_entry<'e, E>(executor: E, session: &str, entry: &WorkspaceEntry) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query(
            "INSERT INTO workspace_entries (session_id, agent, capability, timestamp, payload)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(session)
        .bind(&entry.agent)
        .bind(entry.capability.as_str())
        .bind(entry.timestamp.to_rfc3339())
        .bind(serde_json::to_string(&entry.payload)?)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Open a write transaction on `session` and write `fields` into it.
    ///
    /// Strict mode claims the live row with a no-op update, which also takes
    /// the write lock; lenient mode recreates an expired session first.
    async fn begin_fields(
        &self,
        session: &str,
        fields: &ContextMap,
        strict: bool,
    ) -> Result<sqlx::Transaction<'static, sqlx::Sqlite>> {
        let mut tx = self.pool.begin().await?;
        if strict {
            let claimed = sqlx::query(
                "UPDATE sessions SET expires_at = expires_at WHERE session_id = ? AND expires_at > ?",
            )
            .bind(session)
            .bind(now_millis())
            .execute(&mut *tx)
            .await?;
            if claimed.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(self.missing(session).await);
            }
        } else {
            self.recreate_if_needed(&mut tx, session, false).await?;
        }

        for (field, value) in fields {
            Self::upsert_field(&mut *tx, session, field, value).await?;
        }
        Ok(tx)
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

#[async_trait]
impl ContextStore for SqliteSessionStore {
    async fn ensure(&self, session: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.recreate_if_needed(&mut tx, session, true).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn put(&self, session: &str, field: &str, value: serde_json::Value) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.recreate_if_needed(&mut tx, session, false).await?;
        Self::upsert_field(&mut *tx, session, field, &value).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn put_strict(
        &self,
        session: &str,
        field: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO session_fields (session_id, field, value)
             SELECT ?, ?, ?
             WHERE EXISTS (SELECT 1 FROM sessions WHERE session_id = ? AND expires_at > ?)
             ON CONFLICT(session_id, field) DO UPDATE SET value = excluded.value",
        )
        .bind(session)
        .bind(field)
        .bind(serde_json::to_string(&value)?)
        .bind(session)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.missing(session).await);
        }
        Ok(())
    }

    async fn put_fields(&self, session: &str, fields: ContextMap, strict: bool) -> Result<()> {
        let tx = self.begin_fields(session, &fields, strict).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, session: &str, field: &str) -> Result<serde_json::Value> {
        let row = sqlx::query(
            "SELECT s.expires_at, f.value
             FROM sessions s
             LEFT JOIN session_fields f ON f.session_id = s.session_id AND f.field = ?
             WHERE s.session_id = ?",
        )
        .bind(field)
        .bind(session)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::SessionNotFound(session.to_string()))?;

        if row.get::<i64, _>("expires_at") <= now_millis() {
            return Err(StoreError::SessionExpired(session.to_string()));
        }

        let value: Option<String> = row.get("value");
        match value {
            Some(v) => Ok(serde_json::from_str(&v)?),
            None => Err(StoreError::FieldNotFound {
                session: session.to_string(),
                field: field.to_string(),
            }),
        }
    }

    async fn get_all(&self, session: &str) -> Result<ContextMap> {
        let mut tx = self.pool.begin().await?;
        Self::check_live(&mut *tx, session).await?;

        let rows = sqlx::query(
            "SELECT field, value FROM session_fields WHERE session_id = ? ORDER BY rowid",
        )
        .bind(session)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut fields = ContextMap::new();
        for row in rows {
            let value: String = row.get("value");
            fields.insert(row.get("field"), serde_json::from_str(&value)?);
        }
        Ok(fields)
    }

    async fn touch(&self, session: &str) -> Result<()> {
        let now = now_millis();
        let result = sqlx::query(
            "UPDATE sessions SET expires_at = ? WHERE session_id = ? AND expires_at > ?",
        )
        .bind(now.saturating_add(self.ttl_millis()))
        .bind(session)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.missing(session).await);
        }
        Ok(())
    }

    async fn info(&self, session: &str) -> Result<SessionInfo> {
        let row = sqlx::query("SELECT created_at, expires_at FROM sessions WHERE session_id = ?")
            .bind(session)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::SessionNotFound(session.to_string()))?;

        let remaining = row.get::<i64, _>("expires_at") - now_millis();
        if remaining <= 0 {
            return Err(StoreError::SessionExpired(session.to_string()));
        }

        Ok(SessionInfo {
            session_id: session.to_string(),
            created_at: from_millis(row.get("created_at")),
            expires_in: Duration::from_millis(remaining as u64),
        })
    }

    async fn delete(&self, session: &str) -> Result<bool> {
        let now = now_millis();
        let mut tx = self.pool.begin().await?;

        let live = sqlx::query("DELETE FROM sessions WHERE session_id = ? AND expires_at > ?")
            .bind(session)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(session)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(live.rows_affected() > 0)
    }

    async fn purge_expired(&self) -> Result<usize> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }
}

#[async_trait]
impl WorkspaceLog for SqliteSessionStore {
    async fn append(&self, session: &str, entry: WorkspaceEntry) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO workspace_entries (session_id, agent, capability, timestamp, payload)
             SELECT ?, ?, ?, ?, ?
             WHERE EXISTS (SELECT 1 FROM sessions WHERE session_id = ? AND expires_at > ?)",
        )
        .bind(session)
        .bind(&entry.agent)
        .bind(entry.capability.as_str())
        .bind(entry.timestamp.to_rfc3339())
        .bind(serde_json::to_string(&entry.payload)?)
        .bind(session)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.missing(session).await);
        }
        Ok(())
    }

    async fn read_all(&self, session: &str) -> Result<Vec<WorkspaceEntry>> {
        let mut tx = self.pool.begin().await?;
        Self::check_live(&mut *tx, session).await?;

        let rows = sqlx::query(
            "SELECT agent, capability, timestamp, payload FROM workspace_entries
             WHERE session_id = ? ORDER BY id",
        )
        .bind(session)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        rows.into_iter()
            .map(|row| -> Result<WorkspaceEntry> {
                let capability: String = row.get("capability");
                let timestamp: String = row.get("timestamp");
                let payload: String = row.get("payload");
                Ok(WorkspaceEntry {
                    session_id: session.to_string(),
                    agent: row.get("agent"),
                    capability: capability
                        .parse::<Capability>()
                        .map_err(|e| StoreError::Backend(e.to_string()))?,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .map_err(|e| StoreError::Backend(format!("bad timestamp: {}", e)))?
                        .with_timezone(&Utc),
                    payload: serde_json::from_str(&payload)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn publish(
        &self,
        session: &str,
        fields: ContextMap,
        entry: WorkspaceEntry,
        strict: bool,
    ) -> Result<()> {
        let mut tx = self.begin_fields(session, &fields, strict).await?;
        Self::insert_entry(&mut *tx, session, &entry).await?;
        tx.commit().await?;
        Ok(())
    }
}
