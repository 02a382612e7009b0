//! Session memory: Context Store and Workspace Log
//!
//! Both contracts share one lifetime: a session. Every session carries a
//! single TTL; when it elapses the session's fields and its workspace log
//! become unreadable together, and an explicit delete removes both at once.
//! Both implementations here ([`InMemorySessionStore`],
//! [`SqliteSessionStore`]) implement the two traits on one type so that a
//! single lock or transaction covers fields and log.
//!
//! # Writes
//!
//! - `put` on an absent or expired session recreates it with a fresh TTL.
//! - `put_strict` fails with `SessionExpired`/`SessionNotFound` instead.
//! - Puts replace whole values per field; different fields never clobber
//!   each other.
//! - `put_fields` and [`SessionStore::publish`] are all-or-nothing, so a
//!   session expiring mid-write never holds half a stage's output.

use async_trait::async_trait;
use careerflow_sdk::errors::EngineError;
use careerflow_sdk::types::{ContextMap, WorkspaceEntry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub mod in_memory;
pub mod reaper;
pub mod sqlite;

pub use in_memory::InMemorySessionStore;
pub use reaper::spawn_reaper;
pub use sqlite::SqliteSessionStore;

/// Session store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Field '{field}' not found in session {session}")]
    FieldNotFound { session: String, field: String },

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the error means the data is not (or no longer) readable
    pub fn is_not_found(&self) -> bool {
        !matches!(self, Self::Backend(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Backend(format!("serialization: {}", e))
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SessionNotFound(s) => EngineError::SessionNotFound(s),
            StoreError::SessionExpired(s) => EngineError::SessionExpired(s),
            StoreError::FieldNotFound { session, field } => {
                EngineError::SessionNotFound(format!("{} (field '{}')", session, field))
            }
            StoreError::Backend(msg) => EngineError::Database(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Lifetime metadata of a live session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    /// Time left before expiry
    #[serde(serialize_with = "serialize_secs")]
    pub expires_in: Duration,
}

fn serialize_secs<S>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_u64(d.as_secs())
}

/// Per-session key-value state with a session-granular TTL
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Create the session if absent or expired, otherwise refresh its TTL
    async fn ensure(&self, session: &str) -> Result<()>;

    /// Write one field, (re)creating the session if needed
    async fn put(&self, session: &str, field: &str, value: serde_json::Value) -> Result<()>;

    /// Write one field of a session that must already be live
    async fn put_strict(&self, session: &str, field: &str, value: serde_json::Value)
        -> Result<()>;

    async fn get(&self, session: &str, field: &str) -> Result<serde_json::Value>;

    /// All fields in insertion order
    async fn get_all(&self, session: &str) -> Result<ContextMap>;

    /// Refresh the session's TTL
    async fn touch(&self, session: &str) -> Result<()>;

    async fn info(&self, session: &str) -> Result<SessionInfo>;

    /// Time left before the session expires
    async fn time_to_live(&self, session: &str) -> Result<Duration> {
        Ok(self.info(session).await?.expires_in)
    }

    /// Remove the session with its fields and workspace log; false if absent
    async fn delete(&self, session: &str) -> Result<bool>;

    /// Drop every expired session, returning how many were removed
    async fn purge_expired(&self) -> Result<usize>;

    /// Write several fields as one unit: either all land or none do.
    /// `strict` selects `put_strict` semantics for the session check.
    async fn put_fields(&self, session: &str, fields: ContextMap, strict: bool) -> Result<()>;
}

/// Append-only per-session record of published agent outputs
#[async_trait]
pub trait WorkspaceLog: Send + Sync {
    /// Append to a live session's log
    async fn append(&self, session: &str, entry: WorkspaceEntry) -> Result<()>;

    /// Full history in write order; a fresh call always starts from the
    /// beginning
    async fn read_all(&self, session: &str) -> Result<Vec<WorkspaceEntry>>;
}

/// A store providing both session contracts over one lifetime
#[async_trait]
pub trait SessionStore: ContextStore + WorkspaceLog {
    /// Merge a stage's fields and append its workspace entry as one unit.
    /// On error neither write is visible.
    async fn publish(
        &self,
        session: &str,
        fields: ContextMap,
        entry: WorkspaceEntry,
        strict: bool,
    ) -> Result<()>;
}
