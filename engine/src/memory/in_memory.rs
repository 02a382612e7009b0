//! Process-local session store
//!
//! Sessions live in a map guarded by a tokio `RwLock`. Deadlines use
//! `tokio::time::Instant`, so tests can drive expiry with a paused clock.
//! Expired sessions stay in the map (reading as expired) until the next
//! recreation or `purge_expired`.

use super::{ContextStore, Result, SessionInfo, SessionStore, StoreError, WorkspaceLog};
use async_trait::async_trait;
use careerflow_sdk::types::{ContextMap, WorkspaceEntry};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

struct SessionSlot {
    created_at: DateTime<Utc>,
    deadline: Instant,
    fields: ContextMap,
    workspace: Vec<WorkspaceEntry>,
}

impl SessionSlot {
    fn fresh(ttl: Duration) -> Self {
        Self {
            created_at: Utc::now(),
            deadline: Instant::now() + ttl,
            fields: ContextMap::new(),
            workspace: Vec::new(),
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// In-memory Context Store + Workspace Log
pub struct InMemorySessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, SessionSlot>>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of sessions that have not expired
    pub async fn live_sessions(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|slot| !slot.is_expired())
            .count()
    }

    fn live<'a>(
        sessions: &'a HashMap<String, SessionSlot>,
        session: &str,
    ) -> Result<&'a SessionSlot> {
        match sessions.get(session) {
            None => Err(StoreError::SessionNotFound(session.to_string())),
            Some(slot) if slot.is_expired() => Err(StoreError::SessionExpired(session.to_string())),
            Some(slot) => Ok(slot),
        }
    }

    fn live_mut<'a>(
        sessions: &'a mut HashMap<String, SessionSlot>,
        session: &str,
    ) -> Result<&'a mut SessionSlot> {
        match sessions.get_mut(session) {
            None => Err(StoreError::SessionNotFound(session.to_string())),
            Some(slot) if slot.is_expired() => Err(StoreError::SessionExpired(session.to_string())),
            Some(slot) => Ok(slot),
        }
    }

    /// Slot for a write that may recreate the session
    fn slot_for_write<'a>(
        &self,
        sessions: &'a mut HashMap<String, SessionSlot>,
        session: &str,
    ) -> &'a mut SessionSlot {
        let slot = sessions
            .entry(session.to_string())
            .or_insert_with(|| SessionSlot::fresh(self.ttl));
        if slot.is_expired() {
            debug!("Recreating expired session {}", session);
            *slot = SessionSlot::fresh(self.ttl);
        }
        slot
    }

    /// Target slot for a multi-field write, checked before anything changes
    fn slot_for_fields<'a>(
        &self,
        sessions: &'a mut HashMap<String, SessionSlot>,
        session: &str,
        strict: bool,
    ) -> Result<&'a mut SessionSlot> {
        if strict {
            Self::live_mut(sessions, session)
        } else {
            Ok(self.slot_for_write(sessions, session))
        }
    }
}

#[async_trait]
impl ContextStore for InMemorySessionStore {
    async fn ensure(&self, session: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let slot = self.slot_for_write(&mut sessions, session);
        slot.deadline = Instant::now() + self.ttl;
        Ok(())
    }

    async fn put(&self, session: &str, field: &str, value: serde_json::Value) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let slot = self.slot_for_write(&mut sessions, session);
        slot.fields.insert(field.to_string(), value);
        Ok(())
    }

    async fn put_strict(
        &self,
        session: &str,
        field: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let slot = Self::live_mut(&mut sessions, session)?;
        slot.fields.insert(field.to_string(), value);
        Ok(())
    }

    async fn put_fields(&self, session: &str, fields: ContextMap, strict: bool) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let slot = self.slot_for_fields(&mut sessions, session, strict)?;
        slot.fields.extend(fields);
        Ok(())
    }

    async fn get(&self, session: &str, field: &str) -> Result<serde_json::Value> {
        let sessions = self.sessions.read().await;
        Self::live(&sessions, session)?
            .fields
            .get(field)
            .cloned()
            .ok_or_else(|| StoreError::FieldNotFound {
                session: session.to_string(),
                field: field.to_string(),
            })
    }

    async fn get_all(&self, session: &str) -> Result<ContextMap> {
        let sessions = self.sessions.read().await;
        Ok(Self::live(&sessions, session)?.fields.clone())
    }

    async fn touch(&self, session: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let slot = Self::live_mut(&mut sessions, session)?;
        slot.deadline = Instant::now() + self.ttl;
        Ok(())
    }

    async fn info(&self, session: &str) -> Result<SessionInfo> {
        let sessions = self.sessions.read().await;
        let slot = Self::live(&sessions, session)?;
        Ok(SessionInfo {
            session_id: session.to_string(),
            created_at: slot.created_at,
            expires_in: slot.deadline.saturating_duration_since(Instant::now()),
        })
    }

    async fn delete(&self, session: &str) -> Result<bool> {
        let removed = self.sessions.write().await.remove(session);
        Ok(removed.is_some_and(|slot| !slot.is_expired()))
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| !slot.is_expired());
        Ok(before - sessions.len())
    }
}

#[async_trait]
impl WorkspaceLog for InMemorySessionStore {
    async fn append(&self, session: &str, entry: WorkspaceEntry) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        Self::live_mut(&mut sessions, session)?.workspace.push(entry);
        Ok(())
    }

    async fn read_all(&self, session: &str) -> Result<Vec<WorkspaceEntry>> {
        let sessions = self.sessions.read().await;
        Ok(Self::live(&sessions, session)?.workspace.clone())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn publish(
        &self,
        session: &str,
        fields: ContextMap,
        entry: WorkspaceEntry,
        strict: bool,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let slot = self.slot_for_fields(&mut sessions, session, strict)?;
        slot.fields.extend(fields);
        slot.workspace.push(entry);
        Ok(())
    }
}
