//! Per-session leases
//!
//! At most one execution holds a session at a time. What happens to a second
//! caller depends on the [`BusyPolicy`]: `reject` fails fast with
//! `SessionBusy`, `queue` waits in arrival order.

use crate::config::BusyPolicy;
use careerflow_sdk::errors::EngineError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Table entry: the session's lock and how many holders or waiters use it
struct Slot {
    lock: Arc<AsyncMutex<()>>,
    users: usize,
}

type LeaseMap = Arc<Mutex<HashMap<String, Slot>>>;

/// Lease table shared by all executions of one orchestrator
#[derive(Clone)]
pub struct SessionLeases {
    policy: BusyPolicy,
    locks: LeaseMap,
}

/// Counted use of a table entry; the entry goes away with its last user,
/// including a waiter whose future is dropped while queued
struct SlotRef {
    session_id: String,
    locks: LeaseMap,
    lock: Arc<AsyncMutex<()>>,
}

impl Drop for SlotRef {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = locks.get_mut(&self.session_id) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                locks.remove(&self.session_id);
            }
        }
    }
}

/// Exclusive hold on a session, released on drop
pub struct SessionLease {
    // Field order matters: the guard unlocks before the slot count drops
    _guard: OwnedMutexGuard<()>,
    slot: SlotRef,
}

impl SessionLeases {
    pub fn new(policy: BusyPolicy) -> Self {
        Self {
            policy,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn policy(&self) -> BusyPolicy {
        self.policy
    }

    fn checkout(&self, session_id: &str) -> SlotRef {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = locks.entry(session_id.to_string()).or_insert_with(|| Slot {
            lock: Arc::new(AsyncMutex::new(())),
            users: 0,
        });
        slot.users += 1;
        SlotRef {
            session_id: session_id.to_string(),
            locks: Arc::clone(&self.locks),
            lock: Arc::clone(&slot.lock),
        }
    }

    /// Take the session according to the busy policy
    pub async fn acquire(&self, session_id: &str) -> Result<SessionLease, EngineError> {
        let slot = self.checkout(session_id);
        let guard = match self.policy {
            BusyPolicy::Reject => match Arc::clone(&slot.lock).try_lock_owned() {
                Ok(guard) => guard,
                Err(_) => return Err(EngineError::SessionBusy(session_id.to_string())),
            },
            BusyPolicy::Queue => {
                debug!("Waiting for session {}", session_id);
                Arc::clone(&slot.lock).lock_owned().await
            }
        };
        Ok(SessionLease {
            _guard: guard,
            slot,
        })
    }

    /// Whether an execution currently holds the session
    pub fn is_held(&self, session_id: &str) -> bool {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .get(session_id)
            .map(|slot| slot.lock.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of sessions with a holder or waiter
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl SessionLease {
    pub fn session_id(&self) -> &str {
        &self.slot.session_id
    }
}
