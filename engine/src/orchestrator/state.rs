//! Task execution state machine
//!
//! ```text
//! RECEIVED -> ROUTED -> RUNNING(0) -> RUNNING(1) -> ... -> COMPLETED
//!    |           |           |
//!    v           v           +-> PARTIAL_FAILURE | CANCELLED
//! REJECTED    REJECTED
//! ```
//!
//! States are never revisited. An illegal transition is an engine bug and
//! surfaces as [`EngineError::Internal`].

use careerflow_sdk::errors::EngineError;
use careerflow_sdk::types::TaskStatus;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Received,
    Routed,
    Running(usize),
    Completed,
    PartialFailure,
    Rejected,
    Cancelled,
}

impl ExecutionState {
    /// Status reported for a terminal state
    pub fn terminal_status(&self) -> Option<TaskStatus> {
        match self {
            Self::Completed => Some(TaskStatus::Completed),
            Self::PartialFailure => Some(TaskStatus::PartialFailure),
            Self::Rejected => Some(TaskStatus::Rejected),
            Self::Cancelled => Some(TaskStatus::Cancelled),
            Self::Received | Self::Routed | Self::Running(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal_status().is_some()
    }

    fn allows(&self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        match (*self, next) {
            (Received, Routed) | (Received, Rejected) => true,
            // Busy sessions and unusable session stores are refused before any stage
            (Routed, Running(0)) | (Routed, Rejected) => true,
            (Running(i), Running(j)) => j == i + 1,
            (Running(_), Completed) | (Running(_), PartialFailure) | (Running(_), Cancelled) => {
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => f.write_str("RECEIVED"),
            Self::Routed => f.write_str("ROUTED"),
            Self::Running(i) => write!(f, "RUNNING({})", i),
            Self::Completed => f.write_str("COMPLETED"),
            Self::PartialFailure => f.write_str("PARTIAL_FAILURE"),
            Self::Rejected => f.write_str("REJECTED"),
            Self::Cancelled => f.write_str("CANCELLED"),
        }
    }
}

/// Current state of one execution plus the path it took
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: ExecutionState,
    history: Vec<ExecutionState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: ExecutionState::Received,
            history: vec![ExecutionState::Received],
        }
    }

    pub fn current(&self) -> ExecutionState {
        self.current
    }

    pub fn history(&self) -> &[ExecutionState] {
        &self.history
    }

    pub fn transition(&mut self, next: ExecutionState) -> Result<(), EngineError> {
        if !self.current.allows(next) {
            return Err(EngineError::Internal(format!(
                "illegal state transition {} -> {}",
                self.current, next
            )));
        }
        self.current = next;
        self.history.push(next);
        Ok(())
    }
}
