//! Error types and handling
//!
//! This module provides the error taxonomy shared by the engine, its agents
//! and its stores. Every error implements [`EngineErrorExt`], which exposes a
//! stable machine-readable [`ErrorKind`], a user-facing hint and whether the
//! caller can recover by resubmitting.
//!
//! # Messages
//!
//! Error messages never include API keys or raw model output. Agent
//! diagnostics are carried verbatim because they are produced by the engine's
//! own agents.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Extension trait for engine errors
pub trait EngineErrorExt {
    /// Stable classification used in JSON diagnostics
    fn kind(&self) -> ErrorKind;

    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be fixed by resubmitting the task (possibly
    /// against a fresh session). Non-recoverable errors indicate a wiring or
    /// configuration problem.
    fn is_recoverable(&self) -> bool;
}

/// Machine-readable error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownTaskType,
    MissingContext,
    AgentFailed,
    AgentDegraded,
    SessionExpired,
    SessionNotFound,
    SessionBusy,
    PersistenceWarning,
    StageTimeout,
    StoreTimeout,
    Cancelled,
    InvalidInput,
    Config,
    Database,
    LlmProvider,
    JobSearch,
    Network,
    Io,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownTaskType => "unknown_task_type",
            Self::MissingContext => "missing_context",
            Self::AgentFailed => "agent_failed",
            Self::AgentDegraded => "agent_degraded",
            Self::SessionExpired => "session_expired",
            Self::SessionNotFound => "session_not_found",
            Self::SessionBusy => "session_busy",
            Self::PersistenceWarning => "persistence_warning",
            Self::StageTimeout => "stage_timeout",
            Self::StoreTimeout => "store_timeout",
            Self::Cancelled => "cancelled",
            Self::InvalidInput => "invalid_input",
            Self::Config => "config",
            Self::Database => "database",
            Self::LlmProvider => "llm_provider",
            Self::JobSearch => "job_search",
            Self::Network => "network",
            Self::Io => "io",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Routing**: the task type is outside the closed enumeration
/// - **Pipeline**: stage contract violations, agent failures, timeouts
/// - **Session**: expiry, absence, concurrent use
/// - **Durability**: long-term store writes that failed after a stage succeeded
/// - **Collaborators**: configuration, database, language model, job board
///
/// # Examples
///
/// ```
/// use careerflow_sdk::errors::{EngineError, EngineErrorExt, ErrorKind};
///
/// let error = EngineError::UnknownTaskType("book_flight".to_string());
/// assert_eq!(error.kind(), ErrorKind::UnknownTaskType);
/// assert!(!error.is_recoverable());
///
/// let busy = EngineError::SessionBusy("abc".to_string());
/// assert!(busy.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Routing errors
    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    // Pipeline errors
    #[error("Stage {stage} ({capability}) is missing required context field '{field}'")]
    MissingContext {
        stage: usize,
        capability: String,
        field: String,
    },

    #[error("Agent {agent} failed: {reason}")]
    AgentFailed { agent: String, reason: String },

    #[error("Agent {agent} returned a degraded result: {reason}")]
    AgentDegraded { agent: String, reason: String },

    #[error("Agent {1} gave no result within {0} seconds")]
    StageTimeout(u64, String),

    #[error("Session store did not answer within {0} seconds: {1}")]
    StoreTimeout(u64, String),

    #[error("Task cancelled before stage {0}")]
    Cancelled(usize),

    // Session errors
    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session is busy: {0}")]
    SessionBusy(String),

    // Durability errors
    #[error("Failed to persist {artifact}: {reason}")]
    PersistenceWarning { artifact: String, reason: String },

    // Input screening errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    // Job board errors
    #[error("Job search error: {0}")]
    JobSearch(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Engine bugs such as an illegal state transition
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineErrorExt for EngineError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTaskType(_) => ErrorKind::UnknownTaskType,
            Self::MissingContext { .. } => ErrorKind::MissingContext,
            Self::AgentFailed { .. } => ErrorKind::AgentFailed,
            Self::AgentDegraded { .. } => ErrorKind::AgentDegraded,
            Self::StageTimeout(..) => ErrorKind::StageTimeout,
            Self::StoreTimeout(..) => ErrorKind::StoreTimeout,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::SessionExpired(_) => ErrorKind::SessionExpired,
            Self::SessionNotFound(_) => ErrorKind::SessionNotFound,
            Self::SessionBusy(_) => ErrorKind::SessionBusy,
            Self::PersistenceWarning { .. } => ErrorKind::PersistenceWarning,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Config(_) => ErrorKind::Config,
            Self::Database(_) => ErrorKind::Database,
            Self::LLMProvider(_) => ErrorKind::LlmProvider,
            Self::JobSearch(_) => ErrorKind::JobSearch,
            Self::Network(_) => ErrorKind::Network,
            Self::Io(_) => ErrorKind::Io,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    fn user_hint(&self) -> &str {
        match self {
            // Routing errors
            Self::UnknownTaskType(_) => {
                "Use one of: analyze_profile, find_jobs, create_application, full_journey"
            }

            // Pipeline errors
            Self::MissingContext { .. } => {
                "A previous step has not been run for this session. Run it first"
            }
            Self::AgentFailed { .. } => {
                "A pipeline step failed. Earlier results were kept; resubmit to retry"
            }
            Self::AgentDegraded { .. } => "A pipeline step returned partial results",
            Self::StageTimeout(..) => "A pipeline step took too long. Try again",
            Self::StoreTimeout(..) => "The session store is slow or unavailable. Try again",
            Self::Cancelled(_) => "The task was cancelled. Earlier results were kept",

            // Session errors
            Self::SessionExpired(_) => "Session expired. Resubmit with fresh input",
            Self::SessionNotFound(_) => "Session not found. Resubmit without a session id",
            Self::SessionBusy(_) => "Another task is running for this session. Try again shortly",

            // Durability errors
            Self::PersistenceWarning { .. } => {
                "Results were produced but could not be saved permanently"
            }

            // Input screening errors
            Self::InvalidInput(_) => "The request was rejected by input screening",

            // Collaborator errors
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Database(_) => "Database operation failed. Check the data directory",
            Self::LLMProvider(_) => "LLM provider unavailable. Check your API key and network",
            Self::JobSearch(_) => "Job board unavailable. Try again later",
            Self::Network(_) => "Network operation failed. Check your connection",
            Self::Io(_) => "File system operation failed",
            Self::Internal(_) => "This is a bug in CareerFlow. Please report it",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Non-recoverable errors
            Self::UnknownTaskType(_)
            | Self::MissingContext { .. }
            | Self::InvalidInput(_)
            | Self::Config(_)
            | Self::Internal(_) => false,

            // All other errors are potentially recoverable
            _ => true,
        }
    }
}
