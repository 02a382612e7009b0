//! Task, trace and response types
//!
//! These are the shapes that cross the engine boundary: what a caller
//! submits, what the orchestrator records while running a task, and what it
//! hands back.

use crate::errors::{EngineError, EngineErrorExt, ErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Insertion-ordered mapping of context field names to JSON values
pub type ContextMap = serde_json::Map<String, serde_json::Value>;

/// Closed enumeration of supported task types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    AnalyzeProfile,
    FindJobs,
    CreateApplication,
    FullJourney,
}

impl TaskType {
    pub const ALL: [TaskType; 4] = [
        TaskType::AnalyzeProfile,
        TaskType::FindJobs,
        TaskType::CreateApplication,
        TaskType::FullJourney,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalyzeProfile => "analyze_profile",
            Self::FindJobs => "find_jobs",
            Self::CreateApplication => "create_application",
            Self::FullJourney => "full_journey",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EngineError::UnknownTaskType(s.to_string()))
    }
}

/// Capability an agent provides to a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Analyze,
    Research,
    Personalize,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analyze => "analyze",
            Self::Research => "research",
            Self::Personalize => "personalize",
        }
    }
}

impl FromStr for Capability {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analyze" => Ok(Self::Analyze),
            "research" => Ok(Self::Research),
            "personalize" => Ok(Self::Personalize),
            other => Err(EngineError::InvalidInput(format!(
                "unknown capability '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound task submission as received from a caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub task_type: String,
    #[serde(default)]
    pub input_data: ContextMap,
}

impl TaskRequest {
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            session_id: None,
            task_type: task_type.into(),
            input_data: ContextMap::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.input_data.insert(key.into(), value);
        self
    }
}

/// Status reported by an agent for one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Ok,
    Degraded,
    Failed,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        }
    }

    /// Whether the stage produced usable output
    pub fn is_usable(&self) -> bool {
        !matches!(self, Self::Failed)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of a task execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Completed,
    PartialFailure,
    Rejected,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::PartialFailure => "PARTIAL_FAILURE",
            Self::Rejected => "REJECTED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stage's record in the execution trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub agent: String,
    pub capability: Capability,
    pub status: AgentStatus,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Ordered per-stage record of one task run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionTrace {
    entries: Vec<TraceEntry>,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&TraceEntry> {
        self.entries.last()
    }

    /// Total wall time spent inside agents
    pub fn total_duration_ms(&self) -> u64 {
        self.entries.iter().map(|e| e.duration_ms).sum()
    }
}

/// Structured explanation of an error or warning attached to a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    pub hint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl Diagnostic {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            hint: error.user_hint().to_string(),
            stage: None,
            agent: None,
        }
    }

    pub fn at_stage(mut self, stage: usize) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }
}

/// Result of one task execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub task_type: String,
    pub status: TaskStatus,
    pub result: ContextMap,
    pub trace: ExecutionTrace,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Diagnostic>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Diagnostic>,
}

impl TaskResponse {
    /// Response for a request refused before any side effect
    pub fn rejected(
        task_id: impl Into<String>,
        session_id: Option<String>,
        task_type: impl Into<String>,
        error: &EngineError,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            session_id,
            task_type: task_type.into(),
            status: TaskStatus::Rejected,
            result: ContextMap::new(),
            trace: ExecutionTrace::new(),
            error: Some(Diagnostic::from_error(error)),
            warnings: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn has_warning(&self, kind: ErrorKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}

/// One published agent output in a session's workspace log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceEntry {
    pub session_id: String,
    pub agent: String,
    pub capability: Capability,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl WorkspaceEntry {
    pub fn new(
        session_id: impl Into<String>,
        agent: impl Into<String>,
        capability: Capability,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            agent: agent.into(),
            capability,
            timestamp: Utc::now(),
            payload,
        }
    }
}
