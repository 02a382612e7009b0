//! CareerFlow SDK
//!
//! Shared contracts for the CareerFlow engine: the agent and tool traits,
//! task and trace types, durable domain entities and the error taxonomy.
//! Agent implementations depend on this crate only.

/// Agent and tool traits
pub mod agent;

/// Error types and handling
pub mod errors;

/// Durable domain entities
pub mod models;

/// Task, trace and response types
pub mod types;

// Re-export commonly used types
pub use agent::{
    Agent, AgentInput, AgentResult, GenerateRequest, JobQuery, JobSearch, LanguageModel,
    ToolError,
};
pub use errors::{EngineError, EngineErrorExt, ErrorKind};
pub use models::{
    Application, ApplicationMetrics, ApplicationStatus, Embedding, EmbeddingRef, JobMatch, JobPosting, Seniority,
    Strategy, UserProfile,
};
pub use types::{
    AgentStatus, Capability, ContextMap, Diagnostic, ExecutionTrace, TaskRequest, TaskResponse,
    TaskStatus, TaskType, TraceEntry, WorkspaceEntry,
};
