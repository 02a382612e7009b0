//! Agent and tool contracts
//!
//! An [`Agent`] is a unit of computation behind one [`Capability`]. It
//! receives the context fields its stage requires plus the task's input
//! payload, and answers with an [`AgentResult`]. Agents reach the outside
//! world only through the tool traits defined here ([`LanguageModel`],
//! [`JobSearch`]) so every collaborator can be swapped for a fake in tests.

use crate::models::JobPosting;
use crate::types::{AgentStatus, Capability, ContextMap};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Input handed to an agent for one stage
#[derive(Debug, Clone, Default)]
pub struct AgentInput {
    pub session_id: String,
    /// Context fields the stage declared as required
    pub fields: ContextMap,
    /// The task's unstructured input payload
    pub task_input: ContextMap,
    /// Upper bound on items the stage should produce, if the plan sets one
    pub fan_out: Option<usize>,
}

impl AgentInput {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.task_input.insert(key.into(), value);
        self
    }

    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = Some(fan_out);
        self
    }

    /// Deserialize a required context field
    pub fn field<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T, ToolError> {
        let value = self
            .fields
            .get(key)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))?;
        serde_json::from_value(value.clone())
            .map_err(|e| ToolError::InvalidParameter(format!("{}: {}", key, e)))
    }

    /// Get an optional string from the task input
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.task_input.get(key).and_then(|v| v.as_str())
    }

    /// User the task runs for; falls back to the session id
    pub fn user_id(&self) -> String {
        self.input_str("user_id")
            .filter(|s| !s.trim().is_empty())
            .map(String::from)
            .unwrap_or_else(|| self.session_id.clone())
    }
}

/// What an agent returns for one stage
#[derive(Debug, Clone, PartialEq)]
pub struct AgentResult {
    pub status: AgentStatus,
    /// Fields to merge into the session context
    pub fragment: ContextMap,
    /// Output published to the workspace log
    pub payload: serde_json::Value,
    pub message: Option<String>,
}

impl AgentResult {
    pub fn ok(fragment: ContextMap, payload: serde_json::Value) -> Self {
        Self {
            status: AgentStatus::Ok,
            fragment,
            payload,
            message: None,
        }
    }

    pub fn degraded(
        fragment: ContextMap,
        payload: serde_json::Value,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status: AgentStatus::Degraded,
            fragment,
            payload,
            message: Some(message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: AgentStatus::Failed,
            fragment: ContextMap::new(),
            payload: serde_json::Value::Null,
            message: Some(message.into()),
        }
    }
}

/// A unit of computation behind one capability
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable agent identity recorded in traces and the workspace log
    fn name(&self) -> &str;

    fn capability(&self) -> Capability;

    /// Run the stage. Failures are reported through the result status,
    /// never by panicking or by retrying internally.
    async fn invoke(&self, input: AgentInput) -> AgentResult;
}

/// Errors raised by tool collaborators
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

/// Constraints on a language-model generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub prompt: String,
    /// Ask the model for a JSON document instead of prose
    #[serde(default)]
    pub json: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Opaque text/structured generation capability
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerateRequest) -> Result<String, ToolError>;

    /// Embed text for similarity search
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ToolError> {
        Err(ToolError::NotSupported(format!(
            "{} does not provide embeddings",
            self.name()
        )))
    }
}

/// Filters for a job-board search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobQuery {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    pub per_page: usize,
}

impl JobQuery {
    pub fn new(text: impl Into<String>, per_page: usize) -> Self {
        Self {
            text: text.into(),
            per_page,
            ..Self::default()
        }
    }
}

/// External job-board search capability
#[async_trait]
pub trait JobSearch: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &JobQuery) -> Result<Vec<JobPosting>, ToolError>;
}
