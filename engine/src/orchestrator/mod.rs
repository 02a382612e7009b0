//! Orchestrator
//!
//! Runs a routed [`StagePlan`](crate::router::StagePlan) against one session. Stages run strictly in
//! order; each one reads its required fields from the Context Store, calls
//! the agent for its capability, publishes the returned fragment together
//! with a Workspace Log entry in one store operation, and copies its
//! declared artifacts to the long-term store.
//!
//! # Failure handling
//!
//! - Unknown task types are rejected before any store is touched.
//! - A failed or timed-out stage stops the run with `PARTIAL_FAILURE`; the
//!   context written by earlier stages stays in the session.
//! - Degraded stages and long-term write failures become warnings.
//! - Nothing is retried. Resubmitting against the same session re-reads
//!   every stage input from the Context Store.
//!
//! # Example
//!
//! ```no_run
//! use careerflow_engine::agent::AgentRegistry;
//! use careerflow_engine::config::OrchestratorConfig;
//! use careerflow_engine::db::Database;
//! use careerflow_engine::memory::InMemorySessionStore;
//! use careerflow_engine::orchestrator::Orchestrator;
//! use careerflow_sdk::types::TaskRequest;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run(db: Database, agents: AgentRegistry) {
//! let orchestrator = Orchestrator::new(
//!     Arc::new(InMemorySessionStore::new(Duration::from_secs(3600))),
//!     Arc::new(db.long_term()),
//!     agents,
//!     &OrchestratorConfig::default(),
//! );
//! let request = TaskRequest::new("analyze_profile")
//!     .with_input("resume_text", serde_json::json!("5 years Go backend"));
//! let response = orchestrator.execute(request).await;
//! println!("{}", response.status);
//! # }
//! ```

pub mod lease;
pub mod state;

pub use lease::{SessionLease, SessionLeases};
pub use state::{ExecutionState, StateMachine};

use crate::agent::AgentRegistry;
use crate::config::OrchestratorConfig;
use crate::db::LongTermStore;
use crate::memory::{self, ContextStore, SessionInfo, SessionStore, WorkspaceLog};
use crate::router::{Artifact, StageSpec, TaskRouter};
use careerflow_sdk::agent::{AgentInput, AgentResult};
use careerflow_sdk::errors::EngineError;
use careerflow_sdk::models::{Application, JobMatch, Strategy, UserProfile};
use careerflow_sdk::types::{
    AgentStatus, ContextMap, Diagnostic, ExecutionTrace, TaskRequest, TaskResponse, TaskStatus,
    TraceEntry, WorkspaceEntry,
};
use chrono::Utc;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn, Span};
use uuid::Uuid;

/// Everything a session currently holds
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub info: SessionInfo,
    pub context: ContextMap,
    pub workspace: Vec<WorkspaceEntry>,
}

/// How an execution ended, before it is turned into a response
struct Outcome {
    state: ExecutionState,
    result: ContextMap,
    error: Option<Diagnostic>,
}

impl Outcome {
    fn new(state: ExecutionState, result: ContextMap, error: Option<Diagnostic>) -> Self {
        Self {
            state,
            result,
            error,
        }
    }

    fn rejected(error: &EngineError) -> Self {
        Self::new(
            ExecutionState::Rejected,
            ContextMap::new(),
            Some(Diagnostic::from_error(error)),
        )
    }
}

/// Bookkeeping for one execution
struct Execution {
    task_id: String,
    session_id: Option<String>,
    task_type: String,
    machine: StateMachine,
    trace: ExecutionTrace,
    warnings: Vec<Diagnostic>,
}

impl Execution {
    fn new(request: &TaskRequest) -> Self {
        Self {
            task_id: Uuid::new_v4().to_string(),
            session_id: request.session_id.clone(),
            task_type: request.task_type.clone(),
            machine: StateMachine::new(),
            trace: ExecutionTrace::new(),
            warnings: Vec::new(),
        }
    }

    fn finish(mut self, outcome: Outcome) -> TaskResponse {
        let (status, error) = match self.machine.transition(outcome.state) {
            Ok(()) => (
                outcome
                    .state
                    .terminal_status()
                    .unwrap_or(TaskStatus::PartialFailure),
                outcome.error,
            ),
            Err(e) => {
                error!("{}", e);
                (TaskStatus::PartialFailure, Some(Diagnostic::from_error(&e)))
            }
        };
        TaskResponse {
            task_id: self.task_id,
            session_id: self.session_id,
            task_type: self.task_type,
            status,
            result: outcome.result,
            trace: self.trace,
            error,
            warnings: self.warnings,
        }
    }
}

/// Context fields of `fields`, in plan order, that `context` holds
fn select_fields(fields: &[&str], context: &ContextMap) -> ContextMap {
    fields
        .iter()
        .filter_map(|f| context.get(*f).map(|v| (f.to_string(), v.clone())))
        .collect()
}

/// Coordinates stages, session state and durable persistence
pub struct Orchestrator {
    sessions: Arc<dyn SessionStore>,
    long_term: Arc<dyn LongTermStore>,
    agents: AgentRegistry,
    router: TaskRouter,
    leases: SessionLeases,
    stage_timeout: Duration,
    store_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        long_term: Arc<dyn LongTermStore>,
        agents: AgentRegistry,
        config: &OrchestratorConfig,
    ) -> Self {
        Self {
            sessions,
            long_term,
            agents,
            router: TaskRouter::new(config.applications_per_journey),
            leases: SessionLeases::new(config.busy_policy),
            stage_timeout: config.stage_timeout(),
            store_timeout: config.store_timeout(),
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Run a task to completion
    pub async fn execute(&self, request: TaskRequest) -> TaskResponse {
        self.execute_with_cancel(request, CancellationToken::new())
            .await
    }

    /// Run a task, stopping before the next stage once `cancel` fires
    #[instrument(
        skip(self, request, cancel),
        fields(
            task_type = %request.task_type,
            task_id = tracing::field::Empty,
            session_id = tracing::field::Empty
        )
    )]
    pub async fn execute_with_cancel(
        &self,
        request: TaskRequest,
        cancel: CancellationToken,
    ) -> TaskResponse {
        let mut run = Execution::new(&request);
        Span::current().record("task_id", run.task_id.as_str());

        let outcome = match self.drive(&mut run, &request, &cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Task {} aborted: {}", run.task_id, e);
                Outcome::new(
                    ExecutionState::PartialFailure,
                    ContextMap::new(),
                    Some(Diagnostic::from_error(&e)),
                )
            }
        };
        let response = run.finish(outcome);

        info!(
            "Task {} ({}) finished {} after {} stage(s) in {}ms",
            response.task_id,
            response.task_type,
            response.status,
            response.trace.len(),
            response.trace.total_duration_ms()
        );
        response
    }

    /// Walk the state machine up to the terminal state. Errors are engine
    /// bugs; every expected failure is an [`Outcome`].
    async fn drive(
        &self,
        run: &mut Execution,
        request: &TaskRequest,
        cancel: &CancellationToken,
    ) -> Result<Outcome, EngineError> {
        let plan = match self.router.resolve(&request.task_type) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Rejected task {}: {}", run.task_id, e);
                return Ok(Outcome::rejected(&e));
            }
        };
        run.machine.transition(ExecutionState::Routed)?;

        let session_id = request
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        run.session_id = Some(session_id.clone());
        Span::current().record("session_id", session_id.as_str());

        let _lease = match self.leases.acquire(&session_id).await {
            Ok(lease) => lease,
            Err(e) => {
                warn!("Rejected task {}: {}", run.task_id, e);
                return Ok(Outcome::rejected(&e));
            }
        };

        if let Err(e) = self.store("ensure session", self.sessions.ensure(&session_id)).await {
            warn!("Session {} unavailable: {}", session_id, e);
            return Ok(Outcome::rejected(&e));
        }

        debug!(
            "Running {} stage(s) for {} in session {}",
            plan.len(),
            plan.task_type,
            session_id
        );

        let mut context = ContextMap::new();
        for (index, stage) in plan.stages.iter().enumerate() {
            run.machine.transition(ExecutionState::Running(index))?;

            if cancel.is_cancelled() {
                info!("Task {} cancelled before stage {}", run.task_id, index);
                let error = Diagnostic::from_error(&EngineError::Cancelled(index)).at_stage(index);
                return Ok(Outcome::new(
                    ExecutionState::Cancelled,
                    select_fields(&plan.result_fields, &context),
                    Some(error),
                ));
            }

            context = match self.store("read context", self.sessions.get_all(&session_id)).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Stage {} cannot read session {}: {}", index, session_id, e);
                    return Ok(Outcome::new(
                        ExecutionState::PartialFailure,
                        select_fields(&plan.result_fields, &context),
                        Some(Diagnostic::from_error(&e).at_stage(index)),
                    ));
                }
            };

            if let Some(field) = stage.requires.iter().find(|f| !context.contains_key(**f)) {
                let e = EngineError::MissingContext {
                    stage: index,
                    capability: stage.capability.to_string(),
                    field: field.to_string(),
                };
                warn!("{}", e);
                return Ok(Outcome::new(
                    ExecutionState::PartialFailure,
                    select_fields(&plan.result_fields, &context),
                    Some(Diagnostic::from_error(&e).at_stage(index)),
                ));
            }

            match self
                .run_stage(run, &session_id, index, stage, request, &context)
                .await
            {
                Ok(fragment) => {
                    for (field, value) in fragment {
                        context.insert(field, value);
                    }
                }
                Err(diagnostic) => {
                    let result = match self
                        .store("read context", self.sessions.get_all(&session_id))
                        .await
                    {
                        Ok(latest) => select_fields(&plan.result_fields, &latest),
                        Err(_) => select_fields(&plan.result_fields, &context),
                    };
                    return Ok(Outcome::new(
                        ExecutionState::PartialFailure,
                        result,
                        Some(diagnostic),
                    ));
                }
            }
        }

        let final_context = match self
            .store("read context", self.sessions.get_all(&session_id))
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Final read of session {} failed: {}", session_id, e);
                context
            }
        };
        Ok(Outcome::new(
            ExecutionState::Completed,
            select_fields(&plan.result_fields, &final_context),
            None,
        ))
    }

    /// Invoke one stage's agent and publish its output. Returns the merged
    /// fragment, or the diagnostic that ends the run.
    async fn run_stage(
        &self,
        run: &mut Execution,
        session_id: &str,
        index: usize,
        stage: &StageSpec,
        request: &TaskRequest,
        context: &ContextMap,
    ) -> Result<ContextMap, Diagnostic> {
        let agent = self.agents.agent_name(stage.capability);

        let mut input = AgentInput::new(session_id);
        input.fields = select_fields(&stage.requires, context);
        input.task_input = request.input_data.clone();
        input.fan_out = stage.fan_out;

        let started_at = Utc::now();
        let start = Instant::now();
        let mut timed_out = false;
        let mut result = match timeout(
            self.stage_timeout,
            self.agents.invoke(stage.capability, input),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                timed_out = true;
                AgentResult::failed(format!(
                    "no result within {}s",
                    self.stage_timeout.as_secs()
                ))
            }
        };
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        if result.status.is_usable() {
            if let Some(field) = stage
                .produces
                .iter()
                .find(|f| !result.fragment.contains_key(**f))
            {
                result = AgentResult::failed(format!("declared output '{}' is missing", field));
            }
        }

        let mut trace_entry = TraceEntry {
            agent: agent.clone(),
            capability: stage.capability,
            status: result.status,
            duration_ms,
            started_at,
            message: result.message.clone(),
        };

        if !result.status.is_usable() {
            run.trace.push(trace_entry);
            let reason = result
                .message
                .unwrap_or_else(|| "no reason given".to_string());
            let e = if timed_out {
                EngineError::StageTimeout(self.stage_timeout.as_secs(), agent.clone())
            } else {
                EngineError::AgentFailed {
                    agent: agent.clone(),
                    reason,
                }
            };
            warn!("Stage {} failed: {}", index, e);
            return Err(Diagnostic::from_error(&e).at_stage(index).with_agent(agent));
        }

        debug!(
            "Stage {} ({}) returned {} in {}ms",
            index, agent, result.status, duration_ms
        );

        // Later stages must not resurrect a session that expired mid-run
        let strict = index > 0;
        let entry = WorkspaceEntry::new(session_id, &agent, stage.capability, result.payload);
        let published = self
            .store(
                "publish stage output",
                self.sessions
                    .publish(session_id, result.fragment.clone(), entry, strict),
            )
            .await;
        if let Err(e) = published {
            warn!("Stage {} could not publish to session {}: {}", index, session_id, e);
            trace_entry.status = AgentStatus::Failed;
            trace_entry.message = Some(e.to_string());
            run.trace.push(trace_entry);
            return Err(Diagnostic::from_error(&e).at_stage(index).with_agent(agent));
        }
        run.trace.push(trace_entry);

        for artifact in &stage.persists {
            if let Err(reason) = self.persist(*artifact, &result.fragment).await {
                let e = EngineError::PersistenceWarning {
                    artifact: artifact.as_str().to_string(),
                    reason,
                };
                warn!("{}", e);
                run.warnings.push(
                    Diagnostic::from_error(&e)
                        .at_stage(index)
                        .with_agent(agent.clone()),
                );
            }
        }

        if let Some(reason) = result.message.filter(|_| result.status == AgentStatus::Degraded) {
            let e = EngineError::AgentDegraded {
                agent: agent.clone(),
                reason,
            };
            run.warnings
                .push(Diagnostic::from_error(&e).at_stage(index).with_agent(agent));
        }

        Ok(result.fragment)
    }

    /// Copy one artifact from a stage fragment to the long-term store
    async fn persist(&self, artifact: Artifact, fragment: &ContextMap) -> Result<(), String> {
        let value = fragment
            .get(artifact.source_field())
            .cloned()
            .ok_or_else(|| format!("'{}' not in stage output", artifact.source_field()))?;
        let decode = |e: serde_json::Error| format!("unreadable {}: {}", artifact.as_str(), e);

        match artifact {
            Artifact::Profile => {
                let profile: UserProfile = serde_json::from_value(value).map_err(decode)?;
                self.durable(self.long_term.save_profile(&profile)).await
            }
            Artifact::Strategy => {
                let strategy: Strategy = serde_json::from_value(value).map_err(decode)?;
                self.durable(self.long_term.save_strategy(&strategy)).await
            }
            Artifact::JobPostings => {
                let matches: Vec<JobMatch> = serde_json::from_value(value).map_err(decode)?;
                let mut failed = Vec::new();
                for m in &matches {
                    let saved = self
                        .durable(self.long_term.save_job_posting(
                            &m.job,
                            Some(m.relevance_score),
                            m.embedding.as_deref(),
                        ))
                        .await;
                    if let Err(e) = saved {
                        failed.push(format!("{}: {}", m.job.job_id, e));
                    }
                }
                summarize_failures(matches.len(), failed)
            }
            Artifact::Applications => {
                let applications: Vec<Application> =
                    serde_json::from_value(value).map_err(decode)?;
                let mut failed = Vec::new();
                for app in &applications {
                    if let Err(e) = self.durable(self.long_term.save_application(app)).await {
                        failed.push(format!("{}: {}", app.application_id, e));
                    }
                }
                summarize_failures(applications.len(), failed)
            }
        }
    }

    /// Bound a session store call by the store timeout
    async fn store<T, F>(&self, operation: &str, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = memory::Result<T>>,
    {
        match timeout(self.store_timeout, fut).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => Err(EngineError::StoreTimeout(
                self.store_timeout.as_secs(),
                operation.to_string(),
            )),
        }
    }

    /// Bound a long-term store write by the store timeout
    async fn durable<F>(&self, fut: F) -> Result<(), String>
    where
        F: Future<Output = anyhow::Result<()>>,
    {
        match timeout(self.store_timeout, fut).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{:#}", e)),
            Err(_) => Err(format!("timed out after {}s", self.store_timeout.as_secs())),
        }
    }

    /// Current context and workspace log of a live session
    pub async fn inspect(&self, session_id: &str) -> Result<SessionSnapshot, EngineError> {
        let info = self.store("session info", self.sessions.info(session_id)).await?;
        let context = self
            .store("read context", self.sessions.get_all(session_id))
            .await?;
        let workspace = self
            .store("read workspace", self.sessions.read_all(session_id))
            .await?;
        Ok(SessionSnapshot {
            info,
            context,
            workspace,
        })
    }

    /// Remove a session's context and workspace log together
    pub async fn delete_session(&self, session_id: &str) -> Result<bool, EngineError> {
        let removed = self
            .store("delete session", self.sessions.delete(session_id))
            .await?;
        if removed {
            info!("Deleted session {}", session_id);
        }
        Ok(removed)
    }
}

fn summarize_failures(total: usize, failed: Vec<String>) -> Result<(), String> {
    match failed.first() {
        None => Ok(()),
        Some(first) => Err(format!(
            "{} of {} not saved (first: {})",
            failed.len(),
            total,
            first
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySessionStore;
    use async_trait::async_trait;
    use careerflow_sdk::agent::Agent;
    use careerflow_sdk::errors::{EngineErrorExt, ErrorKind};
    use careerflow_sdk::models::{Embedding, JobPosting};
    use careerflow_sdk::types::Capability;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct NullLongTerm {
        profiles: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LongTermStore for NullLongTerm {
        async fn save_profile(&self, profile: &UserProfile) -> anyhow::Result<()> {
            self.profiles.lock().unwrap().push(profile.user_id.clone());
            Ok(())
        }
        async fn save_strategy(&self, _: &Strategy) -> anyhow::Result<()> {
            Ok(())
        }
        async fn save_job_posting(
            &self,
            _: &JobPosting,
            _: Option<f32>,
            _: Option<&[f32]>,
        ) -> anyhow::Result<()> {
            Ok(())
        }
        async fn save_application(&self, _: &Application) -> anyhow::Result<()> {
            Ok(())
        }
        async fn save_embedding(&self, _: &Embedding) -> anyhow::Result<()> {
            Ok(())
        }
        async fn applications_for_user(&self, _: &str) -> anyhow::Result<Vec<Application>> {
            Ok(Vec::new())
        }
        async fn find_similar_jobs(&self, _: &[f32], _: usize) -> anyhow::Result<Vec<JobPosting>> {
            Ok(Vec::new())
        }
    }

    struct Analyzer {
        status: AgentStatus,
    }

    #[async_trait]
    impl Agent for Analyzer {
        fn name(&self) -> &str {
            "analyzer"
        }
        fn capability(&self) -> Capability {
            Capability::Analyze
        }
        async fn invoke(&self, input: AgentInput) -> AgentResult {
            let mut fragment = ContextMap::new();
            fragment.insert("profile".into(), json!({"user_id": input.user_id()}));
            fragment.insert("strategy".into(), json!(Strategy::fallback(&input.user_id())));
            match self.status {
                AgentStatus::Ok => AgentResult::ok(fragment, json!({"stage": "analyze"})),
                AgentStatus::Degraded => {
                    AgentResult::degraded(fragment, json!({"stage": "analyze"}), "heuristic profile")
                }
                AgentStatus::Failed => AgentResult::failed("boom"),
            }
        }
    }

    fn orchestrator(status: AgentStatus, long_term: Arc<NullLongTerm>) -> Orchestrator {
        let mut agents = AgentRegistry::new();
        agents.register(Arc::new(Analyzer { status }));
        Orchestrator::new(
            Arc::new(InMemorySessionStore::new(Duration::from_secs(60))),
            long_term,
            agents,
            &OrchestratorConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_single_stage_completes_and_persists() {
        let long_term = Arc::new(NullLongTerm::default());
        let orch = orchestrator(AgentStatus::Ok, Arc::clone(&long_term));

        let request = TaskRequest::new("analyze_profile").with_input("user_id", json!("u1"));
        let response = orch.execute(request).await;

        assert_eq!(response.status, TaskStatus::Completed);
        assert_eq!(response.trace.len(), 1);
        assert_eq!(
            response.result.keys().collect::<Vec<_>>(),
            vec!["profile", "strategy"]
        );
        assert_eq!(*long_term.profiles.lock().unwrap(), vec!["u1".to_string()]);

        let session = response.session_id.unwrap();
        let snapshot = orch.inspect(&session).await.unwrap();
        assert_eq!(snapshot.workspace.len(), 1);
        assert_eq!(snapshot.workspace[0].agent, "analyzer");
    }

    #[tokio::test]
    async fn test_degraded_stage_is_a_warning() {
        let orch = orchestrator(AgentStatus::Degraded, Arc::new(NullLongTerm::default()));
        let response = orch.execute(TaskRequest::new("analyze_profile")).await;

        assert_eq!(response.status, TaskStatus::Completed);
        assert!(response.has_warning(ErrorKind::AgentDegraded));
        assert_eq!(response.trace.entries()[0].status, AgentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_failed_stage_keeps_session_without_fields() {
        let orch = orchestrator(AgentStatus::Failed, Arc::new(NullLongTerm::default()));
        let response = orch.execute(TaskRequest::new("analyze_profile")).await;

        assert_eq!(response.status, TaskStatus::PartialFailure);
        let error = response.error.unwrap();
        assert_eq!(error.kind, ErrorKind::AgentFailed);
        assert_eq!(error.stage, Some(0));
        assert_eq!(error.agent.as_deref(), Some("analyzer"));
        assert!(response.result.is_empty());

        let session = response.session_id.unwrap();
        assert!(orch.sessions().get_all(&session).await.unwrap().is_empty());
        assert!(orch.sessions().read_all(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_type_touches_nothing() {
        let orch = orchestrator(AgentStatus::Ok, Arc::new(NullLongTerm::default()));
        let response = orch
            .execute(TaskRequest::new("book_flight").with_session("s1"))
            .await;

        assert_eq!(response.status, TaskStatus::Rejected);
        assert_eq!(response.error.unwrap().kind, ErrorKind::UnknownTaskType);
        assert!(response.trace.is_empty());
        assert!(orch.inspect("s1").await.is_err());
    }

    #[tokio::test]
    async fn test_blank_session_id_is_replaced() {
        let orch = orchestrator(AgentStatus::Ok, Arc::new(NullLongTerm::default()));
        let response = orch
            .execute(TaskRequest::new("analyze_profile").with_session("  "))
            .await;
        let session = response.session_id.unwrap();
        assert!(Uuid::parse_str(&session).is_ok());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let orch = orchestrator(AgentStatus::Ok, Arc::new(NullLongTerm::default()));
        let response = orch.execute(TaskRequest::new("analyze_profile")).await;
        let session = response.session_id.unwrap();

        assert!(orch.delete_session(&session).await.unwrap());
        assert!(!orch.delete_session(&session).await.unwrap());
        let err = orch.inspect(&session).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SessionNotFound);
    }

    #[test]
    fn test_select_fields_keeps_plan_order() {
        let mut context = ContextMap::new();
        context.insert("strategy".into(), json!(1));
        context.insert("extra".into(), json!(2));
        context.insert("profile".into(), json!(3));
        let selected = select_fields(&["profile", "strategy", "job_matches"], &context);
        assert_eq!(selected.keys().collect::<Vec<_>>(), vec!["profile", "strategy"]);
    }
}
