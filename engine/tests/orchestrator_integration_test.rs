/// Integration tests for the orchestrator
///
/// Runs whole task plans against the in-memory session store with
/// deterministic fake agents and checks:
/// - the status, trace and result of each terminal state
/// - context retention after partial failures and cancellation
/// - the busy-session policies
/// - non-fatal persistence failures
/// - a stage whose output cannot be published leaves no trace in the session
use async_trait::async_trait;
use careerflow_engine::agent::AgentRegistry;
use careerflow_engine::config::{BusyPolicy, OrchestratorConfig};
use careerflow_engine::db::LongTermStore;
use careerflow_engine::memory::{
    self, ContextStore, InMemorySessionStore, SessionInfo, SessionStore, StoreError, WorkspaceLog,
};
use careerflow_engine::orchestrator::Orchestrator;
use careerflow_sdk::agent::{Agent, AgentInput, AgentResult};
use careerflow_sdk::errors::ErrorKind;
use careerflow_sdk::models::{Application, Embedding, JobPosting, Strategy, UserProfile};
use careerflow_sdk::types::{
    AgentStatus, Capability, ContextMap, TaskRequest, TaskStatus, WorkspaceEntry,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

const TTL: Duration = Duration::from_secs(600);

/// Lets a test observe and hold an agent mid-invocation
#[derive(Default)]
struct Gate {
    entered: Notify,
    release: Notify,
}

#[derive(Default)]
struct Behavior {
    fail_while: Option<Arc<AtomicBool>>,
    degraded: bool,
    omit: Option<&'static str>,
    gate: Option<Arc<Gate>>,
    events: Option<Arc<Mutex<Vec<String>>>>,
    cancel: Option<CancellationToken>,
    delete_session_in: Option<Arc<InMemorySessionStore>>,
    sleep: Option<Duration>,
}

/// Produces fixed, input-derived values for its declared fields
struct ScriptedAgent {
    name: &'static str,
    capability: Capability,
    produces: Vec<&'static str>,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl ScriptedAgent {
    fn new(name: &'static str, capability: Capability, produces: &[&'static str]) -> Self {
        Self {
            name,
            capability,
            produces: produces.to_vec(),
            behavior: Behavior::default(),
            calls: AtomicUsize::new(0),
        }
    }

    fn with(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn value_for(field: &str, input: &AgentInput) -> serde_json::Value {
        let user = input.user_id();
        match field {
            "profile" => json!({
                "user_id": user,
                "resume_text": input.input_str("resume_text").unwrap_or_default(),
                "skills": [{"name": "Go"}],
                "api_token": "must-not-leak"
            }),
            "strategy" => json!(Strategy::fallback(&user)),
            "job_matches" => json!([
                {"job": {"job_id": "1", "title": "Go Developer"}, "relevance_score": 0.9},
                {"job": {"job_id": "2", "title": "Backend Engineer"}, "relevance_score": 0.7}
            ]),
            "applications" => json!([{
                "application_id": format!("app_{}_1", user),
                "user_id": user,
                "job_id": "1",
                "cover_letter": "letter",
                "adapted_resume": "resume",
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-01T00:00:00Z"
            }]),
            other => json!(other),
        }
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        self.name
    }

    fn capability(&self) -> Capability {
        self.capability
    }

    async fn invoke(&self, input: AgentInput) -> AgentResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let b = &self.behavior;

        if let Some(events) = &b.events {
            events.lock().unwrap().push(format!("enter {}", self.name));
        }
        if let Some(gate) = &b.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if let Some(delay) = b.sleep {
            tokio::time::sleep(delay).await;
        }
        if let Some(events) = &b.events {
            events.lock().unwrap().push(format!("exit {}", self.name));
        }
        if let Some(token) = &b.cancel {
            token.cancel();
        }
        if let Some(store) = &b.delete_session_in {
            store.delete(&input.session_id).await.unwrap();
        }
        if let Some(flag) = &b.fail_while {
            if flag.load(Ordering::SeqCst) {
                return AgentResult::failed("job board unavailable");
            }
        }

        let mut fragment = ContextMap::new();
        for field in &self.produces {
            if Some(*field) != b.omit {
                fragment.insert(field.to_string(), Self::value_for(field, &input));
            }
        }
        let payload = json!({ "agent": self.name, "fields": input.fields.keys().collect::<Vec<_>>() });

        if b.degraded {
            AgentResult::degraded(fragment, payload, "fallback used")
        } else {
            AgentResult::ok(fragment, payload)
        }
    }
}

/// Long-term store that counts writes, optionally failing every one
#[derive(Default)]
struct RecordingLongTerm {
    fail: bool,
    writes: AtomicUsize,
}

impl RecordingLongTerm {
    fn write(&self) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("disk full");
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl LongTermStore for RecordingLongTerm {
    async fn save_profile(&self, _: &UserProfile) -> anyhow::Result<()> {
        self.write()
    }
    async fn save_strategy(&self, _: &Strategy) -> anyhow::Result<()> {
        self.write()
    }
    async fn save_job_posting(
        &self,
        _: &JobPosting,
        _: Option<f32>,
        _: Option<&[f32]>,
    ) -> anyhow::Result<()> {
        self.write()
    }
    async fn save_application(&self, _: &Application) -> anyhow::Result<()> {
        self.write()
    }
    async fn save_embedding(&self, _: &Embedding) -> anyhow::Result<()> {
        self.write()
    }
    async fn applications_for_user(&self, _: &str) -> anyhow::Result<Vec<Application>> {
        Ok(Vec::new())
    }
    async fn find_similar_jobs(&self, _: &[f32], _: usize) -> anyhow::Result<Vec<JobPosting>> {
        Ok(Vec::new())
    }
}

struct Harness {
    orchestrator: Arc<Orchestrator>,
    store: Arc<InMemorySessionStore>,
    analyzer: Arc<ScriptedAgent>,
    researcher: Arc<ScriptedAgent>,
    writer: Arc<ScriptedAgent>,
    long_term: Arc<RecordingLongTerm>,
}

fn analyzer() -> ScriptedAgent {
    ScriptedAgent::new("strategy_agent", Capability::Analyze, &["profile", "strategy"])
}

fn researcher() -> ScriptedAgent {
    ScriptedAgent::new("market_intelligence_agent", Capability::Research, &["job_matches"])
}

fn writer() -> ScriptedAgent {
    ScriptedAgent::new("personalization_agent", Capability::Personalize, &["applications"])
}

fn harness_with(
    analyzer: ScriptedAgent,
    researcher: ScriptedAgent,
    writer: ScriptedAgent,
    long_term: RecordingLongTerm,
    config: OrchestratorConfig,
    store: Arc<InMemorySessionStore>,
) -> Harness {
    let analyzer = Arc::new(analyzer);
    let researcher = Arc::new(researcher);
    let writer = Arc::new(writer);
    let long_term = Arc::new(long_term);

    let mut agents = AgentRegistry::new();
    agents.register(Arc::clone(&analyzer) as Arc<dyn Agent>);
    agents.register(Arc::clone(&researcher) as Arc<dyn Agent>);
    agents.register(Arc::clone(&writer) as Arc<dyn Agent>);

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&store) as _,
        Arc::clone(&long_term) as _,
        agents,
        &config,
    ));
    Harness {
        orchestrator,
        store,
        analyzer,
        researcher,
        writer,
        long_term,
    }
}

fn harness(analyzer: ScriptedAgent, researcher: ScriptedAgent, writer: ScriptedAgent) -> Harness {
    harness_with(
        analyzer,
        researcher,
        writer,
        RecordingLongTerm::default(),
        OrchestratorConfig::default(),
        Arc::new(InMemorySessionStore::new(TTL)),
    )
}

fn journey(session: &str) -> TaskRequest {
    TaskRequest::new("full_journey")
        .with_session(session)
        .with_input("user_id", json!("u1"))
        .with_input("resume_text", json!("5 years Go backend"))
}

#[tokio::test]
async fn test_analyze_profile_mints_session() {
    let h = harness(analyzer(), researcher(), writer());

    let request =
        TaskRequest::new("analyze_profile").with_input("resume_text", json!("5 years Go backend"));
    let response = h.orchestrator.execute(request).await;

    assert_eq!(response.status, TaskStatus::Completed);
    assert_eq!(response.trace.len(), 1);
    assert!(response.error.is_none());
    assert!(response.warnings.is_empty());

    let session = response.session_id.clone().unwrap();
    assert!(uuid::Uuid::parse_str(&session).is_ok());

    let context = h.store.get_all(&session).await.unwrap();
    assert_eq!(context.keys().collect::<Vec<_>>(), vec!["profile", "strategy"]);
    assert_eq!(context["profile"]["resume_text"], "5 years Go backend");
    // user id falls back to the minted session id
    assert_eq!(context["profile"]["user_id"], session.as_str());

    // profile + strategy
    assert_eq!(h.long_term.writes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_full_journey_completes_in_order() {
    let h = harness(analyzer(), researcher(), writer());
    let response = h.orchestrator.execute(journey("j1")).await;

    assert_eq!(response.status, TaskStatus::Completed);
    let agents: Vec<&str> = response.trace.entries().iter().map(|e| e.agent.as_str()).collect();
    assert_eq!(
        agents,
        vec!["strategy_agent", "market_intelligence_agent", "personalization_agent"]
    );
    assert_eq!(
        response.result.keys().collect::<Vec<_>>(),
        vec!["profile", "strategy", "job_matches", "applications"]
    );

    let log = h.store.read_all("j1").await.unwrap();
    assert_eq!(log.len(), 3);
    // Each stage saw exactly the fields it requires
    assert_eq!(log[1].payload["fields"], json!(["profile", "strategy"]));
    assert_eq!(log[2].payload["fields"], json!(["profile", "job_matches"]));

    // profile + strategy + 2 postings + 1 application
    assert_eq!(h.long_term.writes.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_failing_research_keeps_earlier_context() {
    let failing = Arc::new(AtomicBool::new(true));
    let h = harness(
        analyzer(),
        researcher().with(Behavior {
            fail_while: Some(Arc::clone(&failing)),
            ..Behavior::default()
        }),
        writer(),
    );

    let response = h.orchestrator.execute(journey("j2")).await;

    assert_eq!(response.status, TaskStatus::PartialFailure);
    assert_eq!(response.trace.len(), 2);
    assert_eq!(response.trace.entries()[1].status, AgentStatus::Failed);

    let error = response.error.unwrap();
    assert_eq!(error.kind, ErrorKind::AgentFailed);
    assert_eq!(error.stage, Some(1));
    assert_eq!(error.agent.as_deref(), Some("market_intelligence_agent"));
    assert!(error.message.contains("job board unavailable"));

    assert_eq!(
        response.result.keys().collect::<Vec<_>>(),
        vec!["profile", "strategy"]
    );
    let context = h.store.get_all("j2").await.unwrap();
    assert!(context.contains_key("profile"));
    assert!(!context.contains_key("job_matches"));
    assert_eq!(h.writer.calls(), 0);
    assert_eq!(h.store.read_all("j2").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_resubmission_after_failure_matches_clean_run() {
    let failing = Arc::new(AtomicBool::new(true));
    let h = harness(
        analyzer(),
        researcher().with(Behavior {
            fail_while: Some(Arc::clone(&failing)),
            ..Behavior::default()
        }),
        writer(),
    );

    let first = h.orchestrator.execute(journey("retry")).await;
    assert_eq!(first.status, TaskStatus::PartialFailure);

    failing.store(false, Ordering::SeqCst);
    let retried = h.orchestrator.execute(journey("retry")).await;
    let clean = h.orchestrator.execute(journey("clean")).await;

    assert_eq!(retried.status, TaskStatus::Completed);
    assert_eq!(clean.status, TaskStatus::Completed);
    assert_eq!(retried.result, clean.result);
    assert_eq!(
        h.store.get_all("retry").await.unwrap(),
        h.store.get_all("clean").await.unwrap()
    );
    assert_eq!(h.analyzer.calls(), 3);
    assert_eq!(h.store.read_all("retry").await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_unknown_task_type_writes_nothing() {
    let h = harness(analyzer(), researcher(), writer());

    for task_type in ["book_flight", "", "Full_Journey"] {
        let response = h
            .orchestrator
            .execute(TaskRequest::new(task_type).with_session("s1"))
            .await;
        assert_eq!(response.status, TaskStatus::Rejected);
        assert_eq!(response.error.unwrap().kind, ErrorKind::UnknownTaskType);
        assert!(response.trace.is_empty());
    }

    assert_eq!(h.store.live_sessions().await, 0);
    assert_eq!(h.analyzer.calls(), 0);
}

#[tokio::test]
async fn test_missing_context_skips_agent() {
    let h = harness(analyzer(), researcher(), writer());

    let response = h
        .orchestrator
        .execute(TaskRequest::new("find_jobs").with_session("fresh"))
        .await;

    assert_eq!(response.status, TaskStatus::PartialFailure);
    let error = response.error.unwrap();
    assert_eq!(error.kind, ErrorKind::MissingContext);
    assert_eq!(error.stage, Some(0));
    assert!(error.message.contains("profile"));
    assert!(response.trace.is_empty());
    assert_eq!(h.researcher.calls(), 0);
}

#[tokio::test]
async fn test_stages_chain_across_tasks_in_one_session() {
    let h = harness(analyzer(), researcher(), writer());

    for task_type in ["analyze_profile", "find_jobs", "create_application"] {
        let response = h
            .orchestrator
            .execute(
                TaskRequest::new(task_type)
                    .with_session("chain")
                    .with_input("user_id", json!("u1")),
            )
            .await;
        assert_eq!(response.status, TaskStatus::Completed, "{task_type}");
        assert_eq!(response.trace.len(), 1);
    }

    let context = h.store.get_all("chain").await.unwrap();
    assert_eq!(context.len(), 4);
    assert_eq!(h.store.read_all("chain").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_missing_declared_output_fails_stage() {
    let h = harness(
        analyzer().with(Behavior {
            omit: Some("strategy"),
            ..Behavior::default()
        }),
        researcher(),
        writer(),
    );

    let response = h.orchestrator.execute(journey("omit")).await;

    assert_eq!(response.status, TaskStatus::PartialFailure);
    assert_eq!(response.trace.entries()[0].status, AgentStatus::Failed);
    assert!(response.error.unwrap().message.contains("strategy"));
    // Nothing from the failed stage is merged
    assert!(h.store.get_all("omit").await.unwrap().is_empty());
    assert_eq!(h.long_term.writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_degraded_stage_continues_with_warning() {
    let h = harness(
        analyzer().with(Behavior {
            degraded: true,
            ..Behavior::default()
        }),
        researcher(),
        writer(),
    );

    let response = h.orchestrator.execute(journey("deg")).await;

    assert_eq!(response.status, TaskStatus::Completed);
    assert!(response.has_warning(ErrorKind::AgentDegraded));
    assert_eq!(response.trace.entries()[0].status, AgentStatus::Degraded);
    assert_eq!(h.store.read_all("deg").await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_persistence_failures_are_warnings() {
    let h = harness_with(
        analyzer(),
        researcher(),
        writer(),
        RecordingLongTerm {
            fail: true,
            ..RecordingLongTerm::default()
        },
        OrchestratorConfig::default(),
        Arc::new(InMemorySessionStore::new(TTL)),
    );

    let response = h.orchestrator.execute(journey("pw")).await;

    assert_eq!(response.status, TaskStatus::Completed);
    let persistence: Vec<_> = response
        .warnings
        .iter()
        .filter(|w| w.kind == ErrorKind::PersistenceWarning)
        .collect();
    // profile, strategy, job postings, applications
    assert_eq!(persistence.len(), 4);
    assert!(persistence[0].message.contains("disk full"));
    assert_eq!(h.store.get_all("pw").await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_cancel_before_start() {
    let h = harness(analyzer(), researcher(), writer());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let response = h
        .orchestrator
        .execute_with_cancel(journey("c0"), cancel)
        .await;

    assert_eq!(response.status, TaskStatus::Cancelled);
    assert!(response.trace.is_empty());
    assert_eq!(response.error.unwrap().kind, ErrorKind::Cancelled);
    assert_eq!(h.analyzer.calls(), 0);
}

#[tokio::test]
async fn test_cancel_between_stages_keeps_context() {
    let cancel = CancellationToken::new();
    let h = harness(
        analyzer().with(Behavior {
            cancel: Some(cancel.clone()),
            ..Behavior::default()
        }),
        researcher(),
        writer(),
    );

    let response = h
        .orchestrator
        .execute_with_cancel(journey("c1"), cancel)
        .await;

    assert_eq!(response.status, TaskStatus::Cancelled);
    assert_eq!(response.trace.len(), 1);
    assert_eq!(response.error.unwrap().stage, Some(1));
    assert_eq!(
        response.result.keys().collect::<Vec<_>>(),
        vec!["profile", "strategy"]
    );
    assert_eq!(h.researcher.calls(), 0);
    assert_eq!(h.store.get_all("c1").await.unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stage_timeout_fails_stage() {
    let config = OrchestratorConfig {
        stage_timeout_secs: 1,
        ..OrchestratorConfig::default()
    };
    let h = harness_with(
        analyzer().with(Behavior {
            sleep: Some(Duration::from_secs(30)),
            ..Behavior::default()
        }),
        researcher(),
        writer(),
        RecordingLongTerm::default(),
        config,
        Arc::new(InMemorySessionStore::new(TTL)),
    );

    let response = h.orchestrator.execute(journey("slow")).await;

    assert_eq!(response.status, TaskStatus::PartialFailure);
    assert_eq!(response.error.unwrap().kind, ErrorKind::StageTimeout);
    assert_eq!(response.trace.entries()[0].status, AgentStatus::Failed);
    assert!(h.store.get_all("slow").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_session_deleted_mid_run_is_not_resurrected() {
    let store = Arc::new(InMemorySessionStore::new(TTL));
    let h = harness_with(
        analyzer(),
        researcher().with(Behavior {
            delete_session_in: Some(Arc::clone(&store)),
            ..Behavior::default()
        }),
        writer(),
        RecordingLongTerm::default(),
        OrchestratorConfig::default(),
        store,
    );

    let response = h.orchestrator.execute(journey("gone")).await;

    assert_eq!(response.status, TaskStatus::PartialFailure);
    let error = response.error.unwrap();
    assert_eq!(error.kind, ErrorKind::SessionNotFound);
    assert_eq!(error.stage, Some(1));
    assert_eq!(h.writer.calls(), 0);
    assert!(h.store.get_all("gone").await.is_err());
}

#[tokio::test]
async fn test_busy_session_is_rejected() {
    let gate = Arc::new(Gate::default());
    let h = harness(
        analyzer().with(Behavior {
            gate: Some(Arc::clone(&gate)),
            ..Behavior::default()
        }),
        researcher(),
        writer(),
    );

    let first = {
        let orchestrator = Arc::clone(&h.orchestrator);
        tokio::spawn(async move { orchestrator.execute(journey("busy")).await })
    };
    gate.entered.notified().await;

    let second = h.orchestrator.execute(journey("busy")).await;
    assert_eq!(second.status, TaskStatus::Rejected);
    assert_eq!(second.error.unwrap().kind, ErrorKind::SessionBusy);
    assert!(second.trace.is_empty());

    // Other sessions are not blocked
    let other = h
        .orchestrator
        .execute(TaskRequest::new("find_jobs").with_session("elsewhere"))
        .await;
    assert_eq!(other.error.unwrap().kind, ErrorKind::MissingContext);

    gate.release.notify_one();
    let first = first.await.unwrap();
    assert_eq!(first.status, TaskStatus::Completed);
    assert_eq!(h.analyzer.calls(), 1);
}

#[tokio::test]
async fn test_queued_executions_never_interleave() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let config = OrchestratorConfig {
        busy_policy: BusyPolicy::Queue,
        ..OrchestratorConfig::default()
    };
    let h = harness_with(
        analyzer().with(Behavior {
            events: Some(Arc::clone(&events)),
            sleep: Some(Duration::from_millis(20)),
            ..Behavior::default()
        }),
        researcher(),
        writer(),
        RecordingLongTerm::default(),
        config,
        Arc::new(InMemorySessionStore::new(TTL)),
    );

    let runs: Vec<_> = (0..2)
        .map(|_| {
            let orchestrator = Arc::clone(&h.orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .execute(
                        TaskRequest::new("analyze_profile")
                            .with_session("queued")
                            .with_input("resume_text", json!("5 years Go backend")),
                    )
                    .await
            })
        })
        .collect();

    for run in runs {
        assert_eq!(run.await.unwrap().status, TaskStatus::Completed);
    }

    let events = events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "enter strategy_agent",
            "exit strategy_agent",
            "enter strategy_agent",
            "exit strategy_agent"
        ]
    );
    assert_eq!(h.store.read_all("queued").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_inspect_and_delete() {
    let h = harness(analyzer(), researcher(), writer());
    h.orchestrator.execute(journey("inspect")).await;

    let snapshot = h.orchestrator.inspect("inspect").await.unwrap();
    assert_eq!(snapshot.context.len(), 4);
    assert_eq!(snapshot.workspace.len(), 3);
    assert!(snapshot.info.expires_in <= TTL);

    assert!(h.orchestrator.delete_session("inspect").await.unwrap());
    assert!(h.orchestrator.inspect("inspect").await.is_err());
    assert!(h.store.read_all("inspect").await.is_err());
}

/// Session store whose disk is full: reads and lifecycle work, writing a
/// stage's output does not
struct FullDiskStore {
    inner: InMemorySessionStore,
}

#[async_trait]
impl ContextStore for FullDiskStore {
    async fn ensure(&self, session: &str) -> memory::Result<()> {
        self.inner.ensure(session).await
    }
    async fn put(&self, session: &str, field: &str, value: serde_json::Value) -> memory::Result<()> {
        self.inner.put(session, field, value).await
    }
    async fn put_strict(
        &self,
        session: &str,
        field: &str,
        value: serde_json::Value,
    ) -> memory::Result<()> {
        self.inner.put_strict(session, field, value).await
    }
    async fn get(&self, session: &str, field: &str) -> memory::Result<serde_json::Value> {
        self.inner.get(session, field).await
    }
    async fn get_all(&self, session: &str) -> memory::Result<ContextMap> {
        self.inner.get_all(session).await
    }
    async fn touch(&self, session: &str) -> memory::Result<()> {
        self.inner.touch(session).await
    }
    async fn info(&self, session: &str) -> memory::Result<SessionInfo> {
        self.inner.info(session).await
    }
    async fn delete(&self, session: &str) -> memory::Result<bool> {
        self.inner.delete(session).await
    }
    async fn purge_expired(&self) -> memory::Result<usize> {
        self.inner.purge_expired().await
    }
    async fn put_fields(&self, session: &str, fields: ContextMap, strict: bool) -> memory::Result<()> {
        self.inner.put_fields(session, fields, strict).await
    }
}

#[async_trait]
impl WorkspaceLog for FullDiskStore {
    async fn append(&self, _: &str, _: WorkspaceEntry) -> memory::Result<()> {
        Err(StoreError::Backend("disk full".to_string()))
    }
    async fn read_all(&self, session: &str) -> memory::Result<Vec<WorkspaceEntry>> {
        self.inner.read_all(session).await
    }
}

#[async_trait]
impl SessionStore for FullDiskStore {
    async fn publish(
        &self,
        _: &str,
        _: ContextMap,
        _: WorkspaceEntry,
        _: bool,
    ) -> memory::Result<()> {
        Err(StoreError::Backend("disk full".to_string()))
    }
}

#[tokio::test]
async fn test_unpublishable_stage_output_fails_without_partial_writes() {
    let store = Arc::new(FullDiskStore {
        inner: InMemorySessionStore::new(TTL),
    });
    let long_term = Arc::new(RecordingLongTerm::default());
    let mut agents = AgentRegistry::new();
    agents.register(Arc::new(analyzer()) as Arc<dyn Agent>);
    agents.register(Arc::new(researcher()) as Arc<dyn Agent>);
    let orchestrator = Orchestrator::new(
        Arc::clone(&store) as _,
        Arc::clone(&long_term) as _,
        agents,
        &OrchestratorConfig::default(),
    );

    let request = TaskRequest::new("analyze_profile")
        .with_session("full")
        .with_input("user_id", json!("u1"));
    let response = orchestrator.execute(request).await;

    assert_eq!(response.status, TaskStatus::PartialFailure);
    let error = response.error.unwrap();
    assert_eq!(error.kind, ErrorKind::Database);
    assert_eq!(error.stage, Some(0));
    assert!(error.message.contains("disk full"));
    assert!(response.result.is_empty());

    // The trace reports the stage as failed, not ok
    assert_eq!(response.trace.len(), 1);
    assert_eq!(response.trace.entries()[0].status, AgentStatus::Failed);

    // Neither fields nor a log entry became visible, and nothing was persisted
    assert!(store.get_all("full").await.unwrap().is_empty());
    assert!(store.read_all("full").await.unwrap().is_empty());
    assert_eq!(long_term.writes.load(Ordering::SeqCst), 0);
}
