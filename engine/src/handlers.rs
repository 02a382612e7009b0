//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - run: Execute a task and print its response
//! - session show/delete/purge: Inspect and manage session state
//! - applications: List stored applications for a user
//! - history / replay: Show past task runs

use anyhow::{bail, Context, Result};
use careerflow_sdk::models::ApplicationStatus;
use careerflow_sdk::types::{TaskRequest, TaskResponse, TaskStatus};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::agent::AgentRegistry;
use crate::cli::RunArgs;
use crate::config::{Config, SessionBackend};
use crate::db::{Database, LongTermStore};
use crate::guardrails::{sanitize_output, InjectionDetector};
use crate::memory::{spawn_reaper, ContextStore, InMemorySessionStore, SessionStore};
use crate::orchestrator::Orchestrator;
use crate::tools::Toolbox;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Engine components wired from configuration
pub struct Services {
    pub database: Database,
    pub orchestrator: Orchestrator,
    guard: InjectionDetector,
    shutdown: CancellationToken,
    reaper: Option<JoinHandle<()>>,
}

impl Services {
    /// Open the database and build the orchestrator with the standard agents
    pub async fn start(config: &Config) -> Result<Self> {
        let database = Database::new(&config.database_path())
            .await
            .context("Failed to open database")?;
        let tools = Toolbox::from_config(config)?;
        let long_term: Arc<dyn LongTermStore> = Arc::new(database.long_term());
        let agents = AgentRegistry::standard(&tools, Arc::clone(&long_term), config);
        Self::assemble(config, database, long_term, agents)
    }

    /// Wire the given agents; used by `start` and by callers bringing their own
    pub fn assemble(
        config: &Config,
        database: Database,
        long_term: Arc<dyn LongTermStore>,
        agents: AgentRegistry,
    ) -> Result<Self> {
        let ttl = config.session.ttl();
        // The reaper needs the same store as a plain Context Store
        let (sessions, reaped): (Arc<dyn SessionStore>, Arc<dyn ContextStore>) =
            match config.session.backend {
                SessionBackend::Memory => {
                    let store = Arc::new(InMemorySessionStore::new(ttl));
                    (
                        Arc::clone(&store) as Arc<dyn SessionStore>,
                        store as Arc<dyn ContextStore>,
                    )
                }
                SessionBackend::Sqlite => {
                    let store = Arc::new(database.sessions(ttl));
                    (
                        Arc::clone(&store) as Arc<dyn SessionStore>,
                        store as Arc<dyn ContextStore>,
                    )
                }
            };

        let shutdown = CancellationToken::new();
        let reaper = (config.session.purge_interval_secs > 0).then(|| {
            spawn_reaper(
                reaped,
                std::time::Duration::from_secs(config.session.purge_interval_secs),
                shutdown.clone(),
            )
        });

        let orchestrator = Orchestrator::new(sessions, long_term, agents, &config.orchestrator);

        Ok(Self {
            database,
            orchestrator,
            guard: InjectionDetector::new()?,
            shutdown,
            reaper,
        })
    }

    /// Screen, execute, sanitize and record one task
    pub async fn submit(&self, request: TaskRequest, cancel: CancellationToken) -> TaskResponse {
        let mut response = match self.guard.screen_request(&request) {
            Ok(()) => self.orchestrator.execute_with_cancel(request, cancel).await,
            Err(e) => {
                warn!("Request rejected by input screening: {}", e);
                TaskResponse::rejected(
                    uuid::Uuid::new_v4().to_string(),
                    request.session_id.clone(),
                    request.task_type.clone(),
                    &e,
                )
            }
        };
        sanitize_output(&mut response.result);

        if let Err(e) = self.database.task_runs().record(&response).await {
            warn!("Failed to record task run {}: {:#}", response.task_id, e);
        }
        response
    }

    /// Stop the reaper and checkpoint the database
    pub async fn shutdown(mut self) -> Result<()> {
        self.shutdown.cancel();
        if let Some(reaper) = self.reaper.take() {
            reaper.await.ok();
        }
        drop(self.orchestrator);
        self.database.close().await
    }
}

/// Build a task request from `run` arguments
///
/// `--input` supplies a JSON object; the dedicated flags override its keys.
pub fn build_request(args: &RunArgs) -> Result<TaskRequest> {
    let mut request = TaskRequest::new(args.task_type.clone());
    if let Some(session) = &args.session {
        request = request.with_session(session.clone());
    }

    if let Some(raw) = &args.input {
        let value: serde_json::Value =
            serde_json::from_str(raw).context("--input must be valid JSON")?;
        match value {
            serde_json::Value::Object(map) => request.input_data = map,
            _ => anyhow::bail!("--input must be a JSON object"),
        }
    }

    if let Some(path) = &args.resume {
        request = request.with_input("resume_text", json!(read_resume(path)?));
    }
    if let Some(user) = &args.user {
        request = request.with_input("user_id", json!(user));
    }
    if let Some(job_id) = &args.job_id {
        request = request.with_input("job_id", json!(job_id));
    }
    Ok(request)
}

fn read_resume(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read resume from {}", path.display()))
}

/// Execute a task
///
/// Ctrl-C cancels the task before its next stage; context written so far
/// stays in the session.
pub async fn handle_run(args: RunArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let request = build_request(&args)?;
    let services = Services::start(config).await?;

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling after the current stage");
                cancel.cancel();
            }
        })
    };

    if let OutputFormat::Text = format {
        println!("Executing task: {}", request.task_type);
        println!();
    }

    let response = services.submit(request, cancel).await;
    interrupt.abort();

    print_response(&response, format)?;
    services.shutdown().await?;

    match response.status {
        TaskStatus::Completed => Ok(()),
        status => Err(anyhow::anyhow!("Task finished with status {}", status)),
    }
}

fn print_response(response: &TaskResponse, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(response)?);
        }
        OutputFormat::Text => {
            let mark = if response.is_completed() { "✓" } else { "✗" };
            println!("{} Task {}: {}", mark, response.task_id, response.status);
            if let Some(session) = &response.session_id {
                println!("  Session: {}", session);
            }
            println!(
                "  Duration: {}ms over {} stage(s)",
                response.trace.total_duration_ms(),
                response.trace.len()
            );

            if !response.trace.is_empty() {
                println!();
                println!("Stages:");
                for (i, entry) in response.trace.entries().iter().enumerate() {
                    println!(
                        "  {}. {} ({}) {} in {}ms",
                        i + 1,
                        entry.agent,
                        entry.capability,
                        entry.status,
                        entry.duration_ms
                    );
                    if let Some(message) = &entry.message {
                        println!("     {}", message);
                    }
                }
            }

            if let Some(error) = &response.error {
                println!();
                println!("Error [{}]: {}", error.kind, error.message);
                println!("  Hint: {}", error.hint);
            }

            for warning in &response.warnings {
                println!("Warning [{}]: {}", warning.kind, warning.message);
            }

            if !response.result.is_empty() {
                println!();
                println!("Result:");
                println!("{}", serde_json::to_string_pretty(&response.result)?);
            }
        }
    }
    Ok(())
}

/// Show a session's context and workspace log
pub async fn handle_session_show(
    session_id: String,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let services = Services::start(config).await?;
    let snapshot = services.orchestrator.inspect(&session_id).await;
    services.shutdown().await?;
    let snapshot = snapshot?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        OutputFormat::Text => {
            println!("Session: {}", snapshot.info.session_id);
            println!(
                "  Created: {}",
                snapshot.info.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!("  Expires in: {}s", snapshot.info.expires_in.as_secs());
            println!();
            println!("Context fields ({}):", snapshot.context.len());
            for field in snapshot.context.keys() {
                println!("  - {}", field);
            }
            println!();
            println!("Workspace log ({} entries):", snapshot.workspace.len());
            for entry in &snapshot.workspace {
                println!(
                    "  {} {} ({})",
                    entry.timestamp.format("%H:%M:%S"),
                    entry.agent,
                    entry.capability
                );
            }
        }
    }
    Ok(())
}

/// Delete a session together with its workspace log
pub async fn handle_session_delete(
    session_id: String,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let services = Services::start(config).await?;
    let removed = services.orchestrator.delete_session(&session_id).await;
    services.shutdown().await?;
    let removed = removed?;

    match format {
        OutputFormat::Json => {
            let output = json!({ "session_id": session_id, "deleted": removed });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            if removed {
                println!("Deleted session {}", session_id);
            } else {
                println!("No live session {}", session_id);
            }
        }
    }
    Ok(())
}

/// Remove every expired session
pub async fn handle_session_purge(config: &Config, format: OutputFormat) -> Result<()> {
    let services = Services::start(config).await?;
    let purged = services.orchestrator.sessions().purge_expired().await;
    services.shutdown().await?;
    let purged = purged?;
    info!("Purged {} expired session(s)", purged);

    match format {
        OutputFormat::Json => println!("{}", json!({ "purged": purged })),
        OutputFormat::Text => println!("Purged {} expired session(s)", purged),
    }
    Ok(())
}

/// List stored applications for a user
pub async fn handle_applications(
    user_id: String,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let database = Database::new(&config.database_path())
        .await
        .context("Failed to open database")?;
    let applications = database
        .long_term()
        .applications_for_user(&user_id)
        .await
        .context("Failed to load applications")?;

    match format {
        OutputFormat::Json => {
            let output = json!({
                "user_id": user_id,
                "applications": applications,
                "count": applications.len()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            if applications.is_empty() {
                println!("No applications for {}", user_id);
            }
            for app in &applications {
                println!("{} [{}]", app.application_id, app.status.as_str());
                println!("  Job: {}", app.job_id);
                println!("  Updated: {}", app.updated_at.format("%Y-%m-%d %H:%M:%S"));
                if let Some(at) = app.viewed_at {
                    println!("  Viewed: {}", at.format("%Y-%m-%d %H:%M:%S"));
                }
                if let Some(at) = app.interview_at {
                    println!("  Interview: {}", at.format("%Y-%m-%d %H:%M:%S"));
                }
            }
        }
    }
    database.close().await
}

fn parse_status(status: &str) -> Result<ApplicationStatus> {
    match ApplicationStatus::parse(&status.to_ascii_lowercase()) {
        Some(status) => Ok(status),
        None => bail!(
            "Invalid status '{}': expected draft, submitted, viewed, interview, rejected or accepted",
            status
        ),
    }
}

/// Record an employer response on an application
pub async fn handle_set_status(
    application_id: String,
    status: String,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let status = parse_status(&status)?;
    let database = Database::new(&config.database_path())
        .await
        .context("Failed to open database")?;
    let updated = database
        .applications()
        .update_status(&application_id, status)
        .await;
    database.close().await?;

    if !updated? {
        bail!("Application not found: {}", application_id);
    }
    info!("Application {} is now {}", application_id, status.as_str());

    match format {
        OutputFormat::Json => {
            let output = json!({ "application_id": application_id, "status": status });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => println!("{} -> {}", application_id, status.as_str()),
    }
    Ok(())
}

/// Show outcome metrics of a user's recent applications
pub async fn handle_metrics(
    user_id: String,
    days: u32,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let database = Database::new(&config.database_path())
        .await
        .context("Failed to open database")?;
    let metrics = database.applications().metrics(&user_id, days).await;
    database.close().await?;
    let metrics = metrics.context("Failed to compute metrics")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&metrics)?),
        OutputFormat::Text => {
            println!("Metrics for {} (last {} days):", user_id, days);
            println!("  Applications: {}", metrics.total_applications);
            println!(
                "  Viewed: {} ({:.1}%)",
                metrics.applications_viewed, metrics.click_through_rate
            );
            println!(
                "  Interviews: {} ({:.1}%)",
                metrics.interviews_scheduled, metrics.interview_rate
            );
            println!(
                "  Offers: {} ({:.1}%)",
                metrics.offers_received, metrics.offer_rate
            );
            println!(
                "  Average relevance: {:.2}",
                metrics.average_relevance_score
            );
        }
    }
    Ok(())
}

/// Show task history
pub async fn handle_history(limit: usize, config: &Config, format: OutputFormat) -> Result<()> {
    let database = Database::new(&config.database_path())
        .await
        .context("Failed to open database")?;

    let runs = database
        .task_runs()
        .recent(i64::try_from(limit).unwrap_or(i64::MAX))
        .await
        .context("Failed to fetch task history")?;

    match format {
        OutputFormat::Text => {
            if runs.is_empty() {
                println!("No tasks in history");
            } else {
                println!("Task History (last {} tasks):", limit);
                println!();
            }

            for run in &runs {
                println!("Task ID: {}", run.task_id);
                println!("  Type: {}", run.task_type);
                println!("  Status: {}", run.status);
                if let Some(session) = &run.session_id {
                    println!("  Session: {}", session);
                }
                println!("  Stages: {} ({}ms)", run.stages, run.duration_ms);
                if let Some(error) = &run.error {
                    println!("  Error: {}", error);
                }

                let created = chrono::DateTime::from_timestamp(run.created_at / 1000, 0)
                    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "Unknown".to_string());
                println!("  Created: {}", created);
                println!();
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "tasks": runs,
                "count": runs.len(),
                "limit": limit
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    database.close().await
}

/// Show the stored response of a past task
pub async fn handle_replay(task_id: String, config: &Config, format: OutputFormat) -> Result<()> {
    let database = Database::new(&config.database_path())
        .await
        .context("Failed to open database")?;

    let response = database
        .task_runs()
        .get_response(&task_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Task not found: {}", task_id))?;

    print_response(&response, format)?;
    database.close().await
}
