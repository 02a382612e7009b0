// CareerFlow
// Main entry point for the careerflow binary

use careerflow_engine::cli::{ApplicationsAction, Cli, Command, SessionAction};
use careerflow_engine::config::Config;
use careerflow_engine::handlers::{
    handle_applications, handle_history, handle_metrics, handle_replay, handle_run,
    handle_session_delete, handle_session_purge, handle_session_show, handle_set_status,
    OutputFormat,
};
use careerflow_engine::telemetry::init_telemetry_with_level;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log beats the config file; RUST_LOG beats both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    tracing::info!(
        "CareerFlow v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Handle commands
    match cli.command {
        Command::Run(args) => {
            tracing::info!("Executing task: {}", args.task_type);
            handle_run(args, &config, format).await
        }

        Command::Session { action } => match action {
            SessionAction::Show { session_id } => {
                handle_session_show(session_id, &config, format).await
            }
            SessionAction::Delete { session_id } => {
                handle_session_delete(session_id, &config, format).await
            }
            SessionAction::Purge => handle_session_purge(&config, format).await,
        },

        Command::Applications { action } => match action {
            ApplicationsAction::List { user_id } => {
                tracing::info!("Listing applications for {}", user_id);
                handle_applications(user_id, &config, format).await
            }
            ApplicationsAction::SetStatus {
                application_id,
                status,
            } => handle_set_status(application_id, status, &config, format).await,
        },

        Command::Metrics { user_id, days } => {
            tracing::info!("Computing {}-day metrics for {}", days, user_id);
            handle_metrics(user_id, days, &config, format).await
        }

        Command::History { limit } => {
            tracing::info!("Showing last {} tasks", limit);
            handle_history(limit, &config, format).await
        }

        Command::Replay { task_id } => {
            tracing::info!("Replaying task: {}", task_id);
            handle_replay(task_id, &config, format).await
        }
    }
}
