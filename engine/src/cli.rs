//! CLI interface for CareerFlow
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines the task, session, application and history commands plus the
//! global flags.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CareerFlow job-search orchestrator
///
/// Runs multi-stage job-search tasks (profile analysis, job research,
/// application drafting) over a shared, time-limited session.
#[derive(Parser, Debug)]
#[command(name = "careerflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a task
    Run(RunArgs),

    /// Inspect or remove sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// List stored applications or record their outcome
    Applications {
        #[command(subcommand)]
        action: ApplicationsAction,
    },

    /// Show application outcome metrics for a user
    Metrics {
        /// User id the applications belong to
        user_id: String,

        /// Only count applications created in the last N days
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..=3650))]
        days: u32,
    },

    /// Show task history
    History {
        /// Number of tasks to show (default: 10)
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show the full response of a past task
    Replay {
        /// Task ID to replay
        task_id: String,
    },
}

/// Arguments of `careerflow run`
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// analyze_profile, find_jobs, create_application or full_journey
    pub task_type: String,

    /// Continue an existing session
    #[arg(short, long)]
    pub session: Option<String>,

    /// Read the resume text from a file
    #[arg(long, value_name = "PATH")]
    pub resume: Option<PathBuf>,

    /// User the results belong to
    #[arg(long)]
    pub user: Option<String>,

    /// Draft an application for this job only
    #[arg(long)]
    pub job_id: Option<String>,

    /// Extra input as a JSON object, merged under the flags above
    #[arg(long, value_name = "JSON")]
    pub input: Option<String>,
}

/// Application actions
#[derive(Subcommand, Debug)]
pub enum ApplicationsAction {
    /// List a user's applications
    List {
        /// User id the applications belong to
        user_id: String,
    },

    /// Record an employer response
    SetStatus {
        /// Application id, e.g. app_u1_42
        application_id: String,

        /// draft, submitted, viewed, interview, rejected or accepted
        status: String,
    },
}

/// Session management actions
#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// Show a session's context and workspace log
    Show {
        /// Session id
        session_id: String,
    },

    /// Delete a session with its workspace log
    Delete {
        /// Session id
        session_id: String,
    },

    /// Remove every expired session
    Purge,
}
