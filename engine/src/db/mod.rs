/// Database module for SQLite persistence
///
/// This module provides the durable side of the engine: user profiles,
/// strategies, job postings with their embeddings, generated applications and
/// the task run history. The session working set (context fields and the
/// workspace log) can live in the same database, see
/// `memory::SqliteSessionStore`. WAL mode is enabled for concurrent readers.
use crate::memory::SqliteSessionStore;
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub mod applications;
pub mod jobs;
pub mod long_term;
pub mod profiles;
pub mod task_runs;

// Re-export commonly used types
pub use applications::ApplicationRepository;
pub use jobs::{cosine_similarity, JobRepository};
pub use long_term::{LongTermStore, SqliteLongTermStore};
pub use profiles::ProfileRepository;
pub use task_runs::{TaskRun, TaskRunRepository};

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Enable WAL mode and foreign keys
    /// 3. Run migrations to set up the schema
    ///
    /// SQLite replays a leftover WAL on open, so no explicit recovery step is
    /// needed after an unclean shutdown. Call `close()` on shutdown to
    /// checkpoint the WAL.
    pub async fn new(db_path: &Path) -> Result<Self> {
        info!("Initializing database at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        let connection_string = format!("sqlite:{}", db_path.display());
        let options = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        debug!("Database connection established");

        let db = Self { pool };

        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    ///
    /// Every statement uses `IF NOT EXISTS`, so migrations can run on every
    /// start.
    async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::raw_sql(include_str!("../../migrations/001_initial.sql"))
            .execute(&self.pool)
            .await
            .context("Failed to execute migration 001_initial.sql")?;

        sqlx::raw_sql(include_str!("../../migrations/002_sessions.sql"))
            .execute(&self.pool)
            .await
            .context("Failed to execute migration 002_sessions.sql")?;

        sqlx::raw_sql(include_str!("../../migrations/003_task_runs.sql"))
            .execute(&self.pool)
            .await
            .context("Failed to execute migration 003_task_runs.sql")?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Flush the WAL to disk
    pub async fn flush_wal(&self) -> Result<()> {
        info!("Flushing WAL to disk");

        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .context("Failed to flush WAL")?;

        debug!("WAL flushed successfully");
        Ok(())
    }

    /// Close the database connection
    ///
    /// Flushes the WAL and closes all connections in the pool.
    pub async fn close(self) -> Result<()> {
        info!("Closing database connection");

        self.flush_wal().await?;
        self.pool.close().await;

        info!("Database connection closed");
        Ok(())
    }

    pub fn profiles(&self) -> ProfileRepository {
        ProfileRepository::new(self.pool.clone())
    }

    pub fn jobs(&self) -> JobRepository {
        JobRepository::new(self.pool.clone())
    }

    pub fn applications(&self) -> ApplicationRepository {
        ApplicationRepository::new(self.pool.clone())
    }

    pub fn task_runs(&self) -> TaskRunRepository {
        TaskRunRepository::new(self.pool.clone())
    }

    /// Long-term store backed by this database
    pub fn long_term(&self) -> SqliteLongTermStore {
        SqliteLongTermStore::new(self.pool.clone())
    }

    /// Session store sharing this database, with the given session TTL
    pub fn sessions(&self, ttl: Duration) -> SqliteSessionStore {
        SqliteSessionStore::new(self.pool.clone(), ttl)
    }
}

/// Current time in epoch milliseconds
pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
