//! Configuration management
//!
//! This module handles loading, validation, and management of the CareerFlow
//! configuration. Configuration is stored in TOML format at
//! ~/.careerflow/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **session**: Session TTL and which backend holds session state
//! - **orchestrator**: Timeouts, busy-session policy, fan-out limits
//! - **llm**: OpenAI-compatible endpoint (LiteLLM proxy) settings
//! - **job_search**: Job board endpoint settings
//!
//! # Examples
//!
//! ```no_run
//! use careerflow_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Session TTL: {:?}", config.session.ttl());
//! # Ok(())
//! # }
//! ```

use careerflow_sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    pub core: CoreConfig,

    /// Session store settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Orchestrator settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Language model settings
    #[serde(default)]
    pub llm: LLMConfig,

    /// Job board settings
    #[serde(default)]
    pub job_search: JobSearchConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Where session context and workspace logs live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// Process-local, lost on exit
    Memory,
    /// SQLite tables next to the long-term store
    Sqlite,
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session time-to-live in seconds
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_session_backend")]
    pub backend: SessionBackend,

    /// How often expired sessions are purged (0 disables the reaper)
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            backend: default_session_backend(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

/// What to do when a task arrives for a session that is already running one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusyPolicy {
    /// Fail fast with SessionBusy
    Reject,
    /// Wait until the running task releases the session
    Queue,
}

/// Orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound for one agent invocation
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_secs: u64,

    /// Upper bound for one store operation
    #[serde(default = "default_store_timeout")]
    pub store_timeout_secs: u64,

    #[serde(default = "default_busy_policy")]
    pub busy_policy: BusyPolicy,

    /// Applications generated per journey when no job id is given
    #[serde(default = "default_applications_per_journey")]
    pub applications_per_journey: usize,

    /// Ranked job matches kept by the research stage
    #[serde(default = "default_max_job_matches")]
    pub max_job_matches: usize,
}

impl OrchestratorConfig {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: default_stage_timeout(),
            store_timeout_secs: default_store_timeout(),
            busy_policy: default_busy_policy(),
            applications_per_journey: default_applications_per_journey(),
            max_job_matches: default_max_job_matches(),
        }
    }
}

/// OpenAI-compatible endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Base URL of the chat completions API
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Chat model name
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Sampling temperature (0.0-2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// HTTP timeout for a single request
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl LLMConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_http_timeout(),
        }
    }
}

/// Job board configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSearchConfig {
    #[serde(default = "default_job_search_url")]
    pub base_url: String,

    /// Postings requested per search
    #[serde(default = "default_per_page")]
    pub per_page: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Environment variable holding an optional bearer token
    #[serde(default = "default_job_search_token_env")]
    pub token_env: String,

    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl JobSearchConfig {
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

impl Default for JobSearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_job_search_url(),
            per_page: default_per_page(),
            user_agent: default_user_agent(),
            token_env: default_job_search_token_env(),
            timeout_secs: default_http_timeout(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.careerflow")
}

fn default_session_ttl() -> u64 {
    3600
}

fn default_session_backend() -> SessionBackend {
    SessionBackend::Sqlite
}

fn default_purge_interval() -> u64 {
    300
}

fn default_stage_timeout() -> u64 {
    120
}

fn default_store_timeout() -> u64 {
    5
}

fn default_busy_policy() -> BusyPolicy {
    BusyPolicy::Reject
}

fn default_applications_per_journey() -> usize {
    3
}

fn default_max_job_matches() -> usize {
    20
}

fn default_llm_base_url() -> String {
    "http://localhost:4000/v1".to_string()
}

fn default_llm_model() -> String {
    "qwen3-32b".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_api_key_env() -> String {
    "LITELLM_API_KEY".to_string()
}

fn default_http_timeout() -> u64 {
    30
}

fn default_job_search_url() -> String {
    "https://api.hh.ru".to_string()
}

fn default_per_page() -> usize {
    20
}

fn default_user_agent() -> String {
    format!("CareerFlow/{}", env!("CARGO_PKG_VERSION"))
}

fn default_job_search_token_env() -> String {
    "HH_API_TOKEN".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    /// Load configuration from the default location (~/.careerflow/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// validation fails.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let mut config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default_config();

        // Serialize before path expansion so the file keeps the portable ~ form
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        config.validate_and_process()?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.careerflow/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".careerflow").join("config.toml"))
    }

    fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                data_dir: default_data_dir(),
            },
            session: SessionConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            llm: LLMConfig::default(),
            job_search: JobSearchConfig::default(),
        }
    }

    /// Path of the SQLite database inside the data directory
    pub fn database_path(&self) -> PathBuf {
        self.core.data_dir.join("careerflow.db")
    }

    /// Validate and process configuration
    ///
    /// Validates value ranges, expands ~ in the data directory and creates
    /// it if missing.
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.session.ttl_secs == 0 {
            return Err(EngineError::Config(
                "session.ttl_secs must be greater than 0".to_string(),
            ));
        }

        if self.orchestrator.stage_timeout_secs == 0 || self.orchestrator.store_timeout_secs == 0
        {
            return Err(EngineError::Config(
                "orchestrator timeouts must be greater than 0".to_string(),
            ));
        }

        if self.orchestrator.applications_per_journey == 0 {
            return Err(EngineError::Config(
                "orchestrator.applications_per_journey must be at least 1".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(EngineError::Config(
                "llm.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.job_search.per_page == 0 || self.job_search.per_page > 100 {
            return Err(EngineError::Config(
                "job_search.per_page must be between 1 and 100".to_string(),
            ));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
