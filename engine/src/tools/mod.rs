pub mod hh;

pub use hh::HhJobSearch;

use crate::config::Config;
use crate::llm::OpenAICompatibleModel;
use anyhow::{Context, Result};
use careerflow_sdk::agent::{JobSearch, LanguageModel};
use std::sync::Arc;
use tracing::{debug, warn};

/// External collaborators handed to the agents
///
/// Both members are trait objects so tests can substitute fakes.
#[derive(Clone)]
pub struct Toolbox {
    pub llm: Arc<dyn LanguageModel>,
    pub jobs: Arc<dyn JobSearch>,
}

impl Toolbox {
    pub fn new(llm: Arc<dyn LanguageModel>, jobs: Arc<dyn JobSearch>) -> Self {
        Self { llm, jobs }
    }

    /// Build the production clients from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.llm.api_key().is_none() {
            warn!(
                "{} is not set; requests to {} go out unauthenticated",
                config.llm.api_key_env, config.llm.base_url
            );
        }

        let llm = OpenAICompatibleModel::new(&config.llm).context("Failed to build LLM client")?;
        let jobs =
            HhJobSearch::new(&config.job_search).context("Failed to build job search client")?;

        debug!(
            "Tools ready: model {} via {}, jobs via {}",
            config.llm.model, config.llm.base_url, config.job_search.base_url
        );

        Ok(Self::new(Arc::new(llm), Arc::new(jobs)))
    }
}
