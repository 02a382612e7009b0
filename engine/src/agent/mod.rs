//! Agent dispatch
//!
//! Concrete agents for the three capabilities and the registry the
//! orchestrator dispatches through. Agents only read what the stage hands
//! them and only write through the fragment they return; persistence and
//! context merging belong to the orchestrator.

pub mod market;
pub mod personalization;
pub mod strategy;

pub use market::MarketAgent;
pub use personalization::PersonalizationAgent;
pub use strategy::StrategyAgent;

use crate::config::Config;
use crate::db::LongTermStore;
use crate::tools::Toolbox;
use careerflow_sdk::agent::{Agent, AgentInput, AgentResult};
use careerflow_sdk::types::Capability;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Capability → agent table
#[derive(Default, Clone)]
pub struct AgentRegistry {
    agents: HashMap<Capability, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard agents wired to the given tools
    pub fn standard(tools: &Toolbox, long_term: Arc<dyn LongTermStore>, config: &Config) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StrategyAgent::new(Arc::clone(&tools.llm))));
        registry.register(Arc::new(
            MarketAgent::new(Arc::clone(&tools.llm), Arc::clone(&tools.jobs))
                .with_long_term(long_term)
                .with_max_matches(config.orchestrator.max_job_matches)
                .with_per_page(config.job_search.per_page),
        ));
        registry.register(Arc::new(PersonalizationAgent::new(Arc::clone(&tools.llm))));
        registry
    }

    /// Register an agent under its capability, replacing any previous one
    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        let capability = agent.capability();
        if let Some(previous) = self.agents.insert(capability, agent) {
            debug!("Replaced agent {} for {}", previous.name(), capability);
        }
    }

    pub fn get(&self, capability: Capability) -> Option<&Arc<dyn Agent>> {
        self.agents.get(&capability)
    }

    /// Name recorded in traces for a capability
    pub fn agent_name(&self, capability: Capability) -> String {
        self.get(capability)
            .map(|a| a.name().to_string())
            .unwrap_or_else(|| format!("unregistered_{}", capability))
    }

    /// Invoke the agent registered for `capability`
    pub async fn invoke(&self, capability: Capability, input: AgentInput) -> AgentResult {
        match self.get(capability) {
            Some(agent) => agent.invoke(input).await,
            None => {
                warn!("No agent registered for capability {}", capability);
                AgentResult::failed(format!("no agent registered for {}", capability))
            }
        }
    }
}
