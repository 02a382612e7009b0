//! Task Router
//!
//! Maps a task type to the ordered stages the orchestrator runs. Plans are
//! plain data: each stage names its capability, the context fields it reads
//! and writes, and what gets copied to the long-term store once it succeeds.
//! The router holds no state beyond its configuration and is safe to share.

use careerflow_sdk::errors::EngineError;
use careerflow_sdk::types::{Capability, TaskType};
use serde::Serialize;

pub const PROFILE: &str = "profile";
pub const STRATEGY: &str = "strategy";
pub const JOB_MATCHES: &str = "job_matches";
pub const APPLICATIONS: &str = "applications";

/// Durable artifact copied to the long-term store after a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    Profile,
    Strategy,
    JobPostings,
    Applications,
}

impl Artifact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Strategy => "strategy",
            Self::JobPostings => "job_postings",
            Self::Applications => "applications",
        }
    }

    /// Context field the artifact is read from
    pub fn source_field(&self) -> &'static str {
        match self {
            Self::Profile => PROFILE,
            Self::Strategy => STRATEGY,
            Self::JobPostings => JOB_MATCHES,
            Self::Applications => APPLICATIONS,
        }
    }
}

/// One stage of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSpec {
    pub capability: Capability,
    pub requires: Vec<&'static str>,
    pub produces: Vec<&'static str>,
    pub persists: Vec<Artifact>,
    /// Upper bound on items the stage should produce
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_out: Option<usize>,
}

/// Ordered stages for one task type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagePlan {
    pub task_type: TaskType,
    pub stages: Vec<StageSpec>,
    /// Context fields that make up the task's result
    pub result_fields: Vec<&'static str>,
}

impl StagePlan {
    fn from_stages(task_type: TaskType, stages: Vec<StageSpec>) -> Self {
        let mut result_fields = Vec::new();
        for field in stages.iter().flat_map(|s| s.produces.iter()) {
            if !result_fields.contains(field) {
                result_fields.push(*field);
            }
        }
        Self {
            task_type,
            stages,
            result_fields,
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn capabilities(&self) -> Vec<Capability> {
        self.stages.iter().map(|s| s.capability).collect()
    }
}

/// Resolves task types to stage plans
#[derive(Debug, Clone)]
pub struct TaskRouter {
    applications_per_task: usize,
}

impl Default for TaskRouter {
    fn default() -> Self {
        Self::new(3)
    }
}

impl TaskRouter {
    pub fn new(applications_per_task: usize) -> Self {
        Self {
            applications_per_task: applications_per_task.max(1),
        }
    }

    fn analyze(&self) -> StageSpec {
        StageSpec {
            capability: Capability::Analyze,
            requires: Vec::new(),
            produces: vec![PROFILE, STRATEGY],
            persists: vec![Artifact::Profile, Artifact::Strategy],
            fan_out: None,
        }
    }

    fn research(&self) -> StageSpec {
        StageSpec {
            capability: Capability::Research,
            requires: vec![PROFILE, STRATEGY],
            produces: vec![JOB_MATCHES],
            persists: vec![Artifact::JobPostings],
            fan_out: None,
        }
    }

    fn personalize(&self) -> StageSpec {
        StageSpec {
            capability: Capability::Personalize,
            requires: vec![PROFILE, JOB_MATCHES],
            produces: vec![APPLICATIONS],
            persists: vec![Artifact::Applications],
            fan_out: Some(self.applications_per_task),
        }
    }

    pub fn plan(&self, task_type: TaskType) -> StagePlan {
        let stages = match task_type {
            TaskType::AnalyzeProfile => vec![self.analyze()],
            TaskType::FindJobs => vec![self.research()],
            TaskType::CreateApplication => vec![self.personalize()],
            TaskType::FullJourney => vec![self.analyze(), self.research(), self.personalize()],
        };
        StagePlan::from_stages(task_type, stages)
    }

    /// Plan for a raw task type string
    pub fn resolve(&self, task_type: &str) -> Result<StagePlan, EngineError> {
        Ok(self.plan(task_type.parse()?))
    }
}
