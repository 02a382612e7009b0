//! Market intelligence (`research`)
//!
//! Searches the job board with a query derived from the strategy, tops up
//! thin results from previously stored postings, asks the model to score
//! each posting against the profile and keeps the best matches.

use crate::db::LongTermStore;
use crate::llm::parse_json_response;
use crate::router::{JOB_MATCHES, PROFILE, STRATEGY};
use async_trait::async_trait;
use careerflow_sdk::agent::{
    Agent, AgentInput, AgentResult, GenerateRequest, JobQuery, JobSearch, LanguageModel,
};
use careerflow_sdk::models::{JobMatch, JobPosting, Strategy, UserProfile};
use careerflow_sdk::types::{Capability, ContextMap};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_SCORE: f32 = 0.5;
const DEFAULT_PER_PAGE: usize = 20;

const RANK_SYSTEM: &str = "You are a job matching expert. Score each job for the candidate \
from 0.0 to 1.0. Return ONLY JSON: an object with a \"rankings\" array whose items have \
job_id, relevance_score, match_reasons (list) and gaps (list).";

/// Search text for a profile and strategy
///
/// First target position, else the top three skills, else `"developer"`.
pub fn build_search_query(profile: &UserProfile, strategy: &Strategy) -> String {
    if let Some(position) = strategy
        .target_positions
        .iter()
        .find(|p| !p.trim().is_empty())
    {
        return position.trim().to_string();
    }

    let skills: Vec<&str> = profile
        .skill_names()
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .take(3)
        .collect();
    if !skills.is_empty() {
        return skills.join(" ");
    }

    "developer".to_string()
}

#[derive(Debug, Deserialize)]
struct Ranking {
    job_id: Value,
    #[serde(default)]
    relevance_score: Option<f32>,
    #[serde(default)]
    match_reasons: Vec<String>,
    #[serde(default)]
    gaps: Vec<String>,
}

impl Ranking {
    fn job_id(&self) -> String {
        match &self.job_id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Accepts a bare array, `{"rankings": [...]}` or a single ranking object
fn parse_rankings(reply: &str) -> Result<Vec<Ranking>, String> {
    let value: Value = parse_json_response(reply).map_err(|e| e.to_string())?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("rankings") {
            Some(Value::Array(items)) => items,
            Some(_) => return Err("rankings is not a list".to_string()),
            None if map.contains_key("job_id") => vec![Value::Object(map)],
            None => return Err("no rankings in model output".to_string()),
        },
        _ => return Err("unexpected ranking format".to_string()),
    };

    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

pub struct MarketAgent {
    llm: Arc<dyn LanguageModel>,
    jobs: Arc<dyn JobSearch>,
    long_term: Option<Arc<dyn LongTermStore>>,
    max_matches: usize,
    per_page: usize,
}

impl MarketAgent {
    pub const NAME: &'static str = "market_intelligence_agent";

    pub fn new(llm: Arc<dyn LanguageModel>, jobs: Arc<dyn JobSearch>) -> Self {
        Self {
            llm,
            jobs,
            long_term: None,
            max_matches: 20,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    /// Backfill thin searches from stored postings
    pub fn with_long_term(mut self, store: Arc<dyn LongTermStore>) -> Self {
        self.long_term = Some(store);
        self
    }

    pub fn with_max_matches(mut self, max_matches: usize) -> Self {
        self.max_matches = max_matches.max(1);
        self
    }

    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    /// Similar stored postings not already in `postings`; best-effort
    async fn backfill(&self, profile: &UserProfile, postings: &[JobPosting]) -> Vec<JobPosting> {
        let Some(store) = &self.long_term else {
            return Vec::new();
        };
        let wanted = self.per_page.saturating_sub(postings.len());
        if wanted == 0 {
            return Vec::new();
        }

        let embedding = match self.llm.embed(&profile.embedding_text()).await {
            Ok(v) => v,
            Err(e) => {
                debug!("No profile embedding for backfill: {}", e);
                return Vec::new();
            }
        };

        let seen: HashSet<&str> = postings.iter().map(|p| p.job_id.as_str()).collect();
        match store.find_similar_jobs(&embedding, wanted + seen.len()).await {
            Ok(similar) => similar
                .into_iter()
                .filter(|p| !seen.contains(p.job_id.as_str()))
                .take(wanted)
                .collect(),
            Err(e) => {
                debug!("Similar job lookup failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Score postings, best first. The second value explains a fallback to
    /// default scores.
    async fn rank(
        &self,
        postings: Vec<JobPosting>,
        profile: &UserProfile,
        strategy: &Strategy,
    ) -> (Vec<JobMatch>, Option<String>) {
        let summaries: Vec<Value> = postings
            .iter()
            .map(|p| {
                json!({
                    "job_id": p.job_id,
                    "title": p.title,
                    "company": p.company,
                    "skills_required": p.skills_required,
                    "seniority_level": p.seniority_level,
                })
            })
            .collect();

        let prompt = format!(
            "Rank these jobs for the candidate.\n\nCandidate Skills: {}\nCandidate Seniority: {}\n\
             Target Positions: {}\n\nJobs:\n{}",
            profile.skill_names().join(", "),
            profile.seniority.as_str(),
            strategy.target_positions.join(", "),
            Value::Array(summaries),
        );
        let request = GenerateRequest::new(prompt)
            .with_system(RANK_SYSTEM)
            .json()
            .with_temperature(0.3);

        let rankings = match self.llm.generate(&request).await {
            Ok(reply) => parse_rankings(&reply),
            Err(e) => Err(e.to_string()),
        };

        let (mut by_id, problem): (HashMap<String, Ranking>, Option<String>) = match rankings {
            Ok(list) => (list.into_iter().map(|r| (r.job_id(), r)).collect(), None),
            Err(e) => {
                warn!("Ranking unavailable, using default scores: {}", e);
                (HashMap::new(), Some(format!("ranking: {}", e)))
            }
        };

        let mut matches: Vec<JobMatch> = postings
            .into_iter()
            .map(|job| match by_id.remove(&job.job_id) {
                Some(r) => JobMatch {
                    relevance_score: r.relevance_score.unwrap_or(DEFAULT_SCORE).clamp(0.0, 1.0),
                    match_reasons: r.match_reasons,
                    gaps: r.gaps,
                    job,
                    embedding: None,
                },
                None => JobMatch {
                    job,
                    relevance_score: DEFAULT_SCORE,
                    match_reasons: Vec::new(),
                    gaps: Vec::new(),
                    embedding: None,
                },
            })
            .collect();

        // Stable sort keeps search order among equal scores
        matches.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        matches.truncate(self.max_matches);
        (matches, problem)
    }

    /// Attach an embedding to each match where the model provides one
    async fn embed_matches(&self, matches: &mut [JobMatch]) {
        let vectors = join_all(matches.iter().map(|m| {
            let text = m.job.embedding_text();
            async move { self.llm.embed(&text).await }
        }))
        .await;

        for (m, vector) in matches.iter_mut().zip(vectors) {
            m.embedding = vector.ok().filter(|v| !v.is_empty());
        }
    }
}

#[async_trait]
impl Agent for MarketAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capability(&self) -> Capability {
        Capability::Research
    }

    async fn invoke(&self, input: AgentInput) -> AgentResult {
        let profile: UserProfile = match input.field(PROFILE) {
            Ok(p) => p,
            Err(e) => return AgentResult::failed(e.to_string()),
        };
        let strategy: Strategy = match input.field(STRATEGY) {
            Ok(s) => s,
            Err(e) => return AgentResult::failed(e.to_string()),
        };

        let mut query = JobQuery::new(build_search_query(&profile, &strategy), self.per_page);
        query.area = profile.location.clone();
        query.salary = profile.salary_expectations;

        let mut postings = match self.jobs.search(&query).await {
            Ok(p) => p,
            Err(e) => {
                return AgentResult::failed(format!("{} search failed: {}", self.jobs.name(), e))
            }
        };
        let found = postings.len();

        let extra = self.backfill(&profile, &postings).await;
        let backfilled = extra.len();
        postings.extend(extra);

        let mut problems = Vec::new();
        let mut matches = if postings.is_empty() {
            problems.push(format!("no jobs found for '{}'", query.text));
            Vec::new()
        } else {
            let (matches, problem) = self.rank(postings, &profile, &strategy).await;
            problems.extend(problem);
            matches
        };
        self.embed_matches(&mut matches).await;

        let payload = json!({
            "search_query": query.text,
            "found": found,
            "backfilled": backfilled,
            "total_matches": matches.len(),
            "top": matches.iter().take(5).map(|m| json!({
                "job_id": m.job.job_id,
                "title": m.job.title,
                "relevance_score": m.relevance_score,
            })).collect::<Vec<_>>(),
        });

        let matches_value = match serde_json::to_value(&matches) {
            Ok(v) => v,
            Err(e) => return AgentResult::failed(format!("serialization: {}", e)),
        };
        let mut fragment = ContextMap::new();
        fragment.insert(JOB_MATCHES.to_string(), matches_value);

        info!(
            "Research for '{}': {} found, {} backfilled, {} kept",
            query.text,
            found,
            backfilled,
            matches.len()
        );

        if problems.is_empty() {
            AgentResult::ok(fragment, payload)
        } else {
            AgentResult::degraded(fragment, payload, problems.join("; "))
        }
    }
}
