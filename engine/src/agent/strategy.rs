//! Profile & strategy analyst (`analyze`)
//!
//! Turns resume text into a structured [`UserProfile`] and a search
//! [`Strategy`]. Both come from the language model; when its output is
//! unusable the agent falls back to a keyword profile and the default
//! strategy and reports `degraded`.

use crate::llm::parse_json_response;
use crate::router::{PROFILE, STRATEGY};
use async_trait::async_trait;
use careerflow_sdk::agent::{Agent, AgentInput, AgentResult, GenerateRequest, LanguageModel};
use careerflow_sdk::models::{Mobility, Seniority, Skill, Strategy, UserProfile};
use careerflow_sdk::types::{Capability, ContextMap};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

const MIN_RESUME_CHARS: usize = 10;

const PARSE_SYSTEM: &str = "You are an expert resume parser. Extract structured information \
from the resume and return ONLY a JSON object with the fields:\n\
- skills: list of objects with name, level (beginner/intermediate/advanced/expert), years_experience\n\
- seniority: one of \"junior\", \"middle\", \"senior\", \"lead\"\n\
- mobility: one of \"none\", \"local\", \"regional\", \"national\", \"international\"\n\
- location: city or region\n\
- salary_expectations: integer or null\n\
- career_objectives: string or null\n\
- preferred_industries: list of strings";

const STRATEGY_SYSTEM: &str = "You are an expert career consultant. Based on the candidate's \
profile, create a personalized job search strategy. Return ONLY a JSON object with:\n\
- objectives: list of career objectives\n\
- target_positions: list of target job titles\n\
- target_companies: list of target company types or names (can be empty)\n\
- priority_skills: list of skills to develop or highlight\n\
- timeline: suggested timeline for the search";

/// Model output for the resume parse; every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ParsedResume {
    skills: Vec<SkillEntry>,
    seniority: Option<Seniority>,
    mobility: Option<Mobility>,
    location: Option<String>,
    salary_expectations: Option<i64>,
    career_objectives: Option<String>,
    preferred_industries: Vec<String>,
}

/// Models return skills either as objects or as bare names
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SkillEntry {
    Full(Skill),
    Name(String),
}

impl From<SkillEntry> for Skill {
    fn from(entry: SkillEntry) -> Self {
        match entry {
            SkillEntry::Full(skill) => skill,
            SkillEntry::Name(name) => Skill {
                name,
                level: None,
                years_experience: None,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StrategyDraft {
    objectives: Vec<String>,
    target_positions: Vec<String>,
    target_companies: Vec<String>,
    priority_skills: Vec<String>,
    timeline: serde_json::Value,
}

impl StrategyDraft {
    fn into_strategy(self, user_id: &str) -> Option<Strategy> {
        if self.objectives.is_empty() || self.target_positions.is_empty() {
            return None;
        }
        let timeline = match self.timeline {
            serde_json::Value::String(s) => s,
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        };
        Some(Strategy {
            strategy_id: Strategy::id_for(user_id),
            user_id: user_id.to_string(),
            objectives: self.objectives,
            target_positions: self.target_positions,
            target_companies: self.target_companies,
            priority_skills: self.priority_skills,
            timeline,
        })
    }
}

/// Keyword guess at seniority for when the model cannot help
fn guess_seniority(text: &str) -> Seniority {
    let text = text.to_lowercase();
    if text.contains("lead") || text.contains("head of") || text.contains("principal") {
        Seniority::Lead
    } else if text.contains("senior") {
        Seniority::Senior
    } else if text.contains("junior") || text.contains("intern") {
        Seniority::Junior
    } else {
        Seniority::Middle
    }
}

pub struct StrategyAgent {
    llm: Arc<dyn LanguageModel>,
}

impl StrategyAgent {
    pub const NAME: &'static str = "strategy_agent";

    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    fn base_profile(input: &AgentInput, resume_text: &str) -> UserProfile {
        UserProfile {
            user_id: input.user_id(),
            name: input.input_str("name").map(String::from),
            email: input.input_str("email").map(String::from),
            resume_text: resume_text.to_string(),
            seniority: guess_seniority(resume_text),
            ..UserProfile::default()
        }
    }

    /// Fill `profile` from the model's structured parse
    async fn parse_profile(&self, mut profile: UserProfile) -> Result<UserProfile, String> {
        let request = GenerateRequest::new(format!("Parse this resume:\n\n{}", profile.resume_text))
            .with_system(PARSE_SYSTEM)
            .json()
            .with_temperature(0.3);

        let reply = self.llm.generate(&request).await.map_err(|e| e.to_string())?;
        let parsed: ParsedResume = parse_json_response(&reply).map_err(|e| e.to_string())?;

        profile.skills = parsed.skills.into_iter().map(Skill::from).collect();
        profile.seniority = parsed.seniority.unwrap_or_default();
        profile.mobility = parsed.mobility.unwrap_or_default();
        profile.location = parsed.location.filter(|l| !l.trim().is_empty());
        profile.salary_expectations = parsed.salary_expectations;
        profile.career_objectives = parsed.career_objectives;
        profile.preferred_industries = parsed.preferred_industries;
        Ok(profile)
    }

    async fn build_strategy(&self, profile: &UserProfile) -> Result<Strategy, String> {
        let mut resume = profile.resume_text.clone();
        careerflow_sdk::models::truncate_at_boundary(&mut resume, 1000);

        let prompt = format!(
            "Create a job search strategy for this candidate:\n\n\
             Resume: {}\nSkills: {}\nSeniority: {}\nLocation: {}\n\
             Career Objectives: {}\nPreferred Industries: {}",
            resume,
            profile.skill_names().join(", "),
            profile.seniority.as_str(),
            profile.location.as_deref().unwrap_or("Not specified"),
            profile.career_objectives.as_deref().unwrap_or("Career growth"),
            profile.preferred_industries.join(", "),
        );
        let request = GenerateRequest::new(prompt)
            .with_system(STRATEGY_SYSTEM)
            .json();

        let reply = self.llm.generate(&request).await.map_err(|e| e.to_string())?;
        let draft: StrategyDraft = parse_json_response(&reply).map_err(|e| e.to_string())?;
        draft
            .into_strategy(&profile.user_id)
            .ok_or_else(|| "strategy is missing objectives or target positions".to_string())
    }
}

#[async_trait]
impl Agent for StrategyAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capability(&self) -> Capability {
        Capability::Analyze
    }

    async fn invoke(&self, input: AgentInput) -> AgentResult {
        let resume_text = match input.input_str("resume_text").map(str::trim) {
            Some(text) if text.chars().count() >= MIN_RESUME_CHARS => text.to_string(),
            Some(_) => return AgentResult::failed("resume text is too short or empty"),
            None => return AgentResult::failed("resume_text is required"),
        };

        let mut problems = Vec::new();
        let base = Self::base_profile(&input, &resume_text);

        let profile = match self.parse_profile(base.clone()).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Resume parse failed, using keyword profile: {}", e);
                problems.push(format!("profile: {}", e));
                base
            }
        };
        debug!(
            "Profile for {}: {} skills, {}",
            profile.user_id,
            profile.skills.len(),
            profile.seniority.as_str()
        );

        let strategy = match self.build_strategy(&profile).await {
            Ok(strategy) => strategy,
            Err(e) => {
                warn!("Strategy generation failed, using default: {}", e);
                problems.push(format!("strategy: {}", e));
                Strategy::fallback(&profile.user_id)
            }
        };

        let (profile_value, strategy_value) =
            match (serde_json::to_value(&profile), serde_json::to_value(&strategy)) {
                (Ok(p), Ok(s)) => (p, s),
                (Err(e), _) | (_, Err(e)) => {
                    return AgentResult::failed(format!("serialization: {}", e))
                }
            };

        let mut fragment = ContextMap::new();
        fragment.insert(PROFILE.to_string(), profile_value);
        fragment.insert(STRATEGY.to_string(), strategy_value);

        let payload = json!({
            "user_id": profile.user_id,
            "skills": profile.skill_names(),
            "seniority": profile.seniority,
            "target_positions": strategy.target_positions,
        });

        info!("Analyzed profile for {}", profile.user_id);
        if problems.is_empty() {
            AgentResult::ok(fragment, payload)
        } else {
            AgentResult::degraded(fragment, payload, problems.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::ScriptedModel;
    use careerflow_sdk::types::AgentStatus;

    const PROFILE_JSON: &str = r#"```json
{"skills": [{"name": "Go", "level": "advanced", "years_experience": 5}, "PostgreSQL"],
 "seniority": "senior", "location": "Москва", "preferred_industries": ["fintech"]}
```"#;

    const STRATEGY_JSON: &str = r#"{"objectives": ["Grow into staff role"],
 "target_positions": ["Senior Go Developer"], "timeline": {"months": 3}}"#;

    fn input(resume: &str) -> AgentInput {
        AgentInput::new("sess-1").with_input("resume_text", json!(resume))
    }

    #[tokio::test]
    async fn test_produces_profile_and_strategy() {
        let llm = Arc::new(ScriptedModel::replying(&[PROFILE_JSON, STRATEGY_JSON]));
        let agent = StrategyAgent::new(llm);

        let result = agent.invoke(input("5 years Go backend")).await;
        assert_eq!(result.status, AgentStatus::Ok);

        let profile: UserProfile =
            serde_json::from_value(result.fragment[PROFILE].clone()).unwrap();
        assert_eq!(profile.user_id, "sess-1");
        assert_eq!(profile.skill_names(), vec!["Go", "PostgreSQL"]);
        assert_eq!(profile.seniority, Seniority::Senior);
        assert_eq!(profile.resume_text, "5 years Go backend");

        let strategy: Strategy =
            serde_json::from_value(result.fragment[STRATEGY].clone()).unwrap();
        assert_eq!(strategy.strategy_id, "strategy_sess-1");
        assert_eq!(strategy.target_positions, vec!["Senior Go Developer"]);
        assert_eq!(strategy.timeline, r#"{"months":3}"#);
    }

    #[tokio::test]
    async fn test_unusable_model_output_degrades_to_defaults() {
        let llm = Arc::new(ScriptedModel::replying(&["no idea", "{\"objectives\": []}"]));
        let agent = StrategyAgent::new(llm);

        let result = agent
            .invoke(input("Senior backend engineer").with_input("user_id", json!("u7")))
            .await;
        assert_eq!(result.status, AgentStatus::Degraded);
        assert!(result.message.unwrap().contains("strategy"));

        let profile: UserProfile =
            serde_json::from_value(result.fragment[PROFILE].clone()).unwrap();
        assert_eq!(profile.user_id, "u7");
        assert_eq!(profile.seniority, Seniority::Senior);

        let strategy: Strategy =
            serde_json::from_value(result.fragment[STRATEGY].clone()).unwrap();
        assert_eq!(strategy, Strategy::fallback("u7"));
    }

    #[tokio::test]
    async fn test_missing_or_short_resume_fails() {
        let agent = StrategyAgent::new(Arc::new(ScriptedModel::default()));

        let result = agent.invoke(AgentInput::new("s")).await;
        assert_eq!(result.status, AgentStatus::Failed);

        let result = agent.invoke(input("  Go dev  ")).await;
        assert_eq!(result.status, AgentStatus::Failed);
        assert!(result.fragment.is_empty());
    }

    #[test]
    fn test_guess_seniority() {
        assert_eq!(guess_seniority("Team Lead, 10 years"), Seniority::Lead);
        assert_eq!(guess_seniority("junior QA"), Seniority::Junior);
        assert_eq!(guess_seniority("5 years Go backend"), Seniority::Middle);
    }
}
