//! Content personalization (`personalize`)
//!
//! Drafts an application (cover letter plus adapted resume) for either the
//! job named in the task input or the best-scoring matches, up to the
//! stage fan-out.

use crate::router::{APPLICATIONS, JOB_MATCHES, PROFILE};
use async_trait::async_trait;
use careerflow_sdk::agent::{Agent, AgentInput, AgentResult, GenerateRequest, LanguageModel};
use careerflow_sdk::models::{truncate_at_boundary, Application, JobMatch, UserProfile};
use careerflow_sdk::types::{Capability, ContextMap};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_FAN_OUT: usize = 3;

const COVER_LETTER_SYSTEM: &str = "You are a career consultant. Write a persuasive, personalized \
cover letter (300-400 words) in the language of the job posting. Use the candidate's real \
name and contacts from the resume, never placeholders.";

const RESUME_SYSTEM: &str = "You are a resume writer. Adapt the candidate's resume to the job: \
reorder sections, highlight relevant experience and align wording with the posting. Keep the \
original structure and the language of the resume.";

fn format_skills(profile: &UserProfile) -> String {
    profile
        .skills
        .iter()
        .map(|s| match &s.level {
            Some(level) => format!("{} ({})", s.name, level),
            None => s.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn clipped(text: &str, max_bytes: usize) -> String {
    let mut text = text.to_string();
    truncate_at_boundary(&mut text, max_bytes);
    text
}

pub struct PersonalizationAgent {
    llm: Arc<dyn LanguageModel>,
}

impl PersonalizationAgent {
    pub const NAME: &'static str = "personalization_agent";

    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    async fn cover_letter(&self, profile: &UserProfile, target: &JobMatch) -> Result<String, String> {
        let job = &target.job;
        let prompt = format!(
            "Write a cover letter.\n\nCandidate resume: {}\nSkills: {}\nSeniority: {}\n\
             Objectives: {}\n\nPosition: {} at {}\nRequirements: {}\nDescription: {}",
            clipped(&profile.resume_text, 2000),
            format_skills(profile),
            profile.seniority.as_str(),
            profile.career_objectives.as_deref().unwrap_or("Career growth"),
            job.title,
            job.company,
            clipped(&job.requirements.join(", "), 500),
            clipped(&job.description, 500),
        );
        let request = GenerateRequest::new(prompt).with_system(COVER_LETTER_SYSTEM);
        self.llm.generate(&request).await.map_err(|e| e.to_string())
    }

    async fn adapted_resume(&self, profile: &UserProfile, target: &JobMatch) -> Result<String, String> {
        let job = &target.job;
        let prompt = format!(
            "Adapt this resume for the position.\n\nResume: {}\nPosition: {} at {}\n\
             Requirements: {}\nRequired skills: {}",
            clipped(&profile.resume_text, 2000),
            job.title,
            job.company,
            job.requirements.join(", "),
            job.skills_required.join(", "),
        );
        let request = GenerateRequest::new(prompt).with_system(RESUME_SYSTEM);
        self.llm.generate(&request).await.map_err(|e| e.to_string())
    }

    async fn draft(&self, profile: &UserProfile, target: &JobMatch) -> Result<Application, String> {
        let (letter, resume) = futures::join!(
            self.cover_letter(profile, target),
            self.adapted_resume(profile, target)
        );
        let letter = letter.map_err(|e| format!("cover letter: {}", e))?;
        let resume = resume.map_err(|e| format!("adapted resume: {}", e))?;
        if letter.trim().is_empty() || resume.trim().is_empty() {
            return Err("model returned empty content".to_string());
        }
        Ok(Application::draft(
            &profile.user_id,
            &target.job.job_id,
            letter,
            resume,
        ))
    }
}

#[async_trait]
impl Agent for PersonalizationAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn capability(&self) -> Capability {
        Capability::Personalize
    }

    async fn invoke(&self, input: AgentInput) -> AgentResult {
        let mut profile: UserProfile = match input.field(PROFILE) {
            Ok(p) => p,
            Err(e) => return AgentResult::failed(e.to_string()),
        };
        let mut job_matches: Vec<JobMatch> = match input.field(JOB_MATCHES) {
            Ok(m) => m,
            Err(e) => return AgentResult::failed(e.to_string()),
        };
        if profile.user_id.is_empty() {
            profile.user_id = input.user_id();
        }

        let targets: Vec<JobMatch> = match input.input_str("job_id") {
            Some(job_id) => match job_matches.iter().find(|m| m.job.job_id == job_id) {
                Some(m) => vec![m.clone()],
                None => return AgentResult::failed(format!("Job {} not found in matches", job_id)),
            },
            None => {
                job_matches.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
                job_matches.truncate(input.fan_out.unwrap_or(DEFAULT_FAN_OUT));
                job_matches
            }
        };
        if targets.is_empty() {
            return AgentResult::failed("no job matches to personalize");
        }

        let drafts = join_all(targets.iter().map(|t| self.draft(&profile, t))).await;

        let mut applications = Vec::new();
        let mut failures = Vec::new();
        for (target, draft) in targets.iter().zip(drafts) {
            match draft {
                Ok(app) => applications.push(app),
                Err(e) => {
                    warn!("No application for job {}: {}", target.job.job_id, e);
                    failures.push(json!({"job_id": target.job.job_id, "reason": e}));
                }
            }
        }

        if applications.is_empty() {
            return AgentResult::failed(format!(
                "no application could be generated ({} attempted)",
                targets.len()
            ));
        }

        let apps_value = match serde_json::to_value(&applications) {
            Ok(v) => v,
            Err(e) => return AgentResult::failed(format!("serialization: {}", e)),
        };
        let mut fragment = ContextMap::new();
        fragment.insert(APPLICATIONS.to_string(), apps_value);

        let payload = json!({
            "applications": applications.iter().map(|a| &a.application_id).collect::<Vec<_>>(),
            "failed": failures,
        });

        info!(
            "Drafted {} of {} applications for {}",
            applications.len(),
            targets.len(),
            profile.user_id
        );

        if failures.is_empty() {
            AgentResult::ok(fragment, payload)
        } else {
            AgentResult::degraded(
                fragment,
                payload,
                format!("{} of {} applications failed", failures.len(), targets.len()),
            )
        }
    }
}
