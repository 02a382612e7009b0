//! Durable domain entities
//!
//! Profiles, strategies, postings and applications are owned by the
//! long-term store. Agents exchange them through the session context as JSON,
//! so every type here round-trips through `serde_json::Value`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seniority {
    Junior,
    #[default]
    Middle,
    Senior,
    Lead,
}

impl Seniority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Junior => "junior",
            Self::Middle => "middle",
            Self::Senior => "senior",
            Self::Lead => "lead",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mobility {
    None,
    #[default]
    Local,
    Regional,
    National,
    International,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years_experience: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub resume_text: String,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub seniority: Seniority,
    #[serde(default)]
    pub mobility: Mobility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_expectations: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub career_objectives: Option<String>,
    #[serde(default)]
    pub preferred_industries: Vec<String>,
}

impl UserProfile {
    pub fn skill_names(&self) -> Vec<&str> {
        self.skills.iter().map(|s| s.name.as_str()).collect()
    }

    /// Text used to embed the profile for similarity search
    pub fn embedding_text(&self) -> String {
        let mut text = self.skill_names().join(" ");
        if let Some(objectives) = &self.career_objectives {
            text.push(' ');
            text.push_str(objectives);
        }
        text.push(' ');
        text.push_str(self.seniority.as_str());
        text
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub strategy_id: String,
    pub user_id: String,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub target_positions: Vec<String>,
    #[serde(default)]
    pub target_companies: Vec<String>,
    #[serde(default)]
    pub priority_skills: Vec<String>,
    #[serde(default)]
    pub timeline: String,
}

impl Strategy {
    pub fn id_for(user_id: &str) -> String {
        format!("strategy_{}", user_id)
    }

    /// Strategy used when the model cannot produce one
    pub fn fallback(user_id: &str) -> Self {
        Self {
            strategy_id: Self::id_for(user_id),
            user_id: user_id.to_string(),
            objectives: vec!["Find suitable position".to_string()],
            target_positions: vec!["Software Developer".to_string()],
            target_companies: Vec::new(),
            priority_skills: Vec::new(),
            timeline: "3-6 months".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub job_id: String,
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub skills_required: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary_max: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seniority_level: Option<Seniority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
}

fn default_source() -> String {
    "hh.ru".to_string()
}

impl JobPosting {
    /// Text used to embed the posting for similarity search
    pub fn embedding_text(&self) -> String {
        let mut text = format!(
            "{} {} {}",
            self.title,
            self.description,
            self.skills_required.join(" ")
        );
        truncate_at_boundary(&mut text, 5000);
        text
    }
}

/// Truncates to at most `max_bytes` without splitting a UTF-8 sequence
pub fn truncate_at_boundary(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMatch {
    pub job: JobPosting,
    pub relevance_score: f32,
    #[serde(default)]
    pub match_reasons: Vec<String>,
    #[serde(default)]
    pub gaps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    Draft,
    Submitted,
    Viewed,
    Interview,
    Rejected,
    Accepted,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Viewed => "viewed",
            Self::Interview => "interview",
            Self::Rejected => "rejected",
            Self::Accepted => "accepted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            "viewed" => Some(Self::Viewed),
            "interview" => Some(Self::Interview),
            "rejected" => Some(Self::Rejected),
            "accepted" => Some(Self::Accepted),
            _ => None,
        }
    }

    /// The employer has at least opened the application
    pub fn was_viewed(&self) -> bool {
        matches!(self, Self::Viewed | Self::Interview | Self::Accepted)
    }

    pub fn reached_interview(&self) -> bool {
        matches!(self, Self::Interview | Self::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub application_id: String,
    pub user_id: String,
    pub job_id: String,
    #[serde(default)]
    pub status: ApplicationStatus,
    pub cover_letter: String,
    pub adapted_resume: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// First time the status became `viewed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewed_at: Option<DateTime<Utc>>,
    /// First time the status became `interview`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview_at: Option<DateTime<Utc>>,
}

impl Application {
    pub fn id_for(user_id: &str, job_id: &str) -> String {
        format!("app_{}_{}", user_id, job_id)
    }

    pub fn draft(
        user_id: &str,
        job_id: &str,
        cover_letter: String,
        adapted_resume: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            application_id: Self::id_for(user_id, job_id),
            user_id: user_id.to_string(),
            job_id: job_id.to_string(),
            status: ApplicationStatus::Draft,
            cover_letter,
            adapted_resume,
            created_at: now,
            updated_at: now,
            viewed_at: None,
            interview_at: None,
        }
    }
}

/// Outcome counts and conversion rates of a user's recent applications
///
/// Rates are percentages of `total_applications`, zero when there are none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationMetrics {
    pub user_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_applications: u64,
    pub applications_viewed: u64,
    pub interviews_scheduled: u64,
    pub offers_received: u64,
    /// Mean relevance of the applied-to postings that carry a score
    pub average_relevance_score: f64,
    pub click_through_rate: f64,
    pub interview_rate: f64,
    pub offer_rate: f64,
}

impl ApplicationMetrics {
    #[allow(clippy::too_many_arguments)]
    pub fn from_counts(
        user_id: &str,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        total: u64,
        viewed: u64,
        interviews: u64,
        offers: u64,
        average_relevance_score: f64,
    ) -> Self {
        let rate = |part: u64| {
            if total == 0 {
                0.0
            } else {
                part as f64 / total as f64 * 100.0
            }
        };
        Self {
            user_id: user_id.to_string(),
            period_start,
            period_end,
            total_applications: total,
            applications_viewed: viewed,
            interviews_scheduled: interviews,
            offers_received: offers,
            average_relevance_score,
            click_through_rate: rate(viewed),
            interview_rate: rate(interviews),
            offer_rate: rate(offers),
        }
    }
}

/// What an embedding vector describes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EmbeddingRef {
    JobPosting(String),
    Profile(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub reference: EmbeddingRef,
    pub vector: Vec<f32>,
}
