//! hh.ru job board client
//!
//! Searches `/vacancies`, then fetches each hit's full record from
//! `/vacancies/{id}` since the search listing omits key skills and the
//! description. The public API works without a token; one is sent when
//! configured.

use crate::config::JobSearchConfig;
use async_trait::async_trait;
use careerflow_sdk::agent::{JobQuery, JobSearch, ToolError};
use careerflow_sdk::models::{truncate_at_boundary, JobPosting, Seniority};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_DESCRIPTION_BYTES: usize = 2000;
const MAX_REQUIREMENT_BYTES: usize = 500;

/// Area codes for the most common city spellings
const CITY_AREAS: &[(&str, &str)] = &[
    ("москва", "1"),
    ("moscow", "1"),
    ("санкт-петербург", "2"),
    ("saint petersburg", "2"),
    ("спб", "2"),
    ("питер", "2"),
];

/// Map a free-form city name to an hh.ru area code
///
/// Numeric input is taken as an area code already. Unknown cities yield
/// `None` and the search runs without an area filter.
pub fn area_code(city: &str) -> Option<String> {
    let city = city.trim();
    if city.is_empty() {
        return None;
    }
    if city.chars().all(|c| c.is_ascii_digit()) {
        return Some(city.to_string());
    }

    let normalized = city.to_lowercase();
    let normalized = normalized
        .trim_start_matches("г. ")
        .trim_start_matches("город ")
        .trim();

    CITY_AREAS
        .iter()
        .find(|(name, _)| *name == normalized)
        .or_else(|| {
            CITY_AREAS
                .iter()
                .find(|(name, _)| normalized.contains(name) || name.contains(normalized))
        })
        .map(|(_, code)| code.to_string())
}

/// Map an hh.ru experience id to a seniority level
pub fn seniority_for_experience(id: &str) -> Option<Seniority> {
    match id {
        "noExperience" => Some(Seniority::Junior),
        "between1And3" => Some(Seniority::Middle),
        "between3And6" => Some(Seniority::Senior),
        "moreThan6" => Some(Seniority::Lead),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Named {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct IdRef {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Salary {
    from: Option<i64>,
    to: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct Snippet {
    requirement: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Vacancy {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    employer: Option<Named>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    snippet: Option<Snippet>,
    #[serde(default)]
    key_skills: Vec<Named>,
    #[serde(default)]
    area: Option<Named>,
    #[serde(default)]
    salary: Option<Salary>,
    #[serde(default)]
    experience: Option<IdRef>,
    #[serde(default)]
    alternate_url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

impl Vacancy {
    fn into_posting(self) -> JobPosting {
        let mut description = self
            .description
            .filter(|d| !d.is_empty())
            .or_else(|| self.snippet.and_then(|s| s.requirement))
            .unwrap_or_default();

        let requirements = if description.is_empty() {
            Vec::new()
        } else {
            let mut first = description.clone();
            truncate_at_boundary(&mut first, MAX_REQUIREMENT_BYTES);
            vec![first]
        };
        truncate_at_boundary(&mut description, MAX_DESCRIPTION_BYTES);

        // hh.ru uses "+0300" offsets, which RFC 3339 parsing rejects
        let posted_at = self.published_at.as_deref().and_then(|p| {
            DateTime::parse_from_str(p, "%Y-%m-%dT%H:%M:%S%z")
                .or_else(|_| DateTime::parse_from_rfc3339(p))
                .ok()
                .map(|d| d.with_timezone(&Utc))
        });

        let salary = self.salary.unwrap_or_default();

        JobPosting {
            job_id: self.id,
            title: self.name,
            company: self.employer.unwrap_or_default().name,
            description,
            requirements,
            skills_required: self.key_skills.into_iter().map(|s| s.name).collect(),
            location: self.area.map(|a| a.name).filter(|a| !a.is_empty()),
            salary_min: salary.from,
            salary_max: salary.to,
            seniority_level: self
                .experience
                .and_then(|e| seniority_for_experience(&e.id)),
            url: self.alternate_url.filter(|u| !u.is_empty()),
            source: "hh.ru".to_string(),
            posted_at,
        }
    }
}

/// [`JobSearch`] over the hh.ru REST API
pub struct HhJobSearch {
    base_url: String,
    user_agent: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HhJobSearch {
    pub fn new(config: &JobSearchConfig) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ToolError::RequestFailed(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            token: config.token(),
            client,
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header("User-Agent", &self.user_agent);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        request
    }

    async fn search_page(
        &self,
        params: &[(&str, String)],
    ) -> Result<Result<SearchPage, (u16, String)>, ToolError> {
        let response = self
            .get("/vacancies")
            .query(params)
            .send()
            .await
            .map_err(|e| ToolError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let page = response
                .json()
                .await
                .map_err(|e| ToolError::InvalidResponse(e.to_string()))?;
            return Ok(Ok(page));
        }

        let text = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => Err(ToolError::AuthenticationFailed(text)),
            429 => Err(ToolError::RateLimitExceeded),
            code => Ok(Err((code, text))),
        }
    }

    async fn vacancy(&self, id: &str) -> Option<JobPosting> {
        let response = match self.get(&format!("/vacancies/{}", id)).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!("Vacancy {} returned {}", id, r.status());
                return None;
            }
            Err(e) => {
                debug!("Vacancy {} request failed: {}", id, e);
                return None;
            }
        };

        match response.json::<Vacancy>().await {
            Ok(vacancy) => Some(vacancy.into_posting()),
            Err(e) => {
                warn!("Unreadable vacancy {}: {}", id, e);
                None
            }
        }
    }
}

#[async_trait]
impl JobSearch for HhJobSearch {
    fn name(&self) -> &str {
        "hh.ru"
    }

    async fn search(&self, query: &JobQuery) -> Result<Vec<JobPosting>, ToolError> {
        let mut params = vec![
            ("text", query.text.clone()),
            ("per_page", query.per_page.to_string()),
            ("page", "0".to_string()),
        ];
        if let Some(area) = query.area.as_deref().and_then(area_code) {
            params.push(("area", area));
        }
        if let Some(salary) = query.salary {
            params.push(("salary", salary.to_string()));
        }
        if let Some(experience) = &query.experience {
            params.push(("experience", experience.clone()));
        }

        let page = match self.search_page(&params).await? {
            Ok(page) => page,
            Err((400, text)) if text.to_lowercase().contains("area") => {
                info!("Retrying search without area filter");
                params.retain(|(k, _)| *k != "area");
                self.search_page(&params)
                    .await?
                    .map_err(|(code, text)| {
                        ToolError::RequestFailed(format!("hh.ru returned {}: {}", code, text))
                    })?
            }
            Err((code, text)) => {
                return Err(ToolError::RequestFailed(format!(
                    "hh.ru returned {}: {}",
                    code, text
                )))
            }
        };

        let mut postings = Vec::new();
        for item in page.items.into_iter().take(query.per_page) {
            if let Some(posting) = self.vacancy(&item.id).await {
                postings.push(posting);
            }
        }

        info!("Found {} jobs on hh.ru for '{}'", postings.len(), query.text);
        Ok(postings)
    }
}
