/// Long-term store contract
///
/// The orchestrator copies anything meant to outlive a session through this
/// trait. Session stores are working sets; this store is authoritative.
use super::{ApplicationRepository, JobRepository, ProfileRepository};
use anyhow::Result;
use async_trait::async_trait;
use careerflow_sdk::models::{Application, Embedding, EmbeddingRef, JobPosting, Strategy, UserProfile};
use sqlx::SqlitePool;

#[async_trait]
pub trait LongTermStore: Send + Sync {
    async fn save_profile(&self, profile: &UserProfile) -> Result<()>;

    async fn save_strategy(&self, strategy: &Strategy) -> Result<()>;

    /// Save a posting and, when given, its embedding
    async fn save_job_posting(
        &self,
        posting: &JobPosting,
        relevance_score: Option<f32>,
        embedding: Option<&[f32]>,
    ) -> Result<()>;

    async fn save_application(&self, application: &Application) -> Result<()>;

    async fn save_embedding(&self, embedding: &Embedding) -> Result<()>;

    async fn applications_for_user(&self, user_id: &str) -> Result<Vec<Application>>;

    /// Nearest postings to `embedding`, most similar first
    async fn find_similar_jobs(&self, embedding: &[f32], k: usize) -> Result<Vec<JobPosting>>;
}

/// SQLite-backed long-term store
#[derive(Clone)]
pub struct SqliteLongTermStore {
    pool: SqlitePool,
}

impl SqliteLongTermStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn profiles(&self) -> ProfileRepository {
        ProfileRepository::new(self.pool.clone())
    }

    fn jobs(&self) -> JobRepository {
        JobRepository::new(self.pool.clone())
    }

    fn applications(&self) -> ApplicationRepository {
        ApplicationRepository::new(self.pool.clone())
    }
}

#[async_trait]
impl LongTermStore for SqliteLongTermStore {
    async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        self.profiles().save_profile(profile).await
    }

    async fn save_strategy(&self, strategy: &Strategy) -> Result<()> {
        self.profiles().save_strategy(strategy).await
    }

    async fn save_job_posting(
        &self,
        posting: &JobPosting,
        relevance_score: Option<f32>,
        embedding: Option<&[f32]>,
    ) -> Result<()> {
        let jobs = self.jobs();
        jobs.save_posting(posting, relevance_score).await?;
        if let Some(vector) = embedding.filter(|v| !v.is_empty()) {
            jobs.save_embedding(&EmbeddingRef::JobPosting(posting.job_id.clone()), vector)
                .await?;
        }
        Ok(())
    }

    async fn save_application(&self, application: &Application) -> Result<()> {
        self.applications().save(application).await
    }

    async fn save_embedding(&self, embedding: &Embedding) -> Result<()> {
        self.jobs()
            .save_embedding(&embedding.reference, &embedding.vector)
            .await
    }

    async fn applications_for_user(&self, user_id: &str) -> Result<Vec<Application>> {
        self.applications().list_for_user(user_id).await
    }

    async fn find_similar_jobs(&self, embedding: &[f32], k: usize) -> Result<Vec<JobPosting>> {
        self.jobs().find_similar(embedding, k).await
    }
}
