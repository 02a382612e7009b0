/// Job posting and embedding persistence
///
/// Embeddings are stored as JSON arrays. Similarity search loads the
/// candidate vectors of matching dimension and ranks them by cosine
/// similarity in process, which is fine for the few thousand postings a
/// single user accumulates.
use super::now_millis;
use anyhow::{Context, Result};
use careerflow_sdk::models::{EmbeddingRef, JobPosting};
use sqlx::{Row, SqlitePool};
use std::cmp::Ordering;

pub struct JobRepository {
    pool: SqlitePool,
}

fn ref_parts(reference: &EmbeddingRef) -> (&'static str, &str) {
    match reference {
        EmbeddingRef::JobPosting(id) => ("job_posting", id.as_str()),
        EmbeddingRef::Profile(id) => ("profile", id.as_str()),
    }
}

impl JobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a posting
    pub async fn save_posting(
        &self,
        posting: &JobPosting,
        relevance_score: Option<f32>,
    ) -> Result<()> {
        let now = now_millis();
        let data = serde_json::to_string(posting).context("Failed to serialize job posting")?;

        sqlx::query(
            "INSERT INTO job_postings (job_id, title, company, source, relevance_score, data, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(job_id) DO UPDATE SET
                title = excluded.title,
                company = excluded.company,
                source = excluded.source,
                relevance_score = COALESCE(excluded.relevance_score, job_postings.relevance_score),
                data = excluded.data,
                updated_at = excluded.updated_at",
        )
        .bind(&posting.job_id)
        .bind(&posting.title)
        .bind(&posting.company)
        .bind(&posting.source)
        .bind(relevance_score)
        .bind(data)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to save job posting")?;

        Ok(())
    }

    pub async fn get_posting(&self, job_id: &str) -> Result<Option<JobPosting>> {
        let data: Option<String> =
            sqlx::query_scalar("SELECT data FROM job_postings WHERE job_id = ?")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to load job posting")?;

        data.map(|d| serde_json::from_str(&d).context("Corrupt job posting record"))
            .transpose()
    }

    /// Insert or replace the embedding for a posting or profile
    pub async fn save_embedding(&self, reference: &EmbeddingRef, vector: &[f32]) -> Result<()> {
        if vector.is_empty() {
            anyhow::bail!("Refusing to store an empty embedding");
        }
        let (kind, id) = ref_parts(reference);
        let encoded = serde_json::to_string(vector).context("Failed to serialize embedding")?;

        sqlx::query(
            "INSERT INTO embeddings (ref_kind, ref_id, dimensions, vector, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(ref_kind, ref_id) DO UPDATE SET
                dimensions = excluded.dimensions,
                vector = excluded.vector,
                updated_at = excluded.updated_at",
        )
        .bind(kind)
        .bind(id)
        .bind(vector.len() as i64)
        .bind(encoded)
        .bind(now_millis())
        .execute(&self.pool)
        .await
        .context("Failed to save embedding")?;

        Ok(())
    }

    /// Postings nearest to `embedding`, most similar first
    pub async fn find_similar(&self, embedding: &[f32], k: usize) -> Result<Vec<JobPosting>> {
        if embedding.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT e.vector, p.data
             FROM embeddings e
             JOIN job_postings p ON p.job_id = e.ref_id
             WHERE e.ref_kind = 'job_posting' AND e.dimensions = ?",
        )
        .bind(embedding.len() as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load job embeddings")?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let vector: Vec<f32> = serde_json::from_str(row.get::<&str, _>("vector"))
                .context("Corrupt embedding record")?;
            let posting: JobPosting = serde_json::from_str(row.get::<&str, _>("data"))
                .context("Corrupt job posting record")?;
            scored.push((cosine_similarity(embedding, &vector), posting));
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        Ok(scored.into_iter().take(k).map(|(_, p)| p).collect())
    }
}

/// Cosine similarity of two vectors; 0.0 when either has zero norm or the
/// lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn posting(job_id: &str, title: &str) -> JobPosting {
        serde_json::from_value(serde_json::json!({
            "job_id": job_id,
            "title": title,
            "company": "Acme"
        }))
        .unwrap()
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_find_similar_orders_by_similarity() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        let repo = db.jobs();

        for (id, vector) in [
            ("far", vec![0.0, 1.0, 0.0]),
            ("near", vec![0.9, 0.1, 0.0]),
            ("exact", vec![1.0, 0.0, 0.0]),
        ] {
            repo.save_posting(&posting(id, id), Some(0.5)).await.unwrap();
            repo.save_embedding(&EmbeddingRef::JobPosting(id.into()), &vector)
                .await
                .unwrap();
        }
        // Different dimension is never compared
        repo.save_posting(&posting("odd", "odd"), None).await.unwrap();
        repo.save_embedding(&EmbeddingRef::JobPosting("odd".into()), &[1.0, 0.0])
            .await
            .unwrap();

        let found = repo.find_similar(&[1.0, 0.0, 0.0], 2).await.unwrap();
        let ids: Vec<_> = found.iter().map(|p| p.job_id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near"]);
    }

    #[tokio::test]
    async fn test_save_posting_keeps_previous_score_when_absent() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        let repo = db.jobs();

        repo.save_posting(&posting("1", "Go Developer"), Some(0.8))
            .await
            .unwrap();
        repo.save_posting(&posting("1", "Senior Go Developer"), None)
            .await
            .unwrap();

        let score: Option<f64> =
            sqlx::query_scalar("SELECT relevance_score FROM job_postings WHERE job_id = '1'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert!((score.unwrap() - 0.8).abs() < 1e-6);
        let loaded = repo.get_posting("1").await.unwrap().unwrap();
        assert_eq!(loaded.title, "Senior Go Developer");
    }

    proptest! {
        #[test]
        fn prop_cosine_similarity_is_bounded(
            a in proptest::collection::vec(-100.0f32..100.0, 1..16),
            b in proptest::collection::vec(-100.0f32..100.0, 1..16),
        ) {
            let s = cosine_similarity(&a, &b);
            prop_assert!((-1.0001..=1.0001).contains(&s));
        }
    }
}
