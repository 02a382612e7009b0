/// Application persistence
///
/// Applications are keyed by `app_{user_id}_{job_id}`, so regenerating an
/// application for the same job replaces the previous draft while keeping its
/// original creation time. The first move to `viewed` and to `interview` is
/// timestamped for outcome metrics.
use anyhow::{Context, Result};
use careerflow_sdk::models::{Application, ApplicationMetrics, ApplicationStatus};
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::{Row, SqlitePool};

pub struct ApplicationRepository {
    pool: SqlitePool,
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

impl ApplicationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, application: &Application) -> Result<()> {
        sqlx::query(
            "INSERT INTO applications
                (application_id, user_id, job_id, status, cover_letter, adapted_resume, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(application_id) DO UPDATE SET
                status = excluded.status,
                cover_letter = excluded.cover_letter,
                adapted_resume = excluded.adapted_resume,
                updated_at = excluded.updated_at",
        )
        .bind(&application.application_id)
        .bind(&application.user_id)
        .bind(&application.job_id)
        .bind(application.status.as_str())
        .bind(&application.cover_letter)
        .bind(&application.adapted_resume)
        .bind(application.created_at.timestamp_millis())
        .bind(application.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .context("Failed to save application")?;

        Ok(())
    }

    /// Applications for a user, most recently updated first
    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<Application>> {
        let rows = sqlx::query(
            "SELECT application_id, user_id, job_id, status, cover_letter, adapted_resume,
                    created_at, updated_at, viewed_at, interview_at
             FROM applications WHERE user_id = ? ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list applications")?;

        rows.into_iter()
            .map(|row| -> Result<Application> {
                let status: String = row.get("status");
                Ok(Application {
                    application_id: row.get("application_id"),
                    user_id: row.get("user_id"),
                    job_id: row.get("job_id"),
                    status: ApplicationStatus::parse(&status)
                        .with_context(|| format!("Unknown application status '{}'", status))?,
                    cover_letter: row.get("cover_letter"),
                    adapted_resume: row.get("adapted_resume"),
                    created_at: from_millis(row.get("created_at")),
                    updated_at: from_millis(row.get("updated_at")),
                    viewed_at: row.get::<Option<i64>, _>("viewed_at").map(from_millis),
                    interview_at: row.get::<Option<i64>, _>("interview_at").map(from_millis),
                })
            })
            .collect()
    }

    /// Move an application to `status`; false if it does not exist
    pub async fn update_status(
        &self,
        application_id: &str,
        status: ApplicationStatus,
    ) -> Result<bool> {
        let now = Utc::now().timestamp_millis();
        let result = sqlx::query(
            "UPDATE applications SET
                status = ?,
                updated_at = ?,
                viewed_at = CASE WHEN ? THEN COALESCE(viewed_at, ?) ELSE viewed_at END,
                interview_at = CASE WHEN ? THEN COALESCE(interview_at, ?) ELSE interview_at END
             WHERE application_id = ?",
        )
        .bind(status.as_str())
        .bind(now)
        .bind(status == ApplicationStatus::Viewed)
        .bind(now)
        .bind(status == ApplicationStatus::Interview)
        .bind(now)
        .bind(application_id)
        .execute(&self.pool)
        .await
        .context("Failed to update application status")?;

        Ok(result.rows_affected() > 0)
    }

    /// Outcome metrics over applications created in the last `days` days
    pub async fn metrics(&self, user_id: &str, days: u32) -> Result<ApplicationMetrics> {
        let period_end = Utc::now();
        let period_start = period_end - Duration::days(i64::from(days));

        let rows = sqlx::query(
            "SELECT a.status, j.relevance_score
             FROM applications a
             LEFT JOIN job_postings j ON j.job_id = a.job_id
             WHERE a.user_id = ? AND a.created_at >= ?",
        )
        .bind(user_id)
        .bind(period_start.timestamp_millis())
        .fetch_all(&self.pool)
        .await
        .context("Failed to load applications for metrics")?;

        let (mut viewed, mut interviews, mut offers) = (0u64, 0u64, 0u64);
        let mut scores = Vec::new();
        for row in &rows {
            let raw: String = row.get("status");
            let status = ApplicationStatus::parse(&raw)
                .with_context(|| format!("Unknown application status '{}'", raw))?;
            viewed += u64::from(status.was_viewed());
            interviews += u64::from(status.reached_interview());
            offers += u64::from(status == ApplicationStatus::Accepted);

            // Unscored and zero-scored postings do not count towards relevance
            let score: Option<f64> = row.get("relevance_score");
            if let Some(score) = score.filter(|s| *s > 0.0) {
                scores.push(score);
            }
        }
        let average_relevance = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        Ok(ApplicationMetrics::from_counts(
            user_id,
            period_start,
            period_end,
            rows.len() as u64,
            viewed,
            interviews,
            offers,
            average_relevance,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LongTermStore};
    use careerflow_sdk::models::JobPosting;
    use tempfile::TempDir;

    fn posting(id: &str) -> JobPosting {
        serde_json::from_value(serde_json::json!({"job_id": id, "title": "Go", "company": "Acme"}))
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_list_applications() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        let repo = db.applications();

        repo.save(&Application::draft("u1", "10", "letter".into(), "resume".into()))
            .await
            .unwrap();
        repo.save(&Application::draft("u1", "11", "letter".into(), "resume".into()))
            .await
            .unwrap();
        repo.save(&Application::draft("u2", "10", "letter".into(), "resume".into()))
            .await
            .unwrap();

        let apps = repo.list_for_user("u1").await.unwrap();
        assert_eq!(apps.len(), 2);
        assert!(apps.iter().all(|a| a.user_id == "u1"));
        assert!(apps.iter().all(|a| a.status == ApplicationStatus::Draft));
    }

    #[tokio::test]
    async fn test_regenerating_replaces_draft() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        let repo = db.applications();

        repo.save(&Application::draft("u1", "10", "first".into(), "r".into()))
            .await
            .unwrap();
        repo.save(&Application::draft("u1", "10", "second".into(), "r".into()))
            .await
            .unwrap();

        let apps = repo.list_for_user("u1").await.unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].cover_letter, "second");
    }

    #[tokio::test]
    async fn test_update_status() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        let repo = db.applications();

        repo.save(&Application::draft("u1", "10", "l".into(), "r".into()))
            .await
            .unwrap();
        assert!(repo
            .update_status("app_u1_10", ApplicationStatus::Submitted)
            .await
            .unwrap());
        assert!(!repo
            .update_status("app_u1_99", ApplicationStatus::Submitted)
            .await
            .unwrap());

        let apps = repo.list_for_user("u1").await.unwrap();
        assert_eq!(apps[0].status, ApplicationStatus::Submitted);
        assert!(apps[0].viewed_at.is_none());
    }

    #[tokio::test]
    async fn test_status_timestamps_are_set_once() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        let repo = db.applications();
        repo.save(&Application::draft("u1", "10", "l".into(), "r".into()))
            .await
            .unwrap();

        repo.update_status("app_u1_10", ApplicationStatus::Viewed)
            .await
            .unwrap();
        let first_view = repo.list_for_user("u1").await.unwrap()[0].viewed_at.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.update_status("app_u1_10", ApplicationStatus::Interview)
            .await
            .unwrap();
        repo.update_status("app_u1_10", ApplicationStatus::Viewed)
            .await
            .unwrap();

        let app = &repo.list_for_user("u1").await.unwrap()[0];
        assert_eq!(app.status, ApplicationStatus::Viewed);
        assert_eq!(app.viewed_at, Some(first_view));
        assert!(app.interview_at.unwrap() > first_view);

        // Regenerating the draft keeps the recorded outcome times
        repo.save(&Application::draft("u1", "10", "new".into(), "r".into()))
            .await
            .unwrap();
        assert_eq!(
            repo.list_for_user("u1").await.unwrap()[0].viewed_at,
            Some(first_view)
        );
    }

    #[tokio::test]
    async fn test_metrics_over_recent_applications() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        let repo = db.applications();
        let store = db.long_term();

        store.save_job_posting(&posting("1"), Some(0.9), None).await.unwrap();
        store.save_job_posting(&posting("2"), Some(0.5), None).await.unwrap();
        store.save_job_posting(&posting("3"), None, None).await.unwrap();

        for (job, status) in [
            ("1", ApplicationStatus::Accepted),
            ("2", ApplicationStatus::Viewed),
            ("3", ApplicationStatus::Submitted),
            ("4", ApplicationStatus::Rejected),
        ] {
            repo.save(&Application::draft("u1", job, "l".into(), "r".into()))
                .await
                .unwrap();
            repo.update_status(&Application::id_for("u1", job), status)
                .await
                .unwrap();
        }

        // Outside the window
        let mut old = Application::draft("u1", "5", "l".into(), "r".into());
        old.created_at = Utc::now() - Duration::days(45);
        old.status = ApplicationStatus::Accepted;
        repo.save(&old).await.unwrap();

        let metrics = repo.metrics("u1", 30).await.unwrap();
        assert_eq!(metrics.total_applications, 4);
        assert_eq!(metrics.applications_viewed, 2);
        assert_eq!(metrics.interviews_scheduled, 1);
        assert_eq!(metrics.offers_received, 1);
        assert_eq!(metrics.click_through_rate, 50.0);
        assert_eq!(metrics.interview_rate, 25.0);
        assert_eq!(metrics.offer_rate, 25.0);
        assert!((metrics.average_relevance_score - 0.7).abs() < 1e-6);

        assert_eq!(repo.metrics("u1", 60).await.unwrap().total_applications, 5);

        let nobody = repo.metrics("u2", 30).await.unwrap();
        assert_eq!(nobody.total_applications, 0);
        assert_eq!(nobody.click_through_rate, 0.0);
    }
}
