/// Profile and strategy persistence
///
/// Both entities are stored as JSON documents with a few columns pulled out
/// for lookups. Saves are upserts keyed by user id / strategy id.
use super::now_millis;
use anyhow::{Context, Result};
use careerflow_sdk::models::{Strategy, UserProfile};
use sqlx::SqlitePool;

pub struct ProfileRepository {
    pool: SqlitePool,
}

impl ProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a user's profile
    pub async fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        let now = now_millis();
        let data = serde_json::to_string(profile).context("Failed to serialize profile")?;

        sqlx::query(
            "INSERT INTO profiles (user_id, name, seniority, location, data, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                name = excluded.name,
                seniority = excluded.seniority,
                location = excluded.location,
                data = excluded.data,
                updated_at = excluded.updated_at",
        )
        .bind(&profile.user_id)
        .bind(&profile.name)
        .bind(profile.seniority.as_str())
        .bind(&profile.location)
        .bind(data)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to save profile")?;

        Ok(())
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let data: Option<String> = sqlx::query_scalar("SELECT data FROM profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load profile")?;

        data.map(|d| serde_json::from_str(&d).context("Corrupt profile record"))
            .transpose()
    }

    /// Insert or replace a strategy
    pub async fn save_strategy(&self, strategy: &Strategy) -> Result<()> {
        let data = serde_json::to_string(strategy).context("Failed to serialize strategy")?;

        sqlx::query(
            "INSERT INTO strategies (strategy_id, user_id, data, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(strategy_id) DO UPDATE SET
                user_id = excluded.user_id,
                data = excluded.data,
                updated_at = excluded.updated_at",
        )
        .bind(&strategy.strategy_id)
        .bind(&strategy.user_id)
        .bind(data)
        .bind(now_millis())
        .execute(&self.pool)
        .await
        .context("Failed to save strategy")?;

        Ok(())
    }

    pub async fn get_strategy(&self, user_id: &str) -> Result<Option<Strategy>> {
        let data: Option<String> = sqlx::query_scalar(
            "SELECT data FROM strategies WHERE user_id = ? ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load strategy")?;

        data.map(|d| serde_json::from_str(&d).context("Corrupt strategy record"))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use careerflow_sdk::models::{Seniority, Skill};
    use tempfile::TempDir;

    fn profile(user_id: &str) -> UserProfile {
        UserProfile {
            user_id: user_id.to_string(),
            name: Some("Anna".to_string()),
            email: None,
            resume_text: "5 years Go backend".to_string(),
            skills: vec![Skill {
                name: "Go".to_string(),
                level: Some("advanced".to_string()),
                years_experience: Some(5.0),
            }],
            seniority: Seniority::Senior,
            mobility: Default::default(),
            location: Some("Moscow".to_string()),
            salary_expectations: None,
            career_objectives: None,
            preferred_industries: vec![],
        }
    }

    #[tokio::test]
    async fn test_profile_upsert_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        let repo = db.profiles();

        repo.save_profile(&profile("u1")).await.unwrap();
        let mut updated = profile("u1");
        updated.seniority = Seniority::Lead;
        repo.save_profile(&updated).await.unwrap();

        let loaded = repo.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(loaded.seniority, Seniority::Lead);
        assert!(repo.get_profile("nobody").await.unwrap().is_none());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_strategy_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        let repo = db.profiles();

        repo.save_strategy(&Strategy::fallback("u1")).await.unwrap();
        let loaded = repo.get_strategy("u1").await.unwrap().unwrap();
        assert_eq!(loaded.strategy_id, "strategy_u1");
    }
}
