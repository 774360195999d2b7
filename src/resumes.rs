// src/resumes.rs
//! Candidate resumes owned by individual users

use crate::accounts::User;
use crate::analytics::{AnalyticsService, FunnelStage, EVENT_PROFILE_COMPLETE, EVENT_PROFILE_UPDATED};
use crate::core::TtlCache;
use crate::error::{ServiceError, ServiceResult};
use crate::utils::normalize_skills;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

pub const MAX_EXPERIENCE_YEARS: i64 = 70;

const RESUME_COLUMNS: &str =
    "id, user_id, title, summary, skills, experience_years, content, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Resume {
    pub id: Uuid,
    pub user_id: i64,
    pub title: String,
    pub summary: String,
    #[sqlx(json)]
    pub skills: Vec<String>,
    pub experience_years: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resume {
    /// Enough information for matching: a summary and at least one skill
    pub fn is_complete(&self) -> bool {
        !self.summary.trim().is_empty() && !self.skills.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResumeInput {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience_years: i64,
    #[serde(default)]
    pub content: String,
}

impl ResumeInput {
    pub fn validate(&self) -> ServiceResult<()> {
        if self.title.trim().is_empty() {
            return Err(ServiceError::validation("Resume title is required"));
        }
        if !(0..=MAX_EXPERIENCE_YEARS).contains(&self.experience_years) {
            return Err(ServiceError::validation(format!(
                "experience_years must be between 0 and {}",
                MAX_EXPERIENCE_YEARS
            )));
        }
        Ok(())
    }
}

pub struct ResumeRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ResumeRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, resume: &Resume) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO resumes (id, user_id, title, summary, skills, experience_years, content, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(resume.id)
        .bind(resume.user_id)
        .bind(&resume.title)
        .bind(&resume.summary)
        .bind(Json(&resume.skills))
        .bind(resume.experience_years)
        .bind(&resume.content)
        .bind(resume.created_at)
        .bind(resume.updated_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn update(&self, resume: &Resume) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE resumes
            SET title = ?, summary = ?, skills = ?, experience_years = ?, content = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&resume.title)
        .bind(&resume.summary)
        .bind(Json(&resume.skills))
        .bind(resume.experience_years)
        .bind(&resume.content)
        .bind(resume.updated_at)
        .bind(resume.id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Resume>> {
        let resume = sqlx::query_as::<_, Resume>(&format!(
            "SELECT {RESUME_COLUMNS} FROM resumes WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(resume)
    }

    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<Resume>> {
        let resumes = sqlx::query_as::<_, Resume>(&format!(
            "SELECT {RESUME_COLUMNS} FROM resumes WHERE user_id = ? ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(resumes)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM match_results WHERE resume_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE applications SET resume_id = NULL WHERE resume_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM resumes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct ResumeService<'a> {
    pool: &'a SqlitePool,
    cache: &'a TtlCache,
}

impl<'a> ResumeService<'a> {
    pub fn new(pool: &'a SqlitePool, cache: &'a TtlCache) -> Self {
        Self { pool, cache }
    }

    fn repo(&self) -> ResumeRepository<'a> {
        ResumeRepository::new(self.pool)
    }

    pub async fn create(&self, user: &User, input: ResumeInput) -> ServiceResult<Resume> {
        input.validate()?;
        let now = Utc::now();
        let resume = Resume {
            id: Uuid::new_v4(),
            user_id: user.id,
            title: input.title.trim().to_string(),
            summary: input.summary.trim().to_string(),
            skills: normalize_skills(&input.skills),
            experience_years: input.experience_years,
            content: input.content,
            created_at: now,
            updated_at: now,
        };

        self.repo().insert(&resume).await?;
        self.record_profile_activity(user, &resume).await?;

        info!("User {} created resume {}", user.id, resume.id);
        Ok(resume)
    }

    pub async fn update(&self, user: &User, id: Uuid, input: ResumeInput) -> ServiceResult<Resume> {
        input.validate()?;
        let mut resume = self.get(user, id).await?;
        resume.title = input.title.trim().to_string();
        resume.summary = input.summary.trim().to_string();
        resume.skills = normalize_skills(&input.skills);
        resume.experience_years = input.experience_years;
        resume.content = input.content;
        resume.updated_at = Utc::now();

        self.repo().update(&resume).await?;
        self.invalidate_matches(resume.id).await;
        self.record_profile_activity(user, &resume).await?;
        Ok(resume)
    }

    pub async fn list(&self, user: &User) -> ServiceResult<Vec<Resume>> {
        Ok(self.repo().list_by_user(user.id).await?)
    }

    /// A resume visible to `user`; other users' resumes look missing
    pub async fn get(&self, user: &User, id: Uuid) -> ServiceResult<Resume> {
        self.repo()
            .find(id)
            .await?
            .filter(|resume| resume.user_id == user.id)
            .ok_or_else(|| ServiceError::not_found(format!("Resume {}", id)))
    }

    pub async fn delete(&self, user: &User, id: Uuid) -> ServiceResult<()> {
        let resume = self.get(user, id).await?;
        self.repo().delete(resume.id).await?;
        self.invalidate_matches(resume.id).await;
        info!("User {} deleted resume {}", user.id, resume.id);
        Ok(())
    }

    async fn invalidate_matches(&self, id: Uuid) {
        self.cache
            .invalidate_matching("match:", &id.to_string())
            .await;
        self.cache
            .invalidate_matching("questions:", &id.to_string())
            .await;
    }

    async fn record_profile_activity(&self, user: &User, resume: &Resume) -> ServiceResult<()> {
        let analytics = AnalyticsService::new(self.pool);
        analytics
            .track(
                user.tenant_id,
                user.id,
                EVENT_PROFILE_UPDATED,
                serde_json::json!({"resume_id": resume.id}),
            )
            .await?;

        if resume.is_complete() {
            let stages = analytics.stages_for_user(user.id).await?;
            if !stages.iter().any(|(stage, _)| *stage == FunnelStage::ProfileComplete) {
                analytics
                    .track(
                        user.tenant_id,
                        user.id,
                        EVENT_PROFILE_COMPLETE,
                        serde_json::json!({"resume_id": resume.id}),
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::Role;
    use crate::test_support::*;

    fn input(summary: &str, skills: &[&str]) -> ResumeInput {
        ResumeInput {
            title: "My CV".to_string(),
            summary: summary.to_string(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            experience_years: 4,
            content: String::new(),
        }
    }

    #[tokio::test]
    async fn test_resumes_are_private_to_their_owner() {
        let (db, tenant_id) = db_with_tenant().await;
        let cache = TtlCache::new(10);
        let resumes = ResumeService::new(db.pool(), &cache);
        let alice = add_member(&db, tenant_id, "alice@acme.io", Role::Member).await;
        let bob = add_member(&db, tenant_id, "bob@acme.io", Role::Admin).await;

        let resume = resumes.create(&alice, input("", &["Rust"])).await.unwrap();
        assert_eq!(resume.skills, vec!["rust"]);
        assert_eq!(resumes.list(&alice).await.unwrap().len(), 1);

        let err = resumes.get(&bob, resume.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        let err = resumes.delete(&bob, resume.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        resumes.delete(&alice, resume.id).await.unwrap();
        assert!(resumes.list(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_profile_complete_recorded_once() {
        let (db, tenant_id) = db_with_tenant().await;
        let cache = TtlCache::new(10);
        let resumes = ResumeService::new(db.pool(), &cache);
        let user = add_member(&db, tenant_id, "c@acme.io", Role::Member).await;
        let analytics = AnalyticsService::new(db.pool());

        let draft = resumes.create(&user, input("", &[])).await.unwrap();
        assert!(analytics.stages_for_user(user.id).await.unwrap().is_empty());

        resumes
            .update(&user, draft.id, input("Backend developer", &["go"]))
            .await
            .unwrap();
        resumes
            .create(&user, input("Another", &["rust"]))
            .await
            .unwrap();

        let stages = analytics.stages_for_user(user.id).await.unwrap();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].0, FunnelStage::ProfileComplete);

        let events = analytics.recent_events(user.id, 10).await.unwrap();
        let completions = events
            .iter()
            .filter(|e| e.event_type == EVENT_PROFILE_COMPLETE)
            .count();
        assert_eq!(completions, 1);
        assert_eq!(
            events.iter().filter(|e| e.event_type == EVENT_PROFILE_UPDATED).count(),
            3
        );
    }

    #[test]
    fn test_validation() {
        let mut bad = input("x", &[]);
        bad.title = " ".to_string();
        assert!(bad.validate().is_err());

        let mut bad = input("x", &[]);
        bad.experience_years = -1;
        assert!(bad.validate().is_err());
    }
}
