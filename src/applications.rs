// src/applications.rs
//! Job applications and their hiring pipeline

use crate::accounts::User;
use crate::analytics::{
    AnalyticsService, EVENT_APPLICATION_SUBMITTED, EVENT_HIRED, EVENT_INTERVIEW_SCHEDULED,
};
use crate::error::{ServiceError, ServiceResult};
use crate::jobs::JobRepository;
use crate::resumes::ResumeRepository;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

const APPLICATION_COLUMNS: &str = "id, job_id, user_id, resume_id, status, applied_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    Interviewing,
    Offered,
    Hired,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Hired | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }

    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        matches!(
            (self, next),
            (Applied, Interviewing | Rejected | Withdrawn)
                | (Interviewing, Offered | Rejected | Withdrawn)
                | (Offered, Hired | Rejected | Withdrawn)
        )
    }

    /// Event recorded for the applicant when an application enters this status
    fn milestone_event(self) -> Option<&'static str> {
        match self {
            ApplicationStatus::Interviewing => Some(EVENT_INTERVIEW_SCHEDULED),
            ApplicationStatus::Hired => Some(EVENT_HIRED),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Application {
    pub id: Uuid,
    pub job_id: Uuid,
    pub user_id: i64,
    pub resume_id: Option<Uuid>,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct ApplicationRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ApplicationRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert unless the user already applied; returns false on a duplicate
    pub async fn insert(&self, application: &Application) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO applications (id, job_id, user_id, resume_id, status, applied_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (job_id, user_id) DO NOTHING
            "#,
        )
        .bind(application.id)
        .bind(application.job_id)
        .bind(application.user_id)
        .bind(application.resume_id)
        .bind(application.status)
        .bind(application.applied_at)
        .bind(application.updated_at)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(application)
    }

    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<Application>> {
        let applications = sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE user_id = ? ORDER BY applied_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(applications)
    }

    pub async fn list_by_job(&self, job_id: Uuid) -> Result<Vec<Application>> {
        let applications = sqlx::query_as::<_, Application>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE job_id = ? ORDER BY applied_at"
        ))
        .bind(job_id)
        .fetch_all(self.pool)
        .await?;
        Ok(applications)
    }

    /// Move an application to `status` only if it is still in `from`; returns false when
    /// another writer changed it first
    pub async fn set_status(
        &self,
        id: Uuid,
        from: ApplicationStatus,
        status: ApplicationStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE applications SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(status)
        .bind(at)
        .bind(id)
        .bind(from)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct ApplicationService<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ApplicationService<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    fn repo(&self) -> ApplicationRepository<'a> {
        ApplicationRepository::new(self.pool)
    }

    pub async fn apply(
        &self,
        user: &User,
        job_id: Uuid,
        resume_id: Option<Uuid>,
    ) -> ServiceResult<Application> {
        let job = JobRepository::new(self.pool)
            .find(job_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Job {}", job_id)))?;
        if !job.is_open() {
            return Err(ServiceError::validation("Job is no longer accepting applications"));
        }

        if let Some(resume_id) = resume_id {
            ResumeRepository::new(self.pool)
                .find(resume_id)
                .await?
                .filter(|resume| resume.user_id == user.id)
                .ok_or_else(|| ServiceError::not_found(format!("Resume {}", resume_id)))?;
        }

        let now = Utc::now();
        let application = Application {
            id: Uuid::new_v4(),
            job_id,
            user_id: user.id,
            resume_id,
            status: ApplicationStatus::Applied,
            applied_at: now,
            updated_at: now,
        };

        if !self.repo().insert(&application).await? {
            return Err(ServiceError::conflict("You have already applied to this job"));
        }

        AnalyticsService::new(self.pool)
            .track(
                user.tenant_id,
                user.id,
                EVENT_APPLICATION_SUBMITTED,
                serde_json::json!({"job_id": job_id, "application_id": application.id}),
            )
            .await?;

        info!("User {} applied to job {}", user.id, job_id);
        Ok(application)
    }

    pub async fn list_for_user(&self, user: &User) -> ServiceResult<Vec<Application>> {
        Ok(self.repo().list_by_user(user.id).await?)
    }

    /// Applications to a job, visible to admins of the posting tenant
    pub async fn list_for_job(&self, actor: &User, job_id: Uuid) -> ServiceResult<Vec<Application>> {
        self.require_job_admin(actor, job_id).await?;
        Ok(self.repo().list_by_job(job_id).await?)
    }

    pub async fn update_status(
        &self,
        actor: &User,
        application_id: Uuid,
        status: ApplicationStatus,
    ) -> ServiceResult<Application> {
        let mut application = self
            .repo()
            .find(application_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Application {}", application_id)))?;
        self.require_job_admin(actor, application.job_id).await?;

        if application.status.is_terminal() {
            return Err(ServiceError::validation(format!(
                "Application is already {:?}",
                application.status
            )));
        }
        if !application.status.can_transition_to(status) {
            return Err(ServiceError::validation(format!(
                "Cannot move application from {:?} to {:?}",
                application.status, status
            )));
        }

        let now = Utc::now();
        let moved = self
            .repo()
            .set_status(application.id, application.status, status, now)
            .await?;
        if !moved {
            return Err(ServiceError::conflict(
                "Application status was changed concurrently, reload and retry",
            ));
        }
        application.status = status;
        application.updated_at = now;

        if let Some(event) = status.milestone_event() {
            let applicant_tenant = crate::accounts::UserRepository::new(self.pool)
                .find_by_id(application.user_id)
                .await?
                .map(|applicant| applicant.tenant_id)
                .unwrap_or(actor.tenant_id);
            AnalyticsService::new(self.pool)
                .track(
                    applicant_tenant,
                    application.user_id,
                    event,
                    serde_json::json!({"job_id": application.job_id, "application_id": application.id}),
                )
                .await?;
        }

        info!(
            "{} moved application {} to {:?}",
            actor.email, application.id, status
        );
        Ok(application)
    }

    async fn require_job_admin(&self, actor: &User, job_id: Uuid) -> ServiceResult<()> {
        if !actor.role.can_manage_jobs() {
            return Err(ServiceError::forbidden("Admin role required to manage applications"));
        }
        let job = JobRepository::new(self.pool)
            .find(job_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Job {}", job_id)))?;
        if job.tenant_id != actor.tenant_id {
            return Err(ServiceError::forbidden("Job belongs to another tenant"));
        }
        Ok(())
    }
}
