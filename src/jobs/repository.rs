// src/jobs/repository.rs
use super::{Job, JobStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

const JOB_COLUMNS: &str = "id, tenant_id, title, company, location, description, employment_type, \
     remote, salary_min, salary_max, currency, skills, source, source_url, status, posted_at, updated_at";

/// Structured filters that can be pushed down to SQL
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub location: Option<String>,
    pub remote: Option<bool>,
    pub employment_type: Option<super::EmploymentType>,
    pub min_salary: Option<i64>,
    pub posted_since: Option<DateTime<Utc>>,
}

pub struct JobRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> JobRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, tenant_id, title, company, location, description, employment_type,
                              remote, salary_min, salary_max, currency, skills, source, source_url,
                              status, posted_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id)
        .bind(job.tenant_id)
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.description)
        .bind(job.employment_type)
        .bind(job.remote)
        .bind(job.salary_min)
        .bind(job.salary_max)
        .bind(&job.currency)
        .bind(Json(&job.skills))
        .bind(&job.source)
        .bind(&job.source_url)
        .bind(job.status)
        .bind(job.posted_at)
        .bind(job.updated_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Persist every mutable column of an existing job
    pub async fn update(&self, job: &Job) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                title = ?, company = ?, location = ?, description = ?, employment_type = ?,
                remote = ?, salary_min = ?, salary_max = ?, currency = ?, skills = ?,
                status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&job.title)
        .bind(&job.company)
        .bind(&job.location)
        .bind(&job.description)
        .bind(job.employment_type)
        .bind(job.remote)
        .bind(job.salary_min)
        .bind(job.salary_max)
        .bind(&job.currency)
        .bind(Json(&job.skills))
        .bind(job.status)
        .bind(job.updated_at)
        .bind(job.id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(job)
    }

    pub async fn find_by_source_url(&self, tenant_id: i64, url: &str) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE tenant_id = ? AND source_url = ?"
        ))
        .bind(tenant_id)
        .bind(url)
        .fetch_optional(self.pool)
        .await?;
        Ok(job)
    }

    pub async fn set_status(&self, id: Uuid, status: JobStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE jobs SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a job together with its applications and cached match results
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM applications WHERE job_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM match_results WHERE job_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Open jobs matching the structured filters, newest first
    pub async fn list_open(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {JOB_COLUMNS} FROM jobs WHERE status = "));
        builder.push_bind(JobStatus::Open);

        if let Some(location) = &filter.location {
            builder
                .push(" AND location LIKE ")
                .push_bind(format!("%{}%", escape_like(location)))
                .push(" ESCAPE '\\'");
        }
        if let Some(remote) = filter.remote {
            builder.push(" AND remote = ").push_bind(remote);
        }
        if let Some(employment_type) = filter.employment_type {
            builder.push(" AND employment_type = ").push_bind(employment_type);
        }
        if let Some(min_salary) = filter.min_salary {
            builder
                .push(" AND COALESCE(salary_max, salary_min) >= ")
                .push_bind(min_salary);
        }
        if let Some(since) = filter.posted_since {
            builder.push(" AND posted_at >= ").push_bind(since);
        }
        builder.push(" ORDER BY posted_at DESC");

        let jobs = builder.build_query_as::<Job>().fetch_all(self.pool).await?;
        Ok(jobs)
    }

    pub async fn list_by_tenant(&self, tenant_id: i64) -> Result<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE tenant_id = ? ORDER BY posted_at DESC"
        ))
        .bind(tenant_id)
        .fetch_all(self.pool)
        .await?;
        Ok(jobs)
    }
}

/// Escape LIKE wildcards so user input matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
