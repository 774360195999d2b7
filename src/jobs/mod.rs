// src/jobs/mod.rs
//! Job postings: ingestion, tenant-scoped maintenance and search

pub mod repository;
pub mod scraper;
pub mod search;
pub mod service;

pub use repository::JobRepository;
pub use search::{SearchQuery, SearchResults, ScoredJob, SortOrder};
pub use service::{IngestReport, JobService, RejectedJob};

use crate::error::{ServiceError, ServiceResult};
use crate::utils::normalize_skills;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EmploymentType {
    #[default]
    FullTime,
    PartTime,
    Contract,
    Internship,
    Temporary,
}

impl std::str::FromStr for EmploymentType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "full_time" | "fulltime" => Ok(EmploymentType::FullTime),
            "part_time" | "parttime" => Ok(EmploymentType::PartTime),
            "contract" => Ok(EmploymentType::Contract),
            "internship" => Ok(EmploymentType::Internship),
            "temporary" => Ok(EmploymentType::Temporary),
            other => Err(ServiceError::validation(format!(
                "Unknown employment type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub tenant_id: i64,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub employment_type: EmploymentType,
    pub remote: bool,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub currency: String,
    #[sqlx(json)]
    pub skills: Vec<String>,
    pub source: String,
    pub source_url: Option<String>,
    pub status: JobStatus,
    pub posted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Incoming posting, from the API, a bulk feed or a scraped page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewJob {
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub employment_type: EmploymentType,
    #[serde(default)]
    pub remote: bool,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub source: Option<String>,
    pub source_url: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobUpdate {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub employment_type: Option<EmploymentType>,
    pub remote: Option<bool>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub currency: Option<String>,
    pub skills: Option<Vec<String>>,
}

fn validate_fields(
    title: &str,
    company: &str,
    salary_min: Option<i64>,
    salary_max: Option<i64>,
) -> ServiceResult<()> {
    if title.trim().is_empty() {
        return Err(ServiceError::validation("Job title is required"));
    }
    if company.trim().is_empty() {
        return Err(ServiceError::validation("Company is required"));
    }
    if salary_min.is_some_and(|s| s < 0) || salary_max.is_some_and(|s| s < 0) {
        return Err(ServiceError::validation("Salaries cannot be negative"));
    }
    if let (Some(min), Some(max)) = (salary_min, salary_max) {
        if min > max {
            return Err(ServiceError::validation(
                "salary_min cannot be greater than salary_max",
            ));
        }
    }
    Ok(())
}

/// Upper-case ISO code; blank or missing falls back to the default currency
fn normalize_currency(currency: Option<&str>) -> String {
    currency
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
}

/// Source URLs are the upsert key, so they are stored trimmed
pub(crate) fn normalize_source_url(url: Option<&str>) -> Option<String> {
    url.map(str::trim).filter(|u| !u.is_empty()).map(str::to_string)
}

impl NewJob {
    pub fn validate(&self) -> ServiceResult<()> {
        validate_fields(&self.title, &self.company, self.salary_min, self.salary_max)
    }

    /// Materialize a validated posting for `tenant_id`
    pub fn into_job(self, tenant_id: i64) -> ServiceResult<Job> {
        self.validate()?;
        let now = Utc::now();
        Ok(Job {
            id: Uuid::new_v4(),
            tenant_id,
            title: self.title.trim().to_string(),
            company: self.company.trim().to_string(),
            location: self.location.trim().to_string(),
            description: self.description.trim().to_string(),
            employment_type: self.employment_type,
            remote: self.remote,
            salary_min: self.salary_min,
            salary_max: self.salary_max,
            currency: normalize_currency(self.currency.as_deref()),
            skills: normalize_skills(&self.skills),
            source: self.source.unwrap_or_else(|| "manual".to_string()),
            source_url: normalize_source_url(self.source_url.as_deref()),
            status: JobStatus::Open,
            posted_at: self.posted_at.unwrap_or(now),
            updated_at: now,
        })
    }
}

impl Job {
    /// Apply a partial update, re-validating the merged result
    pub fn apply(&mut self, update: JobUpdate) -> ServiceResult<()> {
        let mut next = self.clone();
        if let Some(title) = update.title {
            next.title = title.trim().to_string();
        }
        if let Some(company) = update.company {
            next.company = company.trim().to_string();
        }
        if let Some(location) = update.location {
            next.location = location.trim().to_string();
        }
        if let Some(description) = update.description {
            next.description = description.trim().to_string();
        }
        if let Some(employment_type) = update.employment_type {
            next.employment_type = employment_type;
        }
        if let Some(remote) = update.remote {
            next.remote = remote;
        }
        if update.salary_min.is_some() {
            next.salary_min = update.salary_min;
        }
        if update.salary_max.is_some() {
            next.salary_max = update.salary_max;
        }
        if let Some(currency) = update.currency {
            next.currency = normalize_currency(Some(&currency));
        }
        if let Some(skills) = update.skills {
            next.skills = normalize_skills(&skills);
        }

        validate_fields(&next.title, &next.company, next.salary_min, next.salary_max)?;
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.status == JobStatus::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting() -> NewJob {
        NewJob {
            title: " Rust Engineer ".to_string(),
            company: "Acme".to_string(),
            skills: vec!["Rust".to_string(), "rust".to_string(), " SQL".to_string()],
            salary_min: Some(100),
            salary_max: Some(200),
            ..Default::default()
        }
    }

    #[test]
    fn test_into_job_normalizes() {
        let job = posting().into_job(7).unwrap();
        assert_eq!(job.title, "Rust Engineer");
        assert_eq!(job.skills, vec!["rust", "sql"]);
        assert_eq!(job.currency, "USD");
        assert_eq!(job.source, "manual");
        assert_eq!(job.tenant_id, 7);
        assert!(job.is_open());
    }

    #[test]
    fn test_validation() {
        let mut bad = posting();
        bad.salary_min = Some(300);
        assert!(matches!(bad.validate(), Err(ServiceError::Validation(_))));

        let mut bad = posting();
        bad.title = "  ".to_string();
        assert!(bad.validate().is_err());

        let mut bad = posting();
        bad.salary_max = Some(-1);
        bad.salary_min = None;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_apply_update_revalidates() {
        let mut job = posting().into_job(1).unwrap();
        let err = job.apply(JobUpdate {
            salary_max: Some(50),
            ..Default::default()
        });
        assert!(err.is_err());
        assert_eq!(job.salary_max, Some(200));

        job.apply(JobUpdate {
            remote: Some(true),
            skills: Some(vec!["Go".to_string()]),
            ..Default::default()
        })
        .unwrap();
        assert!(job.remote);
        assert_eq!(job.skills, vec!["go"]);
    }

    #[test]
    fn test_blank_currency_and_url_are_normalized() {
        let mut new_job = posting();
        new_job.source_url = Some(" https://x.io/1 ".to_string());
        new_job.currency = Some(" eur ".to_string());
        let mut job = new_job.into_job(1).unwrap();
        assert_eq!(job.source_url.as_deref(), Some("https://x.io/1"));
        assert_eq!(job.currency, "EUR");

        job.apply(JobUpdate {
            currency: Some("  ".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(job.currency, DEFAULT_CURRENCY);
    }

    #[test]
    fn test_parse_employment_type() {
        assert_eq!("Full-Time".parse::<EmploymentType>().unwrap(), EmploymentType::FullTime);
        assert_eq!("part time".parse::<EmploymentType>().unwrap(), EmploymentType::PartTime);
        assert!("gig".parse::<EmploymentType>().is_err());
    }
}
