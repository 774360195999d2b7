// src/jobs/search.rs
//! Query normalization, relevance scoring and pagination for job search

use super::repository::JobFilter;
use super::{EmploymentType, Job};
use crate::error::{ServiceError, ServiceResult};
use crate::utils::{normalize_skills, tokenize};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

const TITLE_WEIGHT: i64 = 3;
const SKILL_WEIGHT: i64 = 2;
const DESCRIPTION_WEIGHT: i64 = 1;
const COMPANY_WEIGHT: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Relevance,
    Newest,
    Salary,
}

impl std::str::FromStr for SortOrder {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relevance" => Ok(SortOrder::Relevance),
            "newest" | "date" => Ok(SortOrder::Newest),
            "salary" => Ok(SortOrder::Salary),
            other => Err(ServiceError::validation(format!(
                "Unknown sort order '{}': use relevance, newest or salary",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub location: Option<String>,
    pub remote: Option<bool>,
    pub employment_type: Option<EmploymentType>,
    pub min_salary: Option<i64>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub posted_since: Option<DateTime<Utc>>,
    pub sort: Option<SortOrder>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl SearchQuery {
    /// Canonical form: trimmed text, normalized skills, explicit paging and sort
    pub fn normalized(&self) -> ServiceResult<SearchQuery> {
        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(ServiceError::validation(format!(
                "per_page must be between 1 and {}",
                MAX_PER_PAGE
            )));
        }
        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(ServiceError::validation("page starts at 1"));
        }
        if self.min_salary.is_some_and(|s| s < 0) {
            return Err(ServiceError::validation("min_salary cannot be negative"));
        }

        let query = self
            .query
            .as_deref()
            .map(|q| tokenize(q).join(" "))
            .filter(|q| !q.is_empty());
        let sort = self.sort.unwrap_or(if query.is_some() {
            SortOrder::Relevance
        } else {
            SortOrder::Newest
        });

        Ok(SearchQuery {
            query,
            location: self
                .location
                .as_deref()
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty()),
            remote: self.remote,
            employment_type: self.employment_type,
            min_salary: self.min_salary,
            skills: normalize_skills(&self.skills),
            posted_since: self.posted_since,
            sort: Some(sort),
            page: Some(page),
            per_page: Some(per_page),
        })
    }

    pub fn terms(&self) -> Vec<String> {
        self.query.as_deref().map(tokenize).unwrap_or_default()
    }

    pub fn filter(&self) -> JobFilter {
        JobFilter {
            location: self.location.clone(),
            remote: self.remote,
            employment_type: self.employment_type,
            min_salary: self.min_salary,
            posted_since: self.posted_since,
        }
    }

    /// Cache key for a normalized query
    pub fn cache_key(&self) -> String {
        format!(
            "search:{}",
            serde_json::to_string(self).unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredJob {
    #[serde(flatten)]
    pub job: Job,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
    pub results: Vec<ScoredJob>,
}

/// Weighted occurrence count of every term across the job's fields
pub fn relevance(job: &Job, terms: &[String]) -> i64 {
    let title = job.title.to_lowercase();
    let description = job.description.to_lowercase();
    let company = job.company.to_lowercase();

    terms
        .iter()
        .map(|term| {
            let in_title = title.matches(term.as_str()).count() as i64;
            let in_description = description.matches(term.as_str()).count() as i64;
            let in_company = company.matches(term.as_str()).count() as i64;
            let in_skills = job
                .skills
                .iter()
                .filter(|skill| *skill == term || tokenize(skill).contains(term))
                .count() as i64;

            in_title * TITLE_WEIGHT
                + in_skills * SKILL_WEIGHT
                + in_description * DESCRIPTION_WEIGHT
                + in_company * COMPANY_WEIGHT
        })
        .sum()
}

fn has_required_skills(job: &Job, required: &[String]) -> bool {
    required.iter().all(|skill| job.skills.contains(skill))
}

fn salary_key(job: &Job) -> i64 {
    job.salary_max.or(job.salary_min).unwrap_or(-1)
}

/// Score, filter, sort and paginate candidate jobs for a normalized query
pub fn rank(candidates: Vec<Job>, query: &SearchQuery) -> SearchResults {
    let terms = query.terms();
    let sort = query.sort.unwrap_or(SortOrder::Newest);
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE);

    let mut scored: Vec<ScoredJob> = candidates
        .into_iter()
        .filter(|job| has_required_skills(job, &query.skills))
        .map(|job| {
            let score = relevance(&job, &terms);
            ScoredJob { job, score }
        })
        .filter(|scored| terms.is_empty() || scored.score > 0)
        .collect();

    scored.sort_by(|a, b| {
        let newest = b.job.posted_at.cmp(&a.job.posted_at);
        match sort {
            SortOrder::Relevance => b.score.cmp(&a.score).then(newest),
            SortOrder::Newest => newest,
            SortOrder::Salary => match salary_key(&b.job).cmp(&salary_key(&a.job)) {
                Ordering::Equal => newest,
                other => other,
            },
        }
    });

    let total = scored.len();
    let start = ((page - 1) as usize).saturating_mul(per_page as usize);
    let results = scored
        .into_iter()
        .skip(start)
        .take(per_page as usize)
        .collect();

    SearchResults {
        total,
        page,
        per_page,
        results,
    }
}
