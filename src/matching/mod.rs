// src/matching/mod.rs
//! Resume/job matching, salary estimates and interview questions backed by the AI service

pub mod fallback;

use crate::accounts::User;
use crate::ai_client::{AiService, InterviewQuestion, MatchAnalysis, SalaryEstimate};
use crate::core::config_manager::CacheSettings;
use crate::core::TtlCache;
use crate::error::{ServiceError, ServiceResult};
use crate::jobs::repository::JobFilter;
use crate::jobs::{Job, JobRepository};
use crate::resumes::{Resume, ResumeService};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_QUESTION_COUNT: u32 = 5;
pub const MAX_QUESTION_COUNT: u32 = 20;
pub const DEFAULT_RECOMMENDATIONS: usize = 10;
pub const MAX_RECOMMENDATIONS: usize = 50;
/// AI scoring calls in flight at once while ranking recommendations
const SCORING_CONCURRENCY: usize = 8;
/// Whole-request budget for AI scoring; unfinished candidates use the local estimate
const SCORING_DEADLINE: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Ai,
    Fallback,
}

impl ResultSource {
    fn as_str(self) -> &'static str {
        match self {
            ResultSource::Ai => "ai",
            ResultSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub resume_id: Uuid,
    pub job_id: Uuid,
    #[serde(flatten)]
    pub analysis: MatchAnalysis,
    pub source: ResultSource,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub job: Job,
    pub score: f64,
    pub matched_skills: Vec<String>,
    pub source: ResultSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalaryPrediction {
    pub job_id: Uuid,
    #[serde(flatten)]
    pub estimate: SalaryEstimate,
    pub source: ResultSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSet {
    pub job_id: Uuid,
    pub resume_id: Option<Uuid>,
    pub questions: Vec<InterviewQuestion>,
    pub source: ResultSource,
}

pub fn match_key(resume_id: Uuid, job_id: Uuid) -> String {
    format!("match:{}:{}", resume_id, job_id)
}

pub fn salary_key(job_id: Uuid) -> String {
    format!("salary:{}", job_id)
}

pub fn questions_key(job_id: Uuid, resume_id: Option<Uuid>, count: u32) -> String {
    let resume = resume_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("questions:{}:{}:{}", job_id, resume, count)
}

pub struct MatchingService<'a> {
    pool: &'a SqlitePool,
    cache: &'a TtlCache,
    ai: &'a dyn AiService,
    ttl: &'a CacheSettings,
    scoring_deadline: Duration,
}

impl<'a> MatchingService<'a> {
    pub fn new(
        pool: &'a SqlitePool,
        cache: &'a TtlCache,
        ai: &'a dyn AiService,
        ttl: &'a CacheSettings,
    ) -> Self {
        Self {
            pool,
            cache,
            ai,
            ttl,
            scoring_deadline: SCORING_DEADLINE,
        }
    }

    pub fn with_scoring_deadline(mut self, deadline: Duration) -> Self {
        self.scoring_deadline = deadline;
        self
    }

    async fn own_resume(&self, user: &User, resume_id: Uuid) -> ServiceResult<Resume> {
        ResumeService::new(self.pool, self.cache)
            .get(user, resume_id)
            .await
    }

    async fn job(&self, job_id: Uuid) -> ServiceResult<Job> {
        JobRepository::new(self.pool)
            .find(job_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Job {}", job_id)))
    }

    pub async fn match_resume(
        &self,
        user: &User,
        resume_id: Uuid,
        job_id: Uuid,
    ) -> ServiceResult<MatchResult> {
        let resume = self.own_resume(user, resume_id).await?;
        let job = self.job(job_id).await?;
        self.score_pair(&resume, &job).await
    }

    /// Cached result, else the AI service, else the local skill-overlap estimate
    async fn score_pair(&self, resume: &Resume, job: &Job) -> ServiceResult<MatchResult> {
        let key = match_key(resume.id, job.id);
        if let Some(cached) = self.cache.get::<MatchResult>(&key).await {
            return Ok(cached);
        }

        match self.ai.match_resume(resume, job).await {
            Ok(analysis) => {
                let result = MatchResult {
                    resume_id: resume.id,
                    job_id: job.id,
                    analysis,
                    source: ResultSource::Ai,
                    computed_at: Utc::now(),
                };
                self.persist(&result).await?;
                self.cache
                    .set(&key, &result, Duration::from_secs(self.ttl.match_ttl_seconds))
                    .await;
                Ok(result)
            }
            Err(e) => {
                warn!(
                    "AI match failed for resume {} / job {}, using skill overlap: {:#}",
                    resume.id, job.id, e
                );
                Ok(Self::fallback_match(resume, job))
            }
        }
    }

    fn fallback_match(resume: &Resume, job: &Job) -> MatchResult {
        MatchResult {
            resume_id: resume.id,
            job_id: job.id,
            analysis: fallback::skill_overlap(resume, job),
            source: ResultSource::Fallback,
            computed_at: Utc::now(),
        }
    }

    async fn persist(&self, result: &MatchResult) -> ServiceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO match_results (resume_id, job_id, score, matched_skills, missing_skills, summary, source, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(result.resume_id)
        .bind(result.job_id)
        .bind(result.analysis.score)
        .bind(Json(&result.analysis.matched_skills))
        .bind(Json(&result.analysis.missing_skills))
        .bind(&result.analysis.summary)
        .bind(result.source.as_str())
        .bind(result.computed_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Number of AI results stored for a resume/job pair
    pub async fn stored_match_count(&self, resume_id: Uuid, job_id: Uuid) -> ServiceResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM match_results WHERE resume_id = ? AND job_id = ?",
        )
        .bind(resume_id)
        .bind(job_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Top open jobs for a resume; skill-sharing jobs first, newest jobs when none share skills
    pub async fn recommend_jobs(
        &self,
        user: &User,
        resume_id: Uuid,
        limit: Option<usize>,
    ) -> ServiceResult<Vec<Recommendation>> {
        let limit = limit.unwrap_or(DEFAULT_RECOMMENDATIONS);
        if !(1..=MAX_RECOMMENDATIONS).contains(&limit) {
            return Err(ServiceError::validation(format!(
                "limit must be between 1 and {}",
                MAX_RECOMMENDATIONS
            )));
        }

        let resume = self.own_resume(user, resume_id).await?;
        let open = JobRepository::new(self.pool)
            .list_open(&JobFilter::default())
            .await?;

        let skills: HashSet<&str> = resume.skills.iter().map(String::as_str).collect();
        let (sharing, others): (Vec<Job>, Vec<Job>) = open
            .into_iter()
            .partition(|job| job.skills.iter().any(|s| skills.contains(s.as_str())));

        let candidates: Vec<Job> = if sharing.is_empty() {
            others.into_iter().take(limit).collect()
        } else {
            sharing.into_iter().take(MAX_RECOMMENDATIONS).collect()
        };
        debug!(
            "Scoring {} candidate jobs for resume {}",
            candidates.len(),
            resume.id
        );

        let deadline = tokio::time::Instant::now() + self.scoring_deadline;
        let resume = &resume;
        let scored: Vec<ServiceResult<Recommendation>> = stream::iter(candidates)
            .map(|job| async move {
                let result = match tokio::time::timeout_at(deadline, self.score_pair(resume, &job)).await {
                    Ok(result) => result?,
                    Err(_) => {
                        warn!("Scoring deadline passed for job {}, using skill overlap", job.id);
                        Self::fallback_match(resume, &job)
                    }
                };
                Ok::<_, ServiceError>(Recommendation {
                    score: result.analysis.score,
                    matched_skills: result.analysis.matched_skills,
                    source: result.source,
                    job,
                })
            })
            .buffer_unordered(SCORING_CONCURRENCY)
            .collect()
            .await;
        let mut recommendations = scored.into_iter().collect::<ServiceResult<Vec<_>>>()?;

        recommendations.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(b.job.posted_at.cmp(&a.job.posted_at))
        });
        recommendations.truncate(limit);
        Ok(recommendations)
    }

    pub async fn predict_salary(&self, job_id: Uuid) -> ServiceResult<SalaryPrediction> {
        let key = salary_key(job_id);
        if let Some(cached) = self.cache.get::<SalaryPrediction>(&key).await {
            return Ok(cached);
        }

        let job = self.job(job_id).await?;
        match self.ai.predict_salary(&job).await {
            Ok(estimate) => {
                let prediction = SalaryPrediction {
                    job_id,
                    estimate,
                    source: ResultSource::Ai,
                };
                self.cache
                    .set(&key, &prediction, Duration::from_secs(self.ttl.salary_ttl_seconds))
                    .await;
                Ok(prediction)
            }
            Err(e) => {
                warn!("AI salary prediction failed for job {}: {:#}", job_id, e);
                Ok(SalaryPrediction {
                    job_id,
                    estimate: fallback::salary_from_posting(&job),
                    source: ResultSource::Fallback,
                })
            }
        }
    }

    pub async fn interview_questions(
        &self,
        user: &User,
        job_id: Uuid,
        resume_id: Option<Uuid>,
        count: Option<u32>,
    ) -> ServiceResult<QuestionSet> {
        let count = count.unwrap_or(DEFAULT_QUESTION_COUNT);
        if !(1..=MAX_QUESTION_COUNT).contains(&count) {
            return Err(ServiceError::validation(format!(
                "count must be between 1 and {}",
                MAX_QUESTION_COUNT
            )));
        }

        let resume = match resume_id {
            Some(id) => Some(self.own_resume(user, id).await?),
            None => None,
        };
        let job = self.job(job_id).await?;

        let key = questions_key(job_id, resume_id, count);
        if let Some(cached) = self.cache.get::<QuestionSet>(&key).await {
            return Ok(cached);
        }

        match self.ai.interview_questions(&job, resume.as_ref(), count).await {
            Ok(questions) => {
                let set = QuestionSet {
                    job_id,
                    resume_id,
                    questions,
                    source: ResultSource::Ai,
                };
                self.cache
                    .set(&key, &set, Duration::from_secs(self.ttl.questions_ttl_seconds))
                    .await;
                Ok(set)
            }
            Err(e) => {
                warn!("AI question generation failed for job {}: {:#}", job_id, e);
                Ok(QuestionSet {
                    job_id,
                    resume_id,
                    questions: fallback::generic_questions(&job, count),
                    source: ResultSource::Fallback,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::Role;
    use crate::jobs::NewJob;
    use crate::resumes::ResumeInput;
    use crate::test_support::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scores 90 when online; every call fails when offline
    struct MockAi {
        online: bool,
        calls: AtomicUsize,
        match_delay: Option<Duration>,
    }

    impl MockAi {
        fn new(online: bool) -> Self {
            Self {
                online,
                calls: AtomicUsize::new(0),
                match_delay: None,
            }
        }

        fn hanging() -> Self {
            Self {
                match_delay: Some(Duration::from_secs(30)),
                ..Self::new(true)
            }
        }

        fn check(&self) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.online {
                Ok(())
            } else {
                anyhow::bail!("connection refused")
            }
        }
    }

    #[async_trait]
    impl AiService for MockAi {
        async fn match_resume(&self, _resume: &Resume, job: &Job) -> anyhow::Result<MatchAnalysis> {
            self.check()?;
            if let Some(delay) = self.match_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(MatchAnalysis {
                score: 90.0,
                matched_skills: job.skills.clone(),
                missing_skills: vec![],
                summary: "strong".to_string(),
            })
        }

        async fn predict_salary(&self, job: &Job) -> anyhow::Result<SalaryEstimate> {
            self.check()?;
            Ok(SalaryEstimate {
                min: Some(100_000),
                max: Some(120_000),
                currency: job.currency.clone(),
                confidence: 0.8,
            })
        }

        async fn interview_questions(
            &self,
            _job: &Job,
            _resume: Option<&Resume>,
            count: u32,
        ) -> anyhow::Result<Vec<InterviewQuestion>> {
            self.check()?;
            Ok((0..count)
                .map(|i| InterviewQuestion {
                    question: format!("Q{}", i),
                    category: "technical".to_string(),
                    difficulty: "hard".to_string(),
                })
                .collect())
        }
    }

    struct Fixture {
        db: crate::core::Database,
        cache: TtlCache,
        settings: CacheSettings,
        seeker: User,
        resume: Resume,
        job: Job,
    }

    async fn fixture() -> Fixture {
        let (db, tenant_id) = db_with_tenant().await;
        let cache = TtlCache::new(100);
        let seeker = add_member(&db, tenant_id, "s@acme.io", Role::Member).await;
        let resume = ResumeService::new(db.pool(), &cache)
            .create(
                &seeker,
                ResumeInput {
                    title: "cv".to_string(),
                    summary: "backend".to_string(),
                    skills: vec!["rust".to_string()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let job = NewJob {
            title: "Rust Dev".to_string(),
            company: "Acme".to_string(),
            skills: vec!["rust".to_string(), "sql".to_string()],
            salary_min: Some(70_000),
            salary_max: Some(90_000),
            ..Default::default()
        }
        .into_job(tenant_id)
        .unwrap();
        JobRepository::new(db.pool()).insert(&job).await.unwrap();

        Fixture {
            db,
            cache,
            settings: CacheSettings::default(),
            seeker,
            resume,
            job,
        }
    }

    #[tokio::test]
    async fn test_ai_match_is_cached_and_persisted() {
        let f = fixture().await;
        let ai = MockAi::new(true);
        let matching = MatchingService::new(f.db.pool(), &f.cache, &ai, &f.settings);

        let first = matching.match_resume(&f.seeker, f.resume.id, f.job.id).await.unwrap();
        assert_eq!(first.source, ResultSource::Ai);
        assert_eq!(first.analysis.score, 90.0);

        let second = matching.match_resume(&f.seeker, f.resume.id, f.job.id).await.unwrap();
        assert_eq!(second.source, ResultSource::Ai);
        assert_eq!(ai.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            matching.stored_match_count(f.resume.id, f.job.id).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_offline_ai_falls_back_without_caching() {
        let f = fixture().await;
        let ai = MockAi::new(false);
        let matching = MatchingService::new(f.db.pool(), &f.cache, &ai, &f.settings);

        let result = matching.match_resume(&f.seeker, f.resume.id, f.job.id).await.unwrap();
        assert_eq!(result.source, ResultSource::Fallback);
        assert_eq!(result.analysis.score, 50.0);
        assert_eq!(result.analysis.missing_skills, vec!["sql"]);

        matching.match_resume(&f.seeker, f.resume.id, f.job.id).await.unwrap();
        assert_eq!(ai.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            matching.stored_match_count(f.resume.id, f.job.id).await.unwrap(),
            0
        );

        let salary = matching.predict_salary(f.job.id).await.unwrap();
        assert_eq!(salary.source, ResultSource::Fallback);
        assert_eq!(salary.estimate.min, Some(70_000));
        assert_eq!(salary.estimate.confidence, fallback::OWN_RANGE_CONFIDENCE);

        let questions = matching
            .interview_questions(&f.seeker, f.job.id, None, None)
            .await
            .unwrap();
        assert_eq!(questions.source, ResultSource::Fallback);
        assert_eq!(questions.questions.len(), DEFAULT_QUESTION_COUNT as usize);
    }

    #[tokio::test]
    async fn test_salary_and_questions_are_cached() {
        let f = fixture().await;
        let ai = MockAi::new(true);
        let matching = MatchingService::new(f.db.pool(), &f.cache, &ai, &f.settings);

        let salary = matching.predict_salary(f.job.id).await.unwrap();
        assert_eq!(salary.estimate.max, Some(120_000));
        matching.predict_salary(f.job.id).await.unwrap();

        let questions = matching
            .interview_questions(&f.seeker, f.job.id, Some(f.resume.id), Some(3))
            .await
            .unwrap();
        assert_eq!(questions.questions.len(), 3);
        matching
            .interview_questions(&f.seeker, f.job.id, Some(f.resume.id), Some(3))
            .await
            .unwrap();

        assert_eq!(ai.calls.load(Ordering::SeqCst), 2);

        let err = matching
            .interview_questions(&f.seeker, f.job.id, None, Some(21))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_foreign_resume_is_not_found() {
        let f = fixture().await;
        let ai = MockAi::new(true);
        let matching = MatchingService::new(f.db.pool(), &f.cache, &ai, &f.settings);
        let stranger = add_member(&f.db, f.seeker.tenant_id, "x@acme.io", Role::Member).await;

        let err = matching
            .match_resume(&stranger, f.resume.id, f.job.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_recommendations_prefer_skill_overlap() {
        let f = fixture().await;
        let unrelated = NewJob {
            title: "Chef".to_string(),
            company: "Bistro".to_string(),
            skills: vec!["cooking".to_string()],
            ..Default::default()
        }
        .into_job(f.seeker.tenant_id)
        .unwrap();
        JobRepository::new(f.db.pool()).insert(&unrelated).await.unwrap();

        let ai = MockAi::new(false);
        let matching = MatchingService::new(f.db.pool(), &f.cache, &ai, &f.settings);
        let recs = matching
            .recommend_jobs(&f.seeker, f.resume.id, Some(5))
            .await
            .unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].job.id, f.job.id);
        assert_eq!(recs[0].source, ResultSource::Fallback);

        let err = matching
            .recommend_jobs(&f.seeker, f.resume.id, Some(0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_recommendations_fall_back_when_ai_hangs() {
        let f = fixture().await;
        for title in ["Rust Platform", "Rust Tooling", "Rust Embedded"] {
            let job = NewJob {
                title: title.to_string(),
                company: "Acme".to_string(),
                skills: vec!["rust".to_string()],
                ..Default::default()
            }
            .into_job(f.seeker.tenant_id)
            .unwrap();
            JobRepository::new(f.db.pool()).insert(&job).await.unwrap();
        }

        let ai = MockAi::hanging();
        let matching = MatchingService::new(f.db.pool(), &f.cache, &ai, &f.settings)
            .with_scoring_deadline(Duration::from_millis(100));

        let started = std::time::Instant::now();
        let recs = matching
            .recommend_jobs(&f.seeker, f.resume.id, Some(10))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(recs.len(), 4);
        assert!(recs.iter().all(|rec| rec.source == ResultSource::Fallback));
        // every candidate was dispatched concurrently, not one after another
        assert_eq!(ai.calls.load(Ordering::SeqCst), 4);
        // "Rust Dev" also wants sql, so it ranks below the pure-rust postings
        assert_eq!(recs[3].job.id, f.job.id);
    }

    #[tokio::test]
    async fn test_job_writes_drop_cached_estimates() {
        let f = fixture().await;
        let ai = MockAi::new(true);
        let matching = MatchingService::new(f.db.pool(), &f.cache, &ai, &f.settings);
        let recruiter = add_member(&f.db, f.seeker.tenant_id, "r@acme.io", Role::Admin).await;
        let jobs = crate::jobs::JobService::new(f.db.pool(), &f.cache, Duration::from_secs(60));

        matching.predict_salary(f.job.id).await.unwrap();
        matching
            .interview_questions(&f.seeker, f.job.id, None, Some(2))
            .await
            .unwrap();
        assert_eq!(ai.calls.load(Ordering::SeqCst), 2);

        jobs.close(&recruiter, f.job.id).await.unwrap();

        matching.predict_salary(f.job.id).await.unwrap();
        matching
            .interview_questions(&f.seeker, f.job.id, None, Some(2))
            .await
            .unwrap();
        assert_eq!(ai.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_resume_update_drops_cached_questions() {
        let f = fixture().await;
        let ai = MockAi::new(true);
        let matching = MatchingService::new(f.db.pool(), &f.cache, &ai, &f.settings);

        matching
            .interview_questions(&f.seeker, f.job.id, Some(f.resume.id), Some(3))
            .await
            .unwrap();
        matching.match_resume(&f.seeker, f.resume.id, f.job.id).await.unwrap();
        assert_eq!(ai.calls.load(Ordering::SeqCst), 2);

        ResumeService::new(f.db.pool(), &f.cache)
            .update(
                &f.seeker,
                f.resume.id,
                ResumeInput {
                    title: "cv".to_string(),
                    summary: "backend and data".to_string(),
                    skills: vec!["rust".to_string(), "sql".to_string()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        matching
            .interview_questions(&f.seeker, f.job.id, Some(f.resume.id), Some(3))
            .await
            .unwrap();
        let rescored = matching.match_resume(&f.seeker, f.resume.id, f.job.id).await.unwrap();
        assert_eq!(ai.calls.load(Ordering::SeqCst), 4);
        assert_eq!(rescored.source, ResultSource::Ai);
    }
}
