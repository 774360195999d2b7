// src/jobs/service.rs
use super::repository::JobRepository;
use super::scraper::JobScraper;
use super::search::{rank, SearchQuery, SearchResults};
use super::{normalize_source_url, Job, JobStatus, JobUpdate, NewJob};
use crate::accounts::User;
use crate::analytics::{AnalyticsService, EVENT_SEARCH};
use crate::core::TtlCache;
use crate::error::{ServiceError, ServiceResult};
use serde::Serialize;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub const MAX_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RejectedJob {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub created: usize,
    pub updated: usize,
    pub rejected: Vec<RejectedJob>,
}

enum Upserted {
    Created(Job),
    Updated(Job),
}

impl Upserted {
    fn into_job(self) -> Job {
        match self {
            Upserted::Created(job) | Upserted::Updated(job) => job,
        }
    }
}

pub struct JobService<'a> {
    pool: &'a SqlitePool,
    cache: &'a TtlCache,
    search_ttl: Duration,
}

impl<'a> JobService<'a> {
    pub fn new(pool: &'a SqlitePool, cache: &'a TtlCache, search_ttl: Duration) -> Self {
        Self {
            pool,
            cache,
            search_ttl,
        }
    }

    fn repo(&self) -> JobRepository<'a> {
        JobRepository::new(self.pool)
    }

    fn require_job_manager(actor: &User) -> ServiceResult<()> {
        if actor.role.can_manage_jobs() {
            Ok(())
        } else {
            Err(ServiceError::forbidden("Admin role required to manage jobs"))
        }
    }

    pub async fn create(&self, actor: &User, posting: NewJob) -> ServiceResult<Job> {
        Self::require_job_manager(actor)?;
        let job = posting.into_job(actor.tenant_id)?;
        self.repo().insert(&job).await?;
        self.invalidate_search().await;

        info!("{} posted job {} ({})", actor.email, job.id, job.title);
        Ok(job)
    }

    /// Bulk ingestion; postings whose source_url is already known are refreshed in place
    pub async fn ingest_batch(&self, actor: &User, postings: Vec<NewJob>) -> ServiceResult<IngestReport> {
        Self::require_job_manager(actor)?;
        if postings.len() > MAX_BATCH_SIZE {
            return Err(ServiceError::validation(format!(
                "A batch may contain at most {} jobs",
                MAX_BATCH_SIZE
            )));
        }

        let mut report = IngestReport::default();
        let mut failure = None;
        for (index, posting) in postings.into_iter().enumerate() {
            match self.upsert(actor.tenant_id, posting).await {
                Ok(Upserted::Created(_)) => report.created += 1,
                Ok(Upserted::Updated(_)) => report.updated += 1,
                Err(ServiceError::Validation(reason)) => {
                    report.rejected.push(RejectedJob { index, reason })
                }
                Err(e) => {
                    failure = Some((index, e));
                    break;
                }
            }
        }

        // Postings written before a failure stay committed and must show up in search
        if report.created + report.updated > 0 {
            self.invalidate_search().await;
        }
        if let Some((index, e)) = failure {
            warn!(
                "Batch for tenant {} aborted at posting {} after {} writes: {}",
                actor.tenant_id,
                index,
                report.created + report.updated,
                e
            );
            return Err(e);
        }

        info!(
            "Ingested batch for tenant {}: {} created, {} updated, {} rejected",
            actor.tenant_id,
            report.created,
            report.updated,
            report.rejected.len()
        );
        Ok(report)
    }

    pub async fn ingest_from_url(
        &self,
        actor: &User,
        scraper: &JobScraper,
        url: &str,
    ) -> ServiceResult<Job> {
        Self::require_job_manager(actor)?;
        let url = url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ServiceError::validation("Job URL must start with http:// or https://"));
        }

        let posting = scraper.fetch_posting(url).await.map_err(|e| {
            warn!("Scraping {} failed: {:#}", url, e);
            ServiceError::validation(format!("Could not extract a job posting from {}: {}", url, e))
        })?;

        let job = self.upsert(actor.tenant_id, posting).await?.into_job();
        self.invalidate_search().await;
        Ok(job)
    }

    async fn upsert(&self, tenant_id: i64, posting: NewJob) -> ServiceResult<Upserted> {
        posting.validate()?;
        let repo = self.repo();

        let existing = match normalize_source_url(posting.source_url.as_deref()) {
            Some(url) => repo.find_by_source_url(tenant_id, &url).await?,
            None => None,
        };

        match existing {
            Some(mut job) => {
                job.apply(JobUpdate {
                    title: Some(posting.title),
                    company: Some(posting.company),
                    location: Some(posting.location),
                    description: Some(posting.description),
                    employment_type: Some(posting.employment_type),
                    remote: Some(posting.remote),
                    salary_min: posting.salary_min,
                    salary_max: posting.salary_max,
                    currency: posting.currency,
                    skills: Some(posting.skills),
                })?;
                repo.update(&job).await?;
                self.invalidate_job_entries(job.id).await;
                Ok(Upserted::Updated(job))
            }
            None => {
                let job = posting.into_job(tenant_id)?;
                repo.insert(&job).await?;
                Ok(Upserted::Created(job))
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<Job> {
        self.repo()
            .find(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Job {}", id)))
    }

    /// Load a job the actor's tenant owns and may modify
    async fn owned(&self, actor: &User, id: Uuid) -> ServiceResult<Job> {
        Self::require_job_manager(actor)?;
        let job = self.get(id).await?;
        if job.tenant_id != actor.tenant_id {
            return Err(ServiceError::forbidden("Job belongs to another tenant"));
        }
        Ok(job)
    }

    pub async fn update(&self, actor: &User, id: Uuid, update: JobUpdate) -> ServiceResult<Job> {
        let mut job = self.owned(actor, id).await?;
        job.apply(update)?;
        self.repo().update(&job).await?;
        self.invalidate_job_entries(job.id).await;
        self.invalidate_search().await;
        Ok(job)
    }

    pub async fn close(&self, actor: &User, id: Uuid) -> ServiceResult<Job> {
        let mut job = self.owned(actor, id).await?;
        if job.status == JobStatus::Closed {
            return Ok(job);
        }
        self.repo().set_status(job.id, JobStatus::Closed).await?;
        job.status = JobStatus::Closed;
        self.invalidate_job_entries(job.id).await;
        self.invalidate_search().await;

        info!("{} closed job {}", actor.email, job.id);
        Ok(job)
    }

    pub async fn delete(&self, actor: &User, id: Uuid) -> ServiceResult<()> {
        let job = self.owned(actor, id).await?;
        self.repo().delete(job.id).await?;
        self.invalidate_job_entries(job.id).await;
        self.invalidate_search().await;

        info!("{} deleted job {}", actor.email, job.id);
        Ok(())
    }

    pub async fn list_for_tenant(&self, tenant_id: i64) -> ServiceResult<Vec<Job>> {
        Ok(self.repo().list_by_tenant(tenant_id).await?)
    }

    /// Search open jobs; a signed-in caller gets a `search` event recorded
    pub async fn search(&self, caller: Option<&User>, query: &SearchQuery) -> ServiceResult<SearchResults> {
        let query = query.normalized()?;

        if let Some(user) = caller {
            let metadata = serde_json::json!({
                "query": query.query,
                "location": query.location,
                "skills": query.skills,
            });
            AnalyticsService::new(self.pool)
                .track(user.tenant_id, user.id, EVENT_SEARCH, metadata)
                .await?;
        }

        let key = query.cache_key();
        if let Some(results) = self.cache.get::<SearchResults>(&key).await {
            return Ok(results);
        }

        let candidates = self.repo().list_open(&query.filter()).await?;
        let results = rank(candidates, &query);
        self.cache.set(&key, &results, self.search_ttl).await;
        Ok(results)
    }

    async fn invalidate_search(&self) {
        self.cache.invalidate_prefix("search:").await;
    }

    async fn invalidate_job_entries(&self, id: Uuid) {
        let id = id.to_string();
        self.cache.invalidate(&format!("salary:{}", id)).await;
        self.cache.invalidate_prefix(&format!("questions:{}:", id)).await;
        self.cache.invalidate_matching("match:", &id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::Role;
    use crate::analytics::FunnelStage;
    use crate::jobs::SortOrder;
    use crate::test_support::*;

    fn posting(title: &str, url: Option<&str>) -> NewJob {
        NewJob {
            title: title.to_string(),
            company: "Acme".to_string(),
            skills: vec!["Rust".to_string()],
            source_url: url.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_requires_admin() {
        let (db, tenant_id) = db_with_tenant().await;
        let cache = TtlCache::new(100);
        let jobs = JobService::new(db.pool(), &cache, Duration::from_secs(60));
        let member = add_member(&db, tenant_id, "m@acme.io", Role::Member).await;
        let admin = add_member(&db, tenant_id, "a@acme.io", Role::Admin).await;

        let err = jobs.create(&member, posting("Dev", None)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let job = jobs.create(&admin, posting("Dev", None)).await.unwrap();
        assert_eq!(jobs.get(job.id).await.unwrap().title, "Dev");
    }

    #[tokio::test]
    async fn test_batch_upserts_by_source_url() {
        let (db, tenant_id) = db_with_tenant().await;
        let cache = TtlCache::new(100);
        let jobs = JobService::new(db.pool(), &cache, Duration::from_secs(60));
        let admin = add_member(&db, tenant_id, "a@acme.io", Role::Admin).await;

        let report = jobs
            .ingest_batch(
                &admin,
                vec![
                    posting("One", Some("https://jobs.acme.io/1")),
                    posting("", None),
                    posting("Two", Some("https://jobs.acme.io/2")),
                ],
            )
            .await
            .unwrap();
        assert_eq!(report.created, 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].index, 1);

        let report = jobs
            .ingest_batch(&admin, vec![posting("One v2", Some("https://jobs.acme.io/1"))])
            .await
            .unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.updated, 1);

        let all = jobs.list_for_tenant(tenant_id).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|j| j.title == "One v2"));
    }

    #[tokio::test]
    async fn test_reingest_matches_padded_source_url() {
        let (db, tenant_id) = db_with_tenant().await;
        let cache = TtlCache::new(100);
        let jobs = JobService::new(db.pool(), &cache, Duration::from_secs(60));
        let admin = add_member(&db, tenant_id, "a@acme.io", Role::Admin).await;

        let batch = || vec![posting("One", Some(" https://x.io/1 "))];
        let first = jobs.ingest_batch(&admin, batch()).await.unwrap();
        assert_eq!((first.created, first.updated), (1, 0));
        let second = jobs.ingest_batch(&admin, batch()).await.unwrap();
        assert_eq!((second.created, second.updated), (0, 1));

        let all = jobs.list_for_tenant(tenant_id).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].source_url.as_deref(), Some("https://x.io/1"));
    }

    #[tokio::test]
    async fn test_failed_batch_still_refreshes_search() {
        let (db, tenant_id) = db_with_tenant().await;
        let cache = TtlCache::new(100);
        let jobs = JobService::new(db.pool(), &cache, Duration::from_secs(60));
        let admin = add_member(&db, tenant_id, "a@acme.io", Role::Admin).await;
        sqlx::query(
            "CREATE TRIGGER reject_boom BEFORE INSERT ON jobs WHEN NEW.title = 'Boom' \
             BEGIN SELECT RAISE(ABORT, 'storage failure'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let query = SearchQuery {
            query: Some("rust".to_string()),
            ..Default::default()
        };
        assert_eq!(jobs.search(None, &query).await.unwrap().total, 0);

        let err = jobs
            .ingest_batch(
                &admin,
                vec![posting("Rust Dev", None), posting("Boom", None), posting("Rust Lead", None)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));

        // the posting written before the failure is visible, the one after it was never attempted
        assert_eq!(jobs.search(None, &query).await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_cross_tenant_writes_are_forbidden() {
        let (db, tenant_id) = db_with_tenant().await;
        let cache = TtlCache::new(100);
        let jobs = JobService::new(db.pool(), &cache, Duration::from_secs(60));
        let admin = add_member(&db, tenant_id, "a@acme.io", Role::Admin).await;

        let other = crate::accounts::TenantRepository::new(db.pool())
            .create_domain_tenant("globex.io", "globex")
            .await
            .unwrap();
        let outsider = add_member(&db, other.id, "a@globex.io", Role::Owner).await;

        let job = jobs.create(&admin, posting("Dev", None)).await.unwrap();
        let err = jobs
            .update(
                &outsider,
                job.id,
                JobUpdate {
                    title: Some("Hijacked".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        assert_eq!(jobs.get(job.id).await.unwrap().title, "Dev");
        let err = jobs.close(&outsider, job.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
        let err = jobs.delete(&outsider, job.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        jobs.delete(&admin, job.id).await.unwrap();
        assert!(matches!(jobs.get(job.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_search_cache_is_invalidated_by_writes() {
        let (db, tenant_id) = db_with_tenant().await;
        let cache = TtlCache::new(100);
        let jobs = JobService::new(db.pool(), &cache, Duration::from_secs(60));
        let admin = add_member(&db, tenant_id, "a@acme.io", Role::Admin).await;
        let seeker = add_member(&db, tenant_id, "s@acme.io", Role::Member).await;

        jobs.create(&admin, posting("Rust Dev", None)).await.unwrap();
        let query = SearchQuery {
            query: Some("rust".to_string()),
            ..Default::default()
        };

        let first = jobs.search(Some(&seeker), &query).await.unwrap();
        assert_eq!(first.total, 1);
        let cached = jobs.search(None, &query).await.unwrap();
        assert_eq!(cached.total, 1);
        assert_eq!(cache.stats().await.hits, 1);

        let second = jobs.create(&admin, posting("Senior Rust Dev", None)).await.unwrap();
        let fresh = jobs.search(None, &query).await.unwrap();
        assert_eq!(fresh.total, 2);

        jobs.close(&admin, second.id).await.unwrap();
        let newest = SearchQuery {
            sort: Some(SortOrder::Newest),
            ..query.clone()
        };
        assert_eq!(jobs.search(None, &newest).await.unwrap().total, 1);

        let stages = AnalyticsService::new(db.pool())
            .stages_for_user(seeker.id)
            .await
            .unwrap();
        assert!(stages.iter().any(|(stage, _)| *stage == FunnelStage::FirstSearch));
    }
}
