// src/web/handlers/job_handlers.rs
use super::{parse_id, parse_timestamp};
use crate::analytics::{AnalyticsService, EVENT_JOB_VIEWED};
use crate::auth::{AuthenticatedUser, OptionalAuth};
use crate::core::{ConfigManager, Database, TtlCache};
use crate::jobs::scraper::JobScraper;
use crate::jobs::{
    EmploymentType, IngestReport, Job, JobService, JobUpdate, NewJob, SearchQuery, SearchResults,
    SortOrder,
};
use crate::web::types::*;

use rocket::serde::json::Json;
use rocket::{FromForm, State};
use std::time::Duration;
use tracing::{info, warn};

fn job_service<'a>(
    db: &'a Database,
    cache: &'a TtlCache,
    config: &ConfigManager,
) -> JobService<'a> {
    JobService::new(
        db.pool(),
        cache,
        Duration::from_secs(config.cache.search_ttl_seconds),
    )
}

pub async fn create_job_handler(
    request: Json<StandardRequest<NewJob>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<Job>> {
    let conversation_id = request.conversation_id();
    let StandardRequest { data, .. } = request.into_inner();

    let job = job_service(db, cache, config)
        .create(auth.user(), data)
        .await
        .map_err(|e| ApiError::service(e, conversation_id.clone()))?;

    Ok(Json(DataResponse::success(
        format!("Job '{}' posted", job.title),
        job,
        conversation_id,
    )))
}

pub async fn ingest_jobs_handler(
    request: Json<StandardRequest<IngestBatchRequest>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<IngestReport>> {
    let conversation_id = request.conversation_id();
    let StandardRequest { data, .. } = request.into_inner();

    let report = job_service(db, cache, config)
        .ingest_batch(auth.user(), data.jobs)
        .await
        .map_err(|e| ApiError::service(e, conversation_id.clone()))?;

    Ok(Json(DataResponse::success(
        format!(
            "{} created, {} updated, {} rejected",
            report.created,
            report.updated,
            report.rejected.len()
        ),
        report,
        conversation_id,
    )))
}

pub async fn ingest_url_handler(
    request: Json<StandardRequest<IngestUrlRequest>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
    scraper: &State<JobScraper>,
) -> ApiResult<DataResponse<Job>> {
    let conversation_id = request.conversation_id();

    info!(
        "User {} (tenant: {}) ingesting job from {}",
        auth.email(),
        auth.tenant_name(),
        request.data.url
    );

    let job = job_service(db, cache, config)
        .ingest_from_url(auth.user(), scraper, &request.data.url)
        .await
        .map_err(|e| ApiError::service(e, conversation_id.clone()))?;

    Ok(Json(DataResponse::success(
        format!("Imported '{}' at {}", job.title, job.company),
        job,
        conversation_id,
    )))
}

pub async fn list_tenant_jobs_handler(
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<Vec<Job>>> {
    let jobs = job_service(db, cache, config)
        .list_for_tenant(auth.tenant().id)
        .await?;

    Ok(Json(DataResponse::success(
        format!("{} jobs posted by {}", jobs.len(), auth.tenant_name()),
        jobs,
        None,
    )))
}

/// Raw query-string parameters of a job search
#[derive(Debug, Default, FromForm)]
pub struct SearchParams {
    pub q: Option<String>,
    pub location: Option<String>,
    pub remote: Option<bool>,
    pub employment_type: Option<String>,
    pub min_salary: Option<i64>,
    pub skills: Option<String>,
    pub posted_since: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl SearchParams {
    fn into_query(self) -> Result<SearchQuery, ApiError> {
        let employment_type = self
            .employment_type
            .as_deref()
            .map(str::parse::<EmploymentType>)
            .transpose()?;
        let sort = self
            .sort
            .as_deref()
            .map(str::parse::<SortOrder>)
            .transpose()?;
        let posted_since = parse_timestamp("posted_since", self.posted_since.as_deref())?;
        let skills = self
            .skills
            .map(|raw| raw.split(',').map(str::to_string).collect())
            .unwrap_or_default();

        Ok(SearchQuery {
            query: self.q,
            location: self.location,
            remote: self.remote,
            employment_type,
            min_salary: self.min_salary,
            skills,
            posted_since,
            sort,
            page: self.page,
            per_page: self.per_page,
        })
    }
}

pub async fn search_jobs_handler(
    params: SearchParams,
    auth: OptionalAuth,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<SearchResults>> {
    let query = params.into_query()?;
    let caller = auth.user.as_ref().map(|a| a.user());

    let results = job_service(db, cache, config)
        .search(caller, &query)
        .await?;

    Ok(Json(DataResponse::success(
        format!("{} matching jobs", results.total),
        results,
        None,
    )))
}

pub async fn get_job_handler(
    id: &str,
    auth: OptionalAuth,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<Job>> {
    let id = parse_id(id, None)?;
    let job = job_service(db, cache, config).get(id).await?;

    if let Some(auth) = auth.user {
        let viewer = auth.user();
        if let Err(e) = AnalyticsService::new(db.pool())
            .track(
                viewer.tenant_id,
                viewer.id,
                EVENT_JOB_VIEWED,
                serde_json::json!({"job_id": job.id}),
            )
            .await
        {
            warn!("Failed to record job view: {}", e);
        }
    }

    Ok(Json(DataResponse::success(job.title.clone(), job, None)))
}

pub async fn update_job_handler(
    id: &str,
    request: Json<StandardRequest<JobUpdate>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<Job>> {
    let conversation_id = request.conversation_id();
    let id = parse_id(id, conversation_id.clone())?;
    let StandardRequest { data, .. } = request.into_inner();

    let job = job_service(db, cache, config)
        .update(auth.user(), id, data)
        .await
        .map_err(|e| ApiError::service(e, conversation_id.clone()))?;

    Ok(Json(DataResponse::success(
        format!("Job '{}' updated", job.title),
        job,
        conversation_id,
    )))
}

pub async fn close_job_handler(
    id: &str,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<Job>> {
    let id = parse_id(id, None)?;
    let job = job_service(db, cache, config)
        .close(auth.user(), id)
        .await?;

    Ok(Json(DataResponse::success(
        format!("Job '{}' closed", job.title),
        job,
        None,
    )))
}

pub async fn delete_job_handler(
    id: &str,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
) -> ApiResult<ActionResponse> {
    let id = parse_id(id, None)?;
    job_service(db, cache, config)
        .delete(auth.user(), id)
        .await?;

    Ok(Json(ActionResponse::success(
        format!("Job {} deleted", id),
        "deleted".to_string(),
        None,
    )))
}
