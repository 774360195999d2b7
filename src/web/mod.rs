// src/web/mod.rs

pub mod handlers;
pub mod types;

pub use handlers::*;
pub use types::*;

use crate::accounts::User;
use crate::ai_client::{AiService, AiServiceClient};
use crate::analytics::segments::{spawn_segment_refresher, SegmentThresholds};
use crate::analytics::{
    DailyActive, EngagementSnapshot, FunnelReport, RetentionCohort, SegmentCount, UserEvent,
};
use crate::applications::Application;
use crate::auth::{AuthConfig, AuthFailure, AuthenticatedUser, OptionalAuth, RequireAdmin};
use crate::core::{CacheStats, ConfigManager, Database, TtlCache};
use crate::jobs::scraper::JobScraper;
use crate::jobs::{IngestReport, Job, JobUpdate, NewJob, SearchResults};
use crate::matching::{MatchResult, QuestionSet, Recommendation, SalaryPrediction};
use crate::resumes::{Resume, ResumeInput};
use anyhow::Result;
use rocket::fairing::{AdHoc, Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::{
    catchers, delete, get, options, patch, post, put, routes, Build, Request, Response, Rocket,
    State,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

// CORS Fairing
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, PUT, PATCH, DELETE, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

// System

#[get("/health")]
pub async fn health(auth: OptionalAuth, db: &State<Database>) -> ApiResult<TextResponse> {
    handlers::health_handler(auth, db).await
}

#[get("/me")]
pub async fn get_current_user(auth: AuthenticatedUser) -> Json<DataResponse<UserInfo>> {
    handlers::get_current_user_handler(auth).await
}

// Tenant members

#[get("/tenant/members")]
pub async fn list_members(
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<Vec<User>>> {
    handlers::list_members_handler(admin, db).await
}

#[post("/tenant/members", data = "<request>")]
pub async fn invite_member(
    request: Json<StandardRequest<InviteMemberRequest>>,
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<User>> {
    handlers::invite_member_handler(request, admin, db).await
}

#[patch("/tenant/members/<user_id>/role", data = "<request>")]
pub async fn change_role(
    user_id: i64,
    request: Json<StandardRequest<ChangeRoleRequest>>,
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<User>> {
    handlers::change_role_handler(user_id, request, admin, db).await
}

#[delete("/tenant/members/<user_id>")]
pub async fn deactivate_member(
    user_id: i64,
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<ActionResponse> {
    handlers::deactivate_member_handler(user_id, admin, db).await
}

// Jobs

#[post("/jobs", data = "<request>")]
pub async fn create_job(
    request: Json<StandardRequest<NewJob>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<Job>> {
    handlers::create_job_handler(request, auth, db, cache, config).await
}

#[post("/jobs/ingest", data = "<request>")]
pub async fn ingest_jobs(
    request: Json<StandardRequest<IngestBatchRequest>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<IngestReport>> {
    handlers::ingest_jobs_handler(request, auth, db, cache, config).await
}

#[post("/jobs/ingest-url", data = "<request>")]
pub async fn ingest_url(
    request: Json<StandardRequest<IngestUrlRequest>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
    scraper: &State<JobScraper>,
) -> ApiResult<DataResponse<Job>> {
    handlers::ingest_url_handler(request, auth, db, cache, config, scraper).await
}

#[get("/tenant/jobs")]
pub async fn list_tenant_jobs(
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<Vec<Job>>> {
    handlers::list_tenant_jobs_handler(auth, db, cache, config).await
}

#[get("/jobs/search?<params..>")]
pub async fn search_jobs(
    params: SearchParams,
    auth: OptionalAuth,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<SearchResults>> {
    handlers::search_jobs_handler(params, auth, db, cache, config).await
}

#[get("/jobs/<id>")]
pub async fn get_job(
    id: &str,
    auth: OptionalAuth,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<Job>> {
    handlers::get_job_handler(id, auth, db, cache, config).await
}

#[patch("/jobs/<id>", data = "<request>")]
pub async fn update_job(
    id: &str,
    request: Json<StandardRequest<JobUpdate>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<Job>> {
    handlers::update_job_handler(id, request, auth, db, cache, config).await
}

#[post("/jobs/<id>/close")]
pub async fn close_job(
    id: &str,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<Job>> {
    handlers::close_job_handler(id, auth, db, cache, config).await
}

#[delete("/jobs/<id>")]
pub async fn delete_job(
    id: &str,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    config: &State<ConfigManager>,
) -> ApiResult<ActionResponse> {
    handlers::delete_job_handler(id, auth, db, cache, config).await
}

// Resumes

#[post("/resumes", data = "<request>")]
pub async fn create_resume(
    request: Json<StandardRequest<ResumeInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
) -> ApiResult<DataResponse<Resume>> {
    handlers::create_resume_handler(request, auth, db, cache).await
}

#[get("/resumes")]
pub async fn list_resumes(
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
) -> ApiResult<DataResponse<Vec<Resume>>> {
    handlers::list_resumes_handler(auth, db, cache).await
}

#[get("/resumes/<id>")]
pub async fn get_resume(
    id: &str,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
) -> ApiResult<DataResponse<Resume>> {
    handlers::get_resume_handler(id, auth, db, cache).await
}

#[put("/resumes/<id>", data = "<request>")]
pub async fn update_resume(
    id: &str,
    request: Json<StandardRequest<ResumeInput>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
) -> ApiResult<DataResponse<Resume>> {
    handlers::update_resume_handler(id, request, auth, db, cache).await
}

#[delete("/resumes/<id>")]
pub async fn delete_resume(
    id: &str,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
) -> ApiResult<ActionResponse> {
    handlers::delete_resume_handler(id, auth, db, cache).await
}

// Applications

#[post("/applications", data = "<request>")]
pub async fn apply(
    request: Json<StandardRequest<ApplyRequest>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<DataResponse<Application>> {
    handlers::apply_handler(request, auth, db).await
}

#[get("/applications")]
pub async fn list_applications(
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<DataResponse<Vec<Application>>> {
    handlers::list_applications_handler(auth, db).await
}

#[get("/jobs/<id>/applications")]
pub async fn list_job_applications(
    id: &str,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<DataResponse<Vec<Application>>> {
    handlers::list_job_applications_handler(id, auth, db).await
}

#[patch("/applications/<id>/status", data = "<request>")]
pub async fn update_application_status(
    id: &str,
    request: Json<StandardRequest<StatusUpdateRequest>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<DataResponse<Application>> {
    handlers::update_application_status_handler(id, request, auth, db).await
}

// Matching

#[post("/match", data = "<request>")]
pub async fn match_resume(
    request: Json<StandardRequest<MatchRequest>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    ai: &State<Arc<dyn AiService>>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<MatchResult>> {
    handlers::match_handler(request, auth, db, cache, ai, config).await
}

#[get("/resumes/<id>/recommendations?<limit>")]
pub async fn recommendations(
    id: &str,
    limit: Option<usize>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    ai: &State<Arc<dyn AiService>>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<Vec<Recommendation>>> {
    handlers::recommendations_handler(id, limit, auth, db, cache, ai, config).await
}

#[get("/jobs/<id>/salary")]
pub async fn predict_salary(
    id: &str,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    ai: &State<Arc<dyn AiService>>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<SalaryPrediction>> {
    handlers::salary_handler(id, auth, db, cache, ai, config).await
}

#[post("/jobs/<id>/interview-questions", data = "<request>")]
pub async fn interview_questions(
    id: &str,
    request: Option<Json<StandardRequest<QuestionsRequest>>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
    cache: &State<TtlCache>,
    ai: &State<Arc<dyn AiService>>,
    config: &State<ConfigManager>,
) -> ApiResult<DataResponse<QuestionSet>> {
    handlers::interview_questions_handler(id, request, auth, db, cache, ai, config).await
}

// Analytics

#[post("/events", data = "<request>")]
pub async fn track_event(
    request: Json<StandardRequest<TrackEventRequest>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<DataResponse<UserEvent>> {
    handlers::track_event_handler(request, auth, db).await
}

#[get("/analytics/engagement")]
pub async fn engagement(
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<EngagementSnapshot>> {
    handlers::engagement_handler(admin, db).await
}

#[get("/analytics/active-series?<days>")]
pub async fn active_series(
    days: Option<i64>,
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<Vec<DailyActive>>> {
    handlers::active_series_handler(days, admin, db).await
}

#[get("/analytics/funnel?<from>&<to>")]
pub async fn funnel(
    from: Option<&str>,
    to: Option<&str>,
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<FunnelReport>> {
    handlers::funnel_handler(from, to, admin, db).await
}

#[get("/analytics/retention?<period>&<periods>")]
pub async fn retention(
    period: Option<&str>,
    periods: Option<i64>,
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<Vec<RetentionCohort>>> {
    handlers::retention_handler(period, periods, admin, db).await
}

#[get("/analytics/segments")]
pub async fn segments(
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<Vec<SegmentCount>>> {
    handlers::segments_handler(admin, db).await
}

#[post("/analytics/segments/recompute")]
pub async fn recompute_segments(
    admin: RequireAdmin,
    db: &State<Database>,
    config: &State<ConfigManager>,
) -> ApiResult<ActionResponse> {
    handlers::recompute_segments_handler(admin, db, config).await
}

#[get("/analytics/users/<user_id>")]
pub async fn user_activity(
    user_id: i64,
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<UserActivity>> {
    handlers::user_activity_handler(user_id, admin, db).await
}

#[get("/analytics/cache")]
pub async fn cache_stats(
    admin: RequireAdmin,
    cache: &State<TtlCache>,
) -> Json<DataResponse<CacheStats>> {
    handlers::cache_stats_handler(admin, cache).await
}

#[options("/<_..>")]
pub async fn options() -> Status {
    Status::Ok
}

// Error catchers
fn catcher_body(error: &str, error_code: &str, suggestions: &[&str]) -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        error.to_string(),
        error_code.to_string(),
        suggestions.iter().map(|s| s.to_string()).collect(),
        None,
    ))
}

#[rocket::catch(400)]
pub fn bad_request() -> Json<StandardErrorResponse> {
    catcher_body(
        "Invalid request format",
        "BAD_REQUEST",
        &[
            "Check your request JSON format",
            "Verify all required fields are present",
        ],
    )
}

#[rocket::catch(401)]
pub fn unauthorized(req: &Request) -> Json<StandardErrorResponse> {
    catcher_body(
        AuthFailure::of(req).unwrap_or("Authentication required"),
        "UNAUTHORIZED",
        &[
            "Include a valid Bearer token in the Authorization header",
            "Request a new token if yours has expired",
        ],
    )
}

#[rocket::catch(403)]
pub fn forbidden(req: &Request) -> Json<StandardErrorResponse> {
    catcher_body(
        AuthFailure::of(req).unwrap_or("You do not have access to this resource"),
        "FORBIDDEN",
        &["Ask a tenant owner or admin for access"],
    )
}

#[rocket::catch(404)]
pub fn not_found() -> Json<StandardErrorResponse> {
    catcher_body(
        "Resource not found",
        "NOT_FOUND",
        &["Check the URL and identifier"],
    )
}

#[rocket::catch(422)]
pub fn unprocessable() -> Json<StandardErrorResponse> {
    catcher_body(
        "Request body could not be parsed",
        "VALIDATION_ERROR",
        &["Check field names and value types"],
    )
}

#[rocket::catch(500)]
pub fn internal_error() -> Json<StandardErrorResponse> {
    catcher_body(
        "Internal server error",
        "INTERNAL_ERROR",
        &[
            "Try again in a few moments",
            "Contact support if the problem persists",
        ],
    )
}

/// Assemble the API with its managed state; no network listener is opened here
pub fn build_rocket(
    config: ConfigManager,
    db: Database,
    ai: Arc<dyn AiService>,
) -> Result<Rocket<Build>> {
    let auth_config = AuthConfig::new(&config.auth);
    let cache = TtlCache::new(config.cache.max_entries);
    let scraper = JobScraper::new(config.service.timeout_seconds)?;

    let refresh_seconds = config.analytics.segment_refresh_seconds;
    let thresholds = SegmentThresholds::from(&config.analytics);
    let pool = db.pool().clone();

    let segment_refresher = AdHoc::on_liftoff("Segment refresher", move |_| {
        Box::pin(async move {
            if refresh_seconds == 0 {
                info!("Segment refresher disabled");
                return;
            }
            info!("Refreshing user segments every {}s", refresh_seconds);
            spawn_segment_refresher(pool, thresholds, Duration::from_secs(refresh_seconds));
        })
    });

    Ok(rocket::build()
        .attach(Cors)
        .attach(segment_refresher)
        .manage(config)
        .manage(auth_config)
        .manage(db)
        .manage(cache)
        .manage(scraper)
        .manage(ai)
        .register(
            "/api",
            catchers![
                bad_request,
                unauthorized,
                forbidden,
                not_found,
                unprocessable,
                internal_error
            ],
        )
        .mount(
            "/api",
            routes![
                health,
                get_current_user,
                list_members,
                invite_member,
                change_role,
                deactivate_member,
                create_job,
                ingest_jobs,
                ingest_url,
                list_tenant_jobs,
                search_jobs,
                get_job,
                update_job,
                close_job,
                delete_job,
                create_resume,
                list_resumes,
                get_resume,
                update_resume,
                delete_resume,
                apply,
                list_applications,
                list_job_applications,
                update_application_status,
                match_resume,
                recommendations,
                predict_salary,
                interview_questions,
                track_event,
                engagement,
                active_series,
                funnel,
                retention,
                segments,
                recompute_segments,
                user_activity,
                cache_stats,
                options,
            ],
        ))
}

// Main server start function
pub async fn start_web_server(config: ConfigManager, port: u16) -> Result<()> {
    config.ensure_directories().await?;

    let db = match Database::connect(&config.environment.database_path).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to initialize database: {:#}", e);
            return Err(e);
        }
    };

    let ai: Arc<dyn AiService> = Arc::new(AiServiceClient::new(
        &config.service.ai_service_url,
        config.service.timeout_seconds,
    )?);

    info!("Starting HireFlow multi-tenant API server");
    info!("Database: {}", config.environment.database_path.display());
    info!("AI service: {}", config.service.ai_service_url);
    info!("Server: http://0.0.0.0:{}", port);

    let figment = rocket::Config::figment()
        .merge(("address", "0.0.0.0"))
        .merge(("port", port));

    let _rocket = build_rocket(config, db, ai)?
        .configure(figment)
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("Rocket failed: {}", e))?;

    Ok(())
}
