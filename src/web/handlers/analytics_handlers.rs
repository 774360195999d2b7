// src/web/handlers/analytics_handlers.rs
use super::parse_timestamp;
use crate::accounts::UserRepository;
use crate::analytics::engagement::{DailyActive, EngagementSnapshot};
use crate::analytics::funnel::FunnelReport;
use crate::analytics::retention::{RetentionCohort, RetentionPeriod};
use crate::analytics::segments::{SegmentCount, SegmentThresholds, UserSegment};
use crate::analytics::{AnalyticsService, FunnelStage, UserEvent};
use crate::auth::{AuthenticatedUser, RequireAdmin};
use crate::core::{CacheStats, ConfigManager, Database, TtlCache};
use crate::error::ServiceError;
use crate::web::types::*;

use chrono::{DateTime, Utc};
use rocket::serde::json::Json;
use rocket::serde::Serialize;
use rocket::State;
use tracing::info;

const DEFAULT_SERIES_DAYS: i64 = 30;
const DEFAULT_RETENTION_PERIODS: i64 = 8;
const RECENT_EVENT_LIMIT: i64 = 50;

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct UserActivity {
    pub user_id: i64,
    pub segment: Option<UserSegment>,
    pub stages: Vec<StageReached>,
    pub recent_events: Vec<UserEvent>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct StageReached {
    pub stage: FunnelStage,
    pub reached_at: DateTime<Utc>,
}

pub async fn track_event_handler(
    request: Json<StandardRequest<TrackEventRequest>>,
    auth: AuthenticatedUser,
    db: &State<Database>,
) -> ApiResult<DataResponse<UserEvent>> {
    let conversation_id = request.conversation_id();
    let StandardRequest { data, .. } = request.into_inner();
    let user = auth.user();

    let event = AnalyticsService::new(db.pool())
        .track(user.tenant_id, user.id, &data.event_type, data.metadata)
        .await
        .map_err(|e| ApiError::service(e, conversation_id.clone()))?;

    Ok(Json(DataResponse::success(
        format!("Recorded {}", event.event_type),
        event,
        conversation_id,
    )))
}

pub async fn engagement_handler(
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<EngagementSnapshot>> {
    let RequireAdmin(auth) = admin;
    let snapshot = AnalyticsService::new(db.pool())
        .engagement(auth.tenant().id, Utc::now())
        .await
        .map_err(ServiceError::Internal)?;

    Ok(Json(DataResponse::success(
        format!(
            "DAU {} / WAU {} / MAU {}",
            snapshot.dau, snapshot.wau, snapshot.mau
        ),
        snapshot,
        None,
    )))
}

pub async fn active_series_handler(
    days: Option<i64>,
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<Vec<DailyActive>>> {
    let RequireAdmin(auth) = admin;
    let series = AnalyticsService::new(db.pool())
        .daily_active_series(
            auth.tenant().id,
            days.unwrap_or(DEFAULT_SERIES_DAYS),
            Utc::now(),
        )
        .await?;

    Ok(Json(DataResponse::success(
        format!("{} days of activity", series.len()),
        series,
        None,
    )))
}

pub async fn funnel_handler(
    from: Option<&str>,
    to: Option<&str>,
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<FunnelReport>> {
    let RequireAdmin(auth) = admin;
    let from = parse_timestamp("from", from)?;
    let to = parse_timestamp("to", to)?;

    let report = AnalyticsService::new(db.pool())
        .funnel_report(auth.tenant().id, from, to)
        .await?;

    Ok(Json(DataResponse::success(
        format!("Funnel over {} users", report.cohort_size),
        report,
        None,
    )))
}

pub async fn retention_handler(
    period: Option<&str>,
    periods: Option<i64>,
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<Vec<RetentionCohort>>> {
    let RequireAdmin(auth) = admin;
    let period = period
        .map(str::parse::<RetentionPeriod>)
        .transpose()?
        .unwrap_or(RetentionPeriod::Week);

    let cohorts = AnalyticsService::new(db.pool())
        .retention_cohorts(
            auth.tenant().id,
            period,
            periods.unwrap_or(DEFAULT_RETENTION_PERIODS),
            Utc::now(),
        )
        .await?;

    Ok(Json(DataResponse::success(
        format!("{} cohorts", cohorts.len()),
        cohorts,
        None,
    )))
}

pub async fn segments_handler(
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<Vec<SegmentCount>>> {
    let RequireAdmin(auth) = admin;
    let distribution = AnalyticsService::new(db.pool())
        .segment_distribution(auth.tenant().id)
        .await
        .map_err(ServiceError::Internal)?;

    Ok(Json(DataResponse::success(
        format!("Segment distribution for {}", auth.tenant_name()),
        distribution,
        None,
    )))
}

pub async fn recompute_segments_handler(
    admin: RequireAdmin,
    db: &State<Database>,
    config: &State<ConfigManager>,
) -> ApiResult<ActionResponse> {
    let RequireAdmin(auth) = admin;
    let thresholds = SegmentThresholds::from(&config.analytics);

    let classified = AnalyticsService::new(db.pool())
        .recompute_segments(auth.tenant().id, Utc::now(), &thresholds)
        .await
        .map_err(ServiceError::Internal)?;

    info!(
        "User {} recomputed segments for tenant {}",
        auth.email(),
        auth.tenant_name()
    );

    Ok(Json(
        ActionResponse::success(
            format!("Classified {} users", classified),
            "recomputed".to_string(),
            None,
        )
        .with_next_actions(vec!["GET /analytics/segments".to_string()]),
    ))
}

pub async fn user_activity_handler(
    user_id: i64,
    admin: RequireAdmin,
    db: &State<Database>,
) -> ApiResult<DataResponse<UserActivity>> {
    let RequireAdmin(auth) = admin;
    UserRepository::new(db.pool())
        .find_by_id(user_id)
        .await
        .map_err(ServiceError::Internal)?
        .filter(|user| user.tenant_id == auth.tenant().id)
        .ok_or_else(|| ServiceError::not_found(format!("User {}", user_id)))?;

    let analytics = AnalyticsService::new(db.pool());
    let segment = analytics
        .user_segment(user_id)
        .await
        .map_err(ServiceError::Internal)?;
    let stages = analytics
        .stages_for_user(user_id)
        .await
        .map_err(ServiceError::Internal)?
        .into_iter()
        .map(|(stage, reached_at)| StageReached { stage, reached_at })
        .collect();
    let recent_events = analytics
        .recent_events(user_id, RECENT_EVENT_LIMIT)
        .await
        .map_err(ServiceError::Internal)?;

    Ok(Json(DataResponse::success(
        format!("Activity for user {}", user_id),
        UserActivity {
            user_id,
            segment,
            stages,
            recent_events,
        },
        None,
    )))
}

pub async fn cache_stats_handler(
    _admin: RequireAdmin,
    cache: &State<TtlCache>,
) -> Json<DataResponse<CacheStats>> {
    let stats = cache.stats().await;
    Json(DataResponse::success(
        format!("{} cached entries", stats.entries),
        stats,
        None,
    ))
}
