// src/analytics/mod.rs
//! User behavioral analytics: event tracking, engagement, funnels, retention and segments

pub mod engagement;
pub mod funnel;
pub mod retention;
pub mod segments;

pub use engagement::{DailyActive, EngagementSnapshot};
pub use funnel::{FunnelReport, FunnelStageReport};
pub use retention::{RetentionCohort, RetentionPeriod, RetentionPoint};
pub use segments::{Segment, SegmentCount, SegmentThresholds, UserSegment};

use crate::error::{ServiceError, ServiceResult};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

pub const EVENT_SIGNUP: &str = "signup";
pub const EVENT_PROFILE_COMPLETE: &str = "profile_complete";
pub const EVENT_PROFILE_UPDATED: &str = "profile_updated";
pub const EVENT_SEARCH: &str = "search";
pub const EVENT_JOB_VIEWED: &str = "job_viewed";
pub const EVENT_APPLICATION_SUBMITTED: &str = "application_submitted";
pub const EVENT_INTERVIEW_SCHEDULED: &str = "interview_scheduled";
pub const EVENT_HIRED: &str = "hired";

const MAX_EVENT_TYPE_LEN: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserEvent {
    pub id: i64,
    pub tenant_id: i64,
    pub user_id: i64,
    pub event_type: String,
    #[sqlx(json)]
    pub metadata: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

/// Lifecycle milestones in the order users are expected to reach them
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum FunnelStage {
    Signup,
    ProfileComplete,
    FirstSearch,
    FirstApplication,
    FirstInterview,
    Hired,
}

impl FunnelStage {
    pub const ALL: [FunnelStage; 6] = [
        FunnelStage::Signup,
        FunnelStage::ProfileComplete,
        FunnelStage::FirstSearch,
        FunnelStage::FirstApplication,
        FunnelStage::FirstInterview,
        FunnelStage::Hired,
    ];

    /// The funnel milestone an event type marks, if any
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            EVENT_SIGNUP => Some(FunnelStage::Signup),
            EVENT_PROFILE_COMPLETE => Some(FunnelStage::ProfileComplete),
            EVENT_SEARCH => Some(FunnelStage::FirstSearch),
            EVENT_APPLICATION_SUBMITTED => Some(FunnelStage::FirstApplication),
            EVENT_INTERVIEW_SCHEDULED => Some(FunnelStage::FirstInterview),
            EVENT_HIRED => Some(FunnelStage::Hired),
            _ => None,
        }
    }
}

fn validate_event_type(event_type: &str) -> ServiceResult<()> {
    let valid = !event_type.is_empty()
        && event_type.len() <= MAX_EVENT_TYPE_LEN
        && event_type
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.');

    if valid {
        Ok(())
    } else {
        Err(ServiceError::validation(format!(
            "Invalid event type '{}': use lowercase letters, digits, '_' or '.' (max {} chars)",
            event_type, MAX_EVENT_TYPE_LEN
        )))
    }
}

pub struct AnalyticsService<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AnalyticsService<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &'a SqlitePool {
        self.pool
    }

    /// Record an event now, advancing the user's funnel when the event marks a milestone
    pub async fn track(
        &self,
        tenant_id: i64,
        user_id: i64,
        event_type: &str,
        metadata: serde_json::Value,
    ) -> ServiceResult<UserEvent> {
        self.track_at(tenant_id, user_id, event_type, metadata, Utc::now())
            .await
    }

    pub async fn track_at(
        &self,
        tenant_id: i64,
        user_id: i64,
        event_type: &str,
        metadata: serde_json::Value,
        occurred_at: DateTime<Utc>,
    ) -> ServiceResult<UserEvent> {
        validate_event_type(event_type)?;

        let metadata = if metadata.is_null() {
            serde_json::json!({})
        } else {
            metadata
        };

        let result = sqlx::query(
            r#"
            INSERT INTO user_events (tenant_id, user_id, event_type, metadata, occurred_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(event_type)
        .bind(sqlx::types::Json(&metadata))
        .bind(occurred_at)
        .execute(self.pool)
        .await?;

        if let Some(stage) = FunnelStage::from_event_type(event_type) {
            self.record_stage(tenant_id, user_id, stage, occurred_at)
                .await?;
        }

        debug!("Tracked {} for user {} (tenant {})", event_type, user_id, tenant_id);

        Ok(UserEvent {
            id: result.last_insert_rowid(),
            tenant_id,
            user_id,
            event_type: event_type.to_string(),
            metadata,
            occurred_at,
        })
    }

    /// Mark a funnel stage; the earliest timestamp wins so repeats are harmless
    pub async fn record_stage(
        &self,
        tenant_id: i64,
        user_id: i64,
        stage: FunnelStage,
        at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_funnel_stages (user_id, tenant_id, stage, reached_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (user_id, stage) DO UPDATE SET
                reached_at = CASE
                    WHEN excluded.reached_at < user_funnel_stages.reached_at
                    THEN excluded.reached_at
                    ELSE user_funnel_stages.reached_at
                END
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(stage)
        .bind(at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn stages_for_user(&self, user_id: i64) -> Result<Vec<(FunnelStage, DateTime<Utc>)>> {
        let rows = sqlx::query_as::<_, (FunnelStage, DateTime<Utc>)>(
            "SELECT stage, reached_at FROM user_funnel_stages WHERE user_id = ? ORDER BY reached_at",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn recent_events(&self, user_id: i64, limit: i64) -> Result<Vec<UserEvent>> {
        let events = sqlx::query_as::<_, UserEvent>(
            r#"
            SELECT id, tenant_id, user_id, event_type, metadata, occurred_at
            FROM user_events
            WHERE user_id = ?
            ORDER BY occurred_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(events)
    }
}
