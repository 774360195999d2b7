// src/analytics/segments.rs
//! Behavioral segmentation recomputed from recent activity counts

use super::AnalyticsService;
use crate::accounts::{TenantRepository, UserRepository};
use crate::core::config_manager::AnalyticsSettings;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Segment {
    PowerUser,
    ActiveUser,
    CasualUser,
    NewUser,
    DormantUser,
}

impl Segment {
    pub const ALL: [Segment; 5] = [
        Segment::PowerUser,
        Segment::ActiveUser,
        Segment::CasualUser,
        Segment::NewUser,
        Segment::DormantUser,
    ];
}

#[derive(Debug, Clone, Copy)]
pub struct SegmentThresholds {
    pub power_weekly_events: i64,
    pub active_weekly_events: i64,
    pub new_user_days: i64,
}

impl Default for SegmentThresholds {
    fn default() -> Self {
        Self::from(&AnalyticsSettings::default())
    }
}

impl From<&AnalyticsSettings> for SegmentThresholds {
    fn from(settings: &AnalyticsSettings) -> Self {
        Self {
            power_weekly_events: settings.power_user_weekly_events,
            active_weekly_events: settings.active_user_weekly_events,
            new_user_days: settings.new_user_days,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSegment {
    pub user_id: i64,
    pub tenant_id: i64,
    pub segment: Segment,
    pub events_7d: i64,
    pub events_30d: i64,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SegmentCount {
    pub segment: Segment,
    pub users: i64,
}

/// Rules are checked top to bottom; heavy use outranks account age
pub fn classify(
    events_7d: i64,
    events_30d: i64,
    account_age: Duration,
    thresholds: &SegmentThresholds,
) -> Segment {
    if events_7d >= thresholds.power_weekly_events {
        Segment::PowerUser
    } else if account_age < Duration::days(thresholds.new_user_days) {
        Segment::NewUser
    } else if events_7d >= thresholds.active_weekly_events {
        Segment::ActiveUser
    } else if events_30d >= 1 {
        Segment::CasualUser
    } else {
        Segment::DormantUser
    }
}

impl<'a> AnalyticsService<'a> {
    async fn event_counts_since(
        &self,
        tenant_id: i64,
        since: DateTime<Utc>,
        as_of: DateTime<Utc>,
    ) -> Result<HashMap<i64, i64>> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT user_id, COUNT(*)
            FROM user_events
            WHERE tenant_id = ? AND occurred_at > ? AND occurred_at <= ?
            GROUP BY user_id
            "#,
        )
        .bind(tenant_id)
        .bind(since)
        .bind(as_of)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().collect())
    }

    /// Rewrite the segment table for one tenant, returning how many users were classified
    pub async fn recompute_segments(
        &self,
        tenant_id: i64,
        as_of: DateTime<Utc>,
        thresholds: &SegmentThresholds,
    ) -> Result<usize> {
        let users = UserRepository::new(self.pool())
            .list_ids_by_tenant(tenant_id)
            .await?;
        let weekly = self
            .event_counts_since(tenant_id, as_of - Duration::days(7), as_of)
            .await?;
        let monthly = self
            .event_counts_since(tenant_id, as_of - Duration::days(30), as_of)
            .await?;

        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM user_segments WHERE tenant_id = ?")
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

        for (user_id, created_at) in &users {
            let events_7d = weekly.get(user_id).copied().unwrap_or(0);
            let events_30d = monthly.get(user_id).copied().unwrap_or(0);
            let segment = classify(events_7d, events_30d, as_of - *created_at, thresholds);

            sqlx::query(
                r#"
                INSERT INTO user_segments (user_id, tenant_id, segment, events_7d, events_30d, computed_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(user_id)
            .bind(tenant_id)
            .bind(segment)
            .bind(events_7d)
            .bind(events_30d)
            .bind(as_of)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.context("Failed to commit segment recompute")?;

        info!("Recomputed segments for {} users in tenant {}", users.len(), tenant_id);
        Ok(users.len())
    }

    pub async fn recompute_all_segments(
        &self,
        as_of: DateTime<Utc>,
        thresholds: &SegmentThresholds,
    ) -> Result<usize> {
        let tenants = TenantRepository::new(self.pool()).list_active().await?;
        let mut total = 0;
        for tenant in tenants {
            total += self.recompute_segments(tenant.id, as_of, thresholds).await?;
        }
        Ok(total)
    }

    /// User count per segment, every segment listed even when empty
    pub async fn segment_distribution(&self, tenant_id: i64) -> Result<Vec<SegmentCount>> {
        let rows = sqlx::query_as::<_, (Segment, i64)>(
            "SELECT segment, COUNT(*) FROM user_segments WHERE tenant_id = ? GROUP BY segment",
        )
        .bind(tenant_id)
        .fetch_all(self.pool())
        .await?;

        let counts: HashMap<Segment, i64> = rows.into_iter().collect();
        Ok(Segment::ALL
            .iter()
            .map(|segment| SegmentCount {
                segment: *segment,
                users: counts.get(segment).copied().unwrap_or(0),
            })
            .collect())
    }

    pub async fn user_segment(&self, user_id: i64) -> Result<Option<UserSegment>> {
        let segment = sqlx::query_as::<_, UserSegment>(
            r#"
            SELECT user_id, tenant_id, segment, events_7d, events_30d, computed_at
            FROM user_segments
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(segment)
    }
}

/// Periodically recompute segments for every active tenant
pub fn spawn_segment_refresher(
    pool: SqlitePool,
    thresholds: SegmentThresholds,
    every: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let analytics = AnalyticsService::new(&pool);
            match analytics.recompute_all_segments(Utc::now(), &thresholds).await {
                Ok(count) => info!("Segment refresh classified {} users", count),
                Err(e) => error!("Segment refresh failed: {:#}", e),
            }
        }
    })
}
