// src/analytics/engagement.rs
//! DAU / WAU / MAU and daily active-user series

use super::AnalyticsService;
use crate::error::{ServiceError, ServiceResult};
use crate::utils::round2;
use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

pub const MAX_SERIES_DAYS: i64 = 90;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EngagementSnapshot {
    pub as_of: DateTime<Utc>,
    pub dau: i64,
    pub wau: i64,
    pub mau: i64,
    /// DAU / MAU, zero when nobody was active in the month
    pub stickiness: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyActive {
    pub date: NaiveDate,
    pub active_users: i64,
}

pub fn stickiness(dau: i64, mau: i64) -> f64 {
    if mau <= 0 {
        0.0
    } else {
        round2(dau as f64 / mau as f64)
    }
}

/// Count distinct users per UTC day for `days` consecutive days starting at `first_day`
pub fn bucket_daily_active(
    activity: &[(i64, DateTime<Utc>)],
    first_day: NaiveDate,
    days: i64,
) -> Vec<DailyActive> {
    let mut buckets: BTreeMap<NaiveDate, HashSet<i64>> = (0..days)
        .map(|offset| (first_day + Duration::days(offset), HashSet::new()))
        .collect();

    for (user_id, at) in activity {
        if let Some(users) = buckets.get_mut(&at.date_naive()) {
            users.insert(*user_id);
        }
    }

    buckets
        .into_iter()
        .map(|(date, users)| DailyActive {
            date,
            active_users: users.len() as i64,
        })
        .collect()
}

impl<'a> AnalyticsService<'a> {
    /// Distinct active users in the window (as_of - window, as_of]
    pub async fn active_users(
        &self,
        tenant_id: i64,
        as_of: DateTime<Utc>,
        window: Duration,
    ) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(DISTINCT user_id)
            FROM user_events
            WHERE tenant_id = ? AND occurred_at > ? AND occurred_at <= ?
            "#,
        )
        .bind(tenant_id)
        .bind(as_of - window)
        .bind(as_of)
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }

    pub async fn engagement(
        &self,
        tenant_id: i64,
        as_of: DateTime<Utc>,
    ) -> Result<EngagementSnapshot> {
        let dau = self.active_users(tenant_id, as_of, Duration::days(1)).await?;
        let wau = self.active_users(tenant_id, as_of, Duration::days(7)).await?;
        let mau = self.active_users(tenant_id, as_of, Duration::days(30)).await?;

        Ok(EngagementSnapshot {
            as_of,
            dau,
            wau,
            mau,
            stickiness: stickiness(dau, mau),
        })
    }

    /// One point per UTC calendar day ending with the day of `as_of`, oldest first
    pub async fn daily_active_series(
        &self,
        tenant_id: i64,
        days: i64,
        as_of: DateTime<Utc>,
    ) -> ServiceResult<Vec<DailyActive>> {
        if !(1..=MAX_SERIES_DAYS).contains(&days) {
            return Err(ServiceError::validation(format!(
                "days must be between 1 and {}",
                MAX_SERIES_DAYS
            )));
        }

        let first_day = as_of.date_naive() - Duration::days(days - 1);
        let window_start = first_day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();

        let activity = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            r#"
            SELECT user_id, occurred_at
            FROM user_events
            WHERE tenant_id = ? AND occurred_at >= ? AND occurred_at <= ?
            "#,
        )
        .bind(tenant_id)
        .bind(window_start)
        .bind(as_of)
        .fetch_all(self.pool())
        .await?;

        Ok(bucket_daily_active(&activity, first_day, days))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use chrono::TimeZone;

    #[test]
    fn test_bucket_daily_active_counts_distinct_users() {
        let day = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap();
        let activity = vec![
            (1, day(1, 9)),
            (1, day(1, 18)),
            (2, day(1, 10)),
            (1, day(3, 8)),
            (3, day(5, 8)),
        ];
        let first = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let series = bucket_daily_active(&activity, first, 3);
        let counts: Vec<i64> = series.iter().map(|d| d.active_users).collect();
        assert_eq!(counts, vec![2, 0, 1]);
        assert_eq!(series[2].date, NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
    }

    #[test]
    fn test_stickiness() {
        assert_eq!(stickiness(5, 20), 0.25);
        assert_eq!(stickiness(3, 0), 0.0);
    }

    #[tokio::test]
    async fn test_engagement_windows() {
        let (db, tenant_id) = db_with_tenant().await;
        let a = add_user(&db, tenant_id, "a@acme.io").await;
        let b = add_user(&db, tenant_id, "b@acme.io").await;
        let c = add_user(&db, tenant_id, "c@acme.io").await;
        let analytics = AnalyticsService::new(db.pool());

        let as_of = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();
        let at = |hours: i64| as_of - Duration::hours(hours);

        for (user, hours_ago) in [(a, 1), (a, 30), (b, 3 * 24), (c, 20 * 24), (c, 40 * 24)] {
            analytics
                .track_at(tenant_id, user, "job_viewed", serde_json::Value::Null, at(hours_ago))
                .await
                .unwrap();
        }

        let snapshot = analytics.engagement(tenant_id, as_of).await.unwrap();
        assert_eq!(snapshot.dau, 1);
        assert_eq!(snapshot.wau, 2);
        assert_eq!(snapshot.mau, 3);
        assert_eq!(snapshot.stickiness, 0.33);

        let other_tenant = analytics.engagement(tenant_id + 1, as_of).await.unwrap();
        assert_eq!(other_tenant.mau, 0);
    }

    #[tokio::test]
    async fn test_series_bounds() {
        let (db, tenant_id) = db_with_tenant().await;
        let analytics = AnalyticsService::new(db.pool());

        assert!(analytics.daily_active_series(tenant_id, 0, Utc::now()).await.is_err());
        assert!(analytics.daily_active_series(tenant_id, 91, Utc::now()).await.is_err());

        let series = analytics.daily_active_series(tenant_id, 7, Utc::now()).await.unwrap();
        assert_eq!(series.len(), 7);
        assert_eq!(series[6].date, Utc::now().date_naive());
    }
}
