// src/analytics/retention.rs
//! Cohort retention by signup day or week

use super::{AnalyticsService, FunnelStage};
use crate::error::{ServiceError, ServiceResult};
use crate::utils::percentage;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

pub const MAX_PERIODS: i64 = 26;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPeriod {
    Day,
    Week,
}

impl RetentionPeriod {
    pub fn length_days(self) -> i64 {
        match self {
            RetentionPeriod::Day => 1,
            RetentionPeriod::Week => 7,
        }
    }

    /// First day of the period containing `at`; weeks start on Monday
    pub fn start_of(self, at: DateTime<Utc>) -> NaiveDate {
        let date = at.date_naive();
        match self {
            RetentionPeriod::Day => date,
            RetentionPeriod::Week => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
        }
    }
}

impl std::str::FromStr for RetentionPeriod {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" => Ok(RetentionPeriod::Day),
            "week" | "weekly" => Ok(RetentionPeriod::Week),
            other => Err(ServiceError::validation(format!(
                "Unknown retention period '{}': use day or week",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RetentionPoint {
    pub period: i64,
    pub active_users: i64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RetentionCohort {
    pub cohort_start: NaiveDate,
    pub size: i64,
    pub retention: Vec<RetentionPoint>,
}

/// Group users by signup period and measure which share was active k periods later
pub fn build_cohorts(
    signups: &[(i64, DateTime<Utc>)],
    activity: &[(i64, DateTime<Utc>)],
    period: RetentionPeriod,
    periods: i64,
    as_of: DateTime<Utc>,
) -> Vec<RetentionCohort> {
    let length = period.length_days();
    let current_period = period.start_of(as_of);

    let cohort_of: HashMap<i64, NaiveDate> = signups
        .iter()
        .map(|(user, at)| (*user, period.start_of(*at)))
        .collect();

    let mut members: BTreeMap<NaiveDate, HashSet<i64>> = BTreeMap::new();
    for (user, start) in &cohort_of {
        members.entry(*start).or_default().insert(*user);
    }

    let mut active: HashMap<(NaiveDate, i64), HashSet<i64>> = HashMap::new();
    for (user, at) in activity {
        let Some(cohort_start) = cohort_of.get(user) else {
            continue;
        };
        let offset_days = (period.start_of(*at) - *cohort_start).num_days();
        if offset_days < 0 {
            continue;
        }
        let k = offset_days / length;
        if k < periods {
            active.entry((*cohort_start, k)).or_default().insert(*user);
        }
    }

    members
        .into_iter()
        .filter(|(start, _)| *start <= current_period)
        .map(|(cohort_start, users)| {
            let size = users.len() as i64;
            let retention = (0..periods)
                .take_while(|k| cohort_start + Duration::days(k * length) <= current_period)
                .map(|k| {
                    let active_users = active
                        .get(&(cohort_start, k))
                        .map(|set| set.len() as i64)
                        .unwrap_or(0);
                    RetentionPoint {
                        period: k,
                        active_users,
                        percent: percentage(active_users, size),
                    }
                })
                .collect();

            RetentionCohort {
                cohort_start,
                size,
                retention,
            }
        })
        .collect()
}

impl<'a> AnalyticsService<'a> {
    pub async fn retention_cohorts(
        &self,
        tenant_id: i64,
        period: RetentionPeriod,
        periods: i64,
        as_of: DateTime<Utc>,
    ) -> ServiceResult<Vec<RetentionCohort>> {
        if !(1..=MAX_PERIODS).contains(&periods) {
            return Err(ServiceError::validation(format!(
                "periods must be between 1 and {}",
                MAX_PERIODS
            )));
        }

        let earliest = period.start_of(as_of) - Duration::days((periods - 1) * period.length_days());
        let window_start = earliest.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();

        let signups = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            r#"
            SELECT user_id, reached_at
            FROM user_funnel_stages
            WHERE tenant_id = ? AND stage = ? AND reached_at >= ? AND reached_at <= ?
            "#,
        )
        .bind(tenant_id)
        .bind(FunnelStage::Signup)
        .bind(window_start)
        .bind(as_of)
        .fetch_all(self.pool())
        .await?;

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

        Ok(build_cohorts(&signups, &activity, period, periods, as_of))
    }
}
