// src/analytics/funnel.rs
//! Lifecycle funnel: per-stage reach, conversion and time between stages

use super::{AnalyticsService, FunnelStage};
use crate::error::{ServiceError, ServiceResult};
use crate::utils::{percentage, round2};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FunnelStageReport {
    pub stage: FunnelStage,
    pub users: i64,
    pub conversion_from_previous: f64,
    pub conversion_from_start: f64,
    pub avg_hours_from_previous: Option<f64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FunnelReport {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub cohort_size: i64,
    pub stages: Vec<FunnelStageReport>,
}

/// Build the funnel for users whose signup falls in [from, to]
pub fn build_funnel(
    records: &[(i64, FunnelStage, DateTime<Utc>)],
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> FunnelReport {
    let cohort: HashSet<i64> = records
        .iter()
        .filter(|(_, stage, at)| {
            *stage == FunnelStage::Signup
                && from.map_or(true, |from| *at >= from)
                && to.map_or(true, |to| *at <= to)
        })
        .map(|(user, _, _)| *user)
        .collect();

    let mut reached: HashMap<(i64, FunnelStage), DateTime<Utc>> = HashMap::new();
    for (user, stage, at) in records.iter().filter(|(user, _, _)| cohort.contains(user)) {
        reached
            .entry((*user, *stage))
            .and_modify(|existing| {
                if at < existing {
                    *existing = *at;
                }
            })
            .or_insert(*at);
    }

    let count = |stage: FunnelStage| -> i64 {
        cohort
            .iter()
            .filter(|user| reached.contains_key(&(**user, stage)))
            .count() as i64
    };

    let start = count(FunnelStage::Signup);
    let mut stages = Vec::with_capacity(FunnelStage::ALL.len());
    let mut previous: Option<(FunnelStage, i64)> = None;

    for stage in FunnelStage::ALL {
        let users = count(stage);

        let (conversion_from_previous, avg_hours_from_previous) = match previous {
            None => (percentage(users, start), None),
            Some((prev_stage, prev_users)) => {
                let durations: Vec<f64> = cohort
                    .iter()
                    .filter_map(|user| {
                        let prev_at = reached.get(&(*user, prev_stage))?;
                        let at = reached.get(&(*user, stage))?;
                        Some((*at - *prev_at).num_seconds() as f64 / 3600.0)
                    })
                    .collect();

                let avg = if durations.is_empty() {
                    None
                } else {
                    Some(round2(durations.iter().sum::<f64>() / durations.len() as f64))
                };

                (percentage(users, prev_users), avg)
            }
        };

        stages.push(FunnelStageReport {
            stage,
            users,
            conversion_from_previous,
            conversion_from_start: percentage(users, start),
            avg_hours_from_previous,
        });
        previous = Some((stage, users));
    }

    FunnelReport {
        from,
        to,
        cohort_size: cohort.len() as i64,
        stages,
    }
}

impl<'a> AnalyticsService<'a> {
    pub async fn funnel_report(
        &self,
        tenant_id: i64,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> ServiceResult<FunnelReport> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ServiceError::validation("'from' must not be after 'to'"));
            }
        }

        let records = sqlx::query_as::<_, (i64, FunnelStage, DateTime<Utc>)>(
            "SELECT user_id, stage, reached_at FROM user_funnel_stages WHERE tenant_id = ?",
        )
        .bind(tenant_id)
        .fetch_all(self.pool())
        .await?;

        Ok(build_funnel(&records, from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn sample() -> Vec<(i64, FunnelStage, DateTime<Utc>)> {
        use FunnelStage::*;
        vec![
            (1, Signup, t(0)),
            (1, ProfileComplete, t(2)),
            (1, FirstSearch, t(4)),
            (1, FirstApplication, t(10)),
            (2, Signup, t(1)),
            (2, ProfileComplete, t(5)),
            (3, Signup, t(48)),
            (3, FirstSearch, t(50)),
            // no signup record: outside every cohort
            (4, FirstSearch, t(3)),
        ]
    }

    #[test]
    fn test_full_funnel() {
        let report = build_funnel(&sample(), None, None);
        assert_eq!(report.cohort_size, 3);

        let users: Vec<i64> = report.stages.iter().map(|s| s.users).collect();
        assert_eq!(users, vec![3, 2, 2, 1, 0, 0]);

        let profile = &report.stages[1];
        assert_eq!(profile.conversion_from_previous, 66.67);
        assert_eq!(profile.avg_hours_from_previous, Some(3.0));

        // user 3 skipped profile_complete but still counts for first_search
        let search = &report.stages[2];
        assert_eq!(search.conversion_from_previous, 100.0);
        assert_eq!(search.conversion_from_start, 66.67);
        assert_eq!(search.avg_hours_from_previous, Some(2.0));

        let interview = &report.stages[4];
        assert_eq!(interview.conversion_from_previous, 0.0);
        assert_eq!(interview.avg_hours_from_previous, None);

        let hired = &report.stages[5];
        assert_eq!(hired.conversion_from_previous, 0.0);
    }

    #[test]
    fn test_cohort_range() {
        let report = build_funnel(&sample(), Some(t(24)), Some(t(72)));
        assert_eq!(report.cohort_size, 1);
        assert_eq!(report.stages[0].users, 1);
        assert_eq!(report.stages[2].users, 1);
        assert_eq!(report.stages[1].users, 0);
    }

    #[test]
    fn test_empty_funnel() {
        let report = build_funnel(&[], None, None);
        assert_eq!(report.cohort_size, 0);
        assert!(report.stages.iter().all(|s| s.users == 0 && s.conversion_from_start == 0.0));
    }

    #[tokio::test]
    async fn test_report_rejects_inverted_range() {
        let (db, tenant_id) = crate::test_support::db_with_tenant().await;
        let result = AnalyticsService::new(db.pool())
            .funnel_report(tenant_id, Some(t(10)), Some(t(0)))
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }
}
