//! Daily cohort metrics derived from per-day latest snapshots.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::user::{DailyLatestSnapshot, UserStatus};

/// One calendar day's aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub new_users: u32,
    pub offboarded_users: u32,
    pub total_licenses: u32,
}

impl TrendPoint {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            ..Self::default()
        }
    }
}

/// Compute one [`TrendPoint`] per day in `[from, to]`, zero-filled.
///
/// Each daily snapshot contributes only to the day it was captured on.
/// Returns an empty sequence when `to < from`.
pub fn compute(daily: &[DailyLatestSnapshot], from: NaiveDate, to: NaiveDate) -> Vec<TrendPoint> {
    if to < from {
        return Vec::new();
    }

    let mut points: BTreeMap<NaiveDate, TrendPoint> = from
        .iter_days()
        .take_while(|day| *day <= to)
        .map(|day| (day, TrendPoint::empty(day)))
        .collect();

    for snapshot in daily {
        let Some(point) = points.get_mut(&snapshot.date) else {
            continue;
        };
        let user = &snapshot.user;

        if user
            .created_at
            .is_some_and(|created| created.date_naive() == snapshot.date)
        {
            point.new_users += 1;
        }
        match user.status {
            UserStatus::Inactive => {
                if user.status_last_changed.date_naive() == snapshot.date {
                    point.offboarded_users += 1;
                }
            }
            UserStatus::Active => {
                point.total_licenses += user.license_count() as u32;
            }
        }
    }

    points.into_values().collect()
}
