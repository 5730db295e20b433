//! Latest-state resolver: collapses a snapshot log into the latest state per
//! user, overall and per UTC calendar day.
//!
//! Resolution is last-write-wins on whole snapshots; fields are never merged
//! across snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

use crate::models::snapshot::RawSnapshot;
use crate::models::user::{CanonicalUser, DailyLatestSnapshot, UserStatus};
use crate::services::normalizer;

/// Inclusive time range applied to snapshot timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The `days` days leading up to `now`; `None` when the start is out of range.
    pub fn trailing(now: DateTime<Utc>, days: i64) -> Option<Self> {
        let start = now.checked_sub_signed(TimeDelta::try_days(days)?)?;
        Some(Self { start, end: now })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    pub fn first_day(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn last_day(&self) -> NaiveDate {
        self.end.date_naive()
    }
}

/// Output of one resolver pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// One entry per user, ordered by stored user id.
    pub latest: Vec<CanonicalUser>,
    /// One entry per `(user, day)`, ordered by day then stored user id.
    pub daily: Vec<DailyLatestSnapshot>,
}

/// Resolve the latest state of every user in `snapshots`.
///
/// Snapshots are grouped by their stored `user_id` and ordered by timestamp;
/// equal timestamps keep input order, so the later input wins. The status
/// clock runs over each user's whole history. A window only limits which
/// snapshots are emitted; users with none inside it are dropped.
pub fn resolve(snapshots: &[RawSnapshot], window: Option<&TimeWindow>) -> Resolution {
    let mut groups: BTreeMap<&str, Vec<&RawSnapshot>> = BTreeMap::new();
    for snapshot in snapshots {
        groups
            .entry(snapshot.user_id.as_str())
            .or_default()
            .push(snapshot);
    }

    let mut latest = Vec::with_capacity(groups.len());
    let mut daily: Vec<(NaiveDate, &str, DailyLatestSnapshot)> = Vec::new();

    for (user_id, mut history) in groups {
        history.sort_by_key(|snapshot| snapshot.captured_at);

        let mut per_day: BTreeMap<NaiveDate, DailyLatestSnapshot> = BTreeMap::new();
        let mut previous: Option<(UserStatus, DateTime<Utc>)> = None;
        let mut last: Option<CanonicalUser> = None;

        for snapshot in history {
            let mut user = normalizer::normalize(snapshot);
            let changed_at = match previous {
                None => user.status_last_changed,
                Some((status, _)) if status != user.status => snapshot.captured_at,
                Some((_, changed_at)) => changed_at,
            };
            user.status_last_changed = changed_at;
            previous = Some((user.status, changed_at));

            if window.is_some_and(|w| !w.contains(snapshot.captured_at)) {
                continue;
            }

            let date = snapshot.captured_at.date_naive();
            per_day.insert(
                date,
                DailyLatestSnapshot {
                    date,
                    timestamp: snapshot.captured_at,
                    user: user.clone(),
                },
            );
            last = Some(user);
        }

        daily.extend(
            per_day
                .into_iter()
                .map(|(date, snapshot)| (date, user_id, snapshot)),
        );
        latest.extend(last);
    }

    daily.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

    Resolution {
        latest,
        daily: daily.into_iter().map(|(_, _, snapshot)| snapshot).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::snapshot::SnapshotSource;
    use serde_json::{json, Value};

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn snap(user_id: &str, at: &str, payload: Value) -> RawSnapshot {
        RawSnapshot {
            id: format!("{user_id}-{at}"),
            tenant_id: "t1".to_string(),
            user_id: user_id.to_string(),
            captured_at: ts(at),
            source: SnapshotSource::Manual,
            payload,
        }
    }

    fn enabled(user_id: &str, at: &str, enabled: bool) -> RawSnapshot {
        snap(user_id, at, json!({ "id": user_id, "accountEnabled": enabled }))
    }

    #[test]
    fn latest_wins_on_status() {
        let snapshots = vec![
            enabled("u1", "2024-01-02T00:00:00Z", false),
            enabled("u1", "2024-01-01T00:00:00Z", true),
        ];
        let resolution = resolve(&snapshots, None);
        assert_eq!(resolution.latest.len(), 1);
        assert_eq!(resolution.latest[0].status, UserStatus::Inactive);
    }

    #[test]
    fn resolution_is_idempotent() {
        let snapshots = vec![
            enabled("u1", "2024-01-01T08:00:00Z", true),
            enabled("u2", "2024-01-01T09:00:00Z", true),
            enabled("u1", "2024-01-03T08:00:00Z", false),
            snap("u3", "2024-01-02T08:00:00Z", json!("garbage")),
        ];
        assert_eq!(resolve(&snapshots, None), resolve(&snapshots, None));
    }

    #[test]
    fn one_daily_entry_per_user_and_day_with_max_timestamp() {
        let snapshots = vec![
            enabled("u1", "2024-01-01T08:00:00Z", true),
            enabled("u1", "2024-01-01T20:00:00Z", false),
            enabled("u1", "2024-01-01T12:00:00Z", true),
            enabled("u1", "2024-01-02T01:00:00Z", false),
            enabled("u2", "2024-01-01T05:00:00Z", true),
        ];
        let daily = resolve(&snapshots, None).daily;
        assert_eq!(daily.len(), 3);

        let u1_first_day = daily
            .iter()
            .find(|d| d.user.id == "u1" && d.date == NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
            .unwrap();
        assert_eq!(u1_first_day.timestamp, ts("2024-01-01T20:00:00Z"));
        assert_eq!(u1_first_day.user.status, UserStatus::Inactive);

        let days: Vec<_> = daily.iter().map(|d| d.date.to_string()).collect();
        assert_eq!(days, vec!["2024-01-01", "2024-01-01", "2024-01-02"]);
    }

    #[test]
    fn equal_timestamps_keep_the_later_input() {
        let snapshots = vec![
            snap("u1", "2024-01-01T00:00:00Z", json!({ "id": "u1", "department": "A" })),
            snap("u1", "2024-01-01T00:00:00Z", json!({ "id": "u1", "department": "B" })),
        ];
        let resolution = resolve(&snapshots, None);
        assert_eq!(resolution.latest[0].department.as_deref(), Some("B"));
        assert_eq!(resolution.daily.len(), 1);
    }

    #[test]
    fn status_last_changed_advances_only_on_flips() {
        let snapshots = vec![
            enabled("u1", "2024-01-01T00:00:00Z", true),
            enabled("u1", "2024-01-02T00:00:00Z", true),
            enabled("u1", "2024-01-03T00:00:00Z", false),
            enabled("u1", "2024-01-04T00:00:00Z", false),
        ];
        let daily = resolve(&snapshots, None).daily;
        let changes: Vec<_> = daily.iter().map(|d| d.user.status_last_changed).collect();
        assert_eq!(
            changes,
            vec![
                ts("2024-01-01T00:00:00Z"),
                ts("2024-01-01T00:00:00Z"),
                ts("2024-01-03T00:00:00Z"),
                ts("2024-01-03T00:00:00Z"),
            ]
        );
        assert!(changes.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn first_snapshot_seeds_from_stored_change() {
        let snapshots = vec![snap(
            "u1",
            "2024-01-05T00:00:00Z",
            json!({ "id": "u1", "status": "Inactive", "statusLastChanged": "2024-01-02T00:00:00Z" }),
        )];
        let latest = resolve(&snapshots, None).latest;
        assert_eq!(latest[0].status_last_changed, ts("2024-01-02T00:00:00Z"));
    }

    #[test]
    fn window_excludes_users_without_snapshots_inside() {
        let snapshots = vec![
            enabled("old", "2023-01-01T00:00:00Z", true),
            enabled("u1", "2023-12-31T00:00:00Z", true),
            enabled("u1", "2024-01-02T00:00:00Z", false),
        ];
        let window = TimeWindow {
            start: ts("2024-01-01T00:00:00Z"),
            end: ts("2024-01-31T00:00:00Z"),
        };

        let windowed = resolve(&snapshots, Some(&window));
        assert_eq!(windowed.latest.len(), 1);
        assert_eq!(windowed.latest[0].id, "u1");
        assert_eq!(windowed.daily.len(), 1);

        let unwindowed = resolve(&snapshots, None);
        assert_eq!(unwindowed.latest.len(), 2);
    }

    #[test]
    fn status_clock_spans_history_before_the_window() {
        let snapshots = vec![
            enabled("u1", "2023-01-01T00:00:00Z", true),
            enabled("u1", "2023-01-02T00:00:00Z", false),
            enabled("u1", "2024-01-01T00:00:00Z", false),
            enabled("u1", "2024-01-02T00:00:00Z", false),
        ];
        let window = TimeWindow {
            start: ts("2024-01-01T00:00:00Z"),
            end: ts("2024-01-02T23:59:59Z"),
        };

        let windowed = resolve(&snapshots, Some(&window));
        assert_eq!(windowed.daily.len(), 2);
        assert!(windowed
            .daily
            .iter()
            .all(|d| d.user.status_last_changed == ts("2023-01-02T00:00:00Z")));
        assert_eq!(
            windowed.latest[0].status_last_changed,
            resolve(&snapshots, None).latest[0].status_last_changed
        );

        let trends = crate::services::trends::compute(
            &windowed.daily,
            window.first_day(),
            window.last_day(),
        );
        assert_eq!(trends.len(), 2);
        assert!(trends.iter().all(|point| point.offboarded_users == 0));
    }

    #[test]
    fn flip_inside_the_window_is_reported_on_its_day() {
        let snapshots = vec![
            enabled("u1", "2023-06-01T00:00:00Z", true),
            enabled("u1", "2024-01-02T09:00:00Z", false),
        ];
        let window = TimeWindow {
            start: ts("2024-01-01T00:00:00Z"),
            end: ts("2024-01-03T00:00:00Z"),
        };
        let windowed = resolve(&snapshots, Some(&window));
        assert_eq!(windowed.daily.len(), 1);
        assert_eq!(
            windowed.daily[0].user.status_last_changed,
            ts("2024-01-02T09:00:00Z")
        );

        let trends = crate::services::trends::compute(
            &windowed.daily,
            window.first_day(),
            window.last_day(),
        );
        let offboarded: Vec<_> = trends.iter().map(|p| p.offboarded_users).collect();
        assert_eq!(offboarded, vec![0, 1, 0]);
    }

    #[test]
    fn trailing_window_rejects_out_of_range_spans() {
        assert!(TimeWindow::trailing(Utc::now(), 100_000_000).is_none());
        assert!(TimeWindow::trailing(Utc::now(), i64::MAX).is_none());
        assert!(TimeWindow::trailing(Utc::now(), 3650).is_some());
    }

    #[test]
    fn trailing_window_bounds() {
        let now = ts("2024-06-30T12:00:00Z");
        let window = TimeWindow::trailing(now, 365).unwrap();
        assert!(window.contains(now));
        assert!(window.contains(ts("2023-07-01T12:00:00Z")));
        assert!(!window.contains(ts("2023-07-01T11:59:59Z")));
        assert_eq!(window.last_day(), now.date_naive());
    }

    #[test]
    fn empty_log_resolves_to_nothing() {
        assert_eq!(resolve(&[], None), Resolution::default());
    }
}
