//! Canonical user model shared by the resolver, trend and cost services.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier used when a payload carries no usable identity at all.
pub const UNKNOWN_USER_ID: &str = "unknown";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

impl UserStatus {
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::Inactive => write!(f, "Inactive"),
        }
    }
}

/// Source-agnostic user record derived from one snapshot.
///
/// Only the named fields are contractual. Everything else the source sent is
/// kept in `extra`, untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalUser {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub domain: Option<String>,
    pub status: UserStatus,
    pub department: Option<String>,
    pub job_title: Option<String>,
    pub licenses: BTreeSet<String>,
    pub last_sign_in: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub status_last_changed: DateTime<Utc>,
    pub on_leave: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl CanonicalUser {
    /// A record with nothing but an id and a timestamp.
    pub fn empty(id: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            email: None,
            domain: None,
            status: UserStatus::Active,
            department: None,
            job_title: None,
            licenses: BTreeSet::new(),
            last_sign_in: None,
            created_at: None,
            status_last_changed: observed_at,
            on_leave: false,
            extra: BTreeMap::new(),
        }
    }

    pub fn license_count(&self) -> usize {
        self.licenses.len()
    }
}

/// Latest snapshot of one user on one UTC calendar day, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLatestSnapshot {
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub user: CanonicalUser,
}
