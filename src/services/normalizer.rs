//! Snapshot normalizer: maps heterogeneous snapshot payloads onto [`CanonicalUser`].
//!
//! Payloads are classified into a small set of known shapes, then every
//! canonical attribute is read through an ordered precedence table of
//! `(layer, path)` candidates. The first present, non-empty value wins.
//! Normalization never fails: a payload that is not a JSON object yields a
//! user with the `"unknown"` id and every optional field empty.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};

use crate::models::snapshot::RawSnapshot;
use crate::models::user::{CanonicalUser, UserStatus, UNKNOWN_USER_ID};

type Object = Map<String, Value>;

/// Where a candidate field is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    /// The `graphData` object written by the Graph sync.
    Graph,
    /// The top level of the payload.
    Root,
}

/// One entry of a precedence table. Paths are dot separated.
pub type Candidate = (Layer, &'static str);

/// Identity keys. The Graph envelope's inner `id` comes first, and the
/// envelope's own `userId` is checked before a bare `id`, so a Graph sync and
/// a manual upload of the same user resolve to the same key.
pub const IDENTITY: &[Candidate] = &[
    (Layer::Graph, "id"),
    (Layer::Root, "account_id"),
    (Layer::Root, "userId"),
    (Layer::Root, "id"),
    (Layer::Root, "userPrincipalName"),
    (Layer::Root, "mail"),
    (Layer::Root, "email"),
];

const DISPLAY_NAME: &[Candidate] = &[
    (Layer::Graph, "displayName"),
    (Layer::Graph, "name"),
    (Layer::Root, "displayName"),
    (Layer::Root, "display_name"),
    (Layer::Root, "name"),
];

const EMAIL: &[Candidate] = &[
    (Layer::Graph, "mail"),
    (Layer::Graph, "userPrincipalName"),
    (Layer::Root, "mail"),
    (Layer::Root, "email"),
    (Layer::Root, "userPrincipalName"),
];

const DEPARTMENT: &[Candidate] = &[(Layer::Graph, "department"), (Layer::Root, "department")];

const JOB_TITLE: &[Candidate] = &[
    (Layer::Graph, "jobTitle"),
    (Layer::Root, "jobTitle"),
    (Layer::Root, "job_title"),
];

const LAST_SIGN_IN: &[Candidate] = &[
    (Layer::Graph, "signInActivity.lastSignInDateTime"),
    (Layer::Graph, "lastSignIn"),
    (Layer::Root, "signInActivity.lastSignInDateTime"),
    (Layer::Root, "lastSignIn"),
    (Layer::Root, "last_active"),
    (Layer::Graph, "signInSessionsValidFromDateTime"),
    (Layer::Root, "signInSessionsValidFromDateTime"),
];

const CREATED_AT: &[Candidate] = &[
    (Layer::Graph, "createdDateTime"),
    (Layer::Root, "createdDateTime"),
    (Layer::Root, "creationDateTime"),
];

const STATUS_LAST_CHANGED: &[Candidate] = &[
    (Layer::Root, "statusLastChanged"),
    (Layer::Graph, "statusLastChanged"),
];

const STATUS: &[Candidate] = &[(Layer::Root, "status"), (Layer::Graph, "status")];

/// Boolean flags where an explicit `false` means the account is disabled.
const ENABLED_FLAGS: &[Candidate] = &[
    (Layer::Graph, "accountEnabled"),
    (Layer::Root, "accountEnabled"),
    (Layer::Graph, "active"),
    (Layer::Root, "active"),
    (Layer::Graph, "isActive"),
    (Layer::Root, "isActive"),
];

const ACCOUNT_STATUS: &[Candidate] = &[(Layer::Root, "account_status")];

const INACTIVE_ACCOUNT_STATUSES: &[&str] = &["inactive", "closed", "deactivated"];

const ASSIGNED_LICENSES: &[Candidate] = &[
    (Layer::Graph, "assignedLicenses"),
    (Layer::Root, "assignedLicenses"),
];

const FLAT_LICENSES: &[Candidate] = &[(Layer::Root, "licenses"), (Layer::Graph, "licenses")];

const LEAVE_DATE: &[Candidate] = &[
    (Layer::Graph, "employeeLeaveDateTime"),
    (Layer::Root, "employeeLeaveDateTime"),
];

const LEAVE_FLAGS: &[Candidate] = &[
    (Layer::Graph, "onLeave"),
    (Layer::Root, "onLeave"),
    (Layer::Graph, "leaveOfAbsence"),
    (Layer::Root, "leaveOfAbsence"),
    (Layer::Graph, "customOnLeave"),
    (Layer::Root, "customOnLeave"),
    (
        Layer::Graph,
        "customSecurityAttributes.AdditionalProperties.Workday.onLeave",
    ),
    (
        Layer::Root,
        "customSecurityAttributes.AdditionalProperties.Workday.onLeave",
    ),
];

/// Top-level keys consumed into canonical fields; everything else lands in `extra`.
const CANONICAL_KEYS: &[&str] = &[
    "id",
    "userId",
    "account_id",
    "userPrincipalName",
    "mail",
    "email",
    "displayName",
    "display_name",
    "name",
    "department",
    "jobTitle",
    "job_title",
    "signInActivity",
    "lastSignIn",
    "last_active",
    "signInSessionsValidFromDateTime",
    "createdDateTime",
    "creationDateTime",
    "statusLastChanged",
    "status",
    "assignedLicenses",
    "licenses",
];

/// Snapshot bookkeeping fields that are neither canonical nor source attributes.
const ENVELOPE_KEYS: &[&str] = &["graphData", "tenantId", "timestamp"];

/// Known payload shapes.
#[derive(Debug, Clone, Copy)]
pub enum SnapshotPayload<'a> {
    /// `{ graphData: {...}, ... }` as written by the Graph sync.
    GraphEnvelope { root: &'a Object, graph: &'a Object },
    /// Graph-like attributes at the top level, as written by the ingestion endpoint.
    Flat(&'a Object),
    /// Atlassian admin API user (`account_id`, `account_status`).
    Atlassian(&'a Object),
    /// Anything that is not a JSON object.
    Malformed,
}

impl<'a> SnapshotPayload<'a> {
    pub fn classify(payload: &'a Value) -> Self {
        let Some(root) = payload.as_object() else {
            return Self::Malformed;
        };
        if let Some(graph) = root.get("graphData").and_then(Value::as_object) {
            return Self::GraphEnvelope { root, graph };
        }
        if root.contains_key("account_id") || root.contains_key("account_status") {
            return Self::Atlassian(root);
        }
        Self::Flat(root)
    }

    fn layer(&self, layer: Layer) -> Option<&'a Object> {
        match (*self, layer) {
            (Self::GraphEnvelope { graph, .. }, Layer::Graph) => Some(graph),
            (Self::GraphEnvelope { root, .. }, Layer::Root) => Some(root),
            (Self::Flat(root) | Self::Atlassian(root), Layer::Root) => Some(root),
            _ => None,
        }
    }

    /// First present, non-empty candidate value.
    pub fn first(&self, table: &[Candidate]) -> Option<&'a Value> {
        table.iter().find_map(|(layer, path)| {
            let object = self.layer(*layer)?;
            lookup(object, path).filter(|value| is_present(value))
        })
    }

    fn all(&self, table: &'static [Candidate]) -> impl Iterator<Item = &'a Value> + 'a {
        let this = *self;
        table.iter().filter_map(move |(layer, path)| {
            let object = this.layer(*layer)?;
            lookup(object, path).filter(|value| is_present(value))
        })
    }

    fn text(&self, table: &[Candidate]) -> Option<String> {
        self.first(table).and_then(as_text)
    }

    fn instant(&self, table: &'static [Candidate]) -> Option<DateTime<Utc>> {
        self.all(table).find_map(|value| value.as_str().and_then(parse_instant))
    }

    /// The object whose leftover attributes make up `extra`.
    fn attributes(&self) -> Option<&'a Object> {
        match *self {
            Self::GraphEnvelope { graph, .. } => Some(graph),
            Self::Flat(root) | Self::Atlassian(root) => Some(root),
            Self::Malformed => None,
        }
    }
}

/// Identity of a raw record: first non-empty identity candidate.
pub fn identity(record: &Value) -> Option<String> {
    SnapshotPayload::classify(record).text(IDENTITY)
}

/// Status signal of a raw record.
pub fn status(record: &Value) -> UserStatus {
    status_of(&SnapshotPayload::classify(record))
}

/// Normalize one stored snapshot.
///
/// `status_last_changed` is seeded from a stored value when it is not later
/// than the snapshot itself, otherwise from the snapshot timestamp. The
/// resolver refines it across a user's ordered history.
pub fn normalize(snapshot: &RawSnapshot) -> CanonicalUser {
    let payload = SnapshotPayload::classify(&snapshot.payload);
    if matches!(payload, SnapshotPayload::Malformed) {
        return CanonicalUser::empty(UNKNOWN_USER_ID, snapshot.captured_at);
    }

    let id = payload
        .text(IDENTITY)
        .unwrap_or_else(|| snapshot.user_id.clone());
    let email = payload.text(EMAIL);
    let domain = email.as_deref().and_then(domain_of);

    let status_last_changed = payload
        .instant(STATUS_LAST_CHANGED)
        .filter(|stored| *stored <= snapshot.captured_at)
        .unwrap_or(snapshot.captured_at);

    CanonicalUser {
        id,
        display_name: payload.text(DISPLAY_NAME),
        email,
        domain,
        status: status_of(&payload),
        department: payload.text(DEPARTMENT),
        job_title: payload.text(JOB_TITLE),
        licenses: licenses_of(&payload),
        last_sign_in: payload.instant(LAST_SIGN_IN),
        created_at: payload.instant(CREATED_AT),
        status_last_changed,
        on_leave: on_leave(&payload),
        extra: extra_of(&payload),
    }
}

fn status_of(payload: &SnapshotPayload<'_>) -> UserStatus {
    let disabled = payload
        .all(ENABLED_FLAGS)
        .any(|flag| flag.as_bool() == Some(false));
    let closed = payload
        .all(ACCOUNT_STATUS)
        .filter_map(Value::as_str)
        .any(|s| {
            INACTIVE_ACCOUNT_STATUSES
                .iter()
                .any(|closed| s.trim().eq_ignore_ascii_case(closed))
        });
    let explicit = payload
        .all(STATUS)
        .filter_map(Value::as_str)
        .any(|s| s.trim().eq_ignore_ascii_case("inactive"));

    if disabled || closed || explicit {
        UserStatus::Inactive
    } else {
        UserStatus::Active
    }
}

fn licenses_of(payload: &SnapshotPayload<'_>) -> BTreeSet<String> {
    if let Some(assigned) = payload.first(ASSIGNED_LICENSES).and_then(Value::as_array) {
        return assigned
            .iter()
            .filter_map(|entry| entry.get("skuId").and_then(as_text))
            .collect();
    }
    payload
        .first(FLAT_LICENSES)
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(as_text).collect())
        .unwrap_or_default()
}

fn on_leave(payload: &SnapshotPayload<'_>) -> bool {
    if payload.first(LEAVE_DATE).is_some() {
        return true;
    }
    if payload.all(LEAVE_FLAGS).any(is_truthy) {
        return true;
    }
    // Directory extension attributes: extension_<appId>_onLeave
    [Layer::Graph, Layer::Root]
        .into_iter()
        .filter_map(|layer| payload.layer(layer))
        .flat_map(|object| object.iter())
        .any(|(key, value)| {
            key.starts_with("extension_") && key.ends_with("_onLeave") && is_truthy(value)
        })
}

fn extra_of(payload: &SnapshotPayload<'_>) -> BTreeMap<String, Value> {
    let Some(attributes) = payload.attributes() else {
        return BTreeMap::new();
    };
    attributes
        .iter()
        .filter(|(key, _)| {
            !CANONICAL_KEYS.contains(&key.as_str()) && !ENVELOPE_KEYS.contains(&key.as_str())
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn lookup<'a>(object: &'a Object, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = object.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// RFC 3339 instant, or a bare `YYYY-MM-DD` date taken as UTC midnight.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn domain_of(email: &str) -> Option<String> {
    email
        .split_once('@')
        .map(|(_, domain)| domain.trim())
        .filter(|domain| !domain.is_empty())
        .map(str::to_string)
}
