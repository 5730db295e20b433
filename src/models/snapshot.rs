//! Append-only snapshot records as stored in the snapshot table.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "snapshot_source", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SnapshotSource {
    Graph,
    Atlassian,
    Manual,
}

impl std::fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Graph => write!(f, "graph"),
            Self::Atlassian => write!(f, "atlassian"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// One ingestion event for one user at one instant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RawSnapshot {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub captured_at: DateTime<Utc>,
    pub source: SnapshotSource,
    pub payload: serde_json::Value,
}

/// A snapshot ready to be appended.
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub tenant_id: String,
    pub user_id: String,
    pub captured_at: DateTime<Utc>,
    pub source: SnapshotSource,
    pub payload: serde_json::Value,
}

impl NewSnapshot {
    /// Deterministic row id for the `(tenant, user, instant)` append key.
    pub fn id(&self) -> String {
        snapshot_id(&self.tenant_id, &self.user_id, self.captured_at)
    }

    /// The row as it reads back from the store.
    pub fn into_raw(self) -> RawSnapshot {
        RawSnapshot {
            id: self.id(),
            tenant_id: self.tenant_id,
            user_id: self.user_id,
            captured_at: self.captured_at,
            source: self.source,
            payload: self.payload,
        }
    }
}

/// SHA-256 over the append key, hex encoded.
pub fn snapshot_id(tenant_id: &str, user_id: &str, captured_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tenant_id.as_bytes());
    hasher.update(b"|");
    hasher.update(user_id.as_bytes());
    hasher.update(b"|");
    hasher.update(
        captured_at
            .to_rfc3339_opts(SecondsFormat::Nanos, true)
            .as_bytes(),
    );
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn snapshot_id_is_stable_for_same_key() {
        let a = snapshot_id("t1", "u1", ts("2024-01-01T00:00:00Z"));
        let b = snapshot_id("t1", "u1", ts("2024-01-01T00:00:00Z"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn snapshot_id_differs_per_instant_and_tenant() {
        let base = snapshot_id("t1", "u1", ts("2024-01-01T00:00:00Z"));
        assert_ne!(base, snapshot_id("t1", "u1", ts("2024-01-01T00:00:01Z")));
        assert_ne!(base, snapshot_id("t2", "u1", ts("2024-01-01T00:00:00Z")));
    }

    #[test]
    fn source_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SnapshotSource::Graph).unwrap(),
            "\"graph\""
        );
        assert_eq!(SnapshotSource::Manual.to_string(), "manual");
    }
}
