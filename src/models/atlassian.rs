//! Current-state Atlassian records upserted by the Atlassian sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AtlassianUser {
    pub tenant_id: String,
    pub account_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub raw: serde_json::Value,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AtlassianProduct {
    pub tenant_id: String,
    pub product_id: String,
    pub product_name: Option<String>,
    pub product_key: Option<String>,
    pub seats_used: i32,
    pub seat_count: i32,
    pub raw: serde_json::Value,
    pub synced_at: DateTime<Utc>,
}

impl AtlassianProduct {
    /// Seats paid for but not in use.
    pub fn unused_seats(&self) -> i32 {
        (self.seat_count - self.seats_used).max(0)
    }
}
