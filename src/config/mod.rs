//! Application configuration loaded from environment variables.
//!
//! Required settings fail fast with the full list of missing keys. Connector
//! and advisor sections are optional as a whole: an absent section is only an
//! error when an endpoint that needs it is called.

use std::env;

use regex::Regex;

/// Configuration failure with the exact keys that need attention.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required settings: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Longest day span accepted for thresholds and history windows.
pub const MAX_DAYS: i64 = 3650;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub tenant_id: String,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub redis_url: Option<String>,
    pub cache_ttl_secs: u64,
    pub waste_threshold_days: i64,
    pub snapshot_window_days: i64,
    pub sync_interval_secs: u64,
    pub sku_catalog_path: Option<String>,
    pub tables: TableNames,
    pub graph: Section<GraphSettings>,
    pub atlassian: Section<AtlassianSettings>,
    pub advisor: Section<AdvisorSettings>,
}

/// Table name per stored entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct TableNames {
    pub snapshots: String,
    pub skus: String,
    pub atlassian_users: String,
    pub atlassian_licenses: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            snapshots: "user_snapshots".to_string(),
            skus: "tenant_skus".to_string(),
            atlassian_users: "atlassian_users".to_string(),
            atlassian_licenses: "atlassian_licenses".to_string(),
        }
    }
}

/// An optional configuration section: either fully present or missing keys.
#[derive(Debug, Clone)]
pub enum Section<T> {
    Ready(T),
    Missing(Vec<String>),
}

impl<T> Section<T> {
    /// Borrow the settings, or report which keys are missing.
    pub fn get(&self) -> Result<&T, ConfigError> {
        match self {
            Section::Ready(settings) => Ok(settings),
            Section::Missing(keys) => Err(ConfigError::Missing(keys.clone())),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Section::Ready(_))
    }
}

/// Microsoft Graph client-credentials settings.
#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub client_id: String,
    pub client_secret: String,
    pub api_base_url: String,
    pub authority_url: String,
}

/// Atlassian admin API settings.
#[derive(Debug, Clone)]
pub struct AtlassianSettings {
    pub api_token: String,
    pub org_id: String,
    pub email: String,
    pub api_base_url: String,
}

/// Chat-completions endpoint used for license recommendations.
#[derive(Debug, Clone)]
pub struct AdvisorSettings {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<String> = ["DATABASE_URL", "TENANT_ID"]
            .iter()
            .filter(|key| get(**key).is_none())
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let tables = TableNames {
            snapshots: table_name(&get, "SNAPSHOT_TABLE", "user_snapshots")?,
            skus: table_name(&get, "SKU_TABLE", "tenant_skus")?,
            atlassian_users: table_name(&get, "ATLASSIAN_USER_TABLE", "atlassian_users")?,
            atlassian_licenses: table_name(
                &get,
                "ATLASSIAN_LICENSE_TABLE",
                "atlassian_licenses",
            )?,
        };

        let graph = section(&get, &["GRAPH_CLIENT_ID", "GRAPH_CLIENT_SECRET"], |v| {
            GraphSettings {
                client_id: v[0].clone(),
                client_secret: v[1].clone(),
                api_base_url: get("GRAPH_API_BASE_URL")
                    .unwrap_or_else(|| "https://graph.microsoft.com/v1.0".to_string()),
                authority_url: get("GRAPH_AUTHORITY_URL")
                    .unwrap_or_else(|| "https://login.microsoftonline.com".to_string()),
            }
        });

        let atlassian = section(
            &get,
            &["ATLASSIAN_API_TOKEN", "ATLASSIAN_ORG_ID", "ATLASSIAN_EMAIL"],
            |v| AtlassianSettings {
                api_token: v[0].clone(),
                org_id: v[1].clone(),
                email: v[2].clone(),
                api_base_url: get("ATLASSIAN_API_BASE_URL")
                    .unwrap_or_else(|| "https://api.atlassian.com".to_string()),
            },
        );

        let advisor = section(
            &get,
            &["OPENAI_ENDPOINT", "OPENAI_API_KEY", "OPENAI_DEPLOYMENT"],
            |v| AdvisorSettings {
                endpoint: v[0].clone(),
                api_key: v[1].clone(),
                deployment: v[2].clone(),
            },
        );

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_default(),
            database_max_connections: parsed(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            tenant_id: get("TENANT_ID").unwrap_or_default(),
            host: get("BACKEND_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parsed(&get, "BACKEND_PORT", 3000)?,
            frontend_url: get("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:5173".to_string()),
            redis_url: get("REDIS_URL"),
            cache_ttl_secs: parsed(&get, "CACHE_TTL_SECS", 900)?,
            waste_threshold_days: day_span(&get, "WASTE_THRESHOLD_DAYS", 90)?,
            snapshot_window_days: day_span(&get, "SNAPSHOT_WINDOW_DAYS", 365)?,
            sync_interval_secs: parsed(&get, "SYNC_INTERVAL_SECS", 900)?,
            sku_catalog_path: get("SKU_CATALOG_PATH"),
            tables,
            graph,
            atlassian,
            advisor,
        })
    }
}

fn parsed<F, T>(get: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// A whole number of days in `1..=MAX_DAYS`.
fn day_span<F>(get: &F, key: &str, default: i64) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let days = parsed(get, key, default)?;
    if (1..=MAX_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: format!("{days} is outside 1..={MAX_DAYS}"),
        })
    }
}

/// Table names are interpolated into SQL, so only plain identifiers pass.
fn table_name<F>(get: &F, key: &str, default: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let name = get(key).unwrap_or_else(|| default.to_string());
    let pattern =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
    if pattern.is_match(&name) {
        Ok(name)
    } else {
        Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: format!("'{name}' is not a valid SQL identifier"),
        })
    }
}

fn section<F, T>(get: &F, keys: &[&str], build: impl FnOnce(&[String]) -> T) -> Section<T>
where
    F: Fn(&str) -> Option<String>,
{
    let values: Vec<Option<String>> = keys.iter().map(|key| get(*key)).collect();
    let missing: Vec<String> = keys
        .iter()
        .zip(&values)
        .filter(|(_, value)| value.is_none())
        .map(|(key, _)| key.to_string())
        .collect();

    if missing.is_empty() {
        let values: Vec<String> = values.into_iter().flatten().collect();
        Section::Ready(build(&values))
    } else {
        Section::Missing(missing)
    }
}
