//! Pagination primitives for the user list endpoint.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Raw `page`/`size` query parameters, validated by [`PageRequest::parse`].
///
/// Kept as strings so a non-numeric value becomes a `VALIDATION_ERROR`
/// envelope instead of axum's plain-text query rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub size: Option<String>,
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            size: Self::DEFAULT_SIZE,
        }
    }
}

impl PageRequest {
    /// Default items per page.
    const DEFAULT_SIZE: usize = 100;

    /// Maximum items per page.
    const MAX_SIZE: usize = 1000;

    pub fn parse(query: &PageQuery) -> Result<Self, AppError> {
        let page = positive("page", query.page.as_deref())?.unwrap_or(1);
        let size = positive("size", query.size.as_deref())?
            .unwrap_or(Self::DEFAULT_SIZE)
            .min(Self::MAX_SIZE);
        Ok(Self { page, size })
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.size)
    }

    /// The items of this page; empty past the end.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.offset())
            .take(self.size)
            .cloned()
            .collect()
    }
}

fn positive(name: &str, raw: Option<&str>) -> Result<Option<usize>, AppError> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<i64>() {
        Ok(value) if value >= 1 => Ok(Some(value as usize)),
        Ok(_) => Err(AppError::Validation(format!("{name} must be >= 1"))),
        Err(_) => Err(AppError::Validation(format!(
            "{name} must be a positive integer, got '{raw}'"
        ))),
    }
}

/// Paged list of users plus the tenant-wide SKU table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedUsers<T: Serialize, S: Serialize> {
    pub users: Vec<T>,
    pub total_count: usize,
    pub skus: Vec<S>,
}
