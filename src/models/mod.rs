//! Database models and DTOs for all domain entities.

pub mod atlassian;
pub mod pagination;
pub mod sku;
pub mod snapshot;
pub mod user;
