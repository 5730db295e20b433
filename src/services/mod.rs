//! Business logic services.

pub mod analytics;
pub mod atlassian;
pub mod cache;
pub mod ingestion;
pub mod normalizer;
pub mod recommendation;
pub mod resolver;
pub mod sku;
pub mod snapshot_store;
pub mod sync;
pub mod trends;
pub mod users;
