//! Route definitions for the Seatscope API.

pub mod analytics;
pub mod atlassian;
pub mod health;
pub mod recommendations;
pub mod skus;
pub mod snapshots;
pub mod sync;
pub mod users;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Ingestion batches can carry a full tenant export.
const BODY_LIMIT_BYTES: usize = 20 * 1024 * 1024;

fn cors(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE]);
    match frontend_url.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            tracing::warn!(frontend_url, error = %e, "Invalid FRONTEND_URL, CORS origin not set");
            layer
        }
    }
}

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/users", get(users::list))
        .route("/snapshots", get(snapshots::history).post(snapshots::ingest))
        .route("/analytics/costs", get(analytics::costs))
        .route("/sync/graph", post(sync::graph))
        .route("/sync/atlassian/users", post(sync::atlassian_users))
        .route("/sync/atlassian/licenses", post(sync::atlassian_licenses))
        .route("/atlassian/users", get(atlassian::users))
        .route("/atlassian/licenses", get(atlassian::licenses))
        .route("/skus", get(skus::list))
        .route("/recommendations", post(recommendations::create));

    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors(&state.config.frontend_url))
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::AppConfig;
    use crate::models::sku::SkuCatalog;

    /// State whose pool never connects; routes that reject early never touch it.
    pub(crate) fn test_state() -> AppState {
        let config = AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://seatscope@127.0.0.1:1/seatscope".to_string()),
            "TENANT_ID" => Some("contoso".to_string()),
            _ => None,
        })
        .unwrap();
        let db = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        AppState {
            db,
            config,
            cache: None,
            catalog: Arc::new(SkuCatalog::builtin()),
        }
    }

    /// Drive one request through the full router; a non-JSON body decodes to `Null`.
    pub(crate) async fn send(
        state: AppState,
        method: &str,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if body.is_some() {
            request = request.header("content-type", "application/json");
        }
        let request = request
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = build_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn router_serves_liveness() {
        let response = build_router(test_state())
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_page_size_is_a_validation_envelope() {
        let (status, body) = send(test_state(), "GET", "/api/v1/users?size=abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}
