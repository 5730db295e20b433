//! Licensing recommendations from the configured advisor.

use axum::body::Bytes;
use axum::{extract::State, Json};

use crate::errors::{ApiResponse, AppError};
use crate::services::recommendation::{self, Recommendation, RecommendationRequest};
use crate::AppState;

/// An empty body asks about the tenant's stored users with the default question.
fn parse_request(body: &[u8]) -> Result<RecommendationRequest, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RecommendationRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))
}

/// POST /api/v1/recommendations
pub async fn create(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ApiResponse<Recommendation>>, AppError> {
    let request = parse_request(&body)?;
    let result = recommendation::recommend(&state, request).await?;
    Ok(ApiResponse::success(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::tests::{send, test_state};
    use axum::http::StatusCode;

    #[test]
    fn empty_body_uses_defaults() {
        let request = parse_request(b"  ").unwrap();
        assert!(request.prompt.is_none());
        assert!(request.users.is_none());
    }

    #[test]
    fn body_fields_are_read() {
        let request = parse_request(br#"{ "prompt": "Trim E5?", "users": [{ "id": "u1" }] }"#).unwrap();
        assert_eq!(request.prompt.as_deref(), Some("Trim E5?"));
        assert_eq!(request.users.map(|u| u.len()), Some(1));
    }

    #[tokio::test]
    async fn malformed_body_is_a_validation_envelope() {
        let (status, body) =
            send(test_state(), "POST", "/api/v1/recommendations", Some("[1, 2")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn unconfigured_advisor_is_a_config_error() {
        let (status, body) = send(
            test_state(),
            "POST",
            "/api/v1/recommendations",
            Some(r#"{ "users": [{ "id": "u1" }] }"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "CONFIG_ERROR");
    }
}
