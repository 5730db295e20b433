//! Microsoft Graph connector: directory users and subscribed SKUs.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::{collect_pages, send_json, ConnectorError, PageShape, RetryPolicy};
use crate::config::GraphSettings;

/// Attributes requested for every user.
const USER_SELECT: &str = "id,displayName,mail,userPrincipalName,accountEnabled,createdDateTime,\
assignedLicenses,signInActivity,department,jobTitle,employeeId,employeeLeaveDateTime,\
customSecurityAttributes";

const PAGE_SIZE: u32 = 100;

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// `{ value: [...], "@odata.nextLink": "..." }`
struct ODataPage;

impl PageShape for ODataPage {
    fn items(page: &Value) -> Result<Vec<Value>, ConnectorError> {
        page.get("value")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| ConnectorError::InvalidResponse("Graph page has no value array".into()))
    }

    fn next_link(page: &Value) -> Option<String> {
        page.get("@odata.nextLink")
            .and_then(Value::as_str)
            .filter(|link| !link.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client-credentials Graph client bound to one tenant.
pub struct GraphClient {
    http: reqwest::Client,
    settings: GraphSettings,
    tenant_id: String,
    policy: RetryPolicy,
}

impl GraphClient {
    pub fn new(settings: GraphSettings, tenant_id: impl Into<String>) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("seatscope/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            settings,
            tenant_id: tenant_id.into(),
            policy: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn access_token(&self) -> Result<String, ConnectorError> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.settings.authority_url.trim_end_matches('/'),
            self.tenant_id
        );
        let form = [
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
            ("scope", GRAPH_SCOPE),
            ("grant_type", "client_credentials"),
        ];
        let body = send_json(|| self.http.post(&url).form(&form), &self.policy).await?;
        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|e| ConnectorError::AuthFailed(format!("token response: {e}")))?;
        Ok(token.access_token)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.settings.api_base_url.trim_end_matches('/'), path)
    }

    async fn fetch_all(&self, first_url: String) -> Result<Vec<Value>, ConnectorError> {
        let token = self.access_token().await?;
        collect_pages::<ODataPage, _>(
            first_url,
            |url| self.http.get(url).bearer_auth(&token),
            &self.policy,
        )
        .await
    }

    /// Every directory user, all pages.
    pub async fn fetch_users(&self) -> Result<Vec<Value>, ConnectorError> {
        let url = self.api_url(&format!("/users?$select={USER_SELECT}&$top={PAGE_SIZE}"));
        let users = self.fetch_all(url).await?;
        tracing::info!(tenant_id = %self.tenant_id, count = users.len(), "Fetched Graph users");
        Ok(users)
    }

    /// Subscribed SKUs of the tenant.
    pub async fn fetch_subscribed_skus(&self) -> Result<Vec<Value>, ConnectorError> {
        let skus = self.fetch_all(self.api_url("/subscribedSkus")).await?;
        tracing::info!(tenant_id = %self.tenant_id, count = skus.len(), "Fetched subscribed SKUs");
        Ok(skus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;

    #[test]
    fn odata_page_shape() {
        let page = json!({
            "value": [{ "id": "a" }],
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/users?$skiptoken=x"
        });
        assert_eq!(ODataPage::items(&page).unwrap().len(), 1);
        assert!(ODataPage::next_link(&page).unwrap().contains("skiptoken"));

        let last = json!({ "value": [] });
        assert!(ODataPage::next_link(&last).is_none());
        assert!(ODataPage::items(&json!({})).is_err());
    }

    async fn token() -> Json<Value> {
        Json(json!({ "access_token": "stub-token", "token_type": "Bearer" }))
    }

    async fn users(State(base): State<String>, headers: HeaderMap) -> Json<Value> {
        assert_eq!(
            headers.get("authorization").unwrap().to_str().unwrap(),
            "Bearer stub-token"
        );
        Json(json!({
            "value": [{ "id": "u1" }, { "id": "u2" }],
            "@odata.nextLink": format!("{base}/v1.0/users-page-2")
        }))
    }

    async fn users_page_two() -> Json<Value> {
        Json(json!({ "value": [{ "id": "u3" }] }))
    }

    #[tokio::test]
    async fn fetches_users_across_pages_with_token() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let app = Router::new()
            .route("/tenant-1/oauth2/v2.0/token", post(token))
            .route("/v1.0/users", get(users))
            .route("/v1.0/users-page-2", get(users_page_two))
            .with_state(base.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = GraphClient::new(
            GraphSettings {
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                api_base_url: format!("{base}/v1.0"),
                authority_url: base.clone(),
            },
            "tenant-1",
        )
        .unwrap();

        let users = client.fetch_users().await.unwrap();
        let ids: Vec<_> = users.iter().map(|u| u["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["u1", "u2", "u3"]);
    }
}
