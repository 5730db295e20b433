//! Atlassian organization admin API connector: managed users and products.

use std::time::Duration;

use serde_json::Value;

use super::{array_under, collect_pages, ConnectorError, PageShape, RetryPolicy};
use crate::config::AtlassianSettings;

/// `{ users | values | data: [...], links: { next } }`, or a bare array.
struct UsersPage;

impl PageShape for UsersPage {
    fn items(page: &Value) -> Result<Vec<Value>, ConnectorError> {
        array_under(page, &["users", "values", "data"])
            .ok_or_else(|| ConnectorError::InvalidResponse("API did not return a users array".into()))
    }

    fn next_link(page: &Value) -> Option<String> {
        links_next(page)
    }
}

/// `{ products | data: [...], links: { next } }`; a page without either is empty.
struct ProductsPage;

impl PageShape for ProductsPage {
    fn items(page: &Value) -> Result<Vec<Value>, ConnectorError> {
        match ["products", "data"]
            .iter()
            .find_map(|key| page.get(*key))
        {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items.clone()),
            Some(_) => Err(ConnectorError::InvalidResponse(
                "Invalid Atlassian products array".into(),
            )),
        }
    }

    fn next_link(page: &Value) -> Option<String> {
        links_next(page)
    }
}

fn links_next(page: &Value) -> Option<String> {
    page.pointer("/links/next")
        .and_then(Value::as_str)
        .filter(|link| !link.is_empty())
        .map(str::to_string)
}

pub struct AtlassianClient {
    http: reqwest::Client,
    settings: AtlassianSettings,
    policy: RetryPolicy,
}

impl AtlassianClient {
    pub fn new(settings: AtlassianSettings) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("seatscope/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            settings,
            policy: RetryPolicy::default(),
        })
    }

    fn org_url(&self, resource: &str) -> String {
        format!(
            "{}/admin/v1/orgs/{}/{}",
            self.settings.api_base_url.trim_end_matches('/'),
            self.settings.org_id,
            resource
        )
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .bearer_auth(&self.settings.api_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::FROM, &self.settings.email)
    }

    pub async fn fetch_users(&self) -> Result<Vec<Value>, ConnectorError> {
        let users =
            collect_pages::<UsersPage, _>(self.org_url("users"), |url| self.request(url), &self.policy)
                .await?;
        tracing::info!(org_id = %self.settings.org_id, count = users.len(), "Fetched Atlassian users");
        Ok(users)
    }

    pub async fn fetch_products(&self) -> Result<Vec<Value>, ConnectorError> {
        let products = collect_pages::<ProductsPage, _>(
            self.org_url("products"),
            |url| self.request(url),
            &self.policy,
        )
        .await?;
        tracing::info!(org_id = %self.settings.org_id, count = products.len(), "Fetched Atlassian products");
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn users_page_accepts_every_known_layout() {
        for page in [
            json!({ "users": [{ "account_id": "a" }] }),
            json!({ "values": [{ "account_id": "a" }] }),
            json!({ "data": [{ "account_id": "a" }] }),
            json!([{ "account_id": "a" }]),
        ] {
            assert_eq!(UsersPage::items(&page).unwrap().len(), 1);
        }
        assert!(UsersPage::items(&json!({ "total": 0 })).is_err());
    }

    #[test]
    fn products_page_tolerates_missing_list() {
        assert!(ProductsPage::items(&json!({})).unwrap().is_empty());
        assert_eq!(
            ProductsPage::items(&json!({ "products": [{ "product_id": "jira" }] }))
                .unwrap()
                .len(),
            1
        );
        assert!(ProductsPage::items(&json!({ "products": "nope" })).is_err());
    }

    #[test]
    fn next_link_is_read_from_links() {
        let page = json!({ "data": [], "links": { "next": "https://api.atlassian.com/next" } });
        assert_eq!(
            links_next(&page).as_deref(),
            Some("https://api.atlassian.com/next")
        );
        assert!(links_next(&json!({ "links": { "next": null } })).is_none());
    }

    #[test]
    fn org_url_is_built_from_settings() {
        let client = AtlassianClient::new(AtlassianSettings {
            api_token: "token".to_string(),
            org_id: "org-1".to_string(),
            email: "admin@example.org".to_string(),
            api_base_url: "https://api.atlassian.com/".to_string(),
        })
        .unwrap();
        assert_eq!(
            client.org_url("users"),
            "https://api.atlassian.com/admin/v1/orgs/org-1/users"
        );
    }
}
