//! Source connectors for Microsoft Graph and the Atlassian admin API.
//!
//! Both sources page with a "next link" cursor. Pages are fetched strictly
//! one after another; HTTP 429 responses are retried a bounded number of
//! times, waiting for `Retry-After` seconds or a fixed delay.

pub mod atlassian;
pub mod graph;

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;

use crate::config::ConfigError;

/// Errors raised while talking to an upstream source.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("rate limited after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("unexpected response shape: {0}")]
    InvalidResponse(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),
}

/// Retry behaviour for rate-limited requests.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries allowed per page after the first attempt.
    pub max_retries: u32,
    /// Wait used when the response carries no usable `Retry-After`.
    pub default_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            default_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, retry_after: Option<&str>) -> Duration {
        retry_after
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.default_delay)
    }
}

/// Send a request built by `build`, retrying on 429, and decode the JSON body.
pub async fn send_json<F>(build: F, policy: &RetryPolicy) -> Result<Value, ConnectorError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let response = build().send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            if attempts > policy.max_retries {
                tracing::error!(attempts, "Upstream rate limit retries exhausted");
                return Err(ConnectorError::RetriesExhausted { attempts });
            }
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok());
            let delay = policy.delay_for(retry_after);
            tracing::warn!(
                attempts,
                delay_ms = delay.as_millis() as u64,
                "Upstream rate limited, backing off"
            );
            tokio::time::sleep(delay).await;
            continue;
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ConnectorError::AuthFailed(format!("{status}: {body}"))
                }
                _ => ConnectorError::Status { status, body },
            });
        }

        return Ok(response.json::<Value>().await?);
    }
}

/// How a source lays out one page.
pub trait PageShape {
    /// Records on this page.
    fn items(page: &Value) -> Result<Vec<Value>, ConnectorError>;
    /// Absolute URL of the next page, if any.
    fn next_link(page: &Value) -> Option<String>;
}

/// Follow next links from `first_url` until exhausted, collecting every record.
pub async fn collect_pages<S, F>(
    first_url: String,
    request: F,
    policy: &RetryPolicy,
) -> Result<Vec<Value>, ConnectorError>
where
    S: PageShape,
    F: Fn(&str) -> RequestBuilder,
{
    let mut records = Vec::new();
    let mut next = Some(first_url);
    let mut page_number = 0u32;

    while let Some(url) = next.take() {
        page_number += 1;
        tracing::debug!(page = page_number, url = %url, "Fetching page");
        let page = send_json(|| request(&url), policy).await?;
        records.extend(S::items(&page)?);
        next = S::next_link(&page);
    }

    tracing::debug!(pages = page_number, count = records.len(), "Paging complete");
    Ok(records)
}

/// First array found under one of `keys`, or the page itself when it is an array.
fn array_under(page: &Value, keys: &[&str]) -> Option<Vec<Value>> {
    keys.iter()
        .find_map(|key| page.get(*key).and_then(Value::as_array))
        .or_else(|| page.as_array())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    struct LinksNext;

    impl PageShape for LinksNext {
        fn items(page: &Value) -> Result<Vec<Value>, ConnectorError> {
            array_under(page, &["data"])
                .ok_or_else(|| ConnectorError::InvalidResponse("no data array".into()))
        }

        fn next_link(page: &Value) -> Option<String> {
            page.pointer("/links/next")
                .and_then(Value::as_str)
                .map(str::to_string)
        }
    }

    #[derive(Clone)]
    struct Stub {
        base: String,
        throttled: Arc<AtomicU32>,
        throttle_limit: u32,
    }

    #[derive(serde::Deserialize)]
    struct PageParam {
        page: Option<u32>,
    }

    async fn paged(State(stub): State<Stub>, Query(q): Query<PageParam>) -> impl IntoResponse {
        let page = q.page.unwrap_or(1);
        if page == 2 && stub.throttled.fetch_add(1, Ordering::SeqCst) < stub.throttle_limit {
            let mut headers = HeaderMap::new();
            headers.insert("retry-after", "0".parse().unwrap());
            return (AxumStatus::TOO_MANY_REQUESTS, headers, Json(json!({}))).into_response();
        }
        let next = (page < 3).then(|| format!("{}/records?page={}", stub.base, page + 1));
        Json(json!({
            "data": [{ "id": format!("p{page}-a") }, { "id": format!("p{page}-b") }],
            "links": { "next": next }
        }))
        .into_response()
    }

    async fn spawn_stub(throttle_limit: u32) -> (String, Arc<AtomicU32>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let throttled = Arc::new(AtomicU32::new(0));
        let app = Router::new().route("/records", get(paged)).with_state(Stub {
            base: base.clone(),
            throttled: throttled.clone(),
            throttle_limit,
        });
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (base, throttled)
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 5,
            default_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn follows_next_links_until_exhausted() {
        let (base, _) = spawn_stub(0).await;
        let client = reqwest::Client::new();

        let records = collect_pages::<LinksNext, _>(
            format!("{base}/records?page=1"),
            |url| client.get(url),
            &fast_policy(),
        )
        .await
        .unwrap();

        let ids: Vec<_> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["p1-a", "p1-b", "p2-a", "p2-b", "p3-a", "p3-b"]);
    }

    #[tokio::test]
    async fn retries_rate_limited_pages() {
        let (base, throttled) = spawn_stub(3).await;
        let client = reqwest::Client::new();

        let records = collect_pages::<LinksNext, _>(
            format!("{base}/records?page=1"),
            |url| client.get(url),
            &fast_policy(),
        )
        .await
        .unwrap();

        assert_eq!(records.len(), 6);
        assert_eq!(throttled.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn gives_up_after_bounded_retries() {
        let (base, _) = spawn_stub(u32::MAX).await;
        let client = reqwest::Client::new();

        let err = collect_pages::<LinksNext, _>(
            format!("{base}/records?page=1"),
            |url| client.get(url),
            &fast_policy(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ConnectorError::RetriesExhausted { attempts: 6 }));
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let (base, _) = spawn_stub(0).await;
        let client = reqwest::Client::new();

        let err = send_json(|| client.get(format!("{base}/missing")), &fast_policy())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::Status { status, .. } if status == StatusCode::NOT_FOUND
        ));
    }

    #[test]
    fn retry_after_header_overrides_default_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(Some("7")), Duration::from_secs(7));
        assert_eq!(policy.delay_for(Some("soon")), Duration::from_secs(5));
        assert_eq!(policy.delay_for(None), Duration::from_secs(5));
    }

    #[test]
    fn array_under_prefers_named_keys() {
        let page = json!({ "users": [1, 2], "data": [3] });
        assert_eq!(array_under(&page, &["users", "data"]).unwrap().len(), 2);
        assert_eq!(array_under(&json!([1, 2, 3]), &["users"]).unwrap().len(), 3);
        assert!(array_under(&json!({ "x": 1 }), &["users"]).is_none());
    }
}
