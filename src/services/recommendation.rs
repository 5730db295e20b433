//! License recommendations from an Azure OpenAI chat deployment.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AdvisorSettings;
use crate::errors::AppError;
use crate::services::users;
use crate::AppState;

const API_VERSION: &str = "2024-02-15-preview";

/// Users included in the prompt context.
const MAX_CONTEXT_USERS: usize = 100;

const SYSTEM_PROMPT: &str = "You are a Microsoft licensing and cost optimization expert. \
Your answers should be concise, prescriptive, and executive-ready.";

const DEFAULT_QUESTION: &str = "I am an IT administrator. Please analyze the data and provide \
recommendations to right-size licensing, reduce unused licenses, spot anomalies, and suggest \
optimizations. Output should be clear, actionable, and concise for executive IT leaders.";

const RATE_LIMITED_MESSAGE: &str = "The recommendation service is temporarily rate-limited. \
Please wait 1-2 minutes and try again.";

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationRequest {
    pub prompt: Option<String>,
    pub users: Option<Vec<Value>>,
}

#[derive(Debug, Serialize)]
pub struct Recommendation {
    pub recommendation: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Compose the user prompt: data context first, then the question.
pub fn build_prompt(users: &[Value], question: Option<&str>) -> String {
    let context = &users[..users.len().min(MAX_CONTEXT_USERS)];
    let data = serde_json::to_string_pretty(context).unwrap_or_else(|_| "[]".to_string());
    let question = question
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .unwrap_or(DEFAULT_QUESTION);
    format!(
        "Here is Microsoft 365 user and license assignment data for context:\n\n{data}\n\n{question}"
    )
}

pub fn completions_url(settings: &AdvisorSettings) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={API_VERSION}",
        settings.endpoint.trim_end_matches('/'),
        settings.deployment
    )
}

pub struct Advisor {
    http: reqwest::Client,
    settings: AdvisorSettings,
}

impl Advisor {
    pub fn new(settings: AdvisorSettings) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AppError::Internal(format!("advisor HTTP client: {e}")))?;
        Ok(Self { http, settings })
    }

    pub async fn recommend(&self, users: &[Value], question: Option<&str>) -> Result<String, AppError> {
        let prompt = build_prompt(users, question);
        let body = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.2,
            max_tokens: 400,
        };

        let response = self
            .http
            .post(completions_url(&self.settings))
            .header("api-key", &self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("advisor request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("Advisor rate limit hit");
            return Err(AppError::RateLimited(RATE_LIMITED_MESSAGE.to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("advisor returned {status}: {text}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("advisor response: {e}")))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_else(|| "No recommendation found.".to_string()))
    }
}

/// Recommendation for the users in the request, or for the tenant's latest users.
pub async fn recommend(
    state: &AppState,
    request: RecommendationRequest,
) -> Result<Recommendation, AppError> {
    let advisor = Advisor::new(state.config.advisor.get()?.clone())?;

    let users = match request.users {
        Some(users) if !users.is_empty() => users,
        _ => users::latest_users(state)
            .await?
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(e.to_string()))?,
    };
    if users.is_empty() {
        return Err(AppError::Validation(
            "No user data available from request or store".to_string(),
        ));
    }

    let recommendation = advisor.recommend(&users, request.prompt.as_deref()).await?;
    tracing::info!(users = users.len(), "Generated license recommendation");
    Ok(Recommendation { recommendation })
}
