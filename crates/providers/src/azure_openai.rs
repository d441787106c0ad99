//! Azure OpenAI chat-completions provider.
//!
//! Talks to a single deployment:
//! `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=...`
//! authenticated with the `api-key` header.
//!
//! Only non-streaming completions are needed: the dispatcher waits for the
//! whole answer before returning it (and optionally archiving it).

use async_trait::async_trait;
use rpgforge_core::error::ProviderError;
use rpgforge_core::message::{Message, Role};
use rpgforge_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Seconds to wait on a 429 when the response carries no `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// An Azure OpenAI deployment.
pub struct AzureOpenAiProvider {
    endpoint: String,
    deployment: String,
    api_version: String,
    api_key: String,
    client: reqwest::Client,
}

impl AzureOpenAiProvider {
    /// Create a provider for one deployment.
    ///
    /// `timeout` bounds a single HTTP exchange; the retry wrapper applies
    /// its own per-attempt deadline on top.
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            deployment: deployment.into(),
            api_version: api_version.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Build from the `[llm]` config section.
    pub fn from_config(config: &rpgforge_config::LlmConfig) -> Result<Self, ProviderError> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            ProviderError::NotConfigured("AZURE_OPENAI_ENDPOINT is not set".into())
        })?;
        let api_key = config.api_key.clone().ok_or_else(|| {
            ProviderError::NotConfigured("AZURE_OPENAI_API_KEY is not set".into())
        })?;
        Self::new(
            endpoint,
            &config.deployment,
            &config.api_version,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }

    /// Convert our Message types to the chat-completions wire format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: Some(m.content.clone()),
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }
}

/// Map a non-200 status to a provider error.
fn classify_status(status: u16, retry_after: Option<u64>, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        401 | 403 => ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        408 | 504 => ProviderError::Timeout(format!("Gateway timeout (status {status})")),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

/// Turn a parsed API response into our response type.
fn into_provider_response(api_response: ApiResponse, fallback_model: &str) -> Result<ProviderResponse, ProviderError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(ProviderError::ApiError {
            status_code: 200,
            message: "Response blocked by content filter".into(),
        });
    }

    let usage = api_response.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    Ok(ProviderResponse {
        message: Message::new(Role::Assistant, choice.message.content.unwrap_or_default()),
        usage,
        model: api_response
            .model
            .unwrap_or_else(|| fallback_model.to_string()),
    })
}

#[async_trait]
impl Provider for AzureOpenAiProvider {
    fn name(&self) -> &str {
        "azure-openai"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = self.completions_url();
        let body = Self::request_body(&request);

        debug!(
            deployment = %self.deployment,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status != 200 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Completion backend returned error");
            return Err(classify_status(status, retry_after, error_body));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        into_provider_response(api_response, &self.deployment)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(!self.endpoint.is_empty() && !self.api_key.is_empty())
    }
}

// --- Chat-completions API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
