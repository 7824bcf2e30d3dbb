// crates/expense-chat/src/openai.rs
// ============================================================================
// Module: OpenAI Chat Client
// Description: Blocking chat-completions client for hosted models.
// Purpose: Implement the model seam over OpenAI-compatible and Azure routes.
// Dependencies: expense-config, reqwest, serde_json
// ============================================================================

//! ## Overview
//! [`OpenAiChatClient`] posts chat-completions requests with a fixed timeout,
//! redirects disabled, and a response size limit. `openai_compatible`
//! endpoints receive `{endpoint}/chat/completions` with a bearer key and the
//! deployment as the model name. `azure_openai` endpoints receive the
//! deployment route with an `api-version` query and an `api-key` header.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::time::Duration;

use expense_config::ChatConfig;
use expense_config::ChatProvider;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::header::ACCEPT;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde::Serialize;

use crate::protocol::ChatError;
use crate::protocol::ChatModel;
use crate::protocol::Completion;
use crate::protocol::FinishReason;
use crate::protocol::ModelMessage;
use crate::protocol::ToolDefinition;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// User agent for outbound model requests.
const USER_AGENT: &str = concat!("expense-tracker/", env!("CARGO_PKG_VERSION"));
/// Header carrying the Azure API key.
const AZURE_KEY_HEADER: &str = "api-key";

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Chat-completions request body.
#[derive(Serialize)]
struct CompletionRequest<'a> {
    /// Model name; omitted for Azure deployment routes.
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    /// Conversation so far.
    messages: &'a [ModelMessage],
    /// Tools offered to the model.
    #[serde(skip_serializing_if = "<[ToolDefinition]>::is_empty")]
    tools: &'a [ToolDefinition],
    /// Tool choice policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

/// Chat-completions response body.
#[derive(Deserialize)]
struct CompletionResponse {
    /// Candidate completions; the first is used.
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

/// One candidate completion.
#[derive(Deserialize)]
struct CompletionChoice {
    /// Assistant message.
    message: ModelMessage,
    /// Stop reason.
    #[serde(default)]
    finish_reason: Option<FinishReason>,
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Blocking chat-completions client.
pub struct OpenAiChatClient {
    /// HTTP client with timeout and redirect policy applied.
    client: Client,
    /// Fully resolved completions URL.
    url: Url,
    /// API flavour.
    provider: ChatProvider,
    /// Deployment or model name.
    deployment: String,
    /// API key, when one is configured.
    api_key: Option<String>,
    /// Maximum response size in bytes.
    max_response_bytes: usize,
}

impl OpenAiChatClient {
    /// Builds a client from chat configuration and an optional API key.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] when the endpoint is missing or not
    /// allowed, or when the HTTP client cannot be built.
    pub fn new(config: &ChatConfig, api_key: Option<String>) -> Result<Self, ChatError> {
        let url = completions_url(config)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(USER_AGENT)
            .redirect(Policy::none())
            .build()
            .map_err(|_| ChatError::Config("http client build failed".to_string()))?;
        Ok(Self {
            client,
            url,
            provider: config.provider,
            deployment: config.deployment.trim().to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Returns the completions URL requests are sent to.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

impl ChatModel for OpenAiChatClient {
    fn complete(
        &self,
        messages: &[ModelMessage],
        tools: &[ToolDefinition],
    ) -> Result<Completion, ChatError> {
        let request = CompletionRequest {
            model: match self.provider {
                ChatProvider::OpenaiCompatible => Some(self.deployment.as_str()),
                ChatProvider::AzureOpenai => None,
            },
            messages,
            tools,
            tool_choice: (!tools.is_empty()).then_some("auto"),
        };
        let body = serde_json::to_vec(&request)
            .map_err(|err| ChatError::Protocol(format!("request encoding failed: {err}")))?;
        let mut builder = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body);
        if let Some(key) = &self.api_key {
            builder = match self.provider {
                ChatProvider::OpenaiCompatible => builder.bearer_auth(key),
                ChatProvider::AzureOpenai => builder.header(AZURE_KEY_HEADER, key),
            };
        }
        let mut response =
            builder.send().map_err(|err| ChatError::Transport(describe_send_error(&err)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Status(status.as_u16()));
        }
        let bytes = read_response_limited(&mut response, self.max_response_bytes)?;
        let parsed: CompletionResponse = serde_json::from_slice(&bytes)
            .map_err(|err| ChatError::Protocol(format!("malformed completion: {err}")))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::Protocol("completion has no choices".to_string()))?;
        Ok(Completion {
            message: choice.message,
            finish_reason: choice.finish_reason.unwrap_or(FinishReason::Other),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the completions URL for the configured provider.
fn completions_url(config: &ChatConfig) -> Result<Url, ChatError> {
    let endpoint = config
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|endpoint| !endpoint.is_empty())
        .ok_or_else(|| ChatError::Config("chat endpoint is not configured".to_string()))?;
    let base = endpoint.trim_end_matches('/');
    let raw = match config.provider {
        ChatProvider::OpenaiCompatible => format!("{base}/chat/completions"),
        ChatProvider::AzureOpenai => format!(
            "{base}/openai/deployments/{}/chat/completions",
            config.deployment.trim()
        ),
    };
    let mut url =
        Url::parse(&raw).map_err(|_| ChatError::Config("chat endpoint is not a url".to_string()))?;
    match url.scheme() {
        "https" => {}
        "http" if config.allow_http => {}
        _ => return Err(ChatError::Config("chat endpoint scheme not allowed".to_string())),
    }
    if url.host_str().is_none() {
        return Err(ChatError::Config("chat endpoint host required".to_string()));
    }
    if config.provider == ChatProvider::AzureOpenai {
        url.query_pairs_mut().append_pair("api-version", config.api_version.trim());
    }
    Ok(url)
}

/// Summarizes a send failure without echoing request contents.
fn describe_send_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else if err.is_redirect() {
        "redirects are not followed".to_string()
    } else {
        "request failed".to_string()
    }
}

/// Reads the response body while enforcing a byte limit.
fn read_response_limited(response: &mut Response, max_bytes: usize) -> Result<Vec<u8>, ChatError> {
    let expected_len = response.content_length();
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| ChatError::Config("response size limit exceeds u64".to_string()))?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err(ChatError::Protocol("response exceeds size limit".to_string()));
    }
    let mut buf = Vec::new();
    let limit = max_bytes_u64.saturating_add(1);
    let mut handle = response.take(limit);
    handle
        .read_to_end(&mut buf)
        .map_err(|_| ChatError::Transport("failed to read response".to_string()))?;
    if buf.len() > max_bytes {
        return Err(ChatError::Protocol("response exceeds size limit".to_string()));
    }
    Ok(buf)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use expense_config::ChatConfig;
    use expense_config::ChatProvider;

    use super::completions_url;

    fn config(provider: ChatProvider, endpoint: &str) -> ChatConfig {
        ChatConfig {
            enabled: true,
            provider,
            endpoint: Some(endpoint.to_string()),
            ..ChatConfig::default()
        }
    }

    #[test]
    fn openai_compatible_url_appends_completions_path() {
        let url =
            completions_url(&config(ChatProvider::OpenaiCompatible, "https://api.example.com/v1/"))
                .unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn azure_url_routes_through_deployment_with_version() {
        let mut config = config(ChatProvider::AzureOpenai, "https://res.openai.azure.com");
        config.api_version = "2024-10-21".to_string();
        let url = completions_url(&config).unwrap();
        assert_eq!(
            url.as_str(),
            "https://res.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-10-21"
        );
    }

    #[test]
    fn cleartext_endpoints_need_opt_in() {
        let mut config = config(ChatProvider::OpenaiCompatible, "http://127.0.0.1:9000");
        assert!(completions_url(&config).is_err());
        config.allow_http = true;
        assert!(completions_url(&config).is_ok());
    }

    #[test]
    fn missing_endpoint_is_a_config_error() {
        let config = ChatConfig::default();
        assert!(completions_url(&config).is_err());
    }
}
