//! OpenRouter LLM client implementation
//!
//! Provides an async HTTP client for the chat completions endpoint with:
//! - JSON-mode completions decoded into caller types
//! - Rate limit handling with exponential backoff

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::types::{ChatRequest, ChatResponse, LlmResponse, Message, extract_json_object};

/// Maximum number of attempts for rate-limited requests
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff (in milliseconds)
const BACKOFF_BASE_MS: u64 = 1000;

/// Longest wait honoured from a rate-limit response
const MAX_BACKOFF_MS: u64 = 30_000;

/// A model that answers a system + user prompt with one JSON object
#[async_trait]
pub trait JsonCompletion: Send + Sync {
    async fn complete_json_value(&self, system: &str, user: &str) -> Result<serde_json::Value>;
}

/// OpenRouter LLM client
#[derive(Clone)]
pub struct LlmClient {
    http_client: HttpClient,
    config: LlmConfig,
    api_key: String,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

impl LlmClient {
    /// Create a client with an explicit API key
    pub fn new(config: LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingApiKey(config.api_key_env.clone()));
        }

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        Ok(Self {
            http_client,
            config,
            api_key,
        })
    }

    /// Create a client with the key read from `config.api_key_env`
    pub fn from_env(config: LlmConfig) -> Result<Self> {
        let api_key = config
            .resolved_api_key()
            .map_err(|e| Error::ConfigError(e.to_string()))?
            .ok_or_else(|| Error::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config, api_key)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Make a chat completion request
    pub async fn complete(&self, messages: Vec<Message>) -> Result<LlmResponse> {
        let request = ChatRequest::new(&self.config.model, messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);
        self.execute_request(&request).await
    }

    /// Ask for a JSON object and decode it into `T`
    pub async fn complete_json<T: DeserializeOwned>(&self, system: &str, user: &str) -> Result<T> {
        let request = ChatRequest::new(
            &self.config.model,
            vec![Message::system(system), Message::user(user)],
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens)
        .json_mode();

        let response = self.execute_request(&request).await?;
        if response.is_truncated() {
            warn!(model = %response.model, "Completion cut off at max_tokens");
        }

        let json = extract_json_object(&response.content).ok_or_else(|| {
            Error::LLMError(format!(
                "Expected a JSON object, got: {}",
                truncate(&response.content, 200)
            ))
        })?;
        serde_json::from_str(json)
            .map_err(|e| Error::LLMError(format!("Malformed JSON answer: {}", e)))
    }

    /// Execute a chat request with retry logic
    async fn execute_request(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.send_request(request).await {
                Ok(response) => return Ok(response),
                Err(Error::RateLimited(wait_secs)) if attempts < MAX_RETRY_ATTEMPTS => {
                    let backoff = calculate_backoff(attempts, wait_secs);
                    warn!(
                        attempt = attempts,
                        wait_ms = backoff,
                        "Rate limited, retrying after backoff"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a single request to the API
    async fn send_request(&self, request: &ChatRequest) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-Title", "ownergraph")
            .json(request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.error_for_status(status, &body));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMError(format!("Failed to parse response: {}", e)))?;

        LlmResponse::from_chat_response(chat_response)
            .ok_or_else(|| Error::LLMError("Empty response from API".to_string()))
    }

    fn error_for_status(&self, status: reqwest::StatusCode, body: &str) -> Error {
        match status.as_u16() {
            401 => Error::LLMError(format!(
                "Unauthorized: invalid API key. Check the {} environment variable.",
                self.config.api_key_env
            )),
            402 => Error::LLMError("Payment required: insufficient credits".to_string()),
            429 => Error::RateLimited(extract_retry_after(body).unwrap_or(5)),
            404 => Error::LLMError(format!("Model not found: {}", body)),
            500..=599 => Error::LLMError(format!("Server error ({}): {}", status, body)),
            _ => Error::LLMError(format!("HTTP error {}: {}", status, body)),
        }
    }
}

#[async_trait]
impl JsonCompletion for LlmClient {
    async fn complete_json_value(&self, system: &str, user: &str) -> Result<serde_json::Value> {
        self.complete_json(system, user).await
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Exponential backoff, never shorter than the server's suggestion
fn calculate_backoff(attempt: u32, suggested_wait_secs: u64) -> u64 {
    let base = BACKOFF_BASE_MS * 2u64.pow(attempt.saturating_sub(1));
    base.max(suggested_wait_secs.saturating_mul(1000))
        .min(MAX_BACKOFF_MS)
}

/// Extract a retry-after value from an error body
fn extract_retry_after(body: &str) -> Option<u64> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    json.get("retry_after")
        .or_else(|| json.get("error").and_then(|e| e.get("retry_after")))
        .and_then(|v| v.as_u64())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LlmConfig {
        LlmConfig {
            model: "test/model".to_string(),
            base_url: "https://example.com/api/v1/".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_client_new() {
        let client = LlmClient::new(test_config(), "test-key").unwrap();
        assert_eq!(client.model(), "test/model");
    }

    #[test]
    fn test_client_requires_api_key() {
        let result = LlmClient::new(test_config(), "  ");
        assert!(matches!(result, Err(Error::MissingApiKey(ref var)) if var == "OPENROUTER_API_KEY"));
    }

    #[test]
    fn test_from_env_missing_key() {
        let config = LlmConfig {
            api_key_env: "OWNERGRAPH_TEST_UNSET_LLM_KEY".to_string(),
            ..test_config()
        };
        assert!(matches!(
            LlmClient::from_env(config),
            Err(Error::MissingApiKey(_))
        ));
    }

    #[test]
    fn test_client_debug_hides_key() {
        let client = LlmClient::new(test_config(), "secret-key").unwrap();
        let debug = format!("{:?}", client);
        assert!(debug.contains("test/model"));
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn test_client_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LlmClient>();
    }

    #[test]
    fn test_error_for_status() {
        let client = LlmClient::new(test_config(), "k").unwrap();
        let err = client.error_for_status(reqwest::StatusCode::TOO_MANY_REQUESTS, r#"{"retry_after": 7}"#);
        assert!(matches!(err, Error::RateLimited(7)));

        let err = client.error_for_status(reqwest::StatusCode::UNAUTHORIZED, "");
        assert!(err.to_string().contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn test_calculate_backoff() {
        assert_eq!(calculate_backoff(1, 0), BACKOFF_BASE_MS);
        assert_eq!(calculate_backoff(2, 0), BACKOFF_BASE_MS * 2);
        assert_eq!(calculate_backoff(1, 5), 5000);
        assert_eq!(calculate_backoff(1, 3600), MAX_BACKOFF_MS);
    }

    #[test]
    fn test_extract_retry_after() {
        assert_eq!(extract_retry_after(r#"{"retry_after": 30}"#), Some(30));
        assert_eq!(extract_retry_after(r#"{"error": {"retry_after": 60}}"#), Some(60));
        assert_eq!(extract_retry_after(r#"{"message": "rate limited"}"#), None);
        assert_eq!(extract_retry_after("not json"), None);
    }
}
