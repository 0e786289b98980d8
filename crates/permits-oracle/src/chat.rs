//! `ReasoningOracle` over an OpenAI-compatible chat completions API.
//!
//! One call is one system + user exchange: `POST {api_base}/chat/completions`
//! with a bearer key. The reply text is `choices[0].message.content`,
//! returned untouched. Interpreting it is the evaluator's job.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use permits_contracts::error::{PermitError, PermitResult};
use permits_core::traits::ReasoningOracle;

use crate::retry::{with_retry, CallError, RetryConfig};

pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "anthropic/claude-3.5-sonnet";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Chat completions client used as the reasoning oracle.
#[derive(Clone)]
pub struct ChatOracle {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    retry: RetryConfig,
}

impl std::fmt::Debug for ChatOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatOracle")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .field("retry", &self.retry)
            .finish()
    }
}

impl ChatOracle {
    pub fn builder() -> ChatOracleBuilder {
        ChatOracleBuilder::default()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send_once(&self, system: &str, user: &str) -> Result<String, CallError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(CallError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::from_status(status, body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CallError::Permanent(format!("invalid completion payload: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CallError::Permanent("completion contained no message".to_string()))
    }
}

#[async_trait]
impl ReasoningOracle for ChatOracle {
    async fn complete(&self, system: &str, user: &str) -> PermitResult<String> {
        let reply = with_retry("chat-completion", &self.retry, || self.send_once(system, user))
            .await
            .map_err(|e| PermitError::evaluation(format!("reasoning oracle call failed: {}", e.into_message())))?;
        debug!(model = %self.model, reply = %reply.trim(), "oracle replied");
        Ok(reply)
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct ChatOracleBuilder {
    api_key: Option<String>,
    api_base: Option<String>,
    model: Option<String>,
    timeout: Option<Duration>,
    retry: Option<RetryConfig>,
}

impl ChatOracleBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Fails with `ConfigError` when no API key was supplied.
    pub fn build(self) -> PermitResult<ChatOracle> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PermitError::ConfigError {
                reason: "reasoning oracle API key is not set".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| PermitError::ConfigError {
                reason: format!("failed to build oracle HTTP client: {e}"),
            })?;

        Ok(ChatOracle {
            client,
            api_key,
            api_base: self
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            retry: self.retry.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn completion(text: &str) -> serde_json::Value {
        json!({
            "id": "gen-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": text}}]
        })
    }

    fn oracle(server: &MockServer) -> ChatOracle {
        ChatOracle::builder()
            .api_key("test-key")
            .api_base(server.uri())
            .retry(RetryConfig {
                max_retries: 2,
                base_delay_ms: 1,
                max_delay_ms: 2,
            })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_complete_sends_system_and_user_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": DEFAULT_MODEL,
                "messages": [
                    {"role": "system", "content": "judge"},
                    {"role": "user", "content": "is it raining?"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(" true\n")))
            .expect(1)
            .mount(&server)
            .await;

        let reply = oracle(&server).complete("judge", "is it raining?").await.unwrap();
        assert_eq!(reply, " true\n", "reply is returned verbatim");
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("false")))
            .expect(1)
            .mount(&server)
            .await;

        let reply = oracle(&server).complete("s", "u").await.unwrap();
        assert_eq!(reply, "false");
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})))
            .expect(1)
            .mount(&server)
            .await;

        match oracle(&server).complete("s", "u").await {
            Err(PermitError::EvaluationError { reason }) => assert!(reason.contains("401")),
            other => panic!("expected EvaluationError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = oracle(&server).complete("s", "u").await.unwrap_err();
        assert!(err.to_string().contains("no message"));
    }

    #[test]
    fn test_builder_requires_api_key() {
        let err = ChatOracle::builder().api_key("  ").build().unwrap_err();
        assert!(matches!(err, PermitError::ConfigError { .. }));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let oracle = ChatOracle::builder().api_key("sk-live-123").build().unwrap();
        let rendered = format!("{:?}", oracle);
        assert!(!rendered.contains("sk-live-123"));
        assert!(rendered.contains(DEFAULT_API_BASE));
    }
}
