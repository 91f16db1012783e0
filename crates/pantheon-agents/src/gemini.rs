use std::time::Duration;

use async_trait::async_trait;
use pantheon_models::CompletionConfig;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::completion::CompletionClient;
use crate::error::AgentError;

/// Gemini `generateContent` client.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: SecretString,
    timeout: Duration,
    generation: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: &'a GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [TextPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GeminiClient {
    pub fn new(config: &CompletionConfig, api_key: SecretString) -> Result<Self, AgentError> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(AgentError::Config(format!(
                "{} is empty",
                config.api_key_env
            )));
        }
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            timeout: config.timeout(),
            generation: GenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
            },
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, AgentError> {
        debug!(model = %self.model, prompt_chars = prompt.len(), "Requesting completion");

        let body = GenerateRequest {
            contents: [Content {
                role: "user",
                parts: [TextPart { text: prompt }],
            }],
            generation_config: &self.generation,
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Timeout(self.timeout.as_secs())
                } else {
                    AgentError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AgentError::Transport(format!("Failed to read response body: {e}")))?;

        if !status.is_success() {
            let error = classify_failure(status, &text);
            warn!(status = %status, error = %error, "Completion request failed");
            return Err(error);
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)?;
        let reply: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect()
            })
            .unwrap_or_default();

        if reply.trim().is_empty() {
            return Err(AgentError::EmptyReply);
        }
        Ok(reply)
    }
}

/// Map a non-success reply onto the collector's retry classes.
fn classify_failure(status: StatusCode, body: &str) -> AgentError {
    let (message, api_status) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.chars().take(200).collect(), String::new()),
    };

    if status == StatusCode::TOO_MANY_REQUESTS || api_status == "RESOURCE_EXHAUSTED" {
        return AgentError::RateLimited(message);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AgentError::Auth(message),
        StatusCode::REQUEST_TIMEOUT => AgentError::Transport(format!("HTTP 408: {message}")),
        s if s.is_server_error() => AgentError::Transport(format!("HTTP {}: {message}", s.as_u16())),
        s => AgentError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

    fn client_for(server: &mockito::Server) -> GeminiClient {
        let config = CompletionConfig {
            base_url: server.url(),
            ..CompletionConfig::default()
        };
        GeminiClient::new(&config, SecretString::from("test-key".to_string())).unwrap()
    }

    fn reply_body(text: &str) -> String {
        serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": text}]},
                "finishReason": "STOP"
            }]
        })
        .to_string()
    }

    #[tokio::test]
    async fn returns_candidate_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", PATH)
            .match_header("x-goog-api-key", "test-key")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
                "generationConfig": {"maxOutputTokens": 128}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(reply_body("HOLD|75|Market consolidating\n"))
            .create_async()
            .await;

        let client = client_for(&server);
        let reply = client.complete("hello").await.unwrap();
        assert_eq!(reply, "HOLD|75|Market consolidating\n");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn joins_multiple_parts() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "BUY|80|"}, {"text": "Breakout"}]}}]
        });
        server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let reply = client_for(&server).complete("p").await.unwrap();
        assert_eq!(reply, "BUY|80|Breakout");
    }

    #[tokio::test]
    async fn empty_candidates_is_empty_reply() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(200)
            .with_body(r#"{"candidates": []}"#)
            .create_async()
            .await;

        let err = client_for(&server).complete("p").await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyReply));
    }

    #[tokio::test]
    async fn rate_limit_is_classified() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(429)
            .with_body(
                r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#,
            )
            .create_async()
            .await;

        let err = client_for(&server).complete("p").await.unwrap_err();
        assert!(err.is_rate_limit());
        assert!(err.to_string().contains("Quota exceeded"));
    }

    #[tokio::test]
    async fn auth_failure_is_not_retryable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(403)
            .with_body(r#"{"error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}}"#)
            .create_async()
            .await;

        let err = client_for(&server).complete("p").await.unwrap_err();
        assert!(matches!(err, AgentError::Auth(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn server_error_is_transport() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", PATH)
            .with_status(503)
            .with_body("upstream unavailable")
            .create_async()
            .await;

        let err = client_for(&server).complete("p").await.unwrap_err();
        assert!(matches!(err, AgentError::Transport(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn bad_request_is_rejected() {
        let err = classify_failure(
            StatusCode::BAD_REQUEST,
            r#"{"error": {"code": 400, "message": "Invalid JSON payload", "status": "INVALID_ARGUMENT"}}"#,
        );
        assert!(matches!(err, AgentError::Rejected { status: 400, .. }));
    }

    #[test]
    fn empty_key_is_config_error() {
        let config = CompletionConfig::default();
        let err = GeminiClient::new(&config, SecretString::from(" ".to_string()));
        assert!(matches!(err, Err(AgentError::Config(_))));
    }
}
