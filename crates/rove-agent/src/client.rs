//! OpenAI-compatible chat-completions client
//!
//! Works against api.openai.com, Azure OpenAI deployments, and local servers
//! that speak the same wire format. When an API version is configured the
//! client switches to Azure conventions: an `api-key` header and an
//! `api-version` query parameter instead of a Bearer token.

use std::error::Error as _;
use std::time::Duration;

use async_trait::async_trait;
use rove_core::config::LlmConfig;
use rove_core::{AssistantReply, ChatRequest, ChatResponse, NetworkErrorKind, Result, RoveError};
use tracing::instrument;

use crate::model::ChatModel;

/// Chat-completions client
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    api_version: Option<String>,
}

impl OpenAiClient {
    /// Build a client whose transport gives up after `timeout`
    pub fn new(config: &LlmConfig, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RoveError::Config(format!("Failed to build HTTP client: {}", e)))?;

        if config.api_key.is_none() {
            tracing::warn!("No LLM API key configured (set LLM_API_KEY or OPENAI_API_KEY)");
        }

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    #[instrument(skip_all, fields(model = %request.model, messages = request.messages.len()))]
    async fn complete(&self, request: &ChatRequest) -> Result<AssistantReply> {
        let mut builder = self.http.post(self.completions_url()).json(request);

        match (&self.api_version, &self.api_key) {
            (Some(version), key) => {
                builder = builder.query(&[("api-version", version.as_str())]);
                if let Some(key) = key {
                    builder = builder.header("api-key", key);
                }
            }
            (None, Some(key)) => builder = builder.bearer_auth(key),
            (None, None) => {}
        }

        tracing::debug!("Sending chat completion request");
        let response = builder.send().await.map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown".to_string());
            return Err(RoveError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await.map_err(classify_reqwest_error)?;
        let reply = body
            .into_reply()
            .ok_or_else(|| RoveError::InvalidResponse("No choices in response".to_string()))?;

        tracing::debug!(
            "Chat completion returned {} tool call(s), {} chars of text",
            reply.tool_calls.len(),
            reply.content.as_deref().map(str::len).unwrap_or(0)
        );
        Ok(reply)
    }
}

/// Map a transport error onto the categories retry predicates inspect
///
/// Walks the source chain looking for the underlying I/O error, since reqwest
/// wraps connection failures several layers deep.
pub fn classify_reqwest_error(err: reqwest::Error) -> RoveError {
    if err.is_timeout() {
        return RoveError::Timeout(err.to_string());
    }
    if err.is_decode() {
        return RoveError::InvalidResponse(err.to_string());
    }
    if let Some(status) = err.status() {
        return RoveError::Api {
            status: status.as_u16(),
            message: err.to_string(),
        };
    }

    let mut kind = NetworkErrorKind::Other;
    let mut details = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
                    kind = NetworkErrorKind::ConnectionReset
                }
                std::io::ErrorKind::ConnectionRefused => kind = NetworkErrorKind::ConnectionRefused,
                std::io::ErrorKind::TimedOut => return RoveError::Timeout(text),
                _ => {}
            }
        }
        if kind == NetworkErrorKind::Other {
            kind = kind_from_text(&text);
        }
        details = format!("{}: {}", details, text);
        source = cause.source();
    }

    RoveError::Network {
        kind,
        message: details,
    }
}

fn kind_from_text(text: &str) -> NetworkErrorKind {
    let lower = text.to_lowercase();
    if lower.contains("dns") || lower.contains("lookup address") || lower.contains("resolve") {
        NetworkErrorKind::Dns
    } else if lower.contains("connection refused") {
        NetworkErrorKind::ConnectionRefused
    } else if lower.contains("connection reset") || lower.contains("broken pipe") {
        NetworkErrorKind::ConnectionReset
    } else {
        NetworkErrorKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubResponse, StubServer};
    use rove_core::Message;
    use serde_json::json;

    fn config(endpoint: String) -> LlmConfig {
        LlmConfig {
            endpoint,
            api_key: Some("sk-test".to_string()),
            ..LlmConfig::default()
        }
    }

    fn completion_body() -> serde_json::Value {
        json!({
            "choices": [{
                "message": {"role": "assistant", "content": "hello there"},
                "finish_reason": "stop"
            }]
        })
    }

    #[tokio::test]
    async fn test_bearer_auth_and_reply_parsing() {
        let server = StubServer::scripted(vec![StubResponse::json(200, completion_body())])
            .await
            .unwrap();
        let client = OpenAiClient::new(&config(server.url("/v1/")), Duration::from_secs(5)).unwrap();

        let request = ChatRequest::new("gpt-4o", vec![Message::user("hi")]);
        let reply = client.complete(&request).await.unwrap();

        assert_eq!(reply.text_content(), Some("hello there"));
        let recorded = &server.requests()[0];
        assert_eq!(recorded.path, "/v1/chat/completions");
        assert_eq!(recorded.header("authorization"), Some("Bearer sk-test"));
        let sent: serde_json::Value = serde_json::from_str(&recorded.body).unwrap();
        assert_eq!(sent["model"], "gpt-4o");
        assert_eq!(sent["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_azure_style_auth() {
        let server = StubServer::scripted(vec![StubResponse::json(200, completion_body())])
            .await
            .unwrap();
        let mut llm = config(server.url("/openai/deployments/gpt"));
        llm.api_version = Some("2024-02-01".to_string());
        let client = OpenAiClient::new(&llm, Duration::from_secs(5)).unwrap();

        client
            .complete(&ChatRequest::new("gpt", vec![Message::user("hi")]))
            .await
            .unwrap();

        let recorded = &server.requests()[0];
        assert_eq!(
            recorded.path,
            "/openai/deployments/gpt/chat/completions?api-version=2024-02-01"
        );
        assert_eq!(recorded.header("api-key"), Some("sk-test"));
        assert_eq!(recorded.header("authorization"), None);
    }

    #[tokio::test]
    async fn test_error_status_maps_to_api_error() {
        let server = StubServer::scripted(vec![StubResponse::json(
            429,
            json!({"error": {"message": "rate limit"}}),
        )])
        .await
        .unwrap();
        let client = OpenAiClient::new(&config(server.url("/v1")), Duration::from_secs(5)).unwrap();

        let err = client
            .complete(&ChatRequest::new("gpt-4o", vec![]))
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("rate limit"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_invalid_response() {
        let server = StubServer::scripted(vec![StubResponse::json(200, json!({"choices": []}))])
            .await
            .unwrap();
        let client = OpenAiClient::new(&config(server.url("/v1")), Duration::from_secs(5)).unwrap();

        let err = client
            .complete(&ChatRequest::new("gpt-4o", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, RoveError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_transport_timeout_is_timeout_error() {
        let server = StubServer::scripted(vec![StubResponse::Hang]).await.unwrap();
        let client =
            OpenAiClient::new(&config(server.url("/v1")), Duration::from_millis(100)).unwrap();

        let err = client
            .complete(&ChatRequest::new("gpt-4o", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, RoveError::Timeout(_)));
        assert!(err.is_connection_failure());
    }

    #[tokio::test]
    async fn test_refused_connection_is_connection_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = reqwest::Client::new()
            .get(format!("http://{}/", addr))
            .send()
            .await
            .unwrap_err();
        let classified = classify_reqwest_error(err);

        assert!(
            matches!(
                classified,
                RoveError::Network {
                    kind: NetworkErrorKind::ConnectionRefused,
                    ..
                }
            ),
            "unexpected classification: {:?}",
            classified
        );
        assert!(classified.is_connection_failure());
    }

    #[test]
    fn test_kind_from_text() {
        assert_eq!(
            kind_from_text("dns error: failed to lookup address information"),
            NetworkErrorKind::Dns
        );
        assert_eq!(
            kind_from_text("Connection reset by peer (os error 104)"),
            NetworkErrorKind::ConnectionReset
        );
        assert_eq!(kind_from_text("invalid certificate"), NetworkErrorKind::Other);
    }
}
