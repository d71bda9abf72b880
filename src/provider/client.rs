//! HTTP client for the upstream model provider.

use super::session::{RealtimeSessionRequest, SessionOptions};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Errors talking to the model provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("upstream request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
}

/// Provider endpoints, models and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Base URL of the provider API.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Model used for realtime voice sessions.
    pub realtime_model: String,
    /// Output voice of the realtime model.
    pub voice: String,
    /// Model used for scene analysis.
    pub vision_model: String,
    /// Prompt sent with every analyzed image.
    pub vision_prompt: String,
    /// Completion token cap for scene analysis.
    pub vision_max_tokens: u32,
    /// Timeout for session creation in seconds.
    pub session_timeout_s: u64,
    /// Timeout for scene analysis in seconds.
    pub vision_timeout_s: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            realtime_model: "gpt-realtime-mini-2025-10-06".to_string(),
            voice: "alloy".to_string(),
            vision_model: "gpt-4o".to_string(),
            vision_prompt: "Describe the workspace and what should happen next.".to_string(),
            vision_max_tokens: 400,
            session_timeout_s: 30,
            vision_timeout_s: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClientSecret {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Client for realtime sessions and vision analysis.
#[derive(Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    config: ProviderConfig,
    api_key: String,
}

impl ProviderClient {
    pub fn new(config: ProviderConfig, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("voice-arm-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            config,
            api_key: api_key.into(),
        })
    }

    /// Returns the provider configuration.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| classify(e, timeout))?;
        if !status.is_success() {
            tracing::warn!(path, status = status.as_u16(), "Upstream rejected request");
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    /// Requests an ephemeral key for a realtime voice session.
    pub async fn create_client_secret(&self, options: SessionOptions) -> Result<String, ProviderError> {
        let request =
            RealtimeSessionRequest::new(&self.config.realtime_model, &self.config.voice, options);
        let timeout = Duration::from_secs(self.config.session_timeout_s);

        let text = self
            .post_json("realtime/client_secrets", &request, timeout)
            .await?;
        let secret: ClientSecret = serde_json::from_str(&text)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        Ok(secret.value)
    }

    /// Asks the vision model to describe a base64 PNG.
    pub async fn describe_image(&self, image_base64: &str) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.config.vision_model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": self.config.vision_prompt},
                    {
                        "type": "image_url",
                        "image_url": {"url": format!("data:image/png;base64,{image_base64}")}
                    }
                ]
            }],
            "max_tokens": self.config.vision_max_tokens,
        });
        let timeout = Duration::from_secs(self.config.vision_timeout_s);

        let text = self.post_json("chat/completions", &body, timeout).await?;
        let completion: ChatCompletion = serde_json::from_str(&text)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse("no completion content".to_string()))
    }
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("api_base", &self.config.api_base)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::Transport(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn client(api_base: String) -> ProviderClient {
        ProviderClient::new(
            ProviderConfig {
                api_base,
                vision_timeout_s: 1,
                ..Default::default()
            },
            "sk-test",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_client_secret_sends_manifest() {
        let router = Router::new().route(
            "/v1/realtime/client_secrets",
            post(|headers: axum::http::HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["session"]["tools"][1]["name"], "run_pick_and_place");
                Json(serde_json::json!({"value": "ek_123", "expires_at": 0}))
            }),
        );
        let base = serve(router).await;

        let key = client(base)
            .create_client_secret(SessionOptions::default())
            .await
            .unwrap();
        assert_eq!(key, "ek_123");
    }

    #[tokio::test]
    async fn test_upstream_error_keeps_status_and_body() {
        let router = Router::new().route(
            "/v1/realtime/client_secrets",
            post(|| async { (StatusCode::UNAUTHORIZED, "invalid api key") }),
        );
        let base = serve(router).await;

        let err = client(base)
            .create_client_secret(SessionOptions::default())
            .await
            .unwrap_err();
        match err {
            ProviderError::Upstream { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid api key");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_describe_image() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "gpt-4o");
                assert_eq!(body["max_tokens"], 400);
                let url = body["messages"][0]["content"][1]["image_url"]["url"]
                    .as_str()
                    .unwrap()
                    .to_string();
                assert!(url.starts_with("data:image/png;base64,"));
                Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": "Two carrots on the plate."}}]
                }))
            }),
        );
        let base = serve(router).await;

        let description = client(base).describe_image("iVBORw0KGgo=").await.unwrap();
        assert_eq!(description, "Two carrots on the plate.");
    }

    #[tokio::test]
    async fn test_vision_timeout_is_reported() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "late"
            }),
        );
        let base = serve(router).await;

        let err = client(base).describe_image("AAAA").await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_missing_choices_is_malformed() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(serde_json::json!({"choices": []})) }),
        );
        let base = serve(router).await;

        let err = client(base).describe_image("AAAA").await.unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = client("http://localhost/v1".to_string());
        assert!(!format!("{client:?}").contains("sk-test"));
    }
}
