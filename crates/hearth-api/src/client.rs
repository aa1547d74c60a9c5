//! Client for an OpenAI-compatible chat-completion endpoint.

use std::time::Duration;

use hearth_types::{ApiError, ChatCompletionRequest, ChatCompletionResponse, CompletionProvider};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};

/// Default request timeout for one completion round.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for a locally hosted chat-completion endpoint.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
}

impl ChatClient {
    /// Create a new client for `{base_url}/v1/chat/completions`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self { http, base_url })
    }

    /// Send one chat-completion request and decode the response body.
    ///
    /// Failures are fatal to the round; there is no retry here — the
    /// orchestrator treats any round failure as the whole exchange failing.
    pub async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = serde_json::to_string(request).map_err(|e| ApiError::BadRequest {
            message: format!("Failed to serialize request: {e}"),
        })?;

        tracing::debug!("POST {url} ({} messages)", request.messages.len());

        let response = self
            .http
            .post(&url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout
                } else {
                    ApiError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body_text));
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        serde_json::from_str(&body_text).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl CompletionProvider for ChatClient {
    fn complete<'a>(
        &'a self,
        request: &'a ChatCompletionRequest,
    ) -> std::pin::Pin<
        Box<dyn Future<Output = Result<ChatCompletionResponse, ApiError>> + Send + 'a>,
    > {
        Box::pin(ChatClient::complete(self, request))
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// Classify an HTTP error response into a typed ApiError.
fn classify_error(status: u16, body: &str) -> ApiError {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: Option<ErrorDetail>,
    }
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum ErrorDetail {
        Structured { message: Option<String> },
        Plain(String),
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| match e {
            ErrorDetail::Structured { message } => message,
            ErrorDetail::Plain(message) => Some(message),
        })
        .unwrap_or_else(|| body.to_string());

    match status {
        401 | 403 => ApiError::Auth { message },
        400..=499 => ApiError::BadRequest { message },
        _ => ApiError::Server { status, message },
    }
}
