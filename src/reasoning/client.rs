use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use super::types::LlmClient;
use super::ReasoningError;

/// Sampling temperature for every call. Low, to keep the JSON shape stable.
const TEMPERATURE: f32 = 0.2;

/// OpenAI-compatible chat-completion client (Ollama, vLLM, llama.cpp server).
pub struct ChatCompletionClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl ChatCompletionClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, ReasoningError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ReasoningError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
            timeout_secs,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> ReasoningError {
        if e.is_connect() {
            ReasoningError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            ReasoningError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
        } else {
            ReasoningError::HttpClient(e.to_string())
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

/// `choices[0].message.content`, or empty when the envelope has none.
fn envelope_content(envelope: &Value) -> String {
    envelope
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Parse a `Retry-After` header given in seconds.
pub(crate) fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

impl LlmClient for ChatCompletionClient {
    fn complete(&self, system: &str, prompt: &str) -> Result<String, ReasoningError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature: TEMPERATURE,
            stream: false,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after_secs(response.headers());
            tracing::warn!(retry_after = ?retry_after, "Reasoning endpoint rate limited");
            return Err(ReasoningError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Reasoning endpoint returned error status");
            return Err(ReasoningError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Value = response
            .json()
            .map_err(|e| ReasoningError::ResponseParsing(e.to_string()))?;

        Ok(envelope_content(&envelope))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// One scripted outcome for `MockLlmClient`.
#[derive(Debug, Clone)]
pub enum MockReply {
    Content(String),
    RateLimited(Option<u64>),
    Upstream(u16),
}

/// Mock LLM client for testing. Replays a script; the last entry repeats
/// once the script is exhausted.
pub struct MockLlmClient {
    script: Vec<MockReply>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self::scripted(vec![MockReply::Content(response.to_string())])
    }

    pub fn sequence(responses: &[&str]) -> Self {
        Self::scripted(
            responses
                .iter()
                .map(|r| MockReply::Content(r.to_string()))
                .collect(),
        )
    }

    pub fn scripted(script: Vec<MockReply>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// User prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl LlmClient for MockLlmClient {
    fn complete(&self, _system: &str, prompt: &str) -> Result<String, ReasoningError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let reply = self
            .script
            .get(index)
            .or_else(|| self.script.last())
            .cloned()
            .unwrap_or(MockReply::Content(String::new()));

        match reply {
            MockReply::Content(text) => Ok(text),
            MockReply::RateLimited(retry_after) => Err(ReasoningError::RateLimited { retry_after }),
            MockReply::Upstream(status) => Err(ReasoningError::Upstream {
                status,
                body: "mock upstream failure".into(),
            }),
        }
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}

/// Serve `router` on an ephemeral localhost port from a background thread.
/// Returns the base URL.
#[cfg(test)]
pub(crate) fn spawn_stub_server(router: axum::Router) -> String {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, router).await.unwrap();
        });
    });
    format!("http://{}", rx.recv().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};

    fn stub_with(reply: fn(HeaderMap, Json<Value>) -> axum::response::Response) -> String {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| async move {
                reply(headers, Json(body))
            }),
        );
        format!("{}/v1", spawn_stub_server(router))
    }

    #[test]
    fn mock_client_replays_script_and_repeats_last() {
        let client = MockLlmClient::sequence(&["first", "second"]);
        assert_eq!(client.complete("s", "p1").unwrap(), "first");
        assert_eq!(client.complete("s", "p2").unwrap(), "second");
        assert_eq!(client.complete("s", "p3").unwrap(), "second");
        assert_eq!(client.call_count(), 3);
        assert_eq!(client.prompts(), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn mock_client_scripts_failures() {
        let client = MockLlmClient::scripted(vec![
            MockReply::RateLimited(Some(7)),
            MockReply::Upstream(503),
        ]);
        assert!(matches!(
            client.complete("s", "p"),
            Err(ReasoningError::RateLimited { retry_after: Some(7) })
        ));
        assert!(matches!(
            client.complete("s", "p"),
            Err(ReasoningError::Upstream { status: 503, .. })
        ));
    }

    #[test]
    fn constructor_trims_trailing_slash_and_blank_key() {
        let client =
            ChatCompletionClient::new("http://localhost:11434/v1/", "medgemma", Some("  ".into()), 30)
                .unwrap();
        assert_eq!(client.base_url, "http://localhost:11434/v1");
        assert!(client.api_key.is_none());
        assert_eq!(client.model(), "medgemma");
    }

    #[test]
    fn envelope_content_handles_missing_fields() {
        let full = serde_json::json!({"choices": [{"message": {"content": "{\"a\":1}"}}]});
        assert_eq!(envelope_content(&full), "{\"a\":1}");
        assert_eq!(envelope_content(&serde_json::json!({"choices": []})), "");
        assert_eq!(envelope_content(&serde_json::json!({})), "");
    }

    #[test]
    fn completes_against_stub_endpoint() {
        let base = stub_with(|headers, Json(body)| {
            assert_eq!(body["model"], "medgemma");
            assert_eq!(body["messages"][0]["role"], "system");
            assert_eq!(body["messages"][1]["content"], "hello");
            assert_eq!(
                headers.get("authorization").and_then(|v| v.to_str().ok()),
                Some("Bearer secret")
            );
            Json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"question\":\"Fever?\"}"}}]
            }))
            .into_response()
        });
        let client = ChatCompletionClient::new(&base, "medgemma", Some("secret".into()), 5).unwrap();
        assert_eq!(client.complete("sys", "hello").unwrap(), "{\"question\":\"Fever?\"}");
    }

    #[test]
    fn rate_limit_is_distinct() {
        let base = stub_with(|_, _| {
            (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "12")], "slow down").into_response()
        });
        let client = ChatCompletionClient::new(&base, "m", None, 5).unwrap();
        match client.complete("s", "p") {
            Err(ReasoningError::RateLimited { retry_after }) => assert_eq!(retry_after, Some(12)),
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[test]
    fn server_error_maps_to_upstream() {
        let base = stub_with(|_, _| (StatusCode::BAD_GATEWAY, "down").into_response());
        let client = ChatCompletionClient::new(&base, "m", None, 5).unwrap();
        match client.complete("s", "p") {
            Err(ReasoningError::Upstream { status, body }) => {
                assert_eq!(status, 502);
                assert_eq!(body, "down");
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }

    #[test]
    fn refused_connection_maps_to_connection_error() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client =
            ChatCompletionClient::new(&format!("http://127.0.0.1:{port}/v1"), "m", None, 5).unwrap();
        assert!(matches!(
            client.complete("s", "p"),
            Err(ReasoningError::Connection(_))
        ));
    }
}
