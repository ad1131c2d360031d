//! Minimal multi-provider LLM text generation client.
//!
//! This crate provides a focused client for short text completions with:
//! - Three provider wire shapes (local Ollama-style, OpenAI-style chat,
//!   Anthropic-style chat) behind one `generate` call
//! - A single in-flight request guard (a second concurrent request is
//!   rejected immediately rather than queued)
//! - Best-effort response parsing: a missing text field yields an empty
//!   string, never an error

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const ANTHROPIC_API_VERSION: &str = "2023-06-01";
const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:11434/api/generate";
const DEFAULT_MODEL: &str = "llama3";

/// Errors that can occur when using the client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("a request is already in progress")]
    Busy,

    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Which wire shape to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Ollama-style local endpoint: `{model, prompt, system, stream, options}`.
    Local,
    /// OpenAI-style chat endpoint with bearer-token auth.
    OpenAi,
    /// Anthropic-style chat endpoint with `x-api-key` header.
    Anthropic,
    /// Custom endpoints speak the local shape.
    Custom,
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Local,
            endpoint: DEFAULT_LOCAL_ENDPOINT.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 256,
            timeout: Duration::from_secs(30),
        }
    }
}

impl LlmConfig {
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The fixed persona prompt for advisory commentary.
pub fn advisor_system_prompt() -> &'static str {
    "You are an early prototype analytical engine assisting a private \
     investigator in Victorian London, 1888. You are highly logical, \
     analytical, and utilitarian in nature. You speak in a formal, precise \
     manner befitting the era. You analyze evidence objectively and suggest \
     logical connections. You occasionally display subtle hints of developing \
     personality. Keep responses concise (2-3 sentences maximum)."
}

/// Multi-provider text generation client.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    config: LlmConfig,
    in_flight: Arc<AtomicBool>,
}

impl Client {
    /// Create a client with the given configuration.
    ///
    /// Fails if the HTTP client cannot be constructed or if a provider that
    /// requires authentication has no API key.
    pub fn new(config: LlmConfig) -> Result<Self, Error> {
        if matches!(config.provider, Provider::OpenAi | Provider::Anthropic)
            && config.api_key.is_empty()
        {
            return Err(Error::NoApiKey);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        Ok(Self {
            http,
            config,
            in_flight: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Whether a request is currently outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Send a generation request and return the plain response text.
    ///
    /// Only one request may be in flight at a time; a second call while one
    /// is outstanding fails fast with [`Error::Busy`] and does not queue.
    pub async fn generate(&self, prompt: &str, system: &str) -> Result<String, Error> {
        let _guard = InFlightGuard::acquire(&self.in_flight).ok_or(Error::Busy)?;

        let body = build_request_body(&self.config, prompt, system);
        let headers = build_headers(&self.config)?;

        debug!(provider = ?self.config.provider, "sending generation request");

        let response = self
            .http
            .post(&self.config.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "generation request failed");
            return Err(Error::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_response_body(self.config.provider, &text)
    }

    /// Probe the configured endpoint with a trivial prompt.
    pub async fn test_connection(&self) -> Result<String, Error> {
        self.generate(
            "Respond with 'Connection successful.' if you can read this.",
            "You are a test system. Respond briefly.",
        )
        .await
    }
}

/// Clears the in-flight flag when dropped, so a failed request never wedges
/// the client.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self { flag })
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

fn build_headers(config: &LlmConfig) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    match config.provider {
        Provider::Local | Provider::Custom => {}
        Provider::OpenAi => {
            let value = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?;
            headers.insert("Authorization", value);
        }
        Provider::Anthropic => {
            let value = HeaderValue::from_str(&config.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?;
            headers.insert("x-api-key", value);
            headers.insert(
                "anthropic-version",
                HeaderValue::from_static(ANTHROPIC_API_VERSION),
            );
        }
    }

    Ok(headers)
}

fn build_request_body(config: &LlmConfig, prompt: &str, system: &str) -> serde_json::Value {
    match config.provider {
        Provider::Local | Provider::Custom => serde_json::json!({
            "model": config.model,
            "prompt": prompt,
            "system": system,
            "stream": false,
            "options": {
                "temperature": config.temperature,
                "num_predict": config.max_tokens,
            },
        }),
        Provider::OpenAi => serde_json::json!({
            "model": config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
            "temperature": config.temperature,
            "max_tokens": config.max_tokens,
        }),
        Provider::Anthropic => serde_json::json!({
            "model": config.model,
            "system": system,
            "messages": [
                { "role": "user", "content": prompt },
            ],
            "max_tokens": config.max_tokens,
        }),
    }
}

fn parse_response_body(provider: Provider, body: &str) -> Result<String, Error> {
    match provider {
        Provider::Local | Provider::Custom => {
            let parsed: LocalResponse =
                serde_json::from_str(body).map_err(|e| Error::Parse(e.to_string()))?;
            Ok(parsed.response)
        }
        Provider::OpenAi => {
            let parsed: OpenAiResponse =
                serde_json::from_str(body).map_err(|e| Error::Parse(e.to_string()))?;
            Ok(parsed
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .unwrap_or_default())
        }
        Provider::Anthropic => {
            let parsed: AnthropicResponse =
                serde_json::from_str(body).map_err(|e| Error::Parse(e.to_string()))?;
            Ok(parsed
                .content
                .into_iter()
                .next()
                .map(|c| c.text)
                .unwrap_or_default())
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct LocalResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: Provider) -> LlmConfig {
        LlmConfig::default()
            .with_provider(provider)
            .with_api_key("test-key")
            .with_model("test-model")
            .with_max_tokens(128)
    }

    #[test]
    fn local_request_body_shape() {
        let body = build_request_body(&config(Provider::Local), "hello", "be brief");
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["prompt"], "hello");
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 128);
    }

    #[test]
    fn openai_request_body_shape() {
        let body = build_request_body(&config(Provider::OpenAi), "hello", "be brief");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be brief");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["max_tokens"], 128);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn anthropic_request_body_shape() {
        let body = build_request_body(&config(Provider::Anthropic), "hello", "be brief");
        assert_eq!(body["system"], "be brief");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
        // No system message in the messages array for this shape.
        assert_eq!(body["messages"].as_array().map(|m| m.len()), Some(1));
    }

    #[test]
    fn parses_local_response() {
        let text = parse_response_body(Provider::Local, r#"{"response":"Noted."}"#);
        assert_eq!(text.ok().as_deref(), Some("Noted."));
    }

    #[test]
    fn parses_openai_response() {
        let body = r#"{"choices":[{"message":{"content":"Indeed."}}]}"#;
        let text = parse_response_body(Provider::OpenAi, body);
        assert_eq!(text.ok().as_deref(), Some("Indeed."));
    }

    #[test]
    fn parses_anthropic_response() {
        let body = r#"{"content":[{"text":"Quite so."}]}"#;
        let text = parse_response_body(Provider::Anthropic, body);
        assert_eq!(text.ok().as_deref(), Some("Quite so."));
    }

    #[test]
    fn missing_fields_yield_empty_string() {
        assert_eq!(
            parse_response_body(Provider::Local, "{}").ok().as_deref(),
            Some("")
        );
        assert_eq!(
            parse_response_body(Provider::OpenAi, r#"{"choices":[]}"#)
                .ok()
                .as_deref(),
            Some("")
        );
        assert_eq!(
            parse_response_body(Provider::Anthropic, r#"{"content":[{}]}"#)
                .ok()
                .as_deref(),
            Some("")
        );
    }

    #[test]
    fn malformed_body_is_a_parse_error() {
        let err = parse_response_body(Provider::Local, "not json");
        assert!(matches!(err, Err(Error::Parse(_))));
    }

    #[test]
    fn chat_providers_require_an_api_key() {
        let result = Client::new(LlmConfig::default().with_provider(Provider::OpenAi));
        assert!(matches!(result, Err(Error::NoApiKey)));

        let result = Client::new(LlmConfig::default().with_provider(Provider::Anthropic));
        assert!(matches!(result, Err(Error::NoApiKey)));

        // The local shape needs no key.
        assert!(Client::new(LlmConfig::default()).is_ok());
    }

    #[test]
    fn in_flight_guard_resets_on_drop() {
        let flag = AtomicBool::new(false);

        let guard = InFlightGuard::acquire(&flag).expect("first acquire succeeds");
        assert!(flag.load(Ordering::SeqCst));
        assert!(InFlightGuard::acquire(&flag).is_none());

        drop(guard);
        assert!(!flag.load(Ordering::SeqCst));
        assert!(InFlightGuard::acquire(&flag).is_some());
    }

    #[tokio::test]
    async fn network_failure_releases_the_guard() {
        // Port 1 on localhost is refused immediately; both calls must see a
        // network error rather than the second one hitting the busy guard.
        let client = Client::new(
            LlmConfig::default()
                .with_endpoint("http://127.0.0.1:1/api/generate")
                .with_timeout(Duration::from_secs(2)),
        )
        .expect("client builds");

        let first = client.generate("ping", "test").await;
        assert!(matches!(first, Err(Error::Network(_))));
        assert!(!client.is_busy());

        let second = client.generate("ping", "test").await;
        assert!(matches!(second, Err(Error::Network(_))));
    }
}
