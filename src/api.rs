//! Chat-completion client with exponential backoff retry logic.
//!
//! This module talks to an OpenAI-compatible `/chat/completions` endpoint.
//! Both the relevance classifier and the report synthesizer go through it.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait defining async LLM interaction
//! - [`OpenAiChat`]: the HTTP implementation
//! - [`RetryAsk`]: decorator that adds retry logic to any `AskAsync` implementation
//!
//! # Retry Strategy
//!
//! - 2 retries by default, the same budget the hosted SDKs apply
//! - Exponential backoff starting at 1 second, capped at 30 seconds
//! - Random jitter (0-250ms) added to every delay

use rand::{Rng, rng};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

use crate::error::{Error, Result};

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body of a `/chat/completions` request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Trait for async LLM interaction.
///
/// Implementors send a chat request and return the model's answer. The
/// abstraction lets decorators (retries) and test doubles stand in for the
/// HTTP client.
pub trait AskAsync {
    /// The type of response returned by the LLM.
    type Response;

    /// Send a chat request to the LLM and receive a response.
    async fn ask(&self, request: &ChatRequest) -> Result<Self::Response>;
}

/// Wrapper that adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// # Backoff Strategy
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying LLM client to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Create a new retry wrapper around an existing [`AskAsync`] implementation.
    ///
    /// ```ignore
    /// let client = OpenAiChat::new(api_key);
    /// let retry_client = RetryAsk::new(client, 2, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "debug", skip_all, fields(model = %request.model))]
    async fn ask(&self, request: &ChatRequest) -> Result<Self::Response> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(request).await {
                Ok(resp) => {
                    return Ok(resp);
                }
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    if !delay.is_zero() {
                        let jitter_ms: u64 = rng().random_range(0..=250);
                        delay += StdDuration::from_millis(jitter_ms);
                    }

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// HTTP client for an OpenAI-compatible chat-completion endpoint.
#[derive(Clone)]
pub struct OpenAiChat {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiChat {
    pub fn new(api_key: &str) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.to_string(),
            base_url: OPENAI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| Error::MissingCredential("OPENAI_API_KEY"))?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}

impl fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AskAsync for OpenAiChat {
    type Response = String;

    #[instrument(level = "debug", skip_all, fields(model = %request.model))]
    async fn ask(&self, request: &ChatRequest) -> Result<Self::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let t0 = Instant::now();

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!(elapsed_ms = t0.elapsed().as_millis(), status, "Chat completion failed");
            return Err(Error::Status { status, url, body });
        }

        let body: ChatResponse = response.json().await?;
        debug!(elapsed_ms = t0.elapsed().as_millis(), "Chat completion succeeded");
        first_choice_content(body)
    }
}

fn first_choice_content(body: ChatResponse) -> Result<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .ok_or(Error::EmptyCompletion)
}

/// Build the production client: HTTP with the default retry budget.
pub fn chat_client(api_key: &str, base_url: Option<&str>) -> RetryAsk<OpenAiChat> {
    let mut client = OpenAiChat::new(api_key);
    if let Some(url) = base_url {
        client = client.with_base_url(url);
    }
    RetryAsk::new(client, 2, StdDuration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    struct Flaky {
        failures: usize,
        calls: Cell<usize>,
    }

    impl AskAsync for Flaky {
        type Response = String;

        async fn ask(&self, _request: &ChatRequest) -> Result<String> {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            if n <= self.failures {
                Err(Error::Status {
                    status: 503,
                    url: "http://llm.test".to_string(),
                    body: String::new(),
                })
            } else {
                Ok("ok".to_string())
            }
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage::user("hi")],
            temperature: 0.1,
            max_tokens: Some(150),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_within_budget() {
        let api = RetryAsk::new(
            Flaky {
                failures: 2,
                calls: Cell::new(0),
            },
            2,
            StdDuration::ZERO,
        );
        assert_eq!(api.ask(&request()).await.unwrap(), "ok");
        assert_eq!(api.inner.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let api = RetryAsk::new(
            Flaky {
                failures: 10,
                calls: Cell::new(0),
            },
            2,
            StdDuration::ZERO,
        );
        assert!(matches!(
            api.ask(&request()).await,
            Err(Error::Status { status: 503, .. })
        ));
        assert_eq!(api.inner.calls.get(), 3);
    }

    #[test]
    fn test_request_serialization_omits_missing_max_tokens() {
        let mut req = request();
        req.max_tokens = None;
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_first_choice_content() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  Classification: RELEVANT \n"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice_content(body).unwrap(), "Classification: RELEVANT");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(first_choice_content(empty), Err(Error::EmptyCompletion)));
    }

    #[test]
    fn test_with_base_url_trims_slash() {
        let client = OpenAiChat::new("k").with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }
}
