//! Relevance classification through a hosted chat model.
//!
//! The model is asked whether an article is about cybersecurity *and*
//! concerns the DACH region, and to answer in two labeled lines:
//!
//! ```text
//! Classification: RELEVANT
//! Reason: A ransomware attack hit a Bavarian hospital.
//! ```
//!
//! # Failure bias
//!
//! | Situation | Result |
//! |-----------|--------|
//! | no credential configured | relevant, fixed reason, no request made |
//! | request fails (transport, non-2xx, retries exhausted) | relevant, reason carries the error |
//! | response arrives without a `Classification:` line | not relevant, `Classification failed` |
//!
//! Outages keep articles in the report; garbled answers keep them out.

use tracing::{debug, instrument, warn};

use crate::api::{AskAsync, ChatMessage, ChatRequest};
use crate::models::Article;
use crate::utils::take_chars;

/// Characters of scraped content included in the prompt.
pub const CONTENT_EXCERPT_CHARS: usize = 4000;

pub const SYSTEM_PROMPT: &str = "You are a cybersecurity analyst specializing in the DACH region.";

pub const NO_CLIENT_REASON: &str = "OpenAI classification not available, including by default.";
pub const PARSE_FAILED_REASON: &str = "Classification failed";

/// Outcome of classifying one article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relevance {
    pub is_relevant: bool,
    pub reason: String,
}

/// Build the user prompt for `article`.
pub fn build_prompt(article: &Article) -> String {
    let excerpt = if article.content.is_empty() {
        "[No content available]"
    } else {
        take_chars(&article.content, CONTENT_EXCERPT_CHARS)
    };

    format!(
        "Analyze this news article to determine if it is relevant to cybersecurity in the DACH region (Germany, Austria, Switzerland).

Title: {title}

Description: {description}

Content excerpt:
{excerpt}

Questions to answer:
1. Is this article related to cybersecurity, information security, or digital security?
2. Is this article relevant to the DACH region (Germany, Austria, Switzerland)?

Based on your analysis, classify this article as either:
- RELEVANT: The article is about cybersecurity AND involves the DACH region
- NOT RELEVANT: The article is not about cybersecurity OR does not involve the DACH region

Provide your answer in this exact format:
Classification: [RELEVANT or NOT RELEVANT]
Reason: [1-2 sentence explanation for your decision]
",
        title = article.title,
        description = article.description,
    )
}

/// Value after `label` on the first line that starts with it.
///
/// Leading markdown emphasis (`**Classification:** ...`) is tolerated.
fn labeled_value<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let line = line.trim().trim_start_matches('*');
        line.strip_prefix(label)
            .map(|rest| rest.trim().trim_start_matches('*').trim())
    })
}

/// Parse the model's two-line answer.
///
/// Without a `Classification:` line the article is not relevant. Without a
/// `Reason:` line the reason stays `Classification failed`.
pub fn parse_classification(text: &str) -> Relevance {
    let mut result = Relevance {
        is_relevant: false,
        reason: PARSE_FAILED_REASON.to_string(),
    };

    if let Some(value) = labeled_value(text, "Classification:") {
        let upper = value.to_uppercase();
        result.is_relevant = !upper.contains("NOT RELEVANT") && upper.contains("RELEVANT");
    }
    if let Some(reason) = labeled_value(text, "Reason:") {
        result.reason = reason.to_string();
    }

    result
}

/// Per-article relevance classifier.
///
/// Holds no client when no credential is configured; every call then
/// short-circuits to "relevant by default".
#[derive(Debug)]
pub struct Classifier<C> {
    client: Option<C>,
    model: String,
}

impl<C> Classifier<C>
where
    C: AskAsync<Response = String>,
{
    pub fn new(client: Option<C>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    fn request(&self, article: &Article) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(build_prompt(article)),
            ],
            temperature: 0.1,
            max_tokens: Some(150),
        }
    }

    /// Classify `article`. Never fails; see the module docs for defaults.
    #[instrument(level = "debug", skip_all, fields(url = %article.url))]
    pub async fn classify(&self, article: &Article) -> Relevance {
        let Some(client) = &self.client else {
            warn!("No LLM credential; including article by default");
            return Relevance {
                is_relevant: true,
                reason: NO_CLIENT_REASON.to_string(),
            };
        };

        match client.ask(&self.request(article)).await {
            Ok(answer) => {
                debug!(%answer, "Classifier answered");
                parse_classification(&answer)
            }
            Err(e) => {
                warn!(error = %e, "Classification request failed; including article");
                Relevance {
                    is_relevant: true,
                    reason: format!("Classification error: {e}"),
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use std::sync::Mutex;

    /// Replies with a fixed answer, or fails when `answer` is `None`.
    #[derive(Debug, Default)]
    pub(crate) struct StubLlm {
        pub answer: Option<String>,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl StubLlm {
        pub(crate) fn answering(answer: &str) -> Self {
            Self {
                answer: Some(answer.to_string()),
                ..Default::default()
            }
        }

        pub(crate) fn failing() -> Self {
            Self::default()
        }
    }

    impl AskAsync for StubLlm {
        type Response = String;

        async fn ask(&self, request: &ChatRequest) -> Result<String> {
            self.requests.lock().unwrap().push(request.clone());
            self.answer.clone().ok_or(Error::Status {
                status: 500,
                url: "http://llm.test/chat/completions".to_string(),
                body: "upstream down".to_string(),
            })
        }
    }

    fn article() -> Article {
        Article {
            title: "Cyberangriff auf Zürcher Spital".to_string(),
            description: "Patientendaten betroffen".to_string(),
            content: "x".repeat(5000),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_relevant() {
        let r = parse_classification("Classification: RELEVANT\nReason: Ransomware in Zurich.");
        assert!(r.is_relevant);
        assert_eq!(r.reason, "Ransomware in Zurich.");
    }

    #[test]
    fn test_parse_not_relevant() {
        let r =
            parse_classification("Classification: NOT RELEVANT\nReason: About US elections.");
        assert!(!r.is_relevant);
        assert_eq!(r.reason, "About US elections.");
    }

    #[test]
    fn test_parse_case_insensitive_and_bold() {
        let r = parse_classification(
            "**Classification:** relevant\n**Reason:** Phishing wave in Austria.",
        );
        assert!(r.is_relevant);
        assert_eq!(r.reason, "Phishing wave in Austria.");
    }

    #[test]
    fn test_parse_missing_lines_defaults_to_not_relevant() {
        let r = parse_classification("I think this is probably about security.");
        assert!(!r.is_relevant);
        assert_eq!(r.reason, PARSE_FAILED_REASON);

        let r = parse_classification("Classification: RELEVANT");
        assert!(r.is_relevant);
        assert_eq!(r.reason, PARSE_FAILED_REASON);
    }

    #[test]
    fn test_prompt_excerpt_is_bounded() {
        let prompt = build_prompt(&article());
        assert!(prompt.contains("Title: Cyberangriff auf Zürcher Spital"));
        assert!(prompt.contains(&"x".repeat(CONTENT_EXCERPT_CHARS)));
        assert!(!prompt.contains(&"x".repeat(CONTENT_EXCERPT_CHARS + 1)));

        let empty = build_prompt(&Article::default());
        assert!(empty.contains("[No content available]"));
    }

    #[tokio::test]
    async fn test_transport_error_biases_toward_inclusion() {
        let classifier = Classifier::new(Some(StubLlm::failing()), "gpt-4o-mini");
        let r = classifier.classify(&article()).await;
        assert!(r.is_relevant);
        assert!(r.reason.starts_with("Classification error: "));
        assert!(r.reason.contains("500"));
    }

    #[tokio::test]
    async fn test_unparseable_answer_biases_toward_exclusion() {
        let classifier =
            Classifier::new(Some(StubLlm::answering("Sure! Happy to help.")), "gpt-4o-mini");
        let r = classifier.classify(&article()).await;
        assert_eq!(
            r,
            Relevance {
                is_relevant: false,
                reason: PARSE_FAILED_REASON.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_no_client_short_circuits() {
        let classifier: Classifier<StubLlm> = Classifier::new(None, "gpt-4o-mini");
        assert!(!classifier.is_available());
        let r = classifier.classify(&article()).await;
        assert!(r.is_relevant);
        assert_eq!(r.reason, NO_CLIENT_REASON);
    }

    #[tokio::test]
    async fn test_request_parameters() {
        let classifier = Classifier::new(
            Some(StubLlm::answering("Classification: RELEVANT\nReason: ok")),
            "gpt-4o-mini",
        );
        classifier.classify(&article()).await;

        let client = classifier.client.as_ref().unwrap();
        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].temperature, 0.1);
        assert_eq!(requests[0].max_tokens, Some(150));
        assert_eq!(requests[0].messages[0].content, SYSTEM_PROMPT);
    }
}
