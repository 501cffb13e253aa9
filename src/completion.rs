//! # Feature: Remote Completion
//!
//! Single-shot calls to a hosted text-generation model. Builds the prompt,
//! sends one request, trims the reply to its word target, and turns every
//! failure into one of four fixed messages.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Generative Language API client with word-count truncation

use async_trait::async_trait;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const CONFIGURATION_MESSAGE: &str = "I'm not configured correctly right now (the AI service key is missing or invalid). Please contact support.";
const RATE_LIMIT_MESSAGE: &str = "I'm getting a lot of requests at the moment. Please wait a minute and try again.";
const NETWORK_MESSAGE: &str = "I couldn't reach the AI service. Please check your connection and try again.";
const UNKNOWN_MESSAGE: &str = "Sorry, something went wrong while I was thinking about that. Please try again.";

pub const ELLIPSIS: &str = "...";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("completion failed: {0}")]
    Unknown(String),
}

impl CompletionError {
    /// Sorts a raw failure message into the error taxonomy.
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        if message.contains("API_KEY") || lowered.contains("api key") {
            CompletionError::Configuration(message.to_string())
        } else if lowered.contains("quota") || lowered.contains("limit") {
            CompletionError::RateLimited(message.to_string())
        } else if lowered.contains("network") || lowered.contains("fetch") {
            CompletionError::Network(message.to_string())
        } else {
            CompletionError::Unknown(message.to_string())
        }
    }

    /// The fixed text shown to the user in place of a reply.
    pub fn user_message(&self) -> &'static str {
        match self {
            CompletionError::Configuration(_) => CONFIGURATION_MESSAGE,
            CompletionError::RateLimited(_) => RATE_LIMIT_MESSAGE,
            CompletionError::Network(_) => NETWORK_MESSAGE,
            CompletionError::Unknown(_) => UNKNOWN_MESSAGE,
        }
    }
}

/// True when `text` is one of the fixed failure messages.
pub fn is_error_response(text: &str) -> bool {
    let text = text.trim();
    [CONFIGURATION_MESSAGE, RATE_LIMIT_MESSAGE, NETWORK_MESSAGE, UNKNOWN_MESSAGE]
        .iter()
        .any(|message| *message == text)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
}

impl GenerationConfig {
    pub const GENERAL: GenerationConfig = GenerationConfig {
        max_output_tokens: 512,
        temperature: 0.7,
        top_k: 40,
        top_p: 0.95,
    };

    pub const CONTENT: GenerationConfig = GenerationConfig {
        max_output_tokens: 1024,
        temperature: 0.9,
        top_k: 40,
        top_p: 0.95,
    };

    pub const ANALYSIS: GenerationConfig = GenerationConfig {
        max_output_tokens: 1024,
        temperature: 0.4,
        top_k: 32,
        top_p: 0.9,
    };
}

/// Anything that can turn a prompt into completion text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str, config: &GenerationConfig) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: &'a GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Debug)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    error: ApiErrorDetails,
}

#[derive(Deserialize, Debug)]
struct ApiErrorDetails {
    message: String,
    status: Option<String>,
    #[serde(default)]
    details: Vec<ApiErrorReason>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorReason {
    reason: Option<String>,
}

/// Maps a non-success response to an error.
///
/// Key problems come back as `400 INVALID_ARGUMENT` with the cause only in
/// `details[].reason`, so the reasons are folded into the classified message.
fn error_from_response(status: u16, body: &str) -> CompletionError {
    let message = match serde_json::from_str::<ApiError>(body) {
        Ok(api_error) => {
            let reasons: Vec<String> = api_error
                .error
                .details
                .into_iter()
                .filter_map(|detail| detail.reason)
                .collect();
            let mut message = format!(
                "{} ({})",
                api_error.error.message,
                api_error.error.status.unwrap_or_default()
            );
            if !reasons.is_empty() {
                message.push_str(&format!(" [{}]", reasons.join(", ")));
            }
            message
        }
        Err(_) => format!("status {}: {}", status, body),
    };

    match status {
        401 | 403 => CompletionError::Configuration(format!("API_KEY rejected: {}", message)),
        429 => CompletionError::RateLimited(message),
        _ => CompletionError::classify(&message),
    }
}

/// Client for the Generative Language `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model: String) -> Self {
        GeminiClient {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_ENDPOINT, self.model)
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, prompt: &str, config: &GenerationConfig) -> Result<String, CompletionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| CompletionError::Configuration("GEMINI_API_KEY is not set".to_string()))?;

        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: config,
        };

        debug!("Sending generateContent request | Model: {} | Prompt chars: {}", self.model, prompt.len());
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() || e.is_request() {
                    CompletionError::Network(format!("fetch failed: {}", e))
                } else {
                    CompletionError::classify(&e.to_string())
                }
            })?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| CompletionError::Network(format!("fetch failed while reading body: {}", e)))?;

        if !status.is_success() {
            let error = error_from_response(status.as_u16(), &response_text);
            error!("Generative Language API error (status {}): {}", status, error);
            return Err(error);
        }

        let parsed: GenerateResponse = serde_json::from_str(&response_text)
            .map_err(|e| CompletionError::Unknown(format!("Failed to parse completion response: {}", e)))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(CompletionError::Unknown("No text in completion response".to_string()));
        }

        info!("Completion received | Words: {}", text.split_whitespace().count());
        Ok(text.trim().to_string())
    }
}

/// Everything needed to issue one completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub context: Option<String>,
    pub instructions: String,
    pub format_instructions: String,
    pub config: GenerationConfig,
    pub target_words: usize,
    pub slack: f64,
}

impl CompletionRequest {
    pub fn prompt(&self) -> String {
        build_prompt(
            self.context.as_deref(),
            &self.instructions,
            &self.format_instructions,
        )
    }
}

/// Joins the optional context block, the task, and the formatting rules.
pub fn build_prompt(context: Option<&str>, instructions: &str, format_instructions: &str) -> String {
    let mut prompt = String::new();
    if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str("Previous conversation:\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }
    prompt.push_str(instructions.trim());
    let format_instructions = format_instructions.trim();
    if !format_instructions.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(format_instructions);
    }
    prompt
}

/// Maximum words allowed for a target, `ceil(target × slack)`.
pub fn word_limit(target_words: usize, slack: f64) -> usize {
    // Slack factors are whole percentages, so work in integers to keep the ceiling exact.
    let percent = (slack * 100.0).round().max(0.0) as usize;
    (target_words * percent).div_ceil(100)
}

/// Cuts `text` to the word limit and marks the cut with an ellipsis.
///
/// Text within the limit comes back untouched.
pub fn truncate_words(text: &str, target_words: usize, slack: f64) -> String {
    let limit = word_limit(target_words, slack);
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= limit {
        return text.to_string();
    }
    format!("{}{}", words[..limit].join(" "), ELLIPSIS)
}

/// Wraps a [`CompletionClient`] with prompt assembly and post-processing.
#[derive(Clone)]
pub struct RemoteCompletion {
    client: Arc<dyn CompletionClient>,
}

impl RemoteCompletion {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        RemoteCompletion { client }
    }

    /// Issues exactly one call. There is no retry.
    pub async fn generate(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let prompt = request.prompt();
        let text = self.client.complete(&prompt, &request.config).await?;
        Ok(truncate_words(&text, request.target_words, request.slack))
    }

    /// Like [`generate`](Self::generate) but always yields displayable text.
    pub async fn generate_text(&self, request: &CompletionRequest) -> String {
        match self.generate(request).await {
            Ok(text) => text,
            Err(e) => {
                error!("Completion failed: {}", e);
                e.user_message().to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedClient {
        reply: Result<String, CompletionError>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, prompt: &str, _config: &GenerationConfig) -> Result<String, CompletionError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }
    }

    fn request(target_words: usize, slack: f64) -> CompletionRequest {
        CompletionRequest {
            context: Some("User: hi\nAssistant: hello".to_string()),
            instructions: "Describe a good media kit.".to_string(),
            format_instructions: "Keep it short.".to_string(),
            config: GenerationConfig::GENERAL,
            target_words,
            slack,
        }
    }

    #[test]
    fn test_classify_errors() {
        assert!(matches!(
            CompletionError::classify("API_KEY_INVALID"),
            CompletionError::Configuration(_)
        ));
        assert!(matches!(
            CompletionError::classify("Resource exhausted: quota exceeded"),
            CompletionError::RateLimited(_)
        ));
        assert!(matches!(
            CompletionError::classify("Rate limit reached"),
            CompletionError::RateLimited(_)
        ));
        assert!(matches!(
            CompletionError::classify("TypeError: Failed to fetch"),
            CompletionError::Network(_)
        ));
        assert!(matches!(
            CompletionError::classify("model overloaded"),
            CompletionError::Unknown(_)
        ));
        assert!(matches!(
            CompletionError::classify("API key not valid. Please pass a valid API key. (INVALID_ARGUMENT)"),
            CompletionError::Configuration(_)
        ));
    }

    #[test]
    fn test_invalid_key_response_is_configuration_error() {
        let body = r#"{
          "error": {
            "code": 400,
            "message": "API key not valid. Please pass a valid API key.",
            "status": "INVALID_ARGUMENT",
            "details": [
              {
                "@type": "type.googleapis.com/google.rpc.ErrorInfo",
                "reason": "API_KEY_INVALID",
                "domain": "googleapis.com",
                "metadata": { "service": "generativelanguage.googleapis.com" }
              }
            ]
          }
        }"#;

        let error = error_from_response(400, body);
        assert!(matches!(error, CompletionError::Configuration(_)));
        assert!(error.to_string().contains("API_KEY_INVALID"));
        assert_eq!(error.user_message(), CONFIGURATION_MESSAGE);
    }

    #[test]
    fn test_error_responses_by_status() {
        let quota = r#"{"error": {"code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(error_from_response(429, quota), CompletionError::RateLimited(_)));
        assert!(matches!(error_from_response(403, "forbidden"), CompletionError::Configuration(_)));
        assert!(matches!(
            error_from_response(500, r#"{"error": {"code": 500, "message": "Internal error", "status": "INTERNAL"}}"#),
            CompletionError::Unknown(_)
        ));
    }

    #[test]
    fn test_user_messages_are_fixed_and_recognized() {
        let errors = [
            CompletionError::Configuration("a".into()),
            CompletionError::RateLimited("b".into()),
            CompletionError::Network("c".into()),
            CompletionError::Unknown("d".into()),
        ];
        for e in &errors {
            assert!(is_error_response(e.user_message()));
            assert!(!e.user_message().contains(&e.to_string()));
        }
        assert!(!is_error_response("A normal reply about creator rates."));
    }

    #[test]
    fn test_word_limit() {
        assert_eq!(word_limit(100, 1.1), 110);
        assert_eq!(word_limit(150, 1.2), 180);
        assert_eq!(word_limit(200, 1.15), 230);
        assert_eq!(word_limit(7, 1.3), 10);
        assert_eq!(word_limit(3, 1.15), 4);
    }

    #[test]
    fn test_truncate_over_limit() {
        let text = (1..=20).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let truncated = truncate_words(&text, 10, 1.1);
        assert!(truncated.ends_with(ELLIPSIS));
        assert_eq!(truncated.split_whitespace().count(), 11);
        assert_eq!(truncated, "w1 w2 w3 w4 w5 w6 w7 w8 w9 w10 w11...");
    }

    #[test]
    fn test_truncate_within_limit_is_unchanged() {
        let text = "  Line one.\n\nLine   two has  odd   spacing.  ";
        assert_eq!(truncate_words(text, 10, 1.2), text);
        let exact = "one two three four five six";
        assert_eq!(truncate_words(exact, 5, 1.2), exact);
    }

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt(Some("User: hi"), "Do the task.", "Be brief.");
        assert_eq!(prompt, "Previous conversation:\nUser: hi\n\nDo the task.\n\nBe brief.");

        let without_context = build_prompt(Some("   "), "Do the task.", "");
        assert_eq!(without_context, "Do the task.");
    }

    #[tokio::test]
    async fn test_generate_truncates_and_calls_once() {
        let client = Arc::new(ScriptedClient {
            reply: Ok("one two three four five six seven".to_string()),
            prompts: Mutex::new(Vec::new()),
        });
        let remote = RemoteCompletion::new(client.clone());

        let text = remote.generate(&request(4, 1.2)).await.unwrap();
        assert_eq!(text, "one two three four five...");

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("Previous conversation:"));
        assert!(prompts[0].contains("Describe a good media kit."));
    }

    #[tokio::test]
    async fn test_generate_text_maps_errors() {
        let client = Arc::new(ScriptedClient {
            reply: Err(CompletionError::classify("quota exceeded for project")),
            prompts: Mutex::new(Vec::new()),
        });
        let remote = RemoteCompletion::new(client.clone());

        let text = remote.generate_text(&request(50, 1.1)).await;
        assert_eq!(text, RATE_LIMIT_MESSAGE);
        assert!(!text.contains("quota exceeded"));
        assert_eq!(client.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_gemini_without_key_is_configuration_error() {
        let client = GeminiClient::new(None, "gemini-1.5-flash".to_string());
        let result = client.complete("hello", &GenerationConfig::GENERAL).await;
        assert!(matches!(result, Err(CompletionError::Configuration(_))));
    }

    #[test]
    fn test_generation_config_serializes_camel_case() {
        let value = serde_json::to_value(GenerationConfig::ANALYSIS).unwrap();
        assert_eq!(value["maxOutputTokens"], 1024);
        assert_eq!(value["topK"], 32);
        assert!(value.get("topP").is_some());
    }
}
