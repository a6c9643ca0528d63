//! The external LLM collaborator interface and the bundled
//! OpenAI-compatible default adapter. Swappable: anything implementing
//! `LLMClient` can back the wrapper in `llm.rs`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use crate::error::CoreError;

/// What the wrapper hands the client for a single article.
#[derive(Clone, Debug)]
pub struct ArticleText {
    pub title: String,
    pub text: String,
}

#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Returns the raw response text for one article; the wrapper owns
    /// tolerant parsing, caching and retries.
    async fn complete(&self, prompt: &str) -> Result<String, CoreError>;

    fn model_id(&self) -> &str;
}

/// Default adapter: any OpenAI chat-completions-compatible endpoint.
pub struct OpenAiLlmClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl OpenAiLlmClient {
    pub fn new(http: reqwest::Client, api_base: String, api_key: Option<String>, model: String, timeout: Duration) -> Self {
        Self { http, api_base, api_key, model, timeout }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: serde_json::Value,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[async_trait]
impl LLMClient for OpenAiLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, CoreError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            response_format: json!({ "type": "json_object" }),
            temperature: 0.1,
        };

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.api_base.trim_end_matches('/')))
            .timeout(self.timeout)
            .json(&body);

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let parsed: ChatResponse = response.json().await.map_err(CoreError::from)?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CoreError::ParseError("empty choices array".into()))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
