//! Chat/vision delegate used to canonicalise free-text filters and to
//! classify uploaded images.
//!
//! Two implementations:
//! - [`OpenAiChatService`] talks to an OpenAI-compatible `/chat/completions`
//!   endpoint.
//! - [`PassthroughChatService`] returns the input unchanged and is used when
//!   no endpoint is configured.
//!
//! Nothing here retries. A failed call is reported to the caller as-is.

use crate::models::image::ImageUpload;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat service not configured: {0}")]
    NotConfigured(String),
    #[error("chat request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("chat service returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("chat service returned an empty answer")]
    EmptyResponse,
    #[error("chat service returned invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

pub type ChatResult<T> = Result<T, ChatError>;

/// Normalisation and vision operations consumed by the handlers.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Map free text to the canonical municipality name.
    async fn select_location(&self, text: &str) -> ChatResult<String>;

    /// Map free text to the canonical item category.
    async fn select_category(&self, text: &str) -> ChatResult<String>;

    /// Classify an image. The shape of the answer is defined by the delegate.
    async fn process_image(&self, image: &ImageUpload) -> ChatResult<serde_json::Value>;
}

const LOCATION_PROMPT: &str = "You normalise Japanese place names for a lost-and-found database. \
Reply with only the canonical municipality name (市区町村, e.g. 渋谷区) that the user's text refers to, \
with no punctuation or explanation.";

const CATEGORY_PROMPT: &str = "You normalise item categories for a lost-and-found database. \
Reply with only the single canonical category name (中分類) that best matches the user's text, \
with no punctuation or explanation.";

const IMAGE_PROMPT: &str = "Classify the lost item in this photo. Reply with a JSON object with the keys \
\"categoryName\" (canonical 中分類), \"itemName\", \"color\" (one of black, white, gray, silver, gold, red, \
blue, green, yellow, orange, pink, purple, brown, beige, transparent, other) and \"description\".";

#[derive(Clone)]
pub struct OpenAiConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

// Keeps the API key out of the startup log line.
impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

pub struct OpenAiChatService {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiChatService {
    pub fn new(config: OpenAiConfig) -> ChatResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> ChatResult<String> {
        let mut builder = self.client.post(self.completions_url()).json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(model = %self.config.model, "sending chat completion request");
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        first_answer(parsed)
    }

    async fn normalise(&self, system_prompt: &str, text: &str) -> ChatResult<String> {
        let request = ChatRequest {
            model: &self.config.model,
            temperature: 0.0,
            response_format: None,
            messages: vec![
                ChatMessage::text("system", system_prompt),
                ChatMessage::text("user", text),
            ],
        };
        let answer = self.complete(&request).await?;
        let canonical = clean_answer(&answer);
        if canonical.is_empty() {
            return Err(ChatError::EmptyResponse);
        }
        tracing::info!(input = %text, canonical = %canonical, "normalised filter value");
        Ok(canonical)
    }
}

#[async_trait]
impl ChatService for OpenAiChatService {
    async fn select_location(&self, text: &str) -> ChatResult<String> {
        self.normalise(LOCATION_PROMPT, text).await
    }

    async fn select_category(&self, text: &str) -> ChatResult<String> {
        self.normalise(CATEGORY_PROMPT, text).await
    }

    async fn process_image(&self, image: &ImageUpload) -> ChatResult<serde_json::Value> {
        let request = ChatRequest {
            model: &self.config.model,
            temperature: 0.0,
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
            messages: vec![ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: IMAGE_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: data_url(image),
                        },
                    },
                ]),
            }],
        };

        tracing::info!(
            file_name = %image.file_name,
            size = image.data.len(),
            "sending image for classification"
        );
        let answer = self.complete(&request).await?;
        Ok(serde_json::from_str(&answer)?)
    }
}

/// Identity normaliser for deployments without a chat endpoint.
#[derive(Debug, Default, Clone)]
pub struct PassthroughChatService;

#[async_trait]
impl ChatService for PassthroughChatService {
    async fn select_location(&self, text: &str) -> ChatResult<String> {
        Ok(text.trim().to_string())
    }

    async fn select_category(&self, text: &str) -> ChatResult<String> {
        Ok(text.trim().to_string())
    }

    async fn process_image(&self, _image: &ImageUpload) -> ChatResult<serde_json::Value> {
        Err(ChatError::NotConfigured(
            "set CHAT_ENDPOINT to enable image classification".into(),
        ))
    }
}

/// Encode an image as a `data:` URL for vision requests.
fn data_url(image: &ImageUpload) -> String {
    format!(
        "data:{};base64,{}",
        image.content_type_or_default(),
        general_purpose::STANDARD.encode(&image.data)
    )
}

/// Strip whitespace and quoting that models tend to wrap answers in.
fn clean_answer(answer: &str) -> String {
    answer
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '「' | '」' | '。' | '.'))
        .trim()
        .to_string()
}

fn first_answer(response: ChatResponse) -> ChatResult<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or(ChatError::EmptyResponse)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

impl ChatMessage {
    fn text(role: &'static str, text: &str) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AnswerMessage,
}

#[derive(Debug, Deserialize)]
struct AnswerMessage {
    content: Option<String>,
}
