//! Generation backends
//!
//! The router talks to a [`GenerationBackend`]; [`OpenRouterBackend`] is the
//! production implementation speaking the OpenAI-compatible chat completions
//! protocol.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BackendConfig;
use crate::context::{ChatRole, ContentPart, ConversationTurn};
use crate::error::{CoreError, Result};

/// A single completion request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model_id: String,
    pub system_prompt: String,
    pub messages: Vec<ConversationTurn>,
}

/// Token accounting reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendResponse {
    /// Raw generated text, possibly including reasoning
    pub text: String,
    /// The model that actually served the request
    pub model_id: String,
    pub usage: Usage,
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn complete(&self, request: GenerationRequest) -> Result<BackendResponse>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: WireContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(&'a str),
    Parts(Vec<WirePart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: WireImage<'a> },
    File { file: WireFile<'a> },
}

#[derive(Debug, Serialize)]
struct WireImage<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct WireFile<'a> {
    filename: &'a str,
    file_data: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
}

impl<'a> ChatCompletionRequest<'a> {
    fn from_request(request: &'a GenerationRequest) -> Self {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(WireMessage {
                role: "system",
                content: WireContent::Text(&request.system_prompt),
            });
        }
        messages.extend(request.messages.iter().map(wire_message));

        Self {
            model: &request.model_id,
            messages,
        }
    }
}

fn wire_message(turn: &ConversationTurn) -> WireMessage<'_> {
    let role = match turn.role() {
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    };

    // plain strings keep assistant turns compatible with every provider
    let content = match turn.content() {
        [ContentPart::Text { text }] => WireContent::Text(text),
        parts => WireContent::Parts(
            parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => WirePart::Text { text },
                    ContentPart::Image { url } => WirePart::ImageUrl {
                        image_url: WireImage { url },
                    },
                    ContentPart::File { url, filename, .. } => WirePart::File {
                        file: WireFile {
                            filename,
                            file_data: url,
                        },
                    },
                })
                .collect(),
        ),
    };

    WireMessage { role, content }
}

/// OpenRouter chat completions client
#[derive(Debug, Clone)]
pub struct OpenRouterBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    app_url: Option<String>,
    app_title: Option<String>,
}

impl OpenRouterBackend {
    pub fn new(config: &BackendConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            app_url: config.app_url.clone(),
            app_title: config.app_title.clone(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl GenerationBackend for OpenRouterBackend {
    async fn complete(&self, request: GenerationRequest) -> Result<BackendResponse> {
        let url = self.completions_url();
        let body = ChatCompletionRequest::from_request(&request);

        debug!(
            model = %request.model_id,
            turns = request.messages.len(),
            "sending completion request"
        );

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body);
        if let Some(app_url) = &self.app_url {
            builder = builder.header("HTTP-Referer", app_url);
        }
        if let Some(title) = &self.app_title {
            builder = builder.header("X-Title", title);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::ProviderHttpError {
                url,
                status: status.as_u16(),
                body,
            });
        }

        let raw = response.text().await?;
        let parsed: ChatCompletionResponse =
            serde_json::from_str(&raw).map_err(|e| CoreError::SerializationError {
                data_type: "chat completion response".to_string(),
                cause: e,
            })?;

        into_backend_response(parsed, &request.model_id)
    }
}

fn into_backend_response(
    parsed: ChatCompletionResponse,
    requested_model: &str,
) -> Result<BackendResponse> {
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| CoreError::GenerationFailed {
            model_id: requested_model.to_string(),
            cause: "response contained no message content".to_string(),
        })?;

    let usage = parsed
        .usage
        .map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(BackendResponse {
        text,
        model_id: parsed
            .model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| requested_model.to_string()),
        usage,
    })
}
