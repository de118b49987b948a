//! HTTP caption client for the supported AI providers.
//!
//! Each provider receives the image inline (base64 block or data URI) plus
//! the caption prompt, and is asked to answer with a JSON `CaptionSet`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use super::prompts::{build_caption_prompt, caption_set_schema, CAPTION_SYSTEM_PROMPT};
use super::types::{CaptionSet, ImageData};
use super::CaptionService;
use crate::error::CaptionError;

/// Default timeout for a single caption request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const MAX_TOKENS: u32 = 1024;

/// AI providers that can caption images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Claude,
    OpenAi,
    OpenRouter,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Claude => "claude",
            Provider::OpenAi => "openai",
            Provider::OpenRouter => "openrouter",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Claude => "claude-sonnet-4-20250514",
            Provider::OpenAi => "gpt-4o",
            Provider::OpenRouter => "anthropic/claude-sonnet-4",
        }
    }

    /// Keychain service id holding this provider's API key.
    pub fn keyring_service(&self) -> &'static str {
        match self {
            Provider::Claude => "captionlens-claude-api",
            Provider::OpenAi => "captionlens-openai-api",
            Provider::OpenRouter => "captionlens-openrouter-api",
        }
    }

    fn endpoint(&self) -> &'static str {
        match self {
            Provider::Claude => "https://api.anthropic.com/v1/messages",
            Provider::OpenAi => "https://api.openai.com/v1/chat/completions",
            Provider::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
        }
    }
}

impl FromStr for Provider {
    type Err = CaptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claude" => Ok(Provider::Claude),
            "openai" => Ok(Provider::OpenAi),
            "openrouter" => Ok(Provider::OpenRouter),
            other => Err(CaptionError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caption client backed by a provider's HTTP API.
pub struct HttpCaptionClient {
    provider: Provider,
    model: String,
    api_key: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl HttpCaptionClient {
    pub fn new(
        provider: Provider,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CaptionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CaptionError::Transport {
                provider: provider.to_string(),
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            provider,
            model: model.into(),
            api_key: api_key.into(),
            timeout,
            http,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post(&self, body: &serde_json::Value) -> Result<String, CaptionError> {
        let request = self
            .http
            .post(self.provider.endpoint())
            .header("content-type", "application/json")
            .json(body);

        let request = match self.provider {
            Provider::Claude => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01"),
            Provider::OpenAi | Provider::OpenRouter => {
                request.header("Authorization", format!("Bearer {}", self.api_key))
            }
        };

        let response = request.send().await.map_err(|e| {
            let err = if e.is_timeout() {
                CaptionError::Timeout(self.timeout.as_secs())
            } else {
                CaptionError::Transport {
                    provider: self.provider.to_string(),
                    message: e.to_string(),
                }
            };
            error!("{}", err);
            err
        })?;

        handle_api_response(response, self.provider).await
    }
}

#[async_trait]
impl CaptionService for HttpCaptionClient {
    async fn caption(&self, image: &ImageData) -> Result<CaptionSet, CaptionError> {
        info!(
            "Requesting captions from provider '{}' model '{}' ({} bytes, {})",
            self.provider,
            self.model,
            image.bytes().len(),
            image.mime_type()
        );

        let body = build_request_body(self.provider, &self.model, image);
        let body_text = self.post(&body).await?;
        let content = extract_message_text(self.provider, &body_text)?;
        let captions = parse_caption_set(self.provider, &content)?;

        info!(
            "Received captions from '{}': short='{}'",
            self.provider, captions.short
        );
        Ok(captions)
    }
}

/// Build the provider-specific request payload for one image.
fn build_request_body(provider: Provider, model: &str, image: &ImageData) -> serde_json::Value {
    let prompt = build_caption_prompt();

    match provider {
        Provider::Claude => serde_json::json!({
            "model": model,
            "max_tokens": MAX_TOKENS,
            "system": CAPTION_SYSTEM_PROMPT,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": image.mime_type(),
                            "data": image.to_base64()
                        }
                    },
                    {"type": "text", "text": prompt}
                ]
            }]
        }),
        Provider::OpenAi => serde_json::json!({
            "model": model,
            "max_tokens": MAX_TOKENS,
            "messages": [
                {"role": "system", "content": CAPTION_SYSTEM_PROMPT},
                {
                    "role": "user",
                    "content": [
                        {"type": "text", "text": prompt},
                        {"type": "image_url", "image_url": {"url": image.to_data_uri()}}
                    ]
                }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "caption_set",
                    "strict": true,
                    "schema": caption_set_schema()
                }
            }
        }),
        // OpenRouter forwards to many backends; json_object is the portable mode.
        Provider::OpenRouter => serde_json::json!({
            "model": model,
            "max_tokens": MAX_TOKENS,
            "messages": [
                {"role": "system", "content": CAPTION_SYSTEM_PROMPT},
                {
                    "role": "user",
                    "content": [
                        {"type": "text", "text": prompt},
                        {"type": "image_url", "image_url": {"url": image.to_data_uri()}}
                    ]
                }
            ],
            "response_format": {"type": "json_object"}
        }),
    }
}

/// Check status and extract the body, turning non-2xx into `Upstream`.
async fn handle_api_response(
    response: reqwest::Response,
    provider: Provider,
) -> Result<String, CaptionError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body);
        let err = CaptionError::Upstream {
            provider: provider.to_string(),
            status: status.as_u16(),
            message,
        };
        error!("{} - {}", err, truncate(&body, 1024));
        return Err(err);
    }

    response.text().await.map_err(|e| CaptionError::Transport {
        provider: provider.to_string(),
        message: format!("Failed to read response body: {}", e),
    })
}

/// Pull a human-readable message out of a provider error body.
///
/// Anthropic, OpenAI and OpenRouter all use `{"error": {"message": "..."}}`;
/// some gateways send `{"error": "..."}` or `{"message": "..."}` instead.
fn extract_error_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json["error"]["message"]
        .as_str()
        .or_else(|| json["error"].as_str())
        .or_else(|| json["message"].as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extract the assistant text from a provider response wrapper.
fn extract_message_text(provider: Provider, body: &str) -> Result<String, CaptionError> {
    let malformed = |detail: String| {
        let err = CaptionError::Malformed {
            provider: provider.to_string(),
            detail,
        };
        error!("{}", err);
        err
    };

    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| malformed(format!("response is not JSON: {}", e)))?;

    let text = match provider {
        // { "content": [{"type": "text", "text": "..."}] }
        Provider::Claude => json["content"]
            .as_array()
            .and_then(|blocks| blocks.iter().find_map(|b| b["text"].as_str())),
        // { "choices": [{"message": {"content": "..."}}] }
        Provider::OpenAi | Provider::OpenRouter => {
            json["choices"][0]["message"]["content"].as_str()
        }
    };

    text.map(|s| s.to_string())
        .ok_or_else(|| malformed("no text content in response".to_string()))
}

/// Parse the model's JSON answer into a complete `CaptionSet`.
fn parse_caption_set(provider: Provider, content: &str) -> Result<CaptionSet, CaptionError> {
    let cleaned = strip_markdown_json(content);
    let captions: CaptionSet = serde_json::from_str(&cleaned).map_err(|e| {
        let err = CaptionError::Malformed {
            provider: provider.to_string(),
            detail: format!("{} (raw: {})", e, truncate(&cleaned, 500)),
        };
        error!("{}", err);
        err
    })?;

    let captions = CaptionSet::new(
        captions.short.trim(),
        captions.medium.trim(),
        captions.detailed.trim(),
    );
    if !captions.is_complete() {
        let err = CaptionError::Malformed {
            provider: provider.to_string(),
            detail: "one or more caption fields are empty".to_string(),
        };
        error!("{}", err);
        return Err(err);
    }
    Ok(captions)
}

/// Strip markdown code fences from LLM response if present.
fn strip_markdown_json(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let after_open = match trimmed.find('\n') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed.trim_start_matches('`'),
    };
    let cleaned = after_open.trim_end();
    cleaned
        .strip_suffix("```")
        .unwrap_or(cleaned)
        .trim()
        .to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
