//! Text backend for OpenAI-compatible chat-completions endpoints.
//!
//! Covers hosted and self-hosted servers exposing `/v1/chat/completions`
//! with the `json_schema` response format. Differences from the canonical
//! local backend are exactly the three a backend is allowed to have: images
//! travel as `data:` URIs inside content parts rather than a bare base64
//! array, the envelope is `choices[0].message.content`, and 502 joins the
//! transient status set (gateway-fronted deployments return it under load).

use super::{BackendError, BackendSuccess, LlmBackend, LlmUsage, WireRequest};
use crate::error::TreemarkError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ChatEnvelope {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl OpenAiBackend {
    /// `base_url` without a trailing slash, e.g. `https://api.openai.com`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, TreemarkError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TreemarkError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key,
        })
    }

    pub(crate) fn build_payload(&self, request: &WireRequest<'_>) -> Value {
        let mut parts = vec![json!({"type": "text", "text": request.prompt})];
        for png in request.png_images {
            parts.push(json!({
                "type": "image_url",
                "image_url": {"url": format!("data:image/png;base64,{}", BASE64.encode(png))}
            }));
        }
        json!({
            "model": self.model,
            "messages": [{"role": "user", "content": parts}],
            "response_format": {
                "type": "json_schema",
                "json_schema": {"name": "response", "schema": request.format}
            }
        })
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn send(&self, request: &WireRequest<'_>) -> Result<BackendSuccess, BackendError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let mut req = self
            .client
            .post(&url)
            .json(&self.build_payload(request))
            .timeout(request.timeout);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| BackendError::Transport {
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("HTTP {status} from {url}");
            return Err(match status.as_u16() {
                429 | 500 | 502 | 503 => BackendError::Transient {
                    status: Some(status.as_u16()),
                    message,
                },
                _ => BackendError::Fatal { message },
            });
        }

        let envelope: ChatEnvelope =
            response.json().await.map_err(|e| BackendError::Malformed {
                message: format!("envelope: {e}"),
            })?;
        let content = envelope
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| BackendError::Malformed {
                message: "no choices in response".into(),
            })?;

        let data: Value = serde_json::from_str(content).map_err(|e| BackendError::Malformed {
            message: format!("message content is not JSON: {e}"),
        })?;
        let data = data.as_object().cloned().ok_or_else(|| BackendError::Malformed {
            message: "message content is not a JSON object".into(),
        })?;

        let usage = envelope.usage.unwrap_or_default();
        Ok(BackendSuccess {
            data,
            usage: LlmUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn payload_uses_chat_completions_shape() {
        let backend =
            OpenAiBackend::new("https://api.openai.com", "gpt-4.1-mini", None).unwrap();
        let format = json!({"type": "object", "properties": {}, "required": []});
        let pngs = vec![vec![1u8, 2, 3]];
        let payload = backend.build_payload(&WireRequest {
            prompt: "fix the equation",
            png_images: &pngs,
            format: &format,
            timeout: Duration::from_secs(30),
        });

        assert_eq!(payload["model"], "gpt-4.1-mini");
        let parts = payload["messages"][0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert!(parts[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));
        assert_eq!(payload["response_format"]["type"], "json_schema");
    }
}
