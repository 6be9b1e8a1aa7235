//! The canonical local-network backend, speaking the Ollama generate API.
//!
//! Wire shape: `POST {base_url}/api/generate` with
//! `{model, prompt, stream: false, format: <schema>, images?: [base64, …]}`.
//! A successful body carries the structured output as a JSON-encoded string
//! in `response`, plus usage counters `prompt_eval_count` and `eval_count`.
//!
//! Transient statuses for this backend are 429, 500, and 503; everything
//! else is non-retriable (a local server that answers 404 or 400 will keep
//! answering it).

use super::{BackendError, BackendSuccess, LlmBackend, LlmUsage, WireRequest};
use crate::error::TreemarkError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct OllamaEnvelope {
    response: String,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

impl OllamaBackend {
    /// `base_url` without a trailing slash, e.g. `http://localhost:11434`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, TreemarkError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TreemarkError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    /// Assemble the request body. Separated out so the payload shape
    /// (schema inlining included) is testable without a server.
    pub(crate) fn build_payload(&self, request: &WireRequest<'_>) -> Value {
        let mut payload = json!({
            "model": self.model,
            "prompt": request.prompt,
            "stream": false,
            "format": request.format,
        });
        if !request.png_images.is_empty() {
            let images: Vec<String> = request
                .png_images
                .iter()
                .map(|png| BASE64.encode(png))
                .collect();
            payload["images"] = json!(images);
        }
        payload
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn send(&self, request: &WireRequest<'_>) -> Result<BackendSuccess, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        let payload = self.build_payload(request);

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| BackendError::Transport {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("HTTP {status} from {url}");
            return Err(match status.as_u16() {
                429 | 500 | 503 => BackendError::Transient {
                    status: Some(status.as_u16()),
                    message,
                },
                _ => BackendError::Fatal { message },
            });
        }

        let envelope: OllamaEnvelope =
            response.json().await.map_err(|e| BackendError::Malformed {
                message: format!("envelope: {e}"),
            })?;

        let data: Value =
            serde_json::from_str(&envelope.response).map_err(|e| BackendError::Malformed {
                message: format!("response field is not JSON: {e}"),
            })?;
        let data = data.as_object().cloned().ok_or_else(|| BackendError::Malformed {
            message: "response field is not a JSON object".into(),
        })?;

        Ok(BackendSuccess {
            data,
            usage: LlmUsage {
                prompt_tokens: envelope.prompt_eval_count,
                completion_tokens: envelope.eval_count,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ResponseSchema;
    use std::time::Duration;

    fn wire_request<'a>(format: &'a Value, png_images: &'a [Vec<u8>]) -> WireRequest<'a> {
        WireRequest {
            prompt: "describe the table",
            png_images,
            format,
            timeout: Duration::from_secs(30),
        }
    }

    #[test]
    fn payload_has_generate_api_shape() {
        let backend = OllamaBackend::new("http://localhost:11434", "qwen2.5vl:7b").unwrap();
        let format = ResponseSchema::object(&[("table_html", json!({"type": "string"}))]).to_wire();
        let payload = backend.build_payload(&wire_request(&format, &[]));

        assert_eq!(payload["model"], "qwen2.5vl:7b");
        assert_eq!(payload["prompt"], "describe the table");
        assert_eq!(payload["stream"], false);
        assert_eq!(payload["format"]["required"], json!(["table_html"]));
        assert!(payload.get("images").is_none(), "no images key without images");
    }

    #[test]
    fn payload_base64_encodes_images() {
        let backend = OllamaBackend::new("http://localhost:11434", "m").unwrap();
        let format = json!({"type": "object"});
        let pngs = vec![vec![0x89u8, 0x50, 0x4e, 0x47]];
        let payload = backend.build_payload(&wire_request(&format, &pngs));

        let images = payload["images"].as_array().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0], BASE64.encode([0x89u8, 0x50, 0x4e, 0x47]));
    }

    #[test]
    fn payload_carries_inlined_defs() {
        let backend = OllamaBackend::new("http://localhost:11434", "m").unwrap();
        let format = ResponseSchema::new(json!({
            "type": "object",
            "properties": {"rows": {"type": "array", "items": {"$ref": "#/$defs/Row"}}},
            "required": ["rows"],
            "$defs": {"Row": {"type": "object"}}
        }))
        .to_wire();
        let payload = backend.build_payload(&wire_request(&format, &[]));
        assert!(payload["format"].get("$defs").is_some());
    }
}
