//! The LLM service: one retry/accounting core, interchangeable backends.
//!
//! Processors talk to [`LlmService::invoke`] and nothing else. The service
//! owns the whole cross-backend contract:
//!
//! * **Retry policy** — `max_retries + 1` total attempts with *linear*
//!   backoff (`attempt × retry_wait`) on transient and transport failures,
//!   immediate retry on malformed responses, and an immediate stop on
//!   anything non-retriable.
//! * **Failure shape** — `invoke` never returns an error. An exhausted call
//!   yields an empty map, which callers read as "no enrichment available";
//!   the block is left exactly as it was.
//! * **Schema inlining** — shared `$defs` are folded into the outgoing
//!   payload once, here, so backends without native `$ref` resolution still
//!   enforce structure (see [`schema`]).
//! * **Accounting** — a successful call increments the target block's
//!   request counter and adds the backend-reported token usage.
//!
//! Backends ([`LlmBackend`]) are reduced to a single `send`: encode one
//! request in their wire format, classify one response. They must not sleep,
//! retry, or touch blocks.
//!
//! ## Backoff sequence
//!
//! With `max_retries = 3` and `retry_wait = 2s`, a persistently transient
//! backend is attempted 4 times with sleeps of 2s, 4s, 6s between attempts
//! and no sleep after the last. Linear (not exponential) is intentional:
//! calls are sequential within a conversion, so there is no thundering herd
//! to dampen, and a bounded worst case (`wait·N(N+1)/2`) keeps the pipeline
//! latency predictable.

pub mod schema;

mod ollama;
mod openai;

pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;
pub use schema::ResponseSchema;

use crate::config::ConverterConfig;
use crate::document::Block;
use async_trait::async_trait;
use image::DynamicImage;
use serde_json::{Map, Value};
use std::io::Cursor;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

/// Minimum width and height (in pixels) a region crop must have before it is
/// sent to a backend. Vision models reject degenerate inputs; skipping the
/// call entirely does not consume the retry budget.
pub const MIN_IMAGE_DIM: u32 = 28;

/// Token usage reported by a backend for one successful call. Zero when the
/// backend does not report usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LlmUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl LlmUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// One successful backend exchange: the parsed structured payload plus usage.
#[derive(Debug, Clone)]
pub struct BackendSuccess {
    pub data: Map<String, Value>,
    pub usage: LlmUsage,
}

/// Per-attempt failure classification. The *backend* decides the class (it
/// knows its own envelope and which status codes are transient); the *core*
/// decides what to do about it.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Rate-limited or server-side unavailable; retried with linear backoff.
    #[error("transient backend failure (status {status:?}): {message}")]
    Transient { status: Option<u16>, message: String },

    /// Response body was not valid structured data; retried without delay.
    #[error("malformed backend response: {message}")]
    Malformed { message: String },

    /// Connection refused, DNS failure, timeout; retried with linear backoff.
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// Everything else; not retried.
    #[error("non-retriable backend failure: {message}")]
    Fatal { message: String },
}

/// The wire-level request handed to a backend for one attempt.
///
/// Images arrive PNG-encoded; each backend applies its own text-safe
/// encoding (plain base64, data URIs, …). The schema arrives already
/// inlined.
pub struct WireRequest<'a> {
    pub prompt: &'a str,
    pub png_images: &'a [Vec<u8>],
    pub format: &'a Value,
    pub timeout: Duration,
}

/// A model backend. Implementations differ only in wire encoding, envelope
/// shape, and transient-status classification — policy lives in
/// [`LlmService`].
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Registry name of this backend ("ollama", "openai", …).
    fn name(&self) -> &'static str;

    /// Perform exactly one request/response exchange.
    async fn send(&self, request: &WireRequest<'_>) -> Result<BackendSuccess, BackendError>;
}

/// A structured-output request from a processor.
pub struct LlmRequest {
    /// The task prompt.
    pub prompt: String,

    /// Zero or more rendered region crops.
    pub images: Vec<DynamicImage>,

    /// Structural description of the expected output.
    pub schema: ResponseSchema,

    /// Per-call override of the service-level retry budget.
    pub max_retries: Option<u32>,

    /// Per-call override of the service-level timeout.
    pub timeout: Option<Duration>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, schema: ResponseSchema) -> Self {
        Self {
            prompt: prompt.into(),
            images: Vec::new(),
            schema,
            max_retries: None,
            timeout: None,
        }
    }

    pub fn with_images(mut self, images: Vec<DynamicImage>) -> Self {
        self.images = images;
        self
    }
}

/// The conversion-scoped LLM service.
///
/// Constructed once per conversion and shared (via `Arc`) by every LLM-backed
/// processor, so retry state and accounting never leak across unrelated
/// conversions.
pub struct LlmService {
    backend: Box<dyn LlmBackend>,
    max_retries: u32,
    retry_wait: Duration,
    timeout: Duration,
}

impl LlmService {
    /// Build a service around `backend` using the config's policy knobs.
    pub fn new(backend: Box<dyn LlmBackend>, config: &ConverterConfig) -> Self {
        Self::with_policy(
            backend,
            config.max_retries,
            Duration::from_secs(config.retry_wait_secs),
            Duration::from_secs(config.llm_timeout_secs),
        )
    }

    /// Build a service with explicit policy values.
    pub fn with_policy(
        backend: Box<dyn LlmBackend>,
        max_retries: u32,
        retry_wait: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            max_retries,
            retry_wait,
            timeout,
        }
    }

    /// Registry name of the underlying backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Issue one structured-output call.
    ///
    /// Returns the parsed payload verbatim on success — schema *conformance*
    /// is the calling processor's job; the service only guarantees the data
    /// parsed. Returns an empty map after exhausting retries, on a
    /// non-retriable failure, or when a supplied image is below
    /// [`MIN_IMAGE_DIM`] (in which case no attempt is made at all).
    ///
    /// On success, if `target` is given, its metadata counters are bumped by
    /// one request and the backend-reported token total.
    pub async fn invoke(
        &self,
        request: LlmRequest,
        target: Option<&mut Block>,
    ) -> Map<String, Value> {
        for img in &request.images {
            if img.width() < MIN_IMAGE_DIM || img.height() < MIN_IMAGE_DIM {
                warn!(
                    backend = self.backend.name(),
                    width = img.width(),
                    height = img.height(),
                    "skipping LLM call: image below {MIN_IMAGE_DIM}x{MIN_IMAGE_DIM}"
                );
                return Map::new();
            }
        }

        let png_images = match encode_images(&request.images) {
            Ok(imgs) => imgs,
            Err(e) => {
                warn!(backend = self.backend.name(), "image encoding failed: {e}");
                return Map::new();
            }
        };

        let format = request.schema.to_wire();
        let wire = WireRequest {
            prompt: &request.prompt,
            png_images: &png_images,
            format: &format,
            timeout: request.timeout.unwrap_or(self.timeout),
        };

        let max_retries = request.max_retries.unwrap_or(self.max_retries);
        let total_tries = max_retries + 1;

        for attempt in 1..=total_tries {
            match self.backend.send(&wire).await {
                Ok(success) => {
                    debug!(
                        backend = self.backend.name(),
                        attempt,
                        prompt_tokens = success.usage.prompt_tokens,
                        completion_tokens = success.usage.completion_tokens,
                        "LLM call succeeded"
                    );
                    if let Some(block) = target {
                        block.metadata.record_llm_call(success.usage.total());
                    }
                    return success.data;
                }
                Err(e @ (BackendError::Transient { .. } | BackendError::Transport { .. })) => {
                    if attempt < total_tries {
                        let wait = self.retry_wait * attempt;
                        warn!(
                            backend = self.backend.name(),
                            attempt,
                            total_tries,
                            "retrying in {wait:?}: {e}"
                        );
                        sleep(wait).await;
                    } else {
                        error!(
                            backend = self.backend.name(),
                            total_tries, "max retries reached: {e}"
                        );
                    }
                }
                Err(e @ BackendError::Malformed { .. }) => {
                    if attempt < total_tries {
                        warn!(
                            backend = self.backend.name(),
                            attempt, total_tries, "retrying: {e}"
                        );
                    } else {
                        error!(
                            backend = self.backend.name(),
                            total_tries, "max retries reached: {e}"
                        );
                    }
                }
                Err(e @ BackendError::Fatal { .. }) => {
                    error!(backend = self.backend.name(), attempt, "{e}");
                    break;
                }
            }
        }

        Map::new()
    }
}

/// PNG-encode each crop once so every attempt (and every backend) reuses the
/// same bytes. PNG over JPEG: lossless text edges matter more than payload
/// size for region correction.
fn encode_images(images: &[DynamicImage]) -> Result<Vec<Vec<u8>>, image::ImageError> {
    images
        .iter()
        .map(|img| {
            let mut buf = Vec::new();
            img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
            Ok(buf)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BBox, BlockType};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Backend scripted to fail a fixed number of times with a fixed class.
    struct ScriptedBackend {
        calls: Arc<AtomicU32>,
        fail_first: u32,
        class: fn(String) -> BackendError,
    }

    #[async_trait]
    impl LlmBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn send(&self, _req: &WireRequest<'_>) -> Result<BackendSuccess, BackendError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err((self.class)(format!("scripted failure #{n}")))
            } else {
                Ok(BackendSuccess {
                    data: json!({"ok": true}).as_object().unwrap().clone(),
                    usage: LlmUsage {
                        prompt_tokens: 10,
                        completion_tokens: 5,
                    },
                })
            }
        }
    }

    fn service(backend: ScriptedBackend, max_retries: u32) -> LlmService {
        LlmService::with_policy(
            Box::new(backend),
            max_retries,
            Duration::from_secs(2),
            Duration::from_secs(30),
        )
    }

    fn request() -> LlmRequest {
        LlmRequest::new(
            "extract",
            ResponseSchema::new(json!({
                "type": "object",
                "properties": {"ok": {"type": "boolean"}},
                "required": ["ok"]
            })),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_transient_failures_use_full_budget_with_linear_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let svc = service(
            ScriptedBackend {
                calls: Arc::clone(&calls),
                fail_first: u32::MAX,
                class: |m| BackendError::Transient {
                    status: Some(503),
                    message: m,
                },
            },
            3,
        );

        let start = tokio::time::Instant::now();
        let out = svc.invoke(request(), None).await;

        assert!(out.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 4, "max_retries=3 → 4 attempts");
        // Sleeps of 2s, 4s, 6s between attempts; none after the last.
        assert_eq!(start.elapsed(), Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_responses_retry_without_delay() {
        let calls = Arc::new(AtomicU32::new(0));
        let svc = service(
            ScriptedBackend {
                calls: Arc::clone(&calls),
                fail_first: u32::MAX,
                class: |m| BackendError::Malformed { message: m },
            },
            2,
        );

        let start = tokio::time::Instant::now();
        let out = svc.invoke(request(), None).await;

        assert!(out.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn fatal_error_stops_after_one_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let svc = service(
            ScriptedBackend {
                calls: Arc::clone(&calls),
                fail_first: u32::MAX,
                class: |m| BackendError::Fatal { message: m },
            },
            5,
        );

        let out = svc.invoke(request(), None).await;
        assert!(out.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures_within_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let svc = service(
            ScriptedBackend {
                calls: Arc::clone(&calls),
                fail_first: 2,
                class: |m| BackendError::Transient {
                    status: Some(429),
                    message: m,
                },
            },
            3,
        );

        let out = svc.invoke(request(), None).await;
        assert_eq!(out.get("ok"), Some(&json!(true)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn small_image_guard_skips_without_any_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let svc = service(
            ScriptedBackend {
                calls: Arc::clone(&calls),
                fail_first: 0,
                class: |m| BackendError::Fatal { message: m },
            },
            3,
        );

        let mut req = request();
        req.images = vec![DynamicImage::new_rgb8(20, 40)];
        let out = svc.invoke(req, None).await;

        assert!(out.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0, "guard must pre-empt dispatch");
    }

    #[tokio::test]
    async fn successful_call_updates_target_block_counters() {
        let calls = Arc::new(AtomicU32::new(0));
        let svc = service(
            ScriptedBackend {
                calls,
                fail_first: 0,
                class: |m| BackendError::Fatal { message: m },
            },
            3,
        );

        let mut block = crate::document::Block::new(BlockType::Table, BBox::default());
        block.metadata.llm_request_count = 2;
        block.metadata.llm_tokens_used = 100;

        let out = svc.invoke(request(), Some(&mut block)).await;
        assert!(!out.is_empty());
        assert_eq!(block.metadata.llm_request_count, 3);
        assert_eq!(block.metadata.llm_tokens_used, 115);
    }

    #[tokio::test]
    async fn failed_call_leaves_target_block_untouched() {
        let calls = Arc::new(AtomicU32::new(0));
        let svc = service(
            ScriptedBackend {
                calls,
                fail_first: u32::MAX,
                class: |m| BackendError::Fatal { message: m },
            },
            0,
        );

        let mut block = crate::document::Block::new(BlockType::Table, BBox::default());
        let out = svc.invoke(request(), Some(&mut block)).await;
        assert!(out.is_empty());
        assert_eq!(block.metadata.llm_request_count, 0);
        assert_eq!(block.metadata.llm_tokens_used, 0);
    }
}
