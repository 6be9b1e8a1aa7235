//! Integration tests for the LLM service contract, exercised through the
//! public API with in-process backends (no network).

use async_trait::async_trait;
use image::DynamicImage;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use treemark::services::{
    BackendError, BackendSuccess, LlmBackend, LlmRequest, LlmService, LlmUsage, ResponseSchema,
    WireRequest,
};
use treemark::{BBox, Block, BlockType};

// ── Test backends ────────────────────────────────────────────────────────

/// Fails every attempt with a fixed error class.
struct AlwaysFailing {
    calls: Arc<AtomicU32>,
    class: fn() -> BackendError,
}

#[async_trait]
impl LlmBackend for AlwaysFailing {
    fn name(&self) -> &'static str {
        "always-failing"
    }

    async fn send(&self, _req: &WireRequest<'_>) -> Result<BackendSuccess, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err((self.class)())
    }
}

/// Succeeds on every attempt with fixed usage; records the wire format it
/// was handed.
struct Succeeding {
    calls: Arc<AtomicU32>,
    seen_formats: std::sync::Mutex<Vec<serde_json::Value>>,
}

impl Succeeding {
    fn new() -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            seen_formats: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmBackend for Succeeding {
    fn name(&self) -> &'static str {
        "succeeding"
    }

    async fn send(&self, req: &WireRequest<'_>) -> Result<BackendSuccess, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_formats.lock().unwrap().push(req.format.clone());
        Ok(BackendSuccess {
            data: json!({"markdown": "fixed"}).as_object().unwrap().clone(),
            usage: LlmUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
            },
        })
    }
}

fn service(backend: impl LlmBackend + 'static, max_retries: u32) -> LlmService {
    LlmService::with_policy(
        Box::new(backend),
        max_retries,
        Duration::from_secs(3),
        Duration::from_secs(30),
    )
}

fn simple_request() -> LlmRequest {
    LlmRequest::new(
        "transcribe",
        ResponseSchema::object(&[("markdown", json!({"type": "string"}))]),
    )
}

// ── Retry budget ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn transient_failures_consume_exact_budget_with_linear_sleeps() {
    let calls = Arc::new(AtomicU32::new(0));
    let svc = service(
        AlwaysFailing {
            calls: Arc::clone(&calls),
            class: || BackendError::Transient {
                status: Some(429),
                message: "rate limited".into(),
            },
        },
        3,
    );

    let start = tokio::time::Instant::now();
    let out = svc.invoke(simple_request(), None).await;

    assert!(out.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 4, "N+1 attempts for N=3");
    // Linear backoff 3s, 6s, 9s between attempts; nothing after the last.
    assert_eq!(start.elapsed(), Duration::from_secs(18));
}

#[tokio::test(start_paused = true)]
async fn transport_failures_back_off_like_transient_ones() {
    let calls = Arc::new(AtomicU32::new(0));
    let svc = service(
        AlwaysFailing {
            calls: Arc::clone(&calls),
            class: || BackendError::Transport {
                message: "connection refused".into(),
            },
        },
        2,
    );

    let start = tokio::time::Instant::now();
    let out = svc.invoke(simple_request(), None).await;

    assert!(out.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(9));
}

#[tokio::test]
async fn non_retriable_error_stops_after_one_attempt() {
    let calls = Arc::new(AtomicU32::new(0));
    let svc = service(
        AlwaysFailing {
            calls: Arc::clone(&calls),
            class: || BackendError::Fatal {
                message: "model not found".into(),
            },
        },
        5,
    );

    let out = svc.invoke(simple_request(), None).await;
    assert!(out.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ── Small-image guard ────────────────────────────────────────────────────

#[tokio::test]
async fn undersized_image_short_circuits_with_no_network_attempt() {
    let backend = Succeeding::new();
    let calls = Arc::clone(&backend.calls);
    let svc = service(backend, 3);

    let req = simple_request().with_images(vec![DynamicImage::new_rgb8(20, 40)]);
    let out = svc.invoke(req, None).await;

    assert!(out.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn adequate_image_is_dispatched() {
    let backend = Succeeding::new();
    let calls = Arc::clone(&backend.calls);
    let svc = service(backend, 3);

    let req = simple_request().with_images(vec![DynamicImage::new_rgb8(28, 28)]);
    let out = svc.invoke(req, None).await;

    assert_eq!(out.get("markdown"), Some(&json!("fixed")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ── Accounting ───────────────────────────────────────────────────────────

#[tokio::test]
async fn successful_call_increments_block_counters() {
    let svc = service(Succeeding::new(), 3);

    let mut block = Block::new(BlockType::Table, BBox::default());
    block.metadata.llm_request_count = 2;
    block.metadata.llm_tokens_used = 100;

    let out = svc.invoke(simple_request(), Some(&mut block)).await;
    assert!(!out.is_empty());
    assert_eq!(block.metadata.llm_request_count, 3);
    assert_eq!(block.metadata.llm_tokens_used, 115);
}

#[tokio::test]
async fn exhausted_call_leaves_counters_untouched() {
    let calls = Arc::new(AtomicU32::new(0));
    let svc = service(
        AlwaysFailing {
            calls,
            class: || BackendError::Malformed {
                message: "not json".into(),
            },
        },
        1,
    );

    let mut block = Block::new(BlockType::Table, BBox::default());
    let out = svc.invoke(simple_request(), Some(&mut block)).await;
    assert!(out.is_empty());
    assert_eq!(block.metadata.llm_request_count, 0);
    assert_eq!(block.metadata.llm_tokens_used, 0);
}

// ── Schema inlining ──────────────────────────────────────────────────────

#[tokio::test]
async fn backend_receives_inlined_defs_iff_schema_has_them() {
    // A service sharing one backend instance, so the wire formats it saw
    // can be inspected afterwards.
    struct Shared(Arc<Succeeding>);

    #[async_trait]
    impl LlmBackend for Shared {
        fn name(&self) -> &'static str {
            "shared"
        }
        async fn send(&self, req: &WireRequest<'_>) -> Result<BackendSuccess, BackendError> {
            self.0.send(req).await
        }
    }

    let inner = Arc::new(Succeeding::new());
    let svc = LlmService::with_policy(
        Box::new(Shared(Arc::clone(&inner))),
        0,
        Duration::from_secs(1),
        Duration::from_secs(5),
    );

    let with_defs = ResponseSchema::new(json!({
        "type": "object",
        "properties": {"items": {"type": "array", "items": {"$ref": "#/$defs/Item"}}},
        "required": ["items"],
        "$defs": {"Item": {"type": "object"}}
    }));
    svc.invoke(LlmRequest::new("x", with_defs), None).await;

    let plain = ResponseSchema::object(&[("markdown", json!({"type": "string"}))]);
    svc.invoke(LlmRequest::new("y", plain), None).await;

    let seen = inner.seen_formats.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(
        seen[0]["$defs"]["Item"].is_object(),
        "shared definitions must be inlined: {}",
        seen[0]
    );
    assert!(
        seen[1].get("$defs").is_none(),
        "no $defs key without definitions: {}",
        seen[1]
    );
}
