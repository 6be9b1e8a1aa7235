//! # treemark
//!
//! Convert PDF documents into a typed block tree and render Markdown, HTML,
//! JSON, or retrieval chunks — with optional LLM-backed correction of the
//! regions rules cannot fix.
//!
//! ## Why a block tree?
//!
//! Flat text extraction loses what a document *is*: tables flatten into
//! word soup, headings blur into body text, multi-column pages interleave.
//! treemark keeps a typed tree (pages → blocks → nested blocks) from
//! detection to rendering, so every correction pass works on structure, and
//! the renderer chooses how to say it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Provider    open file, text layer, page rasters (pdfium)
//!  ├─ 2. Builders    layout boxes → line assignment → OCR → structure
//!  ├─ 3. Processors  28 ordered passes over the tree; rule-based first,
//!  │                 LLM-backed passes only touch what rules leave behind
//!  └─ 4. Renderer    markdown / html / json / chunked
//! ```
//!
//! Detection and OCR models are collaborators behind traits
//! ([`detect::LayoutDetector`], [`detect::OcrEngine`]); bring your own and
//! hand them in through [`detect::Artifacts`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use treemark::{Artifacts, ConverterConfig, ConverterOptions, PdfConverter};
//!
//! # fn models() -> Artifacts { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let artifacts: Artifacts = models(); // your detector + OCR handles
//!     let config = ConverterConfig::builder()
//!         .use_llm(true)
//!         .llm_base_url("http://localhost:11434")
//!         .llm_model("qwen2.5vl:7b")
//!         .build()?;
//!
//!     let mut converter =
//!         PdfConverter::new(artifacts, ConverterOptions::default(), config)?;
//!     let output = converter.convert(std::path::Path::new("paper.pdf").into()).await?;
//!     println!("{}", output.into_text());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `treemark` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! treemark = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod builders;
pub mod config;
pub mod converter;
pub mod detect;
pub mod document;
pub mod error;
pub mod processors;
pub mod provider;
pub mod registry;
pub mod renderers;
pub mod services;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConverterConfig, ConverterConfigBuilder, OutputFormat, PageRange};
pub use converter::{
    default_processor_names, ConvertInput, ConverterOptions, PdfConverter, DEFAULT_LLM_SERVICE,
    DEFAULT_PROCESSORS,
};
pub use detect::{Artifacts, DetectorHints, LayoutBox, LayoutDetector, OcrEngine};
pub use document::{BBox, Block, BlockMetadata, BlockRef, BlockType, Document, Page, TocEntry};
pub use error::TreemarkError;
pub use provider::{PageProvider, PdfiumProvider, ProviderLine};
pub use renderers::{BlockBehavior, Chunk, OverrideMap, RenderedOutput, Renderer};
pub use services::{LlmBackend, LlmRequest, LlmService, ResponseSchema};
