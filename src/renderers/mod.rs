//! Renderers: the finished tree to caller-facing output.
//!
//! A renderer is a pure function of the document — it never mutates the
//! tree, and rendering the same tree twice yields identical output. The set
//! is closed (markdown, html, json, chunked) and selected by registry name
//! at converter construction.
//!
//! ## Overriding per-type rendering
//!
//! Callers can swap the rendering of any block type by supplying a
//! [`BlockBehavior`] in the override map at construction time. The map is
//! resolved once and frozen for the conversion; renderers consult it before
//! their built-in handling, and an override returning `None` falls through
//! to the built-in. This gives "replace the behavior of one type" without
//! dynamic dispatch inside the hot rendering loop for the common case.

mod chunked;
mod html;
mod json;
mod markdown;

pub use chunked::ChunkedRenderer;
pub use html::HtmlRenderer;
pub use json::JsonRenderer;
pub use markdown::{MarkdownRenderer, RawTextBehavior};

use crate::document::{Block, BlockType, Document};
use crate::error::TreemarkError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Custom rendering for one block type. Return `None` to fall through to
/// the built-in rendering.
pub trait BlockBehavior: Send + Sync {
    fn markdown(&self, _block: &Block) -> Option<String> {
        None
    }

    fn html(&self, _block: &Block) -> Option<String> {
        None
    }
}

/// Frozen block-type → behavior mapping, shared by the renderers of one
/// conversion.
pub type OverrideMap = HashMap<BlockType, Arc<dyn BlockBehavior>>;

/// Output of one conversion.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum RenderedOutput {
    Markdown { markdown: String, page_count: usize },
    Html { html: String, page_count: usize },
    Json { document: serde_json::Value },
    Chunked { chunks: Vec<Chunk> },
}

impl RenderedOutput {
    /// The textual body, whatever the format (chunks join with blank lines;
    /// json pretty-prints).
    pub fn into_text(self) -> String {
        match self {
            RenderedOutput::Markdown { markdown, .. } => markdown,
            RenderedOutput::Html { html, .. } => html,
            RenderedOutput::Json { document } => {
                serde_json::to_string_pretty(&document).unwrap_or_default()
            }
            RenderedOutput::Chunked { chunks } => chunks
                .into_iter()
                .map(|c| c.text)
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// One retrieval-sized piece of the document: a top-level block with its
/// provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub page: usize,
    pub block_type: String,
    pub text: String,
}

/// A target rendering of the finished document.
pub trait Renderer: Send + Sync {
    fn name(&self) -> &'static str;

    fn render(&self, document: &Document) -> Result<RenderedOutput, TreemarkError>;
}
