//! Whole-page proofread against the page raster.
//!
//! The last LLM pass: every earlier correction has been applied, so the
//! model sees the page image next to the pipeline's current reading of it
//! and returns per-block rewrites only where the two disagree. Applied
//! conservatively — a rewrite lands on exactly the block it indexes, and an
//! out-of-range index or empty rewrite is dropped.

use crate::document::Document;
use crate::error::TreemarkError;
use crate::processors::Processor;
use crate::services::{LlmRequest, LlmService, ResponseSchema};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const PROMPT: &str = "You are given an image of a document page and the text currently \
extracted for each of its blocks, numbered in reading order. Compare the extraction \
against the image. For each block whose text is wrong or incomplete, return its index \
and the corrected Markdown. Return corrections only for blocks that need them.\n\n";

fn response_schema() -> ResponseSchema {
    ResponseSchema::new(json!({
        "type": "object",
        "properties": {
            "corrections": {
                "type": "array",
                "items": {"$ref": "#/$defs/BlockCorrection"}
            }
        },
        "required": ["corrections"],
        "$defs": {
            "BlockCorrection": {
                "type": "object",
                "properties": {
                    "index": {"type": "integer"},
                    "markdown": {"type": "string"}
                },
                "required": ["index", "markdown"]
            }
        }
    }))
}

pub struct LlmPageCorrectionProcessor {
    llm: Option<Arc<LlmService>>,
}

impl LlmPageCorrectionProcessor {
    pub fn new(llm: Option<Arc<LlmService>>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Processor for LlmPageCorrectionProcessor {
    fn name(&self) -> &'static str {
        "llm-page-correction"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        let Some(ref llm) = self.llm else {
            return Ok(());
        };

        for page_idx in 0..document.pages.len() {
            let page = &document.pages[page_idx];
            let Some(image) = page.image.clone() else {
                continue;
            };

            // Only prose-bearing blocks participate; tables and figures have
            // their own passes.
            let indexed: Vec<(usize, String)> = page
                .blocks
                .iter()
                .enumerate()
                .filter(|(_, b)| {
                    b.block_type.is_text_like() && !b.raw_text().trim().is_empty()
                })
                .map(|(i, b)| (i, b.raw_text()))
                .collect();
            if indexed.is_empty() {
                continue;
            }

            let mut listing = String::new();
            for (i, text) in &indexed {
                listing.push_str(&format!("[{i}] {text}\n\n"));
            }

            let request = LlmRequest::new(format!("{PROMPT}{listing}"), response_schema())
                .with_images(vec![image]);
            let first_block = indexed[0].0;
            let target = document.pages[page_idx].blocks.get_mut(first_block);
            let payload = llm.invoke(request, target).await;
            if payload.is_empty() {
                continue;
            }

            let Some(corrections) = payload.get("corrections").and_then(Value::as_array) else {
                continue;
            };
            let valid: std::collections::HashSet<usize> =
                indexed.iter().map(|(i, _)| *i).collect();
            let mut applied = 0usize;
            for c in corrections {
                let (Some(index), Some(markdown)) = (
                    c.get("index").and_then(Value::as_u64).map(|i| i as usize),
                    c.get("markdown").and_then(Value::as_str),
                ) else {
                    continue;
                };
                let markdown = markdown.trim();
                if markdown.is_empty() || !valid.contains(&index) {
                    continue;
                }
                if let Some(block) = document.pages[page_idx].blocks.get_mut(index) {
                    block.text = Some(markdown.to_string());
                    applied += 1;
                }
            }
            if applied > 0 {
                debug!(
                    "llm-page-correction: page {} applied {applied} correction(s)",
                    document.pages[page_idx].index
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BBox, Block, BlockType, Page};

    #[tokio::test]
    async fn pages_without_rasters_are_skipped_unchanged() {
        let mut doc = Document::new("t");
        let mut page = Page::new(0, BBox::default());
        page.blocks
            .push(Block::new(BlockType::Text, BBox::default()).with_text("body"));
        doc.pages.push(page);

        let before = serde_json::to_string(&doc).unwrap();
        LlmPageCorrectionProcessor::new(None)
            .process(&mut doc)
            .await
            .unwrap();
        assert_eq!(serde_json::to_string(&doc).unwrap(), before);
    }
}
