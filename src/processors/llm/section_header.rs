//! Reconcile heading levels across the whole document.
//!
//! The height-based pass assigns levels from geometry alone, which goes
//! wrong when a document mixes numbered and unnumbered headings or reuses
//! one size for different ranks. This pass makes a single text-only call
//! with every header title and its current level, and applies the returned
//! hierarchy. One call, not one per header — the hierarchy only makes sense
//! seen whole.

use crate::document::{BlockRef, BlockType, Document};
use crate::error::TreemarkError;
use crate::processors::Processor;
use crate::services::{LlmRequest, LlmService, ResponseSchema};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const PROMPT: &str = "Below are the section headers of a document in reading order, \
each with its current heading level. Correct the levels so they form a consistent \
hierarchy (level 1 for top-level sections, deeper levels nested inside). Keep the \
order unchanged and return one entry per header with its zero-based index and \
corrected level.\n\n";

pub struct LlmSectionHeaderProcessor {
    llm: Option<Arc<LlmService>>,
}

impl LlmSectionHeaderProcessor {
    pub fn new(llm: Option<Arc<LlmService>>) -> Self {
        Self { llm }
    }
}

fn response_schema() -> ResponseSchema {
    // Array-of-objects shape needs shared definitions; the service inlines
    // them for backends without $ref resolution.
    ResponseSchema::new(json!({
        "type": "object",
        "properties": {
            "section_headers": {
                "type": "array",
                "items": {"$ref": "#/$defs/HeaderLevel"}
            }
        },
        "required": ["section_headers"],
        "$defs": {
            "HeaderLevel": {
                "type": "object",
                "properties": {
                    "index": {"type": "integer"},
                    "level": {"type": "integer"}
                },
                "required": ["index", "level"]
            }
        }
    }))
}

#[async_trait]
impl Processor for LlmSectionHeaderProcessor {
    fn name(&self) -> &'static str {
        "llm-section-header"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        let Some(ref llm) = self.llm else {
            return Ok(());
        };

        let headers: Vec<BlockRef> =
            document.find_blocks(|b| b.block_type == BlockType::SectionHeader);
        if headers.len() < 2 {
            return Ok(());
        }

        let mut listing = String::new();
        for (i, r) in headers.iter().enumerate() {
            let Some(block) = document.block(r) else { continue };
            listing.push_str(&format!(
                "{i}. [level {}] {}\n",
                block.heading_level.unwrap_or(1),
                block.raw_text().trim()
            ));
        }

        let request = LlmRequest::new(format!("{PROMPT}{listing}"), response_schema());
        // Accounting lands on the first header; the call spans all of them.
        let target = document.block_mut(&headers[0]);
        let payload = llm.invoke(request, target).await;
        if payload.is_empty() {
            return Ok(());
        }

        let Some(entries) = payload.get("section_headers").and_then(Value::as_array) else {
            return Ok(());
        };
        let mut applied = 0usize;
        for entry in entries {
            let (Some(index), Some(level)) = (
                entry.get("index").and_then(Value::as_u64),
                entry.get("level").and_then(Value::as_u64),
            ) else {
                continue;
            };
            if !(1..=6).contains(&level) {
                continue;
            }
            if let Some(r) = headers.get(index as usize) {
                if let Some(block) = document.block_mut(r) {
                    block.heading_level = Some(level as u8);
                    applied += 1;
                }
            }
        }
        debug!("llm-section-header: applied {applied}/{} level(s)", headers.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_carries_shared_definitions() {
        let wire = response_schema().to_wire();
        assert!(wire.get("$defs").is_some());
        assert!(wire["$defs"].get("HeaderLevel").is_some());
    }
}
