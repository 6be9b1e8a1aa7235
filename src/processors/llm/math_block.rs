//! Correct inline math in prose blocks.
//!
//! Text extraction turns inline math into mojibake ("x2 + y2 = z2", greek
//! letters dropped). For blocks the detector flagged as math-bearing prose,
//! the model re-reads the region and returns the paragraph with proper
//! `$...$` runs. The sanity check rejects rewrites that change the length
//! wildly — a model that paraphrased instead of corrected must not win.

use super::{region_image, run_tasks, string_field, LlmTask};
use crate::document::{BlockType, Document};
use crate::error::TreemarkError;
use crate::processors::Processor;
use crate::services::{LlmService, ResponseSchema};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const PROMPT: &str = "You are given an image of a paragraph containing inline \
mathematics, and its current text extraction. Return the same paragraph with every \
mathematical expression corrected and wrapped in $...$ delimiters. Do not rephrase \
any prose.\n\nCurrent extraction:\n";

/// Accepted rewrites stay within this factor of the original length.
const MAX_GROWTH: usize = 4;

pub struct LlmMathBlockProcessor {
    llm: Option<Arc<LlmService>>,
}

impl LlmMathBlockProcessor {
    pub fn new(llm: Option<Arc<LlmService>>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Processor for LlmMathBlockProcessor {
    fn name(&self) -> &'static str {
        "llm-math-block"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        let Some(ref llm) = self.llm else {
            return Ok(());
        };

        let candidates = document.find_blocks(|b| {
            b.block_type == BlockType::TextInlineMath && !b.raw_text().trim().is_empty()
        });

        let mut tasks = Vec::new();
        for r in candidates {
            let Some(image) = region_image(document, &r) else {
                continue;
            };
            let current = document.block(&r).map(|b| b.raw_text()).unwrap_or_default();
            tasks.push(LlmTask {
                target: r,
                prompt: format!("{PROMPT}{current}"),
                images: vec![image],
                schema: ResponseSchema::object(&[(
                    "corrected_markdown",
                    json!({"type": "string"}),
                )]),
            });
        }

        run_tasks(llm, document, tasks, |block, payload| {
            if let Some(corrected) = string_field(payload, "corrected_markdown") {
                let original_len = block.raw_text().len().max(1);
                if corrected.len() <= original_len * MAX_GROWTH {
                    block.text = Some(corrected.to_string());
                }
            }
        })
        .await;
        Ok(())
    }
}
