//! Transcribe handwritten regions the OCR engine cannot read.

use super::{region_image, run_tasks, string_field, LlmTask};
use crate::document::{BlockType, Document};
use crate::error::TreemarkError;
use crate::processors::Processor;
use crate::services::{LlmService, ResponseSchema};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const PROMPT: &str = "You are given an image of handwritten text from a document page. \
Transcribe it into Markdown, preserving line breaks where the writing does. \
Transcribe exactly what is written; mark genuinely illegible words as [illegible]. \
Respond only with the Markdown.";

pub struct LlmHandwritingProcessor {
    llm: Option<Arc<LlmService>>,
}

impl LlmHandwritingProcessor {
    pub fn new(llm: Option<Arc<LlmService>>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Processor for LlmHandwritingProcessor {
    fn name(&self) -> &'static str {
        "llm-handwriting"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        let Some(ref llm) = self.llm else {
            return Ok(());
        };

        let candidates = document.find_blocks(|b| {
            b.block_type == BlockType::Handwriting && b.raw_text().trim().is_empty()
        });

        let mut tasks = Vec::new();
        for r in candidates {
            let Some(image) = region_image(document, &r) else {
                continue;
            };
            tasks.push(LlmTask {
                target: r,
                prompt: PROMPT.to_string(),
                images: vec![image],
                schema: ResponseSchema::object(&[("markdown", json!({"type": "string"}))]),
            });
        }

        run_tasks(llm, document, tasks, |block, payload| {
            if let Some(markdown) = string_field(payload, "markdown") {
                block.text = Some(markdown.to_string());
            }
        })
        .await;
        Ok(())
    }
}
