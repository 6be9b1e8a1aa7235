//! Transcribe layout regions the detector could not decompose.

use super::{region_image, run_tasks, string_field, LlmTask};
use crate::document::{BlockType, Document};
use crate::error::TreemarkError;
use crate::processors::Processor;
use crate::services::{LlmService, ResponseSchema};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const PROMPT: &str = "You are given an image of a document region with complex nested \
layout (mixed text, figures, sidebars or multi-directional flow). Transcribe the \
region into clean Markdown in natural reading order. Use headings, lists and tables \
where the layout calls for them. Respond only with the Markdown.";

pub struct LlmComplexRegionProcessor {
    llm: Option<Arc<LlmService>>,
}

impl LlmComplexRegionProcessor {
    pub fn new(llm: Option<Arc<LlmService>>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Processor for LlmComplexRegionProcessor {
    fn name(&self) -> &'static str {
        "llm-complex-region"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        let Some(ref llm) = self.llm else {
            return Ok(());
        };

        let candidates = document.find_blocks(|b| b.block_type == BlockType::ComplexRegion);

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
