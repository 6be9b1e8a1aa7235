//! Generate alt text for figures and pictures that have none.

use super::{region_image, run_tasks, string_field, LlmTask};
use crate::document::{BlockType, Document};
use crate::error::TreemarkError;
use crate::processors::Processor;
use crate::services::{LlmService, ResponseSchema};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const PROMPT: &str = "Describe the image from a document page in one or two sentences \
suitable as alt text: what it shows and what a reader should take from it. \
Mention axis labels and trends for charts. Do not speculate beyond what is visible.";

pub struct LlmImageDescriptionProcessor {
    llm: Option<Arc<LlmService>>,
}

impl LlmImageDescriptionProcessor {
    pub fn new(llm: Option<Arc<LlmService>>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Processor for LlmImageDescriptionProcessor {
    fn name(&self) -> &'static str {
        "llm-image-description"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        let Some(ref llm) = self.llm else {
            return Ok(());
        };

        let candidates = document.find_blocks(|b| {
            matches!(b.block_type, BlockType::Picture | BlockType::Figure)
                && b.alt_text.is_none()
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
                schema: ResponseSchema::object(&[(
                    "image_description",
                    json!({"type": "string"}),
                )]),
            });
        }

        run_tasks(llm, document, tasks, |block, payload| {
            if let Some(description) = string_field(payload, "image_description") {
                block.alt_text = Some(description.to_string());
            }
        })
        .await;
        Ok(())
    }
}
