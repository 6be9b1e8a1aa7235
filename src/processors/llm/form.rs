//! Extract label/value structure from form regions.

use super::{region_image, run_tasks, string_field, LlmTask};
use crate::document::{BlockType, Document};
use crate::error::TreemarkError;
use crate::processors::Processor;
use crate::services::{LlmService, ResponseSchema};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const PROMPT: &str = "You are given an image of a form region from a document page. \
Extract every field as a label/value pair and render the result as an HTML table \
with two columns: the field label and the field value. Use an empty cell for \
blank fields. Preserve checkbox state as [x] or [ ]. \
Respond only with the HTML.";

pub struct LlmFormProcessor {
    llm: Option<Arc<LlmService>>,
}

impl LlmFormProcessor {
    pub fn new(llm: Option<Arc<LlmService>>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Processor for LlmFormProcessor {
    fn name(&self) -> &'static str {
        "llm-form"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        let Some(ref llm) = self.llm else {
            return Ok(());
        };

        let candidates =
            document.find_blocks(|b| b.block_type == BlockType::Form && b.html.is_none());

        let mut tasks = Vec::new();
        for r in candidates {
            let Some(image) = region_image(document, &r) else {
                continue;
            };
            tasks.push(LlmTask {
                target: r,
                prompt: PROMPT.to_string(),
                images: vec![image],
                schema: ResponseSchema::object(&[("form_html", json!({"type": "string"}))]),
            });
        }

        run_tasks(llm, document, tasks, |block, payload| {
            if let Some(html) = string_field(payload, "form_html") {
                if html.contains("<table") {
                    block.html = Some(html.to_string());
                }
            }
        })
        .await;
        Ok(())
    }
}
