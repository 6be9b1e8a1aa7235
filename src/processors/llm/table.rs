//! Rebuild tables the deterministic grid pass could not fully parse.

use super::{region_image, run_tasks, string_field, LlmTask};
use crate::document::{BlockType, Document};
use crate::error::TreemarkError;
use crate::processors::Processor;
use crate::services::{LlmService, ResponseSchema};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const PROMPT: &str = "You are given an image of a table cropped from a document page, \
and the table's current (possibly wrong or incomplete) HTML extraction. \
Rewrite the table as complete, well-formed HTML using <table>, <tr>, <th> and <td> tags. \
Preserve every cell's content exactly as it appears in the image. \
Use rowspan/colspan attributes for merged cells. \
Respond only with the corrected HTML.\n\nCurrent extraction:\n";

pub struct LlmTableProcessor {
    llm: Option<Arc<LlmService>>,
}

impl LlmTableProcessor {
    pub fn new(llm: Option<Arc<LlmService>>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Processor for LlmTableProcessor {
    fn name(&self) -> &'static str {
        "llm-table"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        let Some(ref llm) = self.llm else {
            return Ok(());
        };

        // A table without an HTML grid, or with a degenerate one (no data
        // cells), is one the rule-based pass gave up on.
        let candidates = document.find_blocks(|b| {
            b.block_type == BlockType::Table
                && b.html.as_deref().map_or(true, |h| !h.contains("<td"))
        });

        let mut tasks = Vec::new();
        for r in candidates {
            let Some(image) = region_image(document, &r) else {
                continue;
            };
            let current = document
                .block(&r)
                .and_then(|b| b.html.clone())
                .unwrap_or_else(|| "(none)".to_string());
            tasks.push(LlmTask {
                target: r,
                prompt: format!("{PROMPT}{current}"),
                images: vec![image],
                schema: ResponseSchema::object(&[("table_html", json!({"type": "string"}))]),
            });
        }

        run_tasks(llm, document, tasks, |block, payload| {
            if let Some(html) = string_field(payload, "table_html") {
                if html.contains("<table") && html.contains("<td") {
                    block.html = Some(html.to_string());
                }
            }
        })
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BBox, Block, Page};

    /// Zero candidates must leave the serialized tree untouched, service or
    /// no service.
    #[tokio::test]
    async fn no_candidates_is_byte_for_byte_no_op() {
        let mut doc = Document::new("t");
        let mut page = Page::new(0, BBox::default());
        let mut table = Block::new(BlockType::Table, BBox::default());
        table.html = Some("<table><tr><td>done</td></tr></table>".into());
        page.blocks.push(table);
        doc.pages.push(page);

        let before = serde_json::to_string(&doc).unwrap();
        LlmTableProcessor::new(None).process(&mut doc).await.unwrap();
        assert_eq!(serde_json::to_string(&doc).unwrap(), before);
    }
}
