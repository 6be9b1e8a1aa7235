//! Re-transcribe equations whose extracted LaTeX is missing or mangled.
//!
//! The deterministic equation pass consolidated whatever text the extraction
//! produced; here only the failures are revisited: empty bodies, OCR
//! replacement characters, or unbalanced braces (a reliable sign the
//! structure got lost).

use super::{region_image, run_tasks, string_field, LlmTask};
use crate::document::{Block, BlockType, Document};
use crate::error::TreemarkError;
use crate::processors::Processor;
use crate::services::{LlmService, ResponseSchema};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const PROMPT: &str = "You are given an image of a mathematical expression from a \
document page. Transcribe it into LaTeX, without surrounding $ or $$ delimiters. \
Respond only with the LaTeX.";

pub struct LlmEquationProcessor {
    llm: Option<Arc<LlmService>>,
}

impl LlmEquationProcessor {
    pub fn new(llm: Option<Arc<LlmService>>) -> Self {
        Self { llm }
    }
}

fn needs_retranscription(block: &Block) -> bool {
    let text = block.raw_text();
    let text = text.trim();
    text.is_empty() || text.contains('\u{FFFD}') || !braces_balanced(text)
}

fn braces_balanced(text: &str) -> bool {
    let mut depth = 0i32;
    for c in text.chars() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}

#[async_trait]
impl Processor for LlmEquationProcessor {
    fn name(&self) -> &'static str {
        "llm-equation"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        let Some(ref llm) = self.llm else {
            return Ok(());
        };

        let candidates = document
            .find_blocks(|b| b.block_type == BlockType::Equation && needs_retranscription(b));

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
                    "latex_equation",
                    json!({"type": "string"}),
                )]),
            });
        }

        run_tasks(llm, document, tasks, |block, payload| {
            if let Some(latex) = string_field(payload, "latex_equation") {
                let latex = latex.trim_matches('$').trim();
                if !latex.is_empty() && braces_balanced(latex) {
                    block.text = Some(latex.to_string());
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
    use crate::document::BBox;

    #[test]
    fn balanced_extractions_are_not_candidates() {
        let b = Block::new(BlockType::Equation, BBox::default())
            .with_text("\\frac{a}{b} + c");
        assert!(!needs_retranscription(&b));
    }

    #[test]
    fn unbalanced_braces_are_candidates() {
        let b = Block::new(BlockType::Equation, BBox::default()).with_text("\\frac{a}{b");
        assert!(needs_retranscription(&b));
    }

    #[test]
    fn empty_equations_are_candidates() {
        let b = Block::new(BlockType::Equation, BBox::default());
        assert!(needs_retranscription(&b));
    }
}
