//! Detect code listings the layout model labeled as plain text, and
//! consolidate the text of code blocks with line breaks preserved.

use super::Processor;
use crate::document::{Block, BlockType, Document};
use crate::error::TreemarkError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// Fraction of lines that must look code-like before a text block is
/// retyped.
const MIN_CODE_LINE_FRACTION: f32 = 0.6;
const MIN_LINES: usize = 3;

static RE_CODE_LINE: Lazy<Regex> = Lazy::new(|| {
    // Leading indentation, or trailing statement/block punctuation, or
    // operators that rarely appear in prose.
    Regex::new(r"(?x)
        ^\s{2,}
        | [;{}]\s*$
        | ::
        | ->
        | =>
        | \(\)
        | ^\s*(fn|def|class|import|return|if|for|while|let|const|var)\b
    ")
    .unwrap()
});

pub struct CodeProcessor;

#[async_trait]
impl Processor for CodeProcessor {
    fn name(&self) -> &'static str {
        "code"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        document.walk_mut(|block| {
            match block.block_type {
                BlockType::Code => consolidate(block),
                BlockType::Text | BlockType::Unknown => {
                    if looks_like_code(block) {
                        block.block_type = BlockType::Code;
                        consolidate(block);
                    }
                }
                _ => {}
            }
        });
        Ok(())
    }
}

/// Join line children preserving line breaks; prose consolidation would
/// destroy the indentation that makes a listing readable.
fn consolidate(block: &mut Block) {
    if block.text.is_some() {
        return;
    }
    let lines: Vec<String> = block
        .children
        .iter()
        .filter(|c| c.block_type == BlockType::Line)
        .map(|c| c.raw_text())
        .collect();
    if !lines.is_empty() {
        block.text = Some(lines.join("\n"));
    }
}

fn looks_like_code(block: &Block) -> bool {
    let lines: Vec<String> = block
        .children
        .iter()
        .filter(|c| c.block_type == BlockType::Line)
        .map(|c| c.raw_text())
        .collect();
    if lines.len() < MIN_LINES {
        return false;
    }
    let code_like = lines.iter().filter(|l| RE_CODE_LINE.is_match(l)).count();
    code_like as f32 / lines.len() as f32 >= MIN_CODE_LINE_FRACTION
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::BBox;

    fn block_with_lines(block_type: BlockType, lines: &[&str]) -> Block {
        let mut b = Block::new(block_type, BBox::default());
        for l in lines {
            b.children
                .push(Block::new(BlockType::Line, BBox::default()).with_text(*l));
        }
        b
    }

    #[test]
    fn rust_snippet_is_detected() {
        let b = block_with_lines(
            BlockType::Text,
            &[
                "fn main() {",
                "    let x = compute();",
                "    println!(\"{}\", x);",
                "}",
            ],
        );
        assert!(looks_like_code(&b));
    }

    #[test]
    fn prose_is_not_detected() {
        let b = block_with_lines(
            BlockType::Text,
            &[
                "The results in table two show a",
                "clear improvement over the baseline",
                "across every benchmark we measured.",
            ],
        );
        assert!(!looks_like_code(&b));
    }

    #[tokio::test]
    async fn code_blocks_keep_line_breaks() {
        let mut doc = Document::new("t");
        let mut page = crate::document::Page::new(0, BBox::default());
        page.blocks
            .push(block_with_lines(BlockType::Code, &["a = 1;", "b = 2;"]));
        doc.pages.push(page);

        CodeProcessor.process(&mut doc).await.unwrap();
        assert_eq!(
            doc.pages[0].blocks[0].text.as_deref(),
            Some("a = 1;\nb = 2;")
        );
    }
}
