//! Consolidate prose blocks into flowing text.
//!
//! Runs after every deterministic type-specific pass and after the LLM
//! table/form passes, so anything still typed as prose really is prose.
//! Lines are joined with spaces; a line-break hyphen is removed when the
//! next line starts lowercase (hy-phen-ation), kept when it starts with a
//! capital or digit (a real compound split across lines).

use super::Processor;
use crate::document::{Block, BlockType, Document};
use crate::error::TreemarkError;
use async_trait::async_trait;

pub struct TextProcessor;

#[async_trait]
impl Processor for TextProcessor {
    fn name(&self) -> &'static str {
        "text"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        document.walk_mut(|block| {
            if block.text.is_some() {
                return;
            }
            let consolidate = matches!(
                block.block_type,
                BlockType::Text
                    | BlockType::TextInlineMath
                    | BlockType::Blockquote
                    | BlockType::Footnote
                    | BlockType::ListItem
                    | BlockType::SectionHeader
                    | BlockType::Caption
                    | BlockType::Unknown
            );
            if !consolidate {
                return;
            }
            let lines: Vec<String> = block
                .children
                .iter()
                .filter(|c| c.block_type == BlockType::Line)
                .map(|c| c.raw_text())
                .filter(|t| !t.trim().is_empty())
                .collect();
            if !lines.is_empty() {
                block.text = Some(join_lines(&lines));
            }
        });
        Ok(())
    }
}

pub(crate) fn join_lines(lines: &[String]) -> String {
    let mut out = String::new();
    for line in lines {
        let line = line.trim();
        if out.is_empty() {
            out.push_str(line);
            continue;
        }
        if out.ends_with('-') {
            let continues_word = line.chars().next().is_some_and(|c| c.is_lowercase());
            if continues_word {
                out.pop();
                out.push_str(line);
                continue;
            }
        }
        out.push(' ');
        out.push_str(line);
    }
    out
}
