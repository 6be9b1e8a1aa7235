//! Retype indented, narrowed text blocks as blockquotes.

use super::Processor;
use crate::document::{BlockType, Document, Page};
use crate::error::TreemarkError;
use async_trait::async_trait;

/// How far (points) past the page's body margin a block must start.
const MIN_INDENT: f32 = 30.0;
/// Quotes are narrower than body text; full-width indented blocks are more
/// likely continuation paragraphs.
const MAX_WIDTH_FRACTION: f32 = 0.85;

pub struct BlockquoteProcessor;

#[async_trait]
impl Processor for BlockquoteProcessor {
    fn name(&self) -> &'static str {
        "blockquote"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        for page in &mut document.pages {
            let Some(margin) = body_left_margin(page) else { continue };
            let body_width = page.bbox.width();

            for block in &mut page.blocks {
                if block.block_type != BlockType::Text {
                    continue;
                }
                let indented = block.bbox.x0 - margin >= MIN_INDENT;
                let narrowed = block.bbox.width() <= body_width * MAX_WIDTH_FRACTION;
                if indented && narrowed {
                    block.block_type = BlockType::Blockquote;
                }
            }
        }
        Ok(())
    }
}

/// The leftmost edge of the page's text blocks — the body margin.
fn body_left_margin(page: &Page) -> Option<f32> {
    let mut edges: Vec<f32> = page
        .blocks
        .iter()
        .filter(|b| b.block_type == BlockType::Text)
        .map(|b| b.bbox.x0)
        .collect();
    if edges.is_empty() {
        return None;
    }
    edges.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(edges[0])
}
