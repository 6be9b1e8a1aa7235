//! Find running headers and footers by cross-page repetition.
//!
//! A line that appears (modulo page numbers) near the top or bottom of a
//! large fraction of pages is page furniture, not content. Matching blocks
//! are retyped to `PageHeader`/`PageFooter`, which renderers skip.
//!
//! Position-only heuristics live in the page-header processor; this pass
//! catches furniture that sits outside the conventional bands — journal
//! names halfway down the margin, repeated chapter titles, and the like.

use super::Processor;
use crate::document::{BlockType, Document};
use crate::error::TreemarkError;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

/// A normalised line must appear on at least this fraction of pages.
const MIN_PAGE_FRACTION: f32 = 0.4;
/// Repetition is meaningless on very short documents.
const MIN_PAGES: usize = 3;

pub struct IgnoreTextProcessor;

#[async_trait]
impl Processor for IgnoreTextProcessor {
    fn name(&self) -> &'static str {
        "ignore-text"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        let page_count = document.pages.len();
        if page_count < MIN_PAGES {
            return Ok(());
        }

        // Count normalised first/last-block texts across pages.
        let mut seen: HashMap<String, usize> = HashMap::new();
        for page in &document.pages {
            for block in edge_blocks(page) {
                let key = normalise(&block.raw_text());
                if !key.is_empty() {
                    *seen.entry(key).or_default() += 1;
                }
            }
        }

        let threshold = ((page_count as f32) * MIN_PAGE_FRACTION).ceil() as usize;
        let repeated: Vec<&String> = seen
            .iter()
            .filter(|(_, &n)| n >= threshold)
            .map(|(k, _)| k)
            .collect();
        if repeated.is_empty() {
            return Ok(());
        }

        let mut retyped = 0usize;
        for page in &mut document.pages {
            let mid_y = (page.bbox.y0 + page.bbox.y1) / 2.0;
            for block in &mut page.blocks {
                if block.block_type != BlockType::Text {
                    continue;
                }
                let key = normalise(&block.raw_text());
                if repeated.iter().any(|r| **r == key) {
                    block.block_type = if block.bbox.center().1 < mid_y {
                        BlockType::PageHeader
                    } else {
                        BlockType::PageFooter
                    };
                    retyped += 1;
                }
            }
        }
        debug!("ignore-text: {retyped} repeated block(s) marked as furniture");
        Ok(())
    }
}

/// First and last text block of a page — where furniture lives.
fn edge_blocks(page: &crate::document::Page) -> Vec<&crate::document::Block> {
    let texts: Vec<&crate::document::Block> = page
        .blocks
        .iter()
        .filter(|b| b.block_type == BlockType::Text)
        .collect();
    match texts.len() {
        0 => Vec::new(),
        1 => texts,
        _ => vec![texts[0], texts[texts.len() - 1]],
    }
}

/// Lowercase and drop digits so "Page 12 of 98" and "Page 13 of 98" agree.
fn normalise(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_ascii_digit())
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BBox, Block, Page};

    #[tokio::test]
    async fn repeated_footer_is_retyped_across_pages() {
        let mut doc = Document::new("t");
        let bodies = ["alpha prose", "beta prose", "gamma prose", "delta prose"];
        for i in 0..4 {
            let mut page = Page::new(i, BBox::new(0.0, 0.0, 612.0, 792.0));
            page.blocks.push(
                Block::new(BlockType::Text, BBox::new(72.0, 100.0, 540.0, 400.0))
                    .with_text(bodies[i]),
            );
            page.blocks.push(
                Block::new(BlockType::Text, BBox::new(200.0, 760.0, 400.0, 780.0))
                    .with_text(format!("Journal of Examples · {}", i + 10)),
            );
            doc.pages.push(page);
        }

        IgnoreTextProcessor.process(&mut doc).await.unwrap();
        for page in &doc.pages {
            assert_eq!(page.blocks[1].block_type, BlockType::PageFooter);
            assert_eq!(page.blocks[0].block_type, BlockType::Text);
        }
    }

    #[tokio::test]
    async fn short_documents_are_left_alone() {
        let mut doc = Document::new("t");
        for i in 0..2 {
            let mut page = Page::new(i, BBox::new(0.0, 0.0, 612.0, 792.0));
            page.blocks.push(
                Block::new(BlockType::Text, BBox::new(200.0, 760.0, 400.0, 780.0))
                    .with_text("Repeated footer"),
            );
            doc.pages.push(page);
        }
        let before = serde_json::to_string(&doc).unwrap();
        IgnoreTextProcessor.process(&mut doc).await.unwrap();
        assert_eq!(serde_json::to_string(&doc).unwrap(), before);
    }
}
