//! Drop detector noise from blank pages.
//!
//! Layout models hallucinate a few low-confidence boxes on genuinely empty
//! pages (separator sheets, intentionally-blank backsides). A page whose
//! blocks carry no text and no structured content gets its blocks cleared;
//! the page itself stays, so page indices remain stable.

use super::Processor;
use crate::document::Document;
use crate::error::TreemarkError;
use async_trait::async_trait;
use tracing::debug;

pub struct BlankPageProcessor;

#[async_trait]
impl Processor for BlankPageProcessor {
    fn name(&self) -> &'static str {
        "blank-page"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        for page in &mut document.pages {
            if !page.blocks.is_empty() && page.is_blank() {
                debug!(
                    "blank-page: clearing {} empty block(s) from page {}",
                    page.blocks.len(),
                    page.index
                );
                page.blocks.clear();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BBox, Block, BlockType, Page};

    #[tokio::test]
    async fn empty_blocks_are_cleared_but_content_kept() {
        let mut doc = Document::new("t");

        let mut blank = Page::new(0, BBox::default());
        blank
            .blocks
            .push(Block::new(BlockType::Text, BBox::default()));
        doc.pages.push(blank);

        let mut content = Page::new(1, BBox::default());
        content
            .blocks
            .push(Block::new(BlockType::Text, BBox::default()).with_text("hello"));
        doc.pages.push(content);

        BlankPageProcessor.process(&mut doc).await.unwrap();
        assert!(doc.pages[0].blocks.is_empty());
        assert_eq!(doc.pages[1].blocks.len(), 1);
    }
}
