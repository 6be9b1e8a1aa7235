//! Position-based page furniture detection.
//!
//! Short text sitting entirely inside the top band of the page is a running
//! header even when it never repeats (single-page documents, title variants
//! with section names). The repetition-based pass (ignore-text) has already
//! run; this catches what it cannot.

use super::Processor;
use crate::document::{BlockType, Document};
use crate::error::TreemarkError;
use async_trait::async_trait;

/// Fraction of page height counted as the header band.
const TOP_BAND: f32 = 0.07;
/// Headers are short; long text at the top of a page is body content.
const MAX_HEADER_CHARS: usize = 120;

pub struct PageHeaderProcessor;

#[async_trait]
impl Processor for PageHeaderProcessor {
    fn name(&self) -> &'static str {
        "page-header"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        for page in &mut document.pages {
            let band_bottom = page.bbox.y0 + page.bbox.height() * TOP_BAND;
            for block in &mut page.blocks {
                if block.block_type != BlockType::Text {
                    continue;
                }
                if block.bbox.y1 <= band_bottom
                    && block.raw_text().trim().len() <= MAX_HEADER_CHARS
                {
                    block.block_type = BlockType::PageHeader;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BBox, Block, Page};

    #[tokio::test]
    async fn short_top_band_text_is_header() {
        let mut doc = Document::new("t");
        let mut page = Page::new(0, BBox::new(0.0, 0.0, 612.0, 792.0));
        page.blocks.push(
            Block::new(BlockType::Text, BBox::new(72.0, 20.0, 300.0, 40.0))
                .with_text("Chapter 3 · Methods"),
        );
        page.blocks.push(
            Block::new(BlockType::Text, BBox::new(72.0, 80.0, 540.0, 300.0))
                .with_text("Body paragraph."),
        );
        doc.pages.push(page);

        PageHeaderProcessor.process(&mut doc).await.unwrap();
        assert_eq!(doc.pages[0].blocks[0].block_type, BlockType::PageHeader);
        assert_eq!(doc.pages[0].blocks[1].block_type, BlockType::Text);
    }
}
