//! Chunked rendering: one retrieval-sized piece per top-level block.
//!
//! The shape downstream RAG pipelines consume — each chunk is independently
//! meaningful, carries its page and type, and its text matches what the
//! Markdown renderer would have produced for that block.

use super::markdown::block_markdown;
use super::{Chunk, OverrideMap, RenderedOutput, Renderer};
use crate::document::Document;
use crate::error::TreemarkError;
use std::sync::Arc;

pub struct ChunkedRenderer {
    overrides: Arc<OverrideMap>,
}

impl ChunkedRenderer {
    pub fn new(overrides: Arc<OverrideMap>) -> Self {
        Self { overrides }
    }
}

impl Renderer for ChunkedRenderer {
    fn name(&self) -> &'static str {
        "chunked"
    }

    fn render(&self, document: &Document) -> Result<RenderedOutput, TreemarkError> {
        let mut chunks = Vec::new();
        for page in &document.pages {
            for block in &page.blocks {
                if let Some(text) = block_markdown(block, &self.overrides) {
                    chunks.push(Chunk {
                        page: page.index,
                        block_type: block.block_type.name().to_string(),
                        text,
                    });
                }
            }
        }
        Ok(RenderedOutput::Chunked { chunks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BBox, Block, BlockType, Page};

    #[test]
    fn one_chunk_per_contentful_top_level_block() {
        let mut doc = Document::new("t");
        let mut page = Page::new(2, BBox::default());
        page.blocks
            .push(Block::new(BlockType::Text, BBox::default()).with_text("first"));
        page.blocks
            .push(Block::new(BlockType::PageHeader, BBox::default()).with_text("skipped"));
        page.blocks
            .push(Block::new(BlockType::Text, BBox::default()).with_text("second"));
        doc.pages.push(page);

        let r = ChunkedRenderer::new(Arc::new(OverrideMap::new()));
        let RenderedOutput::Chunked { chunks } = r.render(&doc).unwrap() else {
            unreachable!()
        };
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, 2);
        assert_eq!(chunks[0].block_type, "text");
        assert_eq!(chunks[1].text, "second");
    }
}
