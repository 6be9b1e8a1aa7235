//! Rebuild the document table of contents from section headers.
//!
//! The structure builder seeds a TOC before any processor runs; this pass
//! rebuilds it after relabeling may have promoted or demoted headers, so
//! the TOC reflects the pipeline's view rather than the detector's.

use super::Processor;
use crate::document::{BlockType, Document, TocEntry};
use crate::error::TreemarkError;
use async_trait::async_trait;

pub struct DocumentTocProcessor;

#[async_trait]
impl Processor for DocumentTocProcessor {
    fn name(&self) -> &'static str {
        "document-toc"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        let mut toc = Vec::new();
        for page in &document.pages {
            for block in &page.blocks {
                if block.block_type == BlockType::SectionHeader {
                    let title = block.raw_text().trim().to_string();
                    if !title.is_empty() {
                        toc.push(TocEntry {
                            title,
                            level: block.heading_level.unwrap_or(1),
                            page: page.index,
                        });
                    }
                }
            }
        }
        document.toc = toc;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BBox, Block, Page};

    #[tokio::test]
    async fn toc_tracks_relabeled_headers() {
        let mut doc = Document::new("t");
        let mut page = Page::new(0, BBox::default());
        page.blocks.push(
            Block::new(BlockType::SectionHeader, BBox::default()).with_text("Methods"),
        );
        page.blocks
            .push(Block::new(BlockType::Text, BBox::default()).with_text("body"));
        doc.pages.push(page);

        DocumentTocProcessor.process(&mut doc).await.unwrap();
        assert_eq!(doc.toc.len(), 1);
        assert_eq!(doc.toc[0].title, "Methods");
    }
}
