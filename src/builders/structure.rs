//! Structure build: final topology pass before the processor pipeline.
//!
//! Three normalisations, all page-local:
//!
//! * Runs of consecutive `ListItem` blocks are wrapped in a `ListGroup`
//!   whose box is the union of its items.
//! * A `Caption` adjacent to a table, figure, or picture moves into that
//!   block's children (captions travel with what they caption).
//! * The document TOC is seeded from section headers; the document-toc
//!   processor rebuilds it once heading levels are final.

use crate::document::{Block, BlockType, Document, TocEntry};
use crate::error::TreemarkError;
use tracing::debug;

/// Maximum vertical gap (points) between a caption and the block it is
/// attached to.
const CAPTION_ATTACH_GAP: f32 = 24.0;

#[derive(Default)]
pub struct StructureBuilder;

impl StructureBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, document: &mut Document) -> Result<(), TreemarkError> {
        for page in &mut document.pages {
            group_list_items(&mut page.blocks);
            attach_captions(&mut page.blocks);
        }
        seed_toc(document);
        debug!(
            "structure: {} page(s), {} block(s), {} toc entrie(s)",
            document.pages.len(),
            document.block_count(),
            document.toc.len()
        );
        Ok(())
    }
}

/// Wrap each maximal run of consecutive `ListItem` blocks in a `ListGroup`.
fn group_list_items(blocks: &mut Vec<Block>) {
    let mut out: Vec<Block> = Vec::with_capacity(blocks.len());
    let mut run: Vec<Block> = Vec::new();

    for block in blocks.drain(..) {
        if block.block_type == BlockType::ListItem {
            run.push(block);
        } else {
            flush_run(&mut run, &mut out);
            out.push(block);
        }
    }
    flush_run(&mut run, &mut out);
    *blocks = out;
}

fn flush_run(run: &mut Vec<Block>, out: &mut Vec<Block>) {
    if run.is_empty() {
        return;
    }
    let bbox = run
        .iter()
        .skip(1)
        .fold(run[0].bbox, |acc, b| acc.union(&b.bbox));
    let mut group = Block::new(BlockType::ListGroup, bbox);
    group.children = std::mem::take(run);
    out.push(group);
}

/// Move each caption into the children of the vertically-closest table,
/// figure, or picture within [`CAPTION_ATTACH_GAP`].
fn attach_captions(blocks: &mut Vec<Block>) {
    let caption_indices: Vec<usize> = blocks
        .iter()
        .enumerate()
        .filter(|(_, b)| b.block_type == BlockType::Caption)
        .map(|(i, _)| i)
        .collect();

    // Process back to front so earlier indices stay valid after removal.
    for &ci in caption_indices.iter().rev() {
        let caption_bbox = blocks[ci].bbox;
        let mut target: Option<(usize, f32)> = None;

        for (i, block) in blocks.iter().enumerate() {
            if !matches!(
                block.block_type,
                BlockType::Table | BlockType::Figure | BlockType::Picture
            ) {
                continue;
            }
            // Gap between the caption and the block, whichever is on top.
            let gap = if caption_bbox.y0 >= block.bbox.y1 {
                caption_bbox.y0 - block.bbox.y1
            } else if block.bbox.y0 >= caption_bbox.y1 {
                block.bbox.y0 - caption_bbox.y1
            } else {
                0.0
            };
            if gap <= CAPTION_ATTACH_GAP && target.map_or(true, |(_, g)| gap < g) {
                target = Some((i, gap));
            }
        }

        if let Some((ti, _)) = target {
            let caption = blocks.remove(ci);
            let ti = if ti > ci { ti - 1 } else { ti };
            blocks[ti].children.push(caption);
        }
    }
}

fn seed_toc(document: &mut Document) {
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BBox, Page};

    fn item(y0: f32, text: &str) -> Block {
        Block::new(BlockType::ListItem, BBox::new(72.0, y0, 540.0, y0 + 14.0)).with_text(text)
    }

    #[test]
    fn consecutive_list_items_are_grouped() {
        let mut blocks = vec![
            Block::new(BlockType::Text, BBox::new(72.0, 10.0, 540.0, 30.0)),
            item(40.0, "first"),
            item(60.0, "second"),
            Block::new(BlockType::Text, BBox::new(72.0, 90.0, 540.0, 120.0)),
            item(130.0, "third"),
        ];
        group_list_items(&mut blocks);

        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[1].block_type, BlockType::ListGroup);
        assert_eq!(blocks[1].children.len(), 2);
        assert_eq!(blocks[3].block_type, BlockType::ListGroup);
        assert_eq!(blocks[3].children.len(), 1);
    }

    #[test]
    fn caption_attaches_to_nearby_table() {
        let mut blocks = vec![
            Block::new(BlockType::Table, BBox::new(72.0, 100.0, 540.0, 300.0)),
            Block::new(BlockType::Caption, BBox::new(72.0, 305.0, 540.0, 320.0))
                .with_text("Table 1: results"),
        ];
        attach_captions(&mut blocks);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].children.len(), 1);
        assert_eq!(blocks[0].children[0].block_type, BlockType::Caption);
    }

    #[test]
    fn distant_caption_stays_top_level() {
        let mut blocks = vec![
            Block::new(BlockType::Table, BBox::new(72.0, 100.0, 540.0, 200.0)),
            Block::new(BlockType::Caption, BBox::new(72.0, 600.0, 540.0, 615.0)),
        ];
        attach_captions(&mut blocks);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn toc_is_seeded_from_section_headers() {
        let mut doc = Document::new("t");
        let mut page = Page::new(0, BBox::new(0.0, 0.0, 612.0, 792.0));
        page.blocks.push(
            Block::new(BlockType::SectionHeader, BBox::new(72.0, 72.0, 540.0, 100.0))
                .with_text("Introduction"),
        );
        doc.pages.push(page);

        StructureBuilder::new().build(&mut doc).unwrap();
        assert_eq!(doc.toc.len(), 1);
        assert_eq!(doc.toc[0].title, "Introduction");
        assert_eq!(doc.toc[0].page, 0);
    }
}
