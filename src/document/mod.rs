//! The document tree: pages, typed blocks, and document-level metadata.
//!
//! The tree is pure data — builders create it, processors mutate it in
//! place, renderers read it. Ownership is strict: every [`Block`] belongs to
//! exactly one [`Page`] or parent block, so the structure is a tree by
//! construction and no cycle can be represented.
//!
//! The whole tree serializes with serde. Two consumers rely on that: the
//! JSON renderer, and tests that assert a processor with no work leaves the
//! serialized form byte-for-byte unchanged. Page rasters are deliberately
//! excluded from serialization (`#[serde(skip)]`) — they are working state
//! for detection and LLM region crops, not document content.

mod block;

pub use block::{BBox, Block, BlockMetadata, BlockType};

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Root container for one conversion. Created by the builders, destroyed at
/// the end of the conversion — never reused across documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    /// Display name of the source (path or caller-supplied label).
    pub source: String,

    /// Pages in document order.
    pub pages: Vec<Page>,

    /// Table of contents, seeded by the structure builder and rebuilt by the
    /// document-toc processor once section headers are final.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub toc: Vec<TocEntry>,
}

impl Document {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            pages: Vec::new(),
            toc: Vec::new(),
        }
    }

    /// Resolve a [`BlockRef`] to a shared reference, if it is still valid.
    pub fn block(&self, r: &BlockRef) -> Option<&Block> {
        let page = self.pages.get(r.page)?;
        let (first, rest) = r.path.split_first()?;
        let mut block = page.blocks.get(*first)?;
        for &idx in rest {
            block = block.children.get(idx)?;
        }
        Some(block)
    }

    /// Resolve a [`BlockRef`] to an exclusive reference, if it is still valid.
    pub fn block_mut(&mut self, r: &BlockRef) -> Option<&mut Block> {
        let page = self.pages.get_mut(r.page)?;
        let (first, rest) = r.path.split_first()?;
        let mut block = page.blocks.get_mut(*first)?;
        for &idx in rest {
            block = block.children.get_mut(idx)?;
        }
        Some(block)
    }

    /// Depth-first search over every block in every page, collecting the
    /// addresses of blocks matching `pred`.
    ///
    /// Processors use this to pin down candidates before mutating: a
    /// [`BlockRef`] stays valid across `await` points as long as no pass
    /// restructures the tree underneath it, and within one processor no
    /// other pass runs.
    pub fn find_blocks(&self, mut pred: impl FnMut(&Block) -> bool) -> Vec<BlockRef> {
        let mut out = Vec::new();
        for (page_idx, page) in self.pages.iter().enumerate() {
            let mut path = Vec::new();
            collect(&page.blocks, page_idx, &mut path, &mut out, &mut pred);
        }
        out
    }

    /// Visit every block (all depths, all pages) with an exclusive reference.
    pub fn walk_mut(&mut self, mut visit: impl FnMut(&mut Block)) {
        for page in &mut self.pages {
            for block in &mut page.blocks {
                walk_block_mut(block, &mut visit);
            }
        }
    }

    /// Total number of blocks across all pages and depths.
    pub fn block_count(&self) -> usize {
        self.find_blocks(|_| true).len()
    }
}

fn collect(
    blocks: &[Block],
    page: usize,
    path: &mut Vec<usize>,
    out: &mut Vec<BlockRef>,
    pred: &mut impl FnMut(&Block) -> bool,
) {
    for (idx, block) in blocks.iter().enumerate() {
        path.push(idx);
        if pred(block) {
            out.push(BlockRef {
                page,
                path: path.clone(),
            });
        }
        collect(&block.children, page, path, out, pred);
        path.pop();
    }
}

fn walk_block_mut(block: &mut Block, visit: &mut impl FnMut(&mut Block)) {
    visit(block);
    for child in &mut block.children {
        walk_block_mut(child, visit);
    }
}

/// One page of the document.
///
/// `blocks` is in reading order once the builders (and, for scanned pages,
/// the ordering processor) are done; no later processor reorders it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
    /// Stable zero-based page index within the *source document* (page-range
    /// selection does not renumber).
    pub index: usize,

    /// Page media box in PDF points.
    pub bbox: BBox,

    /// Top-level blocks in reading order.
    pub blocks: Vec<Block>,

    /// Set by the layout builder when the page has no digital text layer and
    /// detector output order cannot be trusted as reading order.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub needs_reorder: bool,

    /// Page raster at the configured DPI. Working state for detection and
    /// LLM region crops; never serialized.
    #[serde(skip)]
    pub image: Option<DynamicImage>,
}

impl Page {
    pub fn new(index: usize, bbox: BBox) -> Self {
        Self {
            index,
            bbox,
            blocks: Vec::new(),
            needs_reorder: false,
            image: None,
        }
    }

    /// True when the page carries no renderable content at all.
    pub fn is_blank(&self) -> bool {
        self.blocks
            .iter()
            .all(|b| b.raw_text().trim().is_empty() && b.html.is_none())
    }
}

/// A table-of-contents entry derived from a section header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    pub title: String,
    pub level: u8,
    pub page: usize,
}

/// Stable address of a block: page index plus the child-index path from the
/// page's top-level list down to the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRef {
    pub page: usize,
    pub path: Vec<usize>,
}

impl BlockRef {
    /// True for blocks directly owned by a page (not nested).
    pub fn is_top_level(&self) -> bool {
        self.path.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> Document {
        let mut doc = Document::new("test.pdf");
        let mut page = Page::new(0, BBox::new(0.0, 0.0, 612.0, 792.0));

        let mut table = Block::new(BlockType::Table, BBox::new(10.0, 10.0, 300.0, 200.0));
        table
            .children
            .push(Block::new(BlockType::Line, BBox::new(10.0, 10.0, 300.0, 20.0)));

        page.blocks.push(table);
        page.blocks.push(
            Block::new(BlockType::Text, BBox::new(10.0, 220.0, 300.0, 400.0)).with_text("hello"),
        );
        doc.pages.push(page);
        doc
    }

    #[test]
    fn find_blocks_descends_into_children() {
        let doc = sample_doc();
        let lines = doc.find_blocks(|b| b.block_type == BlockType::Line);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].path, vec![0, 0]);
        assert!(!lines[0].is_top_level());
    }

    #[test]
    fn block_ref_resolves_both_ways() {
        let mut doc = sample_doc();
        let refs = doc.find_blocks(|b| b.block_type == BlockType::Text);
        assert_eq!(refs.len(), 1);
        assert_eq!(doc.block(&refs[0]).unwrap().text.as_deref(), Some("hello"));

        doc.block_mut(&refs[0]).unwrap().text = Some("patched".into());
        assert_eq!(doc.block(&refs[0]).unwrap().text.as_deref(), Some("patched"));
    }

    #[test]
    fn stale_ref_returns_none() {
        let doc = sample_doc();
        let r = BlockRef {
            page: 0,
            path: vec![9, 9],
        };
        assert!(doc.block(&r).is_none());
    }

    #[test]
    fn serialization_skips_page_image() {
        let mut doc = sample_doc();
        doc.pages[0].image = Some(DynamicImage::new_rgb8(4, 4));
        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("image"));

        let back: Document = serde_json::from_str(&json).unwrap();
        assert!(back.pages[0].image.is_none());
        assert_eq!(back.block_count(), doc.block_count());
    }

    #[test]
    fn blank_page_detection() {
        let mut page = Page::new(3, BBox::new(0.0, 0.0, 612.0, 792.0));
        assert!(page.is_blank());
        page.blocks
            .push(Block::new(BlockType::Text, BBox::default()).with_text("x"));
        assert!(!page.is_blank());
    }
}
