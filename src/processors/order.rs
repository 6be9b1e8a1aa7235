//! Reading-order pass for scanned pages.
//!
//! Digital pages keep provider order — the text layer is already in reading
//! order and nothing here touches those pages. Scanned pages carry detector
//! output order, which follows detection confidence rather than how a human
//! reads. Those are re-sorted: full-width blocks split the page into
//! vertical bands, and within a band blocks go left column before right
//! column, top before bottom.

use super::Processor;
use crate::document::{Block, Document, Page};
use crate::error::TreemarkError;
use async_trait::async_trait;
use tracing::debug;

/// Blocks wider than this fraction of the page body are treated as
/// band separators (titles, full-width figures).
const FULL_WIDTH_FRACTION: f32 = 0.55;

pub struct OrderProcessor;

#[async_trait]
impl Processor for OrderProcessor {
    fn name(&self) -> &'static str {
        "order"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        for page in &mut document.pages {
            if !page.needs_reorder {
                continue;
            }
            reorder_page(page);
            debug!("order: reordered page {}", page.index);
        }
        Ok(())
    }
}

fn reorder_page(page: &mut Page) {
    let mid_x = (page.bbox.x0 + page.bbox.x1) / 2.0;
    let full_width = page.bbox.width() * FULL_WIDTH_FRACTION;

    // Assign each block to a band: bands are delimited by full-width blocks
    // in top-to-bottom order.
    let mut keyed: Vec<(usize, u8, f32, f32, Block)> = Vec::with_capacity(page.blocks.len());
    let mut by_y: Vec<Block> = std::mem::take(&mut page.blocks);
    by_y.sort_by(|a, b| {
        a.bbox
            .y0
            .partial_cmp(&b.bbox.y0)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut band = 0usize;
    for block in by_y {
        let is_full = block.bbox.width() >= full_width;
        if is_full {
            band += 1;
            keyed.push((band, 0, block.bbox.y0, block.bbox.x0, block));
            band += 1;
        } else {
            let col = if block.bbox.center().0 <= mid_x { 0 } else { 1 };
            keyed.push((band, col, block.bbox.y0, block.bbox.x0, block));
        }
    }

    keyed.sort_by(|a, b| {
        (a.0, a.1)
            .cmp(&(b.0, b.1))
            .then(a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
            .then(a.3.partial_cmp(&b.3).unwrap_or(std::cmp::Ordering::Equal))
    });

    page.blocks = keyed.into_iter().map(|(_, _, _, _, b)| b).collect();
}
