//! Line build: assign the digital text layer into layout blocks.
//!
//! Each provider line becomes a `Line` child of the layout block whose box
//! contains the line's center. Lines no block claims are attached to the
//! nearest block within a small distance; beyond that they become their own
//! `Unknown` top-level block so no text is silently dropped.

use crate::document::{Block, BlockType, Document};
use crate::error::TreemarkError;
use crate::provider::PageProvider;
use tracing::debug;

/// Maximum center-to-center distance (in points) at which an uncontained
/// line is still attached to its nearest block.
const MAX_ATTACH_DISTANCE: f32 = 40.0;

#[derive(Default)]
pub struct LineBuilder;

impl LineBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(
        &self,
        provider: &dyn PageProvider,
        document: &mut Document,
    ) -> Result<(), TreemarkError> {
        for page in &mut document.pages {
            let lines = provider.page_lines(page.index)?;
            let mut orphans = 0usize;

            for line in lines {
                let (cx, cy) = line.bbox.center();

                let mut containing: Option<usize> = None;
                let mut nearest: Option<(usize, f32)> = None;
                for (i, block) in page.blocks.iter().enumerate() {
                    if block.bbox.contains_point(cx, cy) {
                        containing = Some(i);
                        break;
                    }
                    let (bx, by) = block.bbox.center();
                    let dist = ((bx - cx).powi(2) + (by - cy).powi(2)).sqrt();
                    if nearest.map_or(true, |(_, d)| dist < d) {
                        nearest = Some((i, dist));
                    }
                }

                let line_block = Block::new(BlockType::Line, line.bbox).with_text(line.text);

                match containing.or(nearest
                    .filter(|&(_, d)| d <= MAX_ATTACH_DISTANCE)
                    .map(|(i, _)| i))
                {
                    Some(i) => page.blocks[i].children.push(line_block),
                    None => {
                        let mut holder = Block::new(BlockType::Unknown, line_block.bbox);
                        holder.children.push(line_block);
                        page.blocks.push(holder);
                        orphans += 1;
                    }
                }
            }

            if orphans > 0 {
                debug!("line: page {} has {orphans} orphan line(s)", page.index);
            }
        }
        Ok(())
    }
}
