//! Assign heading levels to section headers by text height.
//!
//! Without font metadata the best proxy for heading rank is line height:
//! chapter titles are set larger than section titles, which are larger than
//! subsections. Header heights are clustered document-wide (quantised to
//! absorb rasterisation jitter) and the tallest cluster becomes level 1.

use super::Processor;
use crate::document::{BlockType, Document};
use crate::error::TreemarkError;
use async_trait::async_trait;

/// Heights within this many points are one cluster.
const HEIGHT_QUANTUM: f32 = 2.0;
const MAX_LEVEL: u8 = 4;

pub struct SectionHeaderProcessor;

#[async_trait]
impl Processor for SectionHeaderProcessor {
    fn name(&self) -> &'static str {
        "section-header"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        // Representative height per header: its first line, or the block
        // itself for single-line headers.
        let refs = document.find_blocks(|b| b.block_type == BlockType::SectionHeader);
        if refs.is_empty() {
            return Ok(());
        }

        let mut heights: Vec<f32> = Vec::with_capacity(refs.len());
        for r in &refs {
            let Some(block) = document.block(r) else { continue };
            heights.push(header_height(block));
        }

        let clusters = cluster_heights(&heights);

        for (r, h) in refs.iter().zip(&heights) {
            let level = clusters
                .iter()
                .position(|c| (c - h).abs() <= HEIGHT_QUANTUM)
                .map(|i| (i as u8 + 1).min(MAX_LEVEL))
                .unwrap_or(MAX_LEVEL);
            if let Some(block) = document.block_mut(r) {
                block.heading_level = Some(level);
            }
        }
        Ok(())
    }
}

fn header_height(block: &crate::document::Block) -> f32 {
    block
        .children
        .first()
        .map(|line| line.bbox.height())
        .filter(|h| *h > 0.0)
        .unwrap_or_else(|| block.bbox.height())
}

/// Distinct quantised heights, tallest first.
fn cluster_heights(heights: &[f32]) -> Vec<f32> {
    let mut sorted = heights.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let mut clusters: Vec<f32> = Vec::new();
    for h in sorted {
        if clusters
            .last()
            .map_or(true, |&c| (c - h).abs() > HEIGHT_QUANTUM)
        {
            clusters.push(h);
        }
    }
    clusters
}
