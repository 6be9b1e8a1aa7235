//! Merge line fragments that share a visual row.
//!
//! Text extraction and OCR both split a visual line wherever the font run
//! changes or a column gutter confuses the detector, leaving several `Line`
//! blocks with near-identical vertical extent. Later passes (table grids,
//! paragraph consolidation, list bullets) assume one `Line` per visual row,
//! so fragments are merged here: consecutive children that vertically
//! overlap by at least half their height become one line, text joined
//! left-to-right.

use super::Processor;
use crate::document::{Block, BlockType, Document};
use crate::error::TreemarkError;
use async_trait::async_trait;

const MIN_ROW_OVERLAP: f32 = 0.5;

pub struct LineMergeProcessor;

#[async_trait]
impl Processor for LineMergeProcessor {
    fn name(&self) -> &'static str {
        "line-merge"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        document.walk_mut(|block| {
            // Only prose merges. Tables, forms, and unclassified regions
            // keep their fragments — the grid pass needs per-cell pieces,
            // and an unknown block may yet be retyped into a table.
            let prose = matches!(
                block.block_type,
                BlockType::Text
                    | BlockType::TextInlineMath
                    | BlockType::SectionHeader
                    | BlockType::Blockquote
                    | BlockType::Footnote
                    | BlockType::Caption
                    | BlockType::ListItem
                    | BlockType::Reference
            );
            if !prose {
                return;
            }
            if block.children.len() > 1
                && block
                    .children
                    .iter()
                    .all(|c| c.block_type == BlockType::Line)
            {
                block.children = merge_rows(std::mem::take(&mut block.children));
            }
        });
        Ok(())
    }
}

fn merge_rows(lines: Vec<Block>) -> Vec<Block> {
    let mut out: Vec<Block> = Vec::with_capacity(lines.len());
    for line in lines {
        match out.last_mut() {
            Some(prev)
                if prev.bbox.vertical_overlap(&line.bbox) >= MIN_ROW_OVERLAP
                    || line.bbox.vertical_overlap(&prev.bbox) >= MIN_ROW_OVERLAP =>
            {
                // Same visual row: order fragments by x, join with a space.
                let (left, right) = if line.bbox.x0 < prev.bbox.x0 {
                    (line.raw_text(), prev.raw_text())
                } else {
                    (prev.raw_text(), line.raw_text())
                };
                prev.text = Some(format!("{} {}", left.trim_end(), right.trim_start()));
                prev.bbox = prev.bbox.union(&line.bbox);
            }
            _ => out.push(line),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::BBox;

    fn line(x0: f32, y0: f32, x1: f32, y1: f32, text: &str) -> Block {
        Block::new(BlockType::Line, BBox::new(x0, y0, x1, y1)).with_text(text)
    }

    #[test]
    fn fragments_on_one_row_merge_in_x_order() {
        let merged = merge_rows(vec![
            line(10.0, 100.0, 120.0, 114.0, "The quick"),
            line(125.0, 100.5, 300.0, 114.5, "brown fox"),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].raw_text(), "The quick brown fox");
        assert!((merged[0].bbox.x1 - 300.0).abs() < f32::EPSILON);
    }

    #[test]
    fn distinct_rows_stay_separate() {
        let merged = merge_rows(vec![
            line(10.0, 100.0, 300.0, 114.0, "first row"),
            line(10.0, 120.0, 300.0, 134.0, "second row"),
        ]);
        assert_eq!(merged.len(), 2);
    }
}
