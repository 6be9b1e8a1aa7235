//! Deterministic table handling: retype grid-shaped unknown regions and
//! build an HTML grid from line geometry.
//!
//! This is the rule-based half of table extraction. It produces a usable
//! grid for cleanly-ruled tables; the llm-table processor later revisits
//! tables this pass could not fully parse (and only those), so model calls
//! stay targeted.

use super::Processor;
use crate::document::{Block, BlockType, Document};
use crate::error::TreemarkError;
use async_trait::async_trait;
use tracing::debug;

/// Row clustering: lines overlapping vertically by at least this fraction
/// belong to one row.
const ROW_OVERLAP: f32 = 0.5;
const MIN_GRID_ROWS: usize = 2;
const MIN_GRID_COLS: usize = 2;

pub struct TableProcessor;

#[async_trait]
impl Processor for TableProcessor {
    fn name(&self) -> &'static str {
        "table"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        let mut retyped = 0usize;
        document.walk_mut(|block| {
            match block.block_type {
                BlockType::Unknown => {
                    if let Some(grid) = extract_grid(block) {
                        if grid.len() >= MIN_GRID_ROWS
                            && grid.iter().filter(|r| r.len() >= MIN_GRID_COLS).count()
                                >= MIN_GRID_ROWS
                        {
                            block.block_type = BlockType::Table;
                            block.html = Some(grid_to_html(&grid));
                            retyped += 1;
                        }
                    }
                }
                BlockType::Table if block.html.is_none() => {
                    if let Some(grid) = extract_grid(block) {
                        block.html = Some(grid_to_html(&grid));
                    }
                }
                _ => {}
            }
        });
        if retyped > 0 {
            debug!("table: retyped {retyped} grid-shaped region(s)");
        }
        Ok(())
    }
}

/// Cluster line children into rows (by vertical overlap) and cells within a
/// row (sorted by x). Returns None when the block has no line children.
fn extract_grid(block: &Block) -> Option<Vec<Vec<String>>> {
    let mut lines: Vec<&Block> = block
        .children
        .iter()
        .filter(|c| c.block_type == BlockType::Line && !c.raw_text().trim().is_empty())
        .collect();
    if lines.is_empty() {
        return None;
    }
    lines.sort_by(|a, b| {
        a.bbox
            .y0
            .partial_cmp(&b.bbox.y0)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut rows: Vec<Vec<&Block>> = Vec::new();
    for line in lines {
        match rows.last_mut() {
            Some(row)
                if row
                    .iter()
                    .any(|r| r.bbox.vertical_overlap(&line.bbox) >= ROW_OVERLAP) =>
            {
                row.push(line);
            }
            _ => rows.push(vec![line]),
        }
    }

    Some(
        rows.into_iter()
            .map(|mut row| {
                row.sort_by(|a, b| {
                    a.bbox
                        .x0
                        .partial_cmp(&b.bbox.x0)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                row.iter().map(|c| c.raw_text().trim().to_string()).collect()
            })
            .collect(),
    )
}

fn grid_to_html(grid: &[Vec<String>]) -> String {
    let mut html = String::from("<table>");
    for row in grid {
        html.push_str("<tr>");
        for cell in row {
            html.push_str("<td>");
            html.push_str(&escape(cell));
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    html
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
