//! Normalise list groups: strip bullet glyphs, mark ordered vs. bulleted,
//! and nest indented items under their parent item.

use super::Processor;
use crate::document::{Block, BlockType, Document};
use crate::error::TreemarkError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// Indentation (points) beyond the group's base edge that makes an item a
/// sub-item.
const NEST_INDENT: f32 = 12.0;

static RE_ORDERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d{1,3}|[a-z])[.)]\s+").unwrap());
static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[-–—•◦▪*·]\s+").unwrap());

pub struct ListProcessor;

#[async_trait]
impl Processor for ListProcessor {
    fn name(&self) -> &'static str {
        "list"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        document.walk_mut(|block| {
            if block.block_type == BlockType::ListGroup {
                normalise_group(block);
            }
        });
        Ok(())
    }
}

fn normalise_group(group: &mut Block) {
    let mut ordered_hits = 0usize;
    let mut item_count = 0usize;

    for item in &mut group.children {
        if item.block_type != BlockType::ListItem {
            continue;
        }
        item_count += 1;
        let text = item.raw_text();
        if RE_ORDERED.is_match(&text) {
            ordered_hits += 1;
        }
        let stripped = RE_ORDERED.replace(&text, "");
        let stripped = RE_BULLET.replace(&stripped, "");
        item.text = Some(stripped.trim().to_string());
    }

    if item_count > 0 {
        group.ordered = Some(ordered_hits * 2 > item_count);
    }

    nest_indented_items(group);
}

/// Items indented past the group's base edge become children of the
/// preceding base-level item. One level of nesting covers the common case;
/// deeper structure survives as text.
fn nest_indented_items(group: &mut Block) {
    let base_x = group
        .children
        .iter()
        .filter(|c| c.block_type == BlockType::ListItem)
        .map(|c| c.bbox.x0)
        .fold(f32::INFINITY, f32::min);
    if !base_x.is_finite() {
        return;
    }

    let items = std::mem::take(&mut group.children);
    let mut out: Vec<Block> = Vec::with_capacity(items.len());
    for item in items {
        let is_nested = item.block_type == BlockType::ListItem
            && item.bbox.x0 - base_x >= NEST_INDENT;
        match (is_nested, out.last_mut()) {
            (true, Some(parent)) if parent.block_type == BlockType::ListItem => {
                parent.children.push(item);
            }
            _ => out.push(item),
        }
    }
    group.children = out;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::BBox;

    fn item(x0: f32, y0: f32, text: &str) -> Block {
        Block::new(BlockType::ListItem, BBox::new(x0, y0, 500.0, y0 + 14.0)).with_text(text)
    }

    fn group(items: Vec<Block>) -> Block {
        let mut g = Block::new(BlockType::ListGroup, BBox::default());
        g.children = items;
        g
    }

    #[test]
    fn bullets_are_stripped_and_group_marked_unordered() {
        let mut g = group(vec![
            item(72.0, 10.0, "• first"),
            item(72.0, 30.0, "• second"),
        ]);
        normalise_group(&mut g);
        assert_eq!(g.ordered, Some(false));
        assert_eq!(g.children[0].raw_text(), "first");
    }

    #[test]
    fn numeric_prefixes_mark_group_ordered() {
        let mut g = group(vec![
            item(72.0, 10.0, "1. alpha"),
            item(72.0, 30.0, "2. beta"),
            item(72.0, 50.0, "3. gamma"),
        ]);
        normalise_group(&mut g);
        assert_eq!(g.ordered, Some(true));
        assert_eq!(g.children[1].raw_text(), "beta");
    }

    #[test]
    fn indented_items_nest_under_previous() {
        let mut g = group(vec![
            item(72.0, 10.0, "- top"),
            item(96.0, 30.0, "- nested"),
            item(72.0, 50.0, "- top two"),
        ]);
        normalise_group(&mut g);
        assert_eq!(g.children.len(), 2);
        assert_eq!(g.children[0].children.len(), 1);
        assert_eq!(g.children[0].children[0].raw_text(), "nested");
    }
}
