//! Strip gutter line numbers (legal filings, source listings, manuscripts).
//!
//! Only fires when the numbers are systematic: most lines in the block
//! start with an integer and those integers increase monotonically. A
//! numbered list does not match — its numbers restart and its lines are a
//! minority of the page, and list blocks are typed out of scope here anyway.

use super::Processor;
use crate::document::{Block, BlockType, Document};
use crate::error::TreemarkError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

const MIN_NUMBERED_FRACTION: f32 = 0.8;
const MIN_LINES: usize = 4;

static RE_LINE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d{1,4})\s+(.*)$").unwrap());

pub struct LineNumbersProcessor;

#[async_trait]
impl Processor for LineNumbersProcessor {
    fn name(&self) -> &'static str {
        "line-numbers"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        document.walk_mut(|block| {
            if matches!(block.block_type, BlockType::Text | BlockType::Code) {
                strip_line_numbers(block);
            }
        });
        Ok(())
    }
}

fn strip_line_numbers(block: &mut Block) {
    let lines: Vec<&Block> = block
        .children
        .iter()
        .filter(|c| c.block_type == BlockType::Line)
        .collect();
    if lines.len() < MIN_LINES {
        return;
    }

    let mut numbers = Vec::new();
    let mut matched = 0usize;
    for line in &lines {
        if let Some(caps) = RE_LINE_NUMBER.captures(&line.raw_text()) {
            if let Ok(n) = caps[1].parse::<u32>() {
                numbers.push(n);
                matched += 1;
            }
        }
    }

    let fraction = matched as f32 / lines.len() as f32;
    let monotonic = numbers.windows(2).all(|w| w[1] > w[0]);
    if fraction < MIN_NUMBERED_FRACTION || !monotonic {
        return;
    }

    for child in &mut block.children {
        if child.block_type != BlockType::Line {
            continue;
        }
        let text = child.raw_text();
        if let Some(caps) = RE_LINE_NUMBER.captures(&text) {
            child.text = Some(caps[2].to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::BBox;

    fn block_with(lines: &[&str]) -> Block {
        let mut b = Block::new(BlockType::Text, BBox::default());
        for l in lines {
            b.children
                .push(Block::new(BlockType::Line, BBox::default()).with_text(*l));
        }
        b
    }

    #[test]
    fn monotonic_numbers_are_stripped() {
        let mut b = block_with(&[
            "1 The defendant entered into",
            "2 the agreement on the date",
            "3 stated above, and further",
            "4 represented that the terms",
        ]);
        strip_line_numbers(&mut b);
        assert_eq!(b.children[0].raw_text(), "The defendant entered into");
        assert_eq!(b.children[3].raw_text(), "represented that the terms");
    }

    #[test]
    fn restarting_numbers_are_kept() {
        let mut b = block_with(&[
            "1 first point",
            "2 second point",
            "1 first sub-point",
            "2 second sub-point",
        ]);
        strip_line_numbers(&mut b);
        assert_eq!(b.children[0].raw_text(), "1 first point");
    }
}
