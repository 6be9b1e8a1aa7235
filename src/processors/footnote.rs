//! Retype footnotes the layout model left as plain text.
//!
//! A footnote is a text block in the bottom band of the page whose first
//! line opens with a footnote marker (a small integer or one of the
//! conventional symbols).

use super::Processor;
use crate::document::{BlockType, Document};
use crate::error::TreemarkError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// Fraction of page height; blocks starting below this are candidates.
const BOTTOM_BAND: f32 = 0.78;

static RE_FOOTNOTE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{1,3}[.)\s]|[*†‡§¶])").unwrap());

pub struct FootnoteProcessor;

#[async_trait]
impl Processor for FootnoteProcessor {
    fn name(&self) -> &'static str {
        "footnote"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        for page in &mut document.pages {
            let threshold = page.bbox.y0 + page.bbox.height() * BOTTOM_BAND;
            for block in &mut page.blocks {
                if block.block_type != BlockType::Text || block.bbox.y0 < threshold {
                    continue;
                }
                let text = block.raw_text();
                let Some(first_line) = text.lines().next() else { continue };
                if RE_FOOTNOTE_MARKER.is_match(first_line) {
                    block.block_type = BlockType::Footnote;
                }
            }
        }
        Ok(())
    }
}
