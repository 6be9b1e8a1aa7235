//! Split bibliography blocks into one entry per line.

use super::Processor;
use crate::document::{BlockType, Document};
use crate::error::TreemarkError;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_ENTRY_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d{1,3}\]").unwrap());

pub struct ReferenceProcessor;

#[async_trait]
impl Processor for ReferenceProcessor {
    fn name(&self) -> &'static str {
        "reference"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        document.walk_mut(|block| {
            if block.block_type != BlockType::Reference {
                return;
            }
            let raw = block.raw_text();
            if raw.trim().is_empty() {
                return;
            }
            block.text = Some(split_entries(&raw));
        });
        Ok(())
    }
}

/// Re-split flowed bibliography text so each `[n]` entry starts a line.
fn split_entries(raw: &str) -> String {
    let flat = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(flat.len());
    let mut last_end = 0usize;
    for (i, m) in RE_ENTRY_START.find_iter(&flat).enumerate() {
        if i > 0 {
            out.push_str(flat[last_end..m.start()].trim_end());
            out.push('\n');
        }
        last_end = m.start();
    }
    out.push_str(flat[last_end..].trim_end());
    out
}
