//! Diagnostic pass: log the shape of the finished tree.
//!
//! Runs last so the histogram reflects what the renderer will see. Does
//! nothing unless `debug` is set in the configuration.

use super::Processor;
use crate::document::Document;
use crate::error::TreemarkError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

pub struct DebugProcessor {
    enabled: bool,
}

impl DebugProcessor {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl Processor for DebugProcessor {
    fn name(&self) -> &'static str {
        "debug"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        if !self.enabled {
            return Ok(());
        }
        for page in &document.pages {
            let mut histogram: BTreeMap<&'static str, usize> = BTreeMap::new();
            for block in &page.blocks {
                *histogram.entry(block.block_type.name()).or_default() += 1;
            }
            let llm_calls: u32 = page
                .blocks
                .iter()
                .map(|b| b.metadata.llm_request_count)
                .sum();
            debug!(
                page = page.index,
                blocks = page.blocks.len(),
                llm_calls,
                "debug: {histogram:?}"
            );
        }
        Ok(())
    }
}
