//! Config-driven relabeling, applied before any type-specific pass.
//!
//! Rules come from `ConverterConfig::block_relabel` as `"from:to"` pairs of
//! block-type names, e.g. `"picture:figure"` to fold every picture into the
//! figure handling path. A rule naming an unknown type is a processor
//! failure — silently skipping it would hide a config typo until someone
//! noticed the output was wrong.

use super::Processor;
use crate::document::{BlockType, Document};
use crate::error::TreemarkError;
use async_trait::async_trait;
use tracing::debug;

pub struct BlockRelabelProcessor {
    rules: Vec<String>,
}

impl BlockRelabelProcessor {
    pub fn new(rules: Vec<String>) -> Self {
        Self { rules }
    }

    fn parsed_rules(&self) -> Result<Vec<(BlockType, BlockType)>, TreemarkError> {
        self.rules
            .iter()
            .map(|rule| {
                let (from, to) = rule.split_once(':').ok_or_else(|| TreemarkError::Processor {
                    name: "block-relabel",
                    detail: format!("rule '{rule}' is not of the form 'from:to'"),
                })?;
                let parse = |name: &str| {
                    BlockType::from_name(name.trim()).ok_or_else(|| TreemarkError::Processor {
                        name: "block-relabel",
                        detail: format!("unknown block type '{name}' in rule '{rule}'"),
                    })
                };
                Ok((parse(from)?, parse(to)?))
            })
            .collect()
    }
}

#[async_trait]
impl Processor for BlockRelabelProcessor {
    fn name(&self) -> &'static str {
        "block-relabel"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        if self.rules.is_empty() {
            return Ok(());
        }
        let rules = self.parsed_rules()?;

        let mut relabeled = 0usize;
        document.walk_mut(|block| {
            for &(from, to) in &rules {
                if block.block_type == from {
                    block.block_type = to;
                    relabeled += 1;
                    break;
                }
            }
        });
        debug!("block-relabel: {relabeled} block(s) relabeled");
        Ok(())
    }
}
