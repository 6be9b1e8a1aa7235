//! Consolidate equation blocks into a single LaTeX body.
//!
//! Extraction frequently leaves display equations wrapped in stray `$` or
//! `$$` delimiters, or split across lines. The block's text becomes the
//! bare LaTeX — renderers add their own delimiters.

use super::Processor;
use crate::document::{BlockType, Document};
use crate::error::TreemarkError;
use async_trait::async_trait;

pub struct EquationProcessor;

#[async_trait]
impl Processor for EquationProcessor {
    fn name(&self) -> &'static str {
        "equation"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        document.walk_mut(|block| {
            if block.block_type != BlockType::Equation {
                return;
            }
            let raw = block.raw_text();
            let cleaned = strip_delimiters(&raw);
            if !cleaned.is_empty() {
                block.text = Some(cleaned);
            }
        });
        Ok(())
    }
}

fn strip_delimiters(raw: &str) -> String {
    let joined = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    joined
        .trim()
        .trim_start_matches("$$")
        .trim_end_matches("$$")
        .trim_matches('$')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dollar_delimiters_are_stripped() {
        assert_eq!(strip_delimiters("$$E = mc^2$$"), "E = mc^2");
        assert_eq!(strip_delimiters("$\\alpha + \\beta$"), "\\alpha + \\beta");
    }

    #[test]
    fn multiline_equations_join_on_one_line() {
        assert_eq!(
            strip_delimiters("\\sum_{i=0}^{n}\n  x_i^2"),
            "\\sum_{i=0}^{n} x_i^2"
        );
    }
}
