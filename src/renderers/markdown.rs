//! Markdown rendering, the default output format.

use super::{BlockBehavior, OverrideMap, RenderedOutput, Renderer};
use crate::document::{Block, BlockType, Document};
use crate::error::TreemarkError;
use std::sync::Arc;

pub struct MarkdownRenderer {
    overrides: Arc<OverrideMap>,
    paginate: bool,
}

impl MarkdownRenderer {
    pub fn new(overrides: Arc<OverrideMap>, paginate: bool) -> Self {
        Self { overrides, paginate }
    }
}

impl Renderer for MarkdownRenderer {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn render(&self, document: &Document) -> Result<RenderedOutput, TreemarkError> {
        let mut parts: Vec<String> = Vec::new();

        for (i, page) in document.pages.iter().enumerate() {
            let mut page_parts: Vec<String> = Vec::new();
            for block in &page.blocks {
                if let Some(md) = block_markdown(block, &self.overrides) {
                    page_parts.push(md);
                }
            }
            if page_parts.is_empty() {
                continue;
            }
            if self.paginate && i > 0 {
                parts.push("---".to_string());
            }
            parts.push(page_parts.join("\n\n"));
        }

        let mut markdown = parts.join("\n\n");
        if !markdown.is_empty() {
            markdown.push('\n');
        }
        Ok(RenderedOutput::Markdown {
            markdown,
            page_count: document.pages.len(),
        })
    }
}

/// Render one block (children included) to Markdown. `None` means the block
/// contributes nothing — furniture, empty shells, structural leftovers.
///
/// Shared with the chunked renderer, which needs exactly this per-block
/// view.
pub(crate) fn block_markdown(
    block: &Block,
    overrides: &OverrideMap,
) -> Option<String> {
    if let Some(behavior) = overrides.get(&block.block_type) {
        if let Some(out) = behavior.markdown(block) {
            return Some(out);
        }
    }
    builtin_markdown(block, overrides)
}

fn builtin_markdown(block: &Block, overrides: &OverrideMap) -> Option<String> {
    let text = block.raw_text();
    let text = text.trim();

    let body = match block.block_type {
        BlockType::PageHeader | BlockType::PageFooter | BlockType::TableOfContents => None,
        BlockType::SectionHeader => {
            if text.is_empty() {
                None
            } else {
                let level = usize::from(block.heading_level.unwrap_or(2)).clamp(1, 6);
                Some(format!("{} {}", "#".repeat(level), text))
            }
        }
        BlockType::Code => {
            if text.is_empty() {
                None
            } else {
                let lang = block.language.as_deref().unwrap_or("");
                Some(format!("```{lang}\n{text}\n```"))
            }
        }
        BlockType::Equation => {
            if text.is_empty() {
                None
            } else {
                Some(format!("$${text}$$"))
            }
        }
        BlockType::Blockquote => {
            if text.is_empty() {
                None
            } else {
                Some(
                    text.lines()
                        .map(|l| format!("> {l}"))
                        .collect::<Vec<_>>()
                        .join("\n"),
                )
            }
        }
        BlockType::ListGroup => render_list(block, 0),
        BlockType::ListItem => {
            if text.is_empty() {
                None
            } else {
                Some(format!("- {text}"))
            }
        }
        BlockType::Table | BlockType::Form => {
            // The HTML grid carries structure Markdown pipes cannot (spans);
            // GFM-capable viewers render embedded tables fine.
            block
                .html
                .clone()
                .or_else(|| (!text.is_empty()).then(|| text.to_string()))
        }
        BlockType::Figure | BlockType::Picture => match block.alt_text.as_deref() {
            Some(alt) if !alt.is_empty() => Some(format!("<!-- image -->\n*{alt}*")),
            _ => Some("<!-- image -->".to_string()),
        },
        BlockType::Caption => {
            if text.is_empty() {
                None
            } else {
                Some(format!("*{text}*"))
            }
        }
        _ => {
            if text.is_empty() {
                None
            } else {
                Some(text.to_string())
            }
        }
    }?;

    // Captions attached to tables and figures render beneath them.
    let mut out = body;
    if matches!(
        block.block_type,
        BlockType::Table | BlockType::Figure | BlockType::Picture
    ) {
        for caption in block.children_of_type(BlockType::Caption) {
            if let Some(c) = block_markdown(caption, overrides) {
                out.push_str("\n\n");
                out.push_str(&c);
            }
        }
    }
    Some(out)
}

fn render_list(group: &Block, depth: usize) -> Option<String> {
    let ordered = group.ordered.unwrap_or(false);
    let indent = "  ".repeat(depth);
    let mut lines = Vec::new();
    let mut n = 0usize;

    for item in group.children_of_type(BlockType::ListItem) {
        let text = item.text.clone().unwrap_or_else(|| item.raw_text());
        let text = text.trim().to_string();
        if text.is_empty() {
            continue;
        }
        n += 1;
        let marker = if ordered {
            format!("{n}.")
        } else {
            "-".to_string()
        };
        lines.push(format!("{indent}{marker} {text}"));
        for sub in item.children_of_type(BlockType::ListItem) {
            let sub_text = sub.text.clone().unwrap_or_else(|| sub.raw_text());
            let sub_text = sub_text.trim().to_string();
            if !sub_text.is_empty() {
                lines.push(format!("{indent}  - {sub_text}"));
            }
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Convenience for custom behaviors that only wrap the default rendering.
pub struct RawTextBehavior;

impl BlockBehavior for RawTextBehavior {
    fn markdown(&self, block: &Block) -> Option<String> {
        let t = block.raw_text();
        let t = t.trim();
        (!t.is_empty()).then(|| t.to_string())
    }
}
