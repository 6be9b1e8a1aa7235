//! HTML fragment rendering.

use super::{OverrideMap, RenderedOutput, Renderer};
use crate::document::{Block, BlockType, Document};
use crate::error::TreemarkError;
use std::sync::Arc;

pub struct HtmlRenderer {
    overrides: Arc<OverrideMap>,
    paginate: bool,
}

impl HtmlRenderer {
    pub fn new(overrides: Arc<OverrideMap>, paginate: bool) -> Self {
        Self { overrides, paginate }
    }
}

impl Renderer for HtmlRenderer {
    fn name(&self) -> &'static str {
        "html"
    }

    fn render(&self, document: &Document) -> Result<RenderedOutput, TreemarkError> {
        let mut out = String::new();
        for (i, page) in document.pages.iter().enumerate() {
            let mut page_html = String::new();
            for block in &page.blocks {
                if let Some(h) = self.block_html(block) {
                    page_html.push_str(&h);
                    page_html.push('\n');
                }
            }
            if page_html.is_empty() {
                continue;
            }
            if self.paginate && i > 0 {
                out.push_str("<hr class=\"page-break\"/>\n");
            }
            out.push_str(&page_html);
        }
        Ok(RenderedOutput::Html {
            html: out,
            page_count: document.pages.len(),
        })
    }
}

impl HtmlRenderer {
    fn block_html(&self, block: &Block) -> Option<String> {
        if let Some(behavior) = self.overrides.get(&block.block_type) {
            if let Some(out) = behavior.html(block) {
                return Some(out);
            }
        }

        let text = block.raw_text();
        let text = text.trim();
        match block.block_type {
            BlockType::PageHeader | BlockType::PageFooter | BlockType::TableOfContents => None,
            BlockType::SectionHeader => {
                let level = usize::from(block.heading_level.unwrap_or(2)).clamp(1, 6);
                (!text.is_empty()).then(|| format!("<h{level}>{}</h{level}>", escape(text)))
            }
            BlockType::Code => (!text.is_empty())
                .then(|| format!("<pre><code>{}</code></pre>", escape(text))),
            BlockType::Equation => {
                (!text.is_empty()).then(|| format!("<math display=\"block\">{}</math>", escape(text)))
            }
            BlockType::Blockquote => {
                (!text.is_empty()).then(|| format!("<blockquote>{}</blockquote>", escape(text)))
            }
            BlockType::ListGroup => {
                let tag = if block.ordered.unwrap_or(false) { "ol" } else { "ul" };
                let items: String = block
                    .children_of_type(BlockType::ListItem)
                    .filter_map(|item| {
                        let t = item.raw_text();
                        let t = t.trim().to_string();
                        (!t.is_empty()).then(|| format!("<li>{}</li>", escape(&t)))
                    })
                    .collect();
                (!items.is_empty()).then(|| format!("<{tag}>{items}</{tag}>"))
            }
            // Grids are already HTML; pass through with captions attached.
            BlockType::Table | BlockType::Form => {
                let grid = block
                    .html
                    .clone()
                    .or_else(|| (!text.is_empty()).then(|| format!("<p>{}</p>", escape(text))))?;
                let captions: String = block
                    .children_of_type(BlockType::Caption)
                    .map(|c| format!("<figcaption>{}</figcaption>", escape(c.raw_text().trim())))
                    .collect();
                Some(if captions.is_empty() {
                    grid
                } else {
                    format!("<figure>{grid}{captions}</figure>")
                })
            }
            BlockType::Figure | BlockType::Picture => {
                let alt = block.alt_text.as_deref().unwrap_or("");
                Some(format!("<figure><img alt=\"{}\"/></figure>", escape(alt)))
            }
            BlockType::Caption => {
                (!text.is_empty()).then(|| format!("<figcaption>{}</figcaption>", escape(text)))
            }
            _ => (!text.is_empty()).then(|| format!("<p>{}</p>", escape(text))),
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BBox, Page};

    #[test]
    fn renders_headings_and_paragraphs() {
        let mut doc = Document::new("t");
        let mut page = Page::new(0, BBox::default());
        let mut h = Block::new(BlockType::SectionHeader, BBox::default()).with_text("A & B");
        h.heading_level = Some(1);
        page.blocks.push(h);
        page.blocks
            .push(Block::new(BlockType::Text, BBox::default()).with_text("body"));
        doc.pages.push(page);

        let r = HtmlRenderer::new(Arc::new(OverrideMap::new()), false);
        let RenderedOutput::Html { html, .. } = r.render(&doc).unwrap() else {
            unreachable!()
        };
        assert!(html.contains("<h1>A &amp; B</h1>"));
        assert!(html.contains("<p>body</p>"));
    }
}
