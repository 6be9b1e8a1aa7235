//! Join tables that continue across a page break.
//!
//! Candidates are pairs: a table ending one page and a table opening the
//! next, with compatible column counts. The model sees both extractions and
//! answers a single yes/no; on yes, the second table's rows and children
//! move into the first and the second is left as an empty shell the
//! renderers skip. Children are moved, never dropped.

use super::LlmTask;
use crate::document::{BlockRef, BlockType, Document};
use crate::error::TreemarkError;
use crate::processors::Processor;
use crate::services::{LlmRequest, LlmService, ResponseSchema};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

const PROMPT: &str = "Two tables were extracted from consecutive document pages. \
The first ends its page and the second opens the next page. \
Decide whether they are one logical table split by the page break. \
They belong together when the column structure matches and the second table \
has no header row of its own (or repeats the first's header). \
Answer with merge = \"true\" or \"false\".\n\n";

pub struct LlmTableMergeProcessor {
    llm: Option<Arc<LlmService>>,
}

impl LlmTableMergeProcessor {
    pub fn new(llm: Option<Arc<LlmService>>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Processor for LlmTableMergeProcessor {
    fn name(&self) -> &'static str {
        "llm-table-merge"
    }

    async fn process(&self, document: &mut Document) -> Result<(), TreemarkError> {
        let Some(ref llm) = self.llm else {
            return Ok(());
        };

        let mut tasks: Vec<(LlmTask, BlockRef)> = Vec::new();
        for window in candidate_pairs(document) {
            let (first, second) = window;
            let first_html = document.block(&first).and_then(|b| b.html.clone());
            let second_html = document.block(&second).and_then(|b| b.html.clone());
            let (Some(first_html), Some(second_html)) = (first_html, second_html) else {
                continue;
            };
            if column_count_of(&first_html) != column_count_of(&second_html) {
                continue;
            }
            tasks.push((
                LlmTask {
                    target: first,
                    prompt: format!(
                        "{PROMPT}First table:\n{first_html}\n\nSecond table:\n{second_html}"
                    ),
                    images: Vec::new(),
                    schema: ResponseSchema::object(&[("merge", json!({"type": "string"}))]),
                },
                second,
            ));
        }

        for (task, second_ref) in tasks {
            let Some(block) = document.block_mut(&task.target) else {
                continue;
            };
            let request = LlmRequest::new(task.prompt, task.schema);
            let payload = llm.invoke(request, Some(block)).await;
            let merge = payload
                .get("merge")
                .and_then(|v| v.as_str())
                .map(|s| s.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
            if !merge {
                continue;
            }
            merge_tables(document, &task.target, &second_ref);
            debug!("llm-table-merge: merged table across pages");
        }
        Ok(())
    }
}

/// Last table of each page paired with the first table of the next.
fn candidate_pairs(document: &Document) -> Vec<(BlockRef, BlockRef)> {
    let mut pairs = Vec::new();
    for pi in 0..document.pages.len().saturating_sub(1) {
        let last = document.pages[pi]
            .blocks
            .iter()
            .rposition(|b| b.block_type == BlockType::Table);
        let first = document.pages[pi + 1]
            .blocks
            .iter()
            .position(|b| b.block_type == BlockType::Table);
        if let (Some(l), Some(f)) = (last, first) {
            // Only when the table actually closes its page and opens the next.
            let closes = document.pages[pi].blocks[l + 1..]
                .iter()
                .all(|b| b.block_type.is_furniture());
            let opens = document.pages[pi + 1].blocks[..f]
                .iter()
                .all(|b| b.block_type.is_furniture());
            if closes && opens {
                pairs.push((
                    BlockRef { page: pi, path: vec![l] },
                    BlockRef { page: pi + 1, path: vec![f] },
                ));
            }
        }
    }
    pairs
}

fn column_count_of(html: &str) -> usize {
    let first_row = html.split("<tr>").nth(1).unwrap_or("");
    let row = first_row.split("</tr>").next().unwrap_or("");
    row.matches("<td").count() + row.matches("<th").count()
}

fn merge_tables(document: &mut Document, first: &BlockRef, second: &BlockRef) {
    // Take the second table's content out, then fold it into the first.
    let Some(second_block) = document.block_mut(second) else { return };
    let second_html = second_block.html.take().unwrap_or_default();
    let moved_children = std::mem::take(&mut second_block.children);
    second_block.text = None;

    let Some(first_block) = document.block_mut(first) else { return };
    if let Some(ref mut html) = first_block.html {
        let body = second_html
            .trim_start_matches("<table>")
            .trim_end_matches("</table>");
        *html = format!("{}{}</table>", html.trim_end_matches("</table>"), body);
    }
    first_block.children.extend(moved_children);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BBox, Block, Page};

    fn table_page(index: usize, html: &str) -> Page {
        let mut page = Page::new(index, BBox::new(0.0, 0.0, 612.0, 792.0));
        let mut table = Block::new(BlockType::Table, BBox::new(72.0, 72.0, 540.0, 700.0));
        table.html = Some(html.into());
        page.blocks.push(table);
        page
    }

    #[test]
    fn pairs_found_for_page_spanning_tables() {
        let mut doc = Document::new("t");
        doc.pages
            .push(table_page(0, "<table><tr><td>a</td><td>b</td></tr></table>"));
        doc.pages
            .push(table_page(1, "<table><tr><td>c</td><td>d</td></tr></table>"));
        assert_eq!(candidate_pairs(&doc).len(), 1);
    }

    #[test]
    fn column_count_reads_first_row() {
        assert_eq!(
            column_count_of("<table><tr><th>a</th><th>b</th></tr><tr><td>1</td></tr></table>"),
            2
        );
    }

    #[test]
    fn merge_moves_rows_and_children() {
        let mut doc = Document::new("t");
        doc.pages
            .push(table_page(0, "<table><tr><td>a</td></tr></table>"));
        doc.pages
            .push(table_page(1, "<table><tr><td>b</td></tr></table>"));
        doc.pages[1].blocks[0]
            .children
            .push(Block::new(BlockType::Line, BBox::default()).with_text("b"));

        let first = BlockRef { page: 0, path: vec![0] };
        let second = BlockRef { page: 1, path: vec![0] };
        merge_tables(&mut doc, &first, &second);

        let merged = doc.block(&first).unwrap();
        assert_eq!(
            merged.html.as_deref(),
            Some("<table><tr><td>a</td></tr><tr><td>b</td></tr></table>")
        );
        assert_eq!(merged.children.len(), 1);
        let shell = doc.block(&second).unwrap();
        assert!(shell.html.is_none());
        assert!(shell.children.is_empty());
    }
}
