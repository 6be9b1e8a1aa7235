//! JSON rendering: the serialized tree itself is the output.

use super::{RenderedOutput, Renderer};
use crate::document::Document;
use crate::error::TreemarkError;

pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn render(&self, document: &Document) -> Result<RenderedOutput, TreemarkError> {
        let value = serde_json::to_value(document)
            .map_err(|e| TreemarkError::Render(format!("serializing document: {e}")))?;
        Ok(RenderedOutput::Json { document: value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BBox, Block, BlockType, Page};

    #[test]
    fn output_carries_typed_blocks() {
        let mut doc = Document::new("t.pdf");
        let mut page = Page::new(0, BBox::default());
        page.blocks
            .push(Block::new(BlockType::Table, BBox::default()));
        doc.pages.push(page);

        let RenderedOutput::Json { document } = JsonRenderer.render(&doc).unwrap() else {
            unreachable!()
        };
        assert_eq!(document["source"], "t.pdf");
        assert_eq!(document["pages"][0]["blocks"][0]["type"], "table");
    }
}
