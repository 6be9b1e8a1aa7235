//! Layout build: rasterise each selected page and turn detector boxes into
//! typed top-level blocks.

use crate::config::ConverterConfig;
use crate::detect::{block_type_for_label, Artifacts, DetectorHints, LayoutDetector};
use crate::document::{BBox, Block, Document, Page};
use crate::error::TreemarkError;
use crate::provider::PageProvider;
use std::sync::Arc;
use tracing::debug;

pub struct LayoutBuilder {
    layout: Arc<dyn LayoutDetector>,
    hints: DetectorHints,
    dpi: u32,
    page_range: Option<crate::config::PageRange>,
}

impl LayoutBuilder {
    pub fn new(artifacts: &Artifacts, config: &ConverterConfig) -> Self {
        Self {
            layout: Arc::clone(&artifacts.layout),
            hints: DetectorHints::from_config(config),
            dpi: config.dpi,
            page_range: config.page_range.clone(),
        }
    }

    pub async fn build(&self, provider: &dyn PageProvider) -> Result<Document, TreemarkError> {
        let total = provider.page_count();
        let indices: Vec<usize> = match &self.page_range {
            Some(range) => range.to_indices(total),
            None => (0..total).collect(),
        };
        if indices.is_empty() {
            return Err(TreemarkError::Input(format!(
                "page range selects no pages (document has {total})"
            )));
        }

        let mut document = Document::new(provider.source());

        for idx in indices {
            let bbox = provider.page_bbox(idx)?;
            let image = provider.page_image(idx, self.dpi).await?;
            let boxes = self.layout.detect(&image, &self.hints).await?;

            // Detector boxes are in raster pixels; convert to page points.
            let scale = if bbox.width() > 0.0 {
                image.width() as f32 / bbox.width()
            } else {
                1.0
            };

            let mut page = Page::new(idx, bbox);
            // No digital text layer means detector output order is layout
            // order, not reading order; flag for the ordering processor.
            page.needs_reorder = provider.page_lines(idx)?.is_empty();

            for lb in boxes {
                let block_bbox = BBox::new(
                    lb.bbox.x0 / scale,
                    lb.bbox.y0 / scale,
                    lb.bbox.x1 / scale,
                    lb.bbox.y1 / scale,
                );
                page.blocks
                    .push(Block::new(block_type_for_label(&lb.label), block_bbox));
            }

            debug!(
                "layout: page {idx} → {} blocks ({})",
                page.blocks.len(),
                if page.needs_reorder { "scanned" } else { "digital" }
            );
            page.image = Some(image);
            document.pages.push(page);
        }

        Ok(document)
    }
}
