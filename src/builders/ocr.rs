//! OCR build: recognize text for lines the digital layer did not cover.
//!
//! Only `Line` blocks with empty text are sent to the engine — on a digital
//! page that is typically none, so the OCR engine is never touched. An
//! engine error is fatal (a half-recognized document is worse than a failed
//! conversion); an empty recognition result is not, the line just stays
//! empty.

use crate::detect::{Artifacts, OcrEngine};
use crate::document::{BlockType, Document};
use crate::error::TreemarkError;
use crate::provider::crop_region;
use image::DynamicImage;
use std::sync::Arc;
use tracing::debug;

/// Padding in points around a line crop, so tight boxes keep ascenders and
/// descenders.
const LINE_CROP_PADDING: f32 = 1.5;

pub struct OcrBuilder {
    ocr: Arc<dyn OcrEngine>,
}

impl OcrBuilder {
    pub fn new(artifacts: &Artifacts) -> Self {
        Self {
            ocr: Arc::clone(&artifacts.ocr),
        }
    }

    pub async fn build(&self, document: &mut Document) -> Result<(), TreemarkError> {
        let candidates = document.find_blocks(|b| {
            b.block_type == BlockType::Line && b.text.as_deref().unwrap_or("").is_empty()
        });
        if candidates.is_empty() {
            return Ok(());
        }

        // Crop everything first (immutable pass), then recognize and write
        // back one line at a time.
        let mut tasks: Vec<(crate::document::BlockRef, DynamicImage)> = Vec::new();
        for r in candidates {
            let page = &document.pages[r.page];
            let Some(ref image) = page.image else { continue };
            let block = document
                .block(&r)
                .ok_or_else(|| TreemarkError::Internal("stale block ref in ocr".into()))?;
            tasks.push((
                r.clone(),
                crop_region(image, &page.bbox, &block.bbox, LINE_CROP_PADDING),
            ));
        }

        debug!("ocr: recognizing {} line(s)", tasks.len());
        for (r, crop) in tasks {
            let text = self.ocr.recognize(&crop).await?;
            if !text.is_empty() {
                if let Some(block) = document.block_mut(&r) {
                    block.text = Some(text);
                }
            }
        }
        Ok(())
    }
}
