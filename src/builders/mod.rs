//! Builders: provider output → initial document tree.
//!
//! Three stages run in a fixed order, each consuming the previous stage's
//! result in place:
//!
//! 1. [`layout`] — page rasters through the layout detector; typed top-level
//!    blocks per page.
//! 2. [`line`] — digital text lines assigned into layout blocks by geometric
//!    containment.
//! 3. [`ocr`] — lines without text recognized from their region crops.
//!
//! A fourth pass, [`structure`], finalises tree topology (list grouping,
//! caption attachment, TOC seeding) and runs after the three build stages
//! but before any processor. Builders have no retry semantics: a failing
//! detector or OCR engine fails the conversion.

pub mod layout;
pub mod line;
pub mod ocr;
pub mod structure;

pub use layout::LayoutBuilder;
pub use line::LineBuilder;
pub use ocr::OcrBuilder;
pub use structure::StructureBuilder;

use crate::config::ConverterConfig;
use crate::detect::Artifacts;
use crate::document::Document;
use crate::error::TreemarkError;
use crate::provider::PageProvider;

/// Runs the three build stages in order against one provider.
pub struct DocumentBuilder<'a> {
    artifacts: &'a Artifacts,
    config: &'a ConverterConfig,
}

impl<'a> DocumentBuilder<'a> {
    pub fn new(artifacts: &'a Artifacts, config: &'a ConverterConfig) -> Self {
        Self { artifacts, config }
    }

    pub async fn build(&self, provider: &dyn PageProvider) -> Result<Document, TreemarkError> {
        let mut document = LayoutBuilder::new(self.artifacts, self.config)
            .build(provider)
            .await?;
        LineBuilder::new().build(provider, &mut document)?;
        OcrBuilder::new(self.artifacts).build(&mut document).await?;
        Ok(document)
    }
}
