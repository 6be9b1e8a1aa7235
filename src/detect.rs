//! Detector boundary: layout and OCR models as black-box collaborators.
//!
//! The models themselves live outside this crate — callers hand in
//! implementations of [`LayoutDetector`] and [`OcrEngine`] through
//! [`Artifacts`] when constructing a converter. The crate defines only the
//! contract: boxes and text per page, no retry semantics, errors fatal to
//! the conversion.
//!
//! Both handles are `Arc`-shared so several converters can run in parallel
//! against one loaded model; implementations are expected to be read-only
//! after initialization.

use crate::config::ConverterConfig;
use crate::document::{BBox, BlockType};
use crate::services::LlmService;
use async_trait::async_trait;
use image::DynamicImage;
use std::sync::Arc;

/// One detected layout region, in pixel coordinates of the raster that was
/// handed to [`LayoutDetector::detect`]. The layout builder converts to
/// page points.
#[derive(Debug, Clone)]
pub struct LayoutBox {
    pub bbox: BBox,
    /// Model-specific label, mapped through [`block_type_for_label`].
    pub label: String,
    pub confidence: f32,
}

/// Opaque tuning hints passed through from the configuration surface.
/// The core does not interpret them.
#[derive(Debug, Clone, Default)]
pub struct DetectorHints {
    pub batch_size: Option<usize>,
    pub device: Option<String>,
}

impl DetectorHints {
    pub fn from_config(config: &ConverterConfig) -> Self {
        Self {
            batch_size: config.detector_batch_size,
            device: config.detector_device.clone(),
        }
    }
}

/// Layout detection over a page raster.
#[async_trait]
pub trait LayoutDetector: Send + Sync {
    async fn detect(
        &self,
        page: &DynamicImage,
        hints: &DetectorHints,
    ) -> Result<Vec<LayoutBox>, crate::error::TreemarkError>;
}

/// Text recognition over a region crop.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(
        &self,
        region: &DynamicImage,
    ) -> Result<String, crate::error::TreemarkError>;
}

/// The heavyweight shared resources a conversion is constructed around.
///
/// Built once by the caller (model loading is theirs), then shared across
/// converter instances. The orchestrator adds the conversion-scoped LLM
/// service on top of this at construction time — see
/// [`crate::converter::PdfConverter`].
#[derive(Clone)]
pub struct Artifacts {
    pub layout: Arc<dyn LayoutDetector>,
    pub ocr: Arc<dyn OcrEngine>,
}

/// The pipeline-facing construction context: shared artifacts plus the
/// conversion-scoped LLM service (None when `use_llm` is off) and the
/// immutable config. Every processor factory takes this and reads only the
/// fields it needs.
pub struct PipelineContext {
    pub artifacts: Artifacts,
    pub llm: Option<Arc<LlmService>>,
    pub config: ConverterConfig,
}

/// Map a detector label to a block type.
///
/// Labels are matched case-insensitively with spaces and underscores
/// normalised to hyphens, so "Section header", "section_header" and
/// "section-header" all resolve. Unmapped labels become
/// [`BlockType::Unknown`] — a later processor either retypes them or the
/// renderer falls back to raw text.
pub fn block_type_for_label(label: &str) -> BlockType {
    let normalised = label
        .trim()
        .to_ascii_lowercase()
        .replace([' ', '_'], "-");
    match normalised.as_str() {
        "text" | "plain-text" | "paragraph" => BlockType::Text,
        "text-inline-math" | "inline-math" => BlockType::TextInlineMath,
        "title" | "section-header" | "heading" => BlockType::SectionHeader,
        "page-header" | "header" => BlockType::PageHeader,
        "page-footer" | "footer" => BlockType::PageFooter,
        "footnote" => BlockType::Footnote,
        "formula" | "equation" | "isolate-formula" => BlockType::Equation,
        "code" | "code-block" => BlockType::Code,
        "blockquote" | "quote" => BlockType::Blockquote,
        "list" | "list-group" => BlockType::ListGroup,
        "list-item" => BlockType::ListItem,
        "table" => BlockType::Table,
        "table-of-contents" | "toc" => BlockType::TableOfContents,
        "form" => BlockType::Form,
        "figure" => BlockType::Figure,
        "picture" | "image" | "photo" => BlockType::Picture,
        "caption" | "figure-caption" | "table-caption" => BlockType::Caption,
        "handwriting" | "handwritten" => BlockType::Handwriting,
        "reference" | "bibliography" => BlockType::Reference,
        "complex" | "complex-region" => BlockType::ComplexRegion,
        _ => BlockType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_normalise_case_and_separators() {
        assert_eq!(block_type_for_label("Table"), BlockType::Table);
        assert_eq!(
            block_type_for_label("Section header"),
            BlockType::SectionHeader
        );
        assert_eq!(
            block_type_for_label("figure_caption"),
            BlockType::Caption
        );
    }

    #[test]
    fn unmapped_labels_fall_back_to_unknown() {
        assert_eq!(block_type_for_label("wingding"), BlockType::Unknown);
        assert_eq!(block_type_for_label(""), BlockType::Unknown);
    }
}
