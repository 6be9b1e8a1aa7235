//! LLM-backed processors.
//!
//! Every processor here follows the same four-step protocol:
//!
//! 1. **Select** candidate blocks by a local, cheap rule ("table not fully
//!    parsed", "picture lacks alt text"). The deterministic passes already
//!    ran, so candidates are the residue rules could not handle — this is
//!    what keeps model calls few and targeted.
//! 2. **Build** one task per candidate: a prompt, zero or more region crops
//!    from the page raster, and a response schema.
//! 3. **Invoke** the shared [`LlmService`] per task.
//! 4. **Apply** the returned payload to the block if and only if it matches
//!    the expected shape and passes the processor's sanity checks; anything
//!    less leaves the block exactly as it was. No partial application.
//!
//! Two consequences of that protocol are load-bearing for the pipeline
//! contract: a processor with zero candidates leaves the serialized tree
//! byte-for-byte unchanged, and an exhausted LLM call is a per-block no-op,
//! never an error. Every processor is also constructible *without* a
//! service (`use_llm = false` keeps them in the default list); candidate
//! selection requires one, so a service-less processor selects nothing.

mod complex_region;
mod equation;
mod form;
mod handwriting;
mod image_description;
mod math_block;
mod page_correction;
mod section_header;
mod table;
mod table_merge;

pub use complex_region::LlmComplexRegionProcessor;
pub use equation::LlmEquationProcessor;
pub use form::LlmFormProcessor;
pub use handwriting::LlmHandwritingProcessor;
pub use image_description::LlmImageDescriptionProcessor;
pub use math_block::LlmMathBlockProcessor;
pub use page_correction::LlmPageCorrectionProcessor;
pub use section_header::LlmSectionHeaderProcessor;
pub use table::LlmTableProcessor;
pub use table_merge::LlmTableMergeProcessor;

use crate::document::{Block, BlockRef, Document};
use crate::provider::crop_region;
use crate::services::{LlmRequest, LlmService, ResponseSchema};
use image::DynamicImage;
use serde_json::{Map, Value};

/// Padding in points around a block's region crop.
const REGION_CROP_PADDING: f32 = 4.0;

/// One unit of LLM work: which block, what to ask, what shape to expect.
pub(crate) struct LlmTask {
    pub target: BlockRef,
    pub prompt: String,
    pub images: Vec<DynamicImage>,
    pub schema: ResponseSchema,
}

/// Crop the addressed block's region out of its page raster. None when the
/// page carries no raster (nothing was rendered for it).
pub(crate) fn region_image(document: &Document, r: &BlockRef) -> Option<DynamicImage> {
    let page = document.pages.get(r.page)?;
    let image = page.image.as_ref()?;
    let block = document.block(r)?;
    Some(crop_region(image, &page.bbox, &block.bbox, REGION_CROP_PADDING))
}

/// Drive a batch of tasks through the service, applying each successful
/// payload via `apply`. An empty payload (exhausted retries, guard skip) is
/// a no-op for that block — `apply` is never called with one.
pub(crate) async fn run_tasks(
    llm: &LlmService,
    document: &mut Document,
    tasks: Vec<LlmTask>,
    mut apply: impl FnMut(&mut Block, &Map<String, Value>),
) {
    for task in tasks {
        let Some(block) = document.block_mut(&task.target) else {
            continue;
        };
        let request = LlmRequest::new(task.prompt, task.schema).with_images(task.images);
        let payload = llm.invoke(request, Some(block)).await;
        if payload.is_empty() {
            continue;
        }
        if let Some(block) = document.block_mut(&task.target) {
            apply(block, &payload);
        }
    }
}

/// Shared conformance helper: a non-empty string under `key`.
pub(crate) fn string_field<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
