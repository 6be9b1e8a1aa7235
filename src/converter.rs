//! The pipeline orchestrator.
//!
//! [`PdfConverter`] assembles the full set of collaborators for a
//! conversion — LLM service, processor list, renderer — from the registries
//! and a configuration, then drives each input through builders →
//! processors → renderer.
//!
//! ## Construction discipline
//!
//! Everything is resolved once, up front, and frozen: symbolic names go
//! through the registries (unknown names fail here, not mid-conversion),
//! the LLM service is created once and shared by every processor that wants
//! one, and the override map is sealed into the renderer. `convert` can then
//! run with no name lookups and no service construction.
//!
//! ## Toggle policy
//!
//! When no explicit processor list is given, the default list is filtered
//! by the static toggle table: with `use_llm = true`, an LLM processor
//! whose toggle is off is *excluded from the list*. With `use_llm = false`
//! the toggles are not consulted — LLM processors stay in the list,
//! constructed without a service, and select zero candidates (exact
//! no-ops). An explicit list is always used verbatim.

use crate::builders::{DocumentBuilder, StructureBuilder};
use crate::config::ConverterConfig;
use crate::detect::{Artifacts, PipelineContext};
use crate::error::TreemarkError;
use crate::processors::Processor;
use crate::provider::{PageProvider, PdfiumProvider};
use crate::registry::{ProcessorRegistry, RendererRegistry, ServiceRegistry};
use crate::renderers::{OverrideMap, RenderedOutput, Renderer};
use crate::services::LlmService;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// The default processor list, in pipeline order. Structural normalization
/// precedes semantic labeling, deterministic passes precede their LLM
/// equivalents, LLM table/form passes precede generic text consolidation,
/// and cleanup/diagnostic passes run last against the fully enriched tree.
pub const DEFAULT_PROCESSORS: &[&str] = &[
    "order",
    "block-relabel",
    "line-merge",
    "blockquote",
    "code",
    "document-toc",
    "equation",
    "footnote",
    "ignore-text",
    "line-numbers",
    "list",
    "page-header",
    "section-header",
    "table",
    "llm-table",
    "llm-table-merge",
    "llm-form",
    "text",
    "llm-complex-region",
    "llm-image-description",
    "llm-equation",
    "llm-handwriting",
    "llm-math-block",
    "llm-section-header",
    "llm-page-correction",
    "reference",
    "blank-page",
    "debug",
];

/// Registry name of the service used when `use_llm` is on and no explicit
/// service was named.
pub const DEFAULT_LLM_SERVICE: &str = "ollama";

/// Static processor-name → toggle association. Declared as data so the
/// mapping is auditable in one place.
const LLM_PROCESSOR_TOGGLES: &[(&str, fn(&ConverterConfig) -> bool)] = &[
    ("llm-table", |c| c.enable_llm_table),
    ("llm-table-merge", |c| c.enable_llm_table_merge),
    ("llm-form", |c| c.enable_llm_form),
    ("llm-complex-region", |c| c.enable_llm_complex_region),
    ("llm-image-description", |c| c.enable_llm_image_description),
    ("llm-equation", |c| c.enable_llm_equation),
    ("llm-handwriting", |c| c.enable_llm_handwriting),
    ("llm-math-block", |c| c.enable_llm_math_block),
    ("llm-section-header", |c| c.enable_llm_section_header),
    ("llm-page-correction", |c| c.enable_llm_page_correction),
];

/// The default processor names after toggle filtering.
///
/// Exposed so callers (and tests) can inspect what a given configuration
/// resolves to without constructing a converter.
pub fn default_processor_names(config: &ConverterConfig) -> Vec<String> {
    DEFAULT_PROCESSORS
        .iter()
        .filter(|name| {
            if !config.use_llm {
                return true;
            }
            match LLM_PROCESSOR_TOGGLES.iter().find(|(n, _)| n == *name) {
                Some((_, toggle)) => toggle(config),
                None => true,
            }
        })
        .map(|s| s.to_string())
        .collect()
}

/// Construction-time options that cannot live in the serializable config:
/// explicit symbolic names and the behavior override map.
#[derive(Default)]
pub struct ConverterOptions {
    /// Explicit processor list, used verbatim when present (no toggle
    /// filtering).
    pub processors: Option<Vec<String>>,

    /// Explicit renderer name; defaults to the config's `output_format`.
    pub renderer: Option<String>,

    /// Explicit LLM service name; constructed even when `use_llm` is false.
    pub llm_service: Option<String>,

    /// Per-block-type rendering overrides, frozen at construction.
    pub overrides: OverrideMap,
}

/// Conversion input: a path on disk or an in-memory buffer.
pub enum ConvertInput<'a> {
    Path(&'a Path),
    Bytes(&'a [u8]),
}

impl<'a> From<&'a Path> for ConvertInput<'a> {
    fn from(p: &'a Path) -> Self {
        ConvertInput::Path(p)
    }
}

impl<'a> From<&'a [u8]> for ConvertInput<'a> {
    fn from(b: &'a [u8]) -> Self {
        ConvertInput::Bytes(b)
    }
}

/// Orchestrates one-or-more conversions with a frozen collaborator set.
pub struct PdfConverter {
    artifacts: Artifacts,
    config: ConverterConfig,
    llm: Option<Arc<LlmService>>,
    processors: Vec<Box<dyn Processor>>,
    renderer: Box<dyn Renderer>,
    page_count: Option<usize>,
}

impl PdfConverter {
    /// Resolve all collaborators. Fails fast on an unresolvable processor,
    /// renderer, or service name, or an invalid configuration.
    pub fn new(
        artifacts: Artifacts,
        options: ConverterOptions,
        config: ConverterConfig,
    ) -> Result<Self, TreemarkError> {
        config.validate()?;

        // One service per conversion; every processor that wants one sees
        // this instance through the pipeline context.
        let services = ServiceRegistry::builtin();
        let llm: Option<Arc<LlmService>> = match (&options.llm_service, config.use_llm) {
            (Some(name), _) => Some(services.resolve(name, &config)?),
            (None, true) => Some(services.resolve(DEFAULT_LLM_SERVICE, &config)?),
            (None, false) => None,
        };

        let ctx = PipelineContext {
            artifacts: artifacts.clone(),
            llm: llm.clone(),
            config: config.clone(),
        };

        let names = match options.processors {
            Some(explicit) => explicit,
            None => default_processor_names(&config),
        };
        let registry = ProcessorRegistry::builtin();
        let processors = names
            .iter()
            .map(|name| registry.resolve(name, &ctx))
            .collect::<Result<Vec<_>, _>>()?;

        let overrides = Arc::new(options.overrides);
        let renderer_name = options
            .renderer
            .unwrap_or_else(|| config.output_format.renderer_name().to_string());
        let renderer = RendererRegistry::builtin().resolve(&renderer_name, &config, &overrides)?;

        info!(
            processors = processors.len(),
            renderer = renderer.name(),
            llm = llm.as_ref().map(|s| s.backend_name()),
            "converter ready"
        );
        Ok(Self {
            artifacts,
            config,
            llm,
            processors,
            renderer,
            page_count: None,
        })
    }

    /// Names of the resolved processors, in pipeline order.
    pub fn processor_names(&self) -> Vec<&'static str> {
        self.processors.iter().map(|p| p.name()).collect()
    }

    /// Pages processed by the most recent `convert` call.
    pub fn page_count(&self) -> Option<usize> {
        self.page_count
    }

    /// The conversion-scoped LLM service, if one was constructed.
    pub fn llm_service(&self) -> Option<&Arc<LlmService>> {
        self.llm.as_ref()
    }

    /// Convert one input and render it.
    ///
    /// Byte input is materialized to a temporary file first — detection
    /// collaborators need a filesystem path — and the temp file is removed
    /// on every exit path, success or failure.
    pub async fn convert(
        &mut self,
        input: ConvertInput<'_>,
    ) -> Result<RenderedOutput, TreemarkError> {
        match input {
            ConvertInput::Path(path) => self.convert_path(path).await,
            ConvertInput::Bytes(bytes) => {
                if bytes.is_empty() {
                    return Err(TreemarkError::Input("empty byte buffer".into()));
                }
                let mut tmp = tempfile::NamedTempFile::new()
                    .map_err(|e| TreemarkError::Internal(format!("tempfile: {e}")))?;
                tmp.write_all(bytes)
                    .map_err(|e| TreemarkError::Internal(format!("tempfile write: {e}")))?;
                // `tmp` is dropped (and the file deleted) whichever way
                // `convert_path` returns.
                self.convert_path(tmp.path()).await
            }
        }
    }

    async fn convert_path(&mut self, path: &Path) -> Result<RenderedOutput, TreemarkError> {
        let provider = PdfiumProvider::open(path, self.config.password.clone()).await?;
        self.convert_with_provider(&provider).await
    }

    /// Drive a conversion against an already-open provider.
    ///
    /// The building block behind [`PdfConverter::convert`]; exposed for
    /// callers with their own page source.
    pub async fn convert_with_provider(
        &mut self,
        provider: &dyn PageProvider,
    ) -> Result<RenderedOutput, TreemarkError> {
        let mut document = DocumentBuilder::new(&self.artifacts, &self.config)
            .build(provider)
            .await?;
        StructureBuilder::new().build(&mut document)?;

        for processor in &self.processors {
            debug!("running processor '{}'", processor.name());
            processor.process(&mut document).await?;
        }

        self.page_count = Some(document.pages.len());
        self.renderer.render(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_list_keeps_everything_when_llm_off() {
        let config = ConverterConfig::default();
        let names = default_processor_names(&config);
        assert_eq!(names.len(), DEFAULT_PROCESSORS.len());
    }

    #[test]
    fn toggles_filter_only_when_llm_on() {
        let mut config = ConverterConfig::default();
        config.enable_llm_form = false;
        // use_llm off: toggle not consulted.
        assert_eq!(
            default_processor_names(&config).len(),
            DEFAULT_PROCESSORS.len()
        );

        config.use_llm = true;
        let names = default_processor_names(&config);
        assert_eq!(names.len(), DEFAULT_PROCESSORS.len() - 1);
        assert!(!names.iter().any(|n| n == "llm-form"));
        assert!(names.iter().any(|n| n == "llm-table"));
    }

    #[test]
    fn every_toggle_names_a_default_processor() {
        for (name, _) in LLM_PROCESSOR_TOGGLES {
            assert!(
                DEFAULT_PROCESSORS.contains(name),
                "toggle '{name}' has no default processor"
            );
        }
    }
}
