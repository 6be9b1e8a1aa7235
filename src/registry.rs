//! Explicit registries: stable string keys to factory functions.
//!
//! Symbolic names arrive from the configuration surface ("give me these
//! processors, this renderer, that LLM service"). Resolution is a plain map
//! lookup validated at converter construction — an unknown key fails fast
//! with a configuration error, and the full key set is auditable right here
//! rather than scattered through dynamic lookups.

use crate::config::ConverterConfig;
use crate::detect::PipelineContext;
use crate::error::TreemarkError;
use crate::processors::llm::{
    LlmComplexRegionProcessor, LlmEquationProcessor, LlmFormProcessor, LlmHandwritingProcessor,
    LlmImageDescriptionProcessor, LlmMathBlockProcessor, LlmPageCorrectionProcessor,
    LlmSectionHeaderProcessor, LlmTableMergeProcessor, LlmTableProcessor,
};
use crate::processors::{
    BlankPageProcessor, BlockRelabelProcessor, BlockquoteProcessor, CodeProcessor, DebugProcessor,
    DocumentTocProcessor, EquationProcessor, FootnoteProcessor, IgnoreTextProcessor,
    LineMergeProcessor, LineNumbersProcessor, ListProcessor, OrderProcessor, PageHeaderProcessor,
    Processor, ReferenceProcessor, SectionHeaderProcessor, TableProcessor, TextProcessor,
};
use crate::renderers::{
    ChunkedRenderer, HtmlRenderer, JsonRenderer, MarkdownRenderer, OverrideMap, Renderer,
};
use crate::services::{LlmService, OllamaBackend, OpenAiBackend};
use std::collections::HashMap;
use std::sync::Arc;

// ── Processors ───────────────────────────────────────────────────────────

type ProcessorFactory = fn(&PipelineContext) -> Box<dyn Processor>;

pub struct ProcessorRegistry {
    entries: HashMap<&'static str, ProcessorFactory>,
}

impl ProcessorRegistry {
    pub fn builtin() -> Self {
        let mut entries: HashMap<&'static str, ProcessorFactory> = HashMap::new();
        entries.insert("order", |_| Box::new(OrderProcessor));
        entries.insert("block-relabel", |ctx| {
            Box::new(BlockRelabelProcessor::new(ctx.config.block_relabel.clone()))
        });
        entries.insert("line-merge", |_| Box::new(LineMergeProcessor));
        entries.insert("blockquote", |_| Box::new(BlockquoteProcessor));
        entries.insert("code", |_| Box::new(CodeProcessor));
        entries.insert("document-toc", |_| Box::new(DocumentTocProcessor));
        entries.insert("equation", |_| Box::new(EquationProcessor));
        entries.insert("footnote", |_| Box::new(FootnoteProcessor));
        entries.insert("ignore-text", |_| Box::new(IgnoreTextProcessor));
        entries.insert("line-numbers", |_| Box::new(LineNumbersProcessor));
        entries.insert("list", |_| Box::new(ListProcessor));
        entries.insert("page-header", |_| Box::new(PageHeaderProcessor));
        entries.insert("section-header", |_| Box::new(SectionHeaderProcessor));
        entries.insert("table", |_| Box::new(TableProcessor));
        entries.insert("llm-table", |ctx| {
            Box::new(LlmTableProcessor::new(ctx.llm.clone()))
        });
        entries.insert("llm-table-merge", |ctx| {
            Box::new(LlmTableMergeProcessor::new(ctx.llm.clone()))
        });
        entries.insert("llm-form", |ctx| Box::new(LlmFormProcessor::new(ctx.llm.clone())));
        entries.insert("text", |_| Box::new(TextProcessor));
        entries.insert("llm-complex-region", |ctx| {
            Box::new(LlmComplexRegionProcessor::new(ctx.llm.clone()))
        });
        entries.insert("llm-image-description", |ctx| {
            Box::new(LlmImageDescriptionProcessor::new(ctx.llm.clone()))
        });
        entries.insert("llm-equation", |ctx| {
            Box::new(LlmEquationProcessor::new(ctx.llm.clone()))
        });
        entries.insert("llm-handwriting", |ctx| {
            Box::new(LlmHandwritingProcessor::new(ctx.llm.clone()))
        });
        entries.insert("llm-math-block", |ctx| {
            Box::new(LlmMathBlockProcessor::new(ctx.llm.clone()))
        });
        entries.insert("llm-section-header", |ctx| {
            Box::new(LlmSectionHeaderProcessor::new(ctx.llm.clone()))
        });
        entries.insert("llm-page-correction", |ctx| {
            Box::new(LlmPageCorrectionProcessor::new(ctx.llm.clone()))
        });
        entries.insert("reference", |_| Box::new(ReferenceProcessor));
        entries.insert("blank-page", |_| Box::new(BlankPageProcessor));
        entries.insert("debug", |ctx| Box::new(DebugProcessor::new(ctx.config.debug)));
        Self { entries }
    }

    pub fn resolve(
        &self,
        name: &str,
        ctx: &PipelineContext,
    ) -> Result<Box<dyn Processor>, TreemarkError> {
        self.entries
            .get(name)
            .map(|factory| factory(ctx))
            .ok_or_else(|| TreemarkError::Configuration(format!("unknown processor '{name}'")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

// ── Renderers ────────────────────────────────────────────────────────────

type RendererFactory = fn(&ConverterConfig, &Arc<OverrideMap>) -> Box<dyn Renderer>;

pub struct RendererRegistry {
    entries: HashMap<&'static str, RendererFactory>,
}

impl RendererRegistry {
    pub fn builtin() -> Self {
        let mut entries: HashMap<&'static str, RendererFactory> = HashMap::new();
        entries.insert("markdown", |config, overrides| {
            Box::new(MarkdownRenderer::new(
                Arc::clone(overrides),
                config.paginate_output,
            ))
        });
        entries.insert("html", |config, overrides| {
            Box::new(HtmlRenderer::new(
                Arc::clone(overrides),
                config.paginate_output,
            ))
        });
        entries.insert("json", |_, _| Box::new(JsonRenderer));
        entries.insert("chunked", |_, overrides| {
            Box::new(ChunkedRenderer::new(Arc::clone(overrides)))
        });
        Self { entries }
    }

    pub fn resolve(
        &self,
        name: &str,
        config: &ConverterConfig,
        overrides: &Arc<OverrideMap>,
    ) -> Result<Box<dyn Renderer>, TreemarkError> {
        self.entries
            .get(name)
            .map(|factory| factory(config, overrides))
            .ok_or_else(|| TreemarkError::Configuration(format!("unknown renderer '{name}'")))
    }
}

// ── LLM services ─────────────────────────────────────────────────────────

type ServiceFactory = fn(&ConverterConfig) -> Result<Arc<LlmService>, TreemarkError>;

pub struct ServiceRegistry {
    entries: HashMap<&'static str, ServiceFactory>,
}

impl ServiceRegistry {
    pub fn builtin() -> Self {
        let mut entries: HashMap<&'static str, ServiceFactory> = HashMap::new();
        entries.insert("ollama", |config| {
            let backend = OllamaBackend::new(&config.llm_base_url, &config.llm_model)?;
            Ok(Arc::new(LlmService::new(Box::new(backend), config)))
        });
        entries.insert("openai", |config| {
            let api_key = config
                .llm_api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
            let backend = OpenAiBackend::new(&config.llm_base_url, &config.llm_model, api_key)?;
            Ok(Arc::new(LlmService::new(Box::new(backend), config)))
        });
        Self { entries }
    }

    pub fn resolve(
        &self,
        name: &str,
        config: &ConverterConfig,
    ) -> Result<Arc<LlmService>, TreemarkError> {
        self.entries
            .get(name)
            .ok_or_else(|| TreemarkError::Configuration(format!("unknown LLM service '{name}'")))
            .and_then(|factory| factory(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Artifacts;
    use async_trait::async_trait;

    struct NullDetector;

    #[async_trait]
    impl crate::detect::LayoutDetector for NullDetector {
        async fn detect(
            &self,
            _page: &image::DynamicImage,
            _hints: &crate::detect::DetectorHints,
        ) -> Result<Vec<crate::detect::LayoutBox>, TreemarkError> {
            Ok(Vec::new())
        }
    }

    struct NullOcr;

    #[async_trait]
    impl crate::detect::OcrEngine for NullOcr {
        async fn recognize(
            &self,
            _region: &image::DynamicImage,
        ) -> Result<String, TreemarkError> {
            Ok(String::new())
        }
    }

    fn ctx() -> PipelineContext {
        PipelineContext {
            artifacts: Artifacts {
                layout: Arc::new(NullDetector),
                ocr: Arc::new(NullOcr),
            },
            llm: None,
            config: ConverterConfig::default(),
        }
    }

    #[test]
    fn every_default_processor_resolves() {
        let registry = ProcessorRegistry::builtin();
        for name in crate::converter::DEFAULT_PROCESSORS {
            assert!(registry.contains(name), "missing factory for '{name}'");
            registry.resolve(name, &ctx()).unwrap();
        }
    }

    #[test]
    fn unknown_names_fail_with_configuration_error() {
        let registry = ProcessorRegistry::builtin();
        let err = registry.resolve("speling", &ctx()).err().unwrap();
        assert!(matches!(err, TreemarkError::Configuration(_)));

        let renderers = RendererRegistry::builtin();
        let overrides = Arc::new(OverrideMap::new());
        assert!(renderers
            .resolve("latex", &ConverterConfig::default(), &overrides)
            .is_err());

        let services = ServiceRegistry::builtin();
        assert!(services.resolve("claude", &ConverterConfig::default()).is_err());
    }

    #[test]
    fn builtin_services_construct() {
        let services = ServiceRegistry::builtin();
        let config = ConverterConfig::default();
        assert_eq!(
            services.resolve("ollama", &config).unwrap().backend_name(),
            "ollama"
        );
        assert_eq!(
            services.resolve("openai", &config).unwrap().backend_name(),
            "openai"
        );
    }
}
