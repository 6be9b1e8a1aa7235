//! CLI binary for treemark.
//!
//! A thin shim over the library crate: maps flags to `ConverterConfig`,
//! wires the converter, prints or writes the result.
//!
//! The binary carries no detection models. It runs with text-layer-only
//! fallbacks (every digital text line survives; no layout labels), which is
//! enough for clean single-column documents and for exercising the LLM
//! passes. Model-backed detection plugs in through the library API
//! (`treemark::Artifacts`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use treemark::{
    Artifacts, ConverterConfig, ConverterOptions, OutputFormat, PageRange, PdfConverter,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "treemark",
    version,
    about = "Convert a PDF into structured Markdown, HTML, JSON, or chunks"
)]
struct Args {
    /// Input PDF path.
    input: PathBuf,

    /// Output file; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value = "markdown")]
    format: Format,

    /// Enable LLM-backed correction passes.
    #[arg(long)]
    use_llm: bool,

    /// LLM service name (ollama, openai).
    #[arg(long)]
    llm_service: Option<String>,

    /// LLM backend base URL, no trailing slash.
    #[arg(long, env = "TREEMARK_LLM_BASE_URL")]
    base_url: Option<String>,

    /// LLM model name.
    #[arg(long, env = "TREEMARK_LLM_MODEL")]
    model: Option<String>,

    /// Pages to convert, zero-based, e.g. "0-4,7".
    #[arg(long)]
    page_range: Option<String>,

    /// Insert page separators into markdown/html output.
    #[arg(long)]
    paginate: bool,

    /// PDF password.
    #[arg(long)]
    password: Option<String>,

    /// Flat JSON config file; flags override its values.
    #[arg(long)]
    json_config: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum Format {
    Markdown,
    Html,
    Json,
    Chunked,
}

impl From<Format> for OutputFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Markdown => OutputFormat::Markdown,
            Format::Html => OutputFormat::Html,
            Format::Json => OutputFormat::Json,
            Format::Chunked => OutputFormat::Chunked,
        }
    }
}

/// No-model layout: no boxes, so every text line flows through the line
/// builder's fallback path.
struct TextLayerLayout;

#[async_trait]
impl treemark::LayoutDetector for TextLayerLayout {
    async fn detect(
        &self,
        _page: &image::DynamicImage,
        _hints: &treemark::DetectorHints,
    ) -> Result<Vec<treemark::LayoutBox>, treemark::TreemarkError> {
        Ok(Vec::new())
    }
}

/// No-model OCR: scanned lines stay empty rather than hallucinated.
struct NoOcr;

#[async_trait]
impl treemark::OcrEngine for NoOcr {
    async fn recognize(
        &self,
        _region: &image::DynamicImage,
    ) -> Result<String, treemark::TreemarkError> {
        Ok(String::new())
    }
}

fn build_config(args: &Args) -> Result<ConverterConfig> {
    let mut config = match &args.json_config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let value: serde_json::Value =
                serde_json::from_str(&raw).with_context(|| "parsing config JSON")?;
            ConverterConfig::from_value(value)?
        }
        None => ConverterConfig::default(),
    };

    config.use_llm |= args.use_llm;
    config.output_format = args.format.into();
    config.paginate_output |= args.paginate;
    if let Some(ref url) = args.base_url {
        config.llm_base_url = url.clone();
    }
    if let Some(ref model) = args.model {
        config.llm_model = model.clone();
    }
    if let Some(ref range) = args.page_range {
        config.page_range = Some(PageRange::parse(range)?);
    }
    if let Some(ref pwd) = args.password {
        config.password = Some(pwd.clone());
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = build_config(&args)?;

    let artifacts = Artifacts {
        layout: Arc::new(TextLayerLayout),
        ocr: Arc::new(NoOcr),
    };
    let options = ConverterOptions {
        llm_service: args.llm_service.clone(),
        ..Default::default()
    };

    let mut converter = PdfConverter::new(artifacts, options, config)?;
    let output = converter
        .convert(args.input.as_path().into())
        .await
        .with_context(|| format!("converting {}", args.input.display()))?;

    let pages = converter.page_count().unwrap_or(0);
    let text = output.into_text();

    match &args.output {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!("wrote {} ({} pages)", path.display(), pages);
        }
        None => print!("{text}"),
    }
    Ok(())
}
