//! Configuration types for document conversion.
//!
//! All conversion behaviour is controlled through [`ConverterConfig`], built
//! via its [`ConverterConfigBuilder`] or deserialized from a flat JSON
//! mapping with [`ConverterConfig::from_value`]. Keeping every knob in one
//! struct makes it trivial to share configs across threads, serialise them
//! for logging, and diff two runs to understand why their outputs differ.
//!
//! The flat-mapping intake mirrors how callers at the system boundary hand
//! options through: recognized keys are deserialized, unrecognized keys are
//! ignored rather than rejected.

use crate::error::TreemarkError;
use serde::{Deserialize, Serialize};

/// Configuration for a conversion.
///
/// Built via [`ConverterConfig::builder()`], [`ConverterConfig::default()`],
/// or [`ConverterConfig::from_value`].
///
/// # Example
/// ```rust
/// use treemark::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .use_llm(true)
///     .llm_base_url("http://localhost:11434")
///     .llm_model("qwen2.5vl:7b")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Gate for all LLM-backed processors and the LLM service itself.
    /// Default: false.
    pub use_llm: bool,

    // Per-processor LLM toggles. Inspected only when no explicit processor
    // list is supplied and `use_llm` is true; default true.
    pub enable_llm_table: bool,
    pub enable_llm_table_merge: bool,
    pub enable_llm_form: bool,
    pub enable_llm_complex_region: bool,
    pub enable_llm_image_description: bool,
    pub enable_llm_equation: bool,
    pub enable_llm_handwriting: bool,
    pub enable_llm_math_block: bool,
    pub enable_llm_section_header: bool,
    pub enable_llm_page_correction: bool,

    /// Output format when no explicit renderer name is given. Default: markdown.
    pub output_format: OutputFormat,

    /// Page selection, e.g. "0-4,7" (zero-based, inclusive ranges).
    /// None converts every page.
    pub page_range: Option<PageRange>,

    /// Insert page-break separators into markdown/html output. Default: false.
    pub paginate_output: bool,

    /// Rendering DPI used when rasterising pages for detection and for LLM
    /// region crops. Default: 150.
    ///
    /// 150 DPI keeps text sharp enough for vision models while image payloads
    /// stay small; raise it for small-font documents.
    pub dpi: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Base URL of the local-network LLM backend. No trailing slash.
    /// Default: "http://localhost:11434".
    pub llm_base_url: String,

    /// Model name passed to the LLM backend. Default: "qwen2.5vl:7b".
    pub llm_model: String,

    /// API key for cloud text backends (the local backend ignores it).
    pub llm_api_key: Option<String>,

    /// Maximum retry attempts after the first LLM call fails. Total attempts
    /// are `max_retries + 1`. Default: 3.
    pub max_retries: u32,

    /// Base wait in seconds for the linear backoff between LLM attempts:
    /// attempt N sleeps `N × retry_wait_secs`. Default: 2.
    pub retry_wait_secs: u64,

    /// Per-LLM-call timeout in seconds. Default: 30.
    pub llm_timeout_secs: u64,

    /// Block relabel rules applied by the block-relabel processor, each of
    /// the form "from:to" using block-type names (e.g. "picture:figure").
    pub block_relabel: Vec<String>,

    /// Emit per-page diagnostics from the debug processor. Default: false.
    pub debug: bool,

    /// Opaque batch-size hint handed to the layout detector. Not interpreted
    /// by the core.
    pub detector_batch_size: Option<usize>,

    /// Opaque device hint handed to the layout detector ("cpu", "cuda", …).
    /// Not interpreted by the core.
    pub detector_device: Option<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            use_llm: false,
            enable_llm_table: true,
            enable_llm_table_merge: true,
            enable_llm_form: true,
            enable_llm_complex_region: true,
            enable_llm_image_description: true,
            enable_llm_equation: true,
            enable_llm_handwriting: true,
            enable_llm_math_block: true,
            enable_llm_section_header: true,
            enable_llm_page_correction: true,
            output_format: OutputFormat::default(),
            page_range: None,
            paginate_output: false,
            dpi: 150,
            password: None,
            llm_base_url: "http://localhost:11434".to_string(),
            llm_model: "qwen2.5vl:7b".to_string(),
            llm_api_key: None,
            max_retries: 3,
            retry_wait_secs: 2,
            llm_timeout_secs: 30,
            block_relabel: Vec::new(),
            debug: false,
            detector_batch_size: None,
            detector_device: None,
        }
    }
}

impl ConverterConfig {
    /// Create a new builder.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }

    /// Deserialize from a flat JSON mapping.
    ///
    /// Recognized keys populate the corresponding fields; unrecognized keys
    /// are ignored. Anything that is not a JSON object is rejected.
    pub fn from_value(value: serde_json::Value) -> Result<Self, TreemarkError> {
        if !value.is_object() {
            return Err(TreemarkError::Configuration(format!(
                "config must be a JSON object, got {}",
                value
            )));
        }
        serde_json::from_value(value)
            .map_err(|e| TreemarkError::Configuration(format!("invalid config value: {e}")))
    }

    /// Validate cross-field constraints. Called by the builder and by the
    /// converter at construction time.
    pub fn validate(&self) -> Result<(), TreemarkError> {
        if self.dpi < 72 || self.dpi > 400 {
            return Err(TreemarkError::Configuration(format!(
                "dpi must be 72–400, got {}",
                self.dpi
            )));
        }
        if self.llm_base_url.ends_with('/') {
            return Err(TreemarkError::Configuration(
                "llm_base_url must not end with '/'".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn use_llm(mut self, v: bool) -> Self {
        self.config.use_llm = v;
        self
    }

    pub fn output_format(mut self, f: OutputFormat) -> Self {
        self.config.output_format = f;
        self
    }

    pub fn page_range(mut self, range: PageRange) -> Self {
        self.config.page_range = Some(range);
        self
    }

    pub fn paginate_output(mut self, v: bool) -> Self {
        self.config.paginate_output = v;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn llm_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.llm_base_url = url.into();
        self
    }

    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm_model = model.into();
        self
    }

    pub fn llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.llm_api_key = Some(key.into());
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_wait_secs(mut self, secs: u64) -> Self {
        self.config.retry_wait_secs = secs;
        self
    }

    pub fn llm_timeout_secs(mut self, secs: u64) -> Self {
        self.config.llm_timeout_secs = secs;
        self
    }

    pub fn block_relabel(mut self, rules: Vec<String>) -> Self {
        self.config.block_relabel = rules;
        self
    }

    pub fn debug(mut self, v: bool) -> Self {
        self.config.debug = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, TreemarkError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Output format produced by the default renderer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// GitHub-flavoured Markdown. (default)
    #[default]
    Markdown,
    /// Self-contained HTML fragment.
    Html,
    /// The serialized document tree.
    Json,
    /// One chunk per top-level block, for retrieval pipelines.
    Chunked,
}

impl OutputFormat {
    /// The registry name of the renderer implementing this format.
    pub fn renderer_name(self) -> &'static str {
        match self {
            OutputFormat::Markdown => "markdown",
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
            OutputFormat::Chunked => "chunked",
        }
    }
}

/// Which pages of the document to convert, zero-based.
///
/// Parses the textual form used at the configuration surface: comma-separated
/// page indices and inclusive ranges, e.g. `"0-4,7,10-12"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PageRange {
    spec: String,
}

impl PageRange {
    /// Parse a page-range spec, validating its shape up front.
    pub fn parse(spec: &str) -> Result<Self, TreemarkError> {
        for part in spec.split(',') {
            let part = part.trim();
            let ok = match part.split_once('-') {
                Some((a, b)) => {
                    a.trim().parse::<usize>().is_ok() && b.trim().parse::<usize>().is_ok()
                }
                None => part.parse::<usize>().is_ok(),
            };
            if !ok {
                return Err(TreemarkError::Configuration(format!(
                    "invalid page_range segment '{part}' in '{spec}'"
                )));
            }
        }
        Ok(Self { spec: spec.to_string() })
    }

    /// Expand into a sorted, deduplicated list of zero-based page indices,
    /// clamped to the document's page count.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = Vec::new();
        for part in self.spec.split(',') {
            let part = part.trim();
            match part.split_once('-') {
                Some((a, b)) => {
                    let start: usize = a.trim().parse().unwrap_or(0);
                    let end: usize = b.trim().parse().unwrap_or(0);
                    indices.extend(start..=end.min(total_pages.saturating_sub(1)));
                }
                None => {
                    if let Ok(p) = part.parse::<usize>() {
                        if p < total_pages {
                            indices.push(p);
                        }
                    }
                }
            }
        }
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

impl TryFrom<String> for PageRange {
    type Error = TreemarkError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        PageRange::parse(&s)
    }
}

impl From<PageRange> for String {
    fn from(r: PageRange) -> String {
        r.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_are_llm_off_with_toggles_on() {
        let c = ConverterConfig::default();
        assert!(!c.use_llm);
        assert!(c.enable_llm_table);
        assert!(c.enable_llm_page_correction);
        assert_eq!(c.output_format, OutputFormat::Markdown);
    }

    #[test]
    fn from_value_ignores_unrecognized_keys() {
        let c = ConverterConfig::from_value(json!({
            "use_llm": true,
            "enable_llm_table": false,
            "some_future_option": 42,
            "detector_batch_size": 8
        }))
        .unwrap();
        assert!(c.use_llm);
        assert!(!c.enable_llm_table);
        assert_eq!(c.detector_batch_size, Some(8));
    }

    #[test]
    fn from_value_rejects_non_object() {
        assert!(ConverterConfig::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn page_range_parse_and_expand() {
        let r = PageRange::parse("0-2,5,9-10").unwrap();
        assert_eq!(r.to_indices(8), vec![0, 1, 2, 5]);
        assert_eq!(r.to_indices(20), vec![0, 1, 2, 5, 9, 10]);
    }

    #[test]
    fn page_range_rejects_garbage() {
        assert!(PageRange::parse("1-x").is_err());
        assert!(PageRange::parse("").is_err());
    }

    #[test]
    fn builder_validates_base_url() {
        let err = ConverterConfig::builder()
            .llm_base_url("http://localhost:11434/")
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn page_range_round_trips_through_serde() {
        let c = ConverterConfig::from_value(json!({"page_range": "0-3"})).unwrap();
        assert_eq!(c.page_range.unwrap().to_indices(10), vec![0, 1, 2, 3]);
    }
}
