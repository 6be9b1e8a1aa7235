//! Error types for the treemark library.
//!
//! One fatal taxonomy, [`TreemarkError`], covers everything a conversion can
//! surface to the caller:
//!
//! * Construction-time failures (an unresolvable processor, renderer, or
//!   LLM-service name; an invalid configuration value).
//! * Call-time failures (unsupported input shape, unreadable file, a broken
//!   detection result, a processor error).
//!
//! LLM enrichment misses are deliberately *not* represented here: an LLM call
//! that exhausts its retries degrades to a per-block no-op inside
//! [`crate::services::LlmService`] and is observable through logging only.
//! The caller either gets a fully-formed rendering or an error — the crate
//! performs no in-between translation.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the treemark library.
#[derive(Debug, Error)]
pub enum TreemarkError {
    // ── Construction errors ───────────────────────────────────────────────
    /// A symbolic processor, renderer, or LLM-service name did not resolve,
    /// or a configuration value failed validation.
    #[error("configuration error: {0}")]
    Configuration(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Conversion input is not a supported shape (e.g. an empty byte buffer).
    #[error("unsupported input: {0}")]
    Input(String),

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("file is not a valid PDF: '{path}' (first bytes: {magic:?})")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Provider errors ───────────────────────────────────────────────────
    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The PDF could not be parsed by the provider.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// A page region could not be rasterised.
    #[error("rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Builder errors ────────────────────────────────────────────────────
    /// A detector or OCR collaborator failed while building the tree.
    /// Propagated unmodified — the core cannot recover a broken detection.
    #[error("builder stage '{stage}' failed: {detail}")]
    Builder { stage: &'static str, detail: String },

    // ── Processor errors ──────────────────────────────────────────────────
    /// A processor's own logic failed (not its LLM sub-calls, which degrade
    /// to per-block no-ops instead).
    #[error("processor '{name}' failed: {detail}")]
    Processor { name: &'static str, detail: String },

    // ── Render errors ─────────────────────────────────────────────────────
    /// The renderer could not produce output from the finished tree.
    #[error("rendering failed: {0}")]
    Render(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_display() {
        let e = TreemarkError::Configuration("unknown processor 'speling'".into());
        assert!(e.to_string().contains("speling"));
    }

    #[test]
    fn not_a_pdf_display_includes_path() {
        let e = TreemarkError::NotAPdf {
            path: PathBuf::from("/tmp/x.pdf"),
            magic: *b"PK\x03\x04",
        };
        let msg = e.to_string();
        assert!(msg.contains("/tmp/x.pdf"), "got: {msg}");
    }

    #[test]
    fn builder_display_names_stage() {
        let e = TreemarkError::Builder {
            stage: "layout",
            detail: "detector returned no boxes".into(),
        };
        assert!(e.to_string().contains("layout"));
    }
}
