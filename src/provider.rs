//! Page providers: the filesystem-facing boundary of a conversion.
//!
//! A [`PageProvider`] opens the source document and answers three questions
//! the builders ask: how many pages, what digital text does a page carry,
//! and what does a page look like as a raster. The pdfium-backed
//! implementation is the production one; tests implement the trait over
//! in-memory fixtures.
//!
//! ## Why page rasters come from the provider
//!
//! The layout detector and the LLM region crops both consume the same
//! raster, so it is rendered once per page at the configured DPI and cached
//! on the [`crate::document::Page`] during layout build.
//!
//! ## Why spawn_blocking
//!
//! pdfium wraps a C++ library with thread-local state that must not run on
//! async worker threads. Every pdfium touch happens inside
//! `tokio::task::spawn_blocking`, and each touch opens the document fresh —
//! the handle is not `Send`, so it cannot be held across await points.

use crate::document::BBox;
use crate::error::TreemarkError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One line of the digital text layer, in page coordinates (PDF points,
/// top-left origin).
#[derive(Debug, Clone)]
pub struct ProviderLine {
    pub bbox: BBox,
    pub text: String,
}

/// Source of pages for one conversion.
#[async_trait]
pub trait PageProvider: Send + Sync {
    /// Display name of the source (shown in `Document::source`).
    fn source(&self) -> &str;

    fn page_count(&self) -> usize;

    /// Page media box in PDF points, top-left origin.
    fn page_bbox(&self, index: usize) -> Result<BBox, TreemarkError>;

    /// Digital text lines for a page, reading order as stored. Empty for
    /// scanned pages — that emptiness is the signal the layout builder uses
    /// to flag a page for OCR and reordering.
    fn page_lines(&self, index: usize) -> Result<Vec<ProviderLine>, TreemarkError>;

    /// Rasterise a page at the given DPI.
    async fn page_image(&self, index: usize, dpi: u32) -> Result<DynamicImage, TreemarkError>;
}

// ── Pdfium-backed provider ───────────────────────────────────────────────

struct PageInfo {
    bbox: BBox,
    lines: Vec<ProviderLine>,
}

/// Production provider over pdfium.
///
/// The text layer and page geometry are scanned once at open time; rasters
/// are rendered on demand.
pub struct PdfiumProvider {
    path: PathBuf,
    password: Option<String>,
    source: String,
    pages: Vec<PageInfo>,
}

impl PdfiumProvider {
    /// Open a PDF, validating the magic bytes before handing the path to
    /// pdfium so a non-PDF yields a meaningful error instead of a parser
    /// crash.
    pub async fn open(
        path: impl AsRef<Path>,
        password: Option<String>,
    ) -> Result<Self, TreemarkError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(TreemarkError::FileNotFound { path });
        }
        {
            use std::io::Read;
            let mut f = std::fs::File::open(&path)
                .map_err(|_| TreemarkError::FileNotFound { path: path.clone() })?;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(TreemarkError::NotAPdf { path, magic });
            }
        }

        let scan_path = path.clone();
        let pwd = password.clone();
        let pages = tokio::task::spawn_blocking(move || scan_pages(&scan_path, pwd.as_deref()))
            .await
            .map_err(|e| TreemarkError::Internal(format!("scan task panicked: {e}")))??;

        info!("opened {} ({} pages)", path.display(), pages.len());
        Ok(Self {
            source: path.display().to_string(),
            path,
            password,
            pages,
        })
    }
}

#[async_trait]
impl PageProvider for PdfiumProvider {
    fn source(&self) -> &str {
        &self.source
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_bbox(&self, index: usize) -> Result<BBox, TreemarkError> {
        self.pages
            .get(index)
            .map(|p| p.bbox)
            .ok_or_else(|| TreemarkError::Internal(format!("page {index} out of range")))
    }

    fn page_lines(&self, index: usize) -> Result<Vec<ProviderLine>, TreemarkError> {
        self.pages
            .get(index)
            .map(|p| p.lines.clone())
            .ok_or_else(|| TreemarkError::Internal(format!("page {index} out of range")))
    }

    async fn page_image(&self, index: usize, dpi: u32) -> Result<DynamicImage, TreemarkError> {
        let path = self.path.clone();
        let password = self.password.clone();
        let width_pts = self.page_bbox(index)?.width();
        let target_width = (width_pts * dpi as f32 / 72.0).round() as i32;

        tokio::task::spawn_blocking(move || {
            render_page(&path, password.as_deref(), index, target_width)
        })
        .await
        .map_err(|e| TreemarkError::Internal(format!("render task panicked: {e}")))?
    }
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, TreemarkError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let err_str = format!("{e:?}");
        if err_str.to_lowercase().contains("password") {
            if password.is_some() {
                TreemarkError::WrongPassword {
                    path: path.to_path_buf(),
                }
            } else {
                TreemarkError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            }
        } else {
            TreemarkError::CorruptPdf {
                path: path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// One pass over the document collecting page geometry and the text layer.
fn scan_pages(path: &Path, password: Option<&str>) -> Result<Vec<PageInfo>, TreemarkError> {
    let pdfium = Pdfium::default();
    let document = open_document(&pdfium, path, password)?;

    let pages = document.pages();
    let mut infos = Vec::new();
    for page in pages.iter() {
        let width = page.width().value;
        let height = page.height().value;

        let mut lines = Vec::new();
        if let Ok(text) = page.text() {
            for segment in text.segments().iter() {
                let content = segment.text();
                let content = content.trim();
                if content.is_empty() {
                    continue;
                }
                let bounds = segment.bounds();
                // pdfium uses a bottom-left origin; flip to top-left.
                lines.push(ProviderLine {
                    bbox: BBox::new(
                        bounds.left().value,
                        height - bounds.top().value,
                        bounds.right().value,
                        height - bounds.bottom().value,
                    ),
                    text: content.to_string(),
                });
            }
        }

        debug!(
            "scanned page {} ({}x{} pts, {} text lines)",
            infos.len(),
            width,
            height,
            lines.len()
        );
        infos.push(PageInfo {
            bbox: BBox::new(0.0, 0.0, width, height),
            lines,
        });
    }
    Ok(infos)
}

fn render_page(
    path: &Path,
    password: Option<&str>,
    index: usize,
    target_width: i32,
) -> Result<DynamicImage, TreemarkError> {
    let pdfium = Pdfium::default();
    let document = open_document(&pdfium, path, password)?;

    let pages = document.pages();
    let page = pages
        .get(index as u16)
        .map_err(|e| TreemarkError::RasterisationFailed {
            page: index,
            detail: format!("{e:?}"),
        })?;

    let render_config = PdfRenderConfig::new().set_target_width(target_width);
    let bitmap =
        page.render_with_config(&render_config)
            .map_err(|e| TreemarkError::RasterisationFailed {
                page: index,
                detail: format!("{e:?}"),
            })?;

    Ok(bitmap.as_image())
}

// ── Region cropping ──────────────────────────────────────────────────────

/// Crop a block's region out of its page raster.
///
/// `page_bbox` is the page media box in points; the raster is assumed to
/// cover exactly that box. A small padding (in points) is applied on every
/// side so tight detector boxes do not clip descenders or rules.
pub fn crop_region(
    page_image: &DynamicImage,
    page_bbox: &BBox,
    region: &BBox,
    padding: f32,
) -> DynamicImage {
    let scale = if page_bbox.width() > 0.0 {
        page_image.width() as f32 / page_bbox.width()
    } else {
        1.0
    };

    let x0 = ((region.x0 - padding) * scale).max(0.0) as u32;
    let y0 = ((region.y0 - padding) * scale).max(0.0) as u32;
    let x1 = (((region.x1 + padding) * scale) as u32).min(page_image.width());
    let y1 = (((region.y1 + padding) * scale) as u32).min(page_image.height());

    let w = x1.saturating_sub(x0).max(1);
    let h = y1.saturating_sub(y0).max(1);
    page_image.crop_imm(x0, y0, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_region_maps_points_to_pixels() {
        // 100x200 pt page rendered at 2 px/pt.
        let img = DynamicImage::new_rgb8(200, 400);
        let page = BBox::new(0.0, 0.0, 100.0, 200.0);
        let region = BBox::new(10.0, 20.0, 60.0, 120.0);

        let crop = crop_region(&img, &page, &region, 0.0);
        assert_eq!(crop.width(), 100);
        assert_eq!(crop.height(), 200);
    }

    #[test]
    fn crop_region_clamps_to_raster_bounds() {
        let img = DynamicImage::new_rgb8(100, 100);
        let page = BBox::new(0.0, 0.0, 100.0, 100.0);
        let region = BBox::new(80.0, 80.0, 150.0, 150.0);

        let crop = crop_region(&img, &page, &region, 5.0);
        assert!(crop.width() <= 25);
        assert!(crop.height() <= 25);
    }

    #[test]
    fn crop_region_never_returns_zero_size() {
        let img = DynamicImage::new_rgb8(100, 100);
        let page = BBox::new(0.0, 0.0, 100.0, 100.0);
        let region = BBox::new(200.0, 200.0, 300.0, 300.0);

        let crop = crop_region(&img, &page, &region, 0.0);
        assert!(crop.width() >= 1 && crop.height() >= 1);
    }
}
