//! PDF rasterisation: render the first page to a `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is CPU-bound while rendering. `spawn_blocking` moves the work
//! off the Tokio worker threads so other analyses keep making progress.
//!
//! ## Binding
//!
//! `PDFIUM_LIB_PATH` names an explicit library file. Otherwise a library
//! next to the working directory is tried, then the system library.

use crate::error::ServiceError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Converts a PDF into a single preview image of its first page.
#[async_trait]
pub trait PdfRasterizer: Send + Sync {
    /// Render page one of `pdf`. `Ok(None)` means the document has no pages.
    async fn first_page(&self, pdf: &[u8]) -> Result<Option<DynamicImage>, ServiceError>;
}

/// [`PdfRasterizer`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    max_pixels: u32,
}

impl PdfiumRasterizer {
    /// `max_pixels` caps the rendered width and height.
    pub fn new(max_pixels: u32) -> Self {
        Self { max_pixels }
    }
}

#[async_trait]
impl PdfRasterizer for PdfiumRasterizer {
    async fn first_page(&self, pdf: &[u8]) -> Result<Option<DynamicImage>, ServiceError> {
        let bytes = pdf.to_vec();
        let max_pixels = self.max_pixels;

        tokio::task::spawn_blocking(move || render_first_page_blocking(&bytes, max_pixels))
            .await
            .map_err(|e| ServiceError::Backend(format!("render task panicked: {e}")))?
    }
}

fn bind_pdfium() -> Result<Pdfium, ServiceError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ServiceError::Backend(format!("failed to bind to pdfium library: {e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// Blocking implementation of first-page rendering.
fn render_first_page_blocking(
    pdf: &[u8],
    max_pixels: u32,
) -> Result<Option<DynamicImage>, ServiceError> {
    if pdf.len() < 4 || &pdf[..4] != b"%PDF" {
        return Err(ServiceError::Backend("file is not a PDF".into()));
    }

    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(pdf, None)
        .map_err(|e| ServiceError::Backend(format!("PDF is corrupt: {e:?}")))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());
    if pages.len() == 0 {
        return Ok(None);
    }

    let edge = i32::try_from(max_pixels).unwrap_or(i32::MAX);
    let render_config = PdfRenderConfig::new()
        .set_target_width(edge)
        .set_maximum_height(edge);

    let page = pages
        .get(0)
        .map_err(|e| ServiceError::Backend(format!("cannot open page 1: {e:?}")))?;
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| ServiceError::Backend(format!("rasterisation failed for page 1: {e:?}")))?;

    let image = bitmap.as_image();
    debug!("Rendered page 1 → {}x{} px", image.width(), image.height());
    Ok(Some(image))
}
