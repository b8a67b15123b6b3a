//! Primary PDF reader backed by Google PDFium.
//!
//! Gives page-by-page access to the text layer and, for pages without one,
//! a rasterization at a caller-chosen scale.
//!
//! `PdfiumReader` is stateless (`Send + Sync`). Each operation creates
//! a fresh `Pdfium` instance because the upstream type is `!Send`.
//! The OS caches `dlopen`/`LoadLibrary` calls, so repeat loads are near-free.

use image::{DynamicImage, RgbaImage};
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::types::{PdfDocumentReader, PdfPageView};
use super::ExtractionError;

/// Maximum dimension (width or height) for rendered page images.
/// Prevents OOM on extremely large pages or absurd scale settings.
const MAX_DIMENSION_PX: u32 = 6000;

pub struct PdfiumReader;

impl PdfiumReader {
    /// Create a new reader, verifying the PDFium library is loadable.
    ///
    /// Discovery order:
    /// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path to library file)
    /// 2. Alongside the running executable
    /// 3. System library search paths
    pub fn new() -> Result<Self, ExtractionError> {
        let _ = load_pdfium()?;
        Ok(Self)
    }
}

fn load_pdfium() -> Result<Pdfium, ExtractionError> {
    let unavailable = |e: PdfiumError| ExtractionError::PdfParsing(format!(
        "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
    ));

    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path).map_err(unavailable)?;
        return Ok(Pdfium::new(bindings));
    }

    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
    {
        for dir in [exe_dir.clone(), exe_dir.join("lib")] {
            let lib_path =
                Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
            if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                debug!(dir = %dir.display(), "Loaded PDFium next to executable");
                return Ok(Pdfium::new(bindings));
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(unavailable)?;
    Ok(Pdfium::new(bindings))
}

/// Map PDF load errors, calling out encrypted documents.
fn map_load_error(e: PdfiumError) -> ExtractionError {
    let msg = e.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        ExtractionError::PdfParsing(format!("PDF is encrypted: {msg}"))
    } else {
        ExtractionError::PdfParsing(format!("Failed to load PDF: {msg}"))
    }
}

/// Pixel dimensions for rendering a page at `scale` pixels per point.
///
/// Returns (width_px, height_px), both clamped to [1, MAX_DIMENSION_PX].
/// Preserves aspect ratio when capping.
fn compute_render_dimensions(width_points: f32, height_points: f32, scale: f32) -> (u32, u32) {
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

/// Wrap PDFium's RGBA bitmap bytes as an image.
fn rgba_to_image(
    page: usize,
    width: u32,
    height: u32,
    bytes: Vec<u8>,
) -> Result<DynamicImage, ExtractionError> {
    let actual = bytes.len();
    RgbaImage::from_raw(width, height, bytes)
        .map(DynamicImage::ImageRgba8)
        .ok_or_else(|| ExtractionError::PdfRendering {
            page,
            reason: format!("Bitmap of {actual} bytes does not fit {width}x{height} RGBA"),
        })
}

struct PdfiumPage<'a> {
    index: usize,
    page: PdfPage<'a>,
}

impl PdfPageView for PdfiumPage<'_> {
    fn text(&self) -> Result<String, ExtractionError> {
        let text = self.page.text().map_err(|e| ExtractionError::PdfRendering {
            page: self.index,
            reason: format!("Text layer unreadable: {e}"),
        })?;
        Ok(text.all())
    }

    fn render(&self, scale: f32) -> Result<DynamicImage, ExtractionError> {
        let (target_w, target_h) =
            compute_render_dimensions(self.page.width().value, self.page.height().value, scale);

        let uncapped_w = (self.page.width().value * scale) as u32;
        if target_w < uncapped_w {
            warn!(
                page = self.index,
                raw_width = uncapped_w,
                capped_width = target_w,
                capped_height = target_h,
                "Page dimensions capped to {MAX_DIMENSION_PX}px",
            );
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = self
            .page
            .render_with_config(&config)
            .map_err(|e| ExtractionError::PdfRendering {
                page: self.index,
                reason: format!("Rendering failed: {e}"),
            })?;

        let width = bitmap.width() as u32;
        let height = bitmap.height() as u32;
        debug!(page = self.index, width, height, "Rendered PDF page");
        rgba_to_image(self.index, width, height, bitmap.as_rgba_bytes())
    }
}

impl PdfDocumentReader for PdfiumReader {
    fn visit_pages(
        &self,
        pdf_bytes: &[u8],
        visit: &mut dyn FnMut(usize, &dyn PdfPageView) -> Result<(), ExtractionError>,
    ) -> Result<usize, ExtractionError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;

        let mut count = 0;
        for (index, page) in document.pages().iter().enumerate() {
            visit(index, &PdfiumPage { index, page })?;
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Pure dimension logic tests (no PDFium needed) ──

    #[test]
    fn a4_at_double_scale() {
        let (w, h) = compute_render_dimensions(595.0, 842.0, 2.0);
        assert_eq!((w, h), (1190, 1684));
    }

    #[test]
    fn letter_at_double_scale() {
        let (w, h) = compute_render_dimensions(612.0, 792.0, 2.0);
        assert_eq!((w, h), (1224, 1584));
    }

    #[test]
    fn dimension_guard_caps_oversized() {
        let (w, h) = compute_render_dimensions(5000.0, 7000.0, 2.0);
        assert!(w <= MAX_DIMENSION_PX, "Width {w} exceeds {MAX_DIMENSION_PX}");
        assert!(h <= MAX_DIMENSION_PX, "Height {h} exceeds {MAX_DIMENSION_PX}");
    }

    #[test]
    fn dimension_guard_preserves_aspect_ratio() {
        let (w, h) = compute_render_dimensions(5000.0, 10000.0, 2.0);
        let ratio = h as f32 / w as f32;
        assert!((ratio - 2.0).abs() < 0.15, "Aspect ratio should be ~2:1, got {ratio}");
    }

    #[test]
    fn zero_points_clamped_to_1() {
        let (w, h) = compute_render_dimensions(0.0, 0.0, 2.0);
        assert!(w >= 1 && h >= 1);
    }

    #[test]
    fn rgba_bytes_become_image() {
        let image = rgba_to_image(0, 2, 3, vec![255; 2 * 3 * 4]).unwrap();
        assert_eq!((image.width(), image.height()), (2, 3));
    }

    #[test]
    fn short_bitmap_is_a_rendering_error() {
        let err = rgba_to_image(4, 10, 10, vec![0; 12]).unwrap_err();
        assert!(matches!(err, ExtractionError::PdfRendering { page: 4, .. }));
    }
}
