use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use super::ExtractionError;
use crate::models::SourceDocument;

/// Text and confidence recovered from one document, all pages aggregated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExtraction {
    pub text: String,
    /// In [0.0, 1.0].
    pub confidence: f32,
}

impl RawExtraction {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn empty() -> Self {
        Self::new(String::new(), 0.0)
    }

    /// Collapse recognizer output for one raster: fragments joined by single
    /// spaces, confidence averaged over detections.
    pub fn from_detections(detections: &[Detection]) -> Self {
        let text = detections
            .iter()
            .map(|d| d.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let confidences: Vec<f32> = detections.iter().map(|d| d.confidence).collect();
        Self::new(text.trim(), mean_confidence(&confidences))
    }

    /// Collapse per-page results: texts newline-joined in page order,
    /// confidence averaged over pages.
    pub fn from_pages(pages: &[RawExtraction]) -> Self {
        let text = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let confidences: Vec<f32> = pages.iter().map(|p| p.confidence).collect();
        Self::new(text.trim(), mean_confidence(&confidences))
    }
}

/// Arithmetic mean; 0.0 for no samples.
pub fn mean_confidence(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// Pixel rectangle a recognizer attributed a fragment to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One recognized fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub region: Option<BoundingBox>,
    pub text: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            region: None,
            text: text.into(),
            confidence,
        }
    }
}

/// OCR model abstraction (allows mocking for tests).
///
/// Implementations are shared between callers and must serialize access to
/// any backend that is not itself thread-safe.
pub trait TextRecognizer {
    fn recognize(&self, raster: &GrayImage) -> Result<Vec<Detection>, ExtractionError>;
}

/// A page handed out while a PDF document is open.
pub trait PdfPageView {
    /// The page's embedded text layer; empty for scanned pages.
    fn text(&self) -> Result<String, ExtractionError>;

    /// Rasterize the page at `scale` × its natural size.
    fn render(&self, scale: f32) -> Result<DynamicImage, ExtractionError>;
}

/// Primary PDF backend: opens a document and walks its pages in order.
pub trait PdfDocumentReader {
    /// Calls `visit` with each page index and view. Returns the page count.
    fn visit_pages(
        &self,
        pdf_bytes: &[u8],
        visit: &mut dyn FnMut(usize, &dyn PdfPageView) -> Result<(), ExtractionError>,
    ) -> Result<usize, ExtractionError>;
}

/// Fallback PDF backend: text layer only, one string per page.
pub trait PdfTextExtractor {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError>;
}

/// Main extraction trait
pub trait TextExtractor {
    fn extract(&self, document: &SourceDocument) -> Result<RawExtraction, ExtractionError>;
}
