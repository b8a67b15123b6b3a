use super::types::{PdfDocumentReader, PdfPageView, PdfTextExtractor};
use super::ExtractionError;

/// Text-layer-only PDF reader using the pdf-extract crate.
/// Serves as the fallback when the primary reader cannot handle a document.
pub struct PdfExtractReader;

impl PdfTextExtractor for PdfExtractReader {
    fn extract_pages(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
        pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))
    }
}

/// Primary reader used when no PDFium library is available. Every document
/// is refused, which routes it straight to the fallback reader.
pub struct UnavailablePdfReader {
    reason: String,
}

impl UnavailablePdfReader {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl PdfDocumentReader for UnavailablePdfReader {
    fn visit_pages(
        &self,
        _pdf_bytes: &[u8],
        _visit: &mut dyn FnMut(usize, &dyn PdfPageView) -> Result<(), ExtractionError>,
    ) -> Result<usize, ExtractionError> {
        Err(ExtractionError::PdfParsing(self.reason.clone()))
    }
}
