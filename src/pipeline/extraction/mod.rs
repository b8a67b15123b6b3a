pub mod types;
pub mod preprocess;
pub mod pdf;
#[cfg(feature = "pdfium")]
pub mod pdfium;
pub mod ocr;
pub mod orchestrator;

pub use types::*;
pub use preprocess::*;
pub use pdf::*;
pub use ocr::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tesseract OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("PDF parsing failed: {0}")]
    PdfParsing(String),

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Unsupported format for extraction: {0}")]
    UnsupportedFormat(String),
}

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The PDF or image could not be opened, parsed or rendered.
    Decode,
    /// The recognizer failed to start or to run.
    Ocr,
    Io,
    Unsupported,
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::OcrInit(_) | Self::OcrProcessing(_) => ErrorKind::Ocr,
            Self::PdfParsing(_) | Self::PdfRendering { .. } | Self::ImageProcessing(_) => {
                ErrorKind::Decode
            }
            Self::UnsupportedFormat(_) => ErrorKind::Unsupported,
        }
    }

    /// Stable machine-readable code for logs and CLI output.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "EXTRACT_IO",
            Self::OcrInit(_) => "OCR_INIT",
            Self::OcrProcessing(_) => "OCR_FAILED",
            Self::PdfParsing(_) => "PDF_PARSE",
            Self::PdfRendering { .. } => "PDF_RENDER",
            Self::ImageProcessing(_) => "IMAGE_DECODE",
            Self::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
        }
    }

    pub fn is_ocr_failure(&self) -> bool {
        self.kind() == ErrorKind::Ocr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_group_variants() {
        assert_eq!(ExtractionError::OcrInit("x".into()).kind(), ErrorKind::Ocr);
        assert_eq!(
            ExtractionError::PdfRendering { page: 2, reason: "x".into() }.kind(),
            ErrorKind::Decode
        );
        assert_eq!(
            ExtractionError::UnsupportedFormat("gif".into()).kind(),
            ErrorKind::Unsupported
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(ExtractionError::from(io).kind(), ErrorKind::Io);
    }

    #[test]
    fn error_codes_are_distinct() {
        let errors = [
            ExtractionError::OcrInit("x".into()),
            ExtractionError::OcrProcessing("x".into()),
            ExtractionError::PdfParsing("x".into()),
            ExtractionError::PdfRendering { page: 0, reason: "x".into() },
            ExtractionError::ImageProcessing("x".into()),
            ExtractionError::UnsupportedFormat("x".into()),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.error_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn rendering_error_mentions_page() {
        let err = ExtractionError::PdfRendering { page: 3, reason: "bad xref".into() };
        assert_eq!(err.to_string(), "PDF rendering failed on page 3: bad xref");
    }
}
