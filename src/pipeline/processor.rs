//! Credential processing orchestrator.
//!
//! Single entry point that drives the pipeline for one document:
//! extract text → parse fields → assemble the record.
//!
//! Uses trait-based DI for the extraction engine so the orchestrator stays
//! testable with mock implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use crate::models::{CredentialFields, ExtractionResult, MediaKind, SourceDocument};
use crate::pipeline::extraction::{
    DocumentExtractor, ExtractionError, PdfDocumentReader, PdfExtractReader, TextExtractor,
    TextRecognizer, UnavailablePdfReader, UnavailableRecognizer,
};
use crate::pipeline::parsing::FieldParser;
use crate::pipeline_config::PipelineConfig;

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Orchestrates credential processing: extract → parse.
///
/// Errors from extraction propagate unchanged; there is no retry and no
/// partial result. Finding no fields is not an error.
pub struct CredentialProcessor {
    extractor: Box<dyn TextExtractor + Send + Sync>,
    parser: FieldParser,
}

impl CredentialProcessor {
    pub fn new(extractor: Box<dyn TextExtractor + Send + Sync>) -> Self {
        Self {
            extractor,
            parser: FieldParser::new(),
        }
    }

    /// Extract and parse one document.
    pub fn run(&self, document: &SourceDocument) -> Result<CredentialFields, ExtractionError> {
        let raw = self.extractor.extract(document)?;
        let fields = self.parser.parse_extraction(&raw);

        tracing::info!(
            document_id = %document.id,
            fields_found = fields.found_count(),
            confidence = fields.confidence_score,
            "Credential processing complete"
        );
        Ok(fields)
    }

    /// Extract and parse a file at `path` of the given kind.
    pub fn extract_credentials(
        &self,
        path: &Path,
        kind: MediaKind,
    ) -> Result<CredentialFields, ExtractionError> {
        self.run(&SourceDocument::new(path, kind))
    }

    /// Run the pipeline and stamp the result with the document identity and
    /// the current time.
    pub fn process(
        &self,
        document: &SourceDocument,
        original_filename: &str,
    ) -> Result<ExtractionResult, ExtractionError> {
        let extracted_data = self.run(document)?;
        Ok(ExtractionResult {
            document_id: document.id,
            original_filename: original_filename.to_string(),
            file_path: document.path.clone(),
            extracted_data,
            extracted_at: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build a `CredentialProcessor` with production implementations.
///
/// - OCR: `TesseractRecognizer` (feature-gated) or `UnavailableRecognizer`
/// - PDF: `PdfiumReader` (feature-gated) or `UnavailablePdfReader`, with
///   `PdfExtractReader` as the text-layer fallback
///
/// Returns an error only if Tesseract data was found but the engine failed
/// to load.
pub fn build_processor(config: &PipelineConfig) -> Result<CredentialProcessor, ExtractionError> {
    let recognizer = build_recognizer(config)?;
    let pdf_reader = build_pdf_reader();
    let extractor = DocumentExtractor::new(recognizer, pdf_reader, Box::new(PdfExtractReader))
        .with_config(config);

    tracing::info!(
        render_scale = config.render_scale,
        scratch_dir = %config.scratch_dir.display(),
        "Credential processor ready"
    );
    Ok(CredentialProcessor::new(Box::new(extractor)))
}

/// Build the OCR engine, respecting feature flags.
fn build_recognizer(
    config: &PipelineConfig,
) -> Result<Arc<dyn TextRecognizer + Send + Sync>, ExtractionError> {
    #[cfg(feature = "ocr")]
    {
        let tessdata = config
            .tessdata_dir
            .clone()
            .or_else(|| find_tessdata_dir(&config.ocr_language));
        if let Some(tessdata) = tessdata {
            let engine = crate::pipeline::extraction::TesseractRecognizer::new(
                Some(&tessdata),
                &config.ocr_language,
            )?;
            tracing::info!(tessdata = %tessdata.display(), "Tesseract OCR initialized");
            return Ok(Arc::new(engine));
        }
        tracing::warn!(
            language = %config.ocr_language,
            "Tesseract data not found, images and scanned pages will not be OCR'd"
        );
        Ok(Arc::new(UnavailableRecognizer::new(
            "Tesseract data directory not found. Set TESSDATA_PREFIX or install tesseract-ocr-eng",
        )))
    }

    #[cfg(not(feature = "ocr"))]
    {
        tracing::info!(
            language = %config.ocr_language,
            "Built without the ocr feature, image OCR unavailable"
        );
        Ok(Arc::new(UnavailableRecognizer::new(
            "OCR support not compiled in (enable the `ocr` feature)",
        )))
    }
}

/// Build the primary PDF reader. Without PDFium every PDF goes straight to
/// the text-layer fallback.
fn build_pdf_reader() -> Box<dyn PdfDocumentReader + Send + Sync> {
    #[cfg(feature = "pdfium")]
    {
        match crate::pipeline::extraction::pdfium::PdfiumReader::new() {
            Ok(reader) => Box::new(reader),
            Err(e) => {
                tracing::warn!(error = %e, "PDFium unavailable, using text-layer PDF reader only");
                Box::new(UnavailablePdfReader::new(e.to_string()))
            }
        }
    }

    #[cfg(not(feature = "pdfium"))]
    {
        tracing::info!("Built without the pdfium feature, using text-layer PDF reader only");
        Box::new(UnavailablePdfReader::new("PDFium support not compiled in"))
    }
}

/// Common system locations for Tesseract language data.
#[cfg_attr(not(feature = "ocr"), allow(dead_code))]
const TESSDATA_CANDIDATES: [&str; 5] = [
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

/// Locate a tessdata directory holding the primary model for `language`.
#[cfg_attr(not(feature = "ocr"), allow(dead_code))]
fn find_tessdata_dir(language: &str) -> Option<PathBuf> {
    find_tessdata_in(language, TESSDATA_CANDIDATES.iter().map(PathBuf::from))
}

#[cfg_attr(not(feature = "ocr"), allow(dead_code))]
fn find_tessdata_in(
    language: &str,
    candidates: impl IntoIterator<Item = PathBuf>,
) -> Option<PathBuf> {
    let primary = language.split('+').next().unwrap_or("eng");
    let model = format!("{primary}.traineddata");
    candidates.into_iter().find(|dir| dir.join(&model).exists())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
