use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};

use super::preprocess::ImagePreprocessor;
use super::types::{
    PdfDocumentReader, PdfTextExtractor, RawExtraction, TextExtractor, TextRecognizer,
};
use super::ExtractionError;
use crate::models::{MediaKind, SourceDocument};
use crate::pipeline_config::PipelineConfig;

/// Concrete implementation of the text extractor.
/// Uses trait objects for OCR and both PDF readers, enabling dependency injection.
///
/// PDFs are read page by page: pages with a text layer are taken as-is,
/// pages without one are rasterized, preprocessed and recognized. If that
/// path fails anywhere, the whole document is re-read once through the
/// text-only fallback. When the failure came from the recognizer and the
/// fallback finds no text, the OCR error is returned instead. Images are preprocessed and recognized with no
/// fallback.
pub struct DocumentExtractor {
    recognizer: Arc<dyn TextRecognizer + Send + Sync>,
    pdf_reader: Box<dyn PdfDocumentReader + Send + Sync>,
    pdf_fallback: Box<dyn PdfTextExtractor + Send + Sync>,
    preprocessor: ImagePreprocessor,
    render_scale: f32,
    native_text_confidence: f32,
    fallback_text_confidence: f32,
    scratch_dir: PathBuf,
}

impl DocumentExtractor {
    pub fn new(
        recognizer: Arc<dyn TextRecognizer + Send + Sync>,
        pdf_reader: Box<dyn PdfDocumentReader + Send + Sync>,
        pdf_fallback: Box<dyn PdfTextExtractor + Send + Sync>,
    ) -> Self {
        let defaults = PipelineConfig::default();
        Self {
            recognizer,
            pdf_reader,
            pdf_fallback,
            preprocessor: ImagePreprocessor::new(defaults.preprocess),
            render_scale: defaults.render_scale,
            native_text_confidence: defaults.native_text_confidence,
            fallback_text_confidence: defaults.fallback_text_confidence,
            scratch_dir: defaults.scratch_dir,
        }
    }

    /// Apply render scale, confidence constants, scratch location and
    /// preprocessing parameters.
    pub fn with_config(mut self, config: &PipelineConfig) -> Self {
        self.preprocessor = ImagePreprocessor::new(config.preprocess.clone());
        self.render_scale = config.render_scale;
        self.native_text_confidence = config.native_text_confidence;
        self.fallback_text_confidence = config.fallback_text_confidence;
        self.scratch_dir = config.scratch_dir.clone();
        self
    }

    fn extract_pdf(&self, document: &SourceDocument) -> Result<RawExtraction, ExtractionError> {
        match self.extract_pdf_pages(&document.path) {
            Ok(raw) => Ok(raw),
            Err(primary) => {
                tracing::warn!(
                    document_id = %document.id,
                    error = %primary,
                    code = primary.error_code(),
                    "Page-level PDF extraction failed, falling back to text layer"
                );
                let fallback = self.extract_pdf_text_only(&document.path).map_err(|e| {
                    tracing::error!(
                        document_id = %document.id,
                        error = %e,
                        "Fallback PDF extraction failed"
                    );
                    e
                })?;

                // A scanned page the recognizer could not read has no text
                // layer either; an empty fallback is not a result.
                if primary.is_ocr_failure() && fallback.text.is_empty() {
                    tracing::error!(
                        document_id = %document.id,
                        code = primary.error_code(),
                        "Fallback found no text after OCR failure"
                    );
                    return Err(primary);
                }
                Ok(fallback)
            }
        }
    }

    fn extract_pdf_pages(&self, path: &Path) -> Result<RawExtraction, ExtractionError> {
        let bytes = std::fs::read(path)?;
        let mut pages = Vec::new();

        let page_count = self.pdf_reader.visit_pages(&bytes, &mut |index, page| {
            let text = page.text()?;
            if !text.trim().is_empty() {
                tracing::debug!(page = index, chars = text.len(), "Using embedded text layer");
                pages.push(RawExtraction::new(text, self.native_text_confidence));
                return Ok(());
            }

            tracing::debug!(page = index, "No text layer, rasterizing for OCR");
            let image = page.render(self.render_scale)?;
            pages.push(self.ocr_scanned_page(index, &image)?);
            Ok(())
        })?;

        tracing::debug!(pages = page_count, "PDF pages processed");
        Ok(RawExtraction::from_pages(&pages))
    }

    /// Round-trip a rendered page through a scratch PNG so it takes the same
    /// decode + preprocess path as an uploaded image. The scratch file is
    /// removed when it goes out of scope, whatever the outcome.
    fn ocr_scanned_page(
        &self,
        index: usize,
        image: &DynamicImage,
    ) -> Result<RawExtraction, ExtractionError> {
        let mut scratch = tempfile::Builder::new()
            .prefix(&format!("credex-page-{index}-"))
            .suffix(".png")
            .tempfile_in(&self.scratch_dir)?;

        image
            .write_to(&mut scratch, ImageFormat::Png)
            .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
        scratch.flush()?;

        let raster = self.preprocessor.preprocess_path(scratch.path());
        let detections = self.recognizer.recognize(&raster)?;
        let raw = RawExtraction::from_detections(&detections);

        tracing::debug!(
            page = index,
            detections = detections.len(),
            confidence = raw.confidence,
            "Scanned page recognized"
        );
        Ok(raw)
    }

    fn extract_pdf_text_only(&self, path: &Path) -> Result<RawExtraction, ExtractionError> {
        let bytes = std::fs::read(path)?;
        let pages = self.pdf_fallback.extract_pages(&bytes)?;
        let text = pages.join("\n");
        Ok(RawExtraction::new(text.trim(), self.fallback_text_confidence))
    }

    fn extract_image(&self, path: &Path) -> Result<RawExtraction, ExtractionError> {
        let raster = self.preprocessor.preprocess_path(path);
        let detections = self.recognizer.recognize(&raster)?;
        Ok(RawExtraction::from_detections(&detections))
    }
}

impl TextExtractor for DocumentExtractor {
    fn extract(&self, document: &SourceDocument) -> Result<RawExtraction, ExtractionError> {
        tracing::info!(
            document_id = %document.id,
            kind = document.kind.as_str(),
            "Starting text extraction"
        );

        let raw = match document.kind {
            MediaKind::Pdf => self.extract_pdf(document)?,
            MediaKind::Jpeg | MediaKind::Png | MediaKind::Tiff | MediaKind::Bmp => {
                self.extract_image(&document.path)?
            }
        };

        tracing::info!(
            document_id = %document.id,
            kind = document.kind.as_str(),
            confidence = raw.confidence,
            text_length = raw.text.len(),
            "Text extraction complete"
        );
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use image::{GrayImage, Luma};

    use super::*;
    use crate::pipeline::extraction::ocr::{MockRecognizer, UnavailableRecognizer};
    use crate::pipeline::extraction::types::PdfPageView;

    // ── Mock PDF backends ──

    struct MockPage {
        text: String,
        image: Option<DynamicImage>,
        renders: Arc<AtomicUsize>,
    }

    impl PdfPageView for MockPage {
        fn text(&self) -> Result<String, ExtractionError> {
            Ok(self.text.clone())
        }

        fn render(&self, _scale: f32) -> Result<DynamicImage, ExtractionError> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            self.image.clone().ok_or_else(|| ExtractionError::PdfRendering {
                page: 0,
                reason: "mock page has no raster".into(),
            })
        }
    }

    struct MockPdfReader {
        pages: Vec<MockPage>,
        failure: Option<String>,
    }

    impl PdfDocumentReader for MockPdfReader {
        fn visit_pages(
            &self,
            _pdf_bytes: &[u8],
            visit: &mut dyn FnMut(usize, &dyn PdfPageView) -> Result<(), ExtractionError>,
        ) -> Result<usize, ExtractionError> {
            if let Some(reason) = &self.failure {
                return Err(ExtractionError::PdfParsing(reason.clone()));
            }
            for (i, page) in self.pages.iter().enumerate() {
                visit(i, page)?;
            }
            Ok(self.pages.len())
        }
    }

    struct MockFallback {
        result: Result<Vec<String>, String>,
    }

    impl PdfTextExtractor for MockFallback {
        fn extract_pages(&self, _pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
            self.result.clone().map_err(ExtractionError::PdfParsing)
        }
    }

    // ── Helpers ──

    struct Fixture {
        _dir: tempfile::TempDir,
        scratch: PathBuf,
        pdf: PathBuf,
        renders: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let scratch = dir.path().join("scratch");
        std::fs::create_dir(&scratch).unwrap();
        let pdf = dir.path().join("certificate.pdf");
        std::fs::write(&pdf, b"%PDF-1.4 mock").unwrap();
        Fixture {
            _dir: dir,
            scratch,
            pdf,
            renders: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn text_page(fx: &Fixture, text: &str) -> MockPage {
        MockPage {
            text: text.into(),
            image: None,
            renders: fx.renders.clone(),
        }
    }

    fn scanned_page(fx: &Fixture) -> MockPage {
        let raster = GrayImage::from_fn(30, 20, |x, _| Luma([if x % 7 == 0 { 0 } else { 255 }]));
        MockPage {
            text: String::new(),
            image: Some(DynamicImage::ImageLuma8(raster)),
            renders: fx.renders.clone(),
        }
    }

    fn extractor(
        fx: &Fixture,
        recognizer: Arc<MockRecognizer>,
        reader: MockPdfReader,
        fallback: Result<Vec<String>, String>,
    ) -> DocumentExtractor {
        let config = PipelineConfig {
            scratch_dir: fx.scratch.clone(),
            ..PipelineConfig::default()
        };
        DocumentExtractor::new(
            recognizer,
            Box::new(reader),
            Box::new(MockFallback { result: fallback }),
        )
        .with_config(&config)
    }

    fn reader(pages: Vec<MockPage>) -> MockPdfReader {
        MockPdfReader { pages, failure: None }
    }

    fn failing_reader(reason: &str) -> MockPdfReader {
        MockPdfReader {
            pages: vec![],
            failure: Some(reason.into()),
        }
    }

    fn pdf_doc(fx: &Fixture) -> SourceDocument {
        SourceDocument::new(&fx.pdf, MediaKind::Pdf)
    }

    fn scratch_is_empty(fx: &Fixture) -> bool {
        std::fs::read_dir(&fx.scratch).unwrap().next().is_none()
    }

    // ── PDF: primary path ──

    #[test]
    fn born_digital_pdf_uses_text_layer_at_fixed_confidence() {
        let fx = fixture();
        let ocr = Arc::new(MockRecognizer::new("unused", 0.1));
        let pages = vec![
            text_page(&fx, "Page one"),
            text_page(&fx, "Page two"),
            text_page(&fx, "Page three"),
        ];
        let ex = extractor(&fx, ocr.clone(), reader(pages), Ok(vec![]));

        let raw = ex.extract(&pdf_doc(&fx)).unwrap();

        assert_eq!(raw.text, "Page one\nPage two\nPage three");
        assert!((raw.confidence - 0.95).abs() < 1e-5);
        assert_eq!(ocr.calls(), 0);
        assert_eq!(fx.renders.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn scanned_pdf_averages_ocr_confidence() {
        let fx = fixture();
        let ocr = Arc::new(MockRecognizer::scripted(&[("John", 0.6), ("Smith", 0.8)]));
        let pages = vec![scanned_page(&fx), scanned_page(&fx)];
        let ex = extractor(&fx, ocr.clone(), reader(pages), Ok(vec![]));

        let raw = ex.extract(&pdf_doc(&fx)).unwrap();

        assert_eq!(raw.text, "John\nSmith");
        assert!((raw.confidence - 0.7).abs() < 1e-5);
        assert_eq!(fx.renders.load(Ordering::SeqCst), 2);
        assert_eq!(ocr.seen_dimensions(), vec![(30, 20), (30, 20)]);
    }

    #[test]
    fn mixed_pdf_averages_native_and_ocr_pages() {
        let fx = fixture();
        let ocr = Arc::new(MockRecognizer::new("scanned words", 0.5));
        let pages = vec![text_page(&fx, "typed page"), scanned_page(&fx)];
        let ex = extractor(&fx, ocr.clone(), reader(pages), Ok(vec![]));

        let raw = ex.extract(&pdf_doc(&fx)).unwrap();

        assert_eq!(raw.text, "typed page\nscanned words");
        assert!((raw.confidence - 0.725).abs() < 1e-5);
        assert_eq!(ocr.calls(), 1);
    }

    #[test]
    fn whitespace_only_text_layer_counts_as_scanned() {
        let fx = fixture();
        let ocr = Arc::new(MockRecognizer::new("recovered", 0.9));
        let mut page = scanned_page(&fx);
        page.text = " \n\t ".into();
        let ex = extractor(&fx, ocr.clone(), reader(vec![page]), Ok(vec![]));

        let raw = ex.extract(&pdf_doc(&fx)).unwrap();

        assert_eq!(raw.text, "recovered");
        assert_eq!(ocr.calls(), 1);
    }

    #[test]
    fn empty_pdf_yields_empty_text_and_zero_confidence() {
        let fx = fixture();
        let ocr = Arc::new(MockRecognizer::new("x", 0.9));
        let ex = extractor(&fx, ocr, reader(vec![]), Ok(vec!["unused".into()]));

        let raw = ex.extract(&pdf_doc(&fx)).unwrap();

        assert_eq!(raw, RawExtraction::empty());
    }

    #[test]
    fn scratch_files_removed_after_success() {
        let fx = fixture();
        let ocr = Arc::new(MockRecognizer::new("ok", 0.9));
        let ex = extractor(&fx, ocr, reader(vec![scanned_page(&fx)]), Ok(vec![]));

        ex.extract(&pdf_doc(&fx)).unwrap();

        assert!(scratch_is_empty(&fx));
    }

    // ── PDF: fallback ──

    #[test]
    fn reader_failure_falls_back_to_text_layer() {
        let fx = fixture();
        let ocr = Arc::new(MockRecognizer::new("x", 0.9));
        let ex = extractor(
            &fx,
            ocr,
            failing_reader("corrupt xref"),
            Ok(vec!["Degree Certificate".into(), "Page two\n".into()]),
        );

        let raw = ex.extract(&pdf_doc(&fx)).unwrap();

        assert_eq!(raw.text, "Degree Certificate\nPage two");
        assert!((raw.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn render_failure_falls_back() {
        let fx = fixture();
        let ocr = Arc::new(MockRecognizer::new("x", 0.9));
        let mut broken = scanned_page(&fx);
        broken.image = None;
        let ex = extractor(&fx, ocr, reader(vec![broken]), Ok(vec!["fallback".into()]));

        let raw = ex.extract(&pdf_doc(&fx)).unwrap();

        assert_eq!(raw.text, "fallback");
        assert!((raw.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn page_ocr_failure_falls_back_and_cleans_scratch() {
        let fx = fixture();
        let ocr = Arc::new(MockRecognizer::failing("model crashed"));
        let pages = vec![text_page(&fx, "first"), scanned_page(&fx)];
        let ex = extractor(&fx, ocr.clone(), reader(pages), Ok(vec!["text only".into()]));

        let raw = ex.extract(&pdf_doc(&fx)).unwrap();

        assert_eq!(raw.text, "text only");
        assert_eq!(ocr.calls(), 1);
        assert!(scratch_is_empty(&fx));
    }

    #[test]
    fn unreadable_scan_with_empty_fallback_reports_ocr_error() {
        let fx = fixture();
        let ex = DocumentExtractor::new(
            Arc::new(UnavailableRecognizer::new("built without OCR")),
            Box::new(reader(vec![scanned_page(&fx)])),
            Box::new(MockFallback { result: Ok(vec!["  \n".into()]) }),
        )
        .with_config(&PipelineConfig {
            scratch_dir: fx.scratch.clone(),
            ..PipelineConfig::default()
        });

        let err = ex.extract(&pdf_doc(&fx)).unwrap_err();

        assert_eq!(err.error_code(), "OCR_INIT");
        assert!(scratch_is_empty(&fx));
    }

    #[test]
    fn non_ocr_failure_with_empty_fallback_still_succeeds() {
        let fx = fixture();
        let ocr = Arc::new(MockRecognizer::new("x", 0.9));
        let ex = extractor(&fx, ocr, failing_reader("corrupt xref"), Ok(vec![String::new()]));

        let raw = ex.extract(&pdf_doc(&fx)).unwrap();

        assert_eq!(raw.text, "");
        assert!((raw.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn fallback_failure_propagates_its_error() {
        let fx = fixture();
        let ocr = Arc::new(MockRecognizer::new("x", 0.9));
        let ex = extractor(
            &fx,
            ocr,
            failing_reader("primary broke"),
            Err("fallback broke".into()),
        );

        let err = ex.extract(&pdf_doc(&fx)).unwrap_err();

        assert!(matches!(err, ExtractionError::PdfParsing(ref m) if m == "fallback broke"));
    }

    #[test]
    fn missing_pdf_file_is_an_io_error() {
        let fx = fixture();
        let ocr = Arc::new(MockRecognizer::new("x", 0.9));
        let ex = extractor(&fx, ocr, reader(vec![]), Ok(vec![]));
        let doc = SourceDocument::new(fx.scratch.join("gone.pdf"), MediaKind::Pdf);

        let err = ex.extract(&doc).unwrap_err();

        assert_eq!(err.error_code(), "EXTRACT_IO");
    }

    // ── Images ──

    fn write_image(fx: &Fixture, name: &str) -> PathBuf {
        let path = fx.scratch.parent().unwrap().join(name);
        let raster = GrayImage::from_fn(24, 16, |x, _| Luma([if x == 12 { 0 } else { 255 }]));
        DynamicImage::ImageLuma8(raster).save(&path).unwrap();
        path
    }

    #[test]
    fn image_is_preprocessed_and_recognized() {
        let fx = fixture();
        let path = write_image(&fx, "scan.png");
        let ocr = Arc::new(MockRecognizer::new("Bachelor of Arts", 0.9));
        let ex = extractor(&fx, ocr.clone(), reader(vec![]), Ok(vec![]));

        let raw = ex.extract(&SourceDocument::new(&path, MediaKind::Png)).unwrap();

        assert_eq!(raw.text, "Bachelor of Arts");
        assert!((raw.confidence - 0.9).abs() < 1e-6);
        assert_eq!(ocr.seen_dimensions(), vec![(24, 16)]);
    }

    #[test]
    fn image_ocr_failure_propagates_without_fallback() {
        let fx = fixture();
        let path = write_image(&fx, "scan.png");
        let ocr = Arc::new(MockRecognizer::failing("model crashed"));
        let ex = extractor(&fx, ocr, reader(vec![]), Ok(vec!["never used".into()]));

        let err = ex.extract(&SourceDocument::new(&path, MediaKind::Png)).unwrap_err();

        assert!(err.is_ocr_failure());
    }

    #[test]
    fn undecodable_image_still_reaches_recognizer() {
        let fx = fixture();
        let path = fx.scratch.parent().unwrap().join("broken.jpg");
        std::fs::write(&path, b"not a jpeg").unwrap();
        let ocr = Arc::new(MockRecognizer::new("", 0.0));
        let ex = extractor(&fx, ocr.clone(), reader(vec![]), Ok(vec![]));

        let raw = ex.extract(&SourceDocument::new(&path, MediaKind::Jpeg)).unwrap();

        assert_eq!(raw, RawExtraction::empty());
        assert_eq!(ocr.seen_dimensions(), vec![(0, 0)]);
    }
}
