use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use image::GrayImage;

use super::types::{BoundingBox, Detection, TextRecognizer};
use super::ExtractionError;

// ═══════════════════════════════════════════════════════════
// Tesseract
// ═══════════════════════════════════════════════════════════

/// Tesseract-backed recognizer.
/// Only available when compiled with the `ocr` feature flag.
///
/// The engine is loaded once and owned by a dedicated worker thread; calls
/// from any number of threads are queued to it one at a time. If a call
/// leaves the engine unusable it is reloaded for the next request.
#[cfg(feature = "ocr")]
pub struct TesseractRecognizer {
    jobs: Mutex<std::sync::mpsc::Sender<OcrJob>>,
}

#[cfg(feature = "ocr")]
struct OcrJob {
    png: Vec<u8>,
    reply: std::sync::mpsc::Sender<Result<Vec<Detection>, ExtractionError>>,
}

#[cfg(feature = "ocr")]
impl TesseractRecognizer {
    /// Load the model for `language` (e.g. "eng", "eng+fra"). With no
    /// tessdata directory, Tesseract's compiled-in default is used.
    pub fn new(
        tessdata_dir: Option<&std::path::Path>,
        language: &str,
    ) -> Result<Self, ExtractionError> {
        let datapath = match tessdata_dir {
            Some(dir) => {
                let primary = language.split('+').next().unwrap_or("eng");
                if !dir.join(format!("{primary}.traineddata")).exists() {
                    return Err(ExtractionError::OcrInit(format!(
                        "{primary}.traineddata not found in {}",
                        dir.display()
                    )));
                }
                let path = dir
                    .to_str()
                    .ok_or_else(|| ExtractionError::OcrInit("Invalid tessdata path".into()))?;
                Some(path.to_string())
            }
            None => None,
        };

        let (jobs, queue) = std::sync::mpsc::channel::<OcrJob>();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let lang = language.to_string();
        std::thread::Builder::new()
            .name("credex-ocr".into())
            .spawn(move || run_worker(datapath, lang, queue, ready_tx))
            .map_err(|e| ExtractionError::OcrInit(format!("Failed to start OCR worker: {e}")))?;

        ready_rx
            .recv()
            .map_err(|_| ExtractionError::OcrInit("OCR worker exited during startup".into()))??;

        tracing::info!(language, "Tesseract recognizer ready");
        Ok(Self {
            jobs: Mutex::new(jobs),
        })
    }
}

#[cfg(feature = "ocr")]
impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, raster: &GrayImage) -> Result<Vec<Detection>, ExtractionError> {
        if raster.width() == 0 || raster.height() == 0 {
            return Err(ExtractionError::OcrProcessing(
                "Cannot recognize an empty raster".into(),
            ));
        }

        let png = encode_png(raster)?;
        let (reply, response) = std::sync::mpsc::channel();
        self.jobs
            .lock()
            .map_err(|_| ExtractionError::OcrProcessing("OCR worker lock poisoned".into()))?
            .send(OcrJob { png, reply })
            .map_err(|_| ExtractionError::OcrProcessing("OCR worker has stopped".into()))?;

        let detections = response
            .recv()
            .map_err(|_| ExtractionError::OcrProcessing("OCR worker dropped the request".into()))??;

        tracing::debug!(
            width = raster.width(),
            height = raster.height(),
            detections = detections.len(),
            "Tesseract recognition complete"
        );
        Ok(detections)
    }
}

#[cfg(feature = "ocr")]
fn init_tesseract(
    datapath: Option<&str>,
    language: &str,
) -> Result<tesseract::Tesseract, ExtractionError> {
    tesseract::Tesseract::new(datapath, Some(language))
        .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))
}

#[cfg(feature = "ocr")]
fn run_worker(
    datapath: Option<String>,
    language: String,
    queue: std::sync::mpsc::Receiver<OcrJob>,
    ready: std::sync::mpsc::Sender<Result<(), ExtractionError>>,
) {
    let mut engine = match init_tesseract(datapath.as_deref(), &language) {
        Ok(tess) => Some(tess),
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    for job in queue {
        let tess = match engine.take() {
            Some(tess) => tess,
            None => match init_tesseract(datapath.as_deref(), &language) {
                Ok(tess) => tess,
                Err(e) => {
                    let _ = job.reply.send(Err(e));
                    continue;
                }
            },
        };
        let (tess, result) = recognize_png(tess, &job.png);
        engine = tess;
        let _ = job.reply.send(result);
    }
}

/// Returns the engine alongside the result when it is still usable.
#[cfg(feature = "ocr")]
fn recognize_png(
    tess: tesseract::Tesseract,
    png: &[u8],
) -> (
    Option<tesseract::Tesseract>,
    Result<Vec<Detection>, ExtractionError>,
) {
    let mut tess = match tess.set_image_from_mem(png) {
        Ok(tess) => tess,
        Err(e) => return (None, Err(ExtractionError::OcrProcessing(format!("{e:?}")))),
    };
    // TSV columns: level page_num block_num par_num line_num word_num left top width height conf text
    let result = tess
        .get_tsv_text(0)
        .map(|tsv| parse_tsv_detections(&tsv))
        .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")));
    (Some(tess), result)
}

#[cfg(feature = "ocr")]
fn encode_png(raster: &GrayImage) -> Result<Vec<u8>, ExtractionError> {
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder};

    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(
            raster.as_raw(),
            raster.width(),
            raster.height(),
            ExtendedColorType::L8,
        )
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(buf)
}

// ═══════════════════════════════════════════════════════════
// Stand-ins
// ═══════════════════════════════════════════════════════════

/// Recognizer used when no OCR backend could be loaded. Every call fails,
/// so image inputs surface an OCR error instead of an empty result.
pub struct UnavailableRecognizer {
    reason: String,
}

impl UnavailableRecognizer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl TextRecognizer for UnavailableRecognizer {
    fn recognize(&self, _raster: &GrayImage) -> Result<Vec<Detection>, ExtractionError> {
        Err(ExtractionError::OcrInit(self.reason.clone()))
    }
}

/// Mock recognizer for unit testing without Tesseract.
///
/// Answers queued responses in order, then repeats the default response.
/// Records how often it was called and the size of every raster it saw.
pub struct MockRecognizer {
    queued: Mutex<VecDeque<Result<Vec<Detection>, String>>>,
    default: Result<Vec<Detection>, String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(u32, u32)>>,
}

impl MockRecognizer {
    /// One detection per whitespace-separated word, all at `confidence`.
    pub fn new(text: &str, confidence: f32) -> Self {
        Self::with_default(Ok(words(text, confidence)))
    }

    pub fn failing(message: &str) -> Self {
        Self::with_default(Err(message.to_string()))
    }

    /// Answer each call with the next `(text, confidence)` pair; calls past
    /// the end see no detections.
    pub fn scripted(pages: &[(&str, f32)]) -> Self {
        let mock = Self::with_default(Ok(Vec::new()));
        if let Ok(mut queued) = mock.queued.lock() {
            queued.extend(pages.iter().map(|(t, c)| Ok(words(t, *c))));
        }
        mock
    }

    fn with_default(default: Result<Vec<Detection>, String>) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            default,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Raster dimensions in call order.
    pub fn seen_dimensions(&self) -> Vec<(u32, u32)> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl TextRecognizer for MockRecognizer {
    fn recognize(&self, raster: &GrayImage) -> Result<Vec<Detection>, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(raster.dimensions());
        }
        let next = self
            .queued
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| self.default.clone());
        next.map_err(ExtractionError::OcrProcessing)
    }
}

fn words(text: &str, confidence: f32) -> Vec<Detection> {
    text.split_whitespace()
        .map(|w| Detection::new(w, confidence))
        .collect()
}

// ═══════════════════════════════════════════════════════════
// TSV parsing
// ═══════════════════════════════════════════════════════════

/// Parse Tesseract TSV output into word-level detections.
/// Level 5 = individual word entries. Confidence is 0-100, scaled to 0.0-1.0.
#[cfg_attr(not(feature = "ocr"), allow(dead_code))]
fn parse_tsv_detections(tsv: &str) -> Vec<Detection> {
    let mut results = Vec::new();

    for line in tsv.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // Header row and malformed rows fail to parse here.
        let level: i32 = match fields[0].parse() {
            Ok(l) => l,
            Err(_) => continue,
        };
        if level != 5 {
            continue;
        }

        let conf: f32 = match fields[10].parse() {
            Ok(c) => c,
            Err(_) => continue,
        };

        let word = fields[11].trim();
        if word.is_empty() {
            continue;
        }

        // Tesseract returns -1 for words it can't assign confidence to
        let confidence = if conf < 0.0 { 0.0 } else { (conf / 100.0).min(1.0) };

        results.push(Detection {
            region: parse_bounding_box(fields[6], fields[7], fields[8], fields[9]),
            text: word.to_string(),
            confidence,
        });
    }

    results
}

#[cfg_attr(not(feature = "ocr"), allow(dead_code))]
fn parse_bounding_box(left: &str, top: &str, width: &str, height: &str) -> Option<BoundingBox> {
    Some(BoundingBox {
        x: left.parse().ok()?,
        y: top.parse().ok()?,
        width: width.parse().ok()?,
        height: height.parse().ok()?,
    })
}
