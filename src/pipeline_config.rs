//! Extraction pipeline configuration.
//!
//! Every value has a working default; a handful can be overridden from the
//! environment so deployments can tune rendering and OCR without rebuilding.

use std::env;
use std::path::PathBuf;

use serde::Serialize;

use crate::pipeline::extraction::PreprocessConfig;

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

/// Confidence assigned to a page whose text came from the PDF text layer.
/// A calibration constant, not a measurement.
pub const NATIVE_TEXT_CONFIDENCE: f32 = 0.95;

/// Confidence assigned to text recovered by the text-only fallback reader.
/// A calibration constant, not a measurement.
pub const FALLBACK_TEXT_CONFIDENCE: f32 = 0.80;

/// Pixels per PDF point when rasterizing scanned pages (2.0 = 144 DPI).
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    pub render_scale: f32,
    pub native_text_confidence: f32,
    pub fallback_text_confidence: f32,
    /// Where rasterized PDF pages are written while they are recognized.
    pub scratch_dir: PathBuf,
    /// Tesseract language string, e.g. "eng" or "eng+fra".
    pub ocr_language: String,
    /// Explicit tessdata directory; discovered at startup when `None`.
    pub tessdata_dir: Option<PathBuf>,
    pub preprocess: PreprocessConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            render_scale: DEFAULT_RENDER_SCALE,
            native_text_confidence: NATIVE_TEXT_CONFIDENCE,
            fallback_text_confidence: FALLBACK_TEXT_CONFIDENCE,
            scratch_dir: env::temp_dir(),
            ocr_language: DEFAULT_OCR_LANGUAGE.to_string(),
            tessdata_dir: None,
            preprocess: PreprocessConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `CREDEX_RENDER_SCALE`, `CREDEX_SCRATCH_DIR`,
    /// `CREDEX_OCR_LANG` and `TESSDATA_PREFIX`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    /// Unparseable or non-positive values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            render_scale: lookup("CREDEX_RENDER_SCALE")
                .and_then(|s| s.trim().parse::<f32>().ok())
                .filter(|s| s.is_finite() && *s > 0.0)
                .unwrap_or(defaults.render_scale),
            scratch_dir: lookup("CREDEX_SCRATCH_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            ocr_language: lookup("CREDEX_OCR_LANG")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.ocr_language),
            tessdata_dir: lookup("TESSDATA_PREFIX")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            ..defaults
        }
    }
}
