//! Raster cleanup ahead of OCR.
//!
//! Decode → grayscale → non-local-means denoise → Gaussian adaptive
//! threshold. Every step is best-effort: a failing or panicking step is
//! logged and the raster from the previous step is returned instead, so
//! preprocessing never fails outward. An undecodable input yields an empty
//! 0×0 raster and leaves the decision to the recognizer.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::filter::gaussian_blur_f32;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ═══════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════

/// Filter parameters. Defaults follow the usual document-scan settings:
/// 7×7 comparison patches searched over a 21×21 window, block size 11.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Non-local-means filter strength `h`. Larger removes more noise and
    /// more detail.
    pub denoise_strength: f32,
    /// Half-width of the comparison patch (3 → 7×7).
    pub patch_radius: u32,
    /// Half-width of the search window (10 → 21×21).
    pub search_radius: u32,
    /// Odd neighborhood size for the adaptive threshold.
    pub threshold_block_size: u32,
    /// Subtracted from the weighted neighborhood mean.
    pub threshold_offset: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            denoise_strength: 3.0,
            patch_radius: 3,
            search_radius: 10,
            threshold_block_size: 11,
            threshold_offset: 2.0,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Preprocessor
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Decode `path` and prepare it for OCR. Never fails: undecodable input
    /// comes back as an empty raster.
    pub fn preprocess_path(&self, path: &Path) -> GrayImage {
        match decode_file(path) {
            Some(image) => self.preprocess(&image),
            None => {
                warn!(path = %path.display(), "Image could not be decoded, continuing with empty raster");
                GrayImage::new(0, 0)
            }
        }
    }

    /// Prepare an already-decoded image for OCR.
    pub fn preprocess(&self, image: &DynamicImage) -> GrayImage {
        let gray = match guarded("grayscale", || image.to_luma8()) {
            Some(gray) => gray,
            None => return GrayImage::new(0, 0),
        };
        if gray.width() == 0 || gray.height() == 0 {
            return gray;
        }

        let denoised = match guarded("denoise", || non_local_means(&gray, &self.config)) {
            Some(denoised) => denoised,
            None => return gray,
        };

        let binary = guarded("threshold", || {
            gaussian_adaptive_threshold(
                &denoised,
                self.config.threshold_block_size,
                self.config.threshold_offset,
            )
        });

        debug!(
            width = denoised.width(),
            height = denoised.height(),
            binarized = binary.is_some(),
            "Preprocessing complete"
        );

        binary.unwrap_or(denoised)
    }
}

/// Run one step, turning a panic into `None`.
fn guarded<T>(step: &'static str, f: impl FnOnce() -> T) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(step, "Preprocessing step panicked, keeping previous raster");
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Decoding
// ═══════════════════════════════════════════════════════════

/// Primary decoder trusts the file extension; the secondary one sniffs the
/// format from the content, which rescues mislabelled uploads.
fn decode_file(path: &Path) -> Option<DynamicImage> {
    match guarded("decode", || image::open(path)) {
        Some(Ok(image)) => return Some(image),
        Some(Err(e)) => {
            debug!(path = %path.display(), error = %e, "Extension-based decode failed, sniffing content");
        }
        None => {}
    }

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Image file unreadable");
            return None;
        }
    };

    match guarded("decode", || image::load_from_memory(&bytes)) {
        Some(Ok(image)) => Some(image),
        Some(Err(e)) => {
            debug!(path = %path.display(), error = %e, "Content-sniffed decode failed");
            None
        }
        None => None,
    }
}

// ═══════════════════════════════════════════════════════════
// Non-local means
// ═══════════════════════════════════════════════════════════

/// Output rows handled by one parallel task.
const BAND_ROWS: usize = 32;

/// Patch pairs weighted below this are left out of the average.
const MIN_WEIGHT: f32 = 1e-4;

/// Upper bound on weight-table entries for extreme strength settings.
const MAX_WEIGHT_ENTRIES: usize = 1 << 22;

/// Non-local-means denoising for a grayscale raster.
///
/// Each output pixel is the weighted mean of every pixel in its search
/// window, weighted by `exp(-mse / h²)` where `mse` compares the two
/// surrounding patches. Patch distances are exact integer sums computed one
/// search offset at a time with a summed-area table, so cost is independent
/// of patch size. Weights come from a lookup table indexed by that sum.
/// Bands of rows are denoised in parallel. Borders replicate the edge
/// pixels.
pub fn non_local_means(src: &GrayImage, config: &PreprocessConfig) -> GrayImage {
    let (width, height) = src.dimensions();
    let strength = config.denoise_strength;
    if width == 0 || height == 0 || strength.is_nan() || strength <= 0.0 {
        return src.clone();
    }

    let radius = config.patch_radius as usize;
    let search = config.search_radius as usize;
    let plane = PaddedPlane::new(src, radius + search);
    let weights = weight_table(strength, radius);

    let w = width as usize;
    let mut out = vec![0u8; w * height as usize];
    out.par_chunks_mut(BAND_ROWS * w)
        .enumerate()
        .for_each(|(band, rows)| {
            denoise_band(&plane, &weights, radius, search, band * BAND_ROWS, rows);
        });

    GrayImage::from_raw(width, height, out).unwrap_or_else(|| src.clone())
}

/// Source raster with `pad` replicated pixels on every side.
struct PaddedPlane {
    data: Vec<u8>,
    stride: usize,
    pad: usize,
    width: usize,
}

impl PaddedPlane {
    fn new(src: &GrayImage, pad: usize) -> Self {
        let (w, h) = (src.width() as usize, src.height() as usize);
        let stride = w + 2 * pad;
        let mut data = Vec::with_capacity(stride * (h + 2 * pad));
        for y in 0..h + 2 * pad {
            let sy = y.saturating_sub(pad).min(h - 1) as u32;
            for x in 0..stride {
                let sx = x.saturating_sub(pad).min(w - 1) as u32;
                data.push(src.get_pixel(sx, sy)[0]);
            }
        }
        Self {
            data,
            stride,
            pad,
            width: w,
        }
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.stride + x]
    }
}

/// `exp(-(ssd / area) / h²)` for every patch sum worth keeping.
fn weight_table(strength: f32, radius: usize) -> Vec<f32> {
    let side = 2 * radius + 1;
    let area = (side * side) as f32;
    let h2 = strength * strength;
    let cutoff = area * h2 * (1.0 / MIN_WEIGHT).ln();
    let max_ssd = side * side * 255 * 255;
    let len = (cutoff.ceil() as usize).min(max_ssd).min(MAX_WEIGHT_ENTRIES) + 1;
    (0..len)
        .map(|ssd| (-(ssd as f32 / area) / h2).exp())
        .collect()
}

/// Denoise output rows `y0..y0 + rows.len() / width` into `rows`.
fn denoise_band(
    plane: &PaddedPlane,
    weights: &[f32],
    radius: usize,
    search: usize,
    y0: usize,
    rows: &mut [u8],
) {
    let w = plane.width;
    let band_h = rows.len() / w;
    let span = 2 * radius + 1;
    // Patch-distance region: every patch pixel of every output pixel.
    let iw = w + 2 * radius;
    let ih = band_h + 2 * radius;
    let stride = iw + 1;
    // Padded coordinates of the region's top-left corner.
    let (rx, ry) = (plane.pad - radius, y0 + plane.pad - radius);

    let mut integral = vec![0u64; stride * (ih + 1)];
    let mut weight_sum = vec![0f32; w * band_h];
    let mut value_sum = vec![0f32; w * band_h];

    let s = search as isize;
    for dy in -s..=s {
        for dx in -s..=s {
            for iy in 0..ih {
                let py = ry + iy;
                let qy = (py as isize + dy) as usize;
                let mut row = 0u64;
                for ix in 0..iw {
                    let px = rx + ix;
                    let qx = (px as isize + dx) as usize;
                    let d = plane.at(px, py) as i32 - plane.at(qx, qy) as i32;
                    row += (d * d) as u64;
                    integral[(iy + 1) * stride + ix + 1] = integral[iy * stride + ix + 1] + row;
                }
            }

            for oy in 0..band_h {
                let ny = (y0 + oy + plane.pad) as isize + dy;
                for ox in 0..w {
                    let (x1, y1) = (ox + span, oy + span);
                    let ssd = integral[y1 * stride + x1] + integral[oy * stride + ox]
                        - integral[oy * stride + x1]
                        - integral[y1 * stride + ox];
                    let Some(&weight) = weights.get(ssd as usize) else {
                        continue;
                    };
                    let nx = (ox + plane.pad) as isize + dx;
                    let neighbour = plane.at(nx as usize, ny as usize) as f32;
                    let i = oy * w + ox;
                    weight_sum[i] += weight;
                    value_sum[i] += weight * neighbour;
                }
            }
        }
    }

    for (i, out) in rows.iter_mut().enumerate() {
        // The zero offset always contributes weight 1.
        let v = value_sum[i] / weight_sum[i];
        *out = v.round().clamp(0.0, 255.0) as u8;
    }
}

// ═══════════════════════════════════════════════════════════
// Adaptive threshold
// ═══════════════════════════════════════════════════════════

/// Binarize against a Gaussian-weighted local mean: a pixel turns white when
/// it is brighter than `mean - offset`, black otherwise.
pub fn gaussian_adaptive_threshold(src: &GrayImage, block_size: u32, offset: f32) -> GrayImage {
    let block = normalize_block_size(block_size);
    let local_mean = gaussian_blur_f32(src, block_sigma(block));
    ImageBuffer::from_fn(src.width(), src.height(), |x, y| {
        let value = src.get_pixel(x, y)[0] as f32;
        let threshold = local_mean.get_pixel(x, y)[0] as f32 - offset;
        Luma([if value > threshold { 255 } else { 0 }])
    })
}

/// Block sizes must be odd and at least 3.
fn normalize_block_size(block_size: u32) -> u32 {
    let block = block_size.max(3);
    if block % 2 == 0 {
        block + 1
    } else {
        block
    }
}

/// Gaussian sigma matching a square block of the given size.
fn block_sigma(block: u32) -> f32 {
    0.3 * ((block as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn white_with_line(w: u32, h: u32, line_y: u32) -> GrayImage {
        ImageBuffer::from_fn(w, h, |_, y| {
            if y == line_y || y == line_y + 1 {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        })
    }

    fn write_png(dir: &Path, name: &str, image: &GrayImage) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut bytes = std::io::Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(image.clone())
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        std::fs::write(&path, bytes.into_inner()).unwrap();
        path
    }

    fn is_binary(image: &GrayImage) -> bool {
        image.pixels().all(|p| p[0] == 0 || p[0] == 255)
    }

    #[test]
    fn missing_file_yields_empty_raster() {
        let raster = ImagePreprocessor::default().preprocess_path(Path::new("/nonexistent/scan.png"));
        assert_eq!(raster.dimensions(), (0, 0));
    }

    #[test]
    fn garbage_file_yields_empty_raster() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, b"definitely not an image").unwrap();
        let raster = ImagePreprocessor::default().preprocess_path(&path);
        assert_eq!(raster.dimensions(), (0, 0));
    }

    #[test]
    fn valid_png_becomes_binary_raster_of_same_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "scan.png", &white_with_line(40, 30, 14));
        let raster = ImagePreprocessor::default().preprocess_path(&path);
        assert_eq!(raster.dimensions(), (40, 30));
        assert!(is_binary(&raster));
    }

    #[test]
    fn mislabelled_file_is_decoded_from_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "scan.jpg", &white_with_line(24, 24, 10));
        let raster = ImagePreprocessor::default().preprocess_path(&path);
        assert_eq!(raster.dimensions(), (24, 24));
    }

    #[test]
    fn color_input_becomes_single_channel() {
        let rgb = RgbImage::from_pixel(16, 12, Rgb([200, 30, 30]));
        let raster = ImagePreprocessor::default().preprocess(&DynamicImage::ImageRgb8(rgb));
        assert_eq!(raster.dimensions(), (16, 12));
        assert!(is_binary(&raster));
    }

    #[test]
    fn empty_image_passes_through() {
        let raster = ImagePreprocessor::default()
            .preprocess(&DynamicImage::ImageLuma8(GrayImage::new(0, 0)));
        assert_eq!(raster.dimensions(), (0, 0));
    }

    #[test]
    fn thin_strokes_stay_black_background_white() {
        let raster = ImagePreprocessor::default()
            .preprocess(&DynamicImage::ImageLuma8(white_with_line(40, 40, 20)));
        assert_eq!(raster.get_pixel(20, 20)[0], 0);
        assert_eq!(raster.get_pixel(5, 5)[0], 255);
    }

    #[test]
    fn uniform_image_thresholds_to_white() {
        let flat = GrayImage::from_pixel(20, 20, Luma([180]));
        let binary = gaussian_adaptive_threshold(&flat, 11, 2.0);
        assert!(binary.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn even_block_size_is_tolerated() {
        let flat = GrayImage::from_pixel(10, 10, Luma([90]));
        let binary = gaussian_adaptive_threshold(&flat, 4, 2.0);
        assert_eq!(binary.dimensions(), (10, 10));
        assert_eq!(normalize_block_size(4), 5);
        assert_eq!(normalize_block_size(1), 3);
    }

    #[test]
    fn block_eleven_uses_sigma_two() {
        assert!((block_sigma(11) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn denoise_keeps_uniform_image_uniform() {
        let flat = GrayImage::from_pixel(18, 14, Luma([128]));
        let out = non_local_means(&flat, &PreprocessConfig::default());
        assert!(out.pixels().all(|p| p[0] == 128));
    }

    #[test]
    fn denoise_pulls_outlier_toward_background() {
        let mut noisy = GrayImage::from_pixel(21, 21, Luma([128]));
        noisy.put_pixel(10, 10, Luma([140]));
        let out = non_local_means(&noisy, &PreprocessConfig::default());
        let v = out.get_pixel(10, 10)[0];
        assert!(v < 140 && v >= 128, "outlier should be smoothed, got {v}");
    }

    #[test]
    fn denoise_with_zero_strength_is_identity() {
        let mut img = GrayImage::from_pixel(8, 8, Luma([50]));
        img.put_pixel(3, 3, Luma([250]));
        let config = PreprocessConfig {
            denoise_strength: 0.0,
            ..PreprocessConfig::default()
        };
        assert_eq!(non_local_means(&img, &config), img);
    }

    #[test]
    fn denoise_matches_across_band_boundaries() {
        // Same vertical edge on every row: bands must agree row for row.
        let edge = ImageBuffer::from_fn(30, BAND_ROWS as u32 * 2 + 5, |x, _| {
            Luma([if x < 15 { 40u8 } else { 210 }])
        });
        let out = non_local_means(&edge, &PreprocessConfig::default());
        let first: Vec<u8> = (0..30).map(|x| out.get_pixel(x, 0)[0]).collect();
        for y in 1..out.height() {
            let row: Vec<u8> = (0..30).map(|x| out.get_pixel(x, y)[0]).collect();
            assert_eq!(row, first, "row {y} differs");
        }
    }

    #[test]
    fn weight_table_starts_at_one_and_decreases() {
        let table = weight_table(3.0, 3);
        assert_eq!(table[0], 1.0);
        assert!(table.windows(2).all(|w| w[1] <= w[0]));
        assert!(*table.last().unwrap() >= MIN_WEIGHT * 0.9);
    }

    #[test]
    fn page_sized_raster_preprocesses_within_budget() {
        // A4 rendered at 2x with a coarse text-like pattern.
        let page = ImageBuffer::from_fn(1190, 1684, |x, y| {
            Luma([if (x / 7 + y / 11) % 5 == 0 { 20u8 } else { 235 }])
        });
        let started = std::time::Instant::now();
        let out = ImagePreprocessor::default().preprocess(&DynamicImage::ImageLuma8(page));
        let elapsed = started.elapsed();
        assert_eq!(out.dimensions(), (1190, 1684));
        assert!(
            elapsed < std::time::Duration::from_secs(8),
            "A4 page at 2x took {elapsed:?}"
        );
    }

    #[test]
    fn guarded_swallows_panics() {
        let result: Option<u8> = guarded("test", || panic!("boom"));
        assert!(result.is_none());
        assert_eq!(guarded("test", || 7), Some(7));
    }
}
