use crate::constants::{
    DEFAULT_MAX_DIMENSION, DEFAULT_MAX_QUALITY, DEFAULT_MIN_QUALITY, DEFAULT_TARGET_SIZE,
    MAX_ATTEMPTS, MAX_FILE_SIZE, MAX_IMAGE_DIMENSION, MAX_QUALITY, MIN_DIMENSION, MIN_QUALITY,
    RESIZE_STEP,
};
use crate::error::{CompressionError, Result};
use crate::job::{CompressionResult, Job, Outcome};
use crate::output;
use crate::search::{search_quality, SearchParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageReader, Rgb, RgbImage};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOptions {
    /// Target size in bytes
    pub target_size: u64,
    pub min_quality: u8,
    pub max_quality: u8,
    /// Keep shrinking by `RESIZE_STEP` while the target is out of reach
    pub auto_resize: bool,
    /// Long-edge limit applied before compressing
    pub max_dimension: Option<u32>,
    pub backup: bool,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            target_size: DEFAULT_TARGET_SIZE,
            min_quality: DEFAULT_MIN_QUALITY,
            max_quality: DEFAULT_MAX_QUALITY,
            auto_resize: true,
            max_dimension: Some(DEFAULT_MAX_DIMENSION),
            backup: false,
        }
    }
}

impl CompressionOptions {
    pub fn new(
        target_size: Option<u64>,
        min_quality: Option<u8>,
        max_quality: Option<u8>,
    ) -> Result<Self> {
        let target_size = target_size.unwrap_or(DEFAULT_TARGET_SIZE);
        if target_size == 0 {
            return Err(CompressionError::InvalidTargetSize(
                "target size must be greater than zero".to_string(),
            ));
        }

        let min_quality = min_quality.unwrap_or(DEFAULT_MIN_QUALITY);
        let max_quality = max_quality.unwrap_or(DEFAULT_MAX_QUALITY);
        for quality in [min_quality, max_quality] {
            if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
                return Err(CompressionError::InvalidQuality(quality));
            }
        }
        if min_quality > max_quality {
            return Err(CompressionError::InvalidQualityRange(min_quality, max_quality));
        }

        Ok(Self {
            target_size,
            min_quality,
            max_quality,
            ..Self::default()
        })
    }

    pub fn with_auto_resize(mut self, auto_resize: bool) -> Self {
        self.auto_resize = auto_resize;
        self
    }

    /// `Some(0)` disables the limit.
    pub fn with_max_dimension(mut self, max_dimension: Option<u32>) -> Self {
        self.max_dimension = max_dimension.filter(|&d| d > 0);
        self
    }

    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    pub fn search_params(&self) -> SearchParams {
        SearchParams::new(self.target_size, self.min_quality, self.max_quality)
    }
}

/// Loads an image file and returns it along with its size in bytes.
///
/// # Security Features
/// - Enforces maximum file size limit before decoding
/// - Validates image dimensions to prevent memory exhaustion
/// - Detects the format from content, not just the extension
pub fn load_image_with_metadata(input_path: &Path) -> Result<(DynamicImage, u64)> {
    if !input_path.exists() {
        return Err(CompressionError::FileNotFound(input_path.to_path_buf()));
    }

    let file_size = fs::metadata(input_path)?.len();
    if file_size > MAX_FILE_SIZE {
        return Err(CompressionError::FileTooLarge(file_size, MAX_FILE_SIZE));
    }

    let img = ImageReader::open(input_path)?
        .with_guessed_format()?
        .decode()?;

    let (width, height) = img.dimensions();
    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(CompressionError::InvalidDimensions(
            width,
            height,
            MAX_IMAGE_DIMENSION,
        ));
    }

    Ok((img, file_size))
}

/// Convert any color type to 8-bit RGB, compositing alpha over white.
pub fn flatten_to_rgb(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut flat = RgbImage::new(width, height);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        flat.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    flat
}

/// Downscale so the long edge is at most `max_dimension`.
///
/// Returns whether the image was resized.
pub fn limit_dimension(img: &mut RgbImage, max_dimension: u32) -> bool {
    let (width, height) = img.dimensions();
    let long_edge = width.max(height);
    if max_dimension == 0 || long_edge <= max_dimension {
        return false;
    }

    let ratio = max_dimension as f64 / long_edge as f64;
    let new_width = ((width as f64 * ratio).round() as u32).clamp(1, max_dimension);
    let new_height = ((height as f64 * ratio).round() as u32).clamp(1, max_dimension);
    *img = imageops::resize(img, new_width, new_height, FilterType::Lanczos3);
    crate::verbose!("Resized {}x{} -> {}x{}", width, height, new_width, new_height);
    true
}

/// Scale both edges by `factor`; `None` once either edge would fall below
/// `MIN_DIMENSION`.
pub fn shrink(img: &RgbImage, factor: f64) -> Option<RgbImage> {
    let (width, height) = img.dimensions();
    let new_width = (width as f64 * factor) as u32;
    let new_height = (height as f64 * factor) as u32;
    if new_width < MIN_DIMENSION || new_height < MIN_DIMENSION {
        return None;
    }
    Some(imageops::resize(img, new_width, new_height, FilterType::Lanczos3))
}

pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        encoder.encode_image(img)?;
    }
    Ok(buffer)
}

#[derive(Debug, Clone)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    pub quality: u8,
    pub width: u32,
    pub height: u32,
    /// Search rounds run, one per size tried
    pub attempts: u32,
    pub within_target: bool,
}

impl Compressed {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Search for a quality that meets the target; with auto-resize on, shrink
/// and search again until it does or the attempt / size floor is reached.
pub fn compress_to_target(img: RgbImage, options: &CompressionOptions) -> Result<Compressed> {
    let params = options.search_params();
    let mut current = img;
    let mut attempts = 0;

    loop {
        attempts += 1;
        let outcome = search_quality(&params, |quality| encode_jpeg(&current, quality))?;
        let (width, height) = current.dimensions();
        crate::verbose!(
            "Attempt {}: {}x{} at quality {} -> {} bytes",
            attempts,
            width,
            height,
            outcome.quality,
            outcome.size()
        );

        let finished = outcome.within_target || !options.auto_resize || attempts >= MAX_ATTEMPTS;
        let smaller = if finished {
            None
        } else {
            shrink(&current, RESIZE_STEP)
        };

        match smaller {
            Some(next) => {
                crate::verbose!("Shrinking to {}x{}", next.width(), next.height());
                current = next;
            }
            None => {
                if !finished {
                    crate::verbose!("Reached minimum size at {}x{}", width, height);
                }
                return Ok(Compressed {
                    bytes: outcome.bytes,
                    quality: outcome.quality,
                    width,
                    height,
                    attempts,
                    within_target: outcome.within_target,
                });
            }
        }
    }
}

/// Full per-file pipeline. Never fails: errors become `Outcome::Failed`.
pub fn process_job(job: &Job) -> CompressionResult {
    match run_job(job) {
        Ok(result) => result,
        Err(e) => CompressionResult::failed(job, e.to_string()),
    }
}

fn run_job(job: &Job) -> Result<CompressionResult> {
    let options = &job.options;

    output::clear_readonly(&job.source)?;
    let (img, original_size) = load_image_with_metadata(&job.source)?;
    let mut rgb = flatten_to_rgb(&img);
    drop(img);

    let resized = options
        .max_dimension
        .map_or(false, |max| limit_dimension(&mut rgb, max));

    let untouched = |outcome: Outcome, dimensions: (u32, u32)| -> Result<CompressionResult> {
        let final_size = if job.in_place {
            original_size
        } else {
            output::copy_to_output(&job.source, &job.output)?
        };
        Ok(CompressionResult {
            index: job.index,
            source: job.source.clone(),
            output: if job.in_place {
                job.source.clone()
            } else {
                job.output.clone()
            },
            original_size,
            final_size,
            final_quality: None,
            dimensions: Some(dimensions),
            attempts: 0,
            outcome,
        })
    };

    // A JPEG that already fits is left alone.
    let keeps_jpeg = job.format.is_jpeg() && !resized;
    if keeps_jpeg && original_size <= options.target_size {
        return untouched(Outcome::AlreadyWithinTarget, rgb.dimensions());
    }

    let dimensions = rgb.dimensions();
    let compressed = compress_to_target(rgb, options)?;
    if keeps_jpeg && compressed.size() >= original_size {
        return untouched(Outcome::NoGain, dimensions);
    }

    if job.in_place && options.backup {
        output::backup_original(&job.source);
    }

    let permissions = fs::metadata(&job.source)?.permissions();
    let final_size = output::write_atomically(&job.output, &compressed.bytes, Some(permissions))?;

    if job.in_place && job.output != job.source {
        if let Err(e) = output::remove_with_retry(&job.source) {
            crate::warn!("Could not remove original {:?}: {}", job.source, e);
        }
    }

    Ok(CompressionResult {
        index: job.index,
        source: job.source.clone(),
        output: job.output.clone(),
        original_size,
        final_size,
        final_quality: Some(compressed.quality),
        dimensions: Some((compressed.width, compressed.height)),
        attempts: compressed.attempts,
        outcome: if compressed.within_target {
            Outcome::Compressed
        } else {
            Outcome::BestEffort
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::InputFormat;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Gradient with deterministic noise so JPEG size depends on quality.
    fn textured(width: u32, height: u32) -> RgbImage {
        let mut state: u32 = 0x2545_f491;
        RgbImage::from_fn(width, height, |x, y| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let noise = (state % 64) as u8;
            Rgb([
                ((x * 255) / width.max(1)) as u8 ^ noise,
                ((y * 255) / height.max(1)) as u8,
                noise.wrapping_mul(3),
            ])
        })
    }

    fn job_for(source: PathBuf, output: PathBuf, options: CompressionOptions, in_place: bool) -> Job {
        let format = InputFormat::from_path(&source).unwrap();
        Job {
            index: 0,
            source,
            output,
            format,
            options,
            in_place,
        }
    }

    #[test]
    fn test_compression_options_default() {
        let options = CompressionOptions::new(None, None, None).unwrap();
        assert_eq!(options.target_size, 100 * 1024);
        assert_eq!(options.min_quality, 10);
        assert_eq!(options.max_quality, 95);
        assert!(options.auto_resize);
        assert_eq!(options.max_dimension, Some(1080));
        assert!(!options.backup);
    }

    #[test]
    fn test_compression_options_invalid() {
        assert!(matches!(
            CompressionOptions::new(Some(0), None, None),
            Err(CompressionError::InvalidTargetSize(_))
        ));
        assert!(matches!(
            CompressionOptions::new(None, Some(0), None),
            Err(CompressionError::InvalidQuality(0))
        ));
        assert!(matches!(
            CompressionOptions::new(None, None, Some(101)),
            Err(CompressionError::InvalidQuality(101))
        ));
        assert!(matches!(
            CompressionOptions::new(None, Some(80), Some(40)),
            Err(CompressionError::InvalidQualityRange(80, 40))
        ));
    }

    #[test]
    fn test_max_dimension_zero_disables() {
        let options = CompressionOptions::default().with_max_dimension(Some(0));
        assert_eq!(options.max_dimension, None);
    }

    #[test]
    fn test_flatten_composites_over_white() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
        let flat = flatten_to_rgb(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(flat.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(flat.get_pixel(1, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_flatten_half_transparent_black_is_grey() {
        let rgba = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 128]));
        let flat = flatten_to_rgb(&DynamicImage::ImageRgba8(rgba));
        let Rgb([r, g, b]) = *flat.get_pixel(0, 0);
        assert_eq!((r, g, b), (127, 127, 127));
    }

    #[test]
    fn test_flatten_grayscale() {
        let gray = DynamicImage::new_luma8(3, 2);
        assert_eq!(flatten_to_rgb(&gray).dimensions(), (3, 2));
    }

    #[test]
    fn test_limit_dimension_landscape() {
        let mut img = RgbImage::new(2000, 1500);
        assert!(limit_dimension(&mut img, 1000));
        assert_eq!(img.dimensions(), (1000, 750));
    }

    #[test]
    fn test_limit_dimension_portrait() {
        let mut img = RgbImage::new(600, 1200);
        assert!(limit_dimension(&mut img, 300));
        assert_eq!(img.dimensions(), (150, 300));
    }

    #[test]
    fn test_limit_dimension_no_change() {
        let mut img = RgbImage::new(800, 600);
        assert!(!limit_dimension(&mut img, 800));
        assert!(!limit_dimension(&mut img, 0));
        assert_eq!(img.dimensions(), (800, 600));
    }

    #[test]
    fn test_shrink_stops_at_minimum() {
        let img = RgbImage::new(100, 60);
        let smaller = shrink(&img, 0.9).unwrap();
        assert_eq!(smaller.dimensions(), (90, 54));
        assert!(shrink(&RgbImage::new(100, 55), 0.9).is_none());
    }

    #[test]
    fn test_encode_jpeg_quality_affects_size() {
        let img = textured(128, 128);
        let low = encode_jpeg(&img, 10).unwrap();
        let high = encode_jpeg(&img, 95).unwrap();
        assert!(low.len() < high.len());
        assert_eq!(&low[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_compress_to_target_hits_reachable_target() {
        let img = textured(256, 192);
        let smallest = encode_jpeg(&img, 10).unwrap().len() as u64;
        let largest = encode_jpeg(&img, 95).unwrap().len() as u64;
        let target = (smallest + largest) / 2;

        let options = CompressionOptions::new(Some(target), None, None).unwrap();
        let compressed = compress_to_target(img, &options).unwrap();
        assert!(compressed.size() <= target);
        assert!(compressed.within_target);
        assert_eq!(compressed.attempts, 1);
        assert_eq!((compressed.width, compressed.height), (256, 192));
    }

    #[test]
    fn test_compress_to_target_shrinks_when_needed() {
        let img = textured(400, 300);
        let options = CompressionOptions::new(Some(1), None, None).unwrap();
        let compressed = compress_to_target(img, &options).unwrap();
        assert!(!compressed.within_target);
        assert_eq!(compressed.attempts, MAX_ATTEMPTS);
        assert!(compressed.width < 400);
        assert_eq!(compressed.quality, 10);
    }

    #[test]
    fn test_compress_to_target_without_auto_resize() {
        let img = textured(200, 150);
        let options = CompressionOptions::new(Some(1), None, None)
            .unwrap()
            .with_auto_resize(false);
        let compressed = compress_to_target(img, &options).unwrap();
        assert_eq!(compressed.attempts, 1);
        assert_eq!((compressed.width, compressed.height), (200, 150));
    }

    #[test]
    fn test_load_image_with_metadata_not_found() {
        let result = load_image_with_metadata(Path::new("nonexistent.jpg"));
        assert!(matches!(result, Err(CompressionError::FileNotFound(_))));
    }

    #[test]
    fn test_process_job_png_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("shot.png");
        textured(300, 200).save_with_format(&source, ImageFormat::Png).unwrap();

        let output = temp_dir.path().join("shot.jpg");
        let options = CompressionOptions::new(Some(1024 * 1024), None, None)
            .unwrap()
            .with_backup(true);
        let result = process_job(&job_for(source.clone(), output.clone(), options, true));

        assert_eq!(result.outcome, Outcome::Compressed);
        assert_eq!(result.final_quality, Some(95));
        assert!(output.exists());
        assert!(!source.exists());
        assert!(output::backup_path(&source).exists());
        assert_eq!(result.final_size, fs::metadata(&output).unwrap().len());
        assert_eq!(image::open(&output).unwrap().dimensions(), (300, 200));
    }

    #[test]
    fn test_process_job_small_jpeg_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("small.jpg");
        fs::write(&source, encode_jpeg(&textured(64, 64), 80).unwrap()).unwrap();
        let before = fs::read(&source).unwrap();

        let options = CompressionOptions::default();
        let result = process_job(&job_for(source.clone(), source.clone(), options, true));

        assert_eq!(result.outcome, Outcome::AlreadyWithinTarget);
        assert_eq!(result.final_size, before.len() as u64);
        assert_eq!(fs::read(&source).unwrap(), before);
    }

    #[test]
    fn test_process_job_output_dir_aliasing_source_dir() {
        let temp_dir = TempDir::new().unwrap();
        let photos = temp_dir.path().join("photos");
        fs::create_dir_all(temp_dir.path().join("sub")).unwrap();
        fs::create_dir_all(&photos).unwrap();
        let source = photos.join("small.jpg");
        fs::write(&source, encode_jpeg(&textured(64, 64), 80).unwrap()).unwrap();
        let before = fs::read(&source).unwrap();

        let output = temp_dir.path().join("sub/../photos/small.jpg");
        let options = CompressionOptions::default();
        let result = process_job(&job_for(source.clone(), output, options, false));

        assert_eq!(result.outcome, Outcome::AlreadyWithinTarget);
        assert_eq!(result.final_size, before.len() as u64);
        assert_eq!(fs::read(&source).unwrap(), before);
    }

    #[test]
    fn test_process_job_jpeg_that_would_grow_is_kept() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("crushed.jpg");
        fs::write(&source, encode_jpeg(&textured(320, 240), 5).unwrap()).unwrap();
        let before = fs::read(&source).unwrap();

        // Nothing can reach one byte; the only candidate is a q95 re-encode.
        let options = CompressionOptions::new(Some(1), Some(95), Some(95))
            .unwrap()
            .with_auto_resize(false)
            .with_backup(true);
        let result = process_job(&job_for(source.clone(), source.clone(), options, true));

        assert_eq!(result.outcome, Outcome::NoGain);
        assert_eq!(result.final_quality, None);
        assert_eq!(result.final_size, before.len() as u64);
        assert_eq!(fs::read(&source).unwrap(), before);
        assert!(!output::backup_path(&source).exists());
    }

    #[test]
    fn test_process_job_output_dir_keeps_source() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("wide.bmp");
        textured(1600, 400).save_with_format(&source, ImageFormat::Bmp).unwrap();
        let output = temp_dir.path().join("out/wide.jpg");

        let options = CompressionOptions::default().with_max_dimension(Some(800));
        let result = process_job(&job_for(source.clone(), output.clone(), options, false));

        assert!(result.is_success());
        assert!(source.exists());
        assert!(output.exists());
        let (w, h) = image::open(&output).unwrap().dimensions();
        assert!(w <= 800 && h <= 200);
    }

    #[test]
    fn test_process_job_corrupt_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("broken.png");
        fs::write(&source, b"not really a png").unwrap();

        let result = process_job(&job_for(
            source.clone(),
            temp_dir.path().join("broken.jpg"),
            CompressionOptions::default(),
            true,
        ));
        assert!(!result.is_success());
        assert!(source.exists());
    }
}
