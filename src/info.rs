use crate::constants::DEFAULT_MAX_DIMENSION;
use crate::error::{CompressionError, Result};
use crate::formats::InputFormat;
use crate::report::format_file_size;
use image::{ColorType, GenericImageView, ImageFormat, ImageReader};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub color: ColorType,
    /// Format detected from the file contents
    pub detected_format: Option<ImageFormat>,
    /// Format implied by the extension
    pub extension_format: Option<InputFormat>,
    pub file_size: u64,
    pub target_size: u64,
}

impl ImageInfo {
    /// File size at or below the target.
    pub fn within_target(&self) -> bool {
        self.file_size <= self.target_size
    }

    pub fn exceeds_dimension(&self, max_dimension: u32) -> bool {
        self.width.max(self.height) > max_dimension
    }

    pub fn megapixels(&self) -> f64 {
        (self.width as u64 * self.height as u64) as f64 / 1_000_000.0
    }

    /// Bytes needed to hold the decoded image.
    pub fn decoded_bytes(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.color.bytes_per_pixel() as u64
    }
}

pub fn inspect_image(input_path: &Path, target_size: u64) -> Result<ImageInfo> {
    if !input_path.exists() {
        return Err(CompressionError::FileNotFound(input_path.to_path_buf()));
    }

    let reader = ImageReader::open(input_path)?.with_guessed_format()?;
    let detected_format = reader.format();
    let img = reader.decode()?;
    let (width, height) = img.dimensions();

    Ok(ImageInfo {
        path: input_path.to_path_buf(),
        width,
        height,
        color: img.color(),
        detected_format,
        extension_format: InputFormat::from_path(input_path),
        file_size: fs::metadata(input_path)?.len(),
        target_size,
    })
}

pub fn format_image_info(info: &ImageInfo) -> String {
    let mut lines = vec![
        format!("📊 Analyzing image: {:?}", info.path),
        format!("  📏 Dimensions: {}x{} pixels ({:.2} MP)", info.width, info.height, info.megapixels()),
        format!("  🎨 Color type: {:?}", info.color),
        format!(
            "  🎭 Image format: {}",
            info.detected_format
                .map(|f| format!("{:?}", f))
                .unwrap_or_else(|| "unknown".to_string())
        ),
        format!(
            "  📦 File size: {} ({} bytes)",
            format_file_size(info.file_size),
            info.file_size
        ),
        format!("  🧠 Decoded size: {}", format_file_size(info.decoded_bytes())),
        format!("  🎯 Target: {}", format_file_size(info.target_size)),
    ];

    let is_jpeg = info.detected_format == Some(ImageFormat::Jpeg);
    let oversized = info.exceeds_dimension(DEFAULT_MAX_DIMENSION);
    if info.within_target() && is_jpeg && !oversized {
        lines.push("  ✅ Already within target; compress would leave it as is".to_string());
    } else if info.within_target() && is_jpeg {
        lines.push("  ✅ Within target, but compress would still resize and re-encode it".to_string());
    } else if info.within_target() {
        lines.push("  ✅ Within target; compress would still convert it to JPEG".to_string());
    } else {
        lines.push(format!(
            "  ⬇️  {:.1}x over target",
            info.file_size as f64 / info.target_size as f64
        ));
    }

    if oversized {
        lines.push(format!(
            "  📐 Long edge above {} px; compress resizes it by default",
            DEFAULT_MAX_DIMENSION
        ));
    }

    if let (Some(detected), Some(named)) = (info.detected_format, info.extension_format) {
        if !extension_matches(detected, named) {
            lines.push(format!(
                "  ⚠️  Extension says {} but contents are {:?}",
                named, detected
            ));
        }
    }

    lines.join("\n")
}

fn extension_matches(detected: ImageFormat, named: InputFormat) -> bool {
    matches!(
        (detected, named),
        (ImageFormat::Jpeg, InputFormat::Jpeg)
            | (ImageFormat::Png, InputFormat::Png)
            | (ImageFormat::WebP, InputFormat::WebP)
            | (ImageFormat::Bmp, InputFormat::Bmp)
            | (ImageFormat::Gif, InputFormat::Gif)
            | (ImageFormat::Tiff, InputFormat::Tiff)
    )
}

pub fn print_image_info(input_path: &Path, target_size: u64) -> Result<ImageInfo> {
    let info = inspect_image(input_path, target_size)?;
    crate::info!("{}", format_image_info(&info));
    Ok(info)
}
