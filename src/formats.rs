//! Input format detection.
//!
//! Every input is normalized to baseline JPEG on output, so only the input
//! side needs a real format type.

use crate::constants::{BACKUP_SUFFIX, SUPPORTED_IMAGE_EXTENSIONS};
use crate::error::{CompressionError, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Image formats accepted as batch input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InputFormat {
    Jpeg,
    Png,
    WebP,
    Bmp,
    Gif,
    Tiff,
}

impl InputFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(InputFormat::Jpeg),
            "png" => Some(InputFormat::Png),
            "webp" => Some(InputFormat::WebP),
            "bmp" => Some(InputFormat::Bmp),
            "gif" => Some(InputFormat::Gif),
            "tiff" | "tif" => Some(InputFormat::Tiff),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            InputFormat::Jpeg => "jpg",
            InputFormat::Png => "png",
            InputFormat::WebP => "webp",
            InputFormat::Bmp => "bmp",
            InputFormat::Gif => "gif",
            InputFormat::Tiff => "tiff",
        }
    }

    pub fn is_jpeg(&self) -> bool {
        matches!(self, InputFormat::Jpeg)
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputFormat::Jpeg => "JPEG",
            InputFormat::Png => "PNG",
            InputFormat::WebP => "WebP",
            InputFormat::Bmp => "BMP",
            InputFormat::Gif => "GIF",
            InputFormat::Tiff => "TIFF",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for InputFormat {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s).ok_or_else(|| CompressionError::UnsupportedFormat(s.to_string()))
    }
}

/// Check whether a path names a supported, non-hidden image file.
///
/// Backups written next to originals (`photo.png.bak`) never match.
pub fn is_image_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .map_or(true, |name| name.starts_with('.'));
    if hidden {
        return false;
    }

    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext_lower = ext.to_lowercase();
            ext_lower != BACKUP_SUFFIX && SUPPORTED_IMAGE_EXTENSIONS.contains(&ext_lower.as_str())
        })
        .unwrap_or(false)
}
