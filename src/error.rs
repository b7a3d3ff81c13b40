use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    ImageProcessing(#[from] image::ImageError),

    #[error("Invalid quality value: {0}. Must be between 1 and 100")]
    InvalidQuality(u8),

    #[error("Invalid quality range: minimum {0} is above maximum {1}")]
    InvalidQualityRange(u8, u8),

    #[error("Invalid target size: {0}")]
    InvalidTargetSize(String),

    #[error("Invalid worker count: {0}. Must be between {1} and {2}")]
    InvalidWorkerCount(usize, usize, usize),

    #[error("Invalid image dimensions: {0}x{1}. Maximum allowed: {2}x{2}")]
    InvalidDimensions(u32, u32, u32),

    #[error("File too large: {0} bytes. Maximum allowed: {1} bytes")]
    FileTooLarge(u64, u64),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Permission denied and could not be cleared: {0}")]
    PermissionDenied(PathBuf),

    #[error("Failed to create output directory: {0}")]
    DirectoryCreationFailed(PathBuf),

    #[error("No image files found in input path: {0}")]
    NoImageFilesFound(String),

    #[error("Encoding failed at every quality between {0} and {1}")]
    EncodingFailed(u8, u8),

    #[error("Failed to replace {0} after {1} attempts: {2}")]
    ReplaceFailed(PathBuf, u32, String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Walkdir error: {0}")]
    WalkdirError(#[from] walkdir::Error),

    #[error("Invalid glob pattern: {0}")]
    GlobPattern(#[from] glob::PatternError),
}

pub type Result<T> = std::result::Result<T, CompressionError>;
