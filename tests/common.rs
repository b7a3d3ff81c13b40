#![allow(dead_code)]

use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Noisy gradient; compresses poorly so quality actually matters.
pub fn textured_image(width: u32, height: u32) -> RgbImage {
    let mut state: u32 = 0x9E37_79B9;
    RgbImage::from_fn(width, height, |x, y| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let noise = (state & 0x3F) as u8;
        Rgb([
            ((x * 255 / width.max(1)) as u8).wrapping_add(noise),
            ((y * 255 / height.max(1)) as u8).wrapping_add(noise / 2),
            (((x + y) % 256) as u8) ^ noise,
        ])
    })
}

pub fn write_image(path: &Path, width: u32, height: u32, format: ImageFormat) -> PathBuf {
    textured_image(width, height)
        .save_with_format(path, format)
        .unwrap();
    path.to_path_buf()
}

pub fn write_transparent_png(path: &Path, width: u32, height: u32) -> PathBuf {
    RgbaImage::from_fn(width, height, |x, _| Rgba([200, 10, 10, (x % 256) as u8]))
        .save_with_format(path, ImageFormat::Png)
        .unwrap();
    path.to_path_buf()
}

/// A mixed folder: two images at the top, one nested, one hidden, one
/// text file and one file with an image extension but garbage contents.
pub fn create_photo_tree(root: &Path) -> Vec<PathBuf> {
    let nested = root.join("nested");
    let hidden = root.join(".thumbs");
    fs::create_dir_all(&nested).unwrap();
    fs::create_dir_all(&hidden).unwrap();

    let files = vec![
        write_image(&root.join("large.png"), 900, 700, ImageFormat::Png),
        write_image(&root.join("small.jpg"), 64, 64, ImageFormat::Jpeg),
        write_image(&nested.join("inner.png"), 300, 200, ImageFormat::Png),
    ];
    write_image(&hidden.join("thumb.png"), 32, 32, ImageFormat::Png);
    fs::write(root.join("notes.txt"), b"not an image").unwrap();
    fs::write(root.join("broken.jpg"), b"definitely not a jpeg").unwrap();
    files
}

pub fn create_temp_directory() -> TempDir {
    TempDir::new().unwrap()
}

pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).unwrap().len()
}
