//! Test images built in memory

use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// A small RGBA PNG, the kind of file users usually point `--infile` at.
pub fn sample_png() -> Vec<u8> {
    let img = RgbaImage::from_fn(16, 16, |x, y| {
        image::Rgba([(x * 16) as u8, (y * 16) as u8, 128, 255])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Bytes covering every value, including non-ASCII, for payload checks.
pub fn all_bytes() -> Vec<u8> {
    (0..=255u8).collect()
}

pub fn write_sample_png(dir: &Path) -> PathBuf {
    let path = dir.join("cats-image.png");
    std::fs::write(&path, sample_png()).unwrap();
    path
}
