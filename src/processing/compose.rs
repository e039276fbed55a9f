//! Assembles the shots of a session into the final printable picture.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};

use super::layout::{center_offset, resize_to_contain};
use crate::error::{BoothError, Result};

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const JPEG_QUALITY: u8 = 92;

/// Columns and rows used to lay out `count` shots.
///
/// One shot fills the picture, two are stacked, more go on a near-square
/// grid filled row by row.
pub fn grid_for(count: usize) -> (u32, u32) {
    match count {
        0 | 1 => (1, 1),
        2 => (1, 2),
        n => {
            let cols = (n as f64).sqrt().ceil() as u32;
            let rows = (n as u32).div_ceil(cols);
            (cols, rows)
        }
    }
}

/// Gap between cells and around the edge for a cell `cell_w` wide.
pub fn margin_for(cell_w: u32) -> u32 {
    (cell_w / 50).max(2)
}

/// Tile `frames` on a white canvas. Every cell takes the size of the first
/// frame; other frames are scaled to fit it.
pub fn compose(frames: &[DynamicImage]) -> Result<RgbImage> {
    let first = frames.first().ok_or(BoothError::NoCapture)?;
    let (cell_w, cell_h) = (first.width().max(1), first.height().max(1));
    if frames.len() == 1 {
        return Ok(first.to_rgb8());
    }

    let (cols, rows) = grid_for(frames.len());
    let margin = margin_for(cell_w);
    let width = cols * cell_w + (cols + 1) * margin;
    let height = rows * cell_h + (rows + 1) * margin;
    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);

    for (idx, frame) in frames.iter().enumerate() {
        let (col, row) = (idx as u32 % cols, idx as u32 / cols);
        let (w, h) = resize_to_contain(
            cell_w,
            cell_h,
            frame.width(),
            frame.height(),
            cell_w.max(cell_h),
        );
        let cell = if (w, h) == (frame.width(), frame.height()) {
            frame.to_rgb8()
        } else {
            imageops::resize(&frame.to_rgb8(), w, h, FilterType::Triangle)
        };
        let (ox, oy) = center_offset(w, h, cell_w, cell_h);
        let x = margin + col * (cell_w + margin) + ox;
        let y = margin + row * (cell_h + margin) + oy;
        imageops::overlay(&mut canvas, &cell, x as i64, y as i64);
    }
    Ok(canvas)
}

/// Write `image` as a JPEG, creating the parent directory if needed.
pub fn save_jpeg(image: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode_image(image)?;
    writer.flush()?;
    Ok(())
}
