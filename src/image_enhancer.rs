//! Image Enhancer
//!
//! Fixed-order pipeline of four scalar adjustments: brightness, contrast,
//! saturation, sharpness. Each stage blends the input against a degenerate
//! image (`out = degenerate + (input - degenerate) * factor`), so 1.0 is the
//! identity, values below 1.0 reduce the attribute and values above 1.0
//! amplify it (unbounded, channel values clamped to [0, 255]).

use image::{DynamicImage, RgbaImage};
use rayon::prelude::*;

use crate::collage_types::{CollageError, CollageResult};

/// Applies the enhancement pipeline and returns a new image of identical
/// dimensions. The stage order is brightness, contrast, saturation,
/// sharpness; later stages see the output of earlier ones, so the order is
/// part of the contract. The alpha channel passes through untouched.
///
/// Factors must be positive and finite; anything else is rejected.
pub fn enhance(
    image: &DynamicImage,
    brightness: f32,
    contrast: f32,
    saturation: f32,
    sharpness: f32,
) -> CollageResult<DynamicImage> {
    let factors = [
        ("brightness", brightness),
        ("contrast", contrast),
        ("saturation", saturation),
        ("sharpness", sharpness),
    ];
    for (name, factor) in factors {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(CollageError::InvalidEnhancement(format!(
                "{} must be a positive number, got {}",
                name, factor
            )));
        }
    }

    let mut rgba = image.to_rgba8();

    if brightness != 1.0 {
        adjust_brightness(&mut rgba, brightness);
    }
    if contrast != 1.0 {
        adjust_contrast(&mut rgba, contrast);
    }
    if saturation != 1.0 {
        adjust_saturation(&mut rgba, saturation);
    }
    if sharpness != 1.0 {
        adjust_sharpness(&mut rgba, sharpness);
    }

    Ok(DynamicImage::ImageRgba8(rgba))
}

/// ITU-R 601-2 luma, integer-truncated.
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}

fn blend(degenerate: f32, value: f32, factor: f32) -> u8 {
    (degenerate + (value - degenerate) * factor)
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Degenerate: black.
fn adjust_brightness(image: &mut RgbaImage, factor: f32) {
    image.par_chunks_mut(4).for_each(|px| {
        for channel in &mut px[..3] {
            *channel = blend(0.0, *channel as f32, factor);
        }
    });
}

/// Degenerate: uniform gray at the rounded mean luma of the whole image
/// (every pixel counts, transparent ones included).
fn adjust_contrast(image: &mut RgbaImage, factor: f32) {
    let pixel_count = image.width() as u64 * image.height() as u64;
    if pixel_count == 0 {
        return;
    }

    let luma_sum: u64 = image
        .par_chunks(4)
        .map(|px| luma(px[0], px[1], px[2]) as u64)
        .sum();
    let mean = (luma_sum as f64 / pixel_count as f64 + 0.5).floor() as f32;

    image.par_chunks_mut(4).for_each(|px| {
        for channel in &mut px[..3] {
            *channel = blend(mean, *channel as f32, factor);
        }
    });
}

/// Degenerate: the pixel's own grayscale value.
fn adjust_saturation(image: &mut RgbaImage, factor: f32) {
    image.par_chunks_mut(4).for_each(|px| {
        let gray = luma(px[0], px[1], px[2]) as f32;
        for channel in &mut px[..3] {
            *channel = blend(gray, *channel as f32, factor);
        }
    });
}

/// Degenerate: the image under a 3x3 smoothing kernel
/// [[1,1,1],[1,5,1],[1,1,1]]/13, border pixels copied unchanged. Images
/// smaller than 3x3 have no interior and pass through as-is.
fn adjust_sharpness(image: &mut RgbaImage, factor: f32) {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 {
        return;
    }

    let stride = width as usize * 4;
    let smoothed = smooth(image.as_raw(), width, height);

    image
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let smooth_row = &smoothed[y * stride..(y + 1) * stride];
            for x in 0..width as usize {
                let pi = x * 4;
                for c in 0..3 {
                    row[pi + c] = blend(smooth_row[pi + c] as f32, row[pi + c] as f32, factor);
                }
            }
        });
}

fn smooth(src: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let stride = w * 4;

    let mut out = src.to_vec();
    out.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        if y == 0 || y == h - 1 {
            return;
        }
        let above = &src[(y - 1) * stride..y * stride];
        let center = &src[y * stride..(y + 1) * stride];
        let below = &src[(y + 1) * stride..(y + 2) * stride];

        for x in 1..w - 1 {
            let pi = x * 4;
            for c in 0..3 {
                let sum = above[pi - 4 + c] as u32
                    + above[pi + c] as u32
                    + above[pi + 4 + c] as u32
                    + center[pi - 4 + c] as u32
                    + center[pi + c] as u32 * 5
                    + center[pi + 4 + c] as u32
                    + below[pi - 4 + c] as u32
                    + below[pi + c] as u32
                    + below[pi + 4 + c] as u32;
                row[pi + c] = (sum as f32 / 13.0).round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    out
}
