// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan enhancement pipeline: perspective rectification, sharpening,
// grayscale conversion, and binarization of a detected document.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use scanwerk_core::error::Result;
use tracing::{debug, instrument};

use crate::geometry::{Quadrilateral, perspective_rectify};

/// Threshold giving the flat black-and-white "scanned" look.
pub const DEFAULT_SCAN_THRESHOLD: u8 = 128;

/// 3x3 sharpening kernel: centre 5, four neighbours -1, corners 0.
const SHARPEN_KERNEL: [[i32; 3]; 3] = [[0, -1, 0], [-1, 5, -1], [0, -1, 0]];

/// Turns a detected document region into a scan-quality page image.
///
/// Each method consumes `self` and returns the transformed enhancer, so the
/// usual pipeline reads as one chain:
///
/// ```ignore
/// let page = ScanEnhancer::rectify(&frame, &quad)?
///     .sharpen()
///     .grayscale()
///     .binarize(128)
///     .into_gray();
/// ```
pub struct ScanEnhancer {
    /// The working image.
    image: DynamicImage,
}

impl ScanEnhancer {
    // -- Construction ---------------------------------------------------------

    /// Warp the `quad` region of the full-resolution `frame` flat.
    #[instrument(skip_all)]
    pub fn rectify(frame: &RgbImage, quad: &Quadrilateral) -> Result<Self> {
        let warped = perspective_rectify(frame, quad)?;
        debug!(
            width = warped.width(),
            height = warped.height(),
            "Document rectified"
        );
        Ok(Self {
            image: DynamicImage::ImageRgb8(warped),
        })
    }

    /// Wrap an existing image.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the enhancer and return the image as single-channel luma.
    pub fn into_gray(self) -> GrayImage {
        match self.image {
            DynamicImage::ImageLuma8(gray) => gray,
            other => other.to_luma8(),
        }
    }

    // -- Pipeline steps -------------------------------------------------------

    /// Convolve with [`SHARPEN_KERNEL`]. Edge pixels reuse their nearest
    /// in-bounds neighbour.
    pub fn sharpen(self) -> Self {
        let image = match self.image {
            DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(sharpen_luma(&gray)),
            other => DynamicImage::ImageRgb8(sharpen_rgb(&other.to_rgb8())),
        };
        Self { image }
    }

    pub fn grayscale(self) -> Self {
        Self {
            image: DynamicImage::ImageLuma8(self.image.to_luma8()),
        }
    }

    /// Fixed-threshold binarization: values above `threshold` become white,
    /// everything else black.
    pub fn binarize(self, threshold: u8) -> Self {
        let gray = self.image.to_luma8();
        Self {
            image: DynamicImage::ImageLuma8(threshold_luma(&gray, threshold)),
        }
    }

    /// Run the standard page pipeline on a detected document.
    #[instrument(skip_all, fields(threshold))]
    pub fn scan_page(frame: &RgbImage, quad: &Quadrilateral, threshold: u8) -> Result<GrayImage> {
        Ok(Self::rectify(frame, quad)?
            .sharpen()
            .grayscale()
            .binarize(threshold)
            .into_gray())
    }
}

// -- Per-pixel helpers --------------------------------------------------------

fn clamped_offset(value: u32, delta: i32, len: u32) -> u32 {
    (value as i64 + delta as i64).clamp(0, len as i64 - 1) as u32
}

fn sharpen_rgb(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    ImageBuffer::from_fn(width, height, |x, y| {
        let mut acc = [0i32; 3];
        for (ky, row) in SHARPEN_KERNEL.iter().enumerate() {
            for (kx, &weight) in row.iter().enumerate() {
                if weight == 0 {
                    continue;
                }
                let sx = clamped_offset(x, kx as i32 - 1, width);
                let sy = clamped_offset(y, ky as i32 - 1, height);
                let Rgb(channels) = *image.get_pixel(sx, sy);
                for (sum, value) in acc.iter_mut().zip(channels) {
                    *sum += weight * value as i32;
                }
            }
        }
        Rgb(acc.map(|v| v.clamp(0, 255) as u8))
    })
}

fn sharpen_luma(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    ImageBuffer::from_fn(width, height, |x, y| {
        let mut acc = 0i32;
        for (ky, row) in SHARPEN_KERNEL.iter().enumerate() {
            for (kx, &weight) in row.iter().enumerate() {
                if weight == 0 {
                    continue;
                }
                let sx = clamped_offset(x, kx as i32 - 1, width);
                let sy = clamped_offset(y, ky as i32 - 1, height);
                acc += weight * image.get_pixel(sx, sy).0[0] as i32;
            }
        }
        Luma([acc.clamp(0, 255) as u8])
    })
}

/// Pixels strictly above `threshold` become 255, the rest 0.
pub fn threshold_luma(gray: &GrayImage, threshold: u8) -> GrayImage {
    let (width, height) = gray.dimensions();
    let mut output = GrayImage::new(width, height);
    for (x, y, pixel) in gray.enumerate_pixels() {
        let binary = if pixel.0[0] > threshold { 255u8 } else { 0u8 };
        output.put_pixel(x, y, Luma([binary]));
    }
    output
}

/// Binarize with a threshold chosen per image by Otsu's method.
pub fn binarize_otsu(gray: &GrayImage) -> GrayImage {
    let threshold = otsu_threshold(gray);
    debug!(threshold, "Otsu threshold computed");
    threshold_luma(gray, threshold)
}

/// Compute the Otsu threshold for a grayscale image.
///
/// Finds the level maximising the between-class variance of the dark and
/// light pixel groups. The returned level is the last value of the dark
/// class. An image with a single intensity has no split; its level is
/// returned so that nothing ends up above the threshold.
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total_pixels = gray.width() as u64 * gray.height() as u64;
    if total_pixels == 0 {
        return 128;
    }

    let mut sum_total: f64 = 0.0;
    for (i, &count) in histogram.iter().enumerate() {
        sum_total += i as f64 * count as f64;
    }

    let mut sum_background: f64 = 0.0;
    let mut weight_background: u64 = 0;
    let mut max_variance: f64 = 0.0;
    let mut best_threshold: Option<u8> = None;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total_pixels - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;

        let between_variance = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if between_variance > max_variance {
            max_variance = between_variance;
            best_threshold = Some(t as u8);
        }
    }

    best_threshold.unwrap_or_else(|| {
        histogram
            .iter()
            .rposition(|&count| count > 0)
            .unwrap_or(255) as u8
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::order_quadrilateral;
    use scanwerk_core::Point;

    #[test]
    fn sharpen_leaves_flat_regions_unchanged() {
        let img = RgbImage::from_pixel(8, 8, Rgb([90, 120, 200]));
        let out = ScanEnhancer::from_dynamic(DynamicImage::ImageRgb8(img)).sharpen();
        let rgb = out.as_dynamic().to_rgb8();
        assert!(rgb.pixels().all(|p| *p == Rgb([90, 120, 200])));
    }

    #[test]
    fn sharpen_boosts_an_isolated_bright_pixel() {
        let mut img = GrayImage::from_pixel(5, 5, Luma([40]));
        img.put_pixel(2, 2, Luma([60]));
        let out = ScanEnhancer::from_dynamic(DynamicImage::ImageLuma8(img))
            .sharpen()
            .into_gray();
        // 5*60 - 4*40 = 140
        assert_eq!(out.get_pixel(2, 2).0[0], 140);
        // 5*40 - 3*40 - 60 = 20
        assert_eq!(out.get_pixel(2, 1).0[0], 20);
    }

    #[test]
    fn fixed_threshold_is_strictly_greater() {
        let mut img = GrayImage::new(3, 1);
        img.put_pixel(0, 0, Luma([127]));
        img.put_pixel(1, 0, Luma([128]));
        img.put_pixel(2, 0, Luma([129]));
        let out = threshold_luma(&img, 128);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 0);
        assert_eq!(out.get_pixel(2, 0).0[0], 255);
    }

    #[test]
    fn otsu_splits_bimodal_image() {
        let mut img = GrayImage::from_pixel(20, 10, Luma([30]));
        for y in 0..10 {
            for x in 10..20 {
                img.put_pixel(x, y, Luma([220]));
            }
        }
        let t = otsu_threshold(&img);
        assert!((30..220).contains(&t), "threshold {t} outside the gap");

        let binary = binarize_otsu(&img);
        assert_eq!(binary.get_pixel(2, 2).0[0], 0);
        assert_eq!(binary.get_pixel(15, 2).0[0], 255);
    }

    #[test]
    fn otsu_on_uniform_image_selects_nothing() {
        let img = GrayImage::from_pixel(16, 16, Luma([200]));
        let binary = binarize_otsu(&img);
        assert!(binary.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn scan_page_produces_binary_page_of_quad_extent() {
        let mut frame = RgbImage::from_pixel(120, 100, Rgb([20, 20, 20]));
        for y in 20..80 {
            for x in 30..100 {
                frame.put_pixel(x, y, Rgb([230, 230, 230]));
            }
        }
        let quad = order_quadrilateral([
            Point::new(30.0, 20.0),
            Point::new(100.0, 20.0),
            Point::new(100.0, 80.0),
            Point::new(30.0, 80.0),
        ])
        .expect("valid quad");

        let page = ScanEnhancer::scan_page(&frame, &quad, DEFAULT_SCAN_THRESHOLD).expect("scan");
        assert_eq!(page.dimensions(), (70, 60));
        assert!(page.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(page.get_pixel(35, 30).0[0], 255);
    }
}
