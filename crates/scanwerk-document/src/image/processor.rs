// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: intensity normalisation, preview scaling, and camera-frame
// annotation. Operates on in-memory images using the `image` and `imageproc`
// crates.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::Region;
use tracing::{debug, info, instrument};

use crate::geometry::Quadrilateral;

/// Outline colour of the detection region in the annotated preview.
pub const ROI_COLOUR: Rgb<u8> = Rgb([0, 0, 255]);

/// Outline colour of the detected document in the annotated preview.
pub const CONTOUR_COLOUR: Rgb<u8> = Rgb([0, 255, 0]);

/// Image processing pipeline operating on a single in-memory image.
///
/// Each method consumes `self` and returns a new `ImageProcessor`, enabling
/// method chaining:
///
/// ```ignore
/// let preview = ImageProcessor::from_rgb(frame)
///     .annotate(roi, Some(&quad))
///     .fit_within(1300, 1080)
///     .into_rgb();
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let img = image::open(path.as_ref()).map_err(|err| {
            ScanwerkError::ImageError(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        debug!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn from_rgb(image: RgbImage) -> Self {
        Self {
            image: DynamicImage::ImageRgb8(image),
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Consume the processor and return the image as 8-bit RGB.
    pub fn into_rgb(self) -> RgbImage {
        match self.image {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => other.to_rgb8(),
        }
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Stretch intensities linearly so the darkest sample maps to 0 and the
    /// brightest to 255. One min/max pair is shared by all channels. A
    /// single-intensity image becomes all zeros.
    pub fn normalize_minmax(self) -> Self {
        let mut rgb = self.into_rgb();
        let (lo, hi) = rgb
            .as_raw()
            .iter()
            .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));

        if lo > hi {
            return Self::from_rgb(rgb);
        }
        if lo == hi {
            rgb.iter_mut().for_each(|v| *v = 0);
            return Self::from_rgb(rgb);
        }
        if lo == 0 && hi == 255 {
            return Self::from_rgb(rgb);
        }

        let scale = 255.0 / (hi - lo) as f32;
        let mut lut = [0u8; 256];
        for (value, slot) in lut.iter_mut().enumerate().skip(lo as usize).take((hi - lo) as usize + 1) {
            *slot = ((value as f32 - lo as f32) * scale).round().clamp(0.0, 255.0) as u8;
        }
        rgb.iter_mut().for_each(|v| *v = lut[*v as usize]);
        Self::from_rgb(rgb)
    }

    /// Downscale to fit within `max_width` x `max_height`, preserving aspect
    /// ratio. Images that already fit are left untouched.
    #[instrument(skip(self), fields(max_width, max_height))]
    pub fn fit_within(self, max_width: u32, max_height: u32) -> Self {
        if max_width == 0 || max_height == 0 {
            return self;
        }
        if self.image.width() <= max_width && self.image.height() <= max_height {
            return self;
        }
        let resized = self
            .image
            .resize(max_width, max_height, image::imageops::FilterType::Triangle);
        debug!(
            new_w = resized.width(),
            new_h = resized.height(),
            "Preview resized"
        );
        Self { image: resized }
    }

    /// Draw the detection region in blue and, when present, the detected
    /// document outline in green.
    pub fn annotate(self, roi: Region, quad: Option<&Quadrilateral>) -> Self {
        let mut rgb = self.into_rgb();

        if !roi.is_empty() {
            draw_hollow_rect_mut(
                &mut rgb,
                Rect::at(roi.x as i32, roi.y as i32).of_size(roi.width, roi.height),
                ROI_COLOUR,
            );
        }

        if let Some(quad) = quad {
            let corners = quad.corners();
            for i in 0..corners.len() {
                let a = corners[i];
                let b = corners[(i + 1) % corners.len()];
                draw_line_segment_mut(&mut rgb, a.as_tuple(), b.as_tuple(), CONTOUR_COLOUR);
            }
        }

        Self::from_rgb(rgb)
    }

    // -- Output ---------------------------------------------------------------

    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_to_format(&self.image, ImageFormat::Png)
    }

    /// Write the image as PNG, whatever the path's extension says.
    pub fn save_png(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let bytes = self.to_png_bytes()?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!(path = %path.as_ref().display(), bytes = bytes.len(), "Image written");
        Ok(())
    }
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, format)
        .map_err(|err| ScanwerkError::ImageError(format!("image encoding failed: {}", err)))?;
    Ok(buffer)
}
