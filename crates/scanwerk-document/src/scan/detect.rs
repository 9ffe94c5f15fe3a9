// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document detection: finds the page-shaped quadrilateral in a camera frame.
//
// The search is greedy: contours are visited largest first and the first one
// whose simplified outline has exactly four vertices wins.

use std::borrow::Cow;

use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::contours::find_contours;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::arc_length;
use imageproc::point::Point as PixelPoint;
use scanwerk_core::error::ScanwerkError;
use scanwerk_core::{DetectionConfig, Point, Region};
use tracing::{debug, instrument, warn};

use crate::geometry::{Quadrilateral, approximate_closed_polygon, order_quadrilateral, shoelace_area};
use crate::image::ImageProcessor;
use crate::scan::enhance::{DEFAULT_SCAN_THRESHOLD, ScanEnhancer, binarize_otsu};

/// A located document and the page rendered from it.
#[derive(Debug, Clone)]
pub struct Detection {
    /// Corners in full-frame coordinates.
    pub quad: Quadrilateral,
    /// Rectified, sharpened, binarized page.
    pub page: GrayImage,
}

/// Per-frame document detector.
#[derive(Debug, Clone)]
pub struct DocumentDetector {
    config: DetectionConfig,
    scan_threshold: u8,
}

impl Default for DocumentDetector {
    fn default() -> Self {
        Self::new(DetectionConfig::default(), DEFAULT_SCAN_THRESHOLD)
    }
}

impl DocumentDetector {
    pub fn new(config: DetectionConfig, scan_threshold: u8) -> Self {
        Self {
            config,
            scan_threshold,
        }
    }

    /// Locate a document within `roi` and render its page.
    ///
    /// When normalisation is enabled the whole frame is stretched first and
    /// the page is rendered from the stretched frame.
    #[instrument(skip_all, fields(roi_x = roi.x, roi_y = roi.y))]
    pub fn detect(&self, frame: &RgbImage, roi: Region) -> Option<Detection> {
        let frame = self.prepare(frame);
        let quad = self.locate_prepared(&frame, roi)?;
        match ScanEnhancer::scan_page(&frame, &quad, self.scan_threshold) {
            Ok(page) => Some(Detection { quad, page }),
            Err(err) => {
                warn!(error = %err, "Rectification failed; skipping frame");
                None
            }
        }
    }

    /// Find the document quadrilateral without rendering a page.
    pub fn locate(&self, frame: &RgbImage, roi: Region) -> Option<Quadrilateral> {
        self.locate_prepared(&self.prepare(frame), roi)
    }

    fn prepare<'a>(&self, frame: &'a RgbImage) -> Cow<'a, RgbImage> {
        if self.config.normalize_frames {
            Cow::Owned(ImageProcessor::from_rgb(frame.clone()).normalize_minmax().into_rgb())
        } else {
            Cow::Borrowed(frame)
        }
    }

    fn locate_prepared(&self, frame: &RgbImage, roi: Region) -> Option<Quadrilateral> {
        let roi = clip_region(roi, frame.width(), frame.height());
        if roi.is_empty() {
            return None;
        }

        let binary = self.binarize_roi(frame, roi);
        let vertices = self.first_quadrilateral(&binary)?;

        let corners = vertices.map(|p| Point::new(p.x + roi.x as f32, p.y + roi.y as f32));
        match order_quadrilateral(corners) {
            Ok(quad) => Some(quad),
            Err(ScanwerkError::GeometryDegenerate(reason)) => {
                debug!(%reason, "Candidate outline is degenerate");
                None
            }
            Err(err) => {
                warn!(error = %err, "Unexpected error ordering corners");
                None
            }
        }
    }

    /// ROI crop, grayscale, blur, Otsu threshold.
    fn binarize_roi(&self, frame: &RgbImage, roi: Region) -> GrayImage {
        let crop = image::imageops::crop_imm(frame, roi.x, roi.y, roi.width, roi.height).to_image();
        let gray = DynamicImage::ImageRgb8(crop).to_luma8();
        let blurred = if self.config.blur_sigma > 0.0 {
            gaussian_blur_f32(&gray, self.config.blur_sigma)
        } else {
            gray
        };
        binarize_otsu(&blurred)
    }

    /// Greedy largest-area search for a four-vertex outline, in ROI
    /// coordinates.
    fn first_quadrilateral(&self, binary: &GrayImage) -> Option<[Point; 4]> {
        let mut outlines: Vec<(f64, Vec<PixelPoint<i32>>)> = find_contours::<i32>(binary)
            .into_iter()
            .map(|contour| {
                let area = shoelace_area(&to_points(&contour.points));
                (area, contour.points)
            })
            .collect();
        outlines.sort_by(|a, b| b.0.total_cmp(&a.0));
        debug!(contours = outlines.len(), "Contours extracted");

        for (area, points) in outlines {
            if area <= self.config.min_contour_area {
                // Sorted descending: nothing further can pass.
                break;
            }
            let perimeter = arc_length(&points, true);
            let epsilon = self.config.approx_epsilon_ratio * perimeter;
            let polygon = approximate_closed_polygon(&to_points(&points), epsilon);
            if let [a, b, c, d] = polygon[..] {
                debug!(area, perimeter, "Four-vertex outline accepted");
                return Some([a, b, c, d]);
            }
        }
        None
    }
}

fn to_points(pixels: &[PixelPoint<i32>]) -> Vec<Point> {
    pixels
        .iter()
        .map(|p| Point::new(p.x as f32, p.y as f32))
        .collect()
}

/// Intersect `roi` with the frame bounds.
fn clip_region(roi: Region, frame_width: u32, frame_height: u32) -> Region {
    let x = roi.x.min(frame_width);
    let y = roi.y.min(frame_height);
    Region {
        x,
        y,
        width: roi.width.min(frame_width - x),
        height: roi.height.min(frame_height - y),
    }
}
