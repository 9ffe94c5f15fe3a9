// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::PaperSize;

/// What happens to the page candidate (and any redactions drawn on it) when a
/// fresh quadrilateral is detected while edit mode is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RefreshPolicy {
    /// Every successful detection replaces the candidate and clears the
    /// redaction rectangles, even mid-edit.
    #[default]
    ContinuousRefresh,
    /// The candidate is frozen while edit mode is on; detections are ignored
    /// until the operator leaves edit mode.
    FreezeWhileEditing,
}

/// Tunables for the per-frame document detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Gaussian sigma used before thresholding (matches a 5x5 kernel).
    pub blur_sigma: f32,
    /// Contours enclosing this many square pixels or fewer are ignored.
    pub min_contour_area: f64,
    /// Polygon approximation tolerance as a fraction of contour perimeter.
    pub approx_epsilon_ratio: f64,
    /// Stretch frame intensities to the full 0..=255 range before detection.
    pub normalize_frames: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.1,
            min_contour_area: 1000.0,
            approx_epsilon_ratio: 0.015,
            normalize_frames: true,
        }
    }
}

/// Persistent application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory receiving temp page images and saved documents.
    pub destination_dir: PathBuf,
    /// Camera opened at startup.
    pub camera_index: u32,
    /// Number of cameras `SwitchCamera` cycles through.
    pub camera_count: u32,
    /// Requested capture width in pixels.
    pub frame_width: u32,
    /// Requested capture height in pixels.
    pub frame_height: u32,
    /// Width of the centred detection region.
    pub roi_width: u32,
    /// Height of the centred detection region.
    pub roi_height: u32,
    /// Frame loop cadence in milliseconds.
    pub frame_interval_ms: u64,
    pub detection: DetectionConfig,
    /// Fixed binarization threshold for the scanned page look.
    pub scan_threshold: u8,
    /// Page format of the output document.
    pub paper_size: PaperSize,
    pub refresh_policy: RefreshPolicy,
    /// Whether status messages are also spoken.
    pub narration_enabled: bool,
    /// Speech rate in words per minute.
    pub speech_rate_wpm: u32,
    /// Directory of still images served by the image-directory camera.
    pub frame_source_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Camera index that follows `current` when cycling.
    pub fn next_camera(&self, current: u32) -> u32 {
        (current + 1) % self.camera_count.max(1)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            destination_dir: default_destination_dir(),
            camera_index: 1,
            camera_count: 2,
            frame_width: 1920,
            frame_height: 1080,
            roi_width: 1300,
            roi_height: 1080,
            frame_interval_ms: 10,
            detection: DetectionConfig::default(),
            scan_threshold: 128,
            paper_size: PaperSize::A4,
            refresh_policy: RefreshPolicy::default(),
            narration_enabled: true,
            speech_rate_wpm: 175,
            frame_source_dir: None,
        }
    }
}

/// `~/Downloads`, or the working directory when no home is set.
fn default_destination_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join("Downloads"))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_switch_cycles() {
        let config = AppConfig::default();
        assert_eq!(config.next_camera(1), 0);
        assert_eq!(config.next_camera(0), 1);
    }

    #[test]
    fn zero_camera_count_does_not_divide_by_zero() {
        let config = AppConfig {
            camera_count: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.next_camera(3), 0);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "scan_threshold": 100, "refresh_policy": "FreezeWhileEditing" }"#)
                .expect("partial config should parse");
        assert_eq!(config.scan_threshold, 100);
        assert_eq!(config.refresh_policy, RefreshPolicy::FreezeWhileEditing);
        assert_eq!(config.roi_width, 1300);
        assert!((config.detection.approx_epsilon_ratio - 0.015).abs() < 1e-12);
    }
}
