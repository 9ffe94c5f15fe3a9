// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the devices the scanner talks to.
//
// The frame loop only sees these traits; each platform supplies its own
// camera, voice, and file-browser implementations.

use std::path::Path;

use image::RgbImage;
use scanwerk_core::AppConfig;
use scanwerk_core::error::Result;

/// Unified bridge that groups all native capabilities.
pub trait PlatformBridge: FolderOpener {
    /// Human-readable platform name (e.g. "Linux desktop").
    fn platform_name(&self) -> &str;

    /// A camera configured from the application settings. Not yet opened.
    fn camera(&self, config: &AppConfig) -> Box<dyn CameraSource>;

    /// The voice used for narration.
    fn speech(&self, config: &AppConfig) -> Box<dyn SpeechSink>;
}

/// A source of RGB frames. The frame loop owns the only handle.
pub trait CameraSource: Send {
    /// Acquire camera `index`, releasing any camera already held.
    fn open(&mut self, index: u32) -> Result<()>;

    /// Next frame. `Ok(None)` means no frame is ready yet; errors are
    /// transient unless the camera has been released.
    fn read_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Give the device back. Safe to call when nothing is open.
    fn release(&mut self);

    /// Index of the open camera, if any.
    fn current_index(&self) -> Option<u32>;
}

/// Speaks status messages aloud. Called from the narration thread only.
pub trait SpeechSink: Send {
    /// Say `text`, returning once the utterance has finished.
    fn speak(&mut self, text: &str) -> Result<()>;
}

/// Shows a directory in the platform file browser.
pub trait FolderOpener {
    fn open_folder(&self, path: &Path) -> Result<()>;
}
