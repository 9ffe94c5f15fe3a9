// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk platform bridge: camera, voice, and file-browser abstractions.
//
// The frame loop and narration worker depend only on the traits in
// `traits`; `platform_bridge()` picks the implementation for the host.

pub mod desktop;
pub mod traits;

pub use desktop::{DesktopBridge, ImageDirCamera, LogSpeech, SystemSpeech};
pub use traits::{CameraSource, FolderOpener, PlatformBridge, SpeechSink};

/// The bridge implementation for the host operating system.
pub fn platform_bridge() -> Box<dyn PlatformBridge> {
    Box::new(DesktopBridge)
}
