// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Desktop bridge: a camera that replays still images from a directory, speech
// through the system synthesiser (falling back to the log), and the platform
// file browser.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};

use image::RgbImage;
use scanwerk_core::AppConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use tracing::{debug, info, warn};

use crate::traits::*;

/// File extensions the image-directory camera will replay.
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Bridge used on Linux, macOS, and Windows.
pub struct DesktopBridge;

impl PlatformBridge for DesktopBridge {
    fn platform_name(&self) -> &str {
        std::env::consts::OS
    }

    fn camera(&self, config: &AppConfig) -> Box<dyn CameraSource> {
        Box::new(ImageDirCamera::new(config.frame_source_dir.clone()))
    }

    fn speech(&self, config: &AppConfig) -> Box<dyn SpeechSink> {
        match SystemSpeech::detect(config.speech_rate_wpm) {
            Some(system) => {
                info!(program = system.program, "Using system speech synthesiser");
                Box::new(system)
            }
            None => {
                info!("No speech synthesiser found; narration goes to the log");
                Box::new(LogSpeech)
            }
        }
    }
}

impl FolderOpener for DesktopBridge {
    fn open_folder(&self, path: &Path) -> Result<()> {
        open_in_file_browser(path)
    }
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

/// Replays the images in a directory as a looping video feed.
///
/// Camera `n` reads from `<root>/camera<n>` when that subdirectory exists and
/// from `<root>` otherwise, so camera switching can be exercised with two
/// folders of stills.
pub struct ImageDirCamera {
    root: Option<PathBuf>,
    frames: Vec<PathBuf>,
    cursor: usize,
    index: Option<u32>,
}

impl ImageDirCamera {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            frames: Vec::new(),
            cursor: 0,
            index: None,
        }
    }

    fn source_dir(&self, index: u32) -> Result<PathBuf> {
        let root = self.root.as_ref().ok_or_else(|| {
            ScanwerkError::CameraUnavailable("no frame source directory configured".into())
        })?;
        let per_camera = root.join(format!("camera{index}"));
        Ok(if per_camera.is_dir() {
            per_camera
        } else {
            root.clone()
        })
    }
}

impl CameraSource for ImageDirCamera {
    fn open(&mut self, index: u32) -> Result<()> {
        self.release();

        let dir = self.source_dir(index)?;
        let entries = std::fs::read_dir(&dir).map_err(|err| {
            ScanwerkError::CameraUnavailable(format!("{}: {}", dir.display(), err))
        })?;
        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_frame_file(path))
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(ScanwerkError::CameraUnavailable(format!(
                "no images in {}",
                dir.display()
            )));
        }

        info!(index, dir = %dir.display(), frames = frames.len(), "Camera opened");
        self.frames = frames;
        self.cursor = 0;
        self.index = Some(index);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.index.is_none() {
            return Err(ScanwerkError::CameraUnavailable("camera not open".into()));
        }
        if self.frames.is_empty() {
            return Ok(None);
        }

        let path = &self.frames[self.cursor % self.frames.len()];
        self.cursor = (self.cursor + 1) % self.frames.len();
        let frame = image::open(path).map_err(|err| {
            ScanwerkError::CameraUnavailable(format!("{}: {}", path.display(), err))
        })?;
        debug!(path = %path.display(), "Frame read");
        Ok(Some(frame.to_rgb8()))
    }

    fn release(&mut self) {
        if let Some(index) = self.index.take() {
            info!(index, "Camera released");
        }
        self.frames.clear();
        self.cursor = 0;
    }

    fn current_index(&self) -> Option<u32> {
        self.index
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Speech
// ---------------------------------------------------------------------------

/// Narration written to the log instead of spoken.
pub struct LogSpeech;

impl SpeechSink for LogSpeech {
    fn speak(&mut self, text: &str) -> Result<()> {
        info!(target: "scanwerk::narration", "{text}");
        Ok(())
    }
}

/// Speech through `espeak` (Linux) or `say` (macOS).
pub struct SystemSpeech {
    program: &'static str,
    rate_wpm: u32,
}

impl SystemSpeech {
    /// The synthesiser for this platform, if it is on `PATH`.
    pub fn detect(rate_wpm: u32) -> Option<Self> {
        let program = if cfg!(target_os = "macos") {
            "say"
        } else {
            "espeak"
        };
        find_on_path(program).map(|_| Self { program, rate_wpm })
    }

    fn command(&self, text: &str) -> Command {
        let mut command = Command::new(self.program);
        let rate = self.rate_wpm.to_string();
        if self.program == "say" {
            command.args(["-r", rate.as_str(), text]);
        } else {
            command.args(["-s", rate.as_str(), text]);
        }
        command
    }
}

impl SpeechSink for SystemSpeech {
    fn speak(&mut self, text: &str) -> Result<()> {
        let status = self
            .command(text)
            .status()
            .map_err(|err| ScanwerkError::Narration(format!("{}: {}", self.program, err)))?;
        if status.success() {
            Ok(())
        } else {
            Err(ScanwerkError::Narration(format!(
                "{} exited with {}",
                self.program, status
            )))
        }
    }
}

fn find_on_path(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

// ---------------------------------------------------------------------------
// File browser
// ---------------------------------------------------------------------------

fn file_browser_program() -> Option<&'static str> {
    if cfg!(target_os = "windows") {
        Some("explorer")
    } else if cfg!(target_os = "macos") {
        Some("open")
    } else if cfg!(unix) {
        Some("xdg-open")
    } else {
        None
    }
}

fn open_in_file_browser(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(ScanwerkError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", path.display()),
        )));
    }
    let program = file_browser_program().ok_or(ScanwerkError::PlatformUnavailable)?;
    match Command::new(program).arg(path).spawn() {
        Ok(child) => {
            info!(program, path = %path.display(), "Opened folder");
            reap_in_background(program, child);
            Ok(())
        }
        Err(err) => {
            warn!(program, error = %err, "Could not launch file browser");
            Err(ScanwerkError::PlatformUnavailable)
        }
    }
}

/// Wait for a launcher on its own thread so it never lingers as a zombie.
fn reap_in_background(program: &'static str, mut child: Child) {
    let spawned = std::thread::Builder::new()
        .name("file-browser".into())
        .spawn(move || match child.wait() {
            Ok(status) if !status.success() => warn!(program, %status, "File browser exited with an error"),
            Ok(_) => debug!(program, "File browser launcher finished"),
            Err(err) => warn!(program, error = %err, "Could not wait for file browser"),
        });
    if let Err(err) = spawned {
        warn!(error = %err, "Could not start file browser reaper");
    }
}
