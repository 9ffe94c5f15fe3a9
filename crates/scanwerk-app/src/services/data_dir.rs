// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware data directory resolution.

use std::path::PathBuf;

use tracing::warn;

/// Return the application data directory, creating it if needed.
pub fn data_dir() -> PathBuf {
    let dir = dirs_fallback().join("scanwerk");
    if let Err(err) = std::fs::create_dir_all(&dir) {
        warn!(path = %dir.display(), error = %err, "could not create data directory");
    }
    dir
}

fn dirs_fallback() -> PathBuf {
    // Try XDG data dir, then fallback to home
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    if let Some(app_data) = std::env::var_os("APPDATA") {
        return PathBuf::from(app_data);
    }
    std::env::temp_dir()
}
