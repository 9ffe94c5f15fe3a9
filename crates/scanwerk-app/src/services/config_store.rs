// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Settings persistence: `config.json` in the data directory.

use std::path::Path;

use scanwerk_core::AppConfig;
use scanwerk_core::error::Result;
use tracing::{info, warn};

const CONFIG_FILE: &str = "config.json";

/// Read the saved settings. `None` when the file is missing or unreadable.
pub fn load_config(data_dir: &Path) -> Option<AppConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(config) => Some(config),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring corrupt settings file");
            None
        }
    }
}

/// Saved settings, or the defaults.
pub fn load_or_default(data_dir: &Path) -> AppConfig {
    load_config(data_dir).unwrap_or_else(|| {
        info!("using default settings");
        AppConfig::default()
    })
}

pub fn persist_config(data_dir: &Path, config: &AppConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_config(dir.path()).is_none());
        assert_eq!(load_or_default(dir.path()).roi_width, 1300);
    }

    #[test]
    fn corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CONFIG_FILE), "{ not json").expect("write");
        assert!(load_config(dir.path()).is_none());
    }

    #[test]
    fn persisted_destination_survives_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig {
            destination_dir: PathBuf::from("/srv/scans"),
            ..AppConfig::default()
        };
        persist_config(dir.path(), &config).expect("persist");
        let loaded = load_config(dir.path()).expect("reload");
        assert_eq!(loaded.destination_dir, PathBuf::from("/srv/scans"));
    }
}
