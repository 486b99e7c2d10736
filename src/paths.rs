//! Centralized path definitions for the files the CLI reads by default.
//!
//! No other module should hard-code these names.

use std::path::{Path, PathBuf};

// ── Leaf filenames ───────────────────────────────────────────────

pub const SETTINGS_FILE: &str = "micromouse.json";

// ── Environment ──────────────────────────────────────────────────

/// Overrides the directory searched for the settings file.
pub const CONFIG_DIR_ENV: &str = "MICROMOUSE_CONFIG_DIR";

pub fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join(SETTINGS_FILE)
}

/// Directory holding the default settings file: `$MICROMOUSE_CONFIG_DIR`, or the
/// current directory.
pub fn default_config_dir() -> PathBuf {
    std::env::var_os(CONFIG_DIR_ENV).map_or_else(|| PathBuf::from("."), PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_file_lives_in_config_dir() {
        assert_eq!(
            settings_path(Path::new("/etc/mm")),
            PathBuf::from("/etc/mm/micromouse.json")
        );
    }
}
