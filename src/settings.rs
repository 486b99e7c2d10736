use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::model::Heading;
use crate::util::{read_json, write_json, JsonFileError};

// ── Start pose ───────────────────────────────────────────────────

/// Explicit starting cell and heading, overriding the maze's start marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StartPose {
    #[ts(type = "number")]
    pub x: i64,
    #[ts(type = "number")]
    pub y: i64,
    #[ts(type = "number")]
    pub dir_x: i64,
    #[ts(type = "number")]
    pub dir_y: i64,
}

// ── Run settings ─────────────────────────────────────────────────

/// Limits and defaults applied to every VM run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct RunSettings {
    pub version: u32,
    /// Instruction budget; a run that dispatches more opcodes than this faults.
    #[ts(type = "number")]
    pub max_steps: u64,
    /// Maximum operand stack depth.
    #[ts(type = "number")]
    pub max_stack: usize,
    /// None = start on the maze's start marker, facing down.
    pub start: Option<StartPose>,
}

const SETTINGS_VERSION: u32 = 1;
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;
pub const DEFAULT_MAX_STACK: usize = 4096;

/// Heading used when the start pose comes from the maze's start marker.
pub const DEFAULT_HEADING: Heading = Heading::DOWN;

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            max_steps: DEFAULT_MAX_STEPS,
            max_stack: DEFAULT_MAX_STACK,
            start: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not read settings: {0}")]
    File(#[from] JsonFileError),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

impl RunSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_steps == 0 {
            return Err(SettingsError::Invalid("max_steps must be positive".into()));
        }
        if self.max_stack == 0 {
            return Err(SettingsError::Invalid("max_stack must be positive".into()));
        }
        if let Some(start) = self.start {
            if Heading::new(start.dir_x, start.dir_y).is_none() {
                return Err(SettingsError::Invalid(format!(
                    "start heading ({}, {}) is not a unit axis vector",
                    start.dir_x, start.dir_y
                )));
            }
        }
        Ok(())
    }
}

/// Load settings from `path`. A missing file yields the defaults; a malformed
/// or invalid one is an error.
pub fn load_settings(path: &Path) -> Result<RunSettings, SettingsError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(RunSettings::default());
    }
    let settings = read_json::<RunSettings>(path)?;
    settings.validate()?;
    Ok(settings)
}

/// Save settings as pretty JSON, creating the parent directory if needed.
pub fn save_settings(path: &Path, settings: &RunSettings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(JsonFileError::from)?;
    }
    write_json(path, settings)?;
    Ok(())
}
