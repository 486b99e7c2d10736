use std::fmt;

use serde::Serialize;
use ts_rs::TS;

use crate::dsl::error::PipelineError;
use crate::model::MazeError;
use crate::settings::SettingsError;
use crate::util::JsonFileError;

/// Structured error for everything outside the compile/run pipeline itself,
/// so a front end can match on `code` rather than parse messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "code", content = "detail")]
#[ts(export)]
pub enum AppError {
    IoError { message: String },
    InvalidJson { message: String },
    InvalidMaze { message: String },
    SettingsError { message: String },
    /// A pipeline stage rejected the program or the run faulted.
    Pipeline { stage: String, message: String },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::IoError { message } => write!(f, "I/O error: {message}"),
            AppError::InvalidJson { message } => write!(f, "Invalid JSON: {message}"),
            AppError::InvalidMaze { message } => write!(f, "Invalid maze: {message}"),
            AppError::SettingsError { message } => write!(f, "Settings error: {message}"),
            AppError::Pipeline { message, .. } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::IoError {
            message: e.to_string(),
        }
    }
}

impl From<JsonFileError> for AppError {
    fn from(e: JsonFileError) -> Self {
        match e {
            JsonFileError::Io(io_err) => io_err.into(),
            JsonFileError::Json(json_err) => AppError::InvalidJson {
                message: json_err.to_string(),
            },
        }
    }
}

impl From<MazeError> for AppError {
    fn from(e: MazeError) -> Self {
        AppError::InvalidMaze {
            message: e.to_string(),
        }
    }
}

impl From<SettingsError> for AppError {
    fn from(e: SettingsError) -> Self {
        AppError::SettingsError {
            message: e.to_string(),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(e: PipelineError) -> Self {
        AppError::Pipeline {
            stage: e.stage().to_string(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::dsl::error::RuntimeFault;

    #[test]
    fn pipeline_errors_keep_stage_and_prefix() {
        let err: AppError = PipelineError::from(RuntimeFault::NoStartCell).into();
        assert_eq!(err.to_string(), "Runtime Error: maze has no start cell");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "Pipeline");
        assert_eq!(json["detail"]["stage"], "runtime");
    }

    #[test]
    fn json_file_errors_split_by_cause() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            AppError::from(JsonFileError::Io(missing)),
            AppError::IoError { .. }
        ));
        let bad = serde_json::from_str::<u8>("x").unwrap_err();
        assert!(matches!(
            AppError::from(JsonFileError::Json(bad)),
            AppError::InvalidJson { .. }
        ));
    }
}
