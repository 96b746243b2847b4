//! Error types for toolpath generation.

use millpath_index::IndexError;
use thiserror::Error;

/// Errors that can occur while setting up or running a generator.
///
/// A probe that finds no contact is not an error, and neither is a
/// cancelled run: those are reported through `Option` and
/// [`ToolpathResult::cancelled`](crate::ToolpathResult::cancelled).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CamError {
    /// The spatial index rejected its input.
    #[error("spatial index: {0}")]
    Index(#[from] IndexError),

    /// Cutter parameters are out of range.
    #[error("invalid tool: {0}")]
    InvalidTool(String),

    /// Generator settings are out of range.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Motion grid parameters are out of range.
    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    /// Settings text could not be parsed.
    #[error("config: {0}")]
    Config(String),
}

/// Result type for CAM operations.
pub type Result<T> = std::result::Result<T, CamError>;
