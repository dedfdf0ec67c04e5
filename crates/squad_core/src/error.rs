//! Error types for the squad simulation.
//!
//! Domain rule violations (attacking out of range, ordering an unknown
//! unit, malformed order payloads) are silent no-ops and never surface
//! here. These errors cover data loading, serialization and replay.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all non-domain simulation failures.
#[derive(Debug, Error)]
pub enum GameError {
    /// Data file parsing error.
    #[error("Failed to parse data '{source_name}': {message}")]
    DataParseError {
        /// Name of the file or embedded source that failed to parse.
        source_name: String,
        /// Error message.
        message: String,
    },

    /// A template name was referenced that the catalog does not define.
    #[error("Unknown unit template: {0}")]
    UnknownTemplate(String),

    /// State could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A replay file was written by an incompatible format version.
    #[error("Unsupported replay version: expected {expected}, found {found}")]
    UnsupportedReplayVersion {
        /// Version this build reads.
        expected: u32,
        /// Version stored in the file.
        found: u32,
    },

    /// A replay finished with a different state than it recorded.
    #[error("Replay diverged at tick {tick}: expected hash {expected}, got {actual}")]
    ReplayMismatch {
        /// Tick the replay finished on.
        tick: u64,
        /// Hash recorded when the replay was captured.
        expected: u64,
        /// Hash produced by re-running the replay.
        actual: u64,
    },
}
