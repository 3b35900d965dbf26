//! Unified error type for lyricsync.
//!
//! All crates funnel their failures into [`Error`]. Each variant maps onto one
//! of the handling categories in [`ErrorCategory`], which decides whether a
//! failure may ever interrupt playback.

use std::fmt;

/// How a failure is handled by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or inconsistent source data, repaired locally.
    DataQuality,
    /// A lookup that matched nothing.
    NotFound,
    /// A second request competing with one already in flight.
    ResourceConflict,
    /// No clock attached or the clock is not ready.
    ClockUnavailable,
    /// The input cannot be turned into a document at all.
    FatalConstruction,
    /// I/O, decoding, and other failures outside the engine.
    External,
}

/// Unified error type covering all failure modes in lyricsync.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "song", "phrase").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A competing operation is already running.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// No timestamp could be derived for a unit, not even from its ancestors.
    #[error("Missing timing for {unit}: no ancestor bound available")]
    MissingTiming {
        /// Human-readable path of the unit (e.g. "phrase[2]").
        unit: String,
    },

    /// The playback clock failed or is unavailable.
    #[error("Clock error: {0}")]
    Clock(String),

    /// A song or video could not be loaded.
    #[error("Load error [{source_name}]: {message}")]
    Load {
        /// The source that was being loaded (path or URL).
        source_name: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// JSON decoding failed.
    #[error("JSON error: {source}")]
    Json {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to its handling category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Validation(_) => ErrorCategory::DataQuality,
            Error::Conflict(_) => ErrorCategory::ResourceConflict,
            Error::MissingTiming { .. } => ErrorCategory::FatalConstruction,
            Error::Clock(_) => ErrorCategory::ClockUnavailable,
            Error::Load { .. } => ErrorCategory::External,
            Error::Io { .. } => ErrorCategory::External,
            Error::Json { .. } => ErrorCategory::External,
            Error::Internal(_) => ErrorCategory::External,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::MissingTiming`].
    pub fn missing_timing(unit: impl Into<String>) -> Self {
        Error::MissingTiming { unit: unit.into() }
    }

    /// Convenience constructor for [`Error::Load`].
    pub fn load(source_name: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Load {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
