//! Video loading outcomes.

use std::fmt;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use lyricsync_core::{Error, ErrorCategory};
use lyricsync_document::Video;

pub(crate) type LoadOutcome = Result<Arc<Video>, Arc<Error>>;

/// Overrides applied when a video is created.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoOptions {
    /// Song length in milliseconds; wins over the duration in the record.
    pub duration: Option<f64>,
}

/// Handle to a load that is already running.
///
/// Cloning is cheap; every clone resolves to the same result.
#[derive(Clone)]
pub struct PendingLoad {
    inner: Shared<BoxFuture<'static, LoadOutcome>>,
}

impl PendingLoad {
    pub(crate) fn new(future: BoxFuture<'static, LoadOutcome>) -> Self {
        Self {
            inner: future.shared(),
        }
    }

    /// Wait for the load to finish.
    pub async fn result(&self) -> Result<Arc<Video>, Arc<Error>> {
        self.inner.clone().await
    }

    /// The result if the load has already finished.
    pub fn peek(&self) -> Option<Result<Arc<Video>, Arc<Error>>> {
        self.inner.peek().cloned()
    }
}

impl fmt::Debug for PendingLoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLoad")
            .field("finished", &self.peek().is_some())
            .finish()
    }
}

/// Why a `create_from_*` call did not produce a video.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    /// Another load is still running. `pending` resolves to its result.
    #[error("A video load is already in flight: {label}")]
    InFlight { label: String, pending: PendingLoad },

    /// The load ran and failed. The previous video, if any, is untouched.
    #[error("Video load failed: {0}")]
    Failed(Arc<Error>),
}

impl LoadError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LoadError::InFlight { .. } => ErrorCategory::ResourceConflict,
            LoadError::Failed(e) => e.category(),
        }
    }
}

impl From<Error> for LoadError {
    fn from(error: Error) -> Self {
        LoadError::Failed(Arc::new(error))
    }
}
