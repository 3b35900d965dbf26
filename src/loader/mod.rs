//! Song loaders.
//!
//! The player never fetches anything itself. A [`SongLoader`] turns a song
//! URL into a [`SongRecord`]; the player only awaits the result.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lyricsync_core::{Error, Result};
use lyricsync_document::SongRecord;

/// Async source of song records.
#[async_trait]
pub trait SongLoader: Send + Sync {
    /// Short identifier used in logs (e.g. `"file"`).
    fn name(&self) -> &'static str;

    /// Fetch the record for `url`.
    async fn load(&self, url: &str) -> Result<SongRecord>;
}

/// Reads song records stored as JSON files.
///
/// URLs are resolved against `root`; a `file://` prefix is stripped first.
/// Absolute paths are used as-is.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = Path::new(url.strip_prefix("file://").unwrap_or(url));
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::new(".")
    }
}

#[async_trait]
impl SongLoader for FileLoader {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load(&self, url: &str) -> Result<SongRecord> {
        let path = self.resolve(url);
        tracing::debug!(path = %path.display(), "Loading song record");

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found("song", url));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&contents).map_err(|e| Error::load(url, e.to_string()))
    }
}
