use std::sync::Arc;

use lyricsync_document::Video;

use crate::clock::Clock;

/// Receives player notifications. Every method defaults to a no-op, so
/// implementors override only what they need.
///
/// Listeners run synchronously on the thread driving the tick. They may read
/// the video and call transport methods on the player, but a tick requested
/// from inside a listener is rejected.
#[allow(unused_variables)]
pub trait PlayerListener: Send + Sync {
    /// A tick completed its dispatch at `position`.
    fn on_time_update(&self, position: f64) {}

    /// Rate-limited variant of [`on_time_update`](Self::on_time_update).
    fn on_throttled_time_update(&self, position: f64) {}

    /// The clock reported `position` while a video seek is in progress.
    fn on_media_seek(&self, position: f64) {}

    fn on_video_seek_start(&self) {}

    fn on_video_seek(&self, position: f64) {}

    fn on_video_seek_end(&self) {}

    fn on_play(&self) {}

    fn on_pause(&self) {}

    fn on_stop(&self) {}

    /// The clock jumped to `position`.
    fn on_seek(&self, position: f64) {}

    fn on_video_ready(&self, video: &Arc<Video>) {}

    fn on_timer_ready(&self, clock: &Arc<dyn Clock>) {}

    fn on_dispose(&self) {}
}
