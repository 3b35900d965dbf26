//! Playback clocks.
//!
//! A [`Clock`] is the authority on playback position. The [`Player`] owns at
//! most one clock at a time and hands it a [`ClockContext`] during
//! [`Clock::initialize`]; the clock pushes positions through the context's
//! [`PositionUpdater`] and reports transport changes through its
//! [`ClockEmitter`].
//!
//! Every context is bound to the clock installation it was created for.
//! Once the player swaps clocks or is disposed, the old context goes stale
//! and everything pushed through it is ignored.
//!
//! [`Player`]: crate::player::Player

mod basic;
mod manual;

pub use basic::BasicClock;
pub use manual::ManualClock;

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use lyricsync_core::Result;
use lyricsync_timeline::TimedObject;

use crate::player::Shared;

/// An external playback source.
///
/// Commands are fire-and-forget and return whether the clock accepted them.
/// [`position`](Clock::position) must be computed live on every call.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Short identifier used in logs and events (e.g. `"basic"`).
    fn name(&self) -> &'static str;

    fn is_playing(&self) -> bool;

    /// Current playback position in milliseconds.
    fn position(&self) -> f64;

    /// Desired interval between position updates in milliseconds.
    fn wait(&self) -> f64;

    fn set_wait(&self, wait: f64);

    /// Bind the clock to a player. Called once per installation, before any
    /// command is issued.
    async fn initialize(&self, ctx: ClockContext) -> Result<()>;

    fn play(&self) -> bool;

    fn pause(&self) -> bool;

    fn stop(&self) -> bool;

    fn seek(&self, position: f64) -> bool;

    /// Release all resources and stop any internal polling.
    fn dispose(&self);
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Everything a clock gets from the player it is installed in.
#[derive(Clone)]
pub struct ClockContext {
    player: PlayerHandle,
    updater: PositionUpdater,
    emitter: ClockEmitter,
}

impl ClockContext {
    pub(crate) fn new(shared: Weak<Shared>, generation: u64) -> Self {
        let link = Link { shared, generation };
        Self {
            player: PlayerHandle { link: link.clone() },
            updater: PositionUpdater { link: link.clone() },
            emitter: ClockEmitter { link },
        }
    }

    pub fn player(&self) -> &PlayerHandle {
        &self.player
    }

    pub fn updater(&self) -> &PositionUpdater {
        &self.updater
    }

    pub fn emitter(&self) -> &ClockEmitter {
        &self.emitter
    }
}

/// Non-owning reference to the player, valid for one clock installation.
#[derive(Clone)]
struct Link {
    shared: Weak<Shared>,
    generation: u64,
}

impl Link {
    fn get(&self) -> Option<Arc<Shared>> {
        self.shared
            .upgrade()
            .filter(|shared| shared.is_current_clock(self.generation))
    }
}

/// View of the owning player.
#[derive(Clone)]
pub struct PlayerHandle {
    link: Link,
}

impl PlayerHandle {
    /// Whether the player is still alive and this clock is still installed.
    pub fn is_attached(&self) -> bool {
        self.link.get().is_some()
    }

    /// End time of the loaded video, if any.
    pub fn video_end(&self) -> Option<f64> {
        let shared = self.link.get()?;
        let video = shared.video()?;
        Some(video.end_time())
    }

    /// Report the song length measured by the playback source.
    pub fn set_video_duration(&self, duration: f64) -> bool {
        self.link
            .get()
            .is_some_and(|shared| shared.set_video_duration(duration))
    }

    pub fn media_position(&self) -> Option<f64> {
        self.link.get().map(|shared| shared.media_position())
    }

    pub fn video_position(&self) -> Option<f64> {
        self.link.get().map(|shared| shared.video_position())
    }
}

/// Pushes positions into the player's sync loop.
#[derive(Clone)]
pub struct PositionUpdater {
    link: Link,
}

impl PositionUpdater {
    /// Run one tick at `position` and resolve with the video position the
    /// player ended up at. A rejected or abandoned tick echoes the previous
    /// video position back; a detached updater echoes `position` unchanged.
    pub async fn update(&self, position: f64) -> f64 {
        match self.link.get() {
            Some(shared) => shared.tick(position),
            None => {
                tracing::trace!(position, "Dropping update from detached clock");
                position
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.link.get().is_some()
    }
}

/// Forwards transport changes to the player's listeners.
#[derive(Clone)]
pub struct ClockEmitter {
    link: Link,
}

impl ClockEmitter {
    pub fn play(&self) {
        if let Some(shared) = self.link.get() {
            shared.notify_play();
        }
    }

    pub fn pause(&self) {
        if let Some(shared) = self.link.get() {
            shared.notify_pause();
        }
    }

    pub fn stop(&self) {
        if let Some(shared) = self.link.get() {
            shared.notify_stop();
        }
    }

    pub fn seek(&self, position: f64) {
        if let Some(shared) = self.link.get() {
            shared.notify_seek(position);
        }
    }
}
