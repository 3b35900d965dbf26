//! Host-driven clock.

use async_trait::async_trait;
use lyricsync_core::Result;
use parking_lot::Mutex;

use super::{Clock, ClockContext};

#[derive(Default)]
struct State {
    ctx: Option<ClockContext>,
    playing: bool,
    position: f64,
    wait: f64,
}

/// A clock whose position is set from outside, typically by a media element
/// the host application controls.
///
/// Nothing advances on its own: the host calls [`advance_to`] for every
/// position it wants rendered. Transport commands only flip state and notify
/// listeners.
///
/// [`advance_to`]: ManualClock::advance_to
#[derive(Default)]
pub struct ManualClock {
    state: Mutex<State>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `position` and push it through the player. Resolves with the
    /// position the player accepted, or `None` before initialization.
    pub async fn advance_to(&self, position: f64) -> Option<f64> {
        let updater = {
            let mut state = self.state.lock();
            let ctx = state.ctx.as_ref()?;
            let updater = ctx.updater().clone();
            state.position = position;
            updater
        };
        Some(updater.update(position).await)
    }

    /// Report the length of the media, once the host knows it. Returns
    /// `false` before initialization or without a loaded video.
    pub fn report_duration(&self, duration: f64) -> bool {
        let player = {
            let state = self.state.lock();
            match &state.ctx {
                Some(ctx) => ctx.player().clone(),
                None => return false,
            }
        };
        player.set_video_duration(duration)
    }

    fn transition(&self, f: impl FnOnce(&mut State)) -> Option<ClockContext> {
        let mut state = self.state.lock();
        let ctx = state.ctx.clone()?;
        f(&mut state);
        Some(ctx)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn position(&self) -> f64 {
        self.state.lock().position
    }

    fn wait(&self) -> f64 {
        self.state.lock().wait
    }

    fn set_wait(&self, wait: f64) {
        self.state.lock().wait = wait;
    }

    async fn initialize(&self, ctx: ClockContext) -> Result<()> {
        self.state.lock().ctx = Some(ctx);
        Ok(())
    }

    fn play(&self) -> bool {
        match self.transition(|s| s.playing = true) {
            Some(ctx) => {
                ctx.emitter().play();
                true
            }
            None => false,
        }
    }

    fn pause(&self) -> bool {
        match self.transition(|s| s.playing = false) {
            Some(ctx) => {
                ctx.emitter().pause();
                true
            }
            None => false,
        }
    }

    fn stop(&self) -> bool {
        match self.transition(|s| {
            s.playing = false;
            s.position = 0.0;
        }) {
            Some(ctx) => {
                ctx.emitter().stop();
                true
            }
            None => false,
        }
    }

    fn seek(&self, position: f64) -> bool {
        match self.transition(|s| s.position = position) {
            Some(ctx) => {
                ctx.emitter().seek(position);
                true
            }
            None => false,
        }
    }

    fn dispose(&self) {
        let mut state = self.state.lock();
        state.ctx = None;
        state.playing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commands_are_rejected_before_initialize() {
        let clock = ManualClock::new();
        assert!(!clock.play());
        assert!(!clock.seek(100.0));
        assert_eq!(clock.advance_to(100.0).await, None);
        assert!(!clock.is_playing());
    }
}
