//! Silent wall-clock timer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lyricsync_core::{Error, Result};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{Clock, ClockContext};

const DEFAULT_WAIT_MS: f64 = 1000.0 / 30.0;

struct State {
    ctx: Option<ClockContext>,
    runtime: Option<Handle>,
    playing: bool,
    /// Position at `started_at`, or the frozen position while paused.
    base: f64,
    started_at: Instant,
    wait: f64,
    poller: Option<JoinHandle<()>>,
}

impl State {
    fn position(&self) -> f64 {
        if self.playing {
            self.base + self.started_at.elapsed().as_secs_f64() * 1000.0
        } else {
            self.base
        }
    }

    fn end(&self) -> Option<f64> {
        self.ctx.as_ref()?.player().video_end()
    }

    fn abort_poller(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

/// A clock that advances with wall time and polls the player every
/// [`wait`](Clock::wait) milliseconds while playing.
///
/// With `stop_at_end` set, the position is clamped to the end of the loaded
/// video and the clock pauses itself once it gets there.
pub struct BasicClock {
    state: Arc<Mutex<State>>,
    stop_at_end: bool,
}

impl BasicClock {
    pub fn new(stop_at_end: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                ctx: None,
                runtime: None,
                playing: false,
                base: 0.0,
                started_at: Instant::now(),
                wait: DEFAULT_WAIT_MS,
                poller: None,
            })),
            stop_at_end,
        }
    }

    fn clamp(&self, state: &State, position: f64) -> f64 {
        match state.end().filter(|_| self.stop_at_end) {
            Some(end) => position.min(end),
            None => position,
        }
        .max(0.0)
    }

    fn spawn_poller(&self, state: &mut State) {
        state.abort_poller();
        let Some(runtime) = state.runtime.clone() else {
            return;
        };
        let shared = Arc::clone(&self.state);
        let stop_at_end = self.stop_at_end;
        let period = Duration::from_secs_f64((state.wait / 1000.0).max(0.001));
        state.poller = Some(runtime.spawn(poll(shared, period, stop_at_end)));
    }

    /// Push a single update outside the polling loop, e.g. after a seek while
    /// paused.
    fn push_once(state: &State, position: f64) {
        if let (Some(ctx), Some(runtime)) = (&state.ctx, &state.runtime) {
            let updater = ctx.updater().clone();
            runtime.spawn(async move {
                updater.update(position).await;
            });
        }
    }
}

impl Default for BasicClock {
    fn default() -> Self {
        Self::new(true)
    }
}

async fn poll(state: Arc<Mutex<State>>, period: Duration, stop_at_end: bool) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let (ctx, position, finished) = {
            let mut state = state.lock();
            let Some(ctx) = state.ctx.clone() else {
                return;
            };
            let raw = state.position();
            match state.end().filter(|_| stop_at_end) {
                Some(end) if raw >= end => {
                    state.playing = false;
                    state.base = end;
                    state.poller = None;
                    (ctx, end, true)
                }
                _ => (ctx, raw, false),
            }
        };

        ctx.updater().update(position).await;

        if finished {
            tracing::debug!(position, "Reached end of video; pausing");
            ctx.emitter().pause();
            return;
        }
    }
}

#[async_trait]
impl Clock for BasicClock {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn position(&self) -> f64 {
        let state = self.state.lock();
        self.clamp(&state, state.position())
    }

    fn wait(&self) -> f64 {
        self.state.lock().wait
    }

    fn set_wait(&self, wait: f64) {
        let mut state = self.state.lock();
        state.wait = wait;
        if state.playing {
            self.spawn_poller(&mut state);
        }
    }

    async fn initialize(&self, ctx: ClockContext) -> Result<()> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Clock(format!("basic clock needs a tokio runtime: {e}")))?;
        let mut state = self.state.lock();
        state.abort_poller();
        state.ctx = Some(ctx);
        state.runtime = Some(runtime);
        state.playing = false;
        state.base = 0.0;
        Ok(())
    }

    fn play(&self) -> bool {
        let ctx = {
            let mut state = self.state.lock();
            let Some(ctx) = state.ctx.clone() else {
                return false;
            };
            if state.playing {
                return true;
            }
            if self.stop_at_end && state.end().is_some_and(|end| state.base >= end) {
                state.base = 0.0;
            }
            state.playing = true;
            state.started_at = Instant::now();
            self.spawn_poller(&mut state);
            ctx
        };
        ctx.emitter().play();
        true
    }

    fn pause(&self) -> bool {
        let ctx = {
            let mut state = self.state.lock();
            let Some(ctx) = state.ctx.clone() else {
                return false;
            };
            state.base = self.clamp(&state, state.position());
            state.playing = false;
            state.abort_poller();
            ctx
        };
        ctx.emitter().pause();
        true
    }

    fn stop(&self) -> bool {
        let ctx = {
            let mut state = self.state.lock();
            let Some(ctx) = state.ctx.clone() else {
                return false;
            };
            state.base = 0.0;
            state.playing = false;
            state.abort_poller();
            Self::push_once(&state, 0.0);
            ctx
        };
        ctx.emitter().stop();
        true
    }

    fn seek(&self, position: f64) -> bool {
        let (ctx, position) = {
            let mut state = self.state.lock();
            let Some(ctx) = state.ctx.clone() else {
                return false;
            };
            let position = self.clamp(&state, position);
            state.base = position;
            state.started_at = Instant::now();
            if !state.playing {
                Self::push_once(&state, position);
            }
            (ctx, position)
        };
        ctx.emitter().seek(position);
        true
    }

    fn dispose(&self) {
        let mut state = self.state.lock();
        state.abort_poller();
        state.ctx = None;
        state.runtime = None;
        state.playing = false;
    }
}

impl Drop for BasicClock {
    fn drop(&mut self) {
        self.state.lock().abort_poller();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commands_need_initialization() {
        let clock = BasicClock::default();
        assert!(!clock.play());
        assert!(!clock.pause());
        assert!(!clock.seek(10.0));
        assert_eq!(clock.position(), 0.0);
        assert_eq!(clock.name(), "basic");
    }

    #[test]
    fn paused_state_reports_base() {
        let clock = BasicClock::new(false);
        clock.state.lock().base = 1234.0;
        assert_eq!(clock.position(), 1234.0);
    }
}
