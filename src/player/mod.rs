//! The sync loop.
//!
//! A [`Player`] binds one [`Clock`] to one [`Video`]. It keeps two
//! positions apart: the media position is whatever the clock last reported
//! and is updated on every tick, while the video position only advances once
//! the animation callbacks for a tick have run to completion. Between
//! [`start_video_seek`](Player::start_video_seek) and
//! [`end_video_seek`](Player::end_video_seek) ticks update the media
//! position and report seek progress without rendering anything.

mod listener;
mod load;
mod throttle;

pub use listener::PlayerListener;
pub use load::{LoadError, PendingLoad, VideoOptions};

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use lyricsync_core::config::PlayerConfig;
use lyricsync_core::events::Event;
use lyricsync_core::{Error, EventBus, PlayerEvent, Result};
use lyricsync_document::{
    Beat, Chord, RepetitiveSegment, RepetitiveSegments, SongMap, SongRecord, Video, VideoData,
};
use lyricsync_timeline::{FindOptions, TimedObject};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::clock::{Clock, ClockContext};
use crate::loader::SongLoader;
use throttle::Throttle;

#[derive(Debug, Clone, Copy, Default)]
struct PlaybackState {
    media_position: f64,
    video_position: f64,
    is_video_seeking: bool,
    wait: f64,
    /// Render the next tick at its own position only instead of diffing
    /// from the last rendered position.
    resync: bool,
}

struct InFlight {
    label: String,
    pending: PendingLoad,
}

/// State shared between the player handles, the clock context, and the load
/// task.
pub(crate) struct Shared {
    config: PlayerConfig,
    state: Mutex<PlaybackState>,
    video: RwLock<Option<Arc<Video>>>,
    song_map: RwLock<Arc<SongMap>>,
    clock: RwLock<Option<Arc<dyn Clock>>>,
    clock_generation: AtomicU64,
    clock_ready: AtomicBool,
    listeners: RwLock<Vec<Arc<dyn PlayerListener>>>,
    events: EventBus,
    throttle: Mutex<Throttle>,
    /// Serializes ticks. The flag is set while a tick is dispatching so that
    /// a tick requested from inside a callback is rejected.
    dispatch: ReentrantMutex<Cell<bool>>,
    loading: Mutex<Option<InFlight>>,
    loader: Option<Arc<dyn SongLoader>>,
    disposed: AtomicBool,
}

struct ResetOnDrop<'a>(&'a Cell<bool>);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Clears the in-flight slot when the load task ends, even by panic.
struct ClearOnDrop(Arc<Shared>);

impl Drop for ClearOnDrop {
    fn drop(&mut self) {
        self.0.loading.lock().take();
    }
}

impl Shared {
    fn new(config: PlayerConfig, loader: Option<Arc<dyn SongLoader>>) -> Self {
        let state = PlaybackState {
            wait: config.wait_ms(),
            ..PlaybackState::default()
        };
        Self {
            state: Mutex::new(state),
            video: RwLock::new(None),
            song_map: RwLock::new(Arc::new(SongMap::default())),
            clock: RwLock::new(None),
            clock_generation: AtomicU64::new(0),
            clock_ready: AtomicBool::new(false),
            listeners: RwLock::new(Vec::new()),
            events: EventBus::new(config.event_capacity),
            throttle: Mutex::new(Throttle::new(config.throttle_interval())),
            dispatch: ReentrantMutex::new(Cell::new(false)),
            loading: Mutex::new(None),
            loader,
            disposed: AtomicBool::new(false),
            config,
        }
    }

    pub(crate) fn is_current_clock(&self, generation: u64) -> bool {
        !self.disposed.load(Ordering::SeqCst)
            && self.clock_generation.load(Ordering::SeqCst) == generation
    }

    pub(crate) fn video(&self) -> Option<Arc<Video>> {
        self.video.read().clone()
    }

    pub(crate) fn media_position(&self) -> f64 {
        self.state.lock().media_position
    }

    pub(crate) fn video_position(&self) -> f64 {
        self.state.lock().video_position
    }

    fn emit(&self, event: PlayerEvent, notify: impl Fn(&dyn PlayerListener)) {
        if self.disposed.load(Ordering::SeqCst) && event != PlayerEvent::Dispose {
            return;
        }
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            notify(listener.as_ref());
        }
        self.events.broadcast(event);
    }

    // ------------------------------------------------------------------
    // Ticks
    // ------------------------------------------------------------------

    /// Run `f` as one tick unless the player is disposed or a tick is
    /// already dispatching. Returns the video position afterwards.
    fn exclusive(&self, position: f64, f: impl FnOnce()) -> f64 {
        {
            let flag = self.dispatch.lock();
            if self.disposed.load(Ordering::SeqCst) {
                tracing::trace!(position, "Ignoring tick after dispose");
            } else if flag.get() {
                tracing::warn!(position, "Tick requested during dispatch; rejected");
            } else {
                flag.set(true);
                let _reset = ResetOnDrop(&*flag);
                f();
            }
        }
        self.video_position()
    }

    /// Entry point for clock updates.
    pub(crate) fn tick(&self, position: f64) -> f64 {
        self.exclusive(position, || {
            let seeking = {
                let mut state = self.state.lock();
                state.media_position = position;
                state.is_video_seeking
            };

            if seeking {
                self.emit(PlayerEvent::MediaSeek { position }, |l| {
                    l.on_media_seek(position)
                });
                self.emit(PlayerEvent::VideoSeek { position }, |l| {
                    l.on_video_seek(position)
                });
                return;
            }

            if self.render(position) {
                let throttled = self.throttle.lock().ready(Instant::now());
                if throttled {
                    self.emit(PlayerEvent::ThrottledTimeUpdate { position }, |l| {
                        l.on_throttled_time_update(position)
                    });
                }
            }
        })
    }

    /// Render outside the clock, at an arbitrary position.
    fn render_at(&self, position: f64) -> f64 {
        self.exclusive(position, || {
            self.state.lock().resync = true;
            self.render(position);
        })
    }

    /// Invoke the animation callbacks for `position` and, if they all
    /// return, commit the video position and notify listeners.
    fn render(&self, position: f64) -> bool {
        let from = {
            let state = self.state.lock();
            if state.resync || position < state.video_position {
                position
            } else {
                state.video_position
            }
        };

        if let Some(video) = self.video() {
            let outcome = catch_unwind(AssertUnwindSafe(|| video.animate(from, position)));
            if outcome.is_err() {
                tracing::warn!(position, "Animation callback panicked; tick abandoned");
                return false;
            }
        }

        {
            let mut state = self.state.lock();
            state.video_position = position;
            state.resync = false;
        }
        tracing::trace!(from, position, "Rendered tick");
        self.emit(PlayerEvent::TimeUpdate { position }, |l| l.on_time_update(position));
        true
    }

    // ------------------------------------------------------------------
    // Clock notifications
    // ------------------------------------------------------------------

    pub(crate) fn notify_play(&self) {
        tracing::debug!("Playback started");
        self.emit(PlayerEvent::Play, |l| l.on_play());
    }

    pub(crate) fn notify_pause(&self) {
        tracing::debug!("Playback paused");
        self.emit(PlayerEvent::Pause, |l| l.on_pause());
    }

    pub(crate) fn notify_stop(&self) {
        tracing::debug!("Playback stopped");
        self.emit(PlayerEvent::Stop, |l| l.on_stop());
    }

    pub(crate) fn notify_seek(&self, position: f64) {
        tracing::debug!(position, "Clock seeked");
        self.state.lock().resync = true;
        self.throttle.lock().reset();
        self.emit(PlayerEvent::Seek { position }, |l| l.on_seek(position));
    }

    /// Apply an externally measured song length to the loaded video.
    pub(crate) fn set_video_duration(&self, duration: f64) -> bool {
        if !(duration.is_finite() && duration >= 0.0) {
            tracing::warn!(duration, "Ignoring invalid video duration");
            return false;
        }
        let Some(video) = self.video() else {
            return false;
        };
        video.set_duration(duration);
        tracing::debug!(duration, end_time = video.end_time(), "Video duration updated");
        true
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Build and swap in a new video. A failure leaves the current video in
    /// place.
    fn install(&self, record: &SongRecord, options: &VideoOptions) -> Result<Arc<Video>> {
        let video = Video::from_data(&record.video)?;
        if let Some(duration) = options.duration.or(record.duration) {
            video.set_duration(duration);
        }
        let video = Arc::new(video);
        let song_map = Arc::new(SongMap::from_data(&record.song_map));

        {
            let _flag = self.dispatch.lock();
            if self.disposed.load(Ordering::SeqCst) {
                return Err(Error::Conflict("player was disposed during load".into()));
            }
            *self.video.write() = Some(Arc::clone(&video));
            *self.song_map.write() = song_map;
            let mut state = self.state.lock();
            state.video_position = 0.0;
            state.resync = true;
        }

        tracing::info!(
            duration = video.duration(),
            phrases = video.phrase_count(),
            words = video.word_count(),
            chars = video.char_count(),
            "Video ready"
        );
        self.emit(
            PlayerEvent::VideoReady {
                duration: video.duration(),
                phrase_count: video.phrase_count(),
                word_count: video.word_count(),
                char_count: video.char_count(),
            },
            |l| l.on_video_ready(&video),
        );
        Ok(video)
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Handle to a sync loop. Clones share the same loop.
#[derive(Clone)]
pub struct Player {
    shared: Arc<Shared>,
}

impl Player {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new(config, None)),
        }
    }

    /// Create a player that resolves song URLs with `loader`.
    pub fn with_loader(config: PlayerConfig, loader: Arc<dyn SongLoader>) -> Self {
        Self {
            shared: Arc::new(Shared::new(config, Some(loader))),
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.shared.config
    }

    // -- Document -----------------------------------------------------------

    /// The loaded video, if any.
    pub fn video(&self) -> Option<Arc<Video>> {
        self.shared.video()
    }

    /// Replace the loaded video's duration, e.g. with the length reported by
    /// the media once it is known. Returns `false` without a video or for a
    /// negative or non-finite duration.
    pub fn set_video_duration(&self, duration: f64) -> bool {
        self.shared.set_video_duration(duration)
    }

    pub fn song_map(&self) -> Arc<SongMap> {
        self.shared.song_map.read().clone()
    }

    pub fn get_beats(&self) -> Vec<Beat> {
        self.song_map().beats().to_vec()
    }

    pub fn find_beat(&self, time: f64, options: FindOptions) -> Option<Beat> {
        self.song_map().find_beat(time, options).cloned()
    }

    pub fn get_chords(&self) -> Vec<Chord> {
        self.song_map().chords().to_vec()
    }

    pub fn find_chord(&self, time: f64, options: FindOptions) -> Option<Chord> {
        self.song_map().find_chord(time, options).cloned()
    }

    /// Every repetitive segment group, chorus or not.
    pub fn get_choruses(&self) -> Vec<RepetitiveSegments> {
        self.song_map().segments().to_vec()
    }

    pub fn find_chorus(&self, time: f64, options: FindOptions) -> Option<RepetitiveSegment> {
        self.song_map().find_chorus(time, options).cloned()
    }

    // -- Positions ----------------------------------------------------------

    /// Last position reported by the clock.
    pub fn media_position(&self) -> f64 {
        self.shared.media_position()
    }

    /// Last position whose dispatch completed.
    pub fn video_position(&self) -> f64 {
        self.shared.video_position()
    }

    pub fn is_video_seeking(&self) -> bool {
        self.shared.state.lock().is_video_seeking
    }

    pub fn is_playing(&self) -> bool {
        self.clock().is_some_and(|clock| clock.is_playing())
    }

    /// Desired tick interval in milliseconds.
    pub fn wait(&self) -> f64 {
        self.shared.state.lock().wait
    }

    /// Change the tick interval. Non-positive values are ignored.
    pub fn set_wait(&self, wait: f64) {
        if !(wait.is_finite() && wait > 0.0) {
            tracing::warn!(wait, "Ignoring invalid wait");
            return;
        }
        self.shared.state.lock().wait = wait;
        if let Some(clock) = self.clock() {
            clock.set_wait(wait);
        }
    }

    pub fn fps(&self) -> f64 {
        1000.0 / self.wait()
    }

    pub fn set_fps(&self, fps: f64) {
        self.set_wait(1000.0 / fps);
    }

    // -- Events -------------------------------------------------------------

    pub fn add_listener(&self, listener: Arc<dyn PlayerListener>) {
        self.shared.listeners.write().push(listener);
    }

    /// Remove a listener by identity. Returns whether it was registered.
    pub fn remove_listener(&self, listener: &Arc<dyn PlayerListener>) -> bool {
        let mut listeners = self.shared.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.shared.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    // -- Clock --------------------------------------------------------------

    /// The installed clock, once its initialization has finished.
    pub fn clock(&self) -> Option<Arc<dyn Clock>> {
        if self.shared.clock_ready.load(Ordering::SeqCst) {
            self.shared.clock.read().clone()
        } else {
            None
        }
    }

    /// Replace the clock. The old clock is disposed before the new one is
    /// initialized; ticks pushed by the old clock from then on are ignored.
    pub async fn set_clock(&self, clock: Arc<dyn Clock>) -> Result<()> {
        let generation = {
            let _flag = self.shared.dispatch.lock();
            if self.is_disposed() {
                return Err(Error::Clock("player is disposed".into()));
            }
            self.shared.clock_ready.store(false, Ordering::SeqCst);
            let generation = self.shared.clock_generation.fetch_add(1, Ordering::SeqCst) + 1;
            let old = self.shared.clock.write().take();
            if let Some(old) = old {
                tracing::debug!(clock = old.name(), "Disposing previous clock");
                old.dispose();
            }
            generation
        };

        clock.set_wait(self.wait());
        let ctx = ClockContext::new(Arc::downgrade(&self.shared), generation);
        if let Err(e) = clock.initialize(ctx).await {
            tracing::warn!(clock = clock.name(), error = %e, "Clock initialization failed");
            return Err(e);
        }

        {
            let _flag = self.shared.dispatch.lock();
            if !self.shared.is_current_clock(generation) {
                clock.dispose();
                return Err(Error::Clock(format!(
                    "{} clock was replaced during initialization",
                    clock.name()
                )));
            }
            *self.shared.clock.write() = Some(Arc::clone(&clock));
            self.shared.clock_ready.store(true, Ordering::SeqCst);
        }

        tracing::info!(clock = clock.name(), "Clock ready");
        self.shared.emit(
            PlayerEvent::TimerReady {
                clock: clock.name().to_string(),
            },
            |l| l.on_timer_ready(&clock),
        );
        Ok(())
    }

    // -- Transport ----------------------------------------------------------

    pub fn request_play(&self) -> bool {
        self.clock().is_some_and(|clock| clock.play())
    }

    pub fn request_pause(&self) -> bool {
        self.clock().is_some_and(|clock| clock.pause())
    }

    pub fn request_stop(&self) -> bool {
        self.clock().is_some_and(|clock| clock.stop())
    }

    /// Ask the clock to jump. Returns `false` when no clock is ready or the
    /// clock refused.
    pub fn request_media_seek(&self, position: f64) -> bool {
        self.clock().is_some_and(|clock| clock.seek(position))
    }

    /// Enter the seek state: ticks stop rendering and report seek progress.
    pub fn start_video_seek(&self) {
        let started = !std::mem::replace(&mut self.shared.state.lock().is_video_seeking, true);
        if started {
            tracing::debug!("Video seek started");
            self.shared
                .emit(PlayerEvent::VideoSeekStart, |l| l.on_video_seek_start());
        }
    }

    /// Leave the seek state. The next tick renders at its own position and
    /// is reported to throttled listeners right away.
    pub fn end_video_seek(&self) {
        let ended = {
            let mut state = self.shared.state.lock();
            let was_seeking = std::mem::replace(&mut state.is_video_seeking, false);
            if was_seeking {
                state.resync = true;
            }
            was_seeking
        };
        if ended {
            tracing::debug!("Video seek ended");
            self.shared.throttle.lock().reset();
            self.shared
                .emit(PlayerEvent::VideoSeekEnd, |l| l.on_video_seek_end());
        }
    }

    /// Render at `position` immediately without touching the clock. Returns
    /// the video position afterwards, which equals `position` unless the
    /// dispatch was rejected or abandoned.
    pub fn set_video_position(&self, position: f64) -> f64 {
        self.shared.render_at(position)
    }

    /// Render again at the current video position, e.g. after attaching new
    /// animation callbacks.
    pub fn request_stage_update(&self) -> f64 {
        self.shared.render_at(self.video_position())
    }

    // -- Loading ------------------------------------------------------------

    /// Load a song through the configured loader and make it current.
    pub async fn create_from_song_url(
        &self,
        url: &str,
        options: VideoOptions,
    ) -> std::result::Result<Arc<Video>, LoadError> {
        let Some(loader) = self.shared.loader.clone() else {
            return Err(Error::Validation("no song loader configured".into()).into());
        };
        let owned = url.to_string();
        let fetch = async move { loader.load(&owned).await }.boxed();
        self.load(url.to_string(), fetch, options).await
    }

    /// Make a video from an already parsed record.
    pub async fn create_from_json(
        &self,
        record: SongRecord,
    ) -> std::result::Result<Arc<Video>, LoadError> {
        let label = record.title.clone().unwrap_or_else(|| "json".to_string());
        self.load(label, future::ready(Ok(record)).boxed(), VideoOptions::default())
            .await
    }

    /// Make an untimed video from plain text; every char gets
    /// `text_char_duration_ms`.
    pub async fn create_from_text(&self, text: &str) -> std::result::Result<Arc<Video>, LoadError> {
        let record = SongRecord {
            video: VideoData::from_text(text, self.shared.config.text_char_duration_ms),
            ..SongRecord::default()
        };
        self.load("text".to_string(), future::ready(Ok(record)).boxed(), VideoOptions::default())
            .await
    }

    /// The load currently running, if any.
    pub fn pending_load(&self) -> Option<PendingLoad> {
        self.shared
            .loading
            .lock()
            .as_ref()
            .map(|in_flight| in_flight.pending.clone())
    }

    /// Run `fetch` and install its record, refusing to start while another
    /// load is in flight. The work runs on its own task, so it finishes even
    /// if the caller stops waiting.
    async fn load(
        &self,
        label: String,
        fetch: BoxFuture<'static, Result<SongRecord>>,
        options: VideoOptions,
    ) -> std::result::Result<Arc<Video>, LoadError> {
        if self.is_disposed() {
            return Err(Error::Conflict("player is disposed".into()).into());
        }

        let pending = {
            let mut slot = self.shared.loading.lock();
            if let Some(in_flight) = slot.as_ref() {
                tracing::warn!(
                    requested = %label,
                    in_flight = %in_flight.label,
                    "Video load already in flight"
                );
                return Err(LoadError::InFlight {
                    label: in_flight.label.clone(),
                    pending: in_flight.pending.clone(),
                });
            }

            tracing::info!(source = %label, "Loading video");
            let shared = Arc::clone(&self.shared);
            let task = tokio::spawn(async move {
                let _clear = ClearOnDrop(Arc::clone(&shared));
                match fetch.await {
                    Ok(record) => shared.install(&record, &options).map_err(Arc::new),
                    Err(e) => Err(Arc::new(e)),
                }
            });
            let pending = PendingLoad::new(
                async move {
                    task.await.unwrap_or_else(|e| {
                        Err(Arc::new(Error::Internal(format!("load task failed: {e}"))))
                    })
                }
                .boxed(),
            );
            *slot = Some(InFlight {
                label,
                pending: pending.clone(),
            });
            pending
        };

        pending.result().await.map_err(|e| {
            tracing::warn!(error = %e, "Video load failed");
            LoadError::Failed(e)
        })
    }

    // -- Lifecycle ----------------------------------------------------------

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    /// Stop the clock, drop the video, and detach every listener. No tick
    /// reaches a callback or listener once this returns.
    pub fn dispose(&self) {
        let (clock, video) = {
            let _flag = self.shared.dispatch.lock();
            if self.shared.disposed.swap(true, Ordering::SeqCst) {
                return;
            }
            self.shared.clock_generation.fetch_add(1, Ordering::SeqCst);
            self.shared.clock_ready.store(false, Ordering::SeqCst);
            (self.shared.clock.write().take(), self.shared.video.write().take())
        };

        if let Some(clock) = clock {
            clock.dispose();
        }
        if let Some(video) = video {
            video.clear_animators();
        }

        tracing::info!("Player disposed");
        self.shared.emit(PlayerEvent::Dispose, |l| l.on_dispose());
        self.shared.listeners.write().clear();
    }
}
