//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires a [`Player`] to a [`ManualClock`],
//! a [`RecordingListener`], and a [`CountingLoader`] serving the
//! [`sample_record`] fixture.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lyricsync::{Clock, ManualClock, Player, PlayerListener, SongLoader};
use lyricsync_core::config::PlayerConfig;
use lyricsync_core::{PlayerEvent, Result};
use lyricsync_document::{SongRecord, Video};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

/// Two timed phrases over 3 seconds. The chars of the first phrase carry no
/// timestamps; the second word has one timed char followed by untimed ones.
pub const SAMPLE_JSON: &str = r#"{
    "title": "Sample",
    "duration": 3000,
    "video": {
        "phrases": [
            {
                "startTime": 0, "endTime": 1000,
                "words": [
                    { "startTime": 0, "endTime": 600, "pos": "N", "language": "en",
                      "characters": [{ "char": "h" }, { "char": "e" }, { "char": "l" }] },
                    { "startTime": 600, "endTime": 1000, "pos": "N", "language": "en",
                      "characters": [{ "char": "l" }, { "char": "o" }] }
                ]
            },
            {
                "startTime": 1500, "endTime": 2500,
                "words": [
                    { "startTime": 1500, "endTime": 2500, "pos": "N", "language": "en",
                      "characters": [
                          { "char": "w", "startTime": 1500, "endTime": 1700 },
                          { "char": "o" }, { "char": "r" }, { "char": "l" }, { "char": "d" }
                      ] }
                ]
            }
        ],
        "graphics": [{ "startTime": 0, "endTime": 3000 }]
    },
    "songMap": {
        "beats": [
            { "startTime": 0 }, { "startTime": 500 }, { "startTime": 1000 },
            { "startTime": 1500 }, { "startTime": 2000 }, { "startTime": 2500 }
        ],
        "chords": [{ "startTime": 0, "name": "C" }, { "startTime": 1500, "name": "G" }],
        "segments": [{ "chorus": true, "duration": 1000, "segments": [{ "startTime": 1500 }] }]
    }
}"#;

pub fn sample_record() -> SongRecord {
    serde_json::from_str(SAMPLE_JSON).expect("sample fixture parses")
}

/// A record whose units have no timestamps and no duration to derive them
/// from.
pub fn untimed_record() -> SongRecord {
    serde_json::from_str(
        r#"{ "video": { "phrases": [{ "words": [{ "characters": [{ "char": "x" }] }] }] } }"#,
    )
    .expect("untimed fixture parses")
}

// ---------------------------------------------------------------------------
// RecordingListener
// ---------------------------------------------------------------------------

/// Records every notification as the matching [`PlayerEvent`].
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<PlayerEvent>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn count(&self, pred: impl Fn(&PlayerEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }

    /// Positions of the events matched by `select`, in order.
    pub fn positions(&self, select: impl Fn(&PlayerEvent) -> Option<f64>) -> Vec<f64> {
        self.events.lock().iter().filter_map(select).collect()
    }

    pub fn time_updates(&self) -> Vec<f64> {
        self.positions(|e| match e {
            PlayerEvent::TimeUpdate { position } => Some(*position),
            _ => None,
        })
    }

    fn push(&self, event: PlayerEvent) {
        self.events.lock().push(event);
    }
}

impl PlayerListener for RecordingListener {
    fn on_time_update(&self, position: f64) {
        self.push(PlayerEvent::TimeUpdate { position });
    }

    fn on_throttled_time_update(&self, position: f64) {
        self.push(PlayerEvent::ThrottledTimeUpdate { position });
    }

    fn on_media_seek(&self, position: f64) {
        self.push(PlayerEvent::MediaSeek { position });
    }

    fn on_video_seek_start(&self) {
        self.push(PlayerEvent::VideoSeekStart);
    }

    fn on_video_seek(&self, position: f64) {
        self.push(PlayerEvent::VideoSeek { position });
    }

    fn on_video_seek_end(&self) {
        self.push(PlayerEvent::VideoSeekEnd);
    }

    fn on_play(&self) {
        self.push(PlayerEvent::Play);
    }

    fn on_pause(&self) {
        self.push(PlayerEvent::Pause);
    }

    fn on_stop(&self) {
        self.push(PlayerEvent::Stop);
    }

    fn on_seek(&self, position: f64) {
        self.push(PlayerEvent::Seek { position });
    }

    fn on_video_ready(&self, video: &Arc<Video>) {
        self.push(PlayerEvent::VideoReady {
            duration: lyricsync_timeline::TimedObject::duration(video.as_ref()),
            phrase_count: video.phrase_count(),
            word_count: video.word_count(),
            char_count: video.char_count(),
        });
    }

    fn on_timer_ready(&self, clock: &Arc<dyn Clock>) {
        self.push(PlayerEvent::TimerReady {
            clock: clock.name().to_string(),
        });
    }

    fn on_dispose(&self) {
        self.push(PlayerEvent::Dispose);
    }
}

// ---------------------------------------------------------------------------
// CountingLoader
// ---------------------------------------------------------------------------

/// Serves one record and counts how often it was asked to. When gated, every
/// load waits for a [`release`](CountingLoader::release).
pub struct CountingLoader {
    record: SongRecord,
    calls: AtomicUsize,
    gate: Option<Semaphore>,
}

impl CountingLoader {
    pub fn new(record: SongRecord) -> Arc<Self> {
        Arc::new(Self {
            record,
            calls: AtomicUsize::new(0),
            gate: None,
        })
    }

    pub fn gated(record: SongRecord) -> Arc<Self> {
        Arc::new(Self {
            record,
            calls: AtomicUsize::new(0),
            gate: Some(Semaphore::new(0)),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }
}

#[async_trait]
impl SongLoader for CountingLoader {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn load(&self, _url: &str) -> Result<SongRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .expect("gate semaphore closed")
                .forget();
        }
        Ok(self.record.clone())
    }
}

// ---------------------------------------------------------------------------
// TestHarness
// ---------------------------------------------------------------------------

pub struct TestHarness {
    pub player: Player,
    pub clock: Arc<ManualClock>,
    pub listener: Arc<RecordingListener>,
    pub loader: Arc<CountingLoader>,
}

impl TestHarness {
    /// Player with a ready manual clock and no video.
    pub async fn new() -> Self {
        Self::with_config(PlayerConfig::default()).await
    }

    pub async fn with_config(config: PlayerConfig) -> Self {
        Self::build(config, CountingLoader::new(sample_record())).await
    }

    pub async fn with_loader(loader: Arc<CountingLoader>) -> Self {
        Self::build(PlayerConfig::default(), loader).await
    }

    /// Player with a ready manual clock and the sample video loaded.
    pub async fn with_video() -> Self {
        let harness = Self::new().await;
        harness
            .player
            .create_from_json(sample_record())
            .await
            .expect("sample video loads");
        harness.listener.clear();
        harness
    }

    async fn build(config: PlayerConfig, loader: Arc<CountingLoader>) -> Self {
        let player = Player::with_loader(config, loader.clone());
        let listener = RecordingListener::new();
        player.add_listener(listener.clone());
        let clock = Arc::new(ManualClock::new());
        player
            .set_clock(clock.clone())
            .await
            .expect("manual clock initializes");
        Self {
            player,
            clock,
            listener,
            loader,
        }
    }

    pub fn video(&self) -> Arc<Video> {
        self.player.video().expect("video loaded")
    }

    /// Push each position through the clock in order.
    pub async fn advance(&self, positions: impl IntoIterator<Item = f64>) {
        for position in positions {
            self.clock.advance_to(position).await;
        }
    }
}
