//! Lyricsync - drives time-indexed lyric documents from a playback clock
//!
//! This library crate exposes the player, clocks, and loaders for the binary
//! and for integration testing. The document tree and time queries live in
//! the `lyricsync-document` and `lyricsync-timeline` crates.

pub mod clock;
pub mod config;
pub mod loader;
pub mod player;

pub use clock::{BasicClock, Clock, ClockContext, ManualClock};
pub use loader::{FileLoader, SongLoader};
pub use player::{LoadError, PendingLoad, Player, PlayerListener, VideoOptions};
