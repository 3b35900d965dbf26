//! lyricsync-document: the phrase/word/char document tree and the song map.
//!
//! A [`Video`] is built once from an immutable [`VideoData`] record. Units
//! live in one flat arena per [`UnitKind`] in document order, so a unit's
//! flat index doubles as its handle and `previous`/`next` are neighbours in
//! that arena. Parent links and child ranges are plain indices; nothing in
//! the tree holds a reference to anything else.
//!
//! # Modules
//!
//! - [`data`] - Serde input records (`VideoData`, `SongRecord`, ...)
//! - [`unit`] - Unit kinds, handles, and the borrowed [`Unit`] view
//! - [`video`] - Tree construction, lookups, and animation slots
//! - [`song_map`] - Beats, chords, and repetitive segments

pub mod data;
pub mod song_map;
pub mod unit;
pub mod video;

// Re-export commonly used items at the crate root.
pub use data::{CharData, GraphicData, PhraseData, SongRecord, VideoData, WordData};
pub use song_map::{
    Beat, BeatData, Chord, ChordData, RepetitiveSegment, RepetitiveSegments,
    RepetitiveSegmentsData, SegmentData, SongMap, SongMapData,
};
pub use unit::{Unit, UnitId, UnitKind, Units};
pub use video::{animator, Animator, Video};
