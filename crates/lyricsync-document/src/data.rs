//! Input records a video is built from.
//!
//! Field names follow the camelCase JSON produced by lyric timing tools.
//! Every timestamp is optional; missing ones are filled in when the
//! [`Video`](crate::Video) is constructed.

use lyricsync_timeline::PartialSpan;
use serde::{Deserialize, Serialize};

use crate::song_map::SongMapData;

/// A complete song as delivered by a loader: the lyric document plus the
/// song map and the measured song length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SongRecord {
    pub title: Option<String>,
    pub video: VideoData,
    pub song_map: SongMapData,
    /// Measured song length in milliseconds; overrides the video duration.
    pub duration: Option<f64>,
}

/// Root of the lyric document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoData {
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub duration: Option<f64>,
    pub phrases: Vec<PhraseData>,
    pub graphics: Vec<GraphicData>,
}

/// A lyric line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhraseData {
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub words: Vec<WordData>,
}

/// A word with its part-of-speech annotations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WordData {
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    #[serde(alias = "chars")]
    pub characters: Vec<CharData>,
    pub pos: Option<String>,
    #[serde(alias = "rawPoS")]
    pub raw_pos: Option<String>,
    pub language: Option<String>,
}

/// A single character.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CharData {
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub char: String,
}

/// A graphic overlay; not nested inside phrases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphicData {
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

macro_rules! impl_partial_span {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $ty {
                /// The timestamps present in the source data.
                pub fn span(&self) -> PartialSpan {
                    PartialSpan::new(self.start_time, self.end_time)
                }
            }
        )+
    };
}

impl_partial_span!(PhraseData, WordData, CharData, GraphicData);

impl VideoData {
    /// Build an untimed document from plain text: one phrase per non-empty
    /// line, one word per whitespace-separated token, one char per `char`.
    ///
    /// `char_duration` sets the overall duration (number of characters times
    /// `char_duration`) so interpolation can lay out every unit.
    pub fn from_text(text: &str, char_duration: f64) -> Self {
        let phrases: Vec<PhraseData> = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| PhraseData {
                words: line
                    .split_whitespace()
                    .map(|token| WordData {
                        characters: token
                            .chars()
                            .map(|c| CharData {
                                char: c.to_string(),
                                ..CharData::default()
                            })
                            .collect(),
                        ..WordData::default()
                    })
                    .collect(),
                ..PhraseData::default()
            })
            .collect();

        let char_count: usize = phrases
            .iter()
            .flat_map(|p| &p.words)
            .map(|w| w.characters.len())
            .sum();

        Self {
            start_time: Some(0.0),
            duration: Some(char_count as f64 * char_duration),
            phrases,
            ..Self::default()
        }
    }
}
