//! Musical structure of a song: beats, chords, and repetitive segments.

use lyricsync_timeline::{find_timed_index, FindOptions, TimedObject};
use serde::{Deserialize, Serialize};

/// Source record for a song map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SongMapData {
    pub beats: Vec<BeatData>,
    pub chords: Vec<ChordData>,
    pub segments: Vec<RepetitiveSegmentsData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BeatData {
    pub start_time: f64,
    pub end_time: Option<f64>,
    /// Beats per bar.
    pub length: u32,
    /// 1-based position within the bar.
    pub position: Option<u32>,
}

impl Default for BeatData {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            end_time: None,
            length: 4,
            position: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChordData {
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepetitiveSegmentsData {
    pub chorus: bool,
    /// Length of each repetition, used when a segment has no end time.
    pub duration: Option<f64>,
    pub segments: Vec<SegmentData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SegmentData {
    pub start_time: f64,
    pub end_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Beat {
    pub start_time: f64,
    pub end_time: f64,
    pub length: u32,
    pub position: u32,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chord {
    pub start_time: f64,
    pub end_time: f64,
    pub name: String,
    pub index: usize,
}

/// One occurrence of a repeated section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepetitiveSegment {
    pub start_time: f64,
    pub end_time: f64,
    pub chorus: bool,
    pub index: usize,
}

/// A group of segments that repeat the same material.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepetitiveSegments {
    pub chorus: bool,
    pub duration: f64,
    pub segments: Vec<RepetitiveSegment>,
}

macro_rules! impl_timed {
    ($($ty:ty),+) => {
        $(
            impl TimedObject for $ty {
                fn start_time(&self) -> f64 {
                    self.start_time
                }

                fn end_time(&self) -> f64 {
                    self.end_time
                }
            }
        )+
    };
}

impl_timed!(Beat, Chord, RepetitiveSegment);

/// Parsed, sorted song map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SongMap {
    beats: Vec<Beat>,
    chords: Vec<Chord>,
    segments: Vec<RepetitiveSegments>,
    /// Every chorus occurrence across all groups, sorted by start time.
    #[serde(skip)]
    choruses: Vec<RepetitiveSegment>,
}

impl SongMap {
    pub fn from_data(data: &SongMapData) -> Self {
        let mut beats: Vec<&BeatData> = data
            .beats
            .iter()
            .filter(|b| finite("beat", b.start_time))
            .collect();
        beats.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        let beat_starts: Vec<f64> = beats.iter().map(|b| b.start_time).collect();
        let beats = beats
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let length = b.length.max(1);
                Beat {
                    start_time: b.start_time,
                    end_time: resolve_end(&beat_starts, i, b.end_time),
                    length,
                    position: b.position.unwrap_or(i as u32 % length + 1),
                    index: i,
                }
            })
            .collect();

        let mut chords: Vec<&ChordData> = data
            .chords
            .iter()
            .filter(|c| finite("chord", c.start_time))
            .collect();
        chords.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        let chord_starts: Vec<f64> = chords.iter().map(|c| c.start_time).collect();
        let chords = chords
            .iter()
            .enumerate()
            .map(|(i, c)| Chord {
                start_time: c.start_time,
                end_time: resolve_end(&chord_starts, i, c.end_time),
                name: c.name.clone(),
                index: i,
            })
            .collect();

        let segments: Vec<RepetitiveSegments> = data
            .segments
            .iter()
            .map(|group| {
                let mut occurrences: Vec<RepetitiveSegment> = group
                    .segments
                    .iter()
                    .filter(|s| finite("segment", s.start_time))
                    .map(|s| {
                        let end = s
                            .end_time
                            .or_else(|| group.duration.map(|d| s.start_time + d))
                            .unwrap_or(s.start_time);
                        RepetitiveSegment {
                            start_time: s.start_time,
                            end_time: end.max(s.start_time),
                            chorus: group.chorus,
                            index: 0,
                        }
                    })
                    .collect();
                occurrences.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
                for (i, segment) in occurrences.iter_mut().enumerate() {
                    segment.index = i;
                }
                let duration = group.duration.unwrap_or_else(|| {
                    occurrences.first().map_or(0.0, |s| s.duration())
                });
                RepetitiveSegments {
                    chorus: group.chorus,
                    duration,
                    segments: occurrences,
                }
            })
            .collect();

        let mut choruses: Vec<RepetitiveSegment> = segments
            .iter()
            .filter(|g| g.chorus)
            .flat_map(|g| g.segments.iter().cloned())
            .collect();
        choruses.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        for (i, chorus) in choruses.iter_mut().enumerate() {
            chorus.index = i;
        }

        let map = Self {
            beats,
            chords,
            segments,
            choruses,
        };
        tracing::debug!(
            beats = map.beats.len(),
            chords = map.chords.len(),
            segments = map.segments.len(),
            choruses = map.choruses.len(),
            "Parsed song map"
        );
        map
    }

    pub fn beats(&self) -> &[Beat] {
        &self.beats
    }

    pub fn find_beat(&self, time: f64, options: FindOptions) -> Option<&Beat> {
        find_timed_index(&self.beats, time, options).map(|i| &self.beats[i])
    }

    pub fn chords(&self) -> &[Chord] {
        &self.chords
    }

    pub fn find_chord(&self, time: f64, options: FindOptions) -> Option<&Chord> {
        find_timed_index(&self.chords, time, options).map(|i| &self.chords[i])
    }

    /// All repetitive segment groups in source order.
    pub fn segments(&self) -> &[RepetitiveSegments] {
        &self.segments
    }

    /// Chorus occurrences sorted by start time.
    pub fn choruses(&self) -> &[RepetitiveSegment] {
        &self.choruses
    }

    pub fn find_chorus(&self, time: f64, options: FindOptions) -> Option<&RepetitiveSegment> {
        find_timed_index(&self.choruses, time, options).map(|i| &self.choruses[i])
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty() && self.chords.is_empty() && self.segments.is_empty()
    }
}

/// Explicit end, else the next start, else the previous interval repeated.
fn resolve_end(starts: &[f64], i: usize, explicit: Option<f64>) -> f64 {
    let start = starts[i];
    let end = explicit
        .or_else(|| starts.get(i + 1).copied())
        .or_else(|| i.checked_sub(1).map(|p| start + (start - starts[p])))
        .unwrap_or(start);
    end.max(start)
}

fn finite(kind: &str, time: f64) -> bool {
    if time.is_finite() {
        true
    } else {
        tracing::warn!(kind, time, "Dropping entry with non-finite start time");
        false
    }
}
