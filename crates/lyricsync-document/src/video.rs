//! The document tree root.
//!
//! Construction runs in two passes. The first derives bounds upward: a word
//! without timestamps borrows the envelope of its chars, a phrase the
//! envelope of its words, the video the envelope of everything. The second
//! interpolates downward so every unit ends up with a concrete span inside
//! its parent. The tree is then flattened depth-first into one arena per
//! kind, which makes each parent's children a contiguous index range.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use lyricsync_core::Result;
use lyricsync_timeline::{
    envelope, find_containing, find_overlapping_in_range, find_overlapping_index,
    find_timed_index, find_timed_objects_in_range, interpolate, FindOptions, PartialSpan,
    RangeChange, Span, TimedObject,
};
use parking_lot::RwLock;

use crate::data::VideoData;
use crate::unit::{Node, Unit, UnitId, UnitKind, Units, WordInfo};

/// Animation callback attached to a unit: `(now, unit)`.
pub type Animator = Arc<dyn Fn(f64, Unit<'_>) + Send + Sync>;

/// Wrap a closure as an [`Animator`].
pub fn animator<F>(f: F) -> Animator
where
    F: Fn(f64, Unit<'_>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Root of the document tree.
pub struct Video {
    levels: [Vec<Node>; 4],
    span: RwLock<Span>,
    animators: RwLock<HashMap<UnitId, Animator>>,
}

impl Video {
    /// Build the tree from a source record.
    ///
    /// Fails with [`Error::MissingTiming`](lyricsync_core::Error::MissingTiming)
    /// only when a unit has no timestamp and no ancestor or sibling provides
    /// a bound either.
    pub fn from_data(data: &VideoData) -> Result<Video> {
        // Upward pass: hints from children for parents without timestamps.
        let word_hints: Vec<Vec<PartialSpan>> = data
            .phrases
            .iter()
            .map(|phrase| {
                phrase
                    .words
                    .iter()
                    .map(|word| word.span().or(envelope(word.characters.iter().map(|c| c.span()))))
                    .collect()
            })
            .collect();
        let phrase_hints: Vec<PartialSpan> = data
            .phrases
            .iter()
            .zip(&word_hints)
            .map(|(phrase, words)| phrase.span().or(envelope(words.iter().copied())))
            .collect();
        let graphic_hints: Vec<PartialSpan> = data.graphics.iter().map(|g| g.span()).collect();

        let derived = outer(
            envelope(phrase_hints.iter().copied()),
            outer_of(&graphic_hints),
        );
        let is_empty = data.phrases.is_empty() && data.graphics.is_empty();
        let start_time = data.start_time.or(derived.start_time).or_else(|| {
            (data.duration.is_some() || is_empty).then_some(0.0)
        });
        let end_time = data
            .end_time
            .or_else(|| start_time.zip(data.duration).map(|(s, d)| s + d))
            .or(derived.end_time);
        let bounds = PartialSpan::new(start_time, end_time);

        // Downward pass.
        let phrase_spans = interpolate(bounds, &phrase_hints, "phrase")?;
        let graphic_spans = interpolate(bounds, &graphic_hints, "graphic")?;

        let span = {
            let lyric_end = phrase_spans.last().map(|s| s.end_time);
            let graphic_end = graphic_spans.iter().map(|s| s.end_time).reduce(f64::max);
            let start = start_time
                .or_else(|| phrase_spans.first().map(|s| s.start_time))
                .unwrap_or(0.0);
            let end = end_time
                .or_else(|| match (lyric_end, graphic_end) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                })
                .unwrap_or(start);
            Span::new(start, end)
        };

        let mut phrases = Vec::with_capacity(data.phrases.len());
        let mut words = Vec::new();
        let mut chars = Vec::new();

        for (p, (phrase, phrase_span)) in data.phrases.iter().zip(&phrase_spans).enumerate() {
            let word_spans = interpolate(
                (*phrase_span).into(),
                &word_hints[p],
                &format!("phrase[{p}].word"),
            )?;

            let word_start = words.len();
            let phrase_char_start = chars.len();
            let mut phrase_text = String::new();

            for (w, (word, word_span)) in phrase.words.iter().zip(word_spans).enumerate() {
                let char_hints: Vec<PartialSpan> = word.characters.iter().map(|c| c.span()).collect();
                let char_spans = interpolate(
                    word_span.into(),
                    &char_hints,
                    &format!("phrase[{p}].word[{w}].char"),
                )?;

                let word_index = words.len();
                let char_start = chars.len();
                let mut word_text = String::new();

                for (ch, char_span) in word.characters.iter().zip(char_spans) {
                    word_text.push_str(&ch.char);
                    chars.push(Node {
                        span: char_span,
                        parent: Some(word_index),
                        children: 0..0,
                        chars: chars.len()..chars.len() + 1,
                        text: ch.char.clone(),
                        word: None,
                    });
                }

                phrase_text.push_str(&word_text);
                words.push(Node {
                    span: word_span,
                    parent: Some(p),
                    children: char_start..chars.len(),
                    chars: char_start..chars.len(),
                    text: word_text,
                    word: Some(WordInfo {
                        pos: word.pos.clone(),
                        raw_pos: word.raw_pos.clone(),
                        language: word.language.clone(),
                    }),
                });
            }

            phrases.push(Node {
                span: *phrase_span,
                parent: None,
                children: word_start..words.len(),
                chars: phrase_char_start..chars.len(),
                text: phrase_text,
                word: None,
            });
        }

        // Graphics are layers that may overlap; keep them ordered by start.
        let mut graphic_spans = graphic_spans;
        graphic_spans.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        let graphics = graphic_spans
            .into_iter()
            .map(|span| Node {
                span,
                parent: None,
                children: 0..0,
                chars: 0..0,
                text: String::new(),
                word: None,
            })
            .collect();

        tracing::debug!(
            phrase_count = phrases.len(),
            word_count = words.len(),
            char_count = chars.len(),
            start_time = span.start_time,
            end_time = span.end_time,
            "Built video"
        );

        Ok(Video {
            levels: [phrases, words, chars, graphics],
            span: RwLock::new(span),
            animators: RwLock::new(HashMap::new()),
        })
    }

    pub(crate) fn nodes(&self, kind: UnitKind) -> &[Node] {
        &self.levels[kind.slot()]
    }

    // ------------------------------------------------------------------
    // Bounds
    // ------------------------------------------------------------------

    /// Replace the duration with an externally measured song length. The
    /// start time is kept and the end time moves. Units keep their spans.
    pub fn set_duration(&self, duration: f64) {
        let mut span = self.span.write();
        *span = Span::new(span.start_time, span.start_time + duration.max(0.0));
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    /// The unit with the given handle, if it exists in this video.
    pub fn unit(&self, id: UnitId) -> Option<Unit<'_>> {
        (id.index < self.count(id.kind)).then(|| Unit::new(self, id))
    }

    /// All units of one kind in document order.
    pub fn units(&self, kind: UnitKind) -> Units<'_> {
        Units::new(self, kind, 0..self.count(kind))
    }

    pub fn count(&self, kind: UnitKind) -> usize {
        self.nodes(kind).len()
    }

    pub fn first(&self, kind: UnitKind) -> Option<Unit<'_>> {
        self.units(kind).next()
    }

    pub fn last(&self, kind: UnitKind) -> Option<Unit<'_>> {
        self.units(kind).next_back()
    }

    /// Find the unit of `kind` active at `time`. Where graphics overlap, the
    /// one that started last wins.
    pub fn find(&self, kind: UnitKind, time: f64, options: FindOptions) -> Option<Unit<'_>> {
        let nodes = self.nodes(kind);
        let index = if kind.may_overlap() {
            find_overlapping_index(nodes, time, options)
        } else {
            find_timed_index(nodes, time, options)
        };
        index.map(|index| Unit::new(self, UnitId::new(kind, index)))
    }

    /// Flat index of `unit` if it belongs to this video.
    pub fn find_index(&self, unit: &Unit<'_>) -> Option<usize> {
        std::ptr::eq(unit.video(), self).then(|| unit.index())
    }

    /// What changed at one level while moving from `from` to `to`.
    pub fn range_change(&self, kind: UnitKind, from: f64, to: f64) -> RangeChange {
        if kind.may_overlap() {
            find_overlapping_in_range(self.nodes(kind), from, to)
        } else {
            find_timed_objects_in_range(self.nodes(kind), from, to)
        }
    }

    /// Every unit entered, left, or current while moving from `from` to
    /// `to`, in kind order then index order. Every graphic containing `to`
    /// counts as current.
    pub fn active_units(&self, from: f64, to: f64) -> Vec<UnitId> {
        UnitKind::ALL
            .iter()
            .flat_map(|&kind| {
                let mut touched = self.range_change(kind, from, to).touched();
                if kind.may_overlap() {
                    touched.extend(find_containing(self.nodes(kind), to));
                    touched.sort_unstable();
                    touched.dedup();
                }
                touched
                    .into_iter()
                    .map(move |index| UnitId::new(kind, index))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Animation slots
    // ------------------------------------------------------------------

    pub(crate) fn set_animate(&self, id: UnitId, animator: Animator) {
        self.animators.write().insert(id, animator);
    }

    pub(crate) fn clear_animate(&self, id: UnitId) -> bool {
        self.animators.write().remove(&id).is_some()
    }

    pub(crate) fn animator(&self, id: UnitId) -> Option<Animator> {
        self.animators.read().get(&id).cloned()
    }

    /// Attach `animator` to every unit of `kind`.
    pub fn set_animate_all(&self, kind: UnitKind, animator: Animator) {
        let mut slots = self.animators.write();
        for index in 0..self.count(kind) {
            slots.insert(UnitId::new(kind, index), Arc::clone(&animator));
        }
    }

    /// Detach every animation callback.
    pub fn clear_animators(&self) {
        self.animators.write().clear();
    }

    /// Number of units with a callback attached.
    pub fn animator_count(&self) -> usize {
        self.animators.read().len()
    }

    /// Invoke the callbacks of every unit touched while moving from `from` to
    /// `to`, passing `to` as the current time. Returns how many ran.
    ///
    /// Callbacks are collected before any of them runs, so a callback may
    /// attach or detach others without deadlocking.
    pub fn animate(&self, from: f64, to: f64) -> usize {
        if self.animators.read().is_empty() {
            return 0;
        }

        let pending: Vec<(UnitId, Animator)> = {
            let slots = self.animators.read();
            self.active_units(from, to)
                .into_iter()
                .filter_map(|id| slots.get(&id).map(|f| (id, Arc::clone(f))))
                .collect()
        };

        for (id, animator) in &pending {
            animator(to, Unit::new(self, *id));
        }

        tracing::trace!(from, to, dispatched = pending.len(), "Animated units");
        pending.len()
    }
}

macro_rules! level_accessors {
    ($kind:expr, $count:ident, $get:ident, $find:ident, $first:ident, $last:ident) => {
        impl Video {
            pub fn $count(&self) -> usize {
                self.count($kind)
            }

            pub fn $get(&self, index: usize) -> Option<Unit<'_>> {
                self.unit(UnitId::new($kind, index))
            }

            pub fn $find(&self, time: f64, options: FindOptions) -> Option<Unit<'_>> {
                self.find($kind, time, options)
            }

            pub fn $first(&self) -> Option<Unit<'_>> {
                self.first($kind)
            }

            pub fn $last(&self) -> Option<Unit<'_>> {
                self.last($kind)
            }
        }
    };
}

level_accessors!(UnitKind::Phrase, phrase_count, get_phrase, find_phrase, first_phrase, last_phrase);
level_accessors!(UnitKind::Word, word_count, get_word, find_word, first_word, last_word);
level_accessors!(UnitKind::Char, char_count, get_char, find_char, first_char, last_char);
level_accessors!(UnitKind::Graphic, graphic_count, get_graphic, find_graphic, first_graphic, last_graphic);

impl TimedObject for Video {
    fn start_time(&self) -> f64 {
        self.span.read().start_time
    }

    fn end_time(&self) -> f64 {
        self.span.read().end_time
    }
}

impl fmt::Debug for Video {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Video")
            .field("span", &*self.span.read())
            .field("phrase_count", &self.phrase_count())
            .field("word_count", &self.word_count())
            .field("char_count", &self.char_count())
            .field("graphic_count", &self.graphic_count())
            .field("animator_count", &self.animator_count())
            .finish()
    }
}

/// Smallest known start and largest known end of the given spans.
fn outer_of(spans: &[PartialSpan]) -> PartialSpan {
    spans
        .iter()
        .copied()
        .fold(PartialSpan::unknown(), outer)
}

fn outer(a: PartialSpan, b: PartialSpan) -> PartialSpan {
    fn merge(x: Option<f64>, y: Option<f64>, pick: fn(f64, f64) -> f64) -> Option<f64> {
        match (x, y) {
            (Some(x), Some(y)) => Some(pick(x, y)),
            (x, y) => x.or(y),
        }
    }
    PartialSpan::new(
        merge(a.start_time, b.start_time, f64::min),
        merge(a.end_time, b.end_time, f64::max),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use lyricsync_core::Error;

    use super::*;
    use crate::data::{CharData, GraphicData, PhraseData, WordData};

    fn ch(c: &str, span: Option<(f64, f64)>) -> CharData {
        CharData {
            start_time: span.map(|s| s.0),
            end_time: span.map(|s| s.1),
            char: c.to_string(),
        }
    }

    fn word(span: Option<(f64, f64)>, chars: Vec<CharData>) -> WordData {
        WordData {
            start_time: span.map(|s| s.0),
            end_time: span.map(|s| s.1),
            characters: chars,
            ..WordData::default()
        }
    }

    fn phrase(span: Option<(f64, f64)>, words: Vec<WordData>) -> PhraseData {
        PhraseData {
            start_time: span.map(|s| s.0),
            end_time: span.map(|s| s.1),
            words,
        }
    }

    /// Two phrases, three words, eight chars; the second word's chars carry
    /// no timestamps.
    fn sample() -> VideoData {
        VideoData {
            phrases: vec![
                phrase(
                    Some((1000.0, 2000.0)),
                    vec![
                        word(
                            Some((1000.0, 1400.0)),
                            vec![ch("a", Some((1000.0, 1200.0))), ch("b", Some((1200.0, 1400.0)))],
                        ),
                        word(
                            Some((1500.0, 2000.0)),
                            vec![ch("c", None), ch("d", None), ch("e", None), ch("f", None), ch("g", None)],
                        ),
                    ],
                ),
                phrase(
                    Some((3000.0, 3500.0)),
                    vec![word(Some((3000.0, 3500.0)), vec![ch("h", Some((3000.0, 3500.0)))])],
                ),
            ],
            graphics: vec![GraphicData {
                start_time: Some(0.0),
                end_time: Some(4000.0),
            }],
            ..VideoData::default()
        }
    }

    #[test]
    fn counts_and_text() {
        let video = Video::from_data(&sample()).unwrap();
        assert_eq!(video.phrase_count(), 2);
        assert_eq!(video.word_count(), 3);
        assert_eq!(video.char_count(), 8);
        assert_eq!(video.graphic_count(), 1);
        assert_eq!(video.get_phrase(0).unwrap().text(), "abcdefg");
        assert_eq!(video.get_word(1).unwrap().text(), "cdefg");
        assert_eq!(video.last_char().unwrap().text(), "h");
    }

    #[test]
    fn bounds_cover_lyrics_and_graphics() {
        let video = Video::from_data(&sample()).unwrap();
        assert_eq!(video.start_time(), 0.0);
        assert_eq!(video.end_time(), 4000.0);
    }

    #[test]
    fn untimed_chars_subdivide_word() {
        let video = Video::from_data(&sample()).unwrap();
        let word = video.get_word(1).unwrap();
        let spans: Vec<(f64, f64)> = word
            .children()
            .map(|c| (c.start_time(), c.end_time()))
            .collect();
        assert_eq!(
            spans,
            vec![
                (1500.0, 1600.0),
                (1600.0, 1700.0),
                (1700.0, 1800.0),
                (1800.0, 1900.0),
                (1900.0, 2000.0),
            ]
        );
    }

    #[test]
    fn flat_navigation_crosses_parents() {
        let video = Video::from_data(&sample()).unwrap();
        let last_word_of_first_phrase = video.get_word(1).unwrap();
        let next = last_word_of_first_phrase.next().unwrap();
        assert_eq!(next.parent().unwrap().index(), 1);
        assert_eq!(next.previous().unwrap(), last_word_of_first_phrase);
        assert!(video.first_word().unwrap().previous().is_none());
        assert!(video.last_word().unwrap().next().is_none());
    }

    #[test]
    fn parent_child_links_agree() {
        let video = Video::from_data(&sample()).unwrap();
        for phrase in video.units(UnitKind::Phrase) {
            for (i, word) in phrase.children().enumerate() {
                assert_eq!(word.parent().unwrap(), phrase);
                assert_eq!(phrase.find_index(&word), Some(i));
                for c in word.children() {
                    assert_eq!(c.parent().unwrap(), word);
                }
            }
        }
        let other = video.get_word(2).unwrap();
        assert_eq!(video.get_phrase(0).unwrap().find_index(&other), None);
    }

    #[test]
    fn first_and_last_per_unit() {
        let video = Video::from_data(&sample()).unwrap();
        let phrase = video.get_phrase(0).unwrap();
        assert_eq!(phrase.first_word().unwrap().text(), "ab");
        assert_eq!(phrase.last_char().unwrap().text(), "g");
        assert_eq!(phrase.char_count(), 7);
        assert_eq!(phrase.word_count(), 2);
        let c = video.get_char(0).unwrap();
        assert_eq!(c.char_count(), 1);
        assert!(c.first_word().is_none());
    }

    #[test]
    fn find_by_time() {
        let video = Video::from_data(&sample()).unwrap();
        assert_eq!(video.find_word(1450.0, FindOptions::default()), None);
        assert_eq!(
            video.find_word(1450.0, FindOptions::loose()).map(|w| w.index()),
            Some(0)
        );
        assert_eq!(
            video.find_char(1750.0, FindOptions::default()).map(|c| c.text()),
            Some("e")
        );
        assert_eq!(
            video.find_phrase(2500.0, FindOptions::range(3100.0)).map(|p| p.index()),
            Some(1)
        );
    }

    #[test]
    fn missing_phrase_times_borrow_from_words() {
        let data = VideoData {
            phrases: vec![phrase(None, vec![word(Some((200.0, 400.0)), vec![ch("x", None)])])],
            ..VideoData::default()
        };
        let video = Video::from_data(&data).unwrap();
        let p = video.get_phrase(0).unwrap();
        assert_eq!((p.start_time(), p.end_time()), (200.0, 400.0));
        assert_eq!(video.get_char(0).unwrap().end_time(), 400.0);
    }

    #[test]
    fn untimed_text_uses_duration() {
        let data = VideoData::from_text("ab cd", 100.0);
        let video = Video::from_data(&data).unwrap();
        assert_eq!(video.end_time(), 400.0);
        let ends: Vec<f64> = video.units(UnitKind::Char).map(|c| c.end_time()).collect();
        assert_eq!(ends, vec![100.0, 200.0, 300.0, 400.0]);
    }

    #[test]
    fn untimed_without_duration_is_fatal() {
        let data = VideoData {
            phrases: vec![phrase(None, vec![word(None, vec![ch("x", None)])])],
            ..VideoData::default()
        };
        let err = Video::from_data(&data).unwrap_err();
        assert!(matches!(err, Error::MissingTiming { .. }));
    }

    #[test]
    fn empty_video() {
        let video = Video::from_data(&VideoData::default()).unwrap();
        assert_eq!(video.duration(), 0.0);
        assert!(video.first_phrase().is_none());
        assert!(video.active_units(0.0, 100.0).is_empty());
    }

    #[test]
    fn set_duration_moves_end() {
        let video = Video::from_data(&sample()).unwrap();
        video.set_duration(10_000.0);
        assert_eq!(video.end_time(), 10_000.0);
        assert_eq!(video.start_time(), 0.0);
    }

    #[test]
    fn active_units_are_ordered_by_kind() {
        let video = Video::from_data(&sample()).unwrap();
        let active = video.active_units(1100.0, 1100.0);
        assert_eq!(
            active,
            vec![
                UnitId::new(UnitKind::Phrase, 0),
                UnitId::new(UnitKind::Word, 0),
                UnitId::new(UnitKind::Char, 0),
                UnitId::new(UnitKind::Graphic, 0),
            ]
        );
    }

    #[test]
    fn animate_invokes_attached_callbacks() {
        let video = Video::from_data(&sample()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        video.set_animate_all(
            UnitKind::Char,
            animator(move |now, unit| {
                assert!(unit.contains(now) || now > unit.end_time());
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(video.animator_count(), 8);

        // Moving 1000 -> 1250 touches "a" (left) and "b" (entered, current).
        let ran = video.animate(1000.0, 1250.0);
        assert_eq!(ran, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(video.get_char(0).unwrap().clear_animate());
        assert!(!video.get_char(0).unwrap().has_animate());
        video.clear_animators();
        assert_eq!(video.animate(1000.0, 1250.0), 0);
    }

    #[test]
    fn callbacks_may_reattach_during_dispatch() {
        let video = Arc::new(Video::from_data(&sample()).unwrap());
        video.get_char(0).unwrap().set_animate(animator(|_, unit| {
            unit.set_animate(animator(|_, _| {}));
        }));
        assert_eq!(video.animate(1100.0, 1100.0), 1);
        assert!(video.get_char(0).unwrap().has_animate());
    }

    fn layered_graphics() -> VideoData {
        let graphic = |start: f64, end: f64| GraphicData {
            start_time: Some(start),
            end_time: Some(end),
        };
        VideoData {
            // Out of order on purpose: construction sorts by start time.
            graphics: vec![graphic(500.0, 1000.0), graphic(0.0, 3000.0), graphic(800.0, 1200.0)],
            ..VideoData::default()
        }
    }

    #[test]
    fn graphics_are_sorted_by_start() {
        let video = Video::from_data(&layered_graphics()).unwrap();
        let starts: Vec<f64> = video.units(UnitKind::Graphic).map(|g| g.start_time()).collect();
        assert_eq!(starts, vec![0.0, 500.0, 800.0]);
        assert_eq!(video.end_time(), 3000.0);
    }

    #[test]
    fn background_graphic_outlives_overlays() {
        let video = Video::from_data(&layered_graphics()).unwrap();
        assert_eq!(
            video.find_graphic(2000.0, FindOptions::default()).map(|g| g.index()),
            Some(0)
        );
        assert_eq!(
            video.find_graphic(900.0, FindOptions::default()).map(|g| g.index()),
            Some(2)
        );
        assert_eq!(
            video.active_units(1900.0, 2000.0),
            vec![UnitId::new(UnitKind::Graphic, 0)]
        );
        let layers: Vec<usize> = video
            .active_units(900.0, 900.0)
            .into_iter()
            .map(|id| id.index)
            .collect();
        assert_eq!(layers, vec![0, 1, 2]);
    }

    #[test]
    fn every_layer_is_animated() {
        let video = Video::from_data(&layered_graphics()).unwrap();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        video.set_animate_all(
            UnitKind::Graphic,
            animator(move |_, unit| sink.lock().push(unit.index())),
        );

        assert_eq!(video.animate(1900.0, 2000.0), 1);
        // 1100 -> 1300 leaves the third layer while the first keeps running.
        assert_eq!(video.animate(1100.0, 1300.0), 2);
        assert_eq!(*seen.lock(), vec![0, 0, 2]);
    }

    #[test]
    fn duration_can_change_after_sharing() {
        let video = Arc::new(Video::from_data(&sample()).unwrap());
        let shared = Arc::clone(&video);
        shared.set_duration(2500.0);
        assert_eq!(video.end_time(), 2500.0);
        assert_eq!(video.get_phrase(1).unwrap().end_time(), 3500.0);
    }
}
