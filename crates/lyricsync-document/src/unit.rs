//! Unit kinds, handles, and the borrowed [`Unit`] view.

use std::fmt;
use std::ops::Range;

use lyricsync_timeline::{Span, TimedObject};
use serde::{Deserialize, Serialize};

use crate::video::{Animator, Video};

/// The variants of a rendering unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Phrase,
    Word,
    Char,
    Graphic,
}

impl UnitKind {
    /// All kinds in dispatch order.
    pub const ALL: [UnitKind; 4] = [
        UnitKind::Phrase,
        UnitKind::Word,
        UnitKind::Char,
        UnitKind::Graphic,
    ];

    /// The kind of this kind's children.
    pub fn child(self) -> Option<UnitKind> {
        match self {
            UnitKind::Phrase => Some(UnitKind::Word),
            UnitKind::Word => Some(UnitKind::Char),
            UnitKind::Char | UnitKind::Graphic => None,
        }
    }

    /// The kind of this kind's parent.
    pub fn parent(self) -> Option<UnitKind> {
        match self {
            UnitKind::Word => Some(UnitKind::Phrase),
            UnitKind::Char => Some(UnitKind::Word),
            UnitKind::Phrase | UnitKind::Graphic => None,
        }
    }

    /// Whether units of this kind may overlap each other. Graphics are
    /// independent layers; lyric units at one level never overlap.
    pub fn may_overlap(self) -> bool {
        self == UnitKind::Graphic
    }

    pub(crate) fn slot(self) -> usize {
        match self {
            UnitKind::Phrase => 0,
            UnitKind::Word => 1,
            UnitKind::Char => 2,
            UnitKind::Graphic => 3,
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitKind::Phrase => "phrase",
            UnitKind::Word => "word",
            UnitKind::Char => "char",
            UnitKind::Graphic => "graphic",
        };
        f.write_str(name)
    }
}

/// Stable handle of a unit: its kind plus its index in the flat sequence of
/// that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId {
    pub kind: UnitKind,
    pub index: usize,
}

impl UnitId {
    pub fn new(kind: UnitKind, index: usize) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.index)
    }
}

/// Part-of-speech annotations carried by words.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct WordInfo {
    pub pos: Option<String>,
    pub raw_pos: Option<String>,
    pub language: Option<String>,
}

/// Arena record of one unit.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub span: Span,
    pub parent: Option<usize>,
    /// Indices of the children in the next level's arena.
    pub children: Range<usize>,
    /// Indices of the descendant chars in the char arena.
    pub chars: Range<usize>,
    pub text: String,
    pub word: Option<WordInfo>,
}

impl TimedObject for Node {
    fn start_time(&self) -> f64 {
        self.span.start_time
    }

    fn end_time(&self) -> f64 {
        self.span.end_time
    }
}

/// A borrowed view of one unit in a [`Video`].
///
/// Cheap to copy; all navigation goes through the owning video's arenas.
#[derive(Clone, Copy)]
pub struct Unit<'v> {
    video: &'v Video,
    id: UnitId,
}

impl<'v> Unit<'v> {
    pub(crate) fn new(video: &'v Video, id: UnitId) -> Self {
        Self { video, id }
    }

    fn node(&self) -> &'v Node {
        &self.video.nodes(self.id.kind)[self.id.index]
    }

    fn sibling(&self, index: Option<usize>) -> Option<Unit<'v>> {
        index.and_then(|i| self.video.unit(UnitId::new(self.id.kind, i)))
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn kind(&self) -> UnitKind {
        self.id.kind
    }

    /// Position of this unit in the flat sequence of its kind.
    pub fn index(&self) -> usize {
        self.id.index
    }

    /// The video this unit belongs to.
    pub fn video(&self) -> &'v Video {
        self.video
    }

    /// Text of the unit. Phrases and words concatenate their chars; graphics
    /// have no text.
    pub fn text(&self) -> &'v str {
        &self.node().text
    }

    /// The enclosing unit. Phrases and graphics have none.
    pub fn parent(&self) -> Option<Unit<'v>> {
        let kind = self.id.kind.parent()?;
        let index = self.node().parent?;
        self.video.unit(UnitId::new(kind, index))
    }

    /// The next-level units under this one, in order.
    pub fn children(&self) -> Units<'v> {
        match self.id.kind.child() {
            Some(kind) => Units::new(self.video, kind, self.node().children.clone()),
            None => Units::empty(self.video),
        }
    }

    /// Previous unit of the same kind anywhere in the video.
    pub fn previous(&self) -> Option<Unit<'v>> {
        self.sibling(self.id.index.checked_sub(1))
    }

    /// Next unit of the same kind anywhere in the video.
    pub fn next(&self) -> Option<Unit<'v>> {
        self.sibling(Some(self.id.index + 1))
    }

    /// Number of words: children of a phrase, `1` for a word, else `0`.
    pub fn word_count(&self) -> usize {
        match self.id.kind {
            UnitKind::Phrase => self.node().children.len(),
            UnitKind::Word => 1,
            UnitKind::Char | UnitKind::Graphic => 0,
        }
    }

    /// Number of chars under (or being) this unit.
    pub fn char_count(&self) -> usize {
        self.node().chars.len()
    }

    pub fn first_word(&self) -> Option<Unit<'v>> {
        self.words().next()
    }

    pub fn last_word(&self) -> Option<Unit<'v>> {
        self.words().next_back()
    }

    pub fn first_char(&self) -> Option<Unit<'v>> {
        self.chars().next()
    }

    pub fn last_char(&self) -> Option<Unit<'v>> {
        self.chars().next_back()
    }

    fn words(&self) -> Units<'v> {
        match self.id.kind {
            UnitKind::Phrase => self.children(),
            UnitKind::Word => Units::new(self.video, UnitKind::Word, self.id.index..self.id.index + 1),
            UnitKind::Char | UnitKind::Graphic => Units::empty(self.video),
        }
    }

    fn chars(&self) -> Units<'v> {
        Units::new(self.video, UnitKind::Char, self.node().chars.clone())
    }

    /// Position of `child` among this unit's children, if it is one.
    pub fn find_index(&self, child: &Unit<'_>) -> Option<usize> {
        if Some(child.kind()) != self.id.kind.child() || !std::ptr::eq(child.video, self.video) {
            return None;
        }
        let children = &self.node().children;
        children
            .contains(&child.index())
            .then(|| child.index() - children.start)
    }

    /// Coarse part of speech (words only).
    pub fn pos(&self) -> Option<&'v str> {
        self.node().word.as_ref()?.pos.as_deref()
    }

    /// Raw tagger output (words only).
    pub fn raw_pos(&self) -> Option<&'v str> {
        self.node().word.as_ref()?.raw_pos.as_deref()
    }

    /// Language code such as `en` or `ja` (words only).
    pub fn language(&self) -> Option<&'v str> {
        self.node().word.as_ref()?.language.as_deref()
    }

    /// Attach an animation callback to this unit, replacing any previous one.
    pub fn set_animate(&self, animator: Animator) {
        self.video.set_animate(self.id, animator);
    }

    /// Detach this unit's animation callback. Returns whether one was set.
    pub fn clear_animate(&self) -> bool {
        self.video.clear_animate(self.id)
    }

    /// Whether an animation callback is attached.
    pub fn has_animate(&self) -> bool {
        self.video.animator(self.id).is_some()
    }
}

impl TimedObject for Unit<'_> {
    fn start_time(&self) -> f64 {
        self.node().span.start_time
    }

    fn end_time(&self) -> f64 {
        self.node().span.end_time
    }
}

impl PartialEq for Unit<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && std::ptr::eq(self.video, other.video)
    }
}

impl Eq for Unit<'_> {}

impl fmt::Debug for Unit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.id)
            .field("start_time", &self.start_time())
            .field("end_time", &self.end_time())
            .field("text", &self.text())
            .finish()
    }
}

impl fmt::Display for Unit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \"{}\" [{}-{}]",
            self.id,
            self.text(),
            self.start_time(),
            self.end_time()
        )
    }
}

/// Iterator over a contiguous run of units of one kind.
#[derive(Clone)]
pub struct Units<'v> {
    video: &'v Video,
    kind: UnitKind,
    range: Range<usize>,
}

impl<'v> Units<'v> {
    pub(crate) fn new(video: &'v Video, kind: UnitKind, range: Range<usize>) -> Self {
        Self { video, kind, range }
    }

    fn empty(video: &'v Video) -> Self {
        Self::new(video, UnitKind::Char, 0..0)
    }
}

impl<'v> Iterator for Units<'v> {
    type Item = Unit<'v>;

    fn next(&mut self) -> Option<Self::Item> {
        self.range
            .next()
            .map(|i| Unit::new(self.video, UnitId::new(self.kind, i)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}

impl DoubleEndedIterator for Units<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.range
            .next_back()
            .map(|i| Unit::new(self.video, UnitId::new(self.kind, i)))
    }
}

impl ExactSizeIterator for Units<'_> {}
