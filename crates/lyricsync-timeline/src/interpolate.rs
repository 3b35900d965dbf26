//! Timestamp interpolation for units whose source data omits them.
//!
//! A maximal run of `N` consecutive siblings without complete timestamps is
//! laid out by even subdivision between the nearest known bounds:
//!
//! ```text
//! T0 = end of the prior sibling, or the parent start
//! T1 = start of the next timed sibling, or the parent end
//! sibling i: [T0 + i * (T1 - T0) / N, T0 + (i + 1) * (T1 - T0) / N]
//! ```
//!
//! When only one bound exists the run collapses to zero-length spans at that
//! bound. When neither exists there is nothing to interpolate from and the
//! pass fails with [`Error::MissingTiming`].

use lyricsync_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::timed::Span;

/// A span as it appears in source data, with either bound possibly missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialSpan {
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

impl PartialSpan {
    pub fn new(start_time: Option<f64>, end_time: Option<f64>) -> Self {
        Self {
            start_time,
            end_time,
        }
    }

    /// A span with both bounds known.
    pub fn known(start_time: f64, end_time: f64) -> Self {
        Self::new(Some(start_time), Some(end_time))
    }

    /// A span with no bounds.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Whether both bounds are present.
    pub fn is_complete(&self) -> bool {
        self.start_time.is_some() && self.end_time.is_some()
    }

    /// Fill missing bounds from `other`, keeping the ones already present.
    pub fn or(self, other: PartialSpan) -> PartialSpan {
        PartialSpan {
            start_time: self.start_time.or(other.start_time),
            end_time: self.end_time.or(other.end_time),
        }
    }
}

impl From<Span> for PartialSpan {
    fn from(span: Span) -> Self {
        Self::known(span.start_time, span.end_time)
    }
}

/// The bounds implied by a sequence of children: the first known start and
/// the last known end.
pub fn envelope<I>(children: I) -> PartialSpan
where
    I: IntoIterator<Item = PartialSpan>,
{
    let mut start_time = None;
    let mut end_time = None;
    for child in children {
        if start_time.is_none() {
            start_time = child.start_time;
        }
        if child.end_time.is_some() {
            end_time = child.end_time;
        }
    }
    PartialSpan::new(start_time, end_time)
}

/// Resolve every slot to a concrete span inside `bounds`.
///
/// Complete slots are kept as-is. Each maximal run of incomplete slots is
/// subdivided evenly; a bound present on the first (start) or last (end)
/// slot of a run narrows the run. `label` names the slots in log messages and
/// errors (e.g. `"phrase[3].word"`).
pub fn interpolate(bounds: PartialSpan, slots: &[PartialSpan], label: &str) -> Result<Vec<Span>> {
    let mut spans = Vec::with_capacity(slots.len());
    let mut cursor = bounds.start_time;
    let mut i = 0;

    while i < slots.len() {
        if let (Some(start), Some(end)) = (slots[i].start_time, slots[i].end_time) {
            spans.push(Span::new(start, end));
            cursor = Some(end.max(start));
            i += 1;
            continue;
        }

        let run_end = slots[i..]
            .iter()
            .position(PartialSpan::is_complete)
            .map_or(slots.len(), |offset| i + offset);
        let run = &slots[i..run_end];

        let t0 = run[0].start_time.or(cursor);
        let t1 = run[run.len() - 1]
            .end_time
            .or_else(|| slots.get(run_end).and_then(|s| s.start_time))
            .or(bounds.end_time);

        let (t0, t1) = match (t0, t1) {
            (Some(t0), Some(t1)) if t1 >= t0 => (t0, t1),
            (Some(t0), Some(t1)) => {
                tracing::warn!(
                    unit = %format!("{label}[{i}]"),
                    left = t0,
                    right = t1,
                    "Interpolation bounds out of order; collapsing run"
                );
                (t0, t0)
            }
            (Some(t0), None) => {
                tracing::warn!(
                    unit = %format!("{label}[{i}]"),
                    count = run.len(),
                    "No right bound for untimed run; using zero-length spans"
                );
                (t0, t0)
            }
            (None, Some(t1)) => {
                tracing::warn!(
                    unit = %format!("{label}[{i}]"),
                    count = run.len(),
                    "No left bound for untimed run; using zero-length spans"
                );
                (t1, t1)
            }
            (None, None) => return Err(Error::missing_timing(format!("{label}[{i}]"))),
        };

        let count = run.len() as f64;
        let step = (t1 - t0) / count;
        for k in 0..run.len() {
            let start = t0 + k as f64 * step;
            let end = if k + 1 == run.len() {
                t1
            } else {
                t0 + (k + 1) as f64 * step
            };
            spans.push(Span::new(start, end));
        }

        tracing::trace!(
            unit = %format!("{label}[{i}]"),
            count = run.len(),
            from = t0,
            to = t1,
            "Interpolated untimed run"
        );

        cursor = Some(t1);
        i = run_end;
    }

    Ok(spans)
}
