//! The per-object time contract.
//!
//! All times are milliseconds. Both bounds of a timed object are inclusive.

use serde::{Deserialize, Serialize};

/// Anything with an inclusive `[start_time, end_time]` span.
///
/// Implementors provide the two bounds; containment, overlap, and progress
/// are derived from them.
pub trait TimedObject {
    /// Start time in milliseconds.
    fn start_time(&self) -> f64;

    /// End time in milliseconds. Never smaller than [`start_time`](Self::start_time).
    fn end_time(&self) -> f64;

    /// Length of the span.
    fn duration(&self) -> f64 {
        self.end_time() - self.start_time()
    }

    /// Whether `time` lies inside the span (both bounds inclusive).
    fn contains(&self, time: f64) -> bool {
        self.start_time() <= time && time <= self.end_time()
    }

    /// Whether the span intersects `[start_time, end_time]` (inclusive).
    fn overlaps(&self, start_time: f64, end_time: f64) -> bool {
        self.start_time() <= end_time && self.end_time() >= start_time
    }

    /// Position of `time` within the span, clamped to `[0, 1]`.
    ///
    /// A zero-length span is always complete and returns `1.0`.
    fn progress(&self, time: f64) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 {
            return 1.0;
        }
        ((time - self.start_time()) / duration).clamp(0.0, 1.0)
    }
}

impl<T: TimedObject + ?Sized> TimedObject for &T {
    fn start_time(&self) -> f64 {
        (**self).start_time()
    }

    fn end_time(&self) -> f64 {
        (**self).end_time()
    }
}

/// A concrete, fully-resolved time span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub start_time: f64,
    pub end_time: f64,
}

impl Span {
    /// Create a span. An `end_time` before `start_time` collapses to a
    /// zero-length span at `start_time`.
    pub fn new(start_time: f64, end_time: f64) -> Self {
        Self {
            start_time,
            end_time: end_time.max(start_time),
        }
    }

    /// A zero-length span at `time`.
    pub fn at(time: f64) -> Self {
        Self::new(time, time)
    }
}

impl TimedObject for Span {
    fn start_time(&self) -> f64 {
        self.start_time
    }

    fn end_time(&self) -> f64 {
        self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_inclusive() {
        let span = Span::new(100.0, 200.0);
        assert!(span.contains(100.0));
        assert!(span.contains(150.0));
        assert!(span.contains(200.0));
        assert!(!span.contains(99.9));
        assert!(!span.contains(200.1));
    }

    #[test]
    fn overlaps_is_inclusive() {
        let span = Span::new(100.0, 200.0);
        assert!(span.overlaps(200.0, 300.0));
        assert!(span.overlaps(0.0, 100.0));
        assert!(span.overlaps(120.0, 130.0));
        assert!(span.overlaps(0.0, 1000.0));
        assert!(!span.overlaps(201.0, 300.0));
        assert!(!span.overlaps(0.0, 99.0));
    }

    #[test]
    fn duration_and_progress() {
        let span = Span::new(1000.0, 1500.0);
        assert_eq!(span.duration(), 500.0);
        assert_eq!(span.progress(1000.0), 0.0);
        assert_eq!(span.progress(1250.0), 0.5);
        assert_eq!(span.progress(1500.0), 1.0);
        assert_eq!(span.progress(0.0), 0.0);
        assert_eq!(span.progress(9000.0), 1.0);
    }

    #[test]
    fn zero_length_progress_is_complete() {
        let span = Span::at(400.0);
        assert_eq!(span.duration(), 0.0);
        assert_eq!(span.progress(0.0), 1.0);
        assert_eq!(span.progress(400.0), 1.0);
        assert!(span.contains(400.0));
    }

    #[test]
    fn reversed_bounds_collapse() {
        let span = Span::new(300.0, 100.0);
        assert_eq!(span, Span::at(300.0));
    }

    #[test]
    fn references_are_timed() {
        let span = Span::new(0.0, 10.0);
        let by_ref: &Span = &span;
        assert!(TimedObject::contains(&by_ref, 5.0));
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_string(&Span::new(1.0, 2.0)).unwrap();
        assert_eq!(json, r#"{"startTime":1.0,"endTime":2.0}"#);
    }
}
