//! Binary search and range diffs over sorted timed objects.
//!
//! Inputs are slices sorted ascending by start time whose elements do not
//! overlap each other, so end times are sorted as well. Under that
//! assumption every lookup here is `O(log n)` plus the size of its result.
//!
//! Collections whose elements may overlap (only sorted by start time) use
//! the `find_overlapping_*` variants, which scan instead of bisecting end
//! times.

use crate::timed::TimedObject;

/// Insertion index of `key` among elements sorted by start time.
///
/// Returns the left-most index `i` such that every element before `i` starts
/// strictly before `key`.
pub fn sorted_index<T: TimedObject>(array: &[T], key: f64) -> usize {
    sorted_index_by(array, key, |e| e.start_time())
}

/// Insertion index of `key` among elements sorted by `accessor`.
///
/// Left-most for duplicate keys: all elements before the returned index have
/// `accessor(e) < key`, all at or after it have `accessor(e) >= key`.
pub fn sorted_index_by<T, F>(array: &[T], key: f64, accessor: F) -> usize
where
    F: Fn(&T) -> f64,
{
    array.partition_point(|e| accessor(e) < key)
}

/// Lookup options for [`find_timed_object`].
///
/// `loose` takes precedence over `end_time` when both are set, since it
/// guarantees a result for any non-empty slice.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FindOptions {
    /// Treat the query as the range `[time, end_time]` and return the first
    /// object overlapping it.
    pub end_time: Option<f64>,
    /// Return the binary-search anchor even if it does not contain the time.
    pub loose: bool,
}

impl FindOptions {
    /// Range query options.
    pub fn range(end_time: f64) -> Self {
        Self {
            end_time: Some(end_time),
            loose: false,
        }
    }

    /// Loose query options.
    pub fn loose() -> Self {
        Self {
            end_time: None,
            loose: true,
        }
    }
}

/// Index of the right-most element starting at or before `time`.
fn anchor<T: TimedObject>(objects: &[T], time: f64) -> Option<usize> {
    objects
        .partition_point(|o| o.start_time() <= time)
        .checked_sub(1)
}

/// Index-returning form of [`find_timed_object`].
pub fn find_timed_index<T: TimedObject>(
    objects: &[T],
    time: f64,
    options: FindOptions,
) -> Option<usize> {
    if objects.is_empty() {
        return None;
    }

    if options.loose {
        return Some(anchor(objects, time).unwrap_or(0));
    }

    if let Some(end_time) = options.end_time {
        let (lo, hi) = ordered(time, end_time);
        let start = anchor(objects, lo).unwrap_or(0);
        return objects[start..]
            .iter()
            .take_while(|o| o.start_time() <= hi)
            .position(|o| o.overlaps(lo, hi))
            .map(|offset| start + offset);
    }

    anchor(objects, time).filter(|&i| objects[i].contains(time))
}

/// Find the object active at `time`.
///
/// By default the right-most object starting at or before `time` is returned
/// if it contains `time`; when two objects share a boundary the later one
/// wins. See [`FindOptions`] for range and loose lookups.
pub fn find_timed_object<T: TimedObject>(
    objects: &[T],
    time: f64,
    options: FindOptions,
) -> Option<&T> {
    find_timed_index(objects, time, options).map(|i| &objects[i])
}

/// What changed while moving from one position to another.
///
/// Index lists are ascending regardless of the direction of motion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeChange {
    /// Objects that became active while moving. Forward: start time in
    /// `(lo, hi]`. Backward: end time in `(lo, hi]` (re-entered from the end).
    pub entered: Vec<usize>,
    /// Objects that stopped being active while moving. Forward: end time in
    /// `(lo, hi]`. Backward: start time in `(lo, hi]`.
    pub left: Vec<usize>,
    /// The object containing the destination position.
    pub current: Option<usize>,
    /// The closest object lying entirely before `lo`.
    pub previous: Option<usize>,
    /// The closest object lying entirely after `hi`.
    pub next: Option<usize>,
}

impl RangeChange {
    /// Sorted, de-duplicated union of `entered`, `left`, and `current`.
    pub fn touched(&self) -> Vec<usize> {
        let mut all: Vec<usize> = self
            .entered
            .iter()
            .chain(self.left.iter())
            .chain(self.current.iter())
            .copied()
            .collect();
        all.sort_unstable();
        all.dedup();
        all
    }

    /// Whether nothing was entered, left, or is current.
    pub fn is_empty(&self) -> bool {
        self.entered.is_empty() && self.left.is_empty() && self.current.is_none()
    }
}

/// Diff the active set between `start_time` and `end_time`.
///
/// Works in both directions; moving backward (`end_time < start_time`)
/// swaps the roles of `entered` and `left` so that the result reads from the
/// perspective of the motion. `current` always refers to `end_time`.
pub fn find_timed_objects_in_range<T: TimedObject>(
    array: &[T],
    start_time: f64,
    end_time: f64,
) -> RangeChange {
    let (lo, hi) = ordered(start_time, end_time);

    let started = {
        let from = array.partition_point(|o| o.start_time() <= lo);
        let to = array.partition_point(|o| o.start_time() <= hi);
        (from..to).collect::<Vec<_>>()
    };
    let finished = {
        let from = array.partition_point(|o| o.end_time() <= lo);
        let to = array.partition_point(|o| o.end_time() <= hi);
        (from..to).collect::<Vec<_>>()
    };

    let (entered, left) = if end_time >= start_time {
        (started, finished)
    } else {
        (finished, started)
    };

    let previous = array
        .partition_point(|o| o.end_time() < lo)
        .checked_sub(1);
    let next = Some(array.partition_point(|o| o.start_time() <= hi)).filter(|&i| i < array.len());

    RangeChange {
        entered,
        left,
        current: find_timed_index(array, end_time, FindOptions::default()),
        previous,
        next,
    }
}

// ---------------------------------------------------------------------------
// Overlapping collections
// ---------------------------------------------------------------------------

/// Indexes of every object containing `time`, ascending. `objects` only
/// needs to be sorted by start time.
pub fn find_containing<T: TimedObject>(objects: &[T], time: f64) -> Vec<usize> {
    let candidates = objects.partition_point(|o| o.start_time() <= time);
    (0..candidates)
        .filter(|&i| objects[i].contains(time))
        .collect()
}

/// [`find_timed_index`] for objects that may overlap.
///
/// By default the latest-starting object containing `time` is returned. A
/// range query returns the first object overlapping the range. A loose query
/// falls back to the binary-search anchor when nothing contains `time`.
pub fn find_overlapping_index<T: TimedObject>(
    objects: &[T],
    time: f64,
    options: FindOptions,
) -> Option<usize> {
    if objects.is_empty() {
        return None;
    }

    if options.loose {
        return find_containing(objects, time)
            .last()
            .copied()
            .or_else(|| Some(anchor(objects, time).unwrap_or(0)));
    }

    if let Some(end_time) = options.end_time {
        let (lo, hi) = ordered(time, end_time);
        let candidates = objects.partition_point(|o| o.start_time() <= hi);
        return objects[..candidates].iter().position(|o| o.overlaps(lo, hi));
    }

    find_containing(objects, time).last().copied()
}

/// [`find_timed_objects_in_range`] for objects that may overlap.
///
/// `current` is the latest-starting object containing `end_time`; use
/// [`find_containing`] when every such object is needed.
pub fn find_overlapping_in_range<T: TimedObject>(
    objects: &[T],
    start_time: f64,
    end_time: f64,
) -> RangeChange {
    let (lo, hi) = ordered(start_time, end_time);
    let within = |t: f64| lo < t && t <= hi;

    let started: Vec<usize> = (0..objects.len())
        .filter(|&i| within(objects[i].start_time()))
        .collect();
    let finished: Vec<usize> = (0..objects.len())
        .filter(|&i| within(objects[i].end_time()))
        .collect();

    let (entered, left) = if end_time >= start_time {
        (started, finished)
    } else {
        (finished, started)
    };

    let previous = (0..objects.len())
        .filter(|&i| objects[i].end_time() < lo)
        .max_by(|&a, &b| objects[a].end_time().total_cmp(&objects[b].end_time()));
    let next = Some(objects.partition_point(|o| o.start_time() <= hi))
        .filter(|&i| i < objects.len());

    RangeChange {
        entered,
        left,
        current: find_overlapping_index(objects, end_time, FindOptions::default()),
        previous,
        next,
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timed::Span;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn beats() -> Vec<Span> {
        vec![
            Span::new(0.0, 500.0),
            Span::new(500.0, 1000.0),
            Span::new(1000.0, 1500.0),
        ]
    }

    fn gapped() -> Vec<Span> {
        vec![
            Span::new(100.0, 200.0),
            Span::new(300.0, 400.0),
            Span::new(600.0, 700.0),
        ]
    }

    fn random_spans(rng: &mut StdRng, count: usize) -> Vec<Span> {
        let mut t = 0.0;
        (0..count)
            .map(|_| {
                t += f64::from(rng.gen_range(0..3u32)) * 50.0;
                let start = t;
                t += f64::from(rng.gen_range(0..4u32)) * 50.0;
                Span::new(start, t)
            })
            .collect()
    }

    #[test]
    fn sorted_index_is_leftmost() {
        let spans = vec![
            Span::new(0.0, 0.0),
            Span::new(100.0, 100.0),
            Span::new(100.0, 100.0),
            Span::new(200.0, 300.0),
        ];
        assert_eq!(sorted_index(&spans, -1.0), 0);
        assert_eq!(sorted_index(&spans, 0.0), 0);
        assert_eq!(sorted_index(&spans, 50.0), 1);
        assert_eq!(sorted_index(&spans, 100.0), 1);
        assert_eq!(sorted_index(&spans, 150.0), 3);
        assert_eq!(sorted_index(&spans, 999.0), 4);
    }

    #[test]
    fn sorted_index_matches_linear_scan() {
        let mut rng = StdRng::seed_from_u64(0x9E37_79B9_7F4A_7C15);
        for round in 0..200 {
            let spans = random_spans(&mut rng, round % 17);
            for key in (0..40).map(|k| k as f64 * 25.0 - 25.0) {
                let linear = spans
                    .iter()
                    .position(|s| s.start_time >= key)
                    .unwrap_or(spans.len());
                assert_eq!(sorted_index(&spans, key), linear, "key {key} in {spans:?}");
            }
        }
    }

    #[test]
    fn sorted_index_by_custom_accessor() {
        let spans = beats();
        assert_eq!(sorted_index_by(&spans, 1000.0, |s| s.end_time), 1);
        assert_eq!(sorted_index_by(&spans, 1001.0, |s| s.end_time), 2);
    }

    #[test]
    fn find_inside_element() {
        let spans = beats();
        assert_eq!(find_timed_index(&spans, 750.0, FindOptions::default()), Some(1));
        assert_eq!(find_timed_index(&spans, 0.0, FindOptions::default()), Some(0));
        assert_eq!(find_timed_index(&spans, 1500.0, FindOptions::default()), Some(2));
    }

    #[test]
    fn shared_boundary_favors_later_element() {
        let spans = beats();
        assert_eq!(find_timed_index(&spans, 500.0, FindOptions::default()), Some(1));
        assert_eq!(find_timed_index(&spans, 1000.0, FindOptions::default()), Some(2));
    }

    #[test]
    fn find_in_gap_default_is_none() {
        let spans = gapped();
        assert_eq!(find_timed_object(&spans, 250.0, FindOptions::default()), None);
        assert_eq!(find_timed_object(&spans, 50.0, FindOptions::default()), None);
        assert_eq!(find_timed_object(&spans, 800.0, FindOptions::default()), None);
    }

    #[test]
    fn find_in_gap_loose_returns_neighbor() {
        let spans = gapped();
        assert_eq!(find_timed_index(&spans, 250.0, FindOptions::loose()), Some(0));
        assert_eq!(find_timed_index(&spans, 500.0, FindOptions::loose()), Some(1));
        assert_eq!(find_timed_index(&spans, 50.0, FindOptions::loose()), Some(0));
        assert_eq!(find_timed_index(&spans, 9000.0, FindOptions::loose()), Some(2));
        assert_eq!(find_timed_index::<Span>(&[], 0.0, FindOptions::loose()), None);
    }

    #[test]
    fn find_range_returns_first_overlap() {
        let spans = gapped();
        assert_eq!(find_timed_index(&spans, 250.0, FindOptions::range(350.0)), Some(1));
        assert_eq!(find_timed_index(&spans, 150.0, FindOptions::range(650.0)), Some(0));
        assert_eq!(find_timed_index(&spans, 410.0, FindOptions::range(590.0)), None);
        assert_eq!(find_timed_index(&spans, 0.0, FindOptions::range(100.0)), Some(0));
        // Reversed range bounds are normalized.
        assert_eq!(find_timed_index(&spans, 350.0, FindOptions::range(250.0)), Some(1));
    }

    #[test]
    fn loose_takes_precedence_over_range() {
        let spans = gapped();
        let options = FindOptions {
            end_time: Some(590.0),
            loose: true,
        };
        assert_eq!(find_timed_index(&spans, 410.0, options), Some(1));
    }

    #[test]
    fn find_matches_linear_containment() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let spans = random_spans(&mut rng, 12);
            for t in (0..60).map(|k| k as f64 * 20.0) {
                let found = find_timed_index(&spans, t, FindOptions::default());
                let linear = spans.iter().rposition(|s| s.start_time <= t);
                let expected = linear.filter(|&i| spans[i].contains(t));
                assert_eq!(found, expected, "t {t} in {spans:?}");
                if let Some(i) = found {
                    assert!(spans[i].contains(t));
                }
            }
        }
    }

    #[test]
    fn range_forward() {
        let spans = gapped();
        let change = find_timed_objects_in_range(&spans, 150.0, 350.0);
        assert_eq!(change.entered, vec![1]);
        assert_eq!(change.left, vec![0]);
        assert_eq!(change.current, Some(1));
        assert_eq!(change.previous, None);
        assert_eq!(change.next, Some(2));
        assert_eq!(change.touched(), vec![0, 1]);
    }

    #[test]
    fn range_backward_swaps_roles() {
        let spans = gapped();
        let change = find_timed_objects_in_range(&spans, 350.0, 150.0);
        assert_eq!(change.entered, vec![0]);
        assert_eq!(change.left, vec![1]);
        assert_eq!(change.current, Some(0));
        assert_eq!(change.previous, None);
        assert_eq!(change.next, Some(2));
    }

    #[test]
    fn range_neighbors_outside_match() {
        let spans = gapped();
        let change = find_timed_objects_in_range(&spans, 320.0, 380.0);
        assert!(change.entered.is_empty());
        assert!(change.left.is_empty());
        assert_eq!(change.current, Some(1));
        assert_eq!(change.previous, Some(0));
        assert_eq!(change.next, Some(2));
    }

    #[test]
    fn empty_range_only_reports_current() {
        let spans = beats();
        let change = find_timed_objects_in_range(&spans, 700.0, 700.0);
        assert!(change.entered.is_empty());
        assert!(change.left.is_empty());
        assert_eq!(change.current, Some(1));
        assert!(!change.is_empty());

        let none = find_timed_objects_in_range::<Span>(&[], 0.0, 100.0);
        assert!(none.is_empty());
        assert_eq!(none.previous, None);
        assert_eq!(none.next, None);
    }

    #[test]
    fn range_directions_are_symmetric() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let spans = random_spans(&mut rng, 10);
            let t1 = f64::from(rng.gen_range(0..40u32)) * 25.0;
            let t2 = f64::from(rng.gen_range(0..40u32)) * 25.0;
            let forward = find_timed_objects_in_range(&spans, t1, t2);
            let backward = find_timed_objects_in_range(&spans, t2, t1);
            assert_eq!(forward.entered, backward.left, "{t1}->{t2} in {spans:?}");
            assert_eq!(forward.left, backward.entered, "{t1}->{t2} in {spans:?}");
            assert_eq!(forward.previous, backward.previous);
            assert_eq!(forward.next, backward.next);
        }
    }

    #[test]
    fn range_entered_matches_linear_scan() {
        let mut rng = StdRng::seed_from_u64(1234);
        for _ in 0..200 {
            let spans = random_spans(&mut rng, 10);
            let lo = f64::from(rng.gen_range(0..30u32)) * 25.0;
            let hi = lo + f64::from(rng.gen_range(0..10u32)) * 25.0;
            let change = find_timed_objects_in_range(&spans, lo, hi);
            let entered: Vec<usize> = (0..spans.len())
                .filter(|&i| spans[i].start_time > lo && spans[i].start_time <= hi)
                .collect();
            let left: Vec<usize> = (0..spans.len())
                .filter(|&i| spans[i].end_time > lo && spans[i].end_time <= hi)
                .collect();
            assert_eq!(change.entered, entered);
            assert_eq!(change.left, left);
        }
    }

    fn layered() -> Vec<Span> {
        vec![
            Span::new(0.0, 3000.0),
            Span::new(500.0, 1000.0),
            Span::new(800.0, 1200.0),
            Span::new(2500.0, 2800.0),
        ]
    }

    #[test]
    fn containing_sees_every_layer() {
        let spans = layered();
        assert_eq!(find_containing(&spans, 900.0), vec![0, 1, 2]);
        assert_eq!(find_containing(&spans, 2000.0), vec![0]);
        assert!(find_containing(&spans, 3500.0).is_empty());
    }

    #[test]
    fn overlapping_find_prefers_latest_start() {
        let spans = layered();
        assert_eq!(find_overlapping_index(&spans, 900.0, FindOptions::default()), Some(2));
        // The long background is still found once a short layer has ended.
        assert_eq!(find_overlapping_index(&spans, 2000.0, FindOptions::default()), Some(0));
        assert_eq!(find_overlapping_index(&spans, 3500.0, FindOptions::default()), None);
        assert_eq!(find_overlapping_index(&spans, 3500.0, FindOptions::loose()), Some(3));
        assert_eq!(
            find_overlapping_index(&spans, 1500.0, FindOptions::range(2600.0)),
            Some(0)
        );
    }

    #[test]
    fn overlapping_range_reports_long_spans() {
        let spans = layered();
        let change = find_overlapping_in_range(&spans, 1900.0, 2000.0);
        assert!(change.entered.is_empty());
        assert!(change.left.is_empty());
        assert_eq!(change.current, Some(0));
        assert_eq!(change.previous, Some(2));
        assert_eq!(change.next, Some(3));

        let forward = find_overlapping_in_range(&spans, 700.0, 2600.0);
        assert_eq!(forward.entered, vec![2, 3]);
        assert_eq!(forward.left, vec![1, 2]);
        let backward = find_overlapping_in_range(&spans, 2600.0, 700.0);
        assert_eq!(backward.entered, forward.left);
        assert_eq!(backward.left, forward.entered);
    }

    #[test]
    fn overlapping_find_agrees_on_disjoint_input() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..100 {
            let spans = random_spans(&mut rng, 10);
            for t in (0..60).map(|k| k as f64 * 20.0) {
                // Zero-length neighbors may share a point, so only compare
                // when at most one span contains it.
                if find_containing(&spans, t).len() > 1 {
                    continue;
                }
                assert_eq!(
                    find_overlapping_index(&spans, t, FindOptions::default()),
                    find_timed_index(&spans, t, FindOptions::default()),
                    "t {t} in {spans:?}"
                );
            }
        }
    }
}
