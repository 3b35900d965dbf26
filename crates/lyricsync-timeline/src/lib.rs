//! lyricsync-timeline: timed-object contracts, search, and interpolation.
//!
//! Every query in lyricsync works on slices sorted ascending by start time
//! whose elements do not overlap each other. This crate provides the
//! primitives that answer "what is active at `t`" and "what changed between
//! `t0` and `t1`" over such slices, plus the construction-time pass that
//! fabricates timestamps for units whose source data omits them.
//!
//! # Modules
//!
//! - [`timed`] - The [`TimedObject`] contract and the concrete [`Span`]
//! - [`search`] - Binary search, point lookup, and range diffs
//! - [`interpolate`] - Even subdivision of untimed sibling runs

pub mod interpolate;
pub mod search;
pub mod timed;

// Re-export commonly used items at the crate root.
pub use interpolate::{envelope, interpolate, PartialSpan};
pub use search::{
    find_containing, find_overlapping_in_range, find_overlapping_index, find_timed_index,
    find_timed_object, find_timed_objects_in_range, sorted_index, sorted_index_by, FindOptions,
    RangeChange,
};
pub use timed::{Span, TimedObject};
