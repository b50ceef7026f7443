//! Contiguous frame-range batching.
//!
//! Result downloads fetch completed frames as a batch; the request carries
//! the done-frame set compressed into contiguous ranges
//! (`[1,2,3,7,8,10]` becomes `1:3,7:8,10`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// A contiguous run of frame numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameRange {
    /// A single frame.
    Single(i64),
    /// An inclusive `first:last` span of at least two frames.
    Span(i64, i64),
}

impl FrameRange {
    /// First frame of the range.
    pub fn first(&self) -> i64 {
        match self {
            Self::Single(n) => *n,
            Self::Span(first, _) => *first,
        }
    }

    /// Number of frames covered.
    pub fn len(&self) -> u64 {
        match self {
            Self::Single(_) => 1,
            Self::Span(first, last) => (last - first + 1) as u64,
        }
    }

    /// A range always covers at least one frame.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Span(first, last) => write!(f, "{first}:{last}"),
        }
    }
}

/// Compute contiguous ranges over a set of frame numbers.
///
/// Input order does not matter; duplicates are collapsed. A run of length
/// one yields [`FrameRange::Single`].
pub fn frame_ranges(frames: &[i64]) -> Vec<FrameRange> {
    let mut sorted: Vec<i64> = frames.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(mut start) = iter.next() else {
        return ranges;
    };
    let mut end = start;

    for n in iter {
        if n == end + 1 {
            end = n;
        } else {
            ranges.push(close_range(start, end));
            start = n;
            end = n;
        }
    }
    ranges.push(close_range(start, end));
    ranges
}

fn close_range(start: i64, end: i64) -> FrameRange {
    if start == end {
        FrameRange::Single(start)
    } else {
        FrameRange::Span(start, end)
    }
}

/// Render a range list as the `job-frame-ranges` header value.
pub fn ranges_header(ranges: &[FrameRange]) -> String {
    ranges
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
