//! Elapsed time → highlighted lesson section.

use crate::timing::SectionTimestamp;

/// Position in `timestamps` of the entry whose window contains `time`.
///
/// `timestamps` must be ordered and contiguous, as produced by
/// [`generate_timestamps`](crate::timing::generate_timestamps).
pub fn unit_at(timestamps: &[SectionTimestamp], time: f64) -> Option<usize> {
    let candidate = timestamps.partition_point(|stamp| stamp.end <= time);
    timestamps
        .get(candidate)
        .filter(|stamp| stamp.contains(time))
        .map(|_| candidate)
}

/// Section index to highlight at `time`, or `None` when `time` falls outside
/// every window (before the start, after the end, or NaN).
pub fn section_at(timestamps: &[SectionTimestamp], time: f64) -> Option<usize> {
    unit_at(timestamps, time).map(|position| timestamps[position].section_index)
}
