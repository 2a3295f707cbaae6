//! Heuristic narration timing.
//!
//! Speech engines do not report how long an utterance will take, so durations
//! are estimated from the word count at a baseline speaking pace. The numbers
//! drive the progress display and section highlighting only.

use serde::{Deserialize, Serialize};

use crate::content::NarrationUnit;

/// Baseline speaking pace at rate 1.0.
pub const WORDS_PER_MINUTE: f64 = 150.0;

/// Length of [`SectionTimestamp::preview_text`], in characters.
const PREVIEW_CHARS: usize = 50;

/// Estimated window during which one section is being read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionTimestamp {
    /// Start, in seconds from the beginning of the narration.
    pub start: f64,
    /// End, in seconds. Always greater than `start`.
    pub end: f64,
    pub section_index: usize,
    pub preview_text: String,
}

impl SectionTimestamp {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time < self.end
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Estimated speaking time of `text` in seconds at the given rate.
///
/// Every utterance is counted as at least one word so that no estimate is
/// zero-length.
pub fn estimate_duration(text: &str, rate: f32) -> f64 {
    let words = word_count(text).max(1) as f64;
    words / (WORDS_PER_MINUTE * f64::from(rate)) * 60.0
}

/// Lay out contiguous timestamps for `units`, in order, starting at zero.
pub fn generate_timestamps(units: &[NarrationUnit], rate: f32) -> Vec<SectionTimestamp> {
    let mut cursor = 0.0;
    units
        .iter()
        .map(|unit| {
            let start = cursor;
            cursor += estimate_duration(&unit.text, rate);
            SectionTimestamp {
                start,
                end: cursor,
                section_index: unit.section_index,
                preview_text: unit.text.chars().take(PREVIEW_CHARS).collect(),
            }
        })
        .collect()
}

pub fn total_duration(timestamps: &[SectionTimestamp]) -> f64 {
    timestamps.last().map_or(0.0, |last| last.end)
}

/// Format seconds as `m:ss` for progress displays.
pub fn format_time(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", whole / 60, whole % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["wort"; n].join(" ")
    }

    #[test]
    fn estimates_at_150_words_per_minute() {
        assert!((estimate_duration(&words(150), 1.0) - 60.0).abs() < 1e-9);
        assert!((estimate_duration(&words(10), 1.0) - 4.0).abs() < 1e-9);
        assert!((estimate_duration(&words(10), 2.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn slower_rate_estimates_longer() {
        let text = words(37);
        let rates = [0.5_f32, 0.75, 1.0, 1.25, 1.5, 2.0];
        for pair in rates.windows(2) {
            assert!(estimate_duration(&text, pair[0]) > estimate_duration(&text, pair[1]));
        }
    }

    #[test]
    fn word_count_splits_on_whitespace_runs() {
        assert_eq!(word_count("  eins\tzwei \n\n drei "), 3);
        assert_eq!(word_count(""), 0);
        assert!(estimate_duration("", 1.0) > 0.0);
    }

    #[test]
    fn timestamps_are_contiguous_and_sum_to_total() {
        let units = vec![
            NarrationUnit::new(words(10), 0),
            NarrationUnit::new(words(20), 2),
            NarrationUnit::new(words(5), 3),
        ];
        let stamps = generate_timestamps(&units, 1.0);

        assert_eq!(stamps.len(), 3);
        assert_eq!(stamps[0].start, 0.0);
        for pair in stamps.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert!(stamps.iter().all(|s| s.end > s.start));
        let sum: f64 = stamps.iter().map(SectionTimestamp::duration).sum();
        assert!((sum - total_duration(&stamps)).abs() < 1e-9);
        assert!((total_duration(&stamps) - 14.0).abs() < 1e-9);
        assert_eq!(stamps[1].section_index, 2);
    }

    #[test]
    fn preview_is_truncated_on_char_boundaries() {
        let text = "ü".repeat(80);
        let stamps = generate_timestamps(&[NarrationUnit::new(text, 0)], 1.0);
        assert_eq!(stamps[0].preview_text.chars().count(), 50);
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(9.99), "0:09");
        assert_eq!(format_time(75.2), "1:15");
        assert_eq!(format_time(-3.0), "0:00");
        assert_eq!(format_time(f64::NAN), "0:00");
    }
}
