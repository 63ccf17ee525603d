//! Combines segments from every source into one ordered transcript.
//!
//! Two segments are duplicates when they start within [`DUPLICATE_WINDOW_SECS`]
//! of each other and their texts are more than [`SIMILARITY_THRESHOLD`]
//! similar. Of a duplicate pair the higher-priority source is kept.
//!
//! The duplicate pass compares each candidate with every kept segment, so the
//! cost is quadratic in the number of segments. That is fine for the few
//! hundred segments a video produces and should be revisited before feeding
//! unbounded inputs through it.

use std::collections::{BTreeMap, HashSet};

use crate::segment::{MergeStats, MergedResult, SourceStats, TextSegment, TextSource};

pub const DUPLICATE_WINDOW_SECS: f64 = 1.0;
pub const SIMILARITY_THRESHOLD: f64 = 0.85;

/// Texts shorter than this are compared by character set, longer ones by bigrams
const BIGRAM_MIN_CHARS: usize = 50;

/// Separator between segments in the full text
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Merge segments from all sources, drop duplicates and sort by start time
pub fn merge(segments: Vec<TextSegment>) -> MergedResult {
    if segments.is_empty() {
        return MergedResult::empty();
    }

    let mut sorted = segments;
    sorted.sort_by(|a, b| {
        a.start_time
            .total_cmp(&b.start_time)
            .then_with(|| b.source.priority().cmp(&a.source.priority()))
    });

    let mut kept: Vec<TextSegment> = Vec::with_capacity(sorted.len());
    for candidate in sorted {
        let shadowed = kept.iter().any(|existing| {
            is_duplicate(&candidate, existing)
                && existing.source.priority() >= candidate.source.priority()
        });

        if shadowed {
            tracing::trace!(
                source = %candidate.source,
                start = candidate.start_time,
                "Dropping duplicate segment"
            );
        } else {
            kept.push(candidate);
        }
    }

    kept.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    let full_text = kept
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(PARAGRAPH_SEPARATOR);

    let stats = source_stats(&kept);

    MergedResult {
        full_text,
        segments: kept,
        stats,
    }
}

/// Time-window plus text-similarity duplicate test
pub fn is_duplicate(a: &TextSegment, b: &TextSegment) -> bool {
    if (a.start_time - b.start_time).abs() > DUPLICATE_WINDOW_SECS {
        return false;
    }
    similarity(&a.text, &b.text) > SIMILARITY_THRESHOLD
}

/// Jaccard index over character sets (short texts) or bigram sets (long texts).
///
/// A short and a long text never share a shingle, so they score 0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a_set = shingles(a);
    let b_set = shingles(b);

    if a_set.is_empty() || b_set.is_empty() {
        return 0.0;
    }

    let intersection = a_set.intersection(&b_set).count();
    let union = a_set.union(&b_set).count();

    intersection as f64 / union as f64
}

/// Single characters are `(c, None)`, bigrams `(c, Some(next))`.
fn shingles(text: &str) -> HashSet<(char, Option<char>)> {
    let chars: Vec<char> = text.chars().collect();

    if chars.len() < BIGRAM_MIN_CHARS {
        chars.into_iter().map(|c| (c, None)).collect()
    } else {
        chars.windows(2).map(|w| (w[0], Some(w[1]))).collect()
    }
}

fn source_stats(segments: &[TextSegment]) -> MergeStats {
    let mut sources = BTreeMap::new();

    for source in TextSource::ALL {
        let stats = segments
            .iter()
            .filter(|s| s.source == source)
            .fold(SourceStats::default(), |mut acc, s| {
                acc.segment_count += 1;
                acc.char_count += s.char_count();
                acc
            });

        if stats.segment_count > 0 {
            sources.insert(source.as_str().to_string(), stats);
        }
    }

    MergeStats {
        sources,
        error: None,
    }
}
