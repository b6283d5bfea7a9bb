use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::HighlightCandidate;

/// A validated, clamped time span ready to feed the media toolkit.
///
/// Invariants: `0 <= start < end <= media_duration`. A plan lists ranges in
/// ascending start order; overlapping ranges are preserved, not merged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutRange {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("every highlight candidate was dropped during validation")]
    NoValidRanges,
}

/// Validate, clamp, and order candidates against the media's real duration.
///
/// Drops candidates with `end <= start` or `start >= media_duration`; clamps
/// `end` down to the duration otherwise. Surviving ranges are sorted by start
/// time, so the highlight reel plays chronologically rather than in the
/// order the model ranked them.
pub fn plan_cuts(
    candidates: &[HighlightCandidate],
    media_duration: f64,
) -> Result<Vec<CutRange>, PlanError> {
    let mut ranges: Vec<CutRange> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        if candidate.end <= candidate.start {
            debug!(
                "dropping candidate '{}': end {:.3} <= start {:.3}",
                candidate.title, candidate.end, candidate.start
            );
            continue;
        }
        if candidate.start >= media_duration {
            debug!(
                "dropping candidate '{}': starts at {:.3}, past media end {:.3}",
                candidate.title, candidate.start, media_duration
            );
            continue;
        }
        let end = candidate.end.min(media_duration);
        if end < candidate.end {
            debug!(
                "clamping candidate '{}' end {:.3} to media duration {:.3}",
                candidate.title, candidate.end, media_duration
            );
        }
        // Seek arguments carry millisecond precision; a clamped span that
        // rounds to zero on that grid would make the cut fail downstream.
        if (end * 1000.0).round() <= (candidate.start * 1000.0).round() {
            debug!(
                "dropping candidate '{}': clamped span {:.4}s is below the millisecond grid",
                candidate.title,
                end - candidate.start
            );
            continue;
        }
        ranges.push(CutRange {
            start: candidate.start,
            end,
        });
    }

    if ranges.is_empty() {
        return Err(PlanError::NoValidRanges);
    }

    ranges.sort_by(|a, b| a.start.total_cmp(&b.start));

    info!(
        "planned {} cut ranges from {} candidates",
        ranges.len(),
        candidates.len()
    );
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(start: f64, end: f64) -> HighlightCandidate {
        HighlightCandidate {
            title: "t".to_string(),
            start,
            end,
            rationale: String::new(),
        }
    }

    #[test]
    fn test_ordering_is_chronological() {
        let candidates = vec![candidate(120.0, 150.0), candidate(10.0, 20.0)];
        let plan = plan_cuts(&candidates, 600.0).unwrap();
        assert_eq!(
            plan,
            vec![
                CutRange { start: 10.0, end: 20.0 },
                CutRange { start: 120.0, end: 150.0 },
            ]
        );
    }

    #[test]
    fn test_end_clamped_when_start_in_range() {
        let plan = plan_cuts(&[candidate(50.0, 900.0)], 100.0).unwrap();
        assert_eq!(plan, vec![CutRange { start: 50.0, end: 100.0 }]);
    }

    #[test]
    fn test_start_past_duration_dropped() {
        let candidates = vec![candidate(150.0, 200.0), candidate(10.0, 20.0)];
        let plan = plan_cuts(&candidates, 100.0).unwrap();
        assert_eq!(plan, vec![CutRange { start: 10.0, end: 20.0 }]);
    }

    #[test]
    fn test_inverted_and_zero_length_dropped() {
        let candidates = vec![candidate(30.0, 10.0), candidate(5.0, 5.0), candidate(1.0, 2.0)];
        let plan = plan_cuts(&candidates, 100.0).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].start, 1.0);
    }

    #[test]
    fn test_all_dropped_is_no_valid_ranges() {
        let candidates = vec![candidate(30.0, 10.0), candidate(500.0, 600.0)];
        assert_eq!(plan_cuts(&candidates, 100.0).unwrap_err(), PlanError::NoValidRanges);
        assert_eq!(plan_cuts(&[], 100.0).unwrap_err(), PlanError::NoValidRanges);
    }

    #[test]
    fn test_clamped_span_below_millisecond_grid_dropped() {
        // Start sits inside the media's last fractional millisecond: after
        // clamping the span rounds to zero and cannot be cut.
        let candidates = vec![candidate(100.0, 200.0)];
        assert_eq!(
            plan_cuts(&candidates, 100.0004).unwrap_err(),
            PlanError::NoValidRanges
        );
        // A clamped span of a few hundred milliseconds still survives.
        let plan = plan_cuts(&[candidate(100.0, 200.0)], 100.4).unwrap();
        assert_eq!(plan, vec![CutRange { start: 100.0, end: 100.4 }]);
    }

    #[test]
    fn test_overlaps_preserved() {
        let candidates = vec![candidate(10.0, 40.0), candidate(30.0, 60.0)];
        let plan = plan_cuts(&candidates, 100.0).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan[0].end > plan[1].start);
    }
}
