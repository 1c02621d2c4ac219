//! Maps raw point values onto the visual reward track.
//!
//! Thresholds are arbitrary and often badly skewed (100, 150, 3000). A
//! straight linear map would crush the early prizes into a sliver, so each
//! consecutive threshold pair gets equal visual width and points interpolate
//! linearly inside their segment. Prize markers come out of the same formula
//! family as the fill bar, so the two cannot drift apart.

use crate::constants::{TRACK_END_INSET, TRACK_START_INSET};
use crate::db::models::prize::Prize;

#[derive(Debug, Clone, Copy)]
pub struct TrackInsets {
    pub start: f64,
    pub end: f64,
}

impl Default for TrackInsets {
    fn default() -> Self {
        Self {
            start: TRACK_START_INSET,
            end: TRACK_END_INSET,
        }
    }
}

impl TrackInsets {
    fn usable_span(&self) -> f64 {
        100.0 - self.start - self.end
    }
}

/// Sorted, deduplicated threshold list for a catalog snapshot. Inactive
/// prizes are not part of the visible track.
pub fn thresholds_of(prizes: &[Prize]) -> Vec<i64> {
    let mut thresholds: Vec<i64> = prizes
        .iter()
        .filter(|p| p.is_active)
        .map(|p| p.points_required)
        .collect();

    thresholds.sort_unstable();
    thresholds.dedup();
    thresholds
}

/// Maps a point value into `[insets.start, 100 - insets.end]`. Monotonic
/// non-decreasing in `points` for a fixed threshold list.
pub fn map_to_percent(points: i64, thresholds: &[i64], insets: TrackInsets) -> f64 {
    let mut thresholds = thresholds.to_vec();
    thresholds.sort_unstable();

    let n = thresholds.len();
    match n {
        0 => 0.0,
        1 => {
            if points >= thresholds[0] {
                100.0 - insets.end
            } else {
                insets.start
            }
        }
        _ => {
            if points <= thresholds[0] {
                return insets.start;
            }
            if points >= thresholds[n - 1] {
                return 100.0 - insets.end;
            }

            let segment_width = insets.usable_span() / (n - 1) as f64;

            // points is strictly inside (first, last), so a segment exists
            let mut index = 0usize;
            let mut local_t = 0.0f64;
            for (i, pair) in thresholds.windows(2).enumerate() {
                let (lo, hi) = (pair[0], pair[1]);
                if points >= lo && points <= hi {
                    index = i;
                    local_t = if hi == lo {
                        // duplicate thresholds collapse the segment
                        if points >= hi { 1.0 } else { 0.0 }
                    } else {
                        (points - lo) as f64 / (hi - lo) as f64
                    };
                    break;
                }
            }

            insets.start + (index as f64 + local_t) * segment_width
        }
    }
}

/// Marker position for a prize's own threshold: `start + rank * segment`.
/// Exactly equal to `map_to_percent(threshold, ..)`, by construction.
pub fn marker_percent(threshold: i64, thresholds: &[i64], insets: TrackInsets) -> f64 {
    let n = thresholds.len();
    match n {
        0 => 0.0,
        1 => 100.0 - insets.end,
        _ => {
            let Some(rank) = thresholds.iter().position(|t| *t == threshold) else {
                // not on the track (e.g. freshly deactivated); fall back to
                // the fill mapping for a stable position
                return map_to_percent(threshold, thresholds, insets);
            };

            let segment_width = insets.usable_span() / (n - 1) as f64;
            insets.start + rank as f64 * segment_width
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const EPS: f64 = 1e-9;

    fn insets() -> TrackInsets {
        TrackInsets::default()
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < EPS, "expected {b}, got {a}");
    }

    #[test]
    fn test_empty_catalog_maps_to_zero() {
        assert_close(map_to_percent(500, &[], insets()), 0.0);
    }

    #[test]
    fn test_single_threshold_steps_at_value() {
        let t = [250];
        assert_close(map_to_percent(0, &t, insets()), 8.0);
        assert_close(map_to_percent(249, &t, insets()), 8.0);
        assert_close(map_to_percent(250, &t, insets()), 92.0);
        assert_close(map_to_percent(9000, &t, insets()), 92.0);
    }

    #[test]
    fn test_reference_scenario() {
        // thresholds [100, 500, 2000], inset 8: segment = (92 - 8) / 2 = 42
        let t = [100, 500, 2000];
        assert_close(map_to_percent(100, &t, insets()), 8.0);
        assert_close(map_to_percent(2000, &t, insets()), 92.0);
        // 300 is halfway through the first segment: 8 + 0.5 * 42 = 29
        assert_close(map_to_percent(300, &t, insets()), 29.0);
    }

    #[test]
    fn test_clamps_outside_range() {
        let t = [100, 500, 2000];
        assert_close(map_to_percent(0, &t, insets()), 8.0);
        assert_close(map_to_percent(50, &t, insets()), 8.0);
        assert_close(map_to_percent(1_000_000, &t, insets()), 92.0);
    }

    #[test]
    fn test_equal_visual_width_per_segment() {
        // mid-threshold of a skewed catalog sits exactly halfway visually
        let t = [100, 150, 3000];
        assert_close(map_to_percent(150, &t, insets()), 50.0);
    }

    #[test]
    fn test_monotonic_and_bounded() {
        let t = [100, 150, 500, 2000, 3000];
        let mut prev = f64::MIN;

        for points in (0i64..3500).step_by(7) {
            let pct = map_to_percent(points, &t, insets());
            assert!(pct >= 8.0 - EPS && pct <= 92.0 + EPS, "out of bounds at {points}");
            assert!(pct >= prev - EPS, "not monotonic at {points}");
            prev = pct;
        }
    }

    #[test]
    fn test_duplicate_threshold_guard() {
        // degenerate input with equal thresholds must not divide by zero
        let t = [100, 100, 500];
        let pct = map_to_percent(100, &t, insets());
        assert!(pct.is_finite());
        assert!(pct >= 8.0 - EPS && pct <= 92.0 + EPS);
    }

    #[test]
    fn test_marker_matches_fill_at_threshold() {
        let t = [100, 500, 2000];
        for threshold in t {
            assert_close(
                marker_percent(threshold, &t, insets()),
                map_to_percent(threshold, &t, insets()),
            );
        }
    }

    #[test]
    fn test_markers_never_collide() {
        // grossly skewed point spacing still yields evenly spread markers
        let t = [10, 11, 5000, 100_000];
        let positions: Vec<f64> = t
            .iter()
            .map(|th| marker_percent(*th, &t, insets()))
            .collect();

        for pair in positions.windows(2) {
            assert!(pair[1] - pair[0] > 1.0, "markers collide: {positions:?}");
        }
    }

    #[test]
    fn test_custom_insets() {
        let custom = TrackInsets { start: 0.0, end: 0.0 };
        let t = [0, 100];
        assert_close(map_to_percent(0, &t, custom), 0.0);
        assert_close(map_to_percent(50, &t, custom), 50.0);
        assert_close(map_to_percent(100, &t, custom), 100.0);
    }
}
