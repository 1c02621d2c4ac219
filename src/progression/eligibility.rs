//! Derives the locked / claimable / claimed tri-state for every active
//! prize. The progress read endpoint renders this directly; the claim
//! transaction enforces the same inclusive boundary on its own fresh reads.

use std::collections::HashSet;

use serde::Serialize;

use crate::db::models::prize::{Prize, PrizeId};
use crate::progression::track::{TrackInsets, map_to_percent, marker_percent, thresholds_of};

#[derive(Debug, Clone, Serialize)]
pub struct PrizeProgress {
    pub prize_id: PrizeId,
    pub title: String,
    pub description: String,
    pub points_required: i64,
    pub display_order: i32,
    /// Catalog-wide track fill, identical for every entry in one snapshot.
    pub progress_percentage: f64,
    /// This prize's own marker position on the same track.
    pub marker_percentage: f64,
    pub can_claim: bool,
    pub is_claimed: bool,
}

/// Pure evaluation over a catalog snapshot. Inactive prizes are skipped;
/// active prizes come back in ascending display order. No side effects.
pub fn evaluate(
    points: i64,
    prizes: &[Prize],
    claims: &HashSet<PrizeId>,
    insets: TrackInsets,
) -> Vec<PrizeProgress> {
    let thresholds = thresholds_of(prizes);
    let fill = map_to_percent(points, &thresholds, insets);

    let mut active: Vec<&Prize> = prizes.iter().filter(|p| p.is_active).collect();
    active.sort_by_key(|p| p.display_order);

    active
        .into_iter()
        .map(|prize| {
            let is_claimed = claims.contains(&prize.id);
            // inclusive boundary: reaching the threshold unlocks the prize
            let can_claim = !is_claimed && points >= prize.points_required;

            PrizeProgress {
                prize_id: prize.id,
                title: prize.title.clone(),
                description: prize.description.clone(),
                points_required: prize.points_required,
                display_order: prize.display_order,
                progress_percentage: fill,
                marker_percentage: marker_percent(prize.points_required, &thresholds, insets),
                can_claim,
                is_claimed,
            }
        })
        .collect()
}
