//! # Corridor Filter and Selection
//!
//! Projects candidates onto a route, keeps those inside the corridor that carry every
//! required capability, then applies a [`SelectionPolicy`].
//!
//! ## Algorithm
//! 1. (Indexed path) Query an R-tree for candidates inside the route's bounding box,
//!    grown by a conservative degree buffer. Hits are restored to input order.
//! 2. Drop candidates missing a required capability.
//! 3. Project the rest onto the route; keep `distance <= max_corridor_km`.
//! 4. Select:
//!    - `Unthinned`: everything, sorted by route position (stable).
//!    - `IntervalSampled`: for each rest target at `k * interval` km, the candidate
//!      whose position is closest; deduplicated and sorted by position.

use crate::candidate::{Candidate, Capability};
use crate::geo_utils::{km_to_lat_degrees, km_to_lng_degrees};
use crate::polyline::Polyline;
use crate::Bounds;
use log::debug;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Extra width on the spatial pre-filter, relative to the corridor width.
/// The planar frame and the degree buffer use slightly different scales.
const PREFILTER_SLACK: f64 = 1.01;

/// How filtered candidates are turned into results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum SelectionPolicy {
    /// Every candidate inside the corridor, ordered along the route.
    Unthinned,
    /// One candidate per rest stop, spaced `rest_interval_km` apart.
    #[serde(rename_all = "camelCase")]
    IntervalSampled { rest_interval_km: f64 },
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy::IntervalSampled { rest_interval_km: 100.0 }
    }
}

/// A candidate inside the corridor with its projection onto the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorridorMatch {
    pub candidate: Candidate,
    /// Distance from the route (km)
    pub distance_from_route_km: f64,
    /// Normalized position along the route: 0.0 = origin, 1.0 = destination
    pub route_position: f64,
}

fn match_candidate(
    candidate: &Candidate,
    route: &Polyline,
    max_corridor_km: f64,
    required: &BTreeSet<Capability>,
) -> Option<CorridorMatch> {
    if !candidate.location.is_valid() || !candidate.has_all(required) {
        return None;
    }

    let projection = route.project(&candidate.location);
    if projection.distance_km <= max_corridor_km {
        Some(CorridorMatch {
            candidate: candidate.clone(),
            distance_from_route_km: projection.distance_km,
            route_position: projection.position,
        })
    } else {
        None
    }
}

fn match_all(
    candidates: &[&Candidate],
    route: &Polyline,
    max_corridor_km: f64,
    required: &BTreeSet<Capability>,
) -> Vec<CorridorMatch> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        candidates
            .par_iter()
            .filter_map(|c| match_candidate(c, route, max_corridor_km, required))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        candidates
            .iter()
            .filter_map(|c| match_candidate(c, route, max_corridor_km, required))
            .collect()
    }
}

/// Project every candidate onto the route and keep those inside the corridor.
///
/// The corridor boundary is inclusive. Output keeps input order.
pub fn project_candidates(
    candidates: &[Candidate],
    route: &Polyline,
    max_corridor_km: f64,
    required: &BTreeSet<Capability>,
) -> Vec<CorridorMatch> {
    let refs: Vec<&Candidate> = candidates.iter().collect();
    match_all(&refs, route, max_corridor_km, required)
}

/// Normalized rest-stop positions: `k * interval_km / total_km` for `k >= 1` while the
/// distance stays strictly below `total_km`.
///
/// Never includes the origin or the destination. Empty when the route is shorter than
/// one interval or either input is not a positive finite number.
///
/// # Example
/// ```
/// use route_corridor::rest_targets;
/// assert_eq!(rest_targets(300.0, 100.0), vec![100.0 / 300.0, 200.0 / 300.0]);
/// assert!(rest_targets(80.0, 100.0).is_empty());
/// ```
pub fn rest_targets(total_km: f64, interval_km: f64) -> Vec<f64> {
    if !(total_km.is_finite() && total_km > 0.0 && interval_km.is_finite() && interval_km > 0.0) {
        return vec![];
    }

    (1u64..)
        .map(|k| k as f64 * interval_km)
        .take_while(|d| *d < total_km)
        .map(|d| d / total_km)
        .collect()
}

/// Apply a selection policy to corridor matches.
pub fn select_candidates(
    mut matches: Vec<CorridorMatch>,
    policy: SelectionPolicy,
    total_km: f64,
) -> Vec<CorridorMatch> {
    match policy {
        SelectionPolicy::Unthinned => {
            matches.sort_by(|a, b| a.route_position.total_cmp(&b.route_position));
            matches
        }
        SelectionPolicy::IntervalSampled { rest_interval_km } => {
            let targets = rest_targets(total_km, rest_interval_km);
            if targets.is_empty() || matches.is_empty() {
                return vec![];
            }

            let mut seen: HashSet<&str> = HashSet::new();
            let mut chosen: Vec<usize> = Vec::with_capacity(targets.len());

            for target in &targets {
                let mut best: Option<(usize, f64)> = None;
                for (i, m) in matches.iter().enumerate() {
                    let diff = (m.route_position - target).abs();
                    if best.map_or(true, |(_, best_diff)| diff < best_diff) {
                        best = Some((i, diff));
                    }
                }
                if let Some((i, _)) = best {
                    if seen.insert(matches[i].candidate.id.as_str()) {
                        chosen.push(i);
                    }
                }
            }

            debug!(
                "[Corridor] {} rest targets picked {} of {} candidates",
                targets.len(),
                chosen.len(),
                matches.len()
            );

            let mut selected: Vec<CorridorMatch> =
                chosen.into_iter().map(|i| matches[i].clone()).collect();
            selected.sort_by(|a, b| a.route_position.total_cmp(&b.route_position));
            selected
        }
    }
}

// =============================================================================
// R-tree Indexed Candidates
// =============================================================================

/// Candidate location with its index into the snapshot
#[derive(Debug, Clone, Copy)]
struct IndexedCandidate {
    idx: usize,
    lat: f64,
    lng: f64,
}

impl RTreeObject for IndexedCandidate {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.lng, self.lat])
    }
}

/// A candidate snapshot with a spatial index, reusable across searches.
pub struct CandidateIndex {
    candidates: Vec<Candidate>,
    tree: RTree<IndexedCandidate>,
}

impl CandidateIndex {
    /// Index a snapshot. Candidates with invalid coordinates are kept in the snapshot
    /// but never match.
    pub fn new(candidates: Vec<Candidate>) -> Self {
        let indexed: Vec<IndexedCandidate> = candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.location.is_valid())
            .map(|(idx, c)| IndexedCandidate {
                idx,
                lat: c.location.latitude,
                lng: c.location.longitude,
            })
            .collect();

        let tree = RTree::bulk_load(indexed);
        Self { candidates, tree }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Same result as [`project_candidates`] over the whole snapshot, but only projects
    /// candidates near the route.
    pub fn corridor_matches(
        &self,
        route: &Polyline,
        max_corridor_km: f64,
        required: &BTreeSet<Capability>,
    ) -> Vec<CorridorMatch> {
        let Some(bounds) = Bounds::from_points(route.points()) else {
            // Without a route every candidate is at distance zero
            return project_candidates(&self.candidates, route, max_corridor_km, required);
        };

        if !max_corridor_km.is_finite() {
            return project_candidates(&self.candidates, route, max_corridor_km, required);
        }

        let buffer_km = max_corridor_km.max(0.0) * PREFILTER_SLACK;
        let lat_margin = km_to_lat_degrees(buffer_km);
        let lng_margin = km_to_lng_degrees(buffer_km, bounds.expand(lat_margin, 0.0).max_abs_lat());
        let area = bounds.expand(lat_margin, lng_margin);

        let envelope = AABB::from_corners([area.min_lng, area.min_lat], [area.max_lng, area.max_lat]);

        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope(&envelope)
            .map(|c| c.idx)
            .collect();
        hits.sort_unstable();

        debug!(
            "[Corridor] Pre-filter kept {} of {} candidates",
            hits.len(),
            self.candidates.len()
        );

        let nearby: Vec<&Candidate> = hits.iter().map(|&i| &self.candidates[i]).collect();
        match_all(&nearby, route, max_corridor_km, required)
    }
}

impl From<Vec<Candidate>> for CandidateIndex {
    fn from(candidates: Vec<Candidate>) -> Self {
        Self::new(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeoPoint;
    use approx::assert_relative_eq;

    fn lot(id: &str, lat: f64, lng: f64) -> Candidate {
        Candidate::new(id, id, GeoPoint::new(lat, lng))
    }

    fn at_position(id: &str, position: f64) -> CorridorMatch {
        CorridorMatch {
            candidate: lot(id, 0.0, 0.0),
            distance_from_route_km: 0.0,
            route_position: position,
        }
    }

    fn ids(matches: &[CorridorMatch]) -> Vec<&str> {
        matches.iter().map(|m| m.candidate.id.as_str()).collect()
    }

    /// Meridian route along 135E from 34N to 36N (~222 km)
    fn meridian_route() -> Polyline {
        Polyline::new(vec![GeoPoint::new(34.0, 135.0), GeoPoint::new(36.0, 135.0)])
    }

    #[test]
    fn test_rest_targets() {
        assert_eq!(rest_targets(300.0, 100.0), vec![1.0 / 3.0, 2.0 / 3.0]);
        assert_eq!(rest_targets(301.0, 100.0).len(), 3);
        assert!(rest_targets(100.0, 100.0).is_empty());
        assert!(rest_targets(99.0, 100.0).is_empty());
        assert!(rest_targets(300.0, 0.0).is_empty());
        assert!(rest_targets(300.0, -5.0).is_empty());
        assert!(rest_targets(0.0, 100.0).is_empty());
        assert!(rest_targets(f64::INFINITY, 100.0).is_empty());
    }

    #[test]
    fn test_boundary_distance_is_inclusive() {
        let route = meridian_route();
        // Exactly 0.1 degree of longitude east of the route at 35N
        let c = lot("edge", 35.0, 135.1);
        let exact = route.project(&c.location).distance_km;

        let kept = project_candidates(&[c.clone()], &route, exact, &BTreeSet::new());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].distance_from_route_km, exact);

        let dropped = project_candidates(&[c], &route, exact - 1e-9, &BTreeSet::new());
        assert!(dropped.is_empty());
    }

    #[test]
    fn test_capability_filter() {
        let route = meridian_route();
        let candidates = vec![
            lot("plain", 35.0, 135.0),
            lot("truck", 35.1, 135.0).with_capabilities([Capability::LargeVehicle]),
            lot("full", 35.2, 135.0)
                .with_capabilities([Capability::LargeVehicle, Capability::Shower]),
        ];

        let required: BTreeSet<Capability> =
            [Capability::LargeVehicle, Capability::Shower].into_iter().collect();
        let kept = project_candidates(&candidates, &route, 10.0, &required);
        assert_eq!(ids(&kept), vec!["full"]);

        let all = project_candidates(&candidates, &route, 10.0, &BTreeSet::new());
        assert_eq!(ids(&all), vec!["plain", "truck", "full"]);
    }

    #[test]
    fn test_invalid_coordinates_never_match() {
        let route = meridian_route();
        let candidates = vec![lot("nan", f64::NAN, 135.0), lot("ok", 35.0, 135.0)];

        let kept = project_candidates(&candidates, &route, 10.0, &BTreeSet::new());
        assert_eq!(ids(&kept), vec!["ok"]);

        let index = CandidateIndex::new(candidates);
        let kept = index.corridor_matches(&route, 10.0, &BTreeSet::new());
        assert_eq!(ids(&kept), vec!["ok"]);
    }

    #[test]
    fn test_unthinned_sorts_stably() {
        let matches = vec![
            at_position("c", 0.8),
            at_position("a", 0.2),
            at_position("b1", 0.5),
            at_position("b2", 0.5),
        ];
        let selected = select_candidates(matches, SelectionPolicy::Unthinned, 300.0);
        assert_eq!(ids(&selected), vec!["a", "b1", "b2", "c"]);
    }

    #[test]
    fn test_interval_sampling_picks_closest_per_target() {
        // Targets at 1/3 and 2/3 on a 300 km route
        let matches = vec![
            at_position("far", 0.9),
            at_position("second", 0.70),
            at_position("first", 0.30),
            at_position("near-first", 0.25),
        ];
        let policy = SelectionPolicy::IntervalSampled { rest_interval_km: 100.0 };
        let selected = select_candidates(matches, policy, 300.0);
        assert_eq!(ids(&selected), vec!["first", "second"]);
    }

    #[test]
    fn test_interval_sampling_dedupes() {
        // A single candidate is the closest to both targets
        let matches = vec![at_position("only", 0.5), at_position("late", 0.99)];
        let policy = SelectionPolicy::IntervalSampled { rest_interval_km: 100.0 };
        let selected = select_candidates(matches, policy, 300.0);
        assert_eq!(ids(&selected), vec!["only"]);
    }

    #[test]
    fn test_interval_sampling_tie_takes_first_encountered() {
        // Both are 0.25 from the single target at 0.5
        let matches = vec![at_position("after", 0.75), at_position("before", 0.25)];
        let policy = SelectionPolicy::IntervalSampled { rest_interval_km: 100.0 };
        let selected = select_candidates(matches, policy, 200.0);
        assert_eq!(ids(&selected), vec!["after"]);
    }

    #[test]
    fn test_interval_sampling_short_route_is_empty() {
        let matches = vec![at_position("a", 0.5)];
        let policy = SelectionPolicy::IntervalSampled { rest_interval_km: 100.0 };
        assert!(select_candidates(matches, policy, 90.0).is_empty());
    }

    #[test]
    fn test_interval_sampling_at_most_one_per_target() {
        let matches: Vec<CorridorMatch> = (0..50)
            .map(|i| at_position(&format!("lot-{}", i), i as f64 / 50.0))
            .collect();
        let policy = SelectionPolicy::IntervalSampled { rest_interval_km: 100.0 };
        let selected = select_candidates(matches, policy, 300.0);
        assert!(selected.len() <= 2);
        assert_eq!(selected.len(), 2);
        assert!(selected[0].route_position < selected[1].route_position);
    }

    #[test]
    fn test_index_matches_unindexed_path() {
        let route = Polyline::new(vec![
            GeoPoint::new(34.3853, 132.4553),
            GeoPoint::new(34.48, 133.36),
            GeoPoint::new(34.6551, 133.9195),
        ]);

        let mut candidates = Vec::new();
        for i in 0..20 {
            for j in 0..20 {
                let lat = 34.0 + i as f64 * 0.05;
                let lng = 132.0 + j as f64 * 0.1;
                candidates.push(lot(&format!("{}-{}", i, j), lat, lng));
            }
        }

        let required = BTreeSet::new();
        for max_km in [0.0, 2.0, 10.0, 25.0] {
            let plain = project_candidates(&candidates, &route, max_km, &required);
            let index = CandidateIndex::new(candidates.clone());
            let indexed = index.corridor_matches(&route, max_km, &required);
            assert_eq!(plain, indexed, "mismatch at {} km", max_km);
        }
    }

    #[test]
    fn test_index_with_empty_route() {
        let index = CandidateIndex::from(vec![lot("a", 35.0, 135.0)]);
        assert_eq!(index.len(), 1);
        assert!(!index.is_empty());

        let kept = index.corridor_matches(&Polyline::new(vec![]), 0.0, &BTreeSet::new());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].distance_from_route_km, 0.0);
    }

    #[test]
    fn test_midpoint_of_straight_line() {
        let a = GeoPoint::new(34.0, 135.0);
        let b = GeoPoint::new(36.0, 135.0);
        let route = Polyline::new(vec![a, b]);
        let kept = project_candidates(&[lot("mid", 35.0, 135.0)], &route, 1.0, &BTreeSet::new());

        assert_eq!(kept.len(), 1);
        assert!(kept[0].distance_from_route_km < 1e-9);
        assert_relative_eq!(kept[0].route_position, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_policy_serde() {
        let json = r#"{"mode": "intervalSampled", "restIntervalKm": 150.0}"#;
        let policy: SelectionPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy, SelectionPolicy::IntervalSampled { rest_interval_km: 150.0 });

        let unthinned: SelectionPolicy = serde_json::from_str(r#"{"mode": "unthinned"}"#).unwrap();
        assert_eq!(unthinned, SelectionPolicy::Unthinned);
    }
}
