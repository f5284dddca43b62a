//! Capacity violation repair.
//!
//! Points redirected away from a full cluster are reordered so the next pass
//! handles them at a better moment, and one overloaded centroid per iteration
//! may trade places with a compatible, less loaded one.

use std::cmp::Reverse;

use rand::Rng;
use tracing::{debug, trace};

use crate::geometry;
use crate::init::{move_to_back, move_to_front};
use crate::relations::relation_group;
use crate::solver::{ClusteringRunState, RunContext};

/// Ratio above which a redirected point is always relocated.
const FORCED_RATIO_CAP: f64 = 5.0;

/// Share of the centroid-to-centroid segment treated as outside at its ends.
const PROJECTION_MARGIN: f64 = 0.1;

/// Extra capacity a swap partner must offer over the violated cluster's load.
const SWAP_CAPACITY_MARGIN: f64 = 1.01;

/// Tolerated increase of depot travel time caused by a swap.
const DEPOT_SWAP_TOLERANCE: f64 = 0.1;

/// Decay applied to every capacity offence counter each iteration.
const OFFENCE_DECAY: f64 = 0.8;

/// A point that was redirected because its closest cluster was full.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ViolationEvent {
    /// Root of the redirected relation group.
    pub point: usize,
    /// Distance added by the redirection.
    pub distance_gap: f64,
    /// Redirected distance over the closest distance.
    pub distance_ratio: f64,
    pub violating_cluster: usize,
    pub alternate_cluster: usize,
    pub alternate_distance: f64,
}

/// Moves redirected relation groups to the front or back of the processing
/// order.
///
/// Events are handled from the highest distance ratio down. A point is always
/// relocated when its ratio is far above the mean; otherwise with probability
/// proportional to the detour it caused. Groups whose root projects between
/// the violating and the alternate centroid go last, the others go first, all
/// members together.
pub(crate) fn move_violating_dataitems(state: &mut ClusteringRunState) {
    state.needed_moving = state.violations.len();
    if state.violations.is_empty() {
        return;
    }

    let count = state.violations.len() as f64;
    let mean_gap = state.violations.iter().map(|e| e.distance_gap).sum::<f64>() / count;
    let mean_ratio = state.violations.iter().map(|e| e.distance_ratio).sum::<f64>() / count;
    let forced_ratio = (2.0 * mean_ratio).min(FORCED_RATIO_CAP);

    let mut events = std::mem::take(&mut state.violations);
    events.sort_by(|a, b| a.distance_ratio.total_cmp(&b.distance_ratio));

    let mut moved_up = 0;
    let mut moved_down = 0;
    while let Some(event) = events.pop() {
        let relocate = event.distance_ratio > forced_ratio
            || state.rng.r#gen::<f64>() < event.distance_gap / (3.0 * mean_gap + 1e-10);
        if !relocate {
            continue;
        }
        trace!(
            point = event.point,
            ratio = event.distance_ratio,
            gap = event.distance_gap,
            alternate_distance = event.alternate_distance,
            "relocating redirected point"
        );

        let inside = geometry::projection_inside_segment(
            state.points[event.point].location(),
            state.centroids[event.violating_cluster].location(),
            state.centroids[event.alternate_cluster].location(),
            PROJECTION_MARGIN,
        );
        let group = relation_group(&state.points, event.point);
        let pinned = group.iter().any(|&member| state.points[member].run.needs_to_stay_at_the_top);

        if inside && !pinned {
            for &member in &group {
                state.points[member].run.moved_down = true;
                move_to_back(&mut state.order, member);
            }
            moved_down += 1;
        } else {
            // Reverse so the group root ends up first.
            for &member in group.iter().rev() {
                state.points[member].run.moved_up = true;
                move_to_front(&mut state.order, member);
            }
            moved_up += 1;
        }
    }

    trace!(needed = state.needed_moving, moved_up, moved_down, "relocated violating points");
}

/// Swaps the most violated centroid with a compatible, less loaded one.
///
/// Only the centroid positions and their cached routing data are exchanged;
/// memberships follow at the next assignment pass. Violated clusters without
/// a partner accumulate capacity offence instead. At most one swap happens.
pub(crate) fn swap_a_centroid_with_capacity_violation(state: &mut ClusteringRunState, ctx: &RunContext<'_>) {
    let mut violated: Vec<usize> = (0..state.centroids.len())
        .filter(|&cluster| !state.redirections[cluster].is_empty())
        .collect();
    violated.sort_by_key(|&cluster| Reverse(state.redirections[cluster].len()));

    for cluster in violated {
        let units = units_that_matter(state, cluster);
        let candidates: Vec<usize> = (0..state.centroids.len())
            .filter(|&candidate| candidate != cluster && can_swap(state, ctx, cluster, candidate, &units))
            .collect();

        if candidates.is_empty() {
            state.centroids[cluster].characteristics.capacity_offence += 1.0;
            continue;
        }

        let mut partner = candidates[0];
        let mut best_score = f64::INFINITY;
        for &candidate in &candidates {
            let mut score = 0.0;
            for unit in &units {
                let limit = state.strict_limits[candidate][unit];
                let jitter = state.rng.gen_range(0.0..0.9) + 0.1;
                score += state.centroids[candidate].load_of(unit) / limit * jitter;
            }
            if score < best_score {
                best_score = score;
                partner = candidate;
            }
        }

        swap_centroids(state, cluster, partner);
        debug!(violated = cluster, partner, "swapped centroids");
        break;
    }

    for redirections in state.redirections.iter_mut() {
        redirections.clear();
    }
    for centroid in state.centroids.iter_mut() {
        centroid.characteristics.capacity_offence *= OFFENCE_DECAY;
    }
}

/// Units loaded in `cluster` that also have a strict limit there.
fn units_that_matter(state: &ClusteringRunState, cluster: usize) -> Vec<String> {
    let Some(limits) = state.strict_limits.get(cluster) else {
        return Vec::new();
    };

    state
        .unit_symbols
        .iter()
        .filter(|unit| state.centroids[cluster].load_of(unit) > 0.0 && limits.contains_key(*unit))
        .cloned()
        .collect()
}

fn can_swap(state: &ClusteringRunState, ctx: &RunContext<'_>, violated: usize, candidate: usize, units: &[String]) -> bool {
    let (Some(violated_limits), Some(candidate_limits)) =
        (state.strict_limits.get(violated), state.strict_limits.get(candidate))
    else {
        return false;
    };

    let lighter = units.iter().all(|unit| {
        let (Some(&violated_limit), Some(&candidate_limit)) = (violated_limits.get(unit), candidate_limits.get(unit))
        else {
            return false;
        };
        let violated_load = state.centroids[violated].load_of(unit);
        let candidate_load = state.centroids[candidate].load_of(unit);

        candidate_load < violated_load
            && candidate_limit > 0.0
            && candidate_limit >= SWAP_CAPACITY_MARGIN * violated_load
            && candidate_limit - candidate_load > violated_limit - violated_load
    });
    if !lighter {
        return false;
    }

    let serves = |members: &[usize], target: usize| {
        members
            .iter()
            .all(|&member| ctx.compatibility.compatible(&state.points[member], &state.centroids[target].characteristics))
    };
    if !serves(&state.clusters[violated], candidate) || !serves(&state.clusters[candidate], violated) {
        return false;
    }

    depot_travel_preserved(state, violated, candidate)
}

/// Whether serving each other's territory keeps depot travel within tolerance.
fn depot_travel_preserved(state: &ClusteringRunState, a: usize, b: usize) -> bool {
    let vehicle_a = state.centroids[a].vehicle;
    let vehicle_b = state.centroids[b].vehicle;

    let mean_trip = |cluster: usize, vehicle: usize| -> Option<f64> {
        let members = &state.clusters[cluster];
        if members.is_empty() {
            return Some(0.0);
        }
        let mut total = 0.0;
        for &member in members {
            total += state.points[member]
                .characteristics
                .duration_from_and_to_depot
                .as_ref()?
                .get(vehicle)?;
        }
        Some(total / members.len() as f64)
    };

    let trips = (
        mean_trip(a, vehicle_a),
        mean_trip(b, vehicle_b),
        mean_trip(a, vehicle_b),
        mean_trip(b, vehicle_a),
    );
    match trips {
        (Some(current_a), Some(current_b), Some(swapped_a), Some(swapped_b)) => {
            swapped_a + swapped_b <= (current_a + current_b) * (1.0 + DEPOT_SWAP_TOLERANCE) + 1e-9
        }
        _ => true,
    }
}

fn swap_centroids(state: &mut ClusteringRunState, a: usize, b: usize) {
    let (first, second) = if a < b { (a, b) } else { (b, a) };
    let (head, tail) = state.centroids.split_at_mut(second);
    let (x, y) = (&mut head[first], &mut tail[0]);

    std::mem::swap(&mut x.lat, &mut y.lat);
    std::mem::swap(&mut x.lng, &mut y.lng);
    std::mem::swap(&mut x.representative, &mut y.representative);
    std::mem::swap(&mut x.representative_id, &mut y.representative_id);
    std::mem::swap(&mut x.characteristics.matrix_index, &mut y.characteristics.matrix_index);
    std::mem::swap(
        &mut x.characteristics.duration_from_and_to_depot,
        &mut y.characteristics.duration_from_and_to_depot,
    );

    state.balance_coefficients.swap(a, b);
}
