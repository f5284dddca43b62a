//! Centroid recomputation.
//!
//! Each centroid moves toward the weighted mean of its members, smoothed with
//! its previous position more and more as the run advances, and is then
//! anchored to a representative member point.

use crate::geometry;
use crate::init::move_to_front;
use crate::model::{Point, VISITS};
use crate::solver::{ClusteringRunState, RunContext};
use crate::traits::{DistanceFunction, Site};
use crate::violations;

/// Weight multiplier of a point moved to the front by the last relocation.
const MOVED_UP_BIAS: f64 = 0.1;

/// Weight multiplier of a point moved to the back by the last relocation.
const MOVED_DOWN_BIAS: f64 = 10.0;

/// Exponent damping the distance and visit terms of a member's weight.
const WEIGHT_EXPONENT: f64 = 0.2;

/// Relocates violating points, moves every centroid, then tries one swap.
pub(crate) fn recompute_centroids(state: &mut ClusteringRunState, ctx: &RunContext<'_>) {
    violations::move_violating_dataitems(state);

    state.old_positions = state.centroids.iter().map(|centroid| centroid.location()).collect();

    let smoothing = 0.1 + 0.9 * state.progress().sqrt();

    for cluster in 0..state.centroids.len() {
        if state.clusters[cluster].is_empty() {
            continue;
        }
        update_centroid(state, ctx, cluster, smoothing);
    }

    violations::swap_a_centroid_with_capacity_violation(state, ctx);

    state.iteration += 1;
}

fn update_centroid(state: &mut ClusteringRunState, ctx: &RunContext<'_>, cluster: usize, smoothing: f64) {
    let members = &state.clusters[cluster];
    let old = state.centroids[cluster].location();

    let mut total_weight = 0.0;
    let mut weighted_lat = 0.0;
    let mut weighted_lng = 0.0;
    for &member in members {
        let weight = member_weight(&state.points[member], old, cluster);
        total_weight += weight;
        weighted_lat += weight * state.points[member].lat;
        weighted_lng += weight * state.points[member].lng;
    }

    let lat = smoothing * old.0 + (1.0 - smoothing) * weighted_lat / total_weight;
    let lng = smoothing * old.1 + (1.0 - smoothing) * weighted_lng / total_weight;

    let representative = select_representative(&state.points, members, (lat, lng), ctx.distance);

    let vehicle = state.centroids[cluster].vehicle;
    let depot_durations: Vec<f64> = members
        .iter()
        .filter_map(|&member| {
            state.points[member]
                .characteristics
                .duration_from_and_to_depot
                .as_ref()
                .and_then(|durations| durations.get(vehicle).copied())
        })
        .collect();

    let centroid = &mut state.centroids[cluster];
    centroid.lat = lat;
    centroid.lng = lng;
    centroid.representative = representative;
    centroid.representative_id = state.points[representative].id.clone();
    centroid.characteristics.matrix_index = state.points[representative].characteristics.matrix_index;
    if !depot_durations.is_empty() {
        centroid.characteristics.duration_from_and_to_depot =
            depot_durations.iter().sum::<f64>() / depot_durations.len() as f64;
    }

    for &member in &state.clusters[cluster] {
        let run = &mut state.points[member].run;
        run.moved_up = false;
        run.moved_down = false;
    }

    if state.cut_symbol.is_some() {
        move_to_front(&mut state.order, representative);
    }
}

/// Pull of one member on its centroid.
fn member_weight(point: &Point, centroid: (f64, f64), cluster: usize) -> f64 {
    let direction_bias = if point.run.moved_up {
        MOVED_UP_BIAS
    } else if point.run.moved_down {
        MOVED_DOWN_BIAS
    } else {
        1.0
    };

    let distance = geometry::flying_distance(centroid, point.location());
    let visits = point.quantity(VISITS).max(0.0);
    let relocation = point.run.centroid_weights.get(cluster).copied().unwrap_or(1.0);

    direction_bias
        * (distance + 1.0).powf(WEIGHT_EXPONENT)
        * visits.powf(WEIGHT_EXPONENT)
        * point.run.compatibility_weight
        * relocation
        + 1e-10
}

/// Picks the member that best represents a cluster centred on `center`.
///
/// Only the few members nearest to the center are considered; among them the
/// one with the smallest visit-weighted distance to all members wins.
pub(crate) fn select_representative(
    points: &[Point],
    members: &[usize],
    center: (f64, f64),
    distance: &dyn DistanceFunction,
) -> usize {
    let shortlist_size = ((members.len() as f64 / 10.0).ceil() as usize).clamp(2, 5);

    let mut nearest: Vec<(f64, usize)> = members
        .iter()
        .map(|&member| (geometry::flying_distance(center, points[member].location()), member))
        .collect();
    nearest.sort_by(|a, b| a.0.total_cmp(&b.0));
    nearest.truncate(shortlist_size);

    let mut best = nearest[0].1;
    let mut best_cost = f64::INFINITY;
    for &(_, candidate) in &nearest {
        let from = Site::of_point(&points[candidate]);
        let cost: f64 = members
            .iter()
            .map(|&other| distance.distance(from, Site::of_point(&points[other])) * points[other].quantity(VISITS))
            .sum();
        if cost < best_cost {
            best_cost = cost;
            best = candidate;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::FlyingDistance;

    fn line_of_points() -> Vec<Point> {
        (0..7)
            .map(|i| Point::new(format!("p{}", i), 45.0, 4.0 + i as f64 * 0.01).with_quantity(VISITS, 1.0))
            .collect()
    }

    #[test]
    fn test_representative_is_the_median_of_a_line() {
        let points = line_of_points();
        let members: Vec<usize> = (0..7).collect();

        let representative = select_representative(&points, &members, (45.0, 4.031), &FlyingDistance);
        assert_eq!(points[representative].id, "p3");
    }

    #[test]
    fn test_representative_only_among_nearest() {
        let points = line_of_points();
        let members: Vec<usize> = (0..7).collect();

        // Center next to the first points: only p0 and p1 are shortlisted.
        let representative = select_representative(&points, &members, (45.0, 3.99), &FlyingDistance);
        assert_eq!(points[representative].id, "p1");
    }

    #[test]
    fn test_representative_weighs_visits() {
        let mut points = line_of_points();
        points[6].quantities.insert(VISITS.to_string(), 100.0);
        let members: Vec<usize> = vec![5, 6];

        let representative = select_representative(&points, &members, (45.0, 4.05), &FlyingDistance);
        assert_eq!(points[representative].id, "p6");
    }

    #[test]
    fn test_member_weight_direction_bias() {
        let mut point = Point::new("p", 45.0, 4.0).with_quantity(VISITS, 1.0);
        point.run.compatibility_weight = 1.0;
        point.run.centroid_weights = vec![1.0];

        let neutral = member_weight(&point, (45.0, 4.1), 0);
        point.run.moved_up = true;
        let up = member_weight(&point, (45.0, 4.1), 0);
        point.run.moved_up = false;
        point.run.moved_down = true;
        let down = member_weight(&point, (45.0, 4.1), 0);

        assert!((up / neutral - MOVED_UP_BIAS).abs() < 1e-6);
        assert!((down / neutral - MOVED_DOWN_BIAS).abs() < 1e-6);
    }
}
