//! One assignment pass: every relation group goes to its closest feasible
//! cluster.
//!
//! Distances are biased by the cluster's balance coefficient and capacity
//! offence, and incompatible clusters are pushed away by a fixed penalty.
//! When the closest cluster would exceed a strict limit the group is
//! redirected to the closest compatible cluster that would not, and the
//! redirection is recorded for the violation resolver.

use rayon::prelude::*;
use tracing::trace;

use crate::model::{Centroid, Point};
use crate::relations::relation_group;
use crate::solver::{ClusteringRunState, RunContext};
use crate::traits::{DistanceFunction, Site};
use crate::violations::ViolationEvent;

/// Added to the distance of an incompatible cluster.
pub const INCOMPATIBILITY_PENALTY: f64 = 4_294_967_296.0;

/// Distance bias per unit of capacity offence.
const OFFENCE_WEIGHT: f64 = 0.05;

/// Growth of a point's weight against the cluster it was redirected away from.
const RELOCATION_WEIGHT_GROWTH: f64 = 1.1;

/// Raw distance from every point to every centroid, one row per point.
pub(crate) fn raw_distances(points: &[Point], centroids: &[Centroid], distance: &dyn DistanceFunction) -> Vec<Vec<f64>> {
    let sites: Vec<Site> = centroids.iter().map(Site::of_centroid).collect();

    points
        .par_iter()
        .map(|point| {
            let from = Site::of_point(point);
            sites.iter().map(|&to| distance.distance(from, to)).collect()
        })
        .collect()
}

/// Assigns every point to a cluster, rebuilding clusters and loads from scratch.
pub(crate) fn calculate_membership_clusters(state: &mut ClusteringRunState, ctx: &RunContext<'_>) {
    let number_of_clusters = state.centroids.len();

    for centroid in state.centroids.iter_mut() {
        centroid.load = state.unit_symbols.iter().map(|unit| (unit.clone(), 0.0)).collect();
    }
    state.clusters = vec![Vec::new(); number_of_clusters];
    state.violations.clear();
    for redirections in state.redirections.iter_mut() {
        redirections.clear();
    }

    let raw = raw_distances(&state.points, &state.centroids, ctx.distance);

    let mut groups_per_cluster: Vec<Vec<Vec<usize>>> = vec![Vec::new(); number_of_clusters];
    let mut processed = vec![false; state.points.len()];
    let order = state.order.clone();

    for root in order {
        if processed[root] {
            continue;
        }

        let group = relation_group(&state.points, root);
        let cluster = evaluate(state, ctx, &raw, &group);

        for &member in &group {
            processed[member] = true;
        }
        add_group(state, &group, cluster);
        groups_per_cluster[cluster].push(group);
    }

    manage_empty_clusters(state, ctx, &raw, &mut groups_per_cluster);
}

/// Returns the cluster the group rooted at `group[0]` goes to.
fn evaluate(state: &mut ClusteringRunState, ctx: &RunContext<'_>, raw: &[Vec<f64>], group: &[usize]) -> usize {
    let number_of_clusters = state.centroids.len();

    let mut distances = Vec::with_capacity(number_of_clusters);
    let mut compatible = Vec::with_capacity(number_of_clusters);
    for cluster in 0..number_of_clusters {
        let centroid = &state.centroids[cluster];
        let is_compatible = group
            .iter()
            .all(|&member| ctx.compatibility.compatible(&state.points[member], &centroid.characteristics));

        let distance: f64 = group.iter().map(|&member| raw[member][cluster]).sum();
        let mut balanced = distance * balance_factor(state, cluster);
        if !is_compatible {
            balanced += INCOMPATIBILITY_PENALTY;
        }

        distances.push(balanced);
        compatible.push(is_compatible);
    }

    let Some(mut closest) = argmin(&distances, |_| true) else {
        return 0;
    };

    if capacity_violation(state, group, closest) {
        let alternate = argmin(&distances, |cluster| compatible[cluster] && !capacity_violation(state, group, cluster));

        if let Some(alternate) = alternate {
            let with_violation = distances[closest];
            let without_violation = distances[alternate];
            let mut ratio = without_violation / with_violation;
            if ratio.is_nan() {
                ratio = 1.0;
            }

            let root = group[0];
            state.violations.push(ViolationEvent {
                point: root,
                distance_gap: without_violation - with_violation,
                distance_ratio: ratio,
                violating_cluster: closest,
                alternate_cluster: alternate,
                alternate_distance: without_violation,
            });
            state.redirections[closest].push(alternate);

            for &member in group {
                let weights = &mut state.points[member].run.centroid_weights;
                if let Some(weight) = weights.get_mut(closest) {
                    *weight *= RELOCATION_WEIGHT_GROWTH;
                }
                if let Some(weight) = weights.get_mut(alternate) {
                    *weight = 1.0;
                }
            }

            closest = alternate;
        }
    }

    closest
}

/// Multiplier applied to raw distances toward `cluster`.
fn balance_factor(state: &ClusteringRunState, cluster: usize) -> f64 {
    let coefficient = state.balance_coefficients.get(cluster).copied().unwrap_or(1.0);
    let balance = (1.0 - state.rate_balance) + state.rate_balance * coefficient;
    let offence = state.centroids[cluster].characteristics.capacity_offence;

    balance * (1.0 + OFFENCE_WEIGHT * offence)
}

/// Index of the smallest accepted value, first occurrence on ties.
fn argmin(values: &[f64], accept: impl Fn(usize) -> bool) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (index, value) in values.iter().enumerate() {
        if !accept(index) {
            continue;
        }
        match best {
            Some(current) if values[current] <= *value => {}
            _ => best = Some(index),
        }
    }
    best
}

/// Whether adding the group to `cluster` would exceed one of its strict limits.
pub(crate) fn capacity_violation(state: &ClusteringRunState, group: &[usize], cluster: usize) -> bool {
    let Some(limits) = state.strict_limits.get(cluster) else {
        return false;
    };
    let centroid = &state.centroids[cluster];

    state.unit_symbols.iter().any(|unit| match limits.get(unit) {
        Some(limit) => {
            let demand: f64 = group.iter().map(|&member| state.points[member].quantity(unit)).sum();
            centroid.load_of(unit) + demand > *limit
        }
        None => false,
    })
}

fn add_group(state: &mut ClusteringRunState, group: &[usize], cluster: usize) {
    for &member in group {
        state.clusters[cluster].push(member);
        for unit in &state.unit_symbols {
            let quantity = state.points[member].quantity(unit);
            *state.centroids[cluster].load.entry(unit.clone()).or_insert(0.0) += quantity;
        }
    }
}

fn remove_group(state: &mut ClusteringRunState, group: &[usize], cluster: usize) {
    state.clusters[cluster].retain(|member| !group.contains(member));
    for &member in group {
        for unit in &state.unit_symbols {
            let quantity = state.points[member].quantity(unit);
            *state.centroids[cluster].load.entry(unit.clone()).or_insert(0.0) -= quantity;
        }
    }
}

/// Gives every empty cluster the compatible relation group nearest to its
/// centroid, taken from a cluster that holds at least two groups.
fn manage_empty_clusters(
    state: &mut ClusteringRunState,
    ctx: &RunContext<'_>,
    raw: &[Vec<f64>],
    groups_per_cluster: &mut [Vec<Vec<usize>>],
) {
    for empty in 0..state.centroids.len() {
        if !state.clusters[empty].is_empty() {
            continue;
        }

        let mut best: Option<(f64, usize, usize)> = None;
        for (donor, groups) in groups_per_cluster.iter().enumerate() {
            if donor == empty || groups.len() < 2 {
                continue;
            }
            for (position, group) in groups.iter().enumerate() {
                let compatible = group.iter().all(|&member| {
                    ctx.compatibility
                        .compatible(&state.points[member], &state.centroids[empty].characteristics)
                });
                if !compatible {
                    continue;
                }

                let distance: f64 = group.iter().map(|&member| raw[member][empty]).sum();
                if best.is_none_or(|(current, _, _)| distance < current) {
                    best = Some((distance, donor, position));
                }
            }
        }

        if let Some((_, donor, position)) = best {
            let group = groups_per_cluster[donor].remove(position);
            trace!(cluster = empty, donor, size = group.len(), "filling empty cluster");
            remove_group(state, &group, donor);
            add_group(state, &group, empty);
            groups_per_cluster[empty].push(group);
        }
    }
}
