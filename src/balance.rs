//! Balance coefficient control.
//!
//! Each cluster carries a multiplicative distance bias. Clusters loaded above
//! their soft limit get a larger bias so that the next assignment pass pushes
//! points away from them; the others get a proportionally smaller one.

use crate::geometry;
use crate::limits;
use crate::model::{DURATION, Entity, VISITS};
use crate::solver::{ClusteringRunState, RunContext};

/// Step size at the start of the run, decaying linearly to half of it.
const INITIAL_STEPSIZE: f64 = 0.2;

/// Widest correction allowed at the end of the run.
const FINAL_MAX_CORRECTION: f64 = 1.05;

/// Recomputes soft limits and updates the balance coefficients.
///
/// Does nothing when no balancing unit is set.
pub(crate) fn update_balance_coefficients(state: &mut ClusteringRunState, ctx: &RunContext<'_>) {
    let Some(cut) = state.cut_symbol.clone() else {
        return;
    };

    let route_times = refresh_route_times(state, &cut);
    state.soft_limits = dynamic_soft_limits(state, ctx, &cut, &route_times);

    let progress = state.progress();
    let stepsize = INITIAL_STEPSIZE - 0.1 * progress;
    let max_correction = FINAL_MAX_CORRECTION + 0.95 * (1.0 - progress);
    let min_correction = 1.0 / max_correction;

    let number_of_clusters = state.centroids.len();
    let mut peak: f64 = 0.0;
    for cluster in 0..number_of_clusters {
        let Some(&soft_limit) = state.soft_limits.get(cluster) else {
            continue;
        };
        if soft_limit <= 0.0 {
            continue;
        }

        let burden = state.centroids[cluster].load_of(&cut) + route_times[cluster];
        let violation = burden / soft_limit - 1.0;
        peak = peak.max(violation.abs());

        if !state.redirections[cluster].is_empty() && violation < 0.0 {
            continue;
        }

        let correction = (1.0 + violation).max(0.0).powf(stepsize).clamp(min_correction, max_correction);
        for (other, coefficient) in state.balance_coefficients.iter_mut().enumerate() {
            if other == cluster {
                *coefficient *= correction;
            } else {
                *coefficient /= correction;
            }
        }
    }

    normalize_to_unit_mean(&mut state.balance_coefficients);
    state.peak_balance_violation = peak;
}

/// Approximate route time of every cluster, cached on its centroid.
///
/// Only meaningful when balancing on duration; zero otherwise.
fn refresh_route_times(state: &mut ClusteringRunState, cut: &str) -> Vec<f64> {
    let mut route_times = vec![0.0; state.centroids.len()];
    if cut != DURATION {
        return route_times;
    }

    for (cluster, members) in state.clusters.iter().enumerate().take(route_times.len()) {
        let locations: Vec<(f64, f64)> = members.iter().map(|&member| state.points[member].location()).collect();
        let visits: f64 = members.iter().map(|&member| state.points[member].quantity(VISITS)).sum();
        let route_time = geometry::approximate_route_time(&locations, visits);

        state.centroids[cluster].characteristics.route_time = route_time;
        route_times[cluster] = route_time;
    }

    route_times
}

fn dynamic_soft_limits(state: &ClusteringRunState, ctx: &RunContext<'_>, cut: &str, route_times: &[f64]) -> Vec<f64> {
    let shares = if cut == DURATION && ctx.entity == Entity::Vehicle {
        limits::work_time_shares(&state.centroids, ctx.vehicles).unwrap_or_else(|| state.shares.clone())
    } else {
        state.shares.clone()
    };

    limits::dynamic_soft_limits(state.cut_ratio, state.total_cut_load, route_times, &shares)
}

fn normalize_to_unit_mean(coefficients: &mut [f64]) {
    if coefficients.is_empty() {
        return;
    }
    let mean = coefficients.iter().sum::<f64>() / coefficients.len() as f64;
    if mean > 0.0 && mean.is_finite() {
        for coefficient in coefficients.iter_mut() {
            *coefficient /= mean;
        }
    }
}
