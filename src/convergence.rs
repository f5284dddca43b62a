//! Stopping logic.
//!
//! The run stops once centroids barely move, or keep repeating the same
//! moves, provided no point had to be redirected in the last pass and the
//! load balance is within a tolerance that loosens toward the end.

use tracing::debug;

use crate::geometry;
use crate::solver::ClusteringRunState;

/// Loop detection tolerance on summed movements, in meters.
const LOOP_TOLERANCE: f64 = 1e-5;

/// Per-cluster movement threshold at the start of the run, in meters.
const INITIAL_MOVEMENT_THRESHOLD: f64 = 20.0;

/// Growth of the per-cluster movement threshold over the run, in meters.
const MOVEMENT_THRESHOLD_GROWTH: f64 = 80.0;

/// Balance tolerance at the start of the run.
const BALANCE_TOLERANCE: f64 = 0.05;

/// Whether centroids stopped moving or entered a cycle.
///
/// Keeps a window of total movements of length `2 * floor(sqrt(iteration)) + 1`.
/// The first call of a run only initializes the window.
pub(crate) fn centroids_converged_or_in_loop(state: &mut ClusteringRunState) -> bool {
    let window = (state.iteration as f64).sqrt() as usize;
    let capacity = 2 * window + 1;

    if state.iteration == 0 {
        state.movement_history = vec![0.0; capacity];
        return false;
    }

    let movement: f64 = state
        .old_positions
        .iter()
        .zip(&state.centroids)
        .map(|(&old, centroid)| geometry::euclidean_distance(old, centroid.location()))
        .sum();

    let threshold = state.centroids.len() as f64
        * (INITIAL_MOVEMENT_THRESHOLD + MOVEMENT_THRESHOLD_GROWTH * state.progress());
    debug!(iteration = state.iteration, movement, threshold, "centroid movement");
    if movement < threshold {
        return true;
    }

    state.movement_history.push(movement);

    let history = &state.movement_history;
    for n in 1..=window {
        if history.len() < 2 * n {
            break;
        }
        let current: f64 = history[history.len() - n..].iter().sum();
        let previous: f64 = history[history.len() - 2 * n..history.len() - n].iter().sum();
        if (current - previous).abs() < LOOP_TOLERANCE {
            debug!(iteration = state.iteration, period = n, "centroids are looping");
            return true;
        }
    }

    while state.movement_history.len() > capacity {
        state.movement_history.remove(0);
    }

    false
}

/// Whether the main loop may stop after the current iteration.
pub(crate) fn stop_criteria_met(state: &mut ClusteringRunState) -> bool {
    // Always evaluated so the movement window stays current.
    let converged = centroids_converged_or_in_loop(state);
    if !converged || state.needed_moving > 0 {
        return false;
    }

    match state.cut_symbol {
        Some(_) => state.peak_balance_violation < BALANCE_TOLERANCE + state.progress().powi(8),
        None => true,
    }
}
