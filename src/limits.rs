//! Strict and soft cluster limits.
//!
//! Strict limits are hard per-unit ceilings taken from vehicle capacities.
//! Soft limits are the share of the balancing unit each cluster should carry.
//! Both are refreshed every iteration when the depot round trip matters.

use std::collections::BTreeMap;

use crate::error::{Result, ValidationError};
use crate::geometry;
use crate::model::{Centroid, DURATION, Entity, Point, VehicleSpec};

/// Limits derived once per build.
#[derive(Debug, Clone, PartialEq)]
pub struct Limits {
    /// Hard ceiling per unit, one map per cluster.
    pub strict: Vec<BTreeMap<String, f64>>,
    /// Target load of the cut unit, one per cluster. Empty without a cut unit.
    pub soft: Vec<f64>,
    /// Share of the total cut load each cluster should carry.
    pub shares: Vec<f64>,
}

/// Computes strict limits and soft limits for `vehicles`.
///
/// The duration limit is always present when the vehicle has a duration,
/// even if it is not listed among the capacities.
pub fn compute_limits(
    cut_symbol: Option<&str>,
    cut_ratio: f64,
    vehicles: &[VehicleSpec],
    points: &[Point],
    entity: Entity,
) -> Result<Limits> {
    if let Some(cut) = cut_symbol {
        for (index, vehicle) in vehicles.iter().enumerate() {
            let covered_by_duration = cut == DURATION && vehicle.duration.is_some();
            if !vehicle.capacities.contains_key(cut) && !covered_by_duration {
                return Err(ValidationError::MissingCapacity {
                    vehicle: index,
                    unit: cut.to_string(),
                });
            }
        }
    }

    let strict = vehicles
        .iter()
        .map(|vehicle| {
            let mut limits = BTreeMap::new();
            if vehicle.duration.is_some() {
                limits.insert(DURATION.to_string(), vehicle.total_work_time());
            }
            for (unit, limit) in &vehicle.capacities {
                limits.insert(unit.clone(), limit * vehicle.vehicle_count as f64);
            }
            limits
        })
        .collect();

    let shares = vehicle_shares(cut_symbol, vehicles, entity);

    let soft = match cut_symbol {
        Some(cut) => {
            let total: f64 = points.iter().map(|point| point.quantity(cut)).sum();
            shares.iter().map(|share| cut_ratio * total * share).collect()
        }
        None => Vec::new(),
    };

    Ok(Limits { strict, soft, shares })
}

/// Share of the balancing load each vehicle should carry.
///
/// Per-vehicle sharing follows work time, then capacity on the cut unit,
/// whichever has a positive total first. Uniform otherwise.
pub fn vehicle_shares(cut_symbol: Option<&str>, vehicles: &[VehicleSpec], entity: Entity) -> Vec<f64> {
    let uniform = vec![1.0 / vehicles.len().max(1) as f64; vehicles.len()];
    if entity == Entity::Uniform {
        return uniform;
    }

    let work_times: Vec<f64> = vehicles.iter().map(VehicleSpec::total_work_time).collect();
    if let Some(shares) = normalized(&work_times) {
        return shares;
    }

    if let Some(cut) = cut_symbol {
        let capacities: Vec<f64> = vehicles
            .iter()
            .map(|vehicle| vehicle.capacities.get(cut).copied().unwrap_or(0.0) * vehicle.vehicle_count as f64)
            .collect();
        if let Some(shares) = normalized(&capacities) {
            return shares;
        }
    }

    uniform
}

fn normalized(values: &[f64]) -> Option<Vec<f64>> {
    let total: f64 = values.iter().sum();
    if total > 0.0 && values.iter().all(|v| *v >= 0.0) {
        Some(values.iter().map(|v| v / total).collect())
    } else {
        None
    }
}

/// Fills the depot round-trip vector of every point lacking one.
///
/// Uses the matrix when both the depot and the point have an index, the
/// euclidean distance to the depot coordinates otherwise. Does nothing when
/// no vehicle has a located depot.
pub fn compute_distance_from_and_to_depot(vehicles: &[VehicleSpec], points: &mut [Point], matrix: Option<&[Vec<f64>]>) {
    if !vehicles.iter().any(|vehicle| vehicle.depot.is_located()) {
        return;
    }

    for point in points.iter_mut() {
        if point.characteristics.duration_from_and_to_depot.is_some() {
            continue;
        }

        let durations = vehicles
            .iter()
            .map(|vehicle| {
                let depot = &vehicle.depot;
                match (matrix, depot.matrix_index, point.characteristics.matrix_index) {
                    (Some(matrix), Some(d), Some(p)) => matrix[d][p] + matrix[p][d],
                    _ => match depot.coordinates {
                        Some(coordinates) => {
                            geometry::euclidean_distance(coordinates, point.location())
                                + geometry::euclidean_distance(point.location(), coordinates)
                        }
                        None => 0.0,
                    },
                }
            })
            .collect();

        point.characteristics.duration_from_and_to_depot = Some(durations);
    }
}

/// Shrinks each cluster's duration ceiling by the depot round trips its
/// vehicle has to drive from the current centroid.
pub fn refresh_strict_duration_limits(
    strict: &mut [BTreeMap<String, f64>],
    base_duration_limits: &[Option<f64>],
    centroids: &[Centroid],
    vehicles: &[VehicleSpec],
) {
    for (index, limits) in strict.iter_mut().enumerate() {
        let Some(base) = base_duration_limits.get(index).copied().flatten() else {
            continue;
        };
        if base <= 0.0 {
            continue;
        }
        let (Some(centroid), Some(vehicle)) = (centroids.get(index), vehicles.get(index)) else {
            continue;
        };

        let trips = vehicle.total_work_days as f64 * vehicle.vehicle_count as f64;
        let depot_time = centroid.characteristics.duration_from_and_to_depot * trips;
        limits.insert(DURATION.to_string(), (base - depot_time).max(0.0));
    }
}

/// Work-time shares once depot round trips are paid, if any work time remains.
///
/// The depot time is scaled by a coefficient derived from the tightest vehicle
/// so that no vehicle ends up with a null share.
pub fn work_time_shares(centroids: &[Centroid], vehicles: &[VehicleSpec]) -> Option<Vec<f64>> {
    let trips = |vehicle: &VehicleSpec| vehicle.total_work_days as f64 * vehicle.vehicle_count as f64;

    let coef = centroids
        .iter()
        .zip(vehicles)
        .map(|(centroid, vehicle)| {
            vehicle.total_work_time() / (centroid.characteristics.duration_from_and_to_depot.max(1.0) * trips(vehicle))
        })
        .fold(f64::INFINITY, f64::min);
    if !coef.is_finite() {
        return None;
    }

    let coef = if coef > 1.5 {
        1.5
    } else if coef > 1.0 {
        1.0
    } else {
        coef * 0.9
    };

    let work_times: Vec<f64> = centroids
        .iter()
        .zip(vehicles)
        .map(|(centroid, vehicle)| {
            vehicle.total_work_time() - coef * centroid.characteristics.duration_from_and_to_depot * trips(vehicle)
        })
        .collect();

    normalized(&work_times)
}

/// Soft limits covering the total cut load plus the approximate route time of
/// every cluster.
pub fn dynamic_soft_limits(cut_ratio: f64, total_cut_load: f64, route_times: &[f64], shares: &[f64]) -> Vec<f64> {
    let burden = total_cut_load + route_times.iter().sum::<f64>();
    shares.iter().map(|share| cut_ratio * burden * share).collect()
}
