//! Build-entry validation and normalization defaults.
//!
//! Validation fails fast on the first structural problem. Normalization only
//! fills defaults and never rejects anything.

use std::collections::HashSet;

use crate::error::{Result, ValidationError};
use crate::model::{DURATION, Point, PointRunState, VISITS, VehicleSpec};

/// Checks the inputs of a build.
pub fn validate(
    points: &[Point],
    vehicles: &[VehicleSpec],
    cut_symbol: Option<&str>,
    cut_ratio: f64,
    matrix: Option<&[Vec<f64>]>,
) -> Result<()> {
    if vehicles.is_empty() {
        return Err(ValidationError::NoVehicles);
    }
    if !(cut_ratio > 0.0 && cut_ratio <= 1.0) {
        return Err(ValidationError::InvalidCutRatio(cut_ratio));
    }

    let mut ids = HashSet::new();
    for point in points {
        if !ids.insert(point.id.as_str()) {
            return Err(ValidationError::DuplicatePoint { id: point.id.clone() });
        }
        if !point.lat.is_finite() || !point.lng.is_finite() {
            return Err(ValidationError::MissingCoordinates { id: point.id.clone() });
        }
        if let Some(cut) = cut_symbol {
            if !point.quantities.contains_key(cut) {
                return Err(ValidationError::MissingUnitQuantity {
                    id: point.id.clone(),
                    unit: cut.to_string(),
                });
            }
        }
        if let Some(durations) = &point.characteristics.duration_from_and_to_depot {
            if durations.len() != vehicles.len() {
                return Err(ValidationError::DepotDurationMismatch {
                    id: point.id.clone(),
                    expected: vehicles.len(),
                    got: durations.len(),
                });
            }
        }
    }

    if let Some(matrix) = matrix {
        validate_matrix(points, vehicles, matrix)?;
    }

    Ok(())
}

fn validate_matrix(points: &[Point], vehicles: &[VehicleSpec], matrix: &[Vec<f64>]) -> Result<()> {
    let size = matrix.len();
    for (row, values) in matrix.iter().enumerate() {
        if values.len() != size {
            return Err(ValidationError::NonSquareMatrix {
                row,
                expected: size,
                got: values.len(),
            });
        }
    }

    for point in points {
        let Some(index) = point.characteristics.matrix_index else {
            return Err(ValidationError::MissingMatrixIndex { id: point.id.clone() });
        };
        if index >= size {
            return Err(ValidationError::MatrixIndexOutOfRange { index, size });
        }
    }

    for (vehicle, spec) in vehicles.iter().enumerate() {
        match spec.depot.matrix_index {
            Some(index) if index >= size => return Err(ValidationError::MatrixIndexOutOfRange { index, size }),
            Some(_) => {}
            None if spec.depot.coordinates.is_some() => {
                return Err(ValidationError::MissingDepotMatrixIndex { vehicle });
            }
            None => {}
        }
    }

    Ok(())
}

/// Applies vehicle defaults that must hold before validation.
///
/// A vehicle without a duration but with a `duration` capacity takes it as
/// its duration. Work days and vehicle counts are at least one.
pub fn normalize_vehicles(vehicles: &mut [VehicleSpec]) {
    for vehicle in vehicles.iter_mut() {
        if vehicle.duration.is_none() {
            vehicle.duration = vehicle.capacities.get(DURATION).copied();
        }
        vehicle.total_work_days = vehicle.total_work_days.max(1);
        vehicle.vehicle_count = vehicle.vehicle_count.max(1);
    }
}

/// Applies point defaults and clears any state left by a previous build.
pub fn normalize_points(points: &mut [Point]) {
    for point in points.iter_mut() {
        point.quantities.entry(VISITS.to_string()).or_insert(1.0);
        point.run = PointRunState::default();
    }
}
