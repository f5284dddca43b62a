//! Strategy traits the clustering engine calls.
//!
//! The engine only ever needs two answers from the outside world: how far
//! apart two sites are, and whether a point may be served by a vehicle.
//! Default implementations are provided; closures implement both traits.

use crate::compatibility::compatible_characteristics;
use crate::geometry;
use crate::model::{Centroid, Point, VehicleCharacteristics};

/// A location as seen by a distance function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Site {
    pub lat: f64,
    pub lng: f64,
    pub matrix_index: Option<usize>,
}

impl Site {
    pub fn of_point(point: &Point) -> Self {
        Self {
            lat: point.lat,
            lng: point.lng,
            matrix_index: point.characteristics.matrix_index,
        }
    }

    pub fn of_centroid(centroid: &Centroid) -> Self {
        Self {
            lat: centroid.lat,
            lng: centroid.lng,
            matrix_index: centroid.characteristics.matrix_index,
        }
    }

    pub fn location(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

/// Distance between two sites. Must be callable from several threads.
pub trait DistanceFunction: Send + Sync {
    fn distance(&self, from: Site, to: Site) -> f64;
}

impl<F> DistanceFunction for F
where
    F: Fn(Site, Site) -> f64 + Send + Sync,
{
    fn distance(&self, from: Site, to: Site) -> f64 {
        self(from, to)
    }
}

/// Whether a point may be assigned to a vehicle (or its centroid).
pub trait CompatibilityFunction: Send + Sync {
    fn compatible(&self, point: &Point, vehicle: &VehicleCharacteristics) -> bool;
}

impl<F> CompatibilityFunction for F
where
    F: Fn(&Point, &VehicleCharacteristics) -> bool + Send + Sync,
{
    fn compatible(&self, point: &Point, vehicle: &VehicleCharacteristics) -> bool {
        self(point, vehicle)
    }
}

/// Great-circle distance in meters, ignoring matrix indices.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlyingDistance;

impl DistanceFunction for FlyingDistance {
    fn distance(&self, from: Site, to: Site) -> f64 {
        geometry::flying_distance(from.location(), to.location())
    }
}

/// Matrix lookup, falling back to flying distance when an index is missing.
#[derive(Debug, Clone, Copy)]
pub struct MatrixDistance<'a> {
    matrix: &'a [Vec<f64>],
}

impl<'a> MatrixDistance<'a> {
    pub fn new(matrix: &'a [Vec<f64>]) -> Self {
        Self { matrix }
    }
}

impl DistanceFunction for MatrixDistance<'_> {
    fn distance(&self, from: Site, to: Site) -> f64 {
        match (from.matrix_index, to.matrix_index) {
            (Some(a), Some(b)) => self
                .matrix
                .get(a)
                .and_then(|row| row.get(b))
                .copied()
                .unwrap_or_else(|| geometry::flying_distance(from.location(), to.location())),
            _ => geometry::flying_distance(from.location(), to.location()),
        }
    }
}

/// Sticky vehicle, skill and day compatibility.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharacteristicsCompatibility;

impl CompatibilityFunction for CharacteristicsCompatibility {
    fn compatible(&self, point: &Point, vehicle: &VehicleCharacteristics) -> bool {
        compatible_characteristics(&point.characteristics, vehicle)
    }
}
