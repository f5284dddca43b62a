//! Test fixtures for vrp-clustering.
//!
//! Provides:
//! - The two-vehicle, four-point instance around Lyon (flying and matrix variants)
//! - A deterministic grid of points for larger runs
//! - Small helpers to read cluster contents by id

#![allow(dead_code)]

use vrp_clustering::model::VISITS;
use vrp_clustering::{BalancedClusterer, Point, VehicleSpec};

pub const DEPOT_0: (f64, f64) = (45.604784, 4.758965);
pub const DEPOT_1: (f64, f64) = (45.576412, 4.805614);

// ============================================================================
// Four points, two vehicles
// ============================================================================

fn four_vehicle_spec(id: &str, depot: (f64, f64)) -> VehicleSpec {
    VehicleSpec::new(id)
        .with_depot(depot.0, depot.1)
        .with_capacity(VISITS, 6.0)
        .with_duration(0.0)
}

pub fn four_points() -> Vec<Point> {
    vec![
        Point::new("point_1", 45.604784, 4.758965)
            .with_quantity(VISITS, 1.0)
            .with_depot_durations(vec![0.0, 4814.68]),
        Point::new("point_2", 45.344334, 4.817731)
            .with_quantity(VISITS, 1.0)
            .with_depot_durations(vec![29354.21, 25852.47]),
        Point::new("point_3", 45.576412, 4.805614)
            .with_quantity(VISITS, 1.0)
            .with_depot_durations(vec![4814.68, 0.0]),
        Point::new("point_4", 45.258324, 4.687322)
            .with_quantity(VISITS, 1.0)
            .with_depot_durations(vec![38972.24, 36596.43]),
    ]
}

/// Two vehicles with their own depot and room for six visits each.
pub fn two_clusters_4_items() -> (BalancedClusterer, Vec<Point>) {
    let mut clusterer = BalancedClusterer::new(vec![
        four_vehicle_spec("vehicle_0", DEPOT_0),
        four_vehicle_spec("vehicle_1", DEPOT_1),
    ]);
    clusterer.max_iterations = Some(300);

    (clusterer, four_points())
}

/// Same instance with a distance matrix; both depots share matrix index 0.
pub fn two_clusters_4_items_with_matrix() -> (BalancedClusterer, Vec<Point>) {
    let vehicles = vec![
        four_vehicle_spec("vehicle_0", DEPOT_0).with_depot_matrix_index(0),
        four_vehicle_spec("vehicle_1", DEPOT_0).with_depot_matrix_index(0),
    ];
    let mut clusterer = BalancedClusterer::new(vehicles);
    clusterer.max_iterations = Some(300);
    clusterer.distance_matrix = Some(vec![
        vec![0.0, 2824.0, 1110.0, 2299.0, 1823.0],
        vec![2780.0, 0.0, 2132.0, 660.0, 2803.0],
        vec![1174.0, 2212.0, 0.0, 1687.0, 1248.0],
        vec![2349.0, 668.0, 1701.0, 0.0, 2372.0],
        vec![1863.0, 2865.0, 1240.0, 2340.0, 0.0],
    ]);

    let depot_trips = [2824.0, 1110.0, 2299.0, 1823.0];
    let points = four_points()
        .into_iter()
        .zip(depot_trips)
        .enumerate()
        .map(|(index, (point, trip))| {
            point
                .with_matrix_index(index + 1)
                .with_depot_durations(vec![trip, trip])
        })
        .collect();

    (clusterer, points)
}

// ============================================================================
// Grid
// ============================================================================

/// `rows * cols` points on a regular grid starting at Lyon, one visit each.
///
/// Ids are `p_<row>_<col>`; `spacing` is in degrees.
pub fn grid(rows: usize, cols: usize, spacing: f64) -> Vec<Point> {
    let mut points = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            points.push(
                Point::new(
                    format!("p_{}_{}", row, col),
                    45.70 + row as f64 * spacing,
                    4.80 + col as f64 * spacing,
                )
                .with_quantity(VISITS, 1.0),
            );
        }
    }
    points
}

/// `count` identical vehicles, each able to serve `visits` visits.
pub fn vehicles(count: usize, visits: f64) -> Vec<VehicleSpec> {
    (0..count)
        .map(|i| VehicleSpec::new(&format!("vehicle_{}", i)).with_capacity(VISITS, visits))
        .collect()
}

// ============================================================================
// Helpers
// ============================================================================

/// Sorted point ids per cluster.
pub fn cluster_ids(clusterer: &BalancedClusterer) -> Vec<Vec<String>> {
    clusterer
        .clusters()
        .iter()
        .map(|cluster| {
            let mut ids: Vec<String> = cluster.iter().map(|point| point.id.clone()).collect();
            ids.sort();
            ids
        })
        .collect()
}

/// Index of the cluster holding `id`, if any.
pub fn cluster_of(clusterer: &BalancedClusterer, id: &str) -> Option<usize> {
    clusterer
        .clusters()
        .iter()
        .position(|cluster| cluster.iter().any(|point| point.id == id))
}

/// Total number of assigned points.
pub fn assigned_count(clusterer: &BalancedClusterer) -> usize {
    clusterer.clusters().iter().map(Vec::len).sum()
}
