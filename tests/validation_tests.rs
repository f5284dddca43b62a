//! Build-entry validation tests
//!
//! Every structural input problem fails the build with a descriptive error.

mod fixtures;

use fixtures::*;
use vrp_clustering::model::{DURATION, VISITS};
use vrp_clustering::{BalancedClusterer, BuildOptions, Point, Relation, RelationKind, ValidationError};

fn build_error(clusterer: &mut BalancedClusterer, points: Vec<Point>, cut: Option<&str>) -> ValidationError {
    match clusterer.build(points, cut, &[], 1.0, BuildOptions::default()) {
        Ok(_) => panic!("build should have failed"),
        Err(err) => err,
    }
}

#[test]
fn test_no_vehicles() {
    let mut clusterer = BalancedClusterer::new(Vec::new());
    assert_eq!(build_error(&mut clusterer, four_points(), None), ValidationError::NoVehicles);
}

#[test]
fn test_invalid_cut_ratio() {
    let (mut clusterer, points) = two_clusters_4_items();
    let err = clusterer
        .build(points, Some(VISITS), &[], 0.0, BuildOptions::default())
        .err();
    assert_eq!(err, Some(ValidationError::InvalidCutRatio(0.0)));
}

#[test]
fn test_duplicate_points() {
    let (mut clusterer, mut points) = two_clusters_4_items();
    points.push(points[2].clone());

    assert_eq!(
        build_error(&mut clusterer, points, Some(VISITS)),
        ValidationError::DuplicatePoint { id: "point_3".to_string() }
    );
}

#[test]
fn test_missing_cut_quantity() {
    let (mut clusterer, mut points) = two_clusters_4_items();
    points[1].quantities.clear();

    assert_eq!(
        build_error(&mut clusterer, points, Some(VISITS)),
        ValidationError::MissingUnitQuantity {
            id: "point_2".to_string(),
            unit: VISITS.to_string()
        }
    );
}

#[test]
fn test_missing_coordinates() {
    let (mut clusterer, mut points) = two_clusters_4_items();
    points[3].lng = f64::NAN;

    assert_eq!(
        build_error(&mut clusterer, points, Some(VISITS)),
        ValidationError::MissingCoordinates { id: "point_4".to_string() }
    );
}

#[test]
fn test_depot_duration_length() {
    let (mut clusterer, mut points) = two_clusters_4_items();
    points[0].characteristics.duration_from_and_to_depot = Some(vec![0.0]);

    assert_eq!(
        build_error(&mut clusterer, points, Some(VISITS)),
        ValidationError::DepotDurationMismatch {
            id: "point_1".to_string(),
            expected: 2,
            got: 1
        }
    );
}

#[test]
fn test_missing_matrix_index() {
    let (mut clusterer, mut points) = two_clusters_4_items_with_matrix();
    points[2].characteristics.matrix_index = None;

    assert_eq!(
        build_error(&mut clusterer, points, Some(VISITS)),
        ValidationError::MissingMatrixIndex { id: "point_3".to_string() }
    );
}

#[test]
fn test_matrix_index_out_of_range() {
    let (mut clusterer, mut points) = two_clusters_4_items_with_matrix();
    points[2].characteristics.matrix_index = Some(9);

    assert_eq!(
        build_error(&mut clusterer, points, Some(VISITS)),
        ValidationError::MatrixIndexOutOfRange { index: 9, size: 5 }
    );
}

#[test]
fn test_non_square_matrix() {
    let (mut clusterer, points) = two_clusters_4_items_with_matrix();
    if let Some(matrix) = clusterer.distance_matrix.as_mut() {
        matrix[3].pop();
    }

    assert_eq!(
        build_error(&mut clusterer, points, Some(VISITS)),
        ValidationError::NonSquareMatrix {
            row: 3,
            expected: 5,
            got: 4
        }
    );
}

#[test]
fn test_missing_capacity_for_cut() {
    let (mut clusterer, points) = two_clusters_4_items();
    let points: Vec<Point> = points.into_iter().map(|point| point.with_quantity("kg", 2.0)).collect();
    clusterer.vehicles[0].capacities.insert("kg".to_string(), 10.0);

    assert_eq!(
        build_error(&mut clusterer, points, Some("kg")),
        ValidationError::MissingCapacity {
            vehicle: 1,
            unit: "kg".to_string()
        }
    );
}

#[test]
fn test_duration_cut_accepts_deprecated_capacity() {
    let (mut clusterer, points) = two_clusters_4_items();
    for vehicle in clusterer.vehicles.iter_mut() {
        vehicle.duration = None;
        vehicle.capacities.insert(DURATION.to_string(), 3600.0);
    }
    let points: Vec<Point> = points.into_iter().map(|point| point.with_quantity(DURATION, 300.0)).collect();

    let options = BuildOptions {
        seed: Some(1),
        ..BuildOptions::default()
    };
    clusterer
        .build(points, Some(DURATION), &[], 1.0, options)
        .expect("duration capacity should be accepted");

    assert_eq!(clusterer.vehicles[0].duration, Some(3600.0));
    assert_eq!(assigned_count(&clusterer), 4);
}

#[test]
fn test_invalid_centroid_indices() {
    let cases: Vec<(Vec<usize>, ValidationError)> = vec![
        (vec![0, 0], ValidationError::DuplicateCentroidIndex(0)),
        (vec![0], ValidationError::CentroidCountMismatch { expected: 2, got: 1 }),
        (vec![1, 7], ValidationError::CentroidIndexOutOfRange { index: 7, len: 4 }),
    ];

    for (indices, expected) in cases {
        let (mut clusterer, points) = two_clusters_4_items();
        clusterer.centroid_indices = indices.clone();
        assert_eq!(build_error(&mut clusterer, points, Some(VISITS)), expected, "indices {:?}", indices);
    }
}

#[test]
fn test_incompatible_centroid_index() {
    let (mut clusterer, mut points) = two_clusters_4_items();
    clusterer.vehicles[1].skills = vec!["crane".to_string()];
    points[0].characteristics.skills = vec!["crane".to_string()];
    clusterer.centroid_indices = vec![0, 1];

    assert_eq!(
        build_error(&mut clusterer, points, Some(VISITS)),
        ValidationError::IncompatibleCentroid { index: 0, vehicle: 0 }
    );
}

#[test]
fn test_invalid_relations() {
    let (mut clusterer, points) = two_clusters_4_items();
    let relations = vec![
        Relation::new(RelationKind::Shipment, vec![0, 1]),
        Relation::new(RelationKind::Shipment, vec![1, 2]),
    ];

    let err = clusterer
        .build(points, Some(VISITS), &relations, 1.0, BuildOptions::default())
        .err();
    assert_eq!(err, Some(ValidationError::PointInSeveralRelations { id: "point_2".to_string() }));
}

#[test]
fn test_error_messages_name_the_field() {
    let err = ValidationError::MissingUnitQuantity {
        id: "point_2".to_string(),
        unit: VISITS.to_string(),
    };
    let message = err.to_string();

    assert!(message.contains("point_2"), "{}", message);
    assert!(message.contains("visits"), "{}", message);
}

#[test]
fn test_failed_build_leaves_no_result() {
    let (mut clusterer, points) = two_clusters_4_items();
    clusterer
        .build(points.clone(), Some(VISITS), &[], 1.0, BuildOptions::default())
        .expect("valid input");
    assert_eq!(assigned_count(&clusterer), 4);

    clusterer.centroid_indices = vec![0, 0];
    let _ = build_error(&mut clusterer, points, Some(VISITS));

    assert_eq!(assigned_count(&clusterer), 0);
    assert!(clusterer.centroids().is_empty());
}
