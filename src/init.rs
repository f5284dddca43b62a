//! Initial centroid seeding.
//!
//! Centroids come either from caller-provided point indices or from a random
//! selection that favours points needing the vehicle's specific skills and
//! points close to the vehicle's own depot.

use std::collections::HashSet;

use rand::Rng;
use rand::rngs::StdRng;

use crate::error::{Result, ValidationError};
use crate::model::{Centroid, Point, VehicleCharacteristics};
use crate::relations::for_each_linked;
use crate::traits::CompatibilityFunction;

/// Moves `point` to the front of the processing order.
pub(crate) fn move_to_front(order: &mut Vec<usize>, point: usize) {
    if let Some(position) = order.iter().position(|&p| p == point) {
        order.remove(position);
    }
    order.insert(0, point);
}

/// Moves `point` to the back of the processing order.
pub(crate) fn move_to_back(order: &mut Vec<usize>, point: usize) {
    if let Some(position) = order.iter().position(|&p| p == point) {
        order.remove(position);
    }
    order.push(point);
}

/// Seeds one centroid per index, paired in order with the vehicles.
///
/// The seed points end up at the front of the processing order, the first
/// index last.
pub(crate) fn centroids_from_indices(
    points: &[Point],
    order: &mut Vec<usize>,
    fleet: &[VehicleCharacteristics],
    compatibility: &dyn CompatibilityFunction,
    indices: &[usize],
    number_of_clusters: usize,
) -> Result<Vec<Centroid>> {
    let mut seen = HashSet::new();
    for &index in indices {
        if !seen.insert(index) {
            return Err(ValidationError::DuplicateCentroidIndex(index));
        }
    }

    if indices.len() != number_of_clusters {
        return Err(ValidationError::CentroidCountMismatch {
            expected: number_of_clusters,
            got: indices.len(),
        });
    }

    let mut centroids = Vec::with_capacity(indices.len());
    for (vehicle, &index) in indices.iter().enumerate() {
        if index >= points.len() {
            return Err(ValidationError::CentroidIndexOutOfRange {
                index,
                len: points.len(),
            });
        }
        if !compatibility.compatible(&points[index], &fleet[vehicle]) {
            return Err(ValidationError::IncompatibleCentroid { index, vehicle });
        }
        centroids.push(Centroid::seeded(index, &points[index], vehicle, fleet));
    }

    for &index in indices {
        move_to_front(order, index);
    }

    Ok(centroids)
}

/// Seeds centroids vehicle by vehicle with a random compatible point.
///
/// For each vehicle the candidates are, by priority: unused points that
/// specifically need this vehicle (skills or sticky ids), unused compatible
/// points, any unused point. Among them the ones whose nearest depots include
/// this vehicle's are preferred. A seed's whole relation group becomes unusable
/// for later seeds. Stops early when every point is used.
pub(crate) fn random_centroids(
    points: &[Point],
    order: &mut Vec<usize>,
    fleet: &[VehicleCharacteristics],
    compatibility: &dyn CompatibilityFunction,
    number_of_clusters: usize,
    rng: &mut StdRng,
) -> Vec<Centroid> {
    let mut used = vec![false; points.len()];
    let mut centroids = Vec::with_capacity(number_of_clusters);

    for vehicle in 0..number_of_clusters {
        let characteristics = &fleet[vehicle];
        let unused: Vec<usize> = order.iter().copied().filter(|&p| !used[p]).collect();

        let specific: Vec<usize> = unused
            .iter()
            .copied()
            .filter(|&p| {
                let item = &points[p].characteristics;
                (!item.sticky_vehicle_ids.is_empty() || !item.skills.is_empty())
                    && compatibility.compatible(&points[p], characteristics)
            })
            .collect();

        let candidates = if !specific.is_empty() {
            specific
        } else {
            let compatible: Vec<usize> = unused
                .iter()
                .copied()
                .filter(|&p| compatibility.compatible(&points[p], characteristics))
                .collect();
            if compatible.is_empty() { unused } else { compatible }
        };

        if candidates.is_empty() {
            break;
        }

        let candidates = compatible_items_multi_depot_selector(points, &candidates, vehicle);
        let seed = candidates[rng.gen_range(0..candidates.len())];

        centroids.push(Centroid::seeded(seed, &points[seed], vehicle, fleet));
        for_each_linked(points, seed, |member| used[member] = true);
        move_to_front(order, seed);
    }

    centroids
}

/// Keeps the candidates whose depot round trip to `vehicle` ranks within the
/// smallest `margin` among all depots, widening the margin until one qualifies.
///
/// Candidates without depot information always qualify.
pub(crate) fn compatible_items_multi_depot_selector(points: &[Point], candidates: &[usize], vehicle: usize) -> Vec<usize> {
    let ranks: Vec<usize> = candidates
        .iter()
        .map(|&p| match &points[p].characteristics.duration_from_and_to_depot {
            Some(durations) => match durations.get(vehicle) {
                Some(own) => durations.iter().filter(|&&other| other < *own).count(),
                None => 0,
            },
            None => 0,
        })
        .collect();

    let Some(&best_rank) = ranks.iter().min() else {
        return Vec::new();
    };

    // The margin is widened one depot at a time, so the first non-empty
    // selection is the one at the best rank.
    let margin = best_rank + 1;
    candidates
        .iter()
        .zip(&ranks)
        .filter(|(_, rank)| **rank < margin)
        .map(|(&p, _)| p)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VehicleSpec;
    use crate::traits::CharacteristicsCompatibility;
    use rand::SeedableRng;

    fn four_points() -> Vec<Point> {
        vec![
            Point::new("point_1", 45.604784, 4.758965).with_depot_durations(vec![0.0, 4814.68]),
            Point::new("point_2", 45.344334, 4.817731).with_depot_durations(vec![29354.21, 25852.47]),
            Point::new("point_3", 45.576412, 4.805614).with_depot_durations(vec![4814.68, 0.0]),
            Point::new("point_4", 45.258324, 4.687322).with_depot_durations(vec![38972.24, 36596.43]),
        ]
    }

    fn fleet(vehicles: &[VehicleSpec]) -> Vec<VehicleCharacteristics> {
        vehicles.iter().map(VehicleCharacteristics::from_vehicle).collect()
    }

    fn two_vehicles() -> Vec<VehicleSpec> {
        vec![VehicleSpec::new("vehicle_0"), VehicleSpec::new("vehicle_1")]
    }

    #[test]
    fn test_use_provided_centroids() {
        let points = four_points();
        let fleet = fleet(&two_vehicles());
        let mut order: Vec<usize> = (0..4).collect();

        let centroids =
            centroids_from_indices(&points, &mut order, &fleet, &CharacteristicsCompatibility, &[0, 1], 2).unwrap();

        let ids: Vec<&str> = centroids.iter().map(|c| c.representative_id.as_str()).collect();
        assert_eq!(ids, vec!["point_1", "point_2"]);

        let ordered: Vec<&str> = order.iter().map(|&p| points[p].id.as_str()).collect();
        assert_eq!(ordered, vec!["point_2", "point_1", "point_3", "point_4"]);
    }

    #[test]
    fn test_check_centroids_validity() {
        let mut points = four_points();
        let mut vehicles = two_vehicles();
        let compat = CharacteristicsCompatibility;
        let mut order: Vec<usize> = (0..4).collect();

        let fleet_ok = fleet(&vehicles);
        assert_eq!(
            centroids_from_indices(&points, &mut order, &fleet_ok, &compat, &[0, 0], 2).unwrap_err(),
            ValidationError::DuplicateCentroidIndex(0)
        );
        assert!(matches!(
            centroids_from_indices(&points, &mut order, &fleet_ok, &compat, &[0], 2),
            Err(ValidationError::CentroidCountMismatch { expected: 2, got: 1 })
        ));
        assert!(matches!(
            centroids_from_indices(&points, &mut order, &fleet_ok, &compat, &[0, 1, 2], 2),
            Err(ValidationError::CentroidCountMismatch { expected: 2, got: 3 })
        ));
        assert!(matches!(
            centroids_from_indices(&points, &mut order, &fleet_ok, &compat, &[10, 1], 2),
            Err(ValidationError::CentroidIndexOutOfRange { index: 10, len: 4 })
        ));

        vehicles[1].skills.push("needs_vehicle_1".to_string());
        points[0].characteristics.skills.push("needs_vehicle_1".to_string());
        let fleet_skills = fleet(&vehicles);
        assert_eq!(
            centroids_from_indices(&points, &mut order, &fleet_skills, &compat, &[0, 1], 2).unwrap_err(),
            ValidationError::IncompatibleCentroid { index: 0, vehicle: 0 }
        );
    }

    #[test]
    fn test_random_centroids_prefer_own_depot() {
        let points = four_points();
        let fleet = fleet(&two_vehicles());

        for seed in 0..20 {
            let mut order: Vec<usize> = (0..4).collect();
            let mut rng = StdRng::seed_from_u64(seed);
            let centroids =
                random_centroids(&points, &mut order, &fleet, &CharacteristicsCompatibility, 2, &mut rng);

            assert_eq!(centroids.len(), 2);
            // point_1 is the only point nearest to depot 0
            assert_eq!(centroids[0].representative_id, "point_1");
            assert_ne!(centroids[1].representative_id, "point_1");
            assert_eq!(order[0], centroids[1].representative);
            assert_eq!(order[1], centroids[0].representative);
        }
    }

    #[test]
    fn test_random_centroids_prefer_specific_skills() {
        let mut points = four_points();
        points[3].characteristics.skills = vec!["fridge".to_string()];
        let vehicles = vec![VehicleSpec::new("vehicle_0").with_skills(&["fridge"]), VehicleSpec::new("vehicle_1")];
        let fleet = fleet(&vehicles);

        let mut order: Vec<usize> = (0..4).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let centroids = random_centroids(&points, &mut order, &fleet, &CharacteristicsCompatibility, 2, &mut rng);

        assert_eq!(centroids[0].representative_id, "point_4");
        assert_ne!(centroids[1].representative_id, "point_4");
    }

    #[test]
    fn test_random_centroids_stop_when_points_run_out() {
        let points = vec![Point::new("only", 45.0, 4.0)];
        let fleet = fleet(&two_vehicles());
        let mut order = vec![0];
        let mut rng = StdRng::seed_from_u64(1);

        let centroids = random_centroids(&points, &mut order, &fleet, &CharacteristicsCompatibility, 2, &mut rng);
        assert_eq!(centroids.len(), 1);
    }

    #[test]
    fn test_multi_depot_selector_falls_back_to_best_rank() {
        let points = four_points();
        // Every candidate is nearer to depot 1, so depot 0 only gets rank-1 points.
        let selected = compatible_items_multi_depot_selector(&points, &[1, 2, 3], 0);
        assert_eq!(selected, vec![1, 2, 3]);

        let selected = compatible_items_multi_depot_selector(&points, &[0, 1, 2, 3], 1);
        assert_eq!(selected, vec![1, 2, 3]);
    }
}
