//! Point/vehicle compatibility predicate.

use crate::model::{ItemCharacteristics, VehicleCharacteristics};

/// Whether a vehicle can serve an item.
///
/// Incompatible when the item is stuck to vehicles the vehicle is not, needs a
/// skill the vehicle lacks, or shares no day with it.
pub fn compatible_characteristics(item: &ItemCharacteristics, vehicle: &VehicleCharacteristics) -> bool {
    if !item.sticky_vehicle_ids.is_empty()
        && !item.sticky_vehicle_ids.iter().any(|id| vehicle.ids.contains(id))
    {
        return false;
    }

    if !item.skills.iter().all(|skill| vehicle.skills.contains(skill)) {
        return false;
    }

    item.days.iter().any(|day| vehicle.days.contains(day))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(v_id: &[&str], skills: &[&str], days: &[&str]) -> ItemCharacteristics {
        ItemCharacteristics {
            sticky_vehicle_ids: v_id.iter().map(|s| s.to_string()).collect(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            days: days.iter().map(|s| s.to_string()).collect(),
            ..ItemCharacteristics::default()
        }
    }

    fn vehicle(ids: &[&str], skills: &[&str], days: &[&str]) -> VehicleCharacteristics {
        VehicleCharacteristics {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            days: days.iter().map(|s| s.to_string()).collect(),
            matrix_index: None,
            duration_from_and_to_depot: 0.0,
            capacity_offence: 0.0,
            route_time: 0.0,
        }
    }

    #[test]
    fn test_unconstrained_item_is_compatible() {
        assert!(compatible_characteristics(&item(&[], &[], &["all_days"]), &vehicle(&[], &[], &["all_days"])));
    }

    #[test]
    fn test_sticky_vehicle() {
        assert!(!compatible_characteristics(&item(&["v1"], &[], &["all_days"]), &vehicle(&[], &[], &["all_days"])));
        assert!(compatible_characteristics(&item(&["v1"], &[], &["all_days"]), &vehicle(&["v1"], &[], &["all_days"])));
        assert!(compatible_characteristics(&item(&[], &[], &["all_days"]), &vehicle(&["v1"], &[], &["all_days"])));
    }

    #[test]
    fn test_skills() {
        assert!(!compatible_characteristics(&item(&[], &["sk1"], &["all_days"]), &vehicle(&[], &[], &["all_days"])));
        assert!(compatible_characteristics(&item(&[], &["sk1"], &["all_days"]), &vehicle(&[], &["sk1"], &["all_days"])));
        assert!(compatible_characteristics(&item(&[], &[], &["all_days"]), &vehicle(&[], &["sk1"], &["all_days"])));
    }

    #[test]
    fn test_days() {
        assert!(!compatible_characteristics(&item(&[], &[], &["other_days"]), &vehicle(&[], &[], &["all_days"])));
        assert!(!compatible_characteristics(
            &item(&[], &[], &["monday", "tuesday"]),
            &vehicle(&[], &[], &["wednesday", "thursday"])
        ));
        assert!(compatible_characteristics(
            &item(&[], &[], &["monday", "tuesday"]),
            &vehicle(&[], &[], &["tuesday", "thursday"])
        ));
    }
}
