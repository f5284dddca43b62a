//! Data model shared by every clustering stage.
//!
//! Points and vehicle specs are supplied by the caller. Centroids are created
//! by the engine, one per cluster, index-aligned with the vehicle specs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Quantity unit used for visit counts.
pub const VISITS: &str = "visits";

/// Quantity unit used for service and route durations.
pub const DURATION: &str = "duration";

/// Day skills assumed when neither the point nor the vehicle restricts days.
pub fn default_days() -> Vec<String> {
    (0..7).map(|day| format!("{}_day_skill", day)).collect()
}

fn one() -> u32 {
    1
}

// ============================================================================
// Points
// ============================================================================

/// Compatibility and routing attributes of a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCharacteristics {
    /// Vehicle ids this point is stuck to. Empty means any vehicle.
    #[serde(default)]
    pub sticky_vehicle_ids: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default = "default_days")]
    pub days: Vec<String>,
    #[serde(default)]
    pub matrix_index: Option<usize>,
    /// Round trip from and to each vehicle's depot, index-aligned with vehicles.
    #[serde(default)]
    pub duration_from_and_to_depot: Option<Vec<f64>>,
}

impl Default for ItemCharacteristics {
    fn default() -> Self {
        Self {
            sticky_vehicle_ids: Vec::new(),
            skills: Vec::new(),
            days: default_days(),
            matrix_index: None,
            duration_from_and_to_depot: None,
        }
    }
}

/// Per-run bookkeeping attached to a point. Reset at the start of every build.
#[derive(Debug, Clone, Default)]
pub(crate) struct PointRunState {
    pub next_linked: Option<usize>,
    pub moved_up: bool,
    pub moved_down: bool,
    pub needs_to_stay_at_the_top: bool,
    /// Weight against relocation, one entry per cluster.
    pub centroid_weights: Vec<f64>,
    pub compatibility_weight: f64,
}

/// A geo-located item to assign to a vehicle territory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    /// Demand per quantity unit, e.g. `visits`, `duration`, `kg`.
    #[serde(default)]
    pub quantities: BTreeMap<String, f64>,
    #[serde(default)]
    pub characteristics: ItemCharacteristics,
    #[serde(skip)]
    pub(crate) run: PointRunState,
}

impl Point {
    pub fn new(id: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            id: id.into(),
            lat,
            lng,
            quantities: BTreeMap::new(),
            characteristics: ItemCharacteristics::default(),
            run: PointRunState::default(),
        }
    }

    pub fn with_quantity(mut self, unit: &str, quantity: f64) -> Self {
        self.quantities.insert(unit.to_string(), quantity);
        self
    }

    pub fn with_skills(mut self, skills: &[&str]) -> Self {
        self.characteristics.skills = skills.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_sticky_vehicles(mut self, ids: &[&str]) -> Self {
        self.characteristics.sticky_vehicle_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_days(mut self, days: &[&str]) -> Self {
        self.characteristics.days = days.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_matrix_index(mut self, index: usize) -> Self {
        self.characteristics.matrix_index = Some(index);
        self
    }

    pub fn with_depot_durations(mut self, durations: Vec<f64>) -> Self {
        self.characteristics.duration_from_and_to_depot = Some(durations);
        self
    }

    /// Location as (lat, lng).
    pub fn location(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }

    /// Demand for `unit`, zero when absent.
    pub fn quantity(&self, unit: &str) -> f64 {
        self.quantities.get(unit).copied().unwrap_or(0.0)
    }

    /// Whether the last relocation pass moved this point to the front.
    pub fn moved_up(&self) -> bool {
        self.run.moved_up
    }

    /// Whether the last relocation pass moved this point to the back.
    pub fn moved_down(&self) -> bool {
        self.run.moved_down
    }
}

// ============================================================================
// Vehicles
// ============================================================================

/// Start/end location of a vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Depot {
    #[serde(default)]
    pub coordinates: Option<(f64, f64)>,
    #[serde(default)]
    pub matrix_index: Option<usize>,
}

impl Depot {
    pub fn is_located(&self) -> bool {
        self.coordinates.is_some() || self.matrix_index.is_some()
    }
}

/// Attributes of the vehicle (or group of vehicles) serving one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSpec {
    /// Identity used to match sticky points.
    #[serde(default)]
    pub id: Vec<String>,
    #[serde(default)]
    pub depot: Depot,
    #[serde(default)]
    pub capacities: BTreeMap<String, f64>,
    /// Work duration per day.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default = "default_days")]
    pub days: Vec<String>,
    #[serde(default = "one")]
    pub total_work_days: u32,
    /// Number of vehicles sharing this cluster.
    #[serde(default = "one")]
    pub vehicle_count: u32,
}

impl VehicleSpec {
    pub fn new(id: &str) -> Self {
        Self {
            id: vec![id.to_string()],
            depot: Depot::default(),
            capacities: BTreeMap::new(),
            duration: None,
            skills: Vec::new(),
            days: default_days(),
            total_work_days: 1,
            vehicle_count: 1,
        }
    }

    pub fn with_depot(mut self, lat: f64, lng: f64) -> Self {
        self.depot.coordinates = Some((lat, lng));
        self
    }

    pub fn with_depot_matrix_index(mut self, index: usize) -> Self {
        self.depot.matrix_index = Some(index);
        self
    }

    pub fn with_capacity(mut self, unit: &str, limit: f64) -> Self {
        self.capacities.insert(unit.to_string(), limit);
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_skills(mut self, skills: &[&str]) -> Self {
        self.skills = skills.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_days(mut self, days: &[&str]) -> Self {
        self.days = days.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Total work time over all days and vehicles, zero without a duration.
    pub fn total_work_time(&self) -> f64 {
        self.duration.unwrap_or(0.0) * self.total_work_days as f64 * self.vehicle_count as f64
    }
}

/// Vehicle attributes a centroid carries, plus cached run estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleCharacteristics {
    pub ids: Vec<String>,
    pub skills: Vec<String>,
    pub days: Vec<String>,
    pub matrix_index: Option<usize>,
    pub duration_from_and_to_depot: f64,
    pub capacity_offence: f64,
    pub route_time: f64,
}

impl VehicleCharacteristics {
    pub fn from_vehicle(vehicle: &VehicleSpec) -> Self {
        Self {
            ids: vehicle.id.clone(),
            skills: vehicle.skills.clone(),
            days: vehicle.days.clone(),
            matrix_index: None,
            duration_from_and_to_depot: 0.0,
            capacity_offence: 0.0,
            route_time: 0.0,
        }
    }
}

// ============================================================================
// Centroids
// ============================================================================

/// Anchor of one cluster.
#[derive(Debug, Clone)]
pub struct Centroid {
    pub lat: f64,
    pub lng: f64,
    /// Id of the member point representing this centroid.
    pub representative_id: String,
    pub(crate) representative: usize,
    /// Index of the vehicle spec this centroid stands for.
    pub vehicle: usize,
    /// Accumulated demand per tracked unit, reset every assignment pass.
    pub load: BTreeMap<String, f64>,
    pub characteristics: VehicleCharacteristics,
}

impl Centroid {
    pub(crate) fn seeded(point_index: usize, point: &Point, vehicle: usize, fleet: &[VehicleCharacteristics]) -> Self {
        let mut characteristics = fleet[vehicle].clone();
        characteristics.matrix_index = point.characteristics.matrix_index;
        characteristics.duration_from_and_to_depot = point
            .characteristics
            .duration_from_and_to_depot
            .as_ref()
            .and_then(|durations| durations.get(vehicle).copied())
            .unwrap_or(0.0);

        Self {
            lat: point.lat,
            lng: point.lng,
            representative_id: point.id.clone(),
            representative: point_index,
            vehicle,
            load: BTreeMap::new(),
            characteristics,
        }
    }

    pub fn location(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }

    /// Accumulated demand for `unit`, zero when absent.
    pub fn load_of(&self, unit: &str) -> f64 {
        self.load.get(unit).copied().unwrap_or(0.0)
    }
}

// ============================================================================
// Relations and options
// ============================================================================

/// Relation kinds. All but `Shipment` bind their points to the same cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    SameRoute,
    SameVehicle,
    Order,
    Sequence,
    Shipment,
}

impl RelationKind {
    pub fn is_binding(self) -> bool {
        !matches!(self, RelationKind::Shipment)
    }
}

/// A group of point indices that must be handled together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub kind: RelationKind,
    pub linked_indices: Vec<usize>,
}

impl Relation {
    pub fn new(kind: RelationKind, linked_indices: Vec<usize>) -> Self {
        Self { kind, linked_indices }
    }
}

/// How soft limits are shared among clusters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    /// Proportional to each vehicle's work time (or capacity).
    #[default]
    Vehicle,
    Uniform,
}
