//! Balanced territory clustering.
//!
//! `BalancedClusterer` holds the configuration; `build` runs the whole
//! pipeline on a set of points:
//!
//! 1. normalize and validate inputs, link relations, compute limits;
//! 2. order points by decreasing balancing demand and seed centroids;
//! 3. loop { refresh limits, assign, update balance, recompute centroids }
//!    until convergence or the iteration cap;
//! 4. optionally run one relaxed assignment pass.
//!
//! # Randomness
//!
//! All randomness comes from one `StdRng` seeded at the start of `build`.
//! It is consumed in this order: the shuffle of the middle demand band, one
//! draw per randomly seeded centroid, then every iteration one draw per
//! non-forced relocation candidate followed by the swap jitters.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::assignment;
use crate::balance;
use crate::centroids;
use crate::convergence;
use crate::error::Result;
use crate::init;
use crate::limits;
use crate::model::{Centroid, DURATION, Entity, Point, Relation, VehicleCharacteristics, VehicleSpec};
use crate::relations;
use crate::traits::{CharacteristicsCompatibility, CompatibilityFunction, DistanceFunction, FlyingDistance, MatrixDistance};
use crate::validation;
use crate::violations::ViolationEvent;

/// Minimum default iteration cap.
const MIN_DEFAULT_ITERATIONS: usize = 100;

/// Start of the demand band shuffled before seeding.
const SHUFFLE_BAND_START: f64 = 0.1;

/// End of the demand band shuffled before seeding.
const SHUFFLE_BAND_END: f64 = 0.9;

/// Balance rate lost over the whole run.
const BALANCE_RATE_DECAY: f64 = 0.2;

// ============================================================================
// Options
// ============================================================================

/// Per-build options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Seed of the run's random generator. Random when unset.
    pub seed: Option<u64>,
    /// Balance rate of one extra assignment pass run after the loop.
    pub last_iteration_balance_rate: Option<f64>,
    /// Drop strict limits for one extra assignment pass run after the loop.
    pub last_iteration_no_strict_limitations: bool,
    /// How soft limits are shared between vehicles.
    pub entity: Entity,
}

// ============================================================================
// Run state
// ============================================================================

/// Everything one build mutates, owned by that build.
pub(crate) struct ClusteringRunState {
    pub points: Vec<Point>,
    /// Processing order of the assignment pass, as point indices.
    pub order: Vec<usize>,
    pub centroids: Vec<Centroid>,
    /// Member point indices per cluster.
    pub clusters: Vec<Vec<usize>>,
    /// Units accumulated in centroid loads.
    pub unit_symbols: Vec<String>,
    pub cut_symbol: Option<String>,
    pub cut_ratio: f64,
    pub total_cut_load: f64,
    pub strict_limits: Vec<BTreeMap<String, f64>>,
    /// Duration ceilings before depot travel is taken off.
    pub base_duration_limits: Vec<Option<f64>>,
    pub shares: Vec<f64>,
    pub soft_limits: Vec<f64>,
    pub balance_coefficients: Vec<f64>,
    /// Weight of the balance coefficients in assignment distances.
    pub rate_balance: f64,
    pub violations: Vec<ViolationEvent>,
    /// Alternate clusters chosen for points redirected away, per cluster.
    pub redirections: Vec<Vec<usize>>,
    pub needed_moving: usize,
    pub peak_balance_violation: f64,
    pub iteration: usize,
    pub max_iterations: usize,
    pub old_positions: Vec<(f64, f64)>,
    pub movement_history: Vec<f64>,
    pub rng: StdRng,
}

impl ClusteringRunState {
    fn new(points: Vec<Point>, max_iterations: usize, rng: StdRng) -> Self {
        let order = (0..points.len()).collect();
        Self {
            points,
            order,
            centroids: Vec::new(),
            clusters: Vec::new(),
            unit_symbols: Vec::new(),
            cut_symbol: None,
            cut_ratio: 1.0,
            total_cut_load: 0.0,
            strict_limits: Vec::new(),
            base_duration_limits: Vec::new(),
            shares: Vec::new(),
            soft_limits: Vec::new(),
            balance_coefficients: Vec::new(),
            rate_balance: 0.0,
            violations: Vec::new(),
            redirections: Vec::new(),
            needed_moving: 0,
            peak_balance_violation: 0.0,
            iteration: 0,
            max_iterations,
            old_positions: Vec::new(),
            movement_history: Vec::new(),
            rng,
        }
    }

    /// Fraction of the iteration budget already spent, in [0, 1].
    pub fn progress(&self) -> f64 {
        if self.max_iterations == 0 {
            return 1.0;
        }
        (self.iteration as f64 / self.max_iterations as f64).min(1.0)
    }

    /// Sizes the per-cluster vectors once the centroids are known.
    fn prepare_clusters(&mut self) {
        let number_of_clusters = self.centroids.len();
        self.clusters = vec![Vec::new(); number_of_clusters];
        self.redirections = vec![Vec::new(); number_of_clusters];
        self.balance_coefficients = vec![1.0; number_of_clusters];
        for point in self.points.iter_mut() {
            point.run.centroid_weights = vec![1.0; number_of_clusters];
            point.run.compatibility_weight = 1.0;
        }
    }
}

/// Read-only collaborators of one build.
pub(crate) struct RunContext<'a> {
    /// Vehicle specs that received a centroid, index-aligned with centroids.
    pub vehicles: &'a [VehicleSpec],
    pub distance: &'a dyn DistanceFunction,
    pub compatibility: &'a dyn CompatibilityFunction,
    pub entity: Entity,
}

impl<'a> RunContext<'a> {
    pub fn new(
        vehicles: &'a [VehicleSpec],
        distance: &'a dyn DistanceFunction,
        compatibility: &'a dyn CompatibilityFunction,
        entity: Entity,
    ) -> Self {
        Self {
            vehicles,
            distance,
            compatibility,
            entity,
        }
    }
}

// ============================================================================
// Clusterer
// ============================================================================

/// Partitions points into one balanced territory per vehicle spec.
///
/// Configure the public fields, then call [`BalancedClusterer::build`].
#[derive(Default)]
pub struct BalancedClusterer {
    /// One spec per cluster.
    pub vehicles: Vec<VehicleSpec>,
    /// Square matrix indexed by point and depot matrix indices.
    pub distance_matrix: Option<Vec<Vec<f64>>>,
    /// Overrides both the matrix lookup and flying distance.
    pub distance_function: Option<Box<dyn DistanceFunction>>,
    /// Overrides the skills, sticky vehicles and days check.
    pub compatibility_function: Option<Box<dyn CompatibilityFunction>>,
    /// Point indices seeding the centroids, one per cluster. Random when empty.
    pub centroid_indices: Vec<usize>,
    /// Defaults to half the number of points, at least 100.
    pub max_iterations: Option<usize>,
    state: Option<ClusteringRunState>,
}

impl BalancedClusterer {
    pub fn new(vehicles: Vec<VehicleSpec>) -> Self {
        Self {
            vehicles,
            ..Self::default()
        }
    }

    /// Clusters `points`, balancing clusters on `cut_symbol` when set.
    ///
    /// `cut_ratio` scales the soft limits. Fails only on invalid input; the
    /// result of a run that hits the iteration cap is still returned.
    pub fn build(
        &mut self,
        points: Vec<Point>,
        cut_symbol: Option<&str>,
        relations: &[Relation],
        cut_ratio: f64,
        options: BuildOptions,
    ) -> Result<&mut Self> {
        self.state = None;
        let mut points = points;

        validation::normalize_vehicles(&mut self.vehicles);
        validation::validate(&points, &self.vehicles, cut_symbol, cut_ratio, self.distance_matrix.as_deref())?;
        validation::normalize_points(&mut points);

        let matrix = self.distance_matrix.as_deref();
        limits::compute_distance_from_and_to_depot(&self.vehicles, &mut points, matrix);
        relations::link_relations(&mut points, relations)?;

        let all_limits = limits::compute_limits(cut_symbol, cut_ratio, &self.vehicles, &points, options.entity)?;

        let max_iterations = self
            .max_iterations
            .unwrap_or_else(|| (points.len() / 2).max(MIN_DEFAULT_ITERATIONS));
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut state = ClusteringRunState::new(points, max_iterations, rng);
        state.cut_ratio = cut_ratio;
        state.unit_symbols = unit_symbols(cut_symbol, &self.vehicles);

        if let Some(cut) = cut_symbol {
            state.total_cut_load = state.points.iter().map(|point| point.quantity(cut)).sum();
            if state.total_cut_load > 0.0 {
                state.cut_symbol = Some(cut.to_string());
                order_by_demand(&mut state, cut);
            } else {
                debug!(unit = cut, "no demand on the balancing unit, balancing disabled");
            }
        }

        let fleet: Vec<VehicleCharacteristics> = self.vehicles.iter().map(VehicleCharacteristics::from_vehicle).collect();
        let compatibility: &dyn CompatibilityFunction =
            self.compatibility_function.as_deref().unwrap_or(&CharacteristicsCompatibility);
        let matrix_distance = matrix.map(MatrixDistance::new);
        let distance: &dyn DistanceFunction = match (&self.distance_function, &matrix_distance) {
            (Some(function), _) => &**function,
            (None, Some(matrix_distance)) => matrix_distance,
            (None, None) => &FlyingDistance,
        };

        let number_of_clusters = self.vehicles.len().min(distinct_locations(&state.points));
        state.centroids = if self.centroid_indices.is_empty() {
            init::random_centroids(
                &state.points,
                &mut state.order,
                &fleet,
                compatibility,
                number_of_clusters,
                &mut state.rng,
            )
        } else {
            init::centroids_from_indices(
                &state.points,
                &mut state.order,
                &fleet,
                compatibility,
                &self.centroid_indices,
                number_of_clusters,
            )?
        };
        state.prepare_clusters();

        let active = &self.vehicles[..state.centroids.len()];
        state.strict_limits = all_limits.strict[..active.len()].to_vec();
        state.base_duration_limits = state.strict_limits.iter().map(|limits| limits.get(DURATION).copied()).collect();
        state.shares = limits::vehicle_shares(state.cut_symbol.as_deref(), active, options.entity);
        state.soft_limits = match &state.cut_symbol {
            Some(_) => limits::dynamic_soft_limits(cut_ratio, state.total_cut_load, &[], &state.shares),
            None => Vec::new(),
        };
        assign_compatibility_weights(&mut state, &fleet, compatibility);

        let ctx = RunContext::new(active, distance, compatibility, options.entity);
        run(&mut state, &ctx, &options);

        info!(
            points = state.points.len(),
            clusters = state.centroids.len(),
            iterations = state.iteration,
            max_iterations = state.max_iterations,
            "clustering finished"
        );

        self.state = Some(state);
        Ok(self)
    }

    /// Member points per vehicle spec. Specs without a centroid get an empty
    /// cluster.
    pub fn clusters(&self) -> Vec<Vec<&Point>> {
        (0..self.vehicles.len())
            .map(|vehicle| match &self.state {
                Some(state) => state
                    .clusters
                    .get(vehicle)
                    .map(|members| members.iter().map(|&member| &state.points[member]).collect::<Vec<_>>())
                    .unwrap_or_default(),
                None => Vec::new(),
            })
            .collect()
    }

    pub fn centroids(&self) -> &[Centroid] {
        self.state.as_ref().map_or(&[][..], |state| state.centroids.as_slice())
    }

    /// Number of loop iterations of the last build.
    pub fn iterations(&self) -> usize {
        self.state.as_ref().map_or(0, |state| state.iteration)
    }

    /// Current soft limits of the balancing unit, one per cluster.
    pub fn cut_limit(&self) -> &[f64] {
        self.state.as_ref().map_or(&[][..], |state| state.soft_limits.as_slice())
    }

    /// Strict limits used by the last assignment pass.
    pub fn strict_limits(&self) -> &[BTreeMap<String, f64>] {
        self.state.as_ref().map_or(&[][..], |state| state.strict_limits.as_slice())
    }

    pub fn balance_coefficients(&self) -> &[f64] {
        self.state.as_ref().map_or(&[][..], |state| state.balance_coefficients.as_slice())
    }

    /// Points of the last build, in input order.
    pub fn points(&self) -> &[Point] {
        self.state.as_ref().map_or(&[][..], |state| state.points.as_slice())
    }

    /// Gives back the points of the last build, in input order.
    pub fn into_points(self) -> Vec<Point> {
        self.state.map(|state| state.points).unwrap_or_default()
    }
}

// ============================================================================
// Pipeline
// ============================================================================

fn run(state: &mut ClusteringRunState, ctx: &RunContext<'_>, options: &BuildOptions) {
    if state.centroids.is_empty() {
        return;
    }

    while !convergence::stop_criteria_met(state) && state.iteration < state.max_iterations {
        if state.cut_symbol.is_some() {
            state.rate_balance = 1.0 - BALANCE_RATE_DECAY * state.progress();
        }
        limits::refresh_strict_duration_limits(
            &mut state.strict_limits,
            &state.base_duration_limits,
            &state.centroids,
            ctx.vehicles,
        );

        assignment::calculate_membership_clusters(state, ctx);
        balance::update_balance_coefficients(state, ctx);
        centroids::recompute_centroids(state, ctx);

        debug!(
            iteration = state.iteration,
            pending = state.needed_moving,
            peak_balance_violation = state.peak_balance_violation,
            "iteration done"
        );
    }

    let relaxed = options.last_iteration_balance_rate.is_some() || options.last_iteration_no_strict_limitations;
    if !relaxed && state.iteration > 0 {
        return;
    }

    if let Some(rate) = options.last_iteration_balance_rate {
        state.rate_balance = rate;
    }
    if options.last_iteration_no_strict_limitations {
        state.strict_limits.clear();
    } else {
        limits::refresh_strict_duration_limits(
            &mut state.strict_limits,
            &state.base_duration_limits,
            &state.centroids,
            ctx.vehicles,
        );
    }

    assignment::calculate_membership_clusters(state, ctx);
    debug!(rate_balance = state.rate_balance, strict = !state.strict_limits.is_empty(), "final assignment pass");
}

/// The cut unit followed by every capacity unit, without duplicates.
fn unit_symbols(cut_symbol: Option<&str>, vehicles: &[VehicleSpec]) -> Vec<String> {
    let mut symbols: Vec<String> = cut_symbol.map(str::to_string).into_iter().collect();
    let capacities: BTreeSet<&String> = vehicles.iter().flat_map(|vehicle| vehicle.capacities.keys()).collect();
    for unit in capacities {
        if !symbols.contains(unit) {
            symbols.push(unit.clone());
        }
    }
    symbols
}

fn distinct_locations(points: &[Point]) -> usize {
    points
        .iter()
        .map(|point| (point.lat.to_bits(), point.lng.to_bits()))
        .collect::<HashSet<_>>()
        .len()
}

/// Sorts the processing order by decreasing demand and shuffles its middle.
///
/// Heavy points in the leading band must stay at the top of the order.
fn order_by_demand(state: &mut ClusteringRunState, cut: &str) {
    let points = &state.points;
    state
        .order
        .sort_by(|&a, &b| points[b].quantity(cut).total_cmp(&points[a].quantity(cut)));

    let len = state.order.len();
    if len == 0 {
        return;
    }
    let start = (len as f64 * SHUFFLE_BAND_START) as usize;
    let end = ((len as f64 * SHUFFLE_BAND_END) as usize).min(len - 1);
    state.order[start..=end].shuffle(&mut state.rng);

    let heavy = 2.0 * state.total_cut_load / len as f64;
    for position in 0..start {
        let point = state.order[position];
        if state.points[point].quantity(cut) > heavy {
            state.points[point].run.needs_to_stay_at_the_top = true;
        }
    }
}

/// Raises the weight of points only a small share of the fleet can serve.
fn assign_compatibility_weights(
    state: &mut ClusteringRunState,
    fleet: &[VehicleCharacteristics],
    compatibility: &dyn CompatibilityFunction,
) {
    let Some(min_share) = state.shares.iter().copied().reduce(f64::min) else {
        return;
    };

    for index in 0..state.points.len() {
        let point = &state.points[index];
        let mut share: f64 = state
            .shares
            .iter()
            .enumerate()
            .filter(|&(vehicle, _)| compatibility.compatible(point, &fleet[vehicle]))
            .map(|(_, share)| share)
            .sum();
        if share <= 0.0 {
            share = min_share / 2.0;
        }
        let weight = if share >= 1.0 { 1.0 } else { 1.0 + (1.0 / share).ln() };
        state.points[index].run.compatibility_weight = weight;
    }
}
