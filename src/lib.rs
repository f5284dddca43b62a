//! vrp-clustering core
//!
//! Splits geo-located service points into one balanced, compact territory
//! per vehicle, honouring capacities, compatibility and relations.

mod assignment;
mod balance;
mod centroids;
mod convergence;
mod init;
mod violations;

pub mod compatibility;
pub mod error;
pub mod geometry;
pub mod limits;
pub mod model;
pub mod relations;
pub mod solver;
pub mod traits;
pub mod validation;

pub use assignment::INCOMPATIBILITY_PENALTY;
pub use error::{Result, ValidationError};
pub use model::{Centroid, Depot, Entity, ItemCharacteristics, Point, Relation, RelationKind, VehicleSpec};
pub use solver::{BalancedClusterer, BuildOptions};
pub use traits::{CompatibilityFunction, DistanceFunction, Site};
