//! Validation errors raised by `build`.
//!
//! Every variant names the field or constraint that was violated. Anything
//! that is not a structural input problem is absorbed by the engine.

/// Malformed or inconsistent input detected before or during initialization.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("no vehicles provided")]
    NoVehicles,

    #[error("cut ratio must be in (0, 1], got {0}")]
    InvalidCutRatio(f64),

    #[error("point `{id}` is provided several times")]
    DuplicatePoint { id: String },

    #[error("point `{id}` has missing or non-finite coordinates")]
    MissingCoordinates { id: String },

    #[error("point `{id}` has no quantity for the cut unit `{unit}`")]
    MissingUnitQuantity { id: String, unit: String },

    #[error("point `{id}` has {got} depot durations but there are {expected} vehicles")]
    DepotDurationMismatch { id: String, expected: usize, got: usize },

    #[error("distance matrix must be square: row {row} has {got} columns, expected {expected}")]
    NonSquareMatrix { row: usize, expected: usize, got: usize },

    #[error("point `{id}` has no matrix index while a distance matrix is provided")]
    MissingMatrixIndex { id: String },

    #[error("vehicle {vehicle} has no depot matrix index while a distance matrix is provided")]
    MissingDepotMatrixIndex { vehicle: usize },

    #[error("matrix index {index} is out of range for a matrix of size {size}")]
    MatrixIndexOutOfRange { index: usize, size: usize },

    #[error("vehicle {vehicle} has no capacity for the cut unit `{unit}`")]
    MissingCapacity { vehicle: usize, unit: String },

    #[error("centroid index {0} is provided several times")]
    DuplicateCentroidIndex(usize),

    #[error("wrong number of initial centroids: expected {expected}, got {got}")]
    CentroidCountMismatch { expected: usize, got: usize },

    #[error("centroid index {index} is out of range for {len} points")]
    CentroidIndexOutOfRange { index: usize, len: usize },

    #[error("centroid index {index} is not compatible with vehicle {vehicle}")]
    IncompatibleCentroid { index: usize, vehicle: usize },

    #[error("relation {relation} references point index {index} but there are {len} points")]
    RelationIndexOutOfRange { relation: usize, index: usize, len: usize },

    #[error("relation {relation} lists point index {index} several times")]
    DuplicateRelationIndex { relation: usize, index: usize },

    #[error("point `{id}` appears in more than one non-binding relation")]
    PointInSeveralRelations { id: String },
}

pub type Result<T> = std::result::Result<T, ValidationError>;
