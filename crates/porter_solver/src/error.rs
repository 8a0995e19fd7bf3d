use thiserror::Error;

pub use porter_matrix::RoutingError;

/// Rejections raised while turning user input into a [`Problem`]. All of them
/// are fatal to the current run.
///
/// [`Problem`]: crate::problem::Problem
#[derive(Debug, Error)]
pub enum InputError {
    #[error("unknown location_index {index} (matrix has {dim} locations)")]
    UnknownLocationIndex { index: usize, dim: usize },

    #[error("{entity} {id} has no usable location")]
    MissingLocation { entity: &'static str, id: u64 },

    #[error("inconsistent amount length for {entity} {id}: expected {expected}, got {got}")]
    AmountDimensions {
        entity: &'static str,
        id: u64,
        expected: usize,
        got: usize,
    },

    #[error("invalid time window [{start}, {end}] for {entity} {id}")]
    MalformedTimeWindow {
        entity: &'static str,
        id: u64,
        start: i64,
        end: i64,
    },

    #[error("duplicate {entity} id {id}")]
    DuplicateId { entity: &'static str, id: u64 },

    #[error("pickup {pickup} and delivery {delivery} do not form a consistent shipment")]
    InvalidShipment { pickup: u64, delivery: u64 },

    #[error("invalid priority {priority} for job {id}, expected a value in [0, 100]")]
    InvalidPriority { id: u64, priority: u64 },

    #[error("invalid speed_factor {speed_factor} for vehicle {id}")]
    InvalidSpeedFactor { id: u64, speed_factor: f64 },

    #[error("step {step_id} of vehicle {vehicle_id} cannot be performed: {reason}")]
    ImpossibleStep {
        vehicle_id: u64,
        step_id: u64,
        reason: String,
    },

    #[error("unknown id {id} referenced by a step of vehicle {vehicle_id}")]
    UnknownStepId { vehicle_id: u64, id: u64 },

    #[error("{0}")]
    InvalidFormat(String),
}

/// Top-level failure of a solver run.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Routing(#[from] RoutingError),
}
