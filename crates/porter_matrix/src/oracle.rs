use thiserror::Error;

use crate::{coord::Coord, matrix_set::MatrixSet};

/// Errors reported by a routing back-end. They are fatal to the run that
/// triggered them and are never downgraded to infeasibility.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing backend failure: {0}")]
    Backend(String),

    #[error("malformed routing response: {0}")]
    MalformedResponse(String),

    #[error("unknown routing profile '{0}'")]
    UnknownProfile(String),

    #[error("locations without coordinates cannot be routed")]
    MissingCoordinates,

    #[error("geometry is not supported by this provider")]
    GeometryUnsupported,
}

/// Source of travel matrices and (optionally) route geometry.
///
/// The solver resolves every profile exactly once before the search starts;
/// implementations only need to be cheap enough for that single call.
pub trait RoutingOracle: Send + Sync {
    /// Duration/distance tables for the given ordered location set.
    fn matrices(&self, profile: &str, locations: &[Coord]) -> Result<MatrixSet, RoutingError>;

    /// Encoded polyline following the given locations in order.
    fn geometry(&self, _locations: &[Coord]) -> Result<String, RoutingError> {
        Err(RoutingError::GeometryUnsupported)
    }
}
