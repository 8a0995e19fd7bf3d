pub mod coord;
pub mod great_circle;
pub mod matrix_set;
pub mod oracle;
pub mod polyline;

pub use coord::Coord;
pub use matrix_set::{MatrixSet, UNREACHABLE};
pub use oracle::{RoutingError, RoutingOracle};
