use porter_matrix::MatrixSet;

use crate::define_rank;

define_rank!(ProfileIdx indexes "profiles");

/// A named transport mode and the travel tables resolved for it.
#[derive(Debug, Clone)]
pub struct Profile {
    name: String,
    matrices: MatrixSet,
}

impl Profile {
    pub fn new(name: String, matrices: MatrixSet) -> Self {
        Profile { name, matrices }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matrices(&self) -> &MatrixSet {
        &self.matrices
    }
}
