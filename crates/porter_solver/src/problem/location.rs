use porter_matrix::Coord;
use serde::Serialize;

use crate::define_rank;

define_rank!(LocationIdx indexes "locations");

/// A canonicalized location: a dense matrix index, optionally annotated with
/// coordinates for geometry output. Two locations are the same place iff
/// their index is the same.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Location {
    index: LocationIdx,
    coords: Option<Coord>,
}

impl Location {
    pub fn new(index: usize, coords: Option<Coord>) -> Self {
        Location {
            index: LocationIdx::new(index),
            coords,
        }
    }

    pub fn index(&self) -> LocationIdx {
        self.index
    }

    pub fn coords(&self) -> Option<Coord> {
        self.coords
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for Location {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_by_index() {
        let a = Location::new(3, Some(Coord::new(1.0, 2.0)));
        let b = Location::new(3, None);
        let c = Location::new(4, Some(Coord::new(1.0, 2.0)));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
