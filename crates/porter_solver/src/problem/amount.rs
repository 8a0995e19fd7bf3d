use std::ops::{Add, AddAssign, Sub, SubAssign};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

type Vector = SmallVec<[i64; 2]>;

/// Fixed-length vector of capacity dimensions with component-wise arithmetic.
/// Comparisons against a capacity are component-wise as well; there is no
/// total order on amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount(Vector);

impl Amount {
    pub const EMPTY: Amount = Amount(Vector::new_const());

    pub fn empty() -> Self {
        Self::EMPTY
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        let mut vec = SmallVec::with_capacity(dimensions);
        vec.resize(dimensions, 0);
        Amount(vec)
    }

    pub fn from_vec(vec: Vec<i64>) -> Self {
        Amount(SmallVec::from_vec(vec))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn get(&self, index: usize) -> i64 {
        self.0.get(index).copied().unwrap_or(0)
    }

    /// True when every component is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0)
    }

    pub fn update(&mut self, other: &Amount) {
        self.0.clone_from(&other.0);
    }

    pub fn reset(&mut self) {
        for value in self.0.iter_mut() {
            *value = 0;
        }
    }

    pub fn update_max(&mut self, other: &Amount) {
        let len = self.len().max(other.len());
        self.0.resize(len, 0);
        for i in 0..len {
            self.0[i] = self.get(i).max(other.get(i));
        }
    }

    /// Component-wise `self <= capacity`.
    #[inline]
    pub fn fits_within(&self, capacity: &Amount) -> bool {
        let len = self.len().max(capacity.len());
        (0..len).all(|i| self.get(i) <= capacity.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.0.iter().copied()
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl AddAssign<&Amount> for Amount {
    fn add_assign(&mut self, rhs: &Amount) {
        if self.0.len() < rhs.len() {
            self.0.resize(rhs.len(), 0);
        }
        for (a, b) in self.0.iter_mut().zip(rhs.iter()) {
            *a += b;
        }
    }
}

impl SubAssign<&Amount> for Amount {
    fn sub_assign(&mut self, rhs: &Amount) {
        if self.0.len() < rhs.len() {
            self.0.resize(rhs.len(), 0);
        }
        for (a, b) in self.0.iter_mut().zip(rhs.iter()) {
            *a -= b;
        }
    }
}

impl Add<&Amount> for &Amount {
    type Output = Amount;

    fn add(self, rhs: &Amount) -> Amount {
        let mut out = self.clone();
        out += rhs;
        out
    }
}

impl Sub<&Amount> for &Amount {
    type Output = Amount;

    fn sub(self, rhs: &Amount) -> Amount {
        let mut out = self.clone();
        out -= rhs;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_assign_extends() {
        let mut a = Amount::from_vec(vec![10, 20]);
        let b = Amount::from_vec(vec![5, 15, 25]);

        a += &b;

        assert_eq!(a.get(0), 15);
        assert_eq!(a.get(1), 35);
        assert_eq!(a.get(2), 25);
    }

    #[test]
    fn test_sub_assign() {
        let mut a = Amount::from_vec(vec![10, 20, 30]);
        let b = Amount::from_vec(vec![5, 15]);

        a -= &b;

        assert_eq!(a, Amount::from_vec(vec![5, 5, 30]));
    }

    #[test]
    fn test_fits_within_is_component_wise() {
        let capacity = Amount::from_vec(vec![10, 10]);

        assert!(Amount::from_vec(vec![10, 10]).fits_within(&capacity));
        assert!(Amount::from_vec(vec![0, 0]).fits_within(&capacity));
        // Lexicographically smaller but component-wise too large.
        assert!(!Amount::from_vec(vec![9, 11]).fits_within(&capacity));
        assert!(!Amount::from_vec(vec![11, 0]).fits_within(&capacity));
    }

    #[test]
    fn test_fits_within_length_mismatch() {
        let capacity = Amount::from_vec(vec![10]);
        assert!(!Amount::from_vec(vec![5, 1]).fits_within(&capacity));
        assert!(Amount::from_vec(vec![5, 0]).fits_within(&capacity));
        assert!(Amount::EMPTY.fits_within(&capacity));
    }

    #[test]
    fn test_update_max() {
        let mut a = Amount::from_vec(vec![1, 5]);
        a.update_max(&Amount::from_vec(vec![3, 2]));
        assert_eq!(a, Amount::from_vec(vec![3, 5]));
    }

    #[test]
    fn test_owned_ops() {
        let a = Amount::from_vec(vec![100]);
        let b = Amount::from_vec(vec![40]);

        assert_eq!(&a - &b, Amount::from_vec(vec![60]));
        assert_eq!(&a + &b, Amount::from_vec(vec![140]));
    }
}
