use serde::{Deserialize, Serialize};

use crate::oracle::RoutingError;

/// Sentinel marking a pair of locations with no route between them.
pub const UNREACHABLE: i64 = i64::MAX;

/// Square travel tables for one routing profile.
///
/// Tables are stored flat; the entry for a pair of locations is at
/// `from * dim + to`. Distances default to zero when the provider only knows
/// durations, and `costs` is only present when the caller supplied an explicit
/// cost table that should bypass the duration/distance based cost model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixSet {
    durations: Vec<i64>,
    distances: Vec<i64>,
    costs: Option<Vec<i64>>,
    dim: usize,
}

impl MatrixSet {
    pub fn from_tables(
        dim: usize,
        durations: Vec<i64>,
        distances: Option<Vec<i64>>,
        costs: Option<Vec<i64>>,
    ) -> Result<Self, RoutingError> {
        let expected = dim * dim;
        if durations.len() != expected {
            return Err(RoutingError::MalformedResponse(format!(
                "durations table has {} entries, expected {}",
                durations.len(),
                expected
            )));
        }

        let distances = distances.unwrap_or_else(|| vec![0; expected]);
        if distances.len() != expected {
            return Err(RoutingError::MalformedResponse(format!(
                "distances table has {} entries, expected {}",
                distances.len(),
                expected
            )));
        }

        if let Some(costs) = &costs
            && costs.len() != expected
        {
            return Err(RoutingError::MalformedResponse(format!(
                "costs table has {} entries, expected {}",
                costs.len(),
                expected
            )));
        }

        Ok(MatrixSet {
            durations,
            distances,
            costs,
            dim,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline(always)]
    fn index(&self, from: usize, to: usize) -> usize {
        from * self.dim + to
    }

    #[inline(always)]
    pub fn duration(&self, from: usize, to: usize) -> i64 {
        if from == to {
            return 0;
        }
        self.durations[self.index(from, to)]
    }

    #[inline(always)]
    pub fn distance(&self, from: usize, to: usize) -> i64 {
        if from == to {
            return 0;
        }
        self.distances[self.index(from, to)]
    }

    #[inline(always)]
    pub fn cost(&self, from: usize, to: usize) -> Option<i64> {
        let costs = self.costs.as_ref()?;
        if from == to {
            return Some(0);
        }
        Some(costs[self.index(from, to)])
    }

    pub fn has_costs(&self) -> bool {
        self.costs.is_some()
    }

    #[inline(always)]
    pub fn is_reachable(&self, from: usize, to: usize) -> bool {
        self.duration(from, to) != UNREACHABLE
    }

    /// Whether any pair is marked unreachable.
    pub fn has_unreachable(&self) -> bool {
        self.durations.contains(&UNREACHABLE)
    }
}
