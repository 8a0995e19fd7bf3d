pub mod evaluator;
pub mod regret;
pub mod seeds;
pub mod steps;

use std::sync::Arc;

use crate::{
    error::InputError,
    problem::instance::Problem,
    solution::solution::Solution,
};

pub use evaluator::{apply_insertion, Insertion, RankedInsertion};
pub use regret::RegretInsertion;
pub use seeds::SeedStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstructionParams {
    pub regret_k: usize,
    pub seed: SeedStrategy,
}

impl Default for ConstructionParams {
    fn default() -> Self {
        ConstructionParams {
            regret_k: 3,
            seed: SeedStrategy::FarthestFromStart,
        }
    }
}

/// Builds the initial feasible solution: forced vehicle steps first, then one
/// seed task per empty route, then regret-k insertion until nothing fits.
/// Whatever cannot be feasibly placed stays unassigned.
pub fn build_initial(
    problem: &Arc<Problem>,
    params: ConstructionParams,
) -> Result<Solution, InputError> {
    let mut solution = Solution::new(Arc::clone(problem));

    steps::apply_forced_steps(&mut solution)?;
    seeds::apply_seeds(&mut solution, params.seed);
    RegretInsertion::new(params.regret_k).run(&mut solution);

    solution.debug_validate();
    Ok(solution)
}
