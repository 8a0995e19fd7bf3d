use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::debug;

use crate::{
    construction::evaluator::{self, RankedInsertion},
    problem::{job::JobIdx, units::Cost},
    solution::solution::Solution,
};

/// Synthetic regret charged for every missing option below `k`: units with
/// few remaining placements must go before flexible ones.
const SCARCITY_PENALTY: Cost = 1 << 35;

/// Regret-k insertion: repeatedly place the unit whose best slot is most
/// costly to postpone.
///
/// For every unassigned unit the `k` cheapest feasible insertions are
/// gathered; the regret is the summed gap between the best and each of the
/// following ones. The unit with the largest regret is committed to its best
/// slot. Ties go to the lower external job id.
pub struct RegretInsertion {
    k: usize,
}

impl RegretInsertion {
    pub fn new(k: usize) -> Self {
        assert!(k >= 2, "regret needs at least two options to compare");
        RegretInsertion { k }
    }

    pub fn run(&self, solution: &mut Solution) {
        let mut inserted = 0_usize;

        while let Some(best) = self.most_regretted(solution) {
            evaluator::apply_insertion(solution, &best.insertion);
            inserted += 1;
        }

        debug!(
            inserted,
            unassigned = solution.unassigned().len(),
            "regret construction finished"
        );
    }

    fn most_regretted(&self, solution: &Solution) -> Option<RankedInsertion> {
        let problem = solution.problem();
        let units: Vec<JobIdx> = problem
            .unit_ranks()
            .filter(|&unit| solution.is_unassigned(unit))
            .collect();

        let scored: Vec<(Cost, u64, RankedInsertion)> = units
            .par_iter()
            .filter_map(|&unit| {
                let ranked = evaluator::evaluate_insertions(solution, unit, self.k);
                let best = *ranked.first()?;

                let mut regret: Cost = ranked
                    .iter()
                    .skip(1)
                    .map(|option| option.cost - best.cost)
                    .sum();
                regret += (self.k - ranked.len()) as Cost * SCARCITY_PENALTY;

                Some((regret, problem.job(unit).id(), best))
            })
            .collect();

        scored
            .into_iter()
            .max_by(|(regret_a, id_a, _), (regret_b, id_b, _)| {
                // Highest regret first; equal regret goes to the lower id,
                // so the reversed id comparison feeds max_by.
                regret_a.cmp(regret_b).then_with(|| id_b.cmp(id_a))
            })
            .map(|(_, _, best)| best)
    }
}
