use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;

use crate::{
    construction::{evaluator, RegretInsertion},
    problem::{job::JobIdx, job::JobKind, vehicle::VehicleIdx},
    search::{r#move::Operator, relocate::Relocate},
    solution::solution::Solution,
};

#[derive(Debug, Clone, Copy)]
pub struct PerturbParams {
    /// Share of assigned units torn out by ruin-and-recreate.
    pub ruin_share: f64,
    /// Regret depth used when rebuilding.
    pub regret_k: usize,
    /// Attempts at sideways relocations per kick.
    pub sideways_attempts: usize,
}

impl Default for PerturbParams {
    fn default() -> Self {
        PerturbParams {
            ruin_share: 0.15,
            regret_k: 2,
            sideways_attempts: 12,
        }
    }
}

/// One escape kick from the fixed catalog, cycled by round so a stream
/// applies the same sequence for the same seed.
pub fn perturb(solution: &mut Solution, rng: &mut StdRng, round: usize, params: PerturbParams) {
    match round % 3 {
        0 => ruin_recreate(solution, rng, params),
        1 => shuffle_route(solution, rng),
        _ => sideways_moves(solution, rng, params.sideways_attempts),
    }
}

/// Tears a random subset of served units out and rebuilds by regret.
fn ruin_recreate(solution: &mut Solution, rng: &mut StdRng, params: PerturbParams) {
    let assigned: Vec<JobIdx> = solution
        .problem()
        .unit_ranks()
        .filter(|&unit| !solution.is_unassigned(unit))
        .collect();
    if assigned.is_empty() {
        return;
    }

    let count = ((assigned.len() as f64 * params.ruin_share).ceil() as usize).max(1);
    let victims: Vec<JobIdx> = assigned
        .choose_multiple(rng, count.min(assigned.len()))
        .copied()
        .collect();

    for unit in victims {
        solution.unassign_task(unit);
    }

    RegretInsertion::new(params.regret_k.max(2)).run(solution);
}

/// Empties one random route and reinserts its units in random order, each at
/// its globally best slot.
fn shuffle_route(solution: &mut Solution, rng: &mut StdRng) {
    let non_empty: Vec<VehicleIdx> = solution
        .routes()
        .iter()
        .filter(|route| !route.is_empty())
        .map(|route| route.vehicle_idx())
        .collect();
    let Some(&victim) = non_empty.as_slice().choose(rng) else {
        return;
    };

    let removed = solution.clear_route(victim);
    let mut units: Vec<JobIdx> = removed
        .into_iter()
        .filter(|&task| solution.problem().job(task).kind() != JobKind::Delivery)
        .collect();
    units.shuffle(rng);

    for unit in units {
        let ranked = evaluator::evaluate_insertions(solution, unit, 1);
        if let Some(best) = ranked.first() {
            evaluator::apply_insertion(solution, &best.insertion);
        }
    }
}

/// Applies up to two random feasible single-task relocations regardless of
/// gain, drifting the solution without tearing it apart.
fn sideways_moves(solution: &mut Solution, rng: &mut StdRng, attempts: usize) {
    let routes = solution.routes().len();
    let mut applied = 0;

    for _ in 0..attempts {
        if applied >= 2 {
            break;
        }

        let from_route = VehicleIdx::new(rng.random_range(0..routes));
        let to_route = VehicleIdx::new(rng.random_range(0..routes));
        let source_len = solution.route(from_route).len();
        if source_len == 0 {
            continue;
        }

        let from = rng.random_range(0..source_len);
        let task = solution.route(from_route).task(from);
        if solution.problem().job(task).is_shipment_part() {
            continue;
        }

        let target_len = solution.route(to_route).len();
        let to = rng.random_range(0..=target_len);
        if from_route == to_route && (to == from || to == from + 1) {
            continue;
        }

        let op = Relocate {
            from_route,
            to_route,
            from,
            to,
        };
        if op.is_valid(solution) {
            op.apply(solution);
            applied += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::SeedableRng;

    use super::*;
    use crate::test_utils;

    #[test]
    fn test_perturbations_keep_solutions_valid() {
        let problem = Arc::new(test_utils::problem_from_grid(
            12,
            &[1, 2, 3, 7, 8, 9],
            &[0, 10],
        ));
        let mut solution =
            test_utils::solution_with_routes(&problem, &[&[0, 1, 2], &[3, 4, 5]]);
        let mut rng = StdRng::seed_from_u64(7);

        for round in 0..9 {
            perturb(&mut solution, &mut rng, round, PerturbParams::default());
            solution.validate().unwrap();
        }
    }

    #[test]
    fn test_perturbation_is_deterministic() {
        let problem = Arc::new(test_utils::problem_from_grid(
            12,
            &[1, 2, 3, 7, 8, 9],
            &[0, 10],
        ));

        let run = || {
            let mut solution =
                test_utils::solution_with_routes(&problem, &[&[0, 1, 2], &[3, 4, 5]]);
            let mut rng = StdRng::seed_from_u64(99);
            for round in 0..6 {
                perturb(&mut solution, &mut rng, round, PerturbParams::default());
            }
            solution
                .routes()
                .iter()
                .map(|route| route.tasks().to_vec())
                .collect::<Vec<_>>()
        };

        assert_eq!(run(), run());
    }
}
