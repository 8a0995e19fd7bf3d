use serde::Serialize;

use crate::{
    construction::evaluator::{self, KBest},
    problem::{
        instance::Problem,
        job::JobIdx,
        location::LocationIdx,
        units::Duration,
        vehicle::{Vehicle, VehicleIdx},
    },
    solution::solution::Solution,
};

/// How the first task of each empty route is chosen. Varying the seed across
/// multi-start streams diversifies the initial solutions far more than the
/// regret order alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SeedStrategy {
    FarthestFromStart,
    NearestToStart,
    EarliestDeadline,
    HighestPriority,
    HighestAmount,
}

impl SeedStrategy {
    pub const ALL: [SeedStrategy; 5] = [
        SeedStrategy::FarthestFromStart,
        SeedStrategy::NearestToStart,
        SeedStrategy::EarliestDeadline,
        SeedStrategy::HighestPriority,
        SeedStrategy::HighestAmount,
    ];

    /// Ascending sort key; the smallest key wins, ties go to the lower rank.
    fn key(&self, problem: &Problem, vehicle: VehicleIdx, unit: JobIdx) -> i64 {
        let job = problem.job(unit);
        let vehicle = problem.vehicle(vehicle);

        match self {
            SeedStrategy::FarthestFromStart => {
                -leg_duration(problem, vehicle.start(), job.location(), vehicle)
            }
            SeedStrategy::NearestToStart => {
                leg_duration(problem, vehicle.start(), job.location(), vehicle)
            }
            SeedStrategy::EarliestDeadline => job.time_windows().latest_end(),
            SeedStrategy::HighestPriority => -(job.priority() as i64),
            SeedStrategy::HighestAmount => {
                -(job.delivery().iter().sum::<i64>() + job.pickup().iter().sum::<i64>())
            }
        }
    }
}

fn leg_duration(
    problem: &Problem,
    from: Option<LocationIdx>,
    to: LocationIdx,
    vehicle: &Vehicle,
) -> Duration {
    problem.eval_between(vehicle, from, Some(to)).duration
}

/// Plants one task in every empty route. Candidates are visited in strategy
/// order and the first with a feasible placement sticks; vehicles that can
/// serve nothing stay empty.
pub fn apply_seeds(solution: &mut Solution, strategy: SeedStrategy) {
    let vehicle_count = solution.problem().vehicles().len();

    for vehicle in VehicleIdx::all(vehicle_count) {
        if !solution.route(vehicle).is_empty() {
            continue;
        }

        let problem = solution.problem();
        let mut candidates: Vec<JobIdx> = problem
            .unit_ranks()
            .filter(|&unit| solution.is_unassigned(unit) && problem.can_serve(vehicle, unit))
            .collect();
        candidates.sort_by_key(|&unit| {
            (
                strategy.key(problem, vehicle, unit),
                problem.job(unit).id(),
            )
        });

        for unit in candidates {
            let mut collector = KBest::new(1);
            evaluator::evaluate_unit_on_vehicle(solution, unit, vehicle, &mut collector);
            let items = collector.into_items();

            if let Some(best) = items.first() {
                evaluator::apply_insertion(solution, &best.insertion);
                break;
            }
        }
    }
}
