use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    problem::{job::JobIdx, units::Cost, vehicle::VehicleIdx},
    search::r#move::{fixed_delta, Operator},
    solution::solution::Solution,
};

/// Swaps the entire task sequences of two vehicles. Pays off when fleet
/// heterogeneity (depot, capacity, speed, cost rates) favors the crossing.
#[derive(Debug, Clone, Copy)]
pub struct RouteExchange {
    pub first_route: VehicleIdx,
    pub second_route: VehicleIdx,
}

impl Operator for RouteExchange {
    fn generate<C>(solution: &Solution, (r1, r2): (VehicleIdx, VehicleIdx), mut consumer: C)
    where
        C: FnMut(Self),
    {
        if r1 >= r2 {
            return;
        }
        if solution.route(r1).is_empty() && solution.route(r2).is_empty() {
            return;
        }

        consumer(RouteExchange {
            first_route: r1,
            second_route: r2,
        });
    }

    fn gain(&self, solution: &Solution) -> Cost {
        let problem = solution.problem();
        let first = solution.route(self.first_route);
        let second = solution.route(self.second_route);

        first
            .eval_delta_replace(problem, second.tasks(), 0, first.len())
            .cost
            + second
                .eval_delta_replace(problem, first.tasks(), 0, second.len())
                .cost
            + fixed_delta(problem, first, second.len())
            + fixed_delta(problem, second, first.len())
    }

    fn is_valid(&self, solution: &Solution) -> bool {
        let problem = solution.problem();
        let first = solution.route(self.first_route);
        let second = solution.route(self.second_route);

        let serveable = first
            .tasks()
            .iter()
            .all(|&task| problem.can_serve(self.second_route, task))
            && second
                .tasks()
                .iter()
                .all(|&task| problem.can_serve(self.first_route, task));

        serveable
            && first.can_replace(problem, second.tasks(), 0, first.len())
            && second.can_replace(problem, first.tasks(), 0, second.len())
    }

    fn apply(&self, solution: &mut Solution) {
        let problem = Arc::clone(solution.problem_arc());
        let tasks1: Vec<JobIdx> = solution.route(self.first_route).tasks().to_vec();
        let tasks2: Vec<JobIdx> = solution.route(self.second_route).tasks().to_vec();

        let end1 = tasks1.len();
        solution
            .route_mut(self.first_route)
            .replace_segment(&problem, &tasks2, 0, end1);
        let end2 = tasks2.len();
        solution
            .route_mut(self.second_route)
            .replace_segment(&problem, &tasks1, 0, end2);
    }

    fn updated_routes(&self) -> SmallVec<[VehicleIdx; 2]> {
        SmallVec::from_slice(&[self.first_route, self.second_route])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_utils;

    #[test]
    fn test_whole_routes_swap() {
        // Each vehicle serves the cluster next to the other's depot.
        let problem = Arc::new(test_utils::problem_from_grid(10, &[8, 7, 1, 2], &[0, 9]));
        let mut solution = test_utils::solution_with_routes(&problem, &[&[0, 1], &[2, 3]]);

        let op = RouteExchange {
            first_route: VehicleIdx::new(0),
            second_route: VehicleIdx::new(1),
        };

        let before = solution.travel().cost;
        let gain = op.gain(&solution);
        assert!(op.is_valid(&solution));
        op.apply(&mut solution);

        assert_eq!(solution.travel().cost, before + gain);
        assert!(gain < 0);
        assert_eq!(
            solution.route(VehicleIdx::new(0)).tasks(),
            &[JobIdx::new(2), JobIdx::new(3)]
        );
        assert_eq!(
            solution.route(VehicleIdx::new(1)).tasks(),
            &[JobIdx::new(0), JobIdx::new(1)]
        );
        solution.validate().unwrap();
    }
}
