use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    problem::{job::JobIdx, units::Cost, vehicle::VehicleIdx},
    search::r#move::Operator,
    solution::solution::Solution,
};

/// Reverses the sub-sequence `[first, last]` of one route. Spans holding a
/// complete shipment are refused; a lone half keeps its relative order with
/// the partner outside the span.
#[derive(Debug, Clone, Copy)]
pub struct IntraTwoOpt {
    pub route: VehicleIdx,
    pub first: usize,
    pub last: usize,
}

impl IntraTwoOpt {
    fn segment(&self, solution: &Solution) -> SmallVec<[JobIdx; 8]> {
        let tasks = solution.route(self.route).tasks();
        let mut seg: SmallVec<[JobIdx; 8]> = SmallVec::from_slice(&tasks[self.first..=self.last]);
        seg.reverse();
        seg
    }
}

impl Operator for IntraTwoOpt {
    fn generate<C>(solution: &Solution, (r1, r2): (VehicleIdx, VehicleIdx), mut consumer: C)
    where
        C: FnMut(Self),
    {
        if r1 != r2 {
            return;
        }

        let problem = solution.problem();
        let route = solution.route(r1);

        for first in 0..route.len() {
            for last in first + 1..route.len() {
                if route.span_contains_shipment_pair(problem, first, last + 1) {
                    // Longer spans only contain more; stop extending.
                    break;
                }
                consumer(IntraTwoOpt {
                    route: r1,
                    first,
                    last,
                });
            }
        }
    }

    fn gain(&self, solution: &Solution) -> Cost {
        let problem = solution.problem();
        let route = solution.route(self.route);
        let seg = self.segment(solution);
        route
            .eval_delta_replace(problem, &seg, self.first, self.last + 1)
            .cost
    }

    fn is_valid(&self, solution: &Solution) -> bool {
        let problem = solution.problem();
        let route = solution.route(self.route);

        if route.span_contains_shipment_pair(problem, self.first, self.last + 1) {
            return false;
        }

        let seg = self.segment(solution);
        route.can_replace(problem, &seg, self.first, self.last + 1)
    }

    fn apply(&self, solution: &mut Solution) {
        let problem = Arc::clone(solution.problem_arc());
        let seg = self.segment(solution);
        solution
            .route_mut(self.route)
            .replace_segment(&problem, &seg, self.first, self.last + 1);
    }

    fn updated_routes(&self) -> SmallVec<[VehicleIdx; 2]> {
        SmallVec::from_slice(&[self.route])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_utils;

    #[test]
    fn test_reversal_untangles_route() {
        let problem = Arc::new(test_utils::problem_from_grid(8, &[1, 4, 3, 2, 5], &[0]));
        let mut solution = test_utils::solution_with_routes(&problem, &[&[0, 1, 2, 3, 4]]);

        // Grids 4, 3, 2 in the middle want reversing.
        let op = IntraTwoOpt {
            route: VehicleIdx::new(0),
            first: 1,
            last: 3,
        };

        let before = solution.route(VehicleIdx::new(0)).total().cost;
        let gain = op.gain(&solution);
        assert!(op.is_valid(&solution));
        op.apply(&mut solution);

        assert_eq!(solution.route(VehicleIdx::new(0)).total().cost, before + gain);
        assert!(gain < 0);
        assert_eq!(
            solution.route(VehicleIdx::new(0)).tasks(),
            &[
                JobIdx::new(0),
                JobIdx::new(3),
                JobIdx::new(2),
                JobIdx::new(1),
                JobIdx::new(4)
            ]
        );
        solution.validate().unwrap();
    }

    #[test]
    fn test_double_reversal_is_identity() {
        let problem = Arc::new(test_utils::problem_from_grid(8, &[1, 4, 3, 2], &[0]));
        let mut solution = test_utils::solution_with_routes(&problem, &[&[0, 1, 2, 3]]);

        let original = solution.route(VehicleIdx::new(0)).tasks().to_vec();
        let arrivals = solution.route(VehicleIdx::new(0)).schedule().arrival.clone();

        let op = IntraTwoOpt {
            route: VehicleIdx::new(0),
            first: 0,
            last: 3,
        };
        op.apply(&mut solution);
        op.apply(&mut solution);

        assert_eq!(solution.route(VehicleIdx::new(0)).tasks(), &original[..]);
        assert_eq!(
            solution.route(VehicleIdx::new(0)).schedule().arrival,
            arrivals
        );
    }
}
