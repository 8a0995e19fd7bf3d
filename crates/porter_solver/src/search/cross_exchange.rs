use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    problem::{job::JobIdx, units::Cost, vehicle::VehicleIdx},
    search::{or_opt::chain_is_movable, r#move::Operator},
    solution::solution::Solution,
};

const CHAIN: usize = 2;

/// Swaps one chain of two consecutive tasks between two routes, each chain
/// optionally reversed on arrival.
///
/// ```text
/// BEFORE:  R1: ... (a) -> [s1 s2] -> (b) ...   R2: ... (c) -> [t1 t2] -> (d) ...
/// AFTER:   R1: ... (a) -> [t1 t2] -> (b) ...   R2: ... (c) -> [s1 s2] -> (d) ...
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CrossExchange {
    pub first_route: VehicleIdx,
    pub second_route: VehicleIdx,
    pub first: usize,
    pub second: usize,
    pub reverse_first: bool,
    pub reverse_second: bool,
}

impl CrossExchange {
    fn chains(
        &self,
        solution: &Solution,
    ) -> (SmallVec<[JobIdx; 4]>, SmallVec<[JobIdx; 4]>) {
        let first = solution.route(self.first_route);
        let second = solution.route(self.second_route);

        let mut chain1: SmallVec<[JobIdx; 4]> =
            SmallVec::from_slice(&first.tasks()[self.first..self.first + CHAIN]);
        let mut chain2: SmallVec<[JobIdx; 4]> =
            SmallVec::from_slice(&second.tasks()[self.second..self.second + CHAIN]);

        if self.reverse_first {
            chain1.reverse();
        }
        if self.reverse_second {
            chain2.reverse();
        }

        (chain1, chain2)
    }
}

impl Operator for CrossExchange {
    fn generate<C>(solution: &Solution, (r1, r2): (VehicleIdx, VehicleIdx), mut consumer: C)
    where
        C: FnMut(Self),
    {
        if r1 >= r2 {
            return;
        }

        let problem = solution.problem();
        let first = solution.route(r1);
        let second = solution.route(r2);
        if first.len() < CHAIN || second.len() < CHAIN {
            return;
        }

        for i in 0..=first.len() - CHAIN {
            if !chain_is_movable(solution, first, r2, i, CHAIN) {
                continue;
            }
            let pair1 = first.span_contains_shipment_pair(problem, i, i + CHAIN);

            for j in 0..=second.len() - CHAIN {
                if !chain_is_movable(solution, second, r1, j, CHAIN) {
                    continue;
                }
                let pair2 = second.span_contains_shipment_pair(problem, j, j + CHAIN);

                for reverse_first in [false, true] {
                    if reverse_first && pair1 {
                        continue;
                    }
                    for reverse_second in [false, true] {
                        if reverse_second && pair2 {
                            continue;
                        }
                        consumer(CrossExchange {
                            first_route: r1,
                            second_route: r2,
                            first: i,
                            second: j,
                            reverse_first,
                            reverse_second,
                        });
                    }
                }
            }
        }
    }

    fn gain(&self, solution: &Solution) -> Cost {
        let problem = solution.problem();
        let first = solution.route(self.first_route);
        let second = solution.route(self.second_route);
        let (chain1, chain2) = self.chains(solution);

        first
            .eval_delta_replace(problem, &chain2, self.first, self.first + CHAIN)
            .cost
            + second
                .eval_delta_replace(problem, &chain1, self.second, self.second + CHAIN)
                .cost
    }

    fn is_valid(&self, solution: &Solution) -> bool {
        let problem = solution.problem();
        let first = solution.route(self.first_route);
        let second = solution.route(self.second_route);

        if !chain_is_movable(solution, first, self.second_route, self.first, CHAIN)
            || !chain_is_movable(solution, second, self.first_route, self.second, CHAIN)
        {
            return false;
        }
        if self.reverse_first
            && first.span_contains_shipment_pair(problem, self.first, self.first + CHAIN)
        {
            return false;
        }
        if self.reverse_second
            && second.span_contains_shipment_pair(problem, self.second, self.second + CHAIN)
        {
            return false;
        }

        let (chain1, chain2) = self.chains(solution);
        first.can_replace(problem, &chain2, self.first, self.first + CHAIN)
            && second.can_replace(problem, &chain1, self.second, self.second + CHAIN)
    }

    fn apply(&self, solution: &mut Solution) {
        let problem = Arc::clone(solution.problem_arc());
        let (chain1, chain2) = self.chains(solution);

        solution.route_mut(self.first_route).replace_segment(
            &problem,
            &chain2,
            self.first,
            self.first + CHAIN,
        );
        solution.route_mut(self.second_route).replace_segment(
            &problem,
            &chain1,
            self.second,
            self.second + CHAIN,
        );
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
    fn test_chain_swap() {
        // Chains (7, 8) and (1, 2) sit on the wrong vehicles.
        let problem = Arc::new(test_utils::problem_from_grid(
            10,
            &[7, 8, 1, 2, 5],
            &[0, 9],
        ));
        let mut solution =
            test_utils::solution_with_routes(&problem, &[&[0, 1], &[2, 3, 4]]);

        let op = CrossExchange {
            first_route: VehicleIdx::new(0),
            second_route: VehicleIdx::new(1),
            first: 0,
            second: 0,
            reverse_first: false,
            reverse_second: false,
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
            &[JobIdx::new(0), JobIdx::new(1), JobIdx::new(4)]
        );
        solution.validate().unwrap();
    }

    #[test]
    fn test_reversed_chain_swap_is_exact() {
        let problem = Arc::new(test_utils::problem_from_grid(
            10,
            &[8, 7, 2, 1],
            &[0, 9],
        ));
        let mut solution = test_utils::solution_with_routes(&problem, &[&[0, 1], &[2, 3]]);

        // Both chains arrive reversed: route 0 gets (1, 2), route 1 (7, 8).
        let op = CrossExchange {
            first_route: VehicleIdx::new(0),
            second_route: VehicleIdx::new(1),
            first: 0,
            second: 0,
            reverse_first: true,
            reverse_second: true,
        };

        let before = solution.travel().cost;
        let gain = op.gain(&solution);
        assert!(op.is_valid(&solution));
        op.apply(&mut solution);

        assert_eq!(solution.travel().cost, before + gain);
        assert!(gain < 0);
        assert_eq!(
            solution.route(VehicleIdx::new(0)).tasks(),
            &[JobIdx::new(3), JobIdx::new(2)]
        );
        assert_eq!(
            solution.route(VehicleIdx::new(1)).tasks(),
            &[JobIdx::new(1), JobIdx::new(0)]
        );
        solution.validate().unwrap();
    }
}
