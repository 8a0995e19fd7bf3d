use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    problem::{job::JobIdx, units::Cost, vehicle::VehicleIdx},
    search::{or_opt, r#move::Operator},
    solution::solution::Solution,
};

/// Moves a chain of 2-3 consecutive tasks to another spot in the same route,
/// optionally reversed. Chains with half a shipment are refused.
#[derive(Debug, Clone, Copy)]
pub struct IntraOrOpt {
    pub route: VehicleIdx,
    pub start: usize,
    pub len: usize,
    pub to: usize,
    pub reversed: bool,
}

impl IntraOrOpt {
    /// The equivalent segment replacement in pre-move coordinates.
    fn replacement(&self, solution: &Solution) -> (SmallVec<[JobIdx; 8]>, usize, usize) {
        let tasks = solution.route(self.route).tasks();
        let mut chain: SmallVec<[JobIdx; 8]> =
            SmallVec::from_slice(&tasks[self.start..self.start + self.len]);
        if self.reversed {
            chain.reverse();
        }

        if self.to < self.start {
            let mut seg = chain;
            seg.extend_from_slice(&tasks[self.to..self.start]);
            (seg, self.to, self.start + self.len)
        } else {
            let mut seg: SmallVec<[JobIdx; 8]> =
                SmallVec::from_slice(&tasks[self.start + self.len..self.to]);
            seg.extend(chain);
            (seg, self.start, self.to)
        }
    }
}

impl Operator for IntraOrOpt {
    fn generate<C>(solution: &Solution, (r1, r2): (VehicleIdx, VehicleIdx), mut consumer: C)
    where
        C: FnMut(Self),
    {
        if r1 != r2 {
            return;
        }

        let problem = solution.problem();
        let route = solution.route(r1);

        for len in or_opt::MIN_CHAIN..=or_opt::MAX_CHAIN {
            if route.len() < len + 1 {
                break;
            }
            for start in 0..=route.len() - len {
                if !or_opt::chain_is_movable(solution, route, r1, start, len) {
                    continue;
                }
                let has_pair = route.span_contains_shipment_pair(problem, start, start + len);

                for to in (0..=route.len()).filter(|&to| to < start || to > start + len) {
                    consumer(IntraOrOpt {
                        route: r1,
                        start,
                        len,
                        to,
                        reversed: false,
                    });
                    if !has_pair {
                        consumer(IntraOrOpt {
                            route: r1,
                            start,
                            len,
                            to,
                            reversed: true,
                        });
                    }
                }
            }
        }
    }

    fn gain(&self, solution: &Solution) -> Cost {
        let problem = solution.problem();
        let route = solution.route(self.route);
        let (seg, start, end) = self.replacement(solution);
        route.eval_delta_replace(problem, &seg, start, end).cost
    }

    fn is_valid(&self, solution: &Solution) -> bool {
        let problem = solution.problem();
        let route = solution.route(self.route);

        if !or_opt::chain_is_movable(solution, route, self.route, self.start, self.len) {
            return false;
        }
        if self.reversed
            && route.span_contains_shipment_pair(problem, self.start, self.start + self.len)
        {
            return false;
        }

        let (seg, start, end) = self.replacement(solution);
        route.can_replace(problem, &seg, start, end)
    }

    fn apply(&self, solution: &mut Solution) {
        let problem = Arc::clone(solution.problem_arc());
        let (seg, start, end) = self.replacement(solution);
        solution
            .route_mut(self.route)
            .replace_segment(&problem, &seg, start, end);
    }

    fn updated_routes(&self) -> SmallVec<[VehicleIdx; 2]> {
        SmallVec::from_slice(&[self.route])
    }
}
