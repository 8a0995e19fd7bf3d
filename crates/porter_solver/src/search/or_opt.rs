use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    problem::{job::JobIdx, units::Cost, vehicle::VehicleIdx},
    search::r#move::{fixed_delta, Operator},
    solution::{route::Route, solution::Solution},
};

pub const MIN_CHAIN: usize = 2;
pub const MAX_CHAIN: usize = 3;

/// Moves a chain of 2-3 consecutive tasks to another route, optionally
/// reversing it on insertion.
///
/// Chains never carry half a shipment: either both halves ride along or the
/// chain is refused, and a chain holding a full pair cannot be reversed.
#[derive(Debug, Clone, Copy)]
pub struct OrOpt {
    pub from_route: VehicleIdx,
    pub to_route: VehicleIdx,
    pub start: usize,
    pub len: usize,
    pub to: usize,
    pub reversed: bool,
}

impl OrOpt {
    fn segment(&self, solution: &Solution) -> SmallVec<[JobIdx; 8]> {
        let source = solution.route(self.from_route);
        let mut seg: SmallVec<[JobIdx; 8]> =
            SmallVec::from_slice(&source.tasks()[self.start..self.start + self.len]);
        if self.reversed {
            seg.reverse();
        }
        seg
    }
}

/// Every chain task must keep its shipment partner inside the chain (or have
/// none); all of them must be serveable by the target vehicle.
pub(crate) fn chain_is_movable(
    solution: &Solution,
    source: &Route,
    target: VehicleIdx,
    start: usize,
    len: usize,
) -> bool {
    let problem = solution.problem();

    source.tasks()[start..start + len].iter().all(|&task| {
        if !problem.can_serve(target, task) {
            return false;
        }
        match problem.partner(task) {
            None => true,
            Some(partner) => source
                .position_of(partner)
                .is_some_and(|pos| start <= pos && pos < start + len),
        }
    })
}

impl Operator for OrOpt {
    fn generate<C>(solution: &Solution, (r1, r2): (VehicleIdx, VehicleIdx), mut consumer: C)
    where
        C: FnMut(Self),
    {
        if r1 == r2 {
            return;
        }

        let problem = solution.problem();
        let source = solution.route(r1);
        let target = solution.route(r2);

        for len in MIN_CHAIN..=MAX_CHAIN {
            if source.len() < len {
                break;
            }
            for start in 0..=source.len() - len {
                if !chain_is_movable(solution, source, r2, start, len) {
                    continue;
                }
                let has_pair = source.span_contains_shipment_pair(problem, start, start + len);

                for to in 0..=target.len() {
                    consumer(OrOpt {
                        from_route: r1,
                        to_route: r2,
                        start,
                        len,
                        to,
                        reversed: false,
                    });
                    if !has_pair {
                        consumer(OrOpt {
                            from_route: r1,
                            to_route: r2,
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
        let source = solution.route(self.from_route);
        let target = solution.route(self.to_route);
        let seg = self.segment(solution);

        let source_delta = source
            .eval_delta_replace(problem, &[], self.start, self.start + self.len)
            .cost;
        let target_delta = target.eval_delta_replace(problem, &seg, self.to, self.to).cost;

        source_delta
            + target_delta
            + fixed_delta(problem, source, source.len() - self.len)
            + fixed_delta(problem, target, target.len() + self.len)
    }

    fn is_valid(&self, solution: &Solution) -> bool {
        let problem = solution.problem();
        let source = solution.route(self.from_route);
        let target = solution.route(self.to_route);

        if !chain_is_movable(solution, source, self.to_route, self.start, self.len) {
            return false;
        }
        if self.reversed
            && source.span_contains_shipment_pair(problem, self.start, self.start + self.len)
        {
            return false;
        }

        let seg = self.segment(solution);
        target.can_replace(problem, &seg, self.to, self.to)
            && source.can_replace(problem, &[], self.start, self.start + self.len)
    }

    fn apply(&self, solution: &mut Solution) {
        let problem = Arc::clone(solution.problem_arc());
        let seg = self.segment(solution);

        solution.route_mut(self.from_route).replace_segment(
            &problem,
            &[],
            self.start,
            self.start + self.len,
        );
        solution
            .route_mut(self.to_route)
            .replace_segment(&problem, &seg, self.to, self.to);
    }

    fn updated_routes(&self) -> SmallVec<[VehicleIdx; 2]> {
        SmallVec::from_slice(&[self.from_route, self.to_route])
    }
}
