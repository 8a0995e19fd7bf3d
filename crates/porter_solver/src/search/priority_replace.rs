use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    config::EngineConfig,
    problem::{job::JobKind, job::JobIdx, units::Cost, vehicle::VehicleIdx},
    search::r#move::Operator,
    solution::solution::Solution,
};

/// Replaces a served job by an unassigned one of strictly higher priority,
/// in the same slot. The priority-weight term makes any such swap dominate
/// whatever travel it costs.
#[derive(Debug, Clone, Copy)]
pub struct PriorityReplace {
    pub route: VehicleIdx,
    pub position: usize,
    pub incoming: JobIdx,
}

impl Operator for PriorityReplace {
    fn generate<C>(solution: &Solution, (r1, r2): (VehicleIdx, VehicleIdx), mut consumer: C)
    where
        C: FnMut(Self),
    {
        if r1 != r2 || solution.unassigned().is_empty() {
            return;
        }

        let problem = solution.problem();
        let route = solution.route(r1);

        for position in 0..route.len() {
            let outgoing = problem.job(route.task(position));
            if outgoing.kind() != JobKind::Single {
                continue;
            }

            for &incoming in solution.unassigned() {
                let candidate = problem.job(incoming);
                if candidate.kind() != JobKind::Single {
                    continue;
                }
                if candidate.priority() <= outgoing.priority() {
                    continue;
                }
                if !problem.can_serve(r1, incoming) {
                    continue;
                }

                consumer(PriorityReplace {
                    route: r1,
                    position,
                    incoming,
                });
            }
        }
    }

    fn gain(&self, solution: &Solution) -> Cost {
        let problem = solution.problem();
        let route = solution.route(self.route);
        let weight = EngineConfig::global().priority_weight;

        let outgoing = problem.job(route.task(self.position));
        let incoming = problem.job(self.incoming);

        let out_loc = Some(outgoing.location());
        let in_loc = Some(incoming.location());
        let prev = route.prev_location(problem, self.position);
        let next = route.slot_location(problem, self.position + 1);

        let travel = route.edge(problem, prev, in_loc).cost
            + route.edge(problem, in_loc, next).cost
            - route.edge(problem, prev, out_loc).cost
            - route.edge(problem, out_loc, next).cost;

        // The outgoing job joins the unassigned set, the incoming one
        // leaves it.
        let penalty =
            (outgoing.priority() as Cost - incoming.priority() as Cost) * weight;

        travel + penalty
    }

    fn is_valid(&self, solution: &Solution) -> bool {
        let problem = solution.problem();
        let route = solution.route(self.route);

        if !solution.is_unassigned(self.incoming) {
            return false;
        }
        if !problem.can_serve(self.route, self.incoming) {
            return false;
        }
        if problem.job(route.task(self.position)).kind() != JobKind::Single {
            return false;
        }

        route.can_replace(problem, &[self.incoming], self.position, self.position + 1)
    }

    fn apply(&self, solution: &mut Solution) {
        let problem = Arc::clone(solution.problem_arc());
        let outgoing = solution.route(self.route).task(self.position);

        solution.route_mut(self.route).replace_segment(
            &problem,
            &[self.incoming],
            self.position,
            self.position + 1,
        );
        solution.mark_unassigned(outgoing);
        solution.mark_assigned(self.incoming);
    }

    fn updated_routes(&self) -> SmallVec<[VehicleIdx; 2]> {
        SmallVec::from_slice(&[self.route])
    }
}
