use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    problem::{job::JobKind, units::Cost, vehicle::VehicleIdx},
    search::r#move::{fixed_delta, rotate_single, Operator},
    solution::solution::Solution,
};

/// Moves one task to another position, within a route or across two routes.
///
/// ```text
/// BEFORE:  R1: ... (a) -> [t] -> (b) ...     R2: ... (x) -> (y) ...
/// AFTER:   R1: ... (a) -> (b) ...            R2: ... (x) -> [t] -> (y) ...
/// ```
///
/// `to` is an insertion slot in the target route's pre-move coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Relocate {
    pub from_route: VehicleIdx,
    pub to_route: VehicleIdx,
    pub from: usize,
    pub to: usize,
}

impl Operator for Relocate {
    fn generate<C>(solution: &Solution, (r1, r2): (VehicleIdx, VehicleIdx), mut consumer: C)
    where
        C: FnMut(Self),
    {
        let problem = solution.problem();
        let source = solution.route(r1);

        if r1 == r2 {
            for from in 0..source.len() {
                let task = source.task(from);
                let (lo, hi) = match problem.job(task).kind() {
                    JobKind::Single => (0, source.len()),
                    // A pickup may slide anywhere up to its delivery; a
                    // delivery anywhere after its pickup.
                    JobKind::Pickup => {
                        let delivery = problem.partner(task).expect("pickup has a partner");
                        (0, source.position_of(delivery).expect("same route"))
                    }
                    JobKind::Delivery => {
                        let pickup = problem.partner(task).expect("delivery has a partner");
                        (
                            source.position_of(pickup).expect("same route") + 1,
                            source.len(),
                        )
                    }
                };

                for to in lo..=hi {
                    if to == from || to == from + 1 {
                        continue;
                    }
                    consumer(Relocate {
                        from_route: r1,
                        to_route: r1,
                        from,
                        to,
                    });
                }
            }
            return;
        }

        let target = solution.route(r2);
        for from in 0..source.len() {
            let task = source.task(from);
            // Shipment pairs only move together, via pd-shift.
            if problem.job(task).is_shipment_part() {
                continue;
            }
            if !problem.can_serve(r2, task) {
                continue;
            }

            for to in 0..=target.len() {
                consumer(Relocate {
                    from_route: r1,
                    to_route: r2,
                    from,
                    to,
                });
            }
        }
    }

    fn gain(&self, solution: &Solution) -> Cost {
        let problem = solution.problem();
        let source = solution.route(self.from_route);
        let task_loc = Some(source.location_at(problem, self.from));

        let a = source.prev_location(problem, self.from);
        let b = source.slot_location(problem, self.from + 1);

        if self.from_route == self.to_route {
            let x = source.prev_location(problem, self.to);
            let y = source.slot_location(problem, self.to);

            let old = source.edge(problem, a, task_loc).cost
                + source.edge(problem, task_loc, b).cost
                + source.edge(problem, x, y).cost;
            let new = source.edge(problem, a, b).cost
                + source.edge(problem, x, task_loc).cost
                + source.edge(problem, task_loc, y).cost;
            return new - old;
        }

        let target = solution.route(self.to_route);
        let x = target.prev_location(problem, self.to);
        let y = target.slot_location(problem, self.to);

        // A route emptied or first used has no depot loop on that side.
        let source_joined = if source.len() == 1 {
            0
        } else {
            source.edge(problem, a, b).cost
        };
        let target_split = if target.is_empty() {
            0
        } else {
            target.edge(problem, x, y).cost
        };

        let source_delta = source_joined
            - source.edge(problem, a, task_loc).cost
            - source.edge(problem, task_loc, b).cost;
        let target_delta = target.edge(problem, x, task_loc).cost
            + target.edge(problem, task_loc, y).cost
            - target_split;

        source_delta
            + target_delta
            + fixed_delta(problem, source, source.len() - 1)
            + fixed_delta(problem, target, target.len() + 1)
    }

    fn is_valid(&self, solution: &Solution) -> bool {
        let problem = solution.problem();
        let source = solution.route(self.from_route);
        let task = source.task(self.from);

        if self.from_route == self.to_route {
            // The slot range keeping pickup before delivery.
            match problem.job(task).kind() {
                JobKind::Single => {}
                JobKind::Pickup => {
                    let delivery = problem.partner(task).expect("pickup has a partner");
                    let delivery_pos = source.position_of(delivery).expect("same route");
                    if self.to > delivery_pos {
                        return false;
                    }
                }
                JobKind::Delivery => {
                    let pickup = problem.partner(task).expect("delivery has a partner");
                    let pickup_pos = source.position_of(pickup).expect("same route");
                    if self.to <= pickup_pos {
                        return false;
                    }
                }
            }

            let (seg, start, end) = rotate_single(source.tasks(), self.from, self.to);
            return source.can_replace(problem, &seg, start, end);
        }

        let target = solution.route(self.to_route);

        !problem.job(task).is_shipment_part()
            && problem.can_serve(self.to_route, task)
            && target.can_replace(problem, &[task], self.to, self.to)
            && source.can_replace(problem, &[], self.from, self.from + 1)
    }

    fn apply(&self, solution: &mut Solution) {
        let problem = Arc::clone(solution.problem_arc());

        if self.from_route == self.to_route {
            let route = solution.route_mut(self.from_route);
            let (seg, start, end) = rotate_single(route.tasks(), self.from, self.to);
            route.replace_segment(&problem, &seg, start, end);
            return;
        }

        let task = solution.route(self.from_route).task(self.from);
        solution
            .route_mut(self.from_route)
            .replace_segment(&problem, &[], self.from, self.from + 1);
        solution
            .route_mut(self.to_route)
            .replace_segment(&problem, &[task], self.to, self.to);
    }

    fn updated_routes(&self) -> SmallVec<[VehicleIdx; 2]> {
        if self.from_route == self.to_route {
            SmallVec::from_slice(&[self.from_route])
        } else {
            SmallVec::from_slice(&[self.from_route, self.to_route])
        }
    }
}
