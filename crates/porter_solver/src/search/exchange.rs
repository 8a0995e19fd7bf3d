use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    problem::{job::JobKind, units::Cost, vehicle::VehicleIdx},
    search::r#move::Operator,
    solution::solution::Solution,
};

/// Swaps two tasks, either within one route (`first` < `second`) or across
/// two routes.
///
/// ```text
/// BEFORE:  ... (a) -> [s] -> (b) ...  ... (c) -> [t] -> (d) ...
/// AFTER:   ... (a) -> [t] -> (b) ...  ... (c) -> [s] -> (d) ...
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Exchange {
    pub first_route: VehicleIdx,
    pub second_route: VehicleIdx,
    pub first: usize,
    pub second: usize,
}

impl Operator for Exchange {
    fn generate<C>(solution: &Solution, (r1, r2): (VehicleIdx, VehicleIdx), mut consumer: C)
    where
        C: FnMut(Self),
    {
        let problem = solution.problem();

        if r1 == r2 {
            let route = solution.route(r1);
            for first in 0..route.len() {
                for second in first + 1..route.len() {
                    if !intra_swap_keeps_order(solution, r1, first, second) {
                        continue;
                    }
                    consumer(Exchange {
                        first_route: r1,
                        second_route: r1,
                        first,
                        second,
                    });
                }
            }
            return;
        }

        let source = solution.route(r1);
        let target = solution.route(r2);
        for first in 0..source.len() {
            let s = source.task(first);
            if problem.job(s).is_shipment_part() || !problem.can_serve(r2, s) {
                continue;
            }
            for second in 0..target.len() {
                let t = target.task(second);
                if problem.job(t).is_shipment_part() || !problem.can_serve(r1, t) {
                    continue;
                }
                consumer(Exchange {
                    first_route: r1,
                    second_route: r2,
                    first,
                    second,
                });
            }
        }
    }

    fn gain(&self, solution: &Solution) -> Cost {
        let problem = solution.problem();

        if self.first_route == self.second_route {
            let route = solution.route(self.first_route);
            let (i, j) = (self.first, self.second);
            let s = Some(route.location_at(problem, i));
            let t = Some(route.location_at(problem, j));
            let a = route.prev_location(problem, i);
            let d = route.slot_location(problem, j + 1);

            if j == i + 1 {
                let old = route.edge(problem, a, s).cost
                    + route.edge(problem, s, t).cost
                    + route.edge(problem, t, d).cost;
                let new = route.edge(problem, a, t).cost
                    + route.edge(problem, t, s).cost
                    + route.edge(problem, s, d).cost;
                return new - old;
            }

            let b = route.slot_location(problem, i + 1);
            let c = route.prev_location(problem, j);
            let old = route.edge(problem, a, s).cost
                + route.edge(problem, s, b).cost
                + route.edge(problem, c, t).cost
                + route.edge(problem, t, d).cost;
            let new = route.edge(problem, a, t).cost
                + route.edge(problem, t, b).cost
                + route.edge(problem, c, s).cost
                + route.edge(problem, s, d).cost;
            return new - old;
        }

        let source = solution.route(self.first_route);
        let target = solution.route(self.second_route);
        let s = Some(source.location_at(problem, self.first));
        let t = Some(target.location_at(problem, self.second));

        let a = source.prev_location(problem, self.first);
        let b = source.slot_location(problem, self.first + 1);
        let c = target.prev_location(problem, self.second);
        let d = target.slot_location(problem, self.second + 1);

        let source_delta = source.edge(problem, a, t).cost + source.edge(problem, t, b).cost
            - source.edge(problem, a, s).cost
            - source.edge(problem, s, b).cost;
        let target_delta = target.edge(problem, c, s).cost + target.edge(problem, s, d).cost
            - target.edge(problem, c, t).cost
            - target.edge(problem, t, d).cost;

        source_delta + target_delta
    }

    fn is_valid(&self, solution: &Solution) -> bool {
        let problem = solution.problem();

        if self.first_route == self.second_route {
            if !intra_swap_keeps_order(solution, self.first_route, self.first, self.second) {
                return false;
            }
            let route = solution.route(self.first_route);
            let mut seg: SmallVec<[_; 8]> =
                SmallVec::from_slice(&route.tasks()[self.first..=self.second]);
            let last = seg.len() - 1;
            seg.swap(0, last);
            return route.can_replace(problem, &seg, self.first, self.second + 1);
        }

        let source = solution.route(self.first_route);
        let target = solution.route(self.second_route);
        let s = source.task(self.first);
        let t = target.task(self.second);

        !problem.job(s).is_shipment_part()
            && !problem.job(t).is_shipment_part()
            && problem.can_serve(self.first_route, t)
            && problem.can_serve(self.second_route, s)
            && source.can_replace(problem, &[t], self.first, self.first + 1)
            && target.can_replace(problem, &[s], self.second, self.second + 1)
    }

    fn apply(&self, solution: &mut Solution) {
        let problem = Arc::clone(solution.problem_arc());

        if self.first_route == self.second_route {
            let route = solution.route_mut(self.first_route);
            let mut seg: SmallVec<[_; 8]> =
                SmallVec::from_slice(&route.tasks()[self.first..=self.second]);
            let last = seg.len() - 1;
            seg.swap(0, last);
            route.replace_segment(&problem, &seg, self.first, self.second + 1);
            return;
        }

        let s = solution.route(self.first_route).task(self.first);
        let t = solution.route(self.second_route).task(self.second);
        solution
            .route_mut(self.first_route)
            .replace_segment(&problem, &[t], self.first, self.first + 1);
        solution
            .route_mut(self.second_route)
            .replace_segment(&problem, &[s], self.second, self.second + 1);
    }

    fn updated_routes(&self) -> SmallVec<[VehicleIdx; 2]> {
        if self.first_route == self.second_route {
            SmallVec::from_slice(&[self.first_route])
        } else {
            SmallVec::from_slice(&[self.first_route, self.second_route])
        }
    }
}

/// Swapping positions `i < j` must not put a delivery in front of its
/// pickup.
fn intra_swap_keeps_order(solution: &Solution, route: VehicleIdx, i: usize, j: usize) -> bool {
    let problem = solution.problem();
    let route = solution.route(route);

    let ti = route.task(i);
    if problem.job(ti).kind() == JobKind::Pickup {
        let delivery = problem.partner(ti).expect("pickup has a partner");
        let delivery_pos = route.position_of(delivery).expect("same route");
        if delivery_pos <= j {
            return false;
        }
    }

    let tj = route.task(j);
    if problem.job(tj).kind() == JobKind::Delivery {
        let pickup = problem.partner(tj).expect("delivery has a partner");
        let pickup_pos = route.position_of(pickup).expect("same route");
        if pickup_pos >= i {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{problem::job::JobIdx, test_utils};

    #[test]
    fn test_intra_swap() {
        let problem = Arc::new(test_utils::problem_from_grid(8, &[1, 3, 2, 4], &[0]));
        let mut solution = test_utils::solution_with_routes(&problem, &[&[0, 1, 2, 3]]);

        // Grids run 1, 3, 2, 4; swapping positions 1 and 2 sorts them.
        let op = Exchange {
            first_route: VehicleIdx::new(0),
            second_route: VehicleIdx::new(0),
            first: 1,
            second: 2,
        };

        let before = solution.route(VehicleIdx::new(0)).total().cost;
        let gain = op.gain(&solution);
        assert!(op.is_valid(&solution));
        op.apply(&mut solution);

        assert_eq!(solution.route(VehicleIdx::new(0)).total().cost, before + gain);
        assert_eq!(
            solution.route(VehicleIdx::new(0)).tasks(),
            &[JobIdx::new(0), JobIdx::new(2), JobIdx::new(1), JobIdx::new(3)]
        );
        assert!(gain < 0);
    }

    #[test]
    fn test_intra_swap_distant() {
        let problem = Arc::new(test_utils::problem_from_grid(8, &[4, 2, 3, 1], &[0]));
        let mut solution = test_utils::solution_with_routes(&problem, &[&[0, 1, 2, 3]]);

        let op = Exchange {
            first_route: VehicleIdx::new(0),
            second_route: VehicleIdx::new(0),
            first: 0,
            second: 3,
        };

        let before = solution.route(VehicleIdx::new(0)).total().cost;
        let gain = op.gain(&solution);
        op.apply(&mut solution);

        assert_eq!(solution.route(VehicleIdx::new(0)).total().cost, before + gain);
        assert_eq!(
            solution.route(VehicleIdx::new(0)).tasks(),
            &[JobIdx::new(3), JobIdx::new(1), JobIdx::new(2), JobIdx::new(0)]
        );
    }

    #[test]
    fn test_inter_swap() {
        let problem = Arc::new(test_utils::problem_from_grid(10, &[1, 8, 7, 2], &[0, 9]));
        let mut solution = test_utils::solution_with_routes(&problem, &[&[0, 1], &[2, 3]]);

        // Jobs 1 (grid 8) and 3 (grid 2) are on the wrong vehicles.
        let op = Exchange {
            first_route: VehicleIdx::new(0),
            second_route: VehicleIdx::new(1),
            first: 1,
            second: 1,
        };

        let before = solution.travel().cost;
        let gain = op.gain(&solution);
        assert!(op.is_valid(&solution));
        op.apply(&mut solution);

        assert_eq!(solution.travel().cost, before + gain);
        assert!(gain < 0);
        assert_eq!(
            solution.route(VehicleIdx::new(0)).tasks(),
            &[JobIdx::new(0), JobIdx::new(3)]
        );
        assert_eq!(
            solution.route(VehicleIdx::new(1)).tasks(),
            &[JobIdx::new(2), JobIdx::new(1)]
        );
        solution.validate().unwrap();
    }
}
