use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    problem::{job::JobIdx, units::Cost, vehicle::VehicleIdx},
    search::r#move::{fixed_delta, Operator},
    solution::{route::Route, solution::Solution},
};

/// Positions where a route may be cut without separating a shipment pair.
pub(crate) fn shipment_safe_cuts(solution: &Solution, route: &Route) -> Vec<bool> {
    let problem = solution.problem();
    let mut safe = vec![true; route.len() + 1];
    let mut open = 0_usize;

    for (pos, &task) in route.tasks().iter().enumerate() {
        if let Some(partner) = problem.partner(task) {
            let partner_pos = route.position_of(partner).expect("pair on one route");
            if partner_pos > pos {
                open += 1;
            } else {
                open -= 1;
            }
        }
        safe[pos + 1] = open == 0;
    }

    safe
}

fn tail_serveable(solution: &Solution, tail: &[JobIdx], vehicle: VehicleIdx) -> bool {
    tail.iter()
        .all(|&task| solution.problem().can_serve(vehicle, task))
}

/// Swaps the route tails after a cut in each of two routes.
///
/// ```text
/// BEFORE:  R1: a0 .. a(i-1) | a(i) .. a(n)      R2: b0 .. b(j-1) | b(j) .. b(m)
/// AFTER:   R1: a0 .. a(i-1) | b(j) .. b(m)      R2: b0 .. b(j-1) | a(i) .. a(n)
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TwoOpt {
    pub first_route: VehicleIdx,
    pub second_route: VehicleIdx,
    pub first_cut: usize,
    pub second_cut: usize,
}

impl Operator for TwoOpt {
    fn generate<C>(solution: &Solution, (r1, r2): (VehicleIdx, VehicleIdx), mut consumer: C)
    where
        C: FnMut(Self),
    {
        if r1 >= r2 {
            return;
        }

        let first = solution.route(r1);
        let second = solution.route(r2);
        let safe1 = shipment_safe_cuts(solution, first);
        let safe2 = shipment_safe_cuts(solution, second);

        for first_cut in 0..=first.len() {
            if !safe1[first_cut] {
                continue;
            }
            for second_cut in 0..=second.len() {
                if !safe2[second_cut] {
                    continue;
                }
                if first_cut == first.len() && second_cut == second.len() {
                    continue;
                }
                consumer(TwoOpt {
                    first_route: r1,
                    second_route: r2,
                    first_cut,
                    second_cut,
                });
            }
        }
    }

    fn gain(&self, solution: &Solution) -> Cost {
        let problem = solution.problem();
        let first = solution.route(self.first_route);
        let second = solution.route(self.second_route);

        let tail1 = &first.tasks()[self.first_cut..];
        let tail2 = &second.tasks()[self.second_cut..];

        first
            .eval_delta_replace(problem, tail2, self.first_cut, first.len())
            .cost
            + second
                .eval_delta_replace(problem, tail1, self.second_cut, second.len())
                .cost
            + fixed_delta(problem, first, self.first_cut + tail2.len())
            + fixed_delta(problem, second, self.second_cut + tail1.len())
    }

    fn is_valid(&self, solution: &Solution) -> bool {
        let problem = solution.problem();
        let first = solution.route(self.first_route);
        let second = solution.route(self.second_route);

        if first.splits_shipment(problem, self.first_cut)
            || second.splits_shipment(problem, self.second_cut)
        {
            return false;
        }

        let tail1 = &first.tasks()[self.first_cut..];
        let tail2 = &second.tasks()[self.second_cut..];

        tail_serveable(solution, tail1, self.second_route)
            && tail_serveable(solution, tail2, self.first_route)
            && first.can_replace(problem, tail2, self.first_cut, first.len())
            && second.can_replace(problem, tail1, self.second_cut, second.len())
    }

    fn apply(&self, solution: &mut Solution) {
        let problem = Arc::clone(solution.problem_arc());
        let tail1: Vec<JobIdx> = solution.route(self.first_route).tasks()[self.first_cut..].to_vec();
        let tail2: Vec<JobIdx> =
            solution.route(self.second_route).tasks()[self.second_cut..].to_vec();

        let end1 = solution.route(self.first_route).len();
        solution
            .route_mut(self.first_route)
            .replace_segment(&problem, &tail2, self.first_cut, end1);
        let end2 = solution.route(self.second_route).len();
        solution
            .route_mut(self.second_route)
            .replace_segment(&problem, &tail1, self.second_cut, end2);
    }

    fn updated_routes(&self) -> SmallVec<[VehicleIdx; 2]> {
        SmallVec::from_slice(&[self.first_route, self.second_route])
    }
}

/// Tail swap with both tails traversed in the opposite direction. Tails
/// holding a complete shipment are refused on top of the cut rule.
#[derive(Debug, Clone, Copy)]
pub struct ReverseTwoOpt {
    pub first_route: VehicleIdx,
    pub second_route: VehicleIdx,
    pub first_cut: usize,
    pub second_cut: usize,
}

impl ReverseTwoOpt {
    fn reversed_tail(route: &Route, cut: usize) -> Vec<JobIdx> {
        let mut tail: Vec<JobIdx> = route.tasks()[cut..].to_vec();
        tail.reverse();
        tail
    }
}

impl Operator for ReverseTwoOpt {
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
        let safe1 = shipment_safe_cuts(solution, first);
        let safe2 = shipment_safe_cuts(solution, second);

        for first_cut in 0..=first.len() {
            if !safe1[first_cut]
                || first.span_contains_shipment_pair(problem, first_cut, first.len())
            {
                continue;
            }
            for second_cut in 0..=second.len() {
                if !safe2[second_cut]
                    || second.span_contains_shipment_pair(problem, second_cut, second.len())
                {
                    continue;
                }
                if first_cut == first.len() && second_cut == second.len() {
                    continue;
                }
                consumer(ReverseTwoOpt {
                    first_route: r1,
                    second_route: r2,
                    first_cut,
                    second_cut,
                });
            }
        }
    }

    fn gain(&self, solution: &Solution) -> Cost {
        let problem = solution.problem();
        let first = solution.route(self.first_route);
        let second = solution.route(self.second_route);

        let tail1 = Self::reversed_tail(first, self.first_cut);
        let tail2 = Self::reversed_tail(second, self.second_cut);

        first
            .eval_delta_replace(problem, &tail2, self.first_cut, first.len())
            .cost
            + second
                .eval_delta_replace(problem, &tail1, self.second_cut, second.len())
                .cost
            + fixed_delta(problem, first, self.first_cut + tail2.len())
            + fixed_delta(problem, second, self.second_cut + tail1.len())
    }

    fn is_valid(&self, solution: &Solution) -> bool {
        let problem = solution.problem();
        let first = solution.route(self.first_route);
        let second = solution.route(self.second_route);

        if first.splits_shipment(problem, self.first_cut)
            || second.splits_shipment(problem, self.second_cut)
            || first.span_contains_shipment_pair(problem, self.first_cut, first.len())
            || second.span_contains_shipment_pair(problem, self.second_cut, second.len())
        {
            return false;
        }

        let tail1 = Self::reversed_tail(first, self.first_cut);
        let tail2 = Self::reversed_tail(second, self.second_cut);

        tail_serveable(solution, &tail1, self.second_route)
            && tail_serveable(solution, &tail2, self.first_route)
            && first.can_replace(problem, &tail2, self.first_cut, first.len())
            && second.can_replace(problem, &tail1, self.second_cut, second.len())
    }

    fn apply(&self, solution: &mut Solution) {
        let problem = Arc::clone(solution.problem_arc());
        let tail1 = Self::reversed_tail(solution.route(self.first_route), self.first_cut);
        let tail2 = Self::reversed_tail(solution.route(self.second_route), self.second_cut);

        let end1 = solution.route(self.first_route).len();
        solution
            .route_mut(self.first_route)
            .replace_segment(&problem, &tail2, self.first_cut, end1);
        let end2 = solution.route(self.second_route).len();
        solution
            .route_mut(self.second_route)
            .replace_segment(&problem, &tail1, self.second_cut, end2);
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
    fn test_tail_swap() {
        // Vehicle 0 at grid 0, vehicle 1 at grid 9; jobs interleaved so the
        // tails are crossed.
        let problem = Arc::new(test_utils::problem_from_grid(10, &[1, 8, 2, 7], &[0, 9]));
        let mut solution = test_utils::solution_with_routes(&problem, &[&[0, 1], &[2, 3]]);

        // Swap tails after position 1 in both: route 0 gets job 3 (grid 7),
        // route 1 gets job 1 (grid 8).
        let op = TwoOpt {
            first_route: VehicleIdx::new(0),
            second_route: VehicleIdx::new(1),
            first_cut: 1,
            second_cut: 1,
        };

        let before = solution.travel().cost;
        let gain = op.gain(&solution);
        assert!(op.is_valid(&solution));
        op.apply(&mut solution);

        assert_eq!(solution.travel().cost, before + gain);
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

    #[test]
    fn test_reverse_tail_swap_gain_is_exact() {
        let problem = Arc::new(test_utils::problem_from_grid(10, &[1, 2, 8, 7], &[0, 9]));
        let mut solution = test_utils::solution_with_routes(&problem, &[&[0, 1], &[2, 3]]);

        let op = ReverseTwoOpt {
            first_route: VehicleIdx::new(0),
            second_route: VehicleIdx::new(1),
            first_cut: 0,
            second_cut: 0,
        };

        let before = solution.travel().cost;
        let gain = op.gain(&solution);
        assert!(op.is_valid(&solution));
        op.apply(&mut solution);

        assert_eq!(solution.travel().cost, before + gain);
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

    #[test]
    fn test_generate_respects_shipment_cuts() {
        use crate::problem::{amount::Amount, instance::ProblemBuilder, job::JobKind};

        let mut builder = ProblemBuilder::default();
        builder.set_locations(test_utils::grid_locations(10));
        builder.set_profiles(vec![test_utils::grid_profile(10)]);
        builder.set_amount_dimensions(1);
        builder.add_shipment(
            test_utils::job_with(1, 1, |b| {
                b.set_kind(JobKind::Pickup)
                    .set_pickup(Amount::from_vec(vec![1]));
            }),
            test_utils::job_with(1, 2, |b| {
                b.set_kind(JobKind::Delivery)
                    .set_delivery(Amount::from_vec(vec![1]));
            }),
        );
        builder.add_job(test_utils::job(7, 8));
        builder.set_vehicles(vec![test_utils::vehicle(0, 0), test_utils::vehicle(1, 9)]);
        let problem = Arc::new(builder.build().unwrap());

        let solution = test_utils::solution_with_routes(&problem, &[&[0, 1], &[2]]);

        let mut moves = Vec::new();
        TwoOpt::generate(
            &solution,
            (VehicleIdx::new(0), VehicleIdx::new(1)),
            |op| moves.push(op),
        );

        // Cutting between pickup and delivery (first_cut == 1) is refused.
        assert!(moves.iter().all(|op| op.first_cut != 1));
    }
}
