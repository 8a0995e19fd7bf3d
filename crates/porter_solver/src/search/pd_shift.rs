use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    problem::{job::JobIdx, job::JobKind, units::Cost, vehicle::VehicleIdx},
    search::r#move::{fixed_delta, Operator},
    solution::solution::Solution,
};

/// Moves a complete pickup-delivery pair to another route, the delivery slot
/// expressed in the target's pre-insertion coordinates
/// (`to_delivery >= to_pickup`).
///
/// The source removal gain is constant per pair and precomputed at
/// generation; only the target insertion varies per candidate.
#[derive(Debug, Clone, Copy)]
pub struct PdShift {
    pub from_route: VehicleIdx,
    pub to_route: VehicleIdx,
    pub pickup_pos: usize,
    pub delivery_pos: usize,
    pub to_pickup: usize,
    pub to_delivery: usize,
    removal_gain: Cost,
}

impl PdShift {
    fn target_segment(&self, solution: &Solution) -> SmallVec<[JobIdx; 8]> {
        let source = solution.route(self.from_route);
        let target = solution.route(self.to_route);
        let pickup = source.task(self.pickup_pos);
        let delivery = source.task(self.delivery_pos);

        let mut seg: SmallVec<[JobIdx; 8]> =
            SmallVec::with_capacity(self.to_delivery - self.to_pickup + 2);
        seg.push(pickup);
        seg.extend_from_slice(&target.tasks()[self.to_pickup..self.to_delivery]);
        seg.push(delivery);
        seg
    }

    fn source_remainder(&self, solution: &Solution) -> SmallVec<[JobIdx; 8]> {
        let source = solution.route(self.from_route);
        SmallVec::from_slice(&source.tasks()[self.pickup_pos + 1..self.delivery_pos])
    }
}

impl Operator for PdShift {
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

        for pickup_pos in 0..source.len() {
            let pickup = source.task(pickup_pos);
            if problem.job(pickup).kind() != JobKind::Pickup {
                continue;
            }
            let delivery = problem.partner(pickup).expect("pickup has a partner");
            let delivery_pos = source.position_of(delivery).expect("pair on one route");

            if !problem.can_serve(r2, pickup) || !problem.can_serve(r2, delivery) {
                continue;
            }
            let target_vehicle = problem.vehicle(r2);
            if !problem.is_reachable(
                target_vehicle,
                problem.job(pickup).location(),
                problem.job(delivery).location(),
            ) {
                continue;
            }

            // Removing the pair costs the same wherever it lands.
            let remainder: SmallVec<[JobIdx; 8]> =
                SmallVec::from_slice(&source.tasks()[pickup_pos + 1..delivery_pos]);
            let removal_gain = source
                .eval_delta_replace(problem, &remainder, pickup_pos, delivery_pos + 1)
                .cost
                + fixed_delta(problem, source, source.len() - 2);

            for to_pickup in 0..=target.len() {
                for to_delivery in to_pickup..=target.len() {
                    consumer(PdShift {
                        from_route: r1,
                        to_route: r2,
                        pickup_pos,
                        delivery_pos,
                        to_pickup,
                        to_delivery,
                        removal_gain,
                    });
                }
            }
        }
    }

    fn gain(&self, solution: &Solution) -> Cost {
        let problem = solution.problem();
        let source = solution.route(self.from_route);
        let target = solution.route(self.to_route);

        let pickup_loc = Some(source.location_at(problem, self.pickup_pos));
        let delivery_loc = Some(source.location_at(problem, self.delivery_pos));
        let prev = target.prev_location(problem, self.to_pickup);

        let insertion = if self.to_pickup == self.to_delivery {
            let next = target.slot_location(problem, self.to_pickup);
            let split = if target.is_empty() {
                0
            } else {
                target.edge(problem, prev, next).cost
            };
            target.edge(problem, prev, pickup_loc).cost
                + target.edge(problem, pickup_loc, delivery_loc).cost
                + target.edge(problem, delivery_loc, next).cost
                - split
        } else {
            let first = Some(target.location_at(problem, self.to_pickup));
            let last = Some(target.location_at(problem, self.to_delivery - 1));
            let next = target.slot_location(problem, self.to_delivery);

            target.edge(problem, prev, pickup_loc).cost
                + target.edge(problem, pickup_loc, first).cost
                - target.edge(problem, prev, first).cost
                + target.edge(problem, last, delivery_loc).cost
                + target.edge(problem, delivery_loc, next).cost
                - target.edge(problem, last, next).cost
        };

        self.removal_gain + insertion + fixed_delta(problem, target, target.len() + 2)
    }

    fn is_valid(&self, solution: &Solution) -> bool {
        let problem = solution.problem();
        let source = solution.route(self.from_route);
        let target = solution.route(self.to_route);

        let pickup = source.task(self.pickup_pos);
        let delivery = source.task(self.delivery_pos);
        if !problem.can_serve(self.to_route, pickup) || !problem.can_serve(self.to_route, delivery)
        {
            return false;
        }

        let seg = self.target_segment(solution);
        let remainder = self.source_remainder(solution);

        target.can_replace(problem, &seg, self.to_pickup, self.to_delivery)
            && source.can_replace(problem, &remainder, self.pickup_pos, self.delivery_pos + 1)
    }

    fn apply(&self, solution: &mut Solution) {
        let problem = Arc::clone(solution.problem_arc());
        let seg = self.target_segment(solution);
        let remainder = self.source_remainder(solution);

        solution.route_mut(self.from_route).replace_segment(
            &problem,
            &remainder,
            self.pickup_pos,
            self.delivery_pos + 1,
        );
        solution.route_mut(self.to_route).replace_segment(
            &problem,
            &seg,
            self.to_pickup,
            self.to_delivery,
        );
    }

    fn updated_routes(&self) -> SmallVec<[VehicleIdx; 2]> {
        SmallVec::from_slice(&[self.from_route, self.to_route])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        problem::{amount::Amount, instance::ProblemBuilder},
        test_utils,
    };

    fn shipment_problem() -> Arc<crate::problem::instance::Problem> {
        let mut builder = ProblemBuilder::default();
        builder.set_locations(test_utils::grid_locations(12));
        builder.set_profiles(vec![test_utils::grid_profile(12)]);
        builder.set_amount_dimensions(1);
        builder.add_shipment(
            test_utils::job_with(1, 8, |b| {
                b.set_kind(JobKind::Pickup)
                    .set_pickup(Amount::from_vec(vec![2]));
            }),
            test_utils::job_with(1, 9, |b| {
                b.set_kind(JobKind::Delivery)
                    .set_delivery(Amount::from_vec(vec![2]));
            }),
        );
        builder.add_job(test_utils::job(5, 1));
        builder.set_vehicles(vec![test_utils::vehicle(0, 0), test_utils::vehicle(1, 10)]);
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn test_pair_moves_together() {
        let problem = shipment_problem();
        // Vehicle 0 hauls everything; the pair (grids 8, 9) suits vehicle 1.
        let mut solution = test_utils::solution_with_routes(&problem, &[&[2, 0, 1], &[]]);

        let mut moves = Vec::new();
        PdShift::generate(
            &solution,
            (VehicleIdx::new(0), VehicleIdx::new(1)),
            |op| moves.push(op),
        );
        assert!(!moves.is_empty());

        let op = moves
            .iter()
            .filter(|op| op.is_valid(&solution))
            .min_by_key(|op| op.gain(&solution))
            .copied()
            .unwrap();

        let before = solution.travel().cost;
        let gain = op.gain(&solution);
        op.apply(&mut solution);

        assert_eq!(solution.travel().cost, before + gain);
        assert!(gain < 0);

        let target = solution.route(VehicleIdx::new(1));
        let pickup_pos = target.position_of(JobIdx::new(0)).unwrap();
        let delivery_pos = target.position_of(JobIdx::new(1)).unwrap();
        assert!(pickup_pos < delivery_pos);
        solution.validate().unwrap();
    }

    #[test]
    fn test_gain_with_interleaved_delivery_slot() {
        let problem = shipment_problem();
        let mut solution = test_utils::solution_with_routes(&problem, &[&[0, 1], &[2]]);

        // Insert pickup before the single and delivery after it.
        let op = PdShift {
            from_route: VehicleIdx::new(0),
            to_route: VehicleIdx::new(1),
            pickup_pos: 0,
            delivery_pos: 1,
            to_pickup: 0,
            to_delivery: 1,
            removal_gain: solution
                .route(VehicleIdx::new(0))
                .eval_delta_replace(solution.problem(), &[], 0, 2)
                .cost,
        };

        let before = solution.travel().cost;
        let gain = op.gain(&solution);
        assert!(op.is_valid(&solution));
        op.apply(&mut solution);

        assert_eq!(solution.travel().cost, before + gain);
        solution.validate().unwrap();
    }
}
