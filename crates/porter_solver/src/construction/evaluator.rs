use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    problem::{
        instance::Problem,
        job::JobIdx,
        units::Cost,
        vehicle::VehicleIdx,
    },
    solution::solution::Solution,
};

/// A fully specified placement of one insertion unit: a single job, or a
/// shipment pair with the delivery slot expressed in pre-insertion
/// coordinates (`delivery_position >= pickup_position`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Single {
        vehicle: VehicleIdx,
        job: JobIdx,
        position: usize,
    },
    Shipment {
        vehicle: VehicleIdx,
        pickup: JobIdx,
        delivery: JobIdx,
        pickup_position: usize,
        delivery_position: usize,
    },
}

impl Insertion {
    pub fn vehicle(&self) -> VehicleIdx {
        match *self {
            Insertion::Single { vehicle, .. } | Insertion::Shipment { vehicle, .. } => vehicle,
        }
    }

    /// Deterministic ordering key for equal-cost candidates: lowest vehicle
    /// first, then the latest slot, so tasks placed earlier keep their rank
    /// and equal-cost routes come out in ascending insertion order.
    fn tie_key(&self) -> (usize, usize, usize) {
        match *self {
            Insertion::Single {
                vehicle, position, ..
            } => (vehicle.get(), usize::MAX - position, 0),
            Insertion::Shipment {
                vehicle,
                pickup_position,
                delivery_position,
                ..
            } => (
                vehicle.get(),
                usize::MAX - pickup_position,
                usize::MAX - delivery_position,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RankedInsertion {
    pub cost: Cost,
    pub insertion: Insertion,
}

impl RankedInsertion {
    fn sort_key(&self) -> (Cost, (usize, usize, usize)) {
        (self.cost, self.insertion.tie_key())
    }
}

/// Keeps the `k` cheapest valid insertions, ordered by cost then position.
pub struct KBest {
    k: usize,
    items: SmallVec<[RankedInsertion; 4]>,
}

impl KBest {
    pub fn new(k: usize) -> Self {
        KBest {
            k,
            items: SmallVec::new(),
        }
    }

    /// Whether a candidate at `cost` could enter the collection; used to
    /// skip the validity check for hopeless candidates.
    pub fn would_accept(&self, cost: Cost) -> bool {
        self.items.len() < self.k || cost < self.items[self.items.len() - 1].cost
    }

    pub fn push(&mut self, candidate: RankedInsertion) {
        let at = self
            .items
            .partition_point(|existing| existing.sort_key() <= candidate.sort_key());
        self.items.insert(at, candidate);
        self.items.truncate(self.k);
    }

    pub fn into_items(self) -> SmallVec<[RankedInsertion; 4]> {
        self.items
    }
}

/// The `k` cheapest valid insertions of `unit` across all vehicles. For a
/// shipment the unit is its pickup rank.
pub fn evaluate_insertions(
    solution: &Solution,
    unit: JobIdx,
    k: usize,
) -> SmallVec<[RankedInsertion; 4]> {
    let mut collector = KBest::new(k);
    for vehicle in VehicleIdx::all(solution.problem().vehicles().len()) {
        evaluate_unit_on_vehicle(solution, unit, vehicle, &mut collector);
    }
    collector.into_items()
}

/// Candidate evaluation for one vehicle, feeding a shared collector. Costs
/// come from edge arithmetic alone; the full constraint check only runs for
/// candidates that could enter the collection.
pub fn evaluate_unit_on_vehicle(
    solution: &Solution,
    unit: JobIdx,
    vehicle_idx: VehicleIdx,
    collector: &mut KBest,
) {
    let problem = solution.problem();

    if !problem.can_serve(vehicle_idx, unit) {
        return;
    }

    match problem.partner(unit) {
        None => evaluate_single(solution, unit, vehicle_idx, collector),
        Some(delivery) => {
            if !problem.can_serve(vehicle_idx, delivery) {
                return;
            }
            let vehicle = problem.vehicle(vehicle_idx);
            let pickup_loc = problem.job(unit).location();
            let delivery_loc = problem.job(delivery).location();
            if !problem.is_reachable(vehicle, pickup_loc, delivery_loc) {
                return;
            }
            evaluate_shipment(solution, unit, delivery, vehicle_idx, collector);
        }
    }
}

fn evaluate_single(
    solution: &Solution,
    job: JobIdx,
    vehicle_idx: VehicleIdx,
    collector: &mut KBest,
) {
    let problem = solution.problem();
    let route = solution.route(vehicle_idx);
    let fixed = if route.is_empty() {
        problem.vehicle(vehicle_idx).costs().fixed
    } else {
        0
    };
    let location = problem.job(job).location();

    for position in 0..=route.len() {
        let prev = route.prev_location(problem, position);
        let next = route.slot_location(problem, position);

        // An unused route has no depot loop to split.
        let removed = if route.is_empty() {
            0
        } else {
            route.edge(problem, prev, next).cost
        };
        let cost = route.edge(problem, prev, Some(location)).cost
            + route.edge(problem, Some(location), next).cost
            - removed
            + fixed;

        if !collector.would_accept(cost) {
            continue;
        }
        if !route.can_replace(problem, &[job], position, position) {
            continue;
        }

        collector.push(RankedInsertion {
            cost,
            insertion: Insertion::Single {
                vehicle: vehicle_idx,
                job,
                position,
            },
        });
    }
}

fn evaluate_shipment(
    solution: &Solution,
    pickup: JobIdx,
    delivery: JobIdx,
    vehicle_idx: VehicleIdx,
    collector: &mut KBest,
) {
    let problem = solution.problem();
    let route = solution.route(vehicle_idx);
    let fixed = if route.is_empty() {
        problem.vehicle(vehicle_idx).costs().fixed
    } else {
        0
    };
    let pickup_loc = Some(problem.job(pickup).location());
    let delivery_loc = Some(problem.job(delivery).location());

    for pickup_position in 0..=route.len() {
        let prev = route.prev_location(problem, pickup_position);

        for delivery_position in pickup_position..=route.len() {
            let base = if pickup_position == delivery_position {
                let next = route.slot_location(problem, pickup_position);
                let removed = if route.is_empty() {
                    0
                } else {
                    route.edge(problem, prev, next).cost
                };
                route.edge(problem, prev, pickup_loc).cost
                    + route.edge(problem, pickup_loc, delivery_loc).cost
                    + route.edge(problem, delivery_loc, next).cost
                    - removed
            } else {
                let first = Some(route.location_at(problem, pickup_position));
                let last = Some(route.location_at(problem, delivery_position - 1));
                let next = route.slot_location(problem, delivery_position);

                route.edge(problem, prev, pickup_loc).cost
                    + route.edge(problem, pickup_loc, first).cost
                    - route.edge(problem, prev, first).cost
                    + route.edge(problem, last, delivery_loc).cost
                    + route.edge(problem, delivery_loc, next).cost
                    - route.edge(problem, last, next).cost
            };
            let cost = base + fixed;

            if !collector.would_accept(cost) {
                continue;
            }

            let seg = shipment_segment(route.tasks(), pickup, delivery, pickup_position, delivery_position);
            if !route.can_replace(problem, &seg, pickup_position, delivery_position) {
                continue;
            }

            collector.push(RankedInsertion {
                cost,
                insertion: Insertion::Shipment {
                    vehicle: vehicle_idx,
                    pickup,
                    delivery,
                    pickup_position,
                    delivery_position,
                },
            });
        }
    }
}

fn shipment_segment(
    tasks: &[JobIdx],
    pickup: JobIdx,
    delivery: JobIdx,
    pickup_position: usize,
    delivery_position: usize,
) -> SmallVec<[JobIdx; 8]> {
    let mut seg = SmallVec::with_capacity(delivery_position - pickup_position + 2);
    seg.push(pickup);
    seg.extend_from_slice(&tasks[pickup_position..delivery_position]);
    seg.push(delivery);
    seg
}

/// Commits an insertion chosen by the evaluator.
pub fn apply_insertion(solution: &mut Solution, insertion: &Insertion) {
    let problem: Arc<Problem> = Arc::clone(solution.problem_arc());

    match *insertion {
        Insertion::Single {
            vehicle,
            job,
            position,
        } => {
            solution
                .route_mut(vehicle)
                .replace_segment(&problem, &[job], position, position);
            solution.mark_assigned(job);
        }
        Insertion::Shipment {
            vehicle,
            pickup,
            delivery,
            pickup_position,
            delivery_position,
        } => {
            let seg = shipment_segment(
                solution.route(vehicle).tasks(),
                pickup,
                delivery,
                pickup_position,
                delivery_position,
            );
            solution.route_mut(vehicle).replace_segment(
                &problem,
                &seg,
                pickup_position,
                delivery_position,
            );
            solution.mark_assigned(pickup);
            solution.mark_assigned(delivery);
        }
    }
}
