use std::sync::Arc;

use smallvec::SmallVec;

use crate::{
    config::EngineConfig,
    problem::{job::JobIdx, job::JobKind, units::Cost, vehicle::VehicleIdx},
    search::r#move::Operator,
    solution::solution::Solution,
};

/// Drops one served task to make room for an unassigned one somewhere else
/// in the same route. Only worthwhile as a compound move: the driver accepts
/// it solely when the total gain, priority penalty included, is negative.
#[derive(Debug, Clone, Copy)]
pub struct UnassignOnNeed {
    pub route: VehicleIdx,
    pub remove: usize,
    pub incoming: JobIdx,
    pub insert_at: usize,
}

impl UnassignOnNeed {
    /// The combined change as one segment replacement in pre-move
    /// coordinates.
    fn replacement(&self, solution: &Solution) -> (SmallVec<[JobIdx; 8]>, usize, usize) {
        let tasks = solution.route(self.route).tasks();
        if self.insert_at < self.remove {
            let mut seg: SmallVec<[JobIdx; 8]> = SmallVec::new();
            seg.push(self.incoming);
            seg.extend_from_slice(&tasks[self.insert_at..self.remove]);
            (seg, self.insert_at, self.remove + 1)
        } else {
            let mut seg: SmallVec<[JobIdx; 8]> =
                SmallVec::from_slice(&tasks[self.remove + 1..self.insert_at]);
            seg.push(self.incoming);
            (seg, self.remove, self.insert_at)
        }
    }
}

impl Operator for UnassignOnNeed {
    fn generate<C>(solution: &Solution, (r1, r2): (VehicleIdx, VehicleIdx), mut consumer: C)
    where
        C: FnMut(Self),
    {
        if r1 != r2 || solution.unassigned().is_empty() {
            return;
        }

        let problem = solution.problem();
        let route = solution.route(r1);

        for remove in 0..route.len() {
            if problem.job(route.task(remove)).kind() != JobKind::Single {
                continue;
            }

            for &incoming in solution.unassigned() {
                if problem.job(incoming).kind() != JobKind::Single {
                    continue;
                }
                if !problem.can_serve(r1, incoming) {
                    continue;
                }

                for insert_at in 0..=route.len() {
                    // Same-slot replacement is priority-replace's move.
                    if insert_at == remove || insert_at == remove + 1 {
                        continue;
                    }
                    consumer(UnassignOnNeed {
                        route: r1,
                        remove,
                        incoming,
                        insert_at,
                    });
                }
            }
        }
    }

    fn gain(&self, solution: &Solution) -> Cost {
        let problem = solution.problem();
        let route = solution.route(self.route);
        let weight = EngineConfig::global().priority_weight;

        let outgoing = problem.job(route.task(self.remove));
        let incoming = problem.job(self.incoming);

        let out_loc = Some(outgoing.location());
        let in_loc = Some(incoming.location());

        // Removal and insertion sites never share an edge here; the no-op
        // neighborhood around `remove` is excluded at generation.
        let a = route.prev_location(problem, self.remove);
        let b = route.slot_location(problem, self.remove + 1);
        let removal = route.edge(problem, a, b).cost
            - route.edge(problem, a, out_loc).cost
            - route.edge(problem, out_loc, b).cost;

        let x = route.prev_location(problem, self.insert_at);
        let y = route.slot_location(problem, self.insert_at);
        let insertion = route.edge(problem, x, in_loc).cost
            + route.edge(problem, in_loc, y).cost
            - route.edge(problem, x, y).cost;

        let penalty =
            (outgoing.priority() as Cost - incoming.priority() as Cost) * weight;

        removal + insertion + penalty
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
        if problem.job(route.task(self.remove)).kind() != JobKind::Single {
            return false;
        }

        let (seg, start, end) = self.replacement(solution);
        route.can_replace(problem, &seg, start, end)
    }

    fn apply(&self, solution: &mut Solution) {
        let problem = Arc::clone(solution.problem_arc());
        let outgoing = solution.route(self.route).task(self.remove);
        let (seg, start, end) = self.replacement(solution);

        solution
            .route_mut(self.route)
            .replace_segment(&problem, &seg, start, end);
        solution.mark_unassigned(outgoing);
        solution.mark_assigned(self.incoming);
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
    fn test_drop_unblocks_better_insertion() {
        // max_tasks = 2 and a low-priority job parked far off the corridor;
        // dropping it lets the high-priority job in at a different slot.
        let problem = Arc::new(test_utils::problem(
            10,
            vec![
                test_utils::job(0, 1),
                test_utils::job(1, 9),
                test_utils::job_with(2, 2, |b| {
                    b.set_priority(30);
                }),
            ],
            vec![test_utils::vehicle_with(0, 0, |b| {
                b.set_max_tasks(2);
            })],
        ));
        let mut solution = test_utils::solution_with_routes(&problem, &[&[0, 1]]);

        let mut moves = Vec::new();
        UnassignOnNeed::generate(
            &solution,
            (VehicleIdx::new(0), VehicleIdx::new(0)),
            |op| moves.push(op),
        );

        let best = moves
            .iter()
            .filter(|op| op.is_valid(&solution))
            .min_by_key(|op| op.gain(&solution))
            .copied()
            .unwrap();

        let before = solution.objective();
        let gain = best.gain(&solution);
        assert!(gain < 0);
        best.apply(&mut solution);

        assert_eq!(solution.objective(), before + gain);
        assert!(solution.route(VehicleIdx::new(0)).contains(JobIdx::new(2)));
        assert_eq!(solution.unassigned().len(), 1);
        solution.validate().unwrap();
    }

    #[test]
    fn test_exact_gain_on_apply() {
        let problem = Arc::new(test_utils::problem(
            10,
            vec![
                test_utils::job(0, 3),
                test_utils::job(1, 5),
                test_utils::job_with(2, 1, |b| {
                    b.set_priority(10);
                }),
            ],
            vec![test_utils::vehicle_with(0, 0, |b| {
                b.set_max_tasks(2);
            })],
        ));
        let mut solution = test_utils::solution_with_routes(&problem, &[&[0, 1]]);

        let op = UnassignOnNeed {
            route: VehicleIdx::new(0),
            remove: 1,
            incoming: JobIdx::new(2),
            insert_at: 0,
        };

        let before = solution.objective();
        let gain = op.gain(&solution);
        assert!(op.is_valid(&solution));
        op.apply(&mut solution);

        assert_eq!(solution.objective(), before + gain);
        solution.validate().unwrap();
    }
}
