use std::sync::Arc;

use crate::{
    error::InputError,
    problem::{
        job::{JobIdx, JobKind},
        vehicle::{StepKind, VehicleIdx, VehicleStep},
    },
    solution::solution::Solution,
};

/// Seeds routes from user-forced vehicle steps. The forced sequence must be
/// feasible as given; it remains subject to later improvement like any other
/// route content.
pub fn apply_forced_steps(solution: &mut Solution) -> Result<(), InputError> {
    let problem = Arc::clone(solution.problem_arc());

    for vehicle_idx in VehicleIdx::all(problem.vehicles().len()) {
        let vehicle = problem.vehicle(vehicle_idx);
        if vehicle.steps().is_empty() {
            continue;
        }

        let mut sequence: Vec<JobIdx> = Vec::new();
        for step in vehicle.steps() {
            let Some(kind) = task_kind(step) else { continue };
            let id = step.id.expect("validated at problem build");

            let task = problem
                .find_job(kind, id)
                .ok_or(InputError::UnknownStepId {
                    vehicle_id: vehicle.id(),
                    id,
                })?;

            if !problem.can_serve(vehicle_idx, task) {
                return Err(InputError::ImpossibleStep {
                    vehicle_id: vehicle.id(),
                    step_id: id,
                    reason: "the vehicle cannot serve this task".to_owned(),
                });
            }
            if solution.route_of(task).is_some() || !solution.is_unassigned(task) {
                return Err(InputError::ImpossibleStep {
                    vehicle_id: vehicle.id(),
                    step_id: id,
                    reason: "the task is already forced onto another vehicle".to_owned(),
                });
            }

            sequence.push(task);
        }

        if sequence.is_empty() {
            continue;
        }

        if !solution
            .route(vehicle_idx)
            .can_replace(&problem, &sequence, 0, 0)
        {
            let first = vehicle.steps().iter().find_map(|step| step.id).unwrap_or(0);
            return Err(InputError::ImpossibleStep {
                vehicle_id: vehicle.id(),
                step_id: first,
                reason: "the forced sequence violates a hard constraint".to_owned(),
            });
        }

        solution.seed_route(vehicle_idx, &sequence);
        check_forced_times(solution, vehicle_idx)?;
    }

    Ok(())
}

fn task_kind(step: &VehicleStep) -> Option<JobKind> {
    match step.kind {
        StepKind::Job => Some(JobKind::Single),
        StepKind::Pickup => Some(JobKind::Pickup),
        StepKind::Delivery => Some(JobKind::Delivery),
        StepKind::Start | StepKind::End | StepKind::Break => None,
    }
}

/// Validates `service_at` / `service_after` / `service_before` against the
/// earliest schedule. Waiting can push service later, so only bounds the
/// earliest schedule already misses are impossible.
fn check_forced_times(solution: &Solution, vehicle_idx: VehicleIdx) -> Result<(), InputError> {
    let problem = solution.problem();
    let vehicle = problem.vehicle(vehicle_idx);
    let route = solution.route(vehicle_idx);

    let mut position = 0;
    for step in vehicle.steps() {
        if task_kind(step).is_none() {
            continue;
        }
        let earliest = route.schedule().service_start[position];
        let id = step.id.expect("validated at problem build");
        position += 1;

        if let Some(at) = step.service_at
            && earliest > at
        {
            return Err(InputError::ImpossibleStep {
                vehicle_id: vehicle.id(),
                step_id: id,
                reason: format!("service cannot start before {earliest}, service_at is {at}"),
            });
        }
        if let Some(before) = step.service_before
            && earliest >= before
        {
            return Err(InputError::ImpossibleStep {
                vehicle_id: vehicle.id(),
                step_id: id,
                reason: format!(
                    "service cannot start before {earliest}, service_before is {before}"
                ),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{problem::time_window::TimeWindow, test_utils};

    fn forced_step(id: u64) -> VehicleStep {
        VehicleStep {
            kind: StepKind::Job,
            id: Some(id),
            service_at: None,
            service_after: None,
            service_before: None,
        }
    }

    #[test]
    fn test_steps_seed_route_in_order() {
        let problem = Arc::new(test_utils::problem(
            5,
            vec![test_utils::job(10, 1), test_utils::job(11, 2)],
            vec![test_utils::vehicle_with(0, 0, |b| {
                b.set_steps(vec![forced_step(11), forced_step(10)]);
            })],
        ));
        let mut solution = Solution::new(Arc::clone(&problem));

        apply_forced_steps(&mut solution).unwrap();

        assert_eq!(
            solution.route(VehicleIdx::new(0)).tasks(),
            &[JobIdx::new(1), JobIdx::new(0)]
        );
    }

    #[test]
    fn test_infeasible_steps_rejected() {
        let problem = Arc::new(test_utils::problem(
            5,
            vec![test_utils::job(10, 4)],
            vec![test_utils::vehicle_with(0, 0, |b| {
                b.set_steps(vec![forced_step(10)])
                    .set_time_window(TimeWindow::new(0, 100));
            })],
        ));
        let mut solution = Solution::new(Arc::clone(&problem));

        assert!(matches!(
            apply_forced_steps(&mut solution),
            Err(InputError::ImpossibleStep { .. })
        ));
    }

    #[test]
    fn test_service_before_bound() {
        let problem = Arc::new(test_utils::problem(
            5,
            vec![test_utils::job(10, 3)],
            vec![test_utils::vehicle_with(0, 0, |b| {
                b.set_steps(vec![VehicleStep {
                    kind: StepKind::Job,
                    id: Some(10),
                    service_at: None,
                    service_after: None,
                    service_before: Some(200),
                }]);
            })],
        ));
        let mut solution = Solution::new(Arc::clone(&problem));

        // Earliest arrival at grid 3 is 300, past the forced bound.
        assert!(matches!(
            apply_forced_steps(&mut solution),
            Err(InputError::ImpossibleStep { .. })
        ));
    }
}
