use fxhash::FxHashSet;
use serde::Serialize;

use crate::problem::{
    amount::Amount,
    instance::Problem,
    job::JobIdx,
    location::LocationIdx,
    units::{Duration, TIME_HORIZON},
    vehicle::VehicleIdx,
};

/// A break placed by the deterministic scheduler. Breaks are not part of the
/// task sequence; `position` names the gap they land in (`position == n`
/// means after the last task).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduledBreak {
    pub break_rank: usize,
    pub position: usize,
    pub arrival: Duration,
    pub start: Duration,
}

/// The earliest feasible timing of a task sequence under one vehicle.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    pub arrival: Vec<Duration>,
    pub service_start: Vec<Duration>,
    pub departure: Vec<Duration>,
    pub setup_applied: Vec<bool>,
    pub breaks: Vec<ScheduledBreak>,
    /// Departure from the vehicle start location.
    pub start_time: Duration,
    /// Arrival at the vehicle end location (or last departure without one).
    pub end_time: Duration,
}

/// Forward simulation of a candidate task sequence: travel, setup on first
/// visit, service, window waiting and greedy break placement. Returns `None`
/// as soon as any constraint makes the timing infeasible.
pub fn simulate(problem: &Problem, vehicle_idx: VehicleIdx, tasks: &[JobIdx]) -> Option<Schedule> {
    let vehicle = problem.vehicle(vehicle_idx);
    let tw = vehicle.time_window();
    let breaks = vehicle.breaks();

    let mut schedule = Schedule {
        arrival: Vec::with_capacity(tasks.len()),
        service_start: Vec::with_capacity(tasks.len()),
        departure: Vec::with_capacity(tasks.len()),
        setup_applied: Vec::with_capacity(tasks.len()),
        breaks: Vec::with_capacity(breaks.len()),
        start_time: tw.start,
        end_time: tw.start,
    };

    let mut t = tw.start;
    let mut prev_loc = vehicle.start();
    let mut seen = FxHashSet::<LocationIdx>::default();
    let mut next_break = 0;

    // Load at the current point, needed for break max_load bounds.
    let mut load = Amount::with_dimensions(problem.amount_dims());
    for &rank in tasks {
        if let Some(initial) = problem.job(rank).initial_load() {
            load += initial;
        }
    }

    for (position, &rank) in tasks.iter().enumerate() {
        let job = problem.job(rank);

        t = place_due_breaks(
            problem,
            vehicle_idx,
            &mut schedule,
            &mut next_break,
            position,
            t,
            prev_loc,
            Some(job.location()),
            &load,
        )?;

        let leg = problem
            .eval_between(vehicle, prev_loc, Some(job.location()))
            .duration;
        if leg >= TIME_HORIZON {
            return None;
        }

        let arrival = t + leg;
        let service_start = job.time_windows().earliest_from(arrival)?;
        let setup_applied = seen.insert(job.location()) && job.setup() > 0;
        let setup = if setup_applied { job.setup() } else { 0 };
        let departure = service_start + setup + job.service();

        if departure > tw.end {
            return None;
        }

        job.apply_load_change(&mut load);

        schedule.arrival.push(arrival);
        schedule.service_start.push(service_start);
        schedule.departure.push(departure);
        schedule.setup_applied.push(setup_applied);

        t = departure;
        prev_loc = Some(job.location());
    }

    // Remaining breaks land in the trailing gap.
    t = place_due_breaks(
        problem,
        vehicle_idx,
        &mut schedule,
        &mut next_break,
        tasks.len(),
        t,
        prev_loc,
        None,
        &load,
    )?;

    let final_leg = problem
        .eval_between(vehicle, prev_loc, vehicle.end())
        .duration;
    if final_leg >= TIME_HORIZON {
        return None;
    }

    let end_time = t + final_leg;
    if end_time > tw.end {
        return None;
    }

    schedule.end_time = end_time;
    Some(schedule)
}

/// Places every break whose window is bracketed by the current gap: the
/// vehicle is idle at `t`, and traveling on to `next_loc` would overshoot
/// the break window start (in the trailing gap everything pending is due).
/// Returns the time after any placed breaks.
#[allow(clippy::too_many_arguments)]
fn place_due_breaks(
    problem: &Problem,
    vehicle_idx: VehicleIdx,
    schedule: &mut Schedule,
    next_break: &mut usize,
    position: usize,
    mut t: Duration,
    prev_loc: Option<LocationIdx>,
    next_loc: Option<LocationIdx>,
    load: &Amount,
) -> Option<Duration> {
    let vehicle = problem.vehicle(vehicle_idx);
    let tw = vehicle.time_window();
    let breaks = vehicle.breaks();

    while *next_break < breaks.len() {
        let brk = &breaks[*next_break];

        let due = match next_loc {
            // The window opens before the next task could start.
            Some(next) => {
                let arrival = t + problem.eval_between(vehicle, prev_loc, Some(next)).duration;
                arrival >= brk.time_windows.earliest_start()
            }
            None => true,
        };
        if !due {
            break;
        }

        let start = brk.time_windows.earliest_from(t)?;
        if let Some(max_load) = &brk.max_load
            && !load.fits_within(max_load)
        {
            return None;
        }

        let departure = start + brk.service;
        if departure > tw.end {
            return None;
        }

        schedule.breaks.push(ScheduledBreak {
            break_rank: *next_break,
            position,
            arrival: t,
            start,
        });

        t = departure;
        *next_break += 1;
    }

    Some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        problem::{
            time_window::{TimeWindow, TimeWindows},
            vehicle::Break,
        },
        test_utils,
    };

    #[test]
    fn test_plain_forward_walk() {
        let problem = test_utils::problem_from_grid(4, &[1, 2, 3], &[0]);
        let tasks: Vec<JobIdx> = (0..3).map(JobIdx::new).collect();

        let schedule = simulate(&problem, VehicleIdx::new(0), &tasks).unwrap();

        assert_eq!(schedule.arrival, vec![100, 200, 300]);
        assert_eq!(schedule.service_start, vec![100, 200, 300]);
        assert_eq!(schedule.departure, vec![100, 200, 300]);
        assert_eq!(schedule.end_time, 600);
    }

    #[test]
    fn test_window_waiting() {
        let problem = test_utils::problem(
            3,
            vec![test_utils::job_with(0, 1, |builder| {
                builder.set_time_windows(TimeWindows::single(TimeWindow::new(500, 600)));
            })],
            vec![test_utils::vehicle(0, 0)],
        );

        let schedule = simulate(&problem, VehicleIdx::new(0), &[JobIdx::new(0)]).unwrap();

        assert_eq!(schedule.arrival[0], 100);
        assert_eq!(schedule.service_start[0], 500);
    }

    #[test]
    fn test_closed_window_is_infeasible() {
        let problem = test_utils::problem(
            3,
            vec![test_utils::job_with(0, 2, |builder| {
                builder.set_time_windows(TimeWindows::single(TimeWindow::new(0, 100)));
            })],
            vec![test_utils::vehicle(0, 0)],
        );

        // Arrival at 200 is past the window end.
        assert!(simulate(&problem, VehicleIdx::new(0), &[JobIdx::new(0)]).is_none());
    }

    #[test]
    fn test_setup_on_first_visit_only() {
        let problem = test_utils::problem(
            3,
            vec![
                test_utils::job_with(0, 1, |builder| {
                    builder.set_setup(50);
                }),
                test_utils::job_with(1, 1, |builder| {
                    builder.set_setup(50);
                }),
            ],
            vec![test_utils::vehicle(0, 0)],
        );

        let tasks = [JobIdx::new(0), JobIdx::new(1)];
        let schedule = simulate(&problem, VehicleIdx::new(0), &tasks).unwrap();

        assert_eq!(schedule.setup_applied, vec![true, false]);
        assert_eq!(schedule.departure[0], 150);
        // Same location: no travel, no second setup.
        assert_eq!(schedule.departure[1], 150);
    }

    #[test]
    fn test_break_waits_for_window() {
        let brk = Break {
            id: 1,
            time_windows: TimeWindows::single(TimeWindow::new(150, 250)),
            service: 30,
            max_load: None,
            description: String::new(),
        };
        let problem = test_utils::problem(
            4,
            vec![test_utils::job(0, 1), test_utils::job(1, 3)],
            vec![test_utils::vehicle_with(0, 0, |builder| {
                builder.set_breaks(vec![brk]);
            })],
        );

        let tasks = [JobIdx::new(0), JobIdx::new(1)];
        let schedule = simulate(&problem, VehicleIdx::new(0), &tasks).unwrap();

        // Gap after task 0 (departure 100): break window starts at 150,
        // arrival at the next task would be 300, so the break brackets here.
        assert_eq!(schedule.breaks.len(), 1);
        let scheduled = schedule.breaks[0];
        assert_eq!(scheduled.position, 1);
        assert_eq!(scheduled.arrival, 100);
        assert_eq!(scheduled.start, 150);
        // Task 1 leaves after the break: 180 + 200 travel.
        assert_eq!(schedule.arrival[1], 380);
    }

    #[test]
    fn test_break_max_load() {
        let brk = Break {
            id: 1,
            time_windows: TimeWindows::single(TimeWindow::new(0, 1000)),
            service: 0,
            max_load: Some(Amount::from_vec(vec![0])),
            description: String::new(),
        };
        let problem = test_utils::problem(
            3,
            vec![test_utils::job_with(0, 2, |builder| {
                builder.set_delivery(Amount::from_vec(vec![5]));
            })],
            vec![test_utils::vehicle_with(0, 0, |builder| {
                builder.set_breaks(vec![brk]);
            })],
        );

        // The break is due immediately, while the delivery is still on board.
        assert!(simulate(&problem, VehicleIdx::new(0), &[JobIdx::new(0)]).is_none());
    }

    #[test]
    fn test_missed_break_window_is_infeasible() {
        let brk = Break {
            id: 1,
            time_windows: TimeWindows::single(TimeWindow::new(0, 50)),
            service: 10,
            max_load: None,
            description: String::new(),
        };
        let problem = test_utils::problem(
            8,
            vec![test_utils::job(0, 7)],
            vec![test_utils::vehicle_with(0, 0, |builder| {
                builder
                    .set_breaks(vec![brk])
                    .set_time_window(TimeWindow::new(60, 100_000));
            })],
        );

        // The shift starts after the break window already closed.
        assert!(simulate(&problem, VehicleIdx::new(0), &[JobIdx::new(0)]).is_none());
    }
}
