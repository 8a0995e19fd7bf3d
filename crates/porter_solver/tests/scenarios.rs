use porter_matrix::great_circle::GreatCircleOracle;
use porter_solver::json::{decode_problem, encode_solution, VrpInput};
use porter_solver::solution::Solution;
use porter_solver::{SearchParams, Solver};

fn params() -> SearchParams {
    SearchParams {
        rounds: 8,
        streams: 6,
        ..SearchParams::default()
    }
}

fn solve(raw: &str) -> (Solver, Solution) {
    let input: VrpInput = serde_json::from_str(raw).expect("scenario input parses");
    let problem = decode_problem(input, &GreatCircleOracle::default()).expect("input is valid");
    let solver = Solver::new(problem, params());
    let solution = solver.solve().expect("solve succeeds");
    solution.validate().expect("invariants hold");
    (solver, solution)
}

fn route_ids(solution: &Solution, vehicle: usize) -> Vec<u64> {
    solution.routes()[vehicle]
        .tasks()
        .iter()
        .map(|&rank| solution.problem().job(rank).id())
        .collect()
}

fn unassigned_ids(solution: &Solution) -> Vec<u64> {
    solution
        .unassigned()
        .iter()
        .map(|&rank| solution.problem().job(rank).id())
        .collect()
}

#[test]
fn triangle_tie_breaks_by_ascending_id() {
    // Symmetric triangle: both visit orders cost 1000 + 1414 + 1000.
    let (_, solution) = solve(
        r#"{
            "jobs": [
                {"id": 1, "location_index": 1},
                {"id": 2, "location_index": 2}
            ],
            "vehicles": [{"id": 1, "start_index": 0, "end_index": 0}],
            "matrices": {"car": {"durations": [
                [0, 1000, 1000],
                [1000, 0, 1414],
                [1000, 1414, 0]
            ]}}
        }"#,
    );

    assert_eq!(solution.objective(), 3414);
    assert_eq!(route_ids(&solution, 0), vec![1, 2]);
    assert!(solution.unassigned().is_empty());
}

const TIGHT_CAPACITY: &str = r#"{
    "jobs": [
        {"id": 1, "location_index": 1, "delivery": [3], "priority": PRIO_1},
        {"id": 2, "location_index": 2, "delivery": [3], "priority": 10},
        {"id": 3, "location_index": 3, "delivery": [3], "priority": PRIO_3}
    ],
    "vehicles": [{"id": 1, "start_index": 0, "end_index": 0, "capacity": [6]}],
    "matrices": {"car": {"durations": [
        [0, 100, 100, 100],
        [100, 0, 100, 100],
        [100, 100, 0, 100],
        [100, 100, 100, 0]
    ]}}
}"#;

#[test]
fn tight_capacity_drops_lowest_priority() {
    let raw = TIGHT_CAPACITY
        .replace("PRIO_1", "0")
        .replace("PRIO_3", "10");
    let (_, solution) = solve(&raw);

    // Two of three deliveries fit; the priority-0 job stays out.
    assert_eq!(solution.assigned_count(), 2);
    assert_eq!(unassigned_ids(&solution), vec![1]);
}

#[test]
fn tight_capacity_ties_drop_highest_id() {
    let raw = TIGHT_CAPACITY
        .replace("PRIO_1", "10")
        .replace("PRIO_3", "10");
    let (_, solution) = solve(&raw);

    assert_eq!(solution.assigned_count(), 2);
    assert_eq!(unassigned_ids(&solution), vec![3]);
}

const SPLIT_WINDOWS: &str = r#"{
    "jobs": [
        {"id": 1, "location_index": 1, "time_windows": [[0, 10]]},
        {"id": 2, "location_index": 2, "time_windows": [[100, 110]]}
    ],
    "vehicles": [{"id": 1, "start_index": 0, "end_index": 0, "tw": [0, VEHICLE_END]}],
    "matrices": {"car": {"durations": [
        [0, 1, 1],
        [1, 0, 1],
        [1, 1, 0]
    ]}}
}"#;

#[test]
fn disjoint_windows_fit_a_wide_shift() {
    let raw = SPLIT_WINDOWS.replace("VEHICLE_END", "200");
    let (_, solution) = solve(&raw);

    assert!(solution.unassigned().is_empty());
    assert_eq!(route_ids(&solution, 0), vec![1, 2]);
}

#[test]
fn short_shift_drops_the_late_job() {
    let raw = SPLIT_WINDOWS.replace("VEHICLE_END", "50");
    let (_, solution) = solve(&raw);

    assert_eq!(unassigned_ids(&solution), vec![2]);
    assert_eq!(route_ids(&solution, 0), vec![1]);
}

fn assert_shipment_order(solution: &Solution) {
    let problem = solution.problem();
    for route in solution.routes() {
        for (position, &rank) in route.tasks().iter().enumerate() {
            if problem.job(rank).kind() == porter_solver::problem::JobKind::Pickup {
                let delivery = problem.partner(rank).unwrap();
                let delivery_pos = route
                    .position_of(delivery)
                    .expect("delivery rides with its pickup");
                assert!(position < delivery_pos, "pickup after delivery");
            }
        }
    }
}

const CROSSING_SHIPMENTS: &str = r#"{
    "shipments": [
        {
            "pickup": {"id": 1, "location_index": 1},
            "delivery": {"id": 1, "location_index": 3},
            "amount": [1]
        },
        {
            "pickup": {"id": 2, "location_index": 2},
            "delivery": {"id": 2, "location_index": 4},
            "amount": [1]
        }
    ],
    "vehicles": [{"id": 1, "start_index": 0, "end_index": 0, "capacity": [CAP]}],
    "matrices": {"car": {"durations": [
        [0, 100, 200, 300, 400],
        [100, 0, 100, 200, 300],
        [200, 100, 0, 100, 200],
        [300, 200, 100, 0, 100],
        [400, 300, 200, 100, 0]
    ]}}
}"#;

#[test]
fn crossing_shipments_with_room_to_stack() {
    let raw = CROSSING_SHIPMENTS.replace("CAP", "2");
    let (_, solution) = solve(&raw);

    assert!(solution.unassigned().is_empty());
    assert_shipment_order(&solution);
}

#[test]
fn crossing_shipments_interleave_under_unit_capacity() {
    let raw = CROSSING_SHIPMENTS.replace("CAP", "1");
    let (_, solution) = solve(&raw);

    assert!(solution.unassigned().is_empty());
    assert_shipment_order(&solution);

    // With room for one parcel the pairs cannot nest.
    let ids = route_ids(&solution, 0);
    assert_eq!(ids.len(), 4);
    assert_ne!(ids, vec![1, 2, 1, 2]);
}

#[test]
fn priority_replace_frees_the_single_slot() {
    let (_, solution) = solve(
        r#"{
            "jobs": [
                {"id": 1, "location_index": 1, "priority": 0},
                {"id": 2, "location_index": 2, "priority": 50}
            ],
            "vehicles": [{"id": 1, "start_index": 0, "end_index": 0, "max_tasks": 1}],
            "matrices": {"car": {"durations": [
                [0, 100, 100],
                [100, 0, 100],
                [100, 100, 0]
            ]}}
        }"#,
    );

    assert_eq!(route_ids(&solution, 0), vec![2]);
    assert_eq!(unassigned_ids(&solution), vec![1]);
}

#[test]
fn zero_width_window_needs_exact_arrival() {
    // Arrival at 100 hits the window [100, 100] exactly.
    let (_, feasible) = solve(
        r#"{
            "jobs": [{"id": 1, "location_index": 1, "time_windows": [[100, 100]]}],
            "vehicles": [{"id": 1, "start_index": 0}],
            "matrix": [[0, 100], [100, 0]]
        }"#,
    );
    assert!(feasible.unassigned().is_empty());

    // Arrival at 101 just misses it.
    let (_, infeasible) = solve(
        r#"{
            "jobs": [{"id": 1, "location_index": 1, "time_windows": [[100, 100]]}],
            "vehicles": [{"id": 1, "start_index": 0}],
            "matrix": [[0, 101], [101, 0]]
        }"#,
    );
    assert_eq!(unassigned_ids(&infeasible), vec![1]);
}

#[test]
fn unserveable_instance_is_a_valid_empty_solution() {
    // The only vehicle cannot carry anything.
    let (_, solution) = solve(
        r#"{
            "jobs": [{"id": 1, "location_index": 1, "delivery": [5]}],
            "vehicles": [{"id": 1, "start_index": 0, "capacity": [1]}],
            "matrix": [[0, 100], [100, 0]]
        }"#,
    );

    assert_eq!(solution.assigned_count(), 0);
    assert_eq!(solution.objective(), 0);

    let report = encode_solution(&solution, None).unwrap();
    assert_eq!(report.summary.routes, 0);
    assert_eq!(report.summary.cost, 0);
    assert_eq!(report.summary.unassigned, 1);
}

const DETERMINISM_INSTANCE: &str = r#"{
    "jobs": [
        {"id": 1, "location_index": 1, "delivery": [1]},
        {"id": 2, "location_index": 2, "delivery": [1]},
        {"id": 3, "location_index": 3, "delivery": [1]},
        {"id": 4, "location_index": 4, "delivery": [1]},
        {"id": 5, "location_index": 5, "delivery": [1]},
        {"id": 6, "location_index": 6, "delivery": [1]},
        {"id": 7, "location_index": 7, "delivery": [1]}
    ],
    "vehicles": [
        {"id": 1, "start_index": 0, "end_index": 0, "capacity": [5]},
        {"id": 2, "start_index": 8, "end_index": 8, "capacity": [5]}
    ],
    "matrices": {"car": {"durations": [
        [0, 100, 200, 300, 400, 500, 600, 700, 800],
        [100, 0, 100, 200, 300, 400, 500, 600, 700],
        [200, 100, 0, 100, 200, 300, 400, 500, 600],
        [300, 200, 100, 0, 100, 200, 300, 400, 500],
        [400, 300, 200, 100, 0, 100, 200, 300, 400],
        [500, 400, 300, 200, 100, 0, 100, 200, 300],
        [600, 500, 400, 300, 200, 100, 0, 100, 200],
        [700, 600, 500, 400, 300, 400, 100, 0, 100],
        [800, 700, 600, 500, 400, 300, 200, 100, 0]
    ]}}
}"#;

#[test]
fn repeated_runs_are_identical() {
    let run = || {
        let (_, solution) = solve(DETERMINISM_INSTANCE);
        let report = encode_solution(&solution, None).unwrap();
        (
            solution.objective(),
            serde_json::to_string(&report).unwrap(),
        )
    };

    let first = run();
    let second = run();

    assert_eq!(first.0, second.0);
    assert_eq!(first.1, second.1);
}

#[test]
fn report_steps_carry_consistent_timing() {
    let (_, solution) = solve(DETERMINISM_INSTANCE);
    let report = encode_solution(&solution, None).unwrap();

    for route in &report.routes {
        let mut previous_arrival = i64::MIN;
        for step in &route.steps {
            assert!(step.arrival >= previous_arrival);
            previous_arrival = step.arrival;
            assert!(step.waiting_time >= 0);
            assert!(step.load.iter().all(|&v| v >= 0));
        }
    }
}
