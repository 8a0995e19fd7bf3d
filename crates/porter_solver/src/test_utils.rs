use std::sync::Arc;

use porter_matrix::{Coord, MatrixSet};
use rand::RngCore;

use crate::{
    problem::{
        amount::Amount,
        instance::{Problem, ProblemBuilder},
        job::{Job, JobBuilder, JobIdx},
        location::Location,
        profile::Profile,
        vehicle::{Vehicle, VehicleBuilder, VehicleIdx},
    },
    solution::solution::Solution,
};

/// `n` locations on a line; leg between neighbors is 100 seconds and 1000
/// meters, so durations and distances stay easy to predict in tests.
pub fn grid_locations(n: usize) -> Vec<Location> {
    (0..n)
        .map(|i| Location::new(i, Some(Coord::new(i as f64, 0.0))))
        .collect()
}

pub fn grid_profile(n: usize) -> Profile {
    let mut durations = vec![0_i64; n * n];
    let mut distances = vec![0_i64; n * n];

    for i in 0..n {
        for j in 0..n {
            let gap = i.abs_diff(j) as i64;
            durations[i * n + j] = gap * 100;
            distances[i * n + j] = gap * 1000;
        }
    }

    Profile::new(
        "car".to_owned(),
        MatrixSet::from_tables(n, durations, Some(distances), None).unwrap(),
    )
}

pub fn job(id: u64, location: usize) -> Job {
    job_with(id, location, |_| {})
}

pub fn job_with(id: u64, location: usize, customize: impl FnOnce(&mut JobBuilder)) -> Job {
    let mut builder = JobBuilder::default();
    builder.set_id(id).set_location(location);
    customize(&mut builder);
    builder.build()
}

pub fn vehicle(id: u64, depot: usize) -> Vehicle {
    vehicle_with(id, depot, |_| {})
}

pub fn vehicle_with(id: u64, depot: usize, customize: impl FnOnce(&mut VehicleBuilder)) -> Vehicle {
    let mut builder = VehicleBuilder::default();
    builder
        .set_id(id)
        .set_start(depot)
        .set_end(depot)
        .set_capacity(Amount::from_vec(vec![1000]));
    customize(&mut builder);
    builder.build()
}

pub fn problem(n: usize, jobs: Vec<Job>, vehicles: Vec<Vehicle>) -> Problem {
    let mut builder = ProblemBuilder::default();
    builder.set_locations(grid_locations(n));
    builder.set_profiles(vec![grid_profile(n)]);
    builder.set_amount_dimensions(1);
    for job in jobs {
        builder.add_job(job);
    }
    builder.set_vehicles(vehicles);
    builder.build().expect("test problem must be valid")
}

/// Shorthand: jobs with ids 0.. at the given grid positions, vehicles with
/// ids 0.. starting and ending at theirs.
pub fn problem_from_grid(n: usize, job_locations: &[usize], vehicle_depots: &[usize]) -> Problem {
    let jobs = job_locations
        .iter()
        .enumerate()
        .map(|(rank, &location)| job(rank as u64, location))
        .collect();
    let vehicles = vehicle_depots
        .iter()
        .enumerate()
        .map(|(rank, &depot)| vehicle(rank as u64, depot))
        .collect();
    problem(n, jobs, vehicles)
}

/// Builds a solution with the given routes; `routes[v]` lists job ranks in
/// route order for vehicle `v`.
pub fn solution_with_routes(problem: &Arc<Problem>, routes: &[&[usize]]) -> Solution {
    let mut solution = Solution::new(Arc::clone(problem));

    for (vehicle_rank, ranks) in routes.iter().enumerate() {
        let tasks = ranks.iter().map(|&rank| JobIdx::new(rank)).collect::<Vec<_>>();
        solution.seed_route(VehicleIdx::new(vehicle_rank), &tasks);
    }

    solution
}

/// Deterministic RngCore backed by a fixed word list, for exercising code
/// that samples without depending on a live generator.
pub struct MockRng {
    data: Vec<u64>,
    index: usize,
}

impl MockRng {
    pub fn new(data: Vec<u64>) -> Self {
        MockRng { data, index: 0 }
    }
}

impl RngCore for MockRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    fn next_u64(&mut self) -> u64 {
        let value = self.data[self.index % self.data.len()];
        self.index = (self.index + 1) % self.data.len();
        value
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for byte in dst.iter_mut() {
            *byte = 0;
        }
    }
}
